use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Wire-level errors returned by a [`SecretStore`] backend or an [`Authorizer`],
/// mapped onto [`ErrorCode`]/[`ErrorResponse`] at the transport boundary.
///
/// [`SecretStore`]: crate::store::SecretStore
/// [`Authorizer`]: crate::auth::Authorizer
/// [`ErrorCode`]: crate::types::ErrorCode
/// [`ErrorResponse`]: crate::types::ErrorResponse
#[derive(Debug)]
pub enum ApiError {
	/// Please refer to [`ErrorCode::NoSuchRecordException`].
	///
	/// [`ErrorCode::NoSuchRecordException`]: crate::types::ErrorCode::NoSuchRecordException
	NoSuchRecordError(String),

	/// Please refer to [`ErrorCode::InvalidRequestException`].
	///
	/// [`ErrorCode::InvalidRequestException`]: crate::types::ErrorCode::InvalidRequestException
	InvalidRequestError(String),

	/// Please refer to [`ErrorCode::VersionConflictException`].
	///
	/// [`ErrorCode::VersionConflictException`]: crate::types::ErrorCode::VersionConflictException
	VersionConflictError(String),

	/// Please refer to [`ErrorCode::AuthException`].
	///
	/// [`ErrorCode::AuthException`]: crate::types::ErrorCode::AuthException
	AuthError(String),

	/// Please refer to [`ErrorCode::FileTooLargeException`].
	///
	/// [`ErrorCode::FileTooLargeException`]: crate::types::ErrorCode::FileTooLargeException
	FileTooLargeError(String),

	/// Please refer to [`ErrorCode::InternalServerException`].
	///
	/// [`ErrorCode::InternalServerException`]: crate::types::ErrorCode::InternalServerException
	InternalServerError(String),
}

impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ApiError::NoSuchRecordError(message) => {
				write!(f, "Requested record does not exist: {}", message)
			},
			ApiError::InvalidRequestError(message) => {
				write!(f, "Request was invalid: {}", message)
			},
			ApiError::VersionConflictError(message) => {
				write!(f, "Version conflict: {}", message)
			},
			ApiError::AuthError(message) => {
				write!(f, "Authentication or authorization failure: {}", message)
			},
			ApiError::FileTooLargeError(message) => {
				write!(f, "File exceeds the maximum allowed size: {}", message)
			},
			ApiError::InternalServerError(message) => {
				write!(f, "InternalServerError: {}", message)
			},
		}
	}
}

impl Error for ApiError {}

impl From<io::Error> for ApiError {
	fn from(err: io::Error) -> Self {
		ApiError::InternalServerError(err.to_string())
	}
}

impl From<keeper_core::VaultError> for ApiError {
	fn from(err: keeper_core::VaultError) -> Self {
		match err {
			keeper_core::VaultError::AuthenticationError(m) => ApiError::AuthError(m),
			keeper_core::VaultError::DecryptError(m) => ApiError::InvalidRequestError(m),
			keeper_core::VaultError::FormatError(m) => ApiError::InvalidRequestError(m),
			keeper_core::VaultError::StorageError(m) => ApiError::InternalServerError(m),
			keeper_core::VaultError::Internal(m) => ApiError::InternalServerError(m),
		}
	}
}
