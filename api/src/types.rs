/// Discriminates the kind of secret carried by a [`Secret`] message. Mirrors
/// `keeper_core::record::RecordType` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RecordType {
	/// Default protobuf enum value. Never produced by a well-formed client.
	Unknown = 0,
	/// A login/password pair with an optional URL.
	LoginPassword = 1,
	/// Free-form text.
	Text = 2,
	/// Bank card details.
	BankCard = 3,
	/// An arbitrary file, inline or streamed as a blob.
	Binary = 4,
}

/// The wire representation of a record. `dek` and `data` are always opaque
/// ciphertext; the server never has the key required to read them.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Secret {
	/// Stringified 128-bit record identifier.
	#[prost(string, tag = "1")]
	pub id: ::prost::alloc::string::String,
	/// Seconds since the Unix epoch, truncated to the second.
	#[prost(int64, tag = "2")]
	pub modified_at: i64,
	/// See [`RecordType`].
	#[prost(enumeration = "RecordType", tag = "3")]
	pub record_type: i32,
	/// The per-mutation DEK, wrapped under the owner's master key.
	#[prost(bytes = "bytes", tag = "4")]
	pub dek: ::prost::bytes::Bytes,
	/// Inline ciphertext payload. Empty when `is_big` is set; the body must then
	/// be fetched separately via `PullStream`.
	#[prost(bytes = "bytes", tag = "5")]
	pub data: ::prost::bytes::Bytes,
	/// Whether the payload is stored as a blob rather than carried inline.
	#[prost(bool, tag = "6")]
	pub is_big: bool,
	/// Server-assigned version. Clients must never regress this.
	#[prost(int32, tag = "7")]
	pub version: i32,
	/// Tombstone marker. Deletions are version-bumping mutations on the server,
	/// never physical row removals.
	#[prost(bool, tag = "8")]
	pub deleted: bool,
}

/// Discriminates a frame within a [`Push`] stream.
///
/// [`Push`]: the client-streaming upload RPC
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OperationType {
	/// Default protobuf enum value. Never produced by a well-formed client.
	Unknown = 0,
	/// A complete non-binary record, or a binary record small enough to inline.
	Default = 1,
	/// Begins a binary upload: reserves/updates the record row without a payload.
	Begin = 2,
	/// Appends bytes to the binary file currently being uploaded for this record.
	Chunk = 3,
	/// Finalizes a binary upload: commits DEK, metadata, and the final version.
	End = 4,
}

/// One frame of a `Push` stream.
///
/// For `Default`/`Begin`/`End`, `secret` carries the record metadata (and, for
/// `Default`/`End`, the encrypted payload). For `Chunk`, `id`/`buffer` carry the
/// target record id and the next slice of ciphertext; `secret` is unset.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushOperation {
	/// See [`OperationType`].
	#[prost(enumeration = "OperationType", tag = "1")]
	pub op_type: i32,
	/// Set for `Default`/`Begin`/`End` frames.
	#[prost(message, optional, tag = "2")]
	pub secret: ::core::option::Option<Secret>,
	/// Set for `Chunk` frames: the id of the record being uploaded.
	#[prost(string, tag = "3")]
	pub id: ::prost::alloc::string::String,
	/// Set for `Chunk` frames: the next slice of ciphertext.
	#[prost(bytes = "bytes", tag = "4")]
	pub buffer: ::prost::bytes::Bytes,
}

/// Final response sent once a `Push` stream closes.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushResponse {
	/// Whether every frame in the stream was applied.
	#[prost(bool, tag = "1")]
	pub success: bool,
}

/// Request for the unary `Pull` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullRequest {
	/// The caller's last-known version; only records with `version > since` are
	/// returned.
	#[prost(int32, tag = "1")]
	pub since: i32,
}

/// Response for the unary `Pull` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullResponse {
	/// Records with `version > since`, ordered by `modified_at` ascending.
	#[prost(message, repeated, tag = "1")]
	pub secrets: ::prost::alloc::vec::Vec<Secret>,
	/// The server's current version for the caller, to be stored as the new
	/// `sync_state` value once the caller has applied every returned record.
	#[prost(int32, tag = "2")]
	pub version: i32,
}

/// Request to begin streaming a binary record's body via `PullStream`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullStreamRequest {
	/// The record's id.
	#[prost(string, tag = "1")]
	pub id: ::prost::alloc::string::String,
	/// The specific version to fetch.
	#[prost(int32, tag = "2")]
	pub version: i32,
}

/// Discriminates a frame within a `PullStream` response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChunkType {
	/// Default protobuf enum value. Never produced by a well-formed server.
	Unknown = 0,
	/// A slice of ciphertext.
	FilePart = 1,
	/// Marks a clean end of stream; `buffer` is empty.
	EndData = 2,
	/// Marks a stream aborted by a server-side read error; `buffer` is empty.
	ErrData = 3,
}

/// One frame of a `PullStream` response.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Chunk {
	/// The record id this chunk belongs to.
	#[prost(string, tag = "1")]
	pub id: ::prost::alloc::string::String,
	/// See [`ChunkType`].
	#[prost(enumeration = "ChunkType", tag = "2")]
	pub chunk_type: i32,
	/// The slice of ciphertext, empty for `EndData`/`ErrData`.
	#[prost(bytes = "bytes", tag = "3")]
	pub buffer: ::prost::bytes::Bytes,
}

/// When the HTTP status code is not 2xx, the response body contains a
/// serialized `ErrorResponse` with the relevant [`ErrorCode`] and `message`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorResponse {
	/// The error code uniquely identifying an error condition. Meant to be read
	/// programmatically; do not parse `message` instead.
	#[prost(enumeration = "ErrorCode", tag = "1")]
	pub error_code: i32,
	/// A human-readable description, for logging only.
	#[prost(string, tag = "2")]
	pub message: ::prost::alloc::string::String,
}

/// Error codes used in [`ErrorResponse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
	/// Default protobuf enum value. Never used as an `ErrorCode` by the server.
	Unknown = 0,
	/// The push's `client_version` metadata was behind the server's current
	/// version and `force` was not set.
	VersionConflictException = 1,
	/// The request was missing a required field, malformed, or failed to decode.
	InvalidRequestException = 2,
	/// An internal server error occurred; the client may safely retry with
	/// backoff.
	InternalServerException = 3,
	/// The requested record id does not exist for this user.
	NoSuchRecordException = 4,
	/// Authentication or authorization failed.
	AuthException = 5,
	/// The uploaded file exceeds the maximum allowed size.
	FileTooLargeException = 6,
}

impl ErrorCode {
	/// String value of the enum field names used in the protobuf definition.
	pub fn as_str_name(&self) -> &'static str {
		match self {
			ErrorCode::Unknown => "UNKNOWN",
			ErrorCode::VersionConflictException => "VERSION_CONFLICT_EXCEPTION",
			ErrorCode::InvalidRequestException => "INVALID_REQUEST_EXCEPTION",
			ErrorCode::InternalServerException => "INTERNAL_SERVER_EXCEPTION",
			ErrorCode::NoSuchRecordException => "NO_SUCH_RECORD_EXCEPTION",
			ErrorCode::AuthException => "AUTH_EXCEPTION",
			ErrorCode::FileTooLargeException => "FILE_TOO_LARGE_EXCEPTION",
		}
	}

	/// Creates an enum from field names used in the protobuf definition.
	pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
		match value {
			"UNKNOWN" => Some(Self::Unknown),
			"VERSION_CONFLICT_EXCEPTION" => Some(Self::VersionConflictException),
			"INVALID_REQUEST_EXCEPTION" => Some(Self::InvalidRequestException),
			"INTERNAL_SERVER_EXCEPTION" => Some(Self::InternalServerException),
			"NO_SUCH_RECORD_EXCEPTION" => Some(Self::NoSuchRecordException),
			"AUTH_EXCEPTION" => Some(Self::AuthException),
			"FILE_TOO_LARGE_EXCEPTION" => Some(Self::FileTooLargeException),
			_ => None,
		}
	}
}

/// Request for the auxiliary `HealthCheck` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {}

/// Response for the auxiliary `HealthCheck` RPC. Never an error: a storage
/// backend that cannot be reached is reported as `NotHealthy`, not a failure.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
	/// See [`ServerState`].
	#[prost(enumeration = "ServerState", tag = "1")]
	pub state: i32,
}

/// Server health, as reported by `HealthCheck`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ServerState {
	/// Default protobuf enum value. Never returned by the server.
	Unknown = 0,
	/// The storage backend responded to a liveness probe.
	Healthy = 1,
	/// The storage backend could not be reached.
	NotHealthy = 2,
}

/// Request for the auxiliary `Users.Login` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginRequest {
	/// The user's login/hostname identifier.
	#[prost(string, tag = "1")]
	pub login: ::prost::alloc::string::String,
	/// The passphrase, used only to verify the Argon2id hash; never the AEAD
	/// master key, which is derived client-side and never transmitted.
	#[prost(string, tag = "2")]
	pub password: ::prost::alloc::string::String,
}

/// Response for the auxiliary `Users.Login` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginResponse {
	/// A bearer token to attach to subsequent requests.
	#[prost(string, tag = "1")]
	pub token: ::prost::alloc::string::String,
}

/// Request for the auxiliary `Users.Register` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRequest {
	/// The user's chosen login/hostname identifier.
	#[prost(string, tag = "1")]
	pub login: ::prost::alloc::string::String,
	/// The passphrase to hash and store as the Argon2id verifier.
	#[prost(string, tag = "2")]
	pub password: ::prost::alloc::string::String,
}

/// Response for the auxiliary `Users.Register` RPC.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterResponse {
	/// A bearer token to attach to subsequent requests.
	#[prost(string, tag = "1")]
	pub token: ::prost::alloc::string::String,
}
