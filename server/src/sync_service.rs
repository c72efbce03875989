//! HTTP transport glue (C6 server side), grounded on `server/src/vss_service.rs`'s
//! `Service<Request<Incoming>>` impl, `handle_request` generic dispatch helper, and
//! `build_error_response` status-code mapping — extended with the client-streaming (`Push`) and
//! server-streaming (`PullStream`) bodies this protocol adds, carried as
//! [`keeper_api::framing`]-delimited frames instead of unary-only `prost::Message`s.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use prost::Message;

use keeper_api::auth::Authorizer;
use keeper_api::error::ApiError;
use keeper_api::framing::{encode_frame, FrameDecoder};
use keeper_api::store::UserDirectory;
use keeper_api::types::{
	ErrorCode, ErrorResponse, HealthCheckRequest, LoginRequest, PullRequest, PullStreamRequest,
	PushOperation, RegisterRequest,
};

use crate::sync_engine::SyncEngine;
use crate::users;

const MAXIMUM_REQUEST_BODY_SIZE: usize = 1024 * 1024 * 1024;

/// Caps the size of a single request body, beyond which a push is rejected regardless of
/// [`keeper_core::record::MAX_BINARY_BYTES`] (which bounds one record's payload; this bounds
/// the whole framed stream).
#[derive(Clone, Copy)]
pub(crate) struct SyncServiceConfig {
	maximum_request_body_size: usize,
}

impl SyncServiceConfig {
	pub(crate) fn new(maximum_request_body_size: usize) -> Result<Self, String> {
		if maximum_request_body_size > MAXIMUM_REQUEST_BODY_SIZE {
			return Err(format!(
				"Maximum request body size {} exceeds maximum {}",
				maximum_request_body_size, MAXIMUM_REQUEST_BODY_SIZE
			));
		}
		Ok(Self { maximum_request_body_size })
	}
}

impl Default for SyncServiceConfig {
	fn default() -> Self {
		Self { maximum_request_body_size: MAXIMUM_REQUEST_BODY_SIZE }
	}
}

#[derive(Clone)]
pub(crate) struct SyncService {
	engine: Arc<SyncEngine>,
	directory: Arc<dyn UserDirectory>,
	authorizer: Arc<dyn Authorizer>,
	config: SyncServiceConfig,
}

impl SyncService {
	pub(crate) fn new(
		engine: Arc<SyncEngine>, directory: Arc<dyn UserDirectory>, authorizer: Arc<dyn Authorizer>,
		config: SyncServiceConfig,
	) -> Self {
		Self { engine, directory, authorizer, config }
	}
}

impl Service<Request<Incoming>> for SyncService {
	type Response = Response<Full<Bytes>>;
	type Error = hyper::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: Request<Incoming>) -> Self::Future {
		let engine = Arc::clone(&self.engine);
		let directory = Arc::clone(&self.directory);
		let authorizer = Arc::clone(&self.authorizer);
		let max_body = self.config.maximum_request_body_size;
		let path = req.uri().path().to_owned();

		Box::pin(async move {
			match path.as_str() {
				"/sync/push" => serve_push(engine, authorizer, req, max_body).await,
				"/sync/pull" => {
					handle_request(authorizer, req, max_body, move |user, request: PullRequest| {
						let engine = Arc::clone(&engine);
						async move { engine.pull(&user, request.since).await }
					})
					.await
				},
				"/sync/pull_stream" => serve_pull_stream(engine, authorizer, req, max_body).await,
				"/sync/health_check" => {
					handle_request(authorizer, req, max_body, move |_user, _request: HealthCheckRequest| {
						let engine = Arc::clone(&engine);
						async move { Ok(engine.health_check().await) }
					})
					.await
				},
				"/users/login" => {
					handle_request(authorizer, req, max_body, move |_user, request: LoginRequest| {
						let directory = Arc::clone(&directory);
						async move { users::login(directory.as_ref(), &request.login, &request.password).await }
					})
					.await
				},
				"/users/register" => {
					handle_request(authorizer, req, max_body, move |_user, request: RegisterRequest| {
						let directory = Arc::clone(&directory);
						async move {
							users::register(directory.as_ref(), &request.login, &request.password).await
						}
					})
					.await
				},
				_ => Ok(Response::builder()
					.status(StatusCode::BAD_REQUEST)
					.body(Full::new(Bytes::from("Invalid request path.")))
					.unwrap()),
			}
		})
	}
}

/// Every non-streaming RPC shares this shape: authenticate, read a length-capped body, decode one
/// `prost::Message`, hand it (plus the authenticated `user_token`) to `handler`, encode the result
/// or the mapped error. The streaming RPCs (`Push`/`PullStream`) have their own bespoke bodies
/// below since their wire bodies are a sequence of frames, not a single message.
async fn handle_request<
	T: Message + Default,
	R: Message,
	F: FnOnce(String, T) -> Fut,
	Fut: Future<Output = Result<R, ApiError>>,
>(
	authorizer: Arc<dyn Authorizer>, request: Request<Incoming>, maximum_request_body_size: usize,
	handler: F,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
	let (parts, body) = request.into_parts();
	let headers_map = parts
		.headers
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
		.collect::<HashMap<String, String>>();

	let user_token = match authorizer.verify(&headers_map).await {
		Ok(auth_response) => auth_response.user_token,
		Err(e) => return Ok(build_error_response(e)),
	};

	let bytes = match read_body(body, maximum_request_body_size).await {
		Ok(bytes) => bytes,
		Err(response) => return Ok(response),
	};

	match T::decode(bytes) {
		Ok(request) => match handler(user_token, request).await {
			Ok(response) => {
				Ok(Response::builder().body(Full::new(Bytes::from(response.encode_to_vec()))).unwrap())
			},
			Err(e) => Ok(build_error_response(e)),
		},
		Err(_) => Ok(Response::builder()
			.status(StatusCode::BAD_REQUEST)
			.body(Full::new(Bytes::from(b"Error parsing request".to_vec())))
			.unwrap()),
	}
}

async fn read_body(
	body: Incoming, maximum_request_body_size: usize,
) -> Result<Bytes, Response<Full<Bytes>>> {
	Limited::new(body, maximum_request_body_size)
		.collect()
		.await
		.map(|collected| collected.to_bytes())
		.map_err(|_| {
			Response::builder()
				.status(StatusCode::PAYLOAD_TOO_LARGE)
				.body(Full::new(Bytes::from("Request body too large")))
				.unwrap()
		})
}

/// `since`/`force` travel as query parameters on `Push` rather than as a field on every frame,
/// mirroring the Go client's `common.WriteClientVersion`/`common.WriteForce` stream metadata.
fn parse_push_query(req: &Request<Incoming>) -> Result<(i32, bool), ApiError> {
	let query = req.uri().query().unwrap_or_default();
	let mut since = None;
	let mut force = false;
	for pair in query.split('&') {
		let mut parts = pair.splitn(2, '=');
		match (parts.next(), parts.next()) {
			(Some("since"), Some(v)) => {
				since = Some(
					v.parse::<i32>()
						.map_err(|_| ApiError::InvalidRequestError("malformed since".to_string()))?,
				);
			},
			(Some("force"), Some(v)) => force = v == "true",
			_ => {},
		}
	}
	let since = since.ok_or_else(|| ApiError::InvalidRequestError("missing since".to_string()))?;
	Ok((since, force))
}

async fn serve_push(
	engine: Arc<SyncEngine>, authorizer: Arc<dyn Authorizer>, req: Request<Incoming>,
	maximum_request_body_size: usize,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
	let (since, force) = match parse_push_query(&req) {
		Ok(v) => v,
		Err(e) => return Ok(build_error_response(e)),
	};

	let (parts, body) = req.into_parts();
	let headers_map = parts
		.headers
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
		.collect::<HashMap<String, String>>();
	let user_token = match authorizer.verify(&headers_map).await {
		Ok(auth_response) => auth_response.user_token,
		Err(e) => return Ok(build_error_response(e)),
	};

	let bytes = match read_body(body, maximum_request_body_size).await {
		Ok(bytes) => bytes,
		Err(response) => return Ok(response),
	};

	let mut decoder = FrameDecoder::new();
	decoder.push(&bytes);
	let mut operations = Vec::new();
	loop {
		match decoder.try_next::<PushOperation>() {
			Ok(Some(op)) => operations.push(op),
			Ok(None) => break,
			Err(_) => {
				return Ok(Response::builder()
					.status(StatusCode::BAD_REQUEST)
					.body(Full::new(Bytes::from(b"Error parsing push frame".to_vec())))
					.unwrap())
			},
		}
	}

	match engine.push(&user_token, since, force, operations).await {
		Ok(response) => {
			Ok(Response::builder().body(Full::new(Bytes::from(response.encode_to_vec()))).unwrap())
		},
		Err(e) => Ok(build_error_response(e)),
	}
}

async fn serve_pull_stream(
	engine: Arc<SyncEngine>, authorizer: Arc<dyn Authorizer>, req: Request<Incoming>,
	maximum_request_body_size: usize,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
	handle_request(authorizer, req, maximum_request_body_size, move |user, request: PullStreamRequest| {
		let engine = Arc::clone(&engine);
		async move {
			let chunks = engine.pull_stream(&user, &request.id, request.version).await?;
			let mut body = bytes::BytesMut::new();
			for chunk in &chunks {
				body.extend_from_slice(&encode_frame(chunk));
			}
			Ok(FramedBody(body.freeze()))
		}
	})
	.await
}

/// Wraps an already-framed sequence of messages so [`handle_request`]'s `R: Message` bound can
/// carry it through unchanged: its `encode_to_vec` is the identity, since the frames are encoded
/// up front by [`serve_pull_stream`] rather than left to `prost`.
struct FramedBody(Bytes);

impl Message for FramedBody {
	fn encode_raw(&self, buf: &mut impl bytes::BufMut)
	where
		Self: Sized,
	{
		buf.put_slice(&self.0);
	}

	fn merge_field(
		&mut self, _tag: u32, _wire_type: prost::encoding::WireType, _buf: &mut impl bytes::Buf,
		_ctx: prost::encoding::DecodeContext,
	) -> Result<(), prost::DecodeError>
	where
		Self: Sized,
	{
		unimplemented!("FramedBody is a response-only encoding wrapper")
	}

	fn encoded_len(&self) -> usize {
		self.0.len()
	}

	fn clear(&mut self) {
		unimplemented!("FramedBody is a response-only encoding wrapper")
	}
}

fn build_error_response(e: ApiError) -> Response<Full<Bytes>> {
	let (status_code, error_response) = match e {
		ApiError::NoSuchRecordError(msg) => {
			(StatusCode::NOT_FOUND, ErrorResponse { error_code: ErrorCode::NoSuchRecordException.into(), message: msg })
		},
		ApiError::VersionConflictError(msg) => (
			StatusCode::CONFLICT,
			ErrorResponse { error_code: ErrorCode::VersionConflictException.into(), message: msg },
		),
		ApiError::InvalidRequestError(msg) => (
			StatusCode::BAD_REQUEST,
			ErrorResponse { error_code: ErrorCode::InvalidRequestException.into(), message: msg },
		),
		ApiError::AuthError(msg) => {
			(StatusCode::UNAUTHORIZED, ErrorResponse { error_code: ErrorCode::AuthException.into(), message: msg })
		},
		ApiError::FileTooLargeError(msg) => (
			StatusCode::PAYLOAD_TOO_LARGE,
			ErrorResponse { error_code: ErrorCode::FileTooLargeException.into(), message: msg },
		),
		ApiError::InternalServerError(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			ErrorResponse {
				error_code: ErrorCode::InternalServerException.into(),
				message: "Unknown Server Error occurred.".to_string(),
			},
		),
	};
	Response::builder()
		.status(status_code)
		.body(Full::new(Bytes::from(error_response.encode_to_vec())))
		.unwrap()
}
