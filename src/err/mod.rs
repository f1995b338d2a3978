use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	#[error("{0}")]
	Core(#[from] pgql_core::err::Error),

	#[error("The configuration is not valid: {0}")]
	Config(String),

	#[error("There was a problem with the network: {0}")]
	Io(#[from] std::io::Error),

	#[error("The Authorization header is not of the correct bearer scheme format")]
	InvalidAuthorization,

	#[error("Query batching is not enabled")]
	BatchingDisabled,

	#[error("The schema is not ready yet")]
	SchemaUnavailable,

	#[error("The database is not reachable")]
	DatabaseUnavailable,
}

impl Error {
	fn status(&self) -> StatusCode {
		match self {
			Error::InvalidAuthorization | Error::BatchingDisabled => StatusCode::BAD_REQUEST,
			Error::SchemaUnavailable | Error::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Answers with a GraphQL shaped error document, so that clients can read
/// transport failures the same way as operation errors.
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let body = json!({
			"errors": [{ "message": self.to_string() }],
		});
		(self.status(), Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_errors_have_a_status() {
		assert_eq!(Error::BatchingDisabled.into_response().status(), StatusCode::BAD_REQUEST);
		assert_eq!(Error::InvalidAuthorization.into_response().status(), StatusCode::BAD_REQUEST);
		assert_eq!(Error::SchemaUnavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(Error::Config("x".into()).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
