//! The HTTP face of the GraphQL executor.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_graphql::BatchRequest;
use async_graphql_axum::rejection::GraphQLRejection;
use async_graphql_axum::{GraphQLBatchRequest, GraphQLResponse};
use axum::BoxError;
use axum::body::{Body, HttpBody};
use axum::extract::FromRequest;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::{HeaderMap, Request as HttpRequest, Response as HttpResponse};
use pgql_core::gql::execute::execute_batch;
use tower_service::Service;

use crate::err::Error;
use crate::net::AppState;

const TARGET: &str = "pgql::gql";

/// The token of an `Authorization: Bearer <token>` header.
fn bearer(headers: &HeaderMap) -> Result<Option<String>, Error> {
	let Some(value) = headers.get(AUTHORIZATION) else {
		return Ok(None);
	};
	let value = value.to_str().map_err(|_| Error::InvalidAuthorization)?;
	match value.trim().split_once(' ') {
		Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
			Ok(Some(token.trim().to_owned()))
		}
		_ => Err(Error::InvalidAuthorization),
	}
}

/// A GraphQL service running every operation against the latest schema.
#[derive(Clone)]
pub struct GraphQL {
	state: Arc<AppState>,
}

impl GraphQL {
	/// Create a GraphQL handler.
	pub fn new(state: Arc<AppState>) -> Self {
		Self {
			state,
		}
	}
}

impl<B> Service<HttpRequest<B>> for GraphQL
where
	B: HttpBody<Data = Bytes> + Send + 'static,
	B::Data: Into<Bytes>,
	B::Error: Into<BoxError>,
{
	type Response = HttpResponse<Body>;
	type Error = Infallible;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: HttpRequest<B>) -> Self::Future {
		let state = self.state.clone();
		let req = req.map(Body::new);
		Box::pin(async move {
			let token = match bearer(req.headers()) {
				Ok(token) => token,
				Err(err) => return Ok(err.into_response()),
			};
			let batch = match GraphQLBatchRequest::<GraphQLRejection>::from_request(req, &()).await {
				Ok(req) => req.into_inner(),
				Err(err) => return Ok(err.into_response()),
			};
			if matches!(batch, BatchRequest::Batch(_)) && !state.batching {
				return Ok(Error::BatchingDisabled.into_response());
			}
			// Requests keep the schema they started with across rebuilds
			let Some(schema) = state.manager.schema() else {
				return Ok(Error::SchemaUnavailable.into_response());
			};
			if state.log_queries {
				for request in batch.iter() {
					debug!(target: TARGET, "Executing operation: {}", request.query);
				}
			}
			let response = execute_batch(&schema, &state.pool, &state.settings, batch, token.as_deref()).await;
			Ok(GraphQLResponse(response).into_response())
		})
	}
}

#[cfg(test)]
mod tests {
	use http::{HeaderValue, StatusCode};
	use pgql_core::dbs::{PoolOptions, pool};
	use pgql_core::gql::execute::RequestSettings;
	use pgql_core::live::{ManagerOptions, SchemaManager};
	use rstest::rstest;
	use tower::ServiceExt;

	use super::*;

	fn service(batching: bool) -> GraphQL {
		let pool = pool("postgres://localhost/nothing", &PoolOptions::default()).unwrap();
		GraphQL::new(Arc::new(AppState {
			manager: SchemaManager::new(ManagerOptions::default()),
			pool,
			settings: RequestSettings::default(),
			batching,
			log_queries: true,
		}))
	}

	fn post(body: &'static str) -> HttpRequest<Body> {
		HttpRequest::post("/graphql")
			.header("content-type", "application/json")
			.body(Body::from(body))
			.unwrap()
	}

	#[rstest]
	#[case(None, Ok(None))]
	#[case(Some("Bearer abc.def"), Ok(Some("abc.def")))]
	#[case(Some("bearer   abc "), Ok(Some("abc")))]
	#[case(Some("Basic abc"), Err(()))]
	#[case(Some("Bearer"), Err(()))]
	fn bearer_tokens_are_extracted(#[case] header: Option<&str>, #[case] expected: Result<Option<&str>, ()>) {
		let mut headers = HeaderMap::new();
		if let Some(header) = header {
			headers.insert(AUTHORIZATION, HeaderValue::from_str(header).unwrap());
		}
		let token = bearer(&headers).map_err(|_| ());
		assert_eq!(token.as_ref().map(|t| t.as_deref()), expected.as_ref().map(|t| *t));
	}

	#[tokio::test]
	async fn batches_need_batching() {
		let response = service(false).oneshot(post(r#"[{"query":"{ a }"}]"#)).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn nothing_runs_before_the_schema_is_ready() {
		let response = service(true).oneshot(post(r#"{"query":"{ a }"}"#)).await.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	}

	#[tokio::test]
	async fn malformed_authorization_is_refused() {
		let mut req = post(r#"{"query":"{ a }"}"#);
		req.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
		let response = service(true).oneshot(req).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}
}
