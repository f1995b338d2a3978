//! Runs GraphQL operations, each inside its own role-scoped transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_graphql::{BatchRequest, BatchResponse, Pos, Request, Response, ServerError, Value};
use deadpool_postgres::Pool;
use futures::future::join_all;

use super::TARGET;
use super::error::{DbDetail, ErrorCode, GqlError};
use super::schema::BuiltSchema;
use crate::cnf::INTERNAL_ERROR_MESSAGE;
use crate::dbs::{RequestContext, Session, Setup};
use crate::iam::{self, Verifier};

/// How requests are authenticated and how their errors are reported.
#[derive(Clone, Default)]
pub struct RequestSettings {
	/// The role of requests without a role claim
	pub default_role: Option<String>,
	/// Verifies bearer tokens. Tokens are refused without one
	pub verifier: Option<Arc<Verifier>>,
	pub statement_timeout: Option<Duration>,
	/// Show the messages of internal errors
	pub show_error_stack: bool,
	/// Expose the fields of database errors in the error extensions
	pub extended_errors: bool,
}

fn server_error(e: GqlError) -> ServerError {
	async_graphql::Error::from(e).into_server_error(Pos::default())
}

/// Executes one operation as the role its token grants.
///
/// The transaction commits when the response has no errors, and rolls back
/// otherwise. Errors are normalized per `settings`.
pub async fn execute(
	schema: &BuiltSchema,
	pool: &Pool,
	settings: &RequestSettings,
	request: Request,
	token: Option<&str>,
) -> Response {
	let started = Instant::now();
	let response = match run(schema, pool, settings, request, token).await {
		Ok(response) => response,
		Err(e) => Response::from_errors(vec![server_error(e)]),
	};
	trace!(target: TARGET, "Executed an operation in {:?}", started.elapsed());
	normalize(response, settings)
}

/// Executes every operation of a batch, each in its own transaction.
pub async fn execute_batch(
	schema: &BuiltSchema,
	pool: &Pool,
	settings: &RequestSettings,
	batch: BatchRequest,
	token: Option<&str>,
) -> BatchResponse {
	match batch {
		BatchRequest::Single(request) => {
			BatchResponse::Single(execute(schema, pool, settings, request, token).await)
		}
		BatchRequest::Batch(requests) => {
			let runs = requests.into_iter().map(|r| execute(schema, pool, settings, r, token));
			BatchResponse::Batch(join_all(runs).await)
		}
	}
}

async fn run(
	schema: &BuiltSchema,
	pool: &Pool,
	settings: &RequestSettings,
	request: Request,
	token: Option<&str>,
) -> Result<Response, GqlError> {
	let claims = iam::authenticate(settings.verifier.as_deref(), token, settings.default_role.as_deref())?;
	let setup = Setup {
		role: claims.role,
		claims: claims.claims,
		statement_timeout: settings.statement_timeout,
	};
	let ctx = Arc::new(RequestContext::begin(pool, &setup).await?);
	let mut response = schema.schema.execute(request.data(ctx.clone() as Arc<dyn Session>)).await;
	let finished = match response.errors.is_empty() {
		true => ctx.commit().await,
		false => ctx.rollback().await,
	};
	if let Err(e) = finished {
		response.data = Value::Null;
		response.errors.push(server_error(e));
	}
	debug!(target: TARGET, "The operation ran {} statements", ctx.statements());
	Ok(response)
}

/// Gives every error a code, masks internal messages and strips database
/// detail per `settings`.
pub fn normalize(mut response: Response, settings: &RequestSettings) -> Response {
	for err in response.errors.iter_mut() {
		let ext = err.extensions.get_or_insert_with(Default::default);
		if ext.get("code").is_none() {
			ext.set("code", ErrorCode::Validation.as_str());
		}
		let internal = ext.get("code") == Some(&Value::from(ErrorCode::Internal.as_str()));
		if internal && !settings.show_error_stack {
			err.message = INTERNAL_ERROR_MESSAGE.to_owned();
		}
		if !settings.extended_errors {
			for key in DbDetail::KEYS {
				ext.unset(key);
			}
		}
	}
	response
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::catalog::fixture::self_referencing;
	use crate::dbs::{PoolOptions, pool};
	use crate::gql::error::internal_error;

	fn unreachable() -> Pool {
		let opts = PoolOptions {
			wait_timeout: Duration::from_secs(2),
			..Default::default()
		};
		pool("postgres://nobody@127.0.0.1:1/none", &opts).unwrap()
	}

	fn code(response: &Response) -> Option<Value> {
		response.errors[0].extensions.as_ref().and_then(|e| e.get("code")).cloned()
	}

	#[test]
	fn internal_messages_are_masked() {
		let response = || Response::from_errors(vec![server_error(internal_error("relation is gone"))]);
		let masked = normalize(response(), &RequestSettings::default());
		assert_eq!(masked.errors[0].message, INTERNAL_ERROR_MESSAGE);
		let shown = normalize(response(), &RequestSettings {
			show_error_stack: true,
			..Default::default()
		});
		assert_eq!(shown.errors[0].message, "relation is gone");
	}

	#[test]
	fn database_detail_needs_extended_errors() {
		let err = GqlError::Database {
			code: ErrorCode::DatabaseConstraint,
			message: "duplicate key".into(),
			detail: Box::new(DbDetail {
				errcode: "23505".into(),
				..Default::default()
			}),
		};
		let response = normalize(Response::from_errors(vec![server_error(err)]), &RequestSettings::default());
		let ext = response.errors[0].extensions.as_ref().unwrap();
		assert_eq!(ext.get("errcode"), None);
		assert_eq!(ext.get("code"), Some(&Value::from("DATABASE_CONSTRAINT")));
	}

	#[test]
	fn errors_without_a_code_are_validation_errors() {
		let response = normalize(
			Response::from_errors(vec![ServerError::new("Unknown field", None)]),
			&RequestSettings::default(),
		);
		assert_eq!(code(&response), Some(Value::from("VALIDATION")));
	}

	#[test_log::test(tokio::test)]
	async fn refused_tokens_run_nothing() {
		let schema = build(self_referencing(), BuildOptions::default());
		let response =
			execute(&schema, &unreachable(), &RequestSettings::default(), Request::new("{ allTs { totalCount } }"), Some("x"))
				.await;
		assert_eq!(code(&response), Some(Value::from("UNAUTHORIZED")));
	}

	#[tokio::test]
	async fn batches_answer_each_operation() {
		let schema = build(self_referencing(), BuildOptions::default());
		let batch = BatchRequest::Batch(vec![Request::new("{ a: allTs { totalCount } }"), Request::new("{ b: allTs { totalCount } }")]);
		let BatchResponse::Batch(responses) =
			execute_batch(&schema, &unreachable(), &RequestSettings::default(), batch, Some("x")).await
		else {
			panic!("Expected a batch response");
		};
		assert_eq!(responses.len(), 2);
		assert!(responses.iter().all(|r| r.errors.len() == 1));
	}
}
