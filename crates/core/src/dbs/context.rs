use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use serde_json::Value as Json;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{CancelToken, NoTls};

use super::{Session, TARGET};
use crate::gql::error::{GqlError, internal_error};
use crate::gql::sql::Statement;

const SAVEPOINT: &str = "graphql_statement";

/// The transaction local settings of a request.
#[derive(Clone, Debug, Default)]
pub struct Setup {
	/// The role to assume, if any
	pub role: Option<String>,
	/// Exposed as `jwt.claims.<key>`, each value as text
	pub claims: Vec<(String, String)>,
	pub statement_timeout: Option<Duration>,
}

impl Setup {
	/// The `set_config` calls applying this setup, with their parameters.
	fn statement(&self) -> Option<(String, Vec<String>)> {
		let mut settings = vec![];
		if let Some(role) = &self.role {
			settings.push(("role".to_owned(), role.clone()));
		}
		for (key, value) in self.claims.iter() {
			settings.push((format!("jwt.claims.{key}"), value.clone()));
		}
		if let Some(timeout) = self.statement_timeout {
			settings.push(("statement_timeout".to_owned(), timeout.as_millis().to_string()));
		}
		if settings.is_empty() {
			return None;
		}
		let mut params = Vec::with_capacity(settings.len() * 2);
		let mut calls = Vec::with_capacity(settings.len());
		for (name, value) in settings {
			params.push(name);
			params.push(value);
			calls.push(format!("set_config(${}, ${}, true)", params.len() - 1, params.len()));
		}
		Some((format!("select {}", calls.join(", ")), params))
	}
}

/// One request's transaction.
///
/// The connection stays checked out of the pool until the transaction is
/// committed or rolled back. A context dropped with its transaction still
/// open cancels the running statement and discards the connection.
pub struct RequestContext {
	client: Mutex<Option<Object>>,
	cancel: CancelToken,
	statements: AtomicUsize,
	open: AtomicBool,
}

impl RequestContext {
	/// Checks out a connection, opens a transaction and applies `setup`.
	pub async fn begin(pool: &Pool, setup: &Setup) -> Result<Self, GqlError> {
		let client = pool.get().await?;
		let cancel = client.cancel_token();
		client.batch_execute("begin").await?;
		let ctx = Self {
			client: Mutex::new(Some(client)),
			cancel,
			statements: AtomicUsize::new(0),
			open: AtomicBool::new(true),
		};
		if let Some((sql, params)) = setup.statement() {
			if let Err(e) = ctx.execute(&sql, &params).await {
				ctx.rollback().await?;
				let msg = match e {
					GqlError::Database {
						message,
						..
					} => message,
					e => e.to_string(),
				};
				return Err(GqlError::Authorization(msg));
			}
		}
		trace!(target: TARGET, "Opened a request transaction as {:?}", setup.role);
		Ok(ctx)
	}

	async fn execute(&self, sql: &str, params: &[String]) -> Result<(), GqlError> {
		let guard = self.client.lock().await;
		let client = guard.as_ref().ok_or_else(|| internal_error("The request transaction is closed"))?;
		let params: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
		client.query(sql, &params).await?;
		Ok(())
	}

	async fn finish(&self, sql: &str) -> Result<(), GqlError> {
		let Some(client) = self.client.lock().await.take() else {
			return Ok(());
		};
		let result = client.batch_execute(sql).await;
		self.open.store(false, Ordering::Release);
		if result.is_err() {
			// Unknown transaction state, keep it out of the pool
			drop(Object::take(client));
		}
		result.map_err(GqlError::from)
	}

	pub async fn commit(&self) -> Result<(), GqlError> {
		self.finish("commit").await
	}

	pub async fn rollback(&self) -> Result<(), GqlError> {
		self.finish("rollback").await
	}

	async fn query(&self, client: &Object, statement: &Statement) -> Result<Option<Json>, GqlError> {
		let prepared = client.prepare_cached(&statement.sql).await?;
		let params: Vec<&(dyn ToSql + Sync)> =
			statement.params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
		self.statements.fetch_add(1, Ordering::Relaxed);
		let rows = client.query(&prepared, &params).await?;
		match rows.first() {
			Some(row) => Ok(row.try_get::<_, Option<Json>>("value")?),
			None => Ok(None),
		}
	}
}

#[async_trait]
impl Session for RequestContext {
	/// Runs `statement` under a savepoint. A failed statement is rolled back
	/// to it, leaving the transaction usable by the statements after it.
	async fn fetch(&self, statement: &Statement) -> Result<Option<Json>, GqlError> {
		let guard = self.client.lock().await;
		let client = guard.as_ref().ok_or_else(|| internal_error("The request transaction is closed"))?;
		trace!(target: TARGET, "Running {}", statement.sql);
		client.batch_execute(&format!("savepoint {SAVEPOINT}")).await?;
		match self.query(client, statement).await {
			Ok(value) => {
				client.batch_execute(&format!("release savepoint {SAVEPOINT}")).await?;
				Ok(value)
			}
			Err(e) => {
				if let Err(r) = client.batch_execute(&format!("rollback to savepoint {SAVEPOINT}")).await {
					warn!(target: TARGET, "Could not roll back a failed statement: {r}");
				}
				Err(e)
			}
		}
	}

	fn statements(&self) -> usize {
		self.statements.load(Ordering::Relaxed)
	}
}

impl Drop for RequestContext {
	fn drop(&mut self) {
		if !*self.open.get_mut() {
			return;
		}
		debug!(target: TARGET, "A request was abandoned with its transaction open");
		let cancel = self.cancel.clone();
		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if let Err(e) = cancel.cancel_query(NoTls).await {
					warn!(target: TARGET, "Could not cancel an abandoned statement: {e}");
				}
			});
		}
		if let Some(client) = self.client.get_mut().take() {
			drop(Object::take(client));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dbs::{PoolOptions, pool};

	#[test]
	fn setups_become_one_statement() {
		let setup = Setup {
			role: Some("viewer".into()),
			claims: vec![("sub".into(), "42".into())],
			statement_timeout: Some(Duration::from_secs(3)),
		};
		let (sql, params) = setup.statement().unwrap();
		assert_eq!(sql, "select set_config($1, $2, true), set_config($3, $4, true), set_config($5, $6, true)");
		assert_eq!(params, vec!["role", "viewer", "jwt.claims.sub", "42", "statement_timeout", "3000"]);
		assert!(Setup::default().statement().is_none());
	}

	#[test_log::test(tokio::test)]
	async fn unreachable_databases_fail_to_begin() {
		let opts = PoolOptions {
			wait_timeout: Duration::from_secs(2),
			..Default::default()
		};
		let pool = pool("postgres://nobody@127.0.0.1:1/none", &opts).unwrap();
		assert!(RequestContext::begin(&pool, &Setup::default()).await.is_err());
	}
}
