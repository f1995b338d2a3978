//! Database access at request time.
//!
//! Resolvers never see a connection. They receive an [`Arc<dyn Session>`]
//! through the request data and send it compiled statements, which lets the
//! tests substitute a recording session for a live transaction.

mod context;
mod pool;

use async_trait::async_trait;
use serde_json::Value as Json;

pub use self::context::{RequestContext, Setup};
pub use self::pool::{PoolOptions, connect, pool};
use crate::gql::error::GqlError;
use crate::gql::sql::Statement;

const TARGET: &str = "pgql::core::dbs";

/// Runs the statements of one GraphQL request.
#[async_trait]
pub trait Session: Send + Sync {
	/// Runs a statement producing a `"value"` column, and returns that column
	/// of the first row, or `None` when there is no row.
	async fn fetch(&self, statement: &Statement) -> Result<Option<Json>, GqlError>;

	/// The number of statements run so far.
	fn statements(&self) -> usize;
}
