//! Request time: turning GraphQL selections into SQL and the results back
//! into GraphQL values.
//!
//! Only the fields of the root types reach the database. A root resolver
//! flattens its selection into a [`plan::Selection`] tree, compiles the tree
//! into a single statement producing one JSON document, and every nested
//! field then reads its value from that document by response key.

pub mod cursor;
pub mod error;
pub mod execute;
mod filter;
pub mod plan;
pub mod resolve;
pub mod schema;
pub mod sql;
pub mod value;

use std::sync::Arc;

use crate::build::Blueprint;
use crate::catalog::Catalog;

const TARGET: &str = "pgql::core::gql";

/// A JSON document produced by a root resolver, or a part of one.
#[derive(Clone, Debug, PartialEq)]
pub struct Row(pub serde_json::Value);

/// What the resolvers of one schema share.
#[derive(Debug)]
pub struct Engine {
	pub catalog: Arc<Catalog>,
	pub blueprint: Arc<Blueprint>,
}

impl Engine {
	pub fn new(catalog: Arc<Catalog>, blueprint: Arc<Blueprint>) -> Self {
		Self {
			catalog,
			blueprint,
		}
	}
}
