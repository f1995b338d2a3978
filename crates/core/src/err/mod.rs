use thiserror::Error;

/// An error raised while building, caching or exporting a schema.
///
/// Errors raised while resolving a GraphQL request are
/// [`GqlError`](crate::gql::error::GqlError)s instead.
#[derive(Error, Debug)]
pub enum Error {
	/// The catalog could not be read, or what was read is inconsistent
	#[error("Introspection failed: {0}")]
	Introspection(String),

	/// A smart comment or tags file could not be parsed
	#[error("Could not parse smart tags: {0}")]
	TagParse(String),

	/// Two entities derive the same GraphQL name, or the plugin list is invalid
	#[error("Error generating schema: {0}")]
	SchemaBuild(String),

	/// A configuration value is not valid
	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("Database error: {0}")]
	Db(#[from] tokio_postgres::Error),

	#[error("Could not acquire a database connection: {0}")]
	Pool(#[from] deadpool_postgres::PoolError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Json(#[from] serde_json::Error),
}

pub fn introspection_error(msg: impl Into<String>) -> Error {
	Error::Introspection(msg.into())
}

pub fn tag_error(msg: impl Into<String>) -> Error {
	Error::TagParse(msg.into())
}

pub fn schema_error(msg: impl Into<String>) -> Error {
	Error::SchemaBuild(msg.into())
}

pub fn config_error(msg: impl Into<String>) -> Error {
	Error::Config(msg.into())
}
