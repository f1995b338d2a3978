use async_graphql::ErrorExtensions;
use thiserror::Error;

/// The `extensions.code` of an error in a GraphQL response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
	DatabaseConstraint,
	Timeout,
	Validation,
	Unauthorized,
	Internal,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::DatabaseConstraint => "DATABASE_CONSTRAINT",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::Validation => "VALIDATION",
			ErrorCode::Unauthorized => "UNAUTHORIZED",
			ErrorCode::Internal => "INTERNAL",
		}
	}
}

/// The fields of a database error which `extended_errors` exposes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DbDetail {
	pub errcode: String,
	pub detail: Option<String>,
	pub hint: Option<String>,
	pub constraint: Option<String>,
	pub table: Option<String>,
	pub column: Option<String>,
}

impl DbDetail {
	/// The extension keys carrying these fields.
	pub const KEYS: [&'static str; 6] = ["errcode", "detail", "hint", "constraint", "table", "column"];
}

/// An error raised while resolving a GraphQL request.
#[derive(Error, Debug)]
pub enum GqlError {
	/// The request is not valid against the schema or the data
	#[error("{0}")]
	Validation(String),

	/// The token is not valid, or the role cannot be assumed
	#[error("{0}")]
	Authorization(String),

	/// A statement or connection deadline passed
	#[error("{0}")]
	Timeout(String),

	/// A database error whose message is shown to clients
	#[error("{message}")]
	Database {
		code: ErrorCode,
		message: String,
		detail: Box<DbDetail>,
	},

	/// Anything else. The message is only shown with `show_error_stack`
	#[error("{0}")]
	Internal(String),
}

impl GqlError {
	pub fn code(&self) -> ErrorCode {
		match self {
			GqlError::Validation(_) => ErrorCode::Validation,
			GqlError::Authorization(_) => ErrorCode::Unauthorized,
			GqlError::Timeout(_) => ErrorCode::Timeout,
			GqlError::Database {
				code,
				..
			} => *code,
			GqlError::Internal(_) => ErrorCode::Internal,
		}
	}
}

pub fn validation_error(msg: impl Into<String>) -> GqlError {
	GqlError::Validation(msg.into())
}

pub fn internal_error(msg: impl Into<String>) -> GqlError {
	GqlError::Internal(msg.into())
}

/// The error for a filter or condition key which names no field.
pub fn unknown_field(name: &str) -> GqlError {
	GqlError::Validation(format!("Field `{name}` not found"))
}

impl From<tokio_postgres::Error> for GqlError {
	fn from(e: tokio_postgres::Error) -> Self {
		let Some(db) = e.as_db_error() else {
			return GqlError::Internal(e.to_string());
		};
		let sqlstate = db.code().code();
		let code = match sqlstate {
			"57014" => return GqlError::Timeout(db.message().to_owned()),
			"42501" => ErrorCode::Unauthorized,
			s if s.starts_with("23") => ErrorCode::DatabaseConstraint,
			s if s.starts_with("22") || s.starts_with("42") => ErrorCode::Validation,
			_ => return GqlError::Internal(db.message().to_owned()),
		};
		GqlError::Database {
			code,
			message: db.message().to_owned(),
			detail: Box::new(DbDetail {
				errcode: sqlstate.to_owned(),
				detail: db.detail().map(str::to_owned),
				hint: db.hint().map(str::to_owned),
				constraint: db.constraint().map(str::to_owned),
				table: db.table().map(str::to_owned),
				column: db.column().map(str::to_owned),
			}),
		}
	}
}

impl From<deadpool_postgres::PoolError> for GqlError {
	fn from(e: deadpool_postgres::PoolError) -> Self {
		match e {
			deadpool_postgres::PoolError::Timeout(_) => {
				GqlError::Timeout("Timed out waiting for a database connection".to_owned())
			}
			deadpool_postgres::PoolError::Backend(e) => e.into(),
			e => GqlError::Internal(e.to_string()),
		}
	}
}

impl From<GqlError> for async_graphql::Error {
	fn from(e: GqlError) -> Self {
		if let GqlError::Internal(msg) = &e {
			error!(target: super::TARGET, "Internal error while resolving a request: {msg}");
		}
		let code = e.code();
		let detail = match &e {
			GqlError::Database {
				detail,
				..
			} => Some(detail.clone()),
			_ => None,
		};
		async_graphql::Error::new(e.to_string()).extend_with(|_, ext| {
			ext.set("code", code.as_str());
			if let Some(d) = detail {
				ext.set("errcode", d.errcode.as_str());
				let optional = [
					("detail", &d.detail),
					("hint", &d.hint),
					("constraint", &d.constraint),
					("table", &d.table),
					("column", &d.column),
				];
				for (key, value) in optional {
					if let Some(v) = value {
						ext.set(key, v.as_str());
					}
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn errors_carry_their_code() {
		let err: async_graphql::Error = validation_error("Invalid cursor").into();
		assert_eq!(err.message, "Invalid cursor");
		let ext = err.extensions.unwrap();
		assert_eq!(ext.get("code"), Some(&async_graphql::Value::from("VALIDATION")));
	}

	#[test]
	fn database_errors_keep_their_detail() {
		let err: async_graphql::Error = GqlError::Database {
			code: ErrorCode::DatabaseConstraint,
			message: "duplicate key value violates unique constraint \"t_pkey\"".into(),
			detail: Box::new(DbDetail {
				errcode: "23505".into(),
				constraint: Some("t_pkey".into()),
				..Default::default()
			}),
		}
		.into();
		let ext = err.extensions.unwrap();
		assert_eq!(ext.get("code"), Some(&async_graphql::Value::from("DATABASE_CONSTRAINT")));
		assert_eq!(ext.get("errcode"), Some(&async_graphql::Value::from("23505")));
		assert_eq!(ext.get("constraint"), Some(&async_graphql::Value::from("t_pkey")));
		assert_eq!(ext.get("hint"), None);
	}

	#[test]
	fn unknown_fields_are_validation_errors() {
		let err = unknown_field("nope");
		assert_eq!(err.code(), ErrorCode::Validation);
		assert_eq!(err.to_string(), "Field `nope` not found");
	}
}
