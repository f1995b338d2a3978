//! Request authentication: which role a request runs as, and which claims it
//! exposes to the database.

mod jwt;

pub use jsonwebtoken::Algorithm;

pub use self::jwt::{Claims, JwtOptions, Verifier};
use crate::gql::error::GqlError;

const TARGET: &str = "pgql::core::iam";

/// Resolves the role and claims of a request from its bearer token, if any.
///
/// A request without a token runs as `default_role`, as does a valid token
/// without a role claim. A token is refused when no verifier is configured.
pub fn authenticate(
	verifier: Option<&Verifier>,
	token: Option<&str>,
	default_role: Option<&str>,
) -> Result<Claims, GqlError> {
	let mut claims = match (token, verifier) {
		(None, _) => Claims::default(),
		(Some(_), None) => {
			return Err(GqlError::Authorization("Not allowed to provide a JWT token.".to_owned()));
		}
		(Some(token), Some(verifier)) => verifier.verify(token)?,
	};
	if claims.role.is_none() {
		claims.role = default_role.map(str::to_owned);
	}
	trace!(target: TARGET, "Authenticated a request as {:?}", claims.role);
	Ok(claims)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn anonymous_requests_get_the_default_role() {
		let claims = authenticate(None, None, Some("anonymous")).unwrap();
		assert_eq!(claims.role.as_deref(), Some("anonymous"));
		assert!(claims.claims.is_empty());
		assert_eq!(authenticate(None, None, None).unwrap().role, None);
	}

	#[test]
	fn tokens_need_a_verifier() {
		let err = authenticate(None, Some("a.b.c"), Some("anonymous")).unwrap_err();
		assert!(matches!(err, GqlError::Authorization(_)));
	}
}
