use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value as Json;

use super::TARGET;
use crate::err::{Error, config_error};
use crate::gql::error::GqlError;

/// How bearer tokens are verified.
#[derive(Clone, Debug)]
pub struct JwtOptions {
	/// The shared secret of the HMAC algorithms
	pub secret: Option<String>,
	/// A PEM encoded public key, for the other algorithms
	pub public_key: Option<String>,
	/// The accepted algorithms, HS256 or RS256 when empty
	pub algorithms: Vec<Algorithm>,
	/// Accepted `aud` values, any when empty
	pub audience: Vec<String>,
	/// Accepted `iss` values, any when empty
	pub issuer: Vec<String>,
	pub subject: Option<String>,
	pub clock_tolerance: Duration,
	pub ignore_expiration: bool,
	pub ignore_not_before: bool,
	/// The path to the role in the claims
	pub role_claim: Vec<String>,
}

impl Default for JwtOptions {
	fn default() -> Self {
		Self {
			secret: None,
			public_key: None,
			algorithms: vec![],
			audience: vec!["postgraphile".to_owned()],
			issuer: vec![],
			subject: None,
			clock_tolerance: Duration::ZERO,
			ignore_expiration: false,
			ignore_not_before: false,
			role_claim: vec!["role".to_owned()],
		}
	}
}

/// The identity a verified token grants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Claims {
	pub role: Option<String>,
	/// Every top level claim, as text
	pub claims: Vec<(String, String)>,
}

fn key(algo: Algorithm, opts: &JwtOptions) -> Result<DecodingKey, Error> {
	let pem = |what: &str| {
		opts.public_key
			.as_deref()
			.map(str::as_bytes)
			.ok_or_else(|| config_error(format!("{what} tokens need a public key")))
	};
	let key = match algo {
		Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
			let secret = opts
				.secret
				.as_deref()
				.ok_or_else(|| config_error("HMAC tokens need a secret"))?;
			return Ok(DecodingKey::from_secret(secret.as_bytes()));
		}
		Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem("ECDSA")?),
		Algorithm::EdDSA => DecodingKey::from_ed_pem(pem("EdDSA")?),
		_ => DecodingKey::from_rsa_pem(pem("RSA")?),
	};
	key.map_err(|e| config_error(format!("Invalid JWT public key: {e}")))
}

/// Checks bearer tokens and extracts their claims.
pub struct Verifier {
	key: DecodingKey,
	validation: Validation,
	role_claim: Vec<String>,
}

impl Verifier {
	pub fn new(opts: &JwtOptions) -> Result<Self, Error> {
		let mut algorithms = opts.algorithms.clone();
		if algorithms.is_empty() {
			algorithms.push(match opts.secret.is_some() {
				true => Algorithm::HS256,
				false => Algorithm::RS256,
			});
		}
		let key = key(algorithms[0], opts)?;
		let mut validation = Validation::new(algorithms[0]);
		validation.algorithms = algorithms;
		validation.required_spec_claims.clear();
		validation.leeway = opts.clock_tolerance.as_secs();
		validation.validate_exp = !opts.ignore_expiration;
		validation.validate_nbf = !opts.ignore_not_before;
		match opts.audience.is_empty() {
			true => validation.validate_aud = false,
			false => validation.set_audience(&opts.audience),
		}
		if !opts.issuer.is_empty() {
			validation.set_issuer(&opts.issuer);
		}
		validation.sub = opts.subject.clone();
		Ok(Self {
			key,
			validation,
			role_claim: opts.role_claim.clone(),
		})
	}

	pub fn verify(&self, token: &str) -> Result<Claims, GqlError> {
		let data = decode::<Json>(token, &self.key, &self.validation).map_err(|e| {
			debug!(target: TARGET, "Refused a token: {e}");
			let msg = match e.kind() {
				ErrorKind::ExpiredSignature => "jwt expired".to_owned(),
				ErrorKind::ImmatureSignature => "jwt not active".to_owned(),
				ErrorKind::InvalidAudience => "jwt audience invalid".to_owned(),
				ErrorKind::InvalidIssuer => "jwt issuer invalid".to_owned(),
				ErrorKind::InvalidSubject => "jwt subject invalid".to_owned(),
				_ => format!("invalid token: {e}"),
			};
			GqlError::Authorization(msg)
		})?;
		let Json::Object(map) = data.claims else {
			return Err(GqlError::Authorization("invalid token: the claims are not an object".to_owned()));
		};
		let mut role = map.get(self.role_claim.first().map(String::as_str).unwrap_or("role"));
		for part in self.role_claim.iter().skip(1) {
			role = role.and_then(|v| v.get(part));
		}
		let role = match role {
			None | Some(Json::Null) => None,
			Some(Json::String(s)) => Some(s.clone()),
			Some(v) => {
				return Err(GqlError::Authorization(format!("invalid token: the role claim is not a string: {v}")));
			}
		};
		let claims = map
			.into_iter()
			.filter(|(_, v)| !v.is_null())
			.map(|(k, v)| match v {
				Json::String(s) => (k, s),
				v => (k, v.to_string()),
			})
			.collect();
		Ok(Claims {
			role,
			claims,
		})
	}
}

#[cfg(test)]
mod tests {
	use jsonwebtoken::{EncodingKey, Header, encode};
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	const SECRET: &str = "s3cr3t";

	fn sign(claims: Json) -> String {
		encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
	}

	fn verifier(opts: JwtOptions) -> Verifier {
		Verifier::new(&JwtOptions {
			secret: Some(SECRET.into()),
			..opts
		})
		.unwrap()
	}

	fn now() -> i64 {
		std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64
	}

	#[test]
	fn roles_and_claims_are_read() {
		let token = sign(json!({ "aud": "postgraphile", "role": "editor", "user_id": 7, "exp": now() + 60 }));
		let claims = verifier(JwtOptions::default()).verify(&token).unwrap();
		assert_eq!(claims.role.as_deref(), Some("editor"));
		assert!(claims.claims.contains(&("user_id".to_owned(), "7".to_owned())));
		assert!(claims.claims.contains(&("role".to_owned(), "editor".to_owned())));
	}

	#[test]
	fn nested_role_claims() {
		let token = sign(json!({ "aud": "postgraphile", "https://x": { "role": "admin" } }));
		let v = verifier(JwtOptions {
			role_claim: vec!["https://x".into(), "role".into()],
			..Default::default()
		});
		assert_eq!(v.verify(&token).unwrap().role.as_deref(), Some("admin"));
	}

	#[rstest]
	#[case(json!({ "aud": "postgraphile", "exp": now() - 600 }), "jwt expired")]
	#[case(json!({ "aud": "someone-else" }), "jwt audience invalid")]
	#[case(json!({ "aud": "postgraphile", "role": 3 }), "invalid token: the role claim is not a string: 3")]
	fn bad_tokens_are_refused(#[case] claims: Json, #[case] message: &str) {
		let err = verifier(JwtOptions::default()).verify(&sign(claims)).unwrap_err();
		assert!(matches!(&err, GqlError::Authorization(m) if m == message), "{err}");
	}

	#[test]
	fn expiry_can_be_ignored() {
		let token = sign(json!({ "aud": "postgraphile", "exp": now() - 600 }));
		let v = verifier(JwtOptions {
			ignore_expiration: true,
			..Default::default()
		});
		assert!(v.verify(&token).is_ok());
	}

	#[test]
	fn forged_tokens_are_refused() {
		let token = encode(&Header::default(), &json!({ "aud": "postgraphile" }), &EncodingKey::from_secret(b"other"))
			.unwrap();
		assert!(verifier(JwtOptions::default()).verify(&token).is_err());
	}

	#[test]
	fn keys_must_match_the_algorithm() {
		assert!(Verifier::new(&JwtOptions::default()).is_err());
		let opts = JwtOptions {
			algorithms: vec![Algorithm::HS512],
			public_key: Some("pem".into()),
			..Default::default()
		};
		assert!(Verifier::new(&opts).is_err());
	}
}
