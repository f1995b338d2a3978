use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use pgql_core::iam::{Algorithm, JwtOptions, Verifier};

use crate::err::Error;

const TARGET: &str = "pgql::iam";

#[derive(Args, Debug)]
pub struct AuthOptions {
	#[arg(help = "The role requests run as when their token names none")]
	#[arg(env = "PGQL_DEFAULT_ROLE", long = "default-role")]
	pub default_role: Option<String>,
	#[arg(help = "The secret which verifies HMAC signed tokens")]
	#[arg(env = "PGQL_JWT_SECRET", long = "jwt-secret", hide_env_values = true)]
	pub jwt_secret: Option<String>,
	#[arg(help = "A PEM file holding the public key which verifies RSA or EC signed tokens")]
	#[arg(env = "PGQL_JWT_PUBLIC_KEY", long = "jwt-public-key")]
	#[arg(value_parser = crate::cli::validator::file_exists)]
	pub jwt_public_key: Option<PathBuf>,
	#[arg(help = "The signature algorithms tokens may use")]
	#[arg(env = "PGQL_JWT_VERIFY_ALGORITHMS", long = "jwt-verify-algorithms")]
	#[arg(value_delimiter = ',', value_parser = crate::cli::validator::algorithm)]
	pub jwt_verify_algorithms: Vec<Algorithm>,
	#[arg(help = "The audiences tokens must be issued for")]
	#[arg(env = "PGQL_JWT_VERIFY_AUDIENCE", long = "jwt-verify-audience")]
	#[arg(value_delimiter = ',', default_value = "postgraphile")]
	pub jwt_verify_audience: Vec<String>,
	#[arg(help = "The issuers tokens must come from")]
	#[arg(env = "PGQL_JWT_VERIFY_ISSUER", long = "jwt-verify-issuer", value_delimiter = ',')]
	pub jwt_verify_issuer: Vec<String>,
	#[arg(help = "How much clock skew is tolerated when checking token times")]
	#[arg(env = "PGQL_JWT_VERIFY_CLOCK_TOLERANCE", long = "jwt-verify-clock-tolerance")]
	#[arg(value_parser = crate::cli::validator::duration, default_value = "0s")]
	pub jwt_verify_clock_tolerance: Duration,
	#[arg(help = "The subject tokens must be issued for")]
	#[arg(env = "PGQL_JWT_VERIFY_SUBJECT", long = "jwt-verify-subject")]
	pub jwt_verify_subject: Option<String>,
	#[arg(help = "Accept tokens which have expired")]
	#[arg(env = "PGQL_JWT_VERIFY_IGNORE_EXPIRATION", long = "jwt-verify-ignore-expiration")]
	pub jwt_verify_ignore_expiration: bool,
	#[arg(help = "Accept tokens which are not valid yet")]
	#[arg(env = "PGQL_JWT_VERIFY_IGNORE_NOT_BEFORE", long = "jwt-verify-ignore-not-before")]
	pub jwt_verify_ignore_not_before: bool,
	#[arg(help = "The path of claims leading to the role in a token")]
	#[arg(env = "PGQL_JWT_ROLE", long = "jwt-role", value_delimiter = ',', default_value = "role")]
	pub jwt_role: Vec<String>,
}

impl AuthOptions {
	/// Creates the token verifier, if tokens are accepted at all.
	pub async fn verifier(&self) -> Result<Option<Arc<Verifier>>, Error> {
		let public_key = match &self.jwt_public_key {
			Some(path) => Some(tokio::fs::read_to_string(path).await?),
			None => None,
		};
		if self.jwt_secret.is_none() && public_key.is_none() {
			debug!(target: TARGET, "No token verification key, requests with a token are refused");
			return Ok(None);
		}
		let opts = JwtOptions {
			secret: self.jwt_secret.clone(),
			public_key,
			algorithms: self.jwt_verify_algorithms.clone(),
			audience: self.jwt_verify_audience.clone(),
			issuer: self.jwt_verify_issuer.clone(),
			subject: self.jwt_verify_subject.clone(),
			clock_tolerance: self.jwt_verify_clock_tolerance,
			ignore_expiration: self.jwt_verify_ignore_expiration,
			ignore_not_before: self.jwt_verify_ignore_not_before,
			role_claim: self.jwt_role.clone(),
		};
		Ok(Some(Arc::new(Verifier::new(&opts)?)))
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		auth: AuthOptions,
	}

	#[tokio::test]
	async fn no_key_means_no_verifier() {
		let cli = Cli::parse_from(["pgql"]);
		assert_eq!(cli.auth.jwt_role, vec!["role".to_owned()]);
		assert_eq!(cli.auth.jwt_verify_audience, vec!["postgraphile".to_owned()]);
		assert!(cli.auth.verifier().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn secrets_make_a_verifier() {
		let cli = Cli::parse_from(["pgql", "--jwt-secret", "hunter2", "--jwt-role", "app,role"]);
		assert_eq!(cli.auth.jwt_role, vec!["app".to_owned(), "role".to_owned()]);
		assert!(cli.auth.verifier().await.unwrap().is_some());
	}

	#[tokio::test]
	async fn missing_keys_are_configuration_errors() {
		let cli = Cli::parse_from(["pgql", "--jwt-secret", "hunter2", "--jwt-verify-algorithms", "RS256"]);
		assert!(cli.auth.verifier().await.is_err());
	}
}
