use anyhow::Context;
use clap::Args;
use pgql_core::gql::execute::RequestSettings;
use pgql_core::live::SchemaManager;

use super::schema::SchemaOptions;
use crate::cnf::{LOGO, PKG_NAME, PKG_VERSION};
use crate::dbs::DbsOptions;
use crate::iam::AuthOptions;
use crate::net::{self, AppState, HttpOptions};

#[derive(Args, Debug)]
pub struct StartCommandArguments {
	#[command(flatten)]
	dbs: DbsOptions,
	#[command(flatten)]
	schema: SchemaOptions,
	#[command(flatten)]
	auth: AuthOptions,
	#[command(flatten)]
	http: HttpOptions,
	#[arg(help = "Whether to hide the startup banner")]
	#[arg(env = "PGQL_NO_BANNER", long)]
	no_banner: bool,
}

pub async fn init(
	StartCommandArguments {
		dbs,
		schema,
		auth,
		http,
		no_banner,
	}: StartCommandArguments,
) -> anyhow::Result<()> {
	// Check if a banner should be outputted
	if !no_banner {
		// Output the logo
		println!("{LOGO}");
	}
	info!("Running {PKG_NAME} {PKG_VERSION}");
	// Prepare the request settings first, so bad keys fail fast
	let settings = RequestSettings {
		default_role: auth.default_role.clone(),
		verifier: auth.verifier().await.context("Invalid token verification settings")?,
		statement_timeout: dbs.statement_timeout,
		show_error_stack: http.show_error_stack,
		extended_errors: http.extended_errors,
	};
	let pool = dbs.pool().context("Invalid connection settings")?;
	// Build the first schema
	let manager = SchemaManager::new(schema.manager(&dbs)?);
	manager.start().await.context("The initial schema build failed")?;
	// Start the web server
	let state = AppState {
		manager,
		pool,
		settings,
		batching: http.enable_query_batching,
		log_queries: !http.disable_query_log,
	};
	net::init(&http, state).await?;
	Ok(())
}
