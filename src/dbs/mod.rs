use std::time::Duration;

use clap::Args;
use deadpool_postgres::Pool;
use pgql_core::dbs::{PoolOptions, pool};
use pgql_core::err::Error;

const TARGET: &str = "pgql::dbs";

#[derive(Args, Debug)]
pub struct DbsOptions {
	#[arg(help = "The Postgres connection string to introspect and to run requests with")]
	#[arg(env = "PGQL_CONNECTION", short = 'c', long = "connection")]
	#[arg(default_value = "postgres://localhost/postgres")]
	pub connection: String,
	#[arg(help = "A privileged Postgres connection string which installs the watch fixtures")]
	#[arg(env = "PGQL_OWNER_CONNECTION", long = "owner-connection")]
	pub owner_connection: Option<String>,
	#[arg(help = "The Postgres schemas to expose")]
	#[arg(env = "PGQL_SCHEMA", short = 's', long = "schema")]
	#[arg(value_delimiter = ',', default_value = "public")]
	pub schemas: Vec<String>,
	#[arg(help = "The maximum number of connections in the request pool")]
	#[arg(env = "PGQL_MAX_POOL_SIZE", long = "max-pool-size", default_value_t = 10)]
	pub max_pool_size: usize,
	#[arg(help = "How long a request waits for a free connection")]
	#[arg(env = "PGQL_POOL_WAIT_TIMEOUT", long = "pool-wait-timeout")]
	#[arg(value_parser = crate::cli::validator::duration, default_value = "30s")]
	pub pool_wait_timeout: Duration,
	#[arg(help = "The statement timeout applied to every request transaction")]
	#[arg(env = "PGQL_STATEMENT_TIMEOUT", long = "statement-timeout")]
	#[arg(value_parser = crate::cli::validator::duration)]
	pub statement_timeout: Option<Duration>,
}

impl DbsOptions {
	/// Creates the request connection pool.
	pub fn pool(&self) -> Result<Pool, Error> {
		let opts = PoolOptions {
			max_size: self.max_pool_size,
			wait_timeout: self.pool_wait_timeout,
		};
		debug!(target: TARGET, "Request pool of up to {} connections", opts.max_size);
		pool(&self.connection, &opts)
	}
}
