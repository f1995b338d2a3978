use std::str::FromStr;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{Client, Config, NoTls};

use super::TARGET;
use crate::err::{Error, config_error};

/// The limits of the request connection pool.
#[derive(Clone, Debug)]
pub struct PoolOptions {
	pub max_size: usize,
	/// How long a request waits for a free connection
	pub wait_timeout: Duration,
}

impl Default for PoolOptions {
	fn default() -> Self {
		Self {
			max_size: 10,
			wait_timeout: Duration::from_secs(30),
		}
	}
}

/// Creates the request connection pool. Connections are opened lazily.
pub fn pool(url: &str, opts: &PoolOptions) -> Result<Pool, Error> {
	let config = Config::from_str(url)?;
	let manager = Manager::from_config(config, NoTls, ManagerConfig {
		recycling_method: RecyclingMethod::Fast,
	});
	Pool::builder(manager)
		.max_size(opts.max_size)
		.wait_timeout(Some(opts.wait_timeout))
		.runtime(Runtime::Tokio1)
		.build()
		.map_err(|e| config_error(format!("Could not create the connection pool: {e}")))
}

/// Opens a dedicated connection, driven on its own task.
pub async fn connect(url: &str) -> Result<Client, Error> {
	let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
	tokio::spawn(async move {
		if let Err(e) = connection.await {
			warn!(target: TARGET, "A database connection closed with an error: {e}");
		}
	});
	Ok(client)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_urls_fail() {
		assert!(pool("postgres://localhost:notaport/db", &PoolOptions::default()).is_err());
	}

	#[tokio::test]
	async fn pools_are_lazy() {
		let pool = pool("postgres://nobody@127.0.0.1:1/none", &PoolOptions::default()).unwrap();
		assert_eq!(pool.status().size, 0);
		assert_eq!(pool.status().max_size, 10);
	}
}
