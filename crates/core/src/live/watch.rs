use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinError;
use tokio_postgres::{AsyncMessage, NoTls};

use super::{SchemaManager, TARGET, backoff};
use crate::build::types::ident;
use crate::cnf::{WATCH_CHANNEL, WATCH_SCHEMA};
use crate::dbs::connect;
use crate::err::Error;

/// The commands after which the catalog may have changed.
const DDL_TAGS: [&str; 39] = [
	"ALTER AGGREGATE",
	"ALTER DOMAIN",
	"ALTER EXTENSION",
	"ALTER FOREIGN TABLE",
	"ALTER FUNCTION",
	"ALTER POLICY",
	"ALTER SCHEMA",
	"ALTER TABLE",
	"ALTER TYPE",
	"ALTER VIEW",
	"COMMENT",
	"CREATE AGGREGATE",
	"CREATE DOMAIN",
	"CREATE EXTENSION",
	"CREATE FOREIGN TABLE",
	"CREATE FUNCTION",
	"CREATE INDEX",
	"CREATE POLICY",
	"CREATE RULE",
	"CREATE SCHEMA",
	"CREATE TABLE",
	"CREATE TABLE AS",
	"CREATE VIEW",
	"DROP AGGREGATE",
	"DROP DOMAIN",
	"DROP EXTENSION",
	"DROP FOREIGN TABLE",
	"DROP FUNCTION",
	"DROP INDEX",
	"DROP OWNED",
	"DROP POLICY",
	"DROP RULE",
	"DROP SCHEMA",
	"DROP TABLE",
	"DROP TYPE",
	"DROP VIEW",
	"GRANT",
	"REVOKE",
	"SELECT INTO",
];

/// The event triggers which notify the watch channel of DDL.
pub fn fixtures() -> String {
	let schema = ident(WATCH_SCHEMA);
	let channel = WATCH_CHANNEL.replace('\'', "''");
	let tags = DDL_TAGS.iter().map(|t| format!("'{t}'")).collect::<Vec<_>>().join(", ");
	format!(
		"begin;
create schema if not exists {schema};
create or replace function {schema}.notify_watchers_ddl() returns event_trigger as $$
begin
  perform pg_notify('{channel}', json_build_object('type', 'ddl', 'payload', (select json_agg(json_build_object('schema', schema_name, 'command', command_tag)) from pg_event_trigger_ddl_commands() as x))::text);
end;
$$ language plpgsql;
create or replace function {schema}.notify_watchers_drop() returns event_trigger as $$
begin
  perform pg_notify('{channel}', json_build_object('type', 'drop', 'payload', (select json_agg(distinct x.schema_name) from pg_event_trigger_dropped_objects() as x))::text);
end;
$$ language plpgsql;
drop event trigger if exists postgraphile_watch_ddl;
create event trigger postgraphile_watch_ddl on ddl_command_end when tag in ({tags}) execute procedure {schema}.notify_watchers_ddl();
drop event trigger if exists postgraphile_watch_drop;
create event trigger postgraphile_watch_drop on sql_drop execute procedure {schema}.notify_watchers_drop();
commit;"
	)
}

/// Installs the watch fixtures. Failure only means changes go unnoticed.
pub(super) async fn install(url: &str) {
	let result = async {
		let client = connect(url).await?;
		client.batch_execute(&fixtures()).await?;
		Ok::<_, Error>(())
	}
	.await;
	match result {
		Ok(()) => info!(target: TARGET, "Installed the watch fixtures"),
		Err(e) => warn!(
			target: TARGET,
			"Could not install the watch fixtures, schema changes may go unnoticed. Installing them may need a superuser: {e}"
		),
	}
}

/// Listens on the watch channel until the connection is lost, triggering a
/// rebuild for every notification.
async fn listen(url: &str, manager: &Arc<SchemaManager>) -> Result<(), Error> {
	let (client, mut connection) = tokio_postgres::connect(url, NoTls).await?;
	let mut messages = Box::pin(futures::stream::poll_fn(move |cx| connection.poll_message(cx)));
	let notified = manager.clone();
	let listening = tokio::spawn(async move {
		while let Some(message) = messages.next().await {
			match message {
				Ok(AsyncMessage::Notification(n)) => {
					debug!(target: TARGET, "Received a catalog change: {}", n.payload());
					notified.trigger();
				}
				Ok(_) => {}
				Err(e) => {
					warn!(target: TARGET, "The watch connection failed: {e}");
					break;
				}
			}
		}
	});
	client.batch_execute(&format!("listen {}", ident(&WATCH_CHANNEL))).await?;
	info!(target: TARGET, "Watching the catalog for changes");
	let stopped = listening.await;
	drop(client);
	ended(stopped)
}

/// A listener task that panicked or was cancelled is an error, for the
/// caller to log and reconnect.
fn ended(result: Result<(), JoinError>) -> Result<(), Error> {
	Ok(result.map_err(std::io::Error::from)?)
}

/// Keeps a listener running, reconnecting with backoff. A reconnect triggers
/// a rebuild, as changes may have been missed meanwhile.
pub(super) async fn run(url: String, manager: Arc<SchemaManager>) {
	let mut attempt = 0;
	loop {
		match listen(&url, &manager).await {
			Ok(()) => attempt = 0,
			Err(e) => warn!(target: TARGET, "Could not listen for catalog changes: {e}"),
		}
		tokio::time::sleep(backoff::rebuild_delay(attempt)).await;
		attempt = attempt.saturating_add(1);
		manager.trigger();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixtures_notify_the_channel() {
		let sql = fixtures();
		assert!(sql.contains("create schema if not exists \"postgraphile_watch\""));
		assert!(sql.contains("perform pg_notify('postgraphile_watch'"));
		assert!(sql.contains("on ddl_command_end when tag in ('ALTER AGGREGATE',"));
		assert!(sql.ends_with("commit;"));
	}

	#[tokio::test]
	async fn panicked_listeners_are_errors() {
		assert!(ended(tokio::spawn(async {}).await).is_ok());
		let panicked = tokio::spawn(async { panic!("listener") }).await;
		assert!(matches!(ended(panicked), Err(Error::Io(_))));
	}
}
