use std::sync::LazyLock;

/// The publicly visible name of the server
pub const SERVER_NAME: &str = "pgql";

/// The notification channel which the watch fixtures publish DDL events on.
pub static WATCH_CHANNEL: LazyLock<String> =
	lazy_env_parse!("PGQL_WATCH_CHANNEL", String, || "postgraphile_watch".to_string());

/// The schema which holds the watch fixtures.
pub const WATCH_SCHEMA: &str = "postgraphile_watch";

/// The initial delay, in milliseconds, before a failed schema build is retried.
pub static REBUILD_BACKOFF_BASE_MS: LazyLock<u64> =
	lazy_env_parse!("PGQL_REBUILD_BACKOFF_BASE_MS", u64, 250);

/// The maximum delay, in milliseconds, between two schema build attempts.
pub static REBUILD_BACKOFF_MAX_MS: LazyLock<u64> =
	lazy_env_parse!("PGQL_REBUILD_BACKOFF_MAX_MS", u64, 30_000);

/// Postgres functions accept at most 100 arguments, so an object builder call
/// can carry at most 50 key/value pairs.
pub static MAX_JSON_FIELDS_PER_CALL: LazyLock<usize> =
	lazy_env_parse!("PGQL_MAX_JSON_FIELDS_PER_CALL", usize, 50);

/// The tags file which is loaded when none is given explicitly, if it exists.
pub static DEFAULT_TAGS_FILE: LazyLock<String> =
	lazy_env_parse!("PGQL_DEFAULT_TAGS_FILE", String, || "postgraphile.tags.json".to_string());

/// The maximum nesting depth of an incoming GraphQL operation.
pub static MAX_QUERY_DEPTH: LazyLock<usize> = lazy_env_parse!("PGQL_MAX_QUERY_DEPTH", usize, 64);

/// The message shown to clients in place of an internal error.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";
