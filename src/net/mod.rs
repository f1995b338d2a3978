mod health;
mod signals;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::http::GraphiQLSource;
use axum::error_handling::HandleErrorLayer;
use axum::response::Html;
use axum::routing::{get, post_service};
use axum::{BoxError, Router};
use clap::Args;
use deadpool_postgres::Pool;
use http::StatusCode;
use http::header::AUTHORIZATION;
use pgql_core::gql::execute::RequestSettings;
use pgql_core::live::SchemaManager;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::cnf::{DEFAULT_BIND, DEFAULT_BODY_SIZE_LIMIT, DEFAULT_GRAPHIQL_ROUTE, DEFAULT_GRAPHQL_ROUTE};
use crate::err::Error;
use crate::gql::GraphQL;

const TARGET: &str = "pgql::net";

#[derive(Args, Debug)]
pub struct HttpOptions {
	#[arg(help = "The hostname or IP address to listen for connections on")]
	#[arg(env = "PGQL_BIND", short = 'b', long = "bind", default_value = DEFAULT_BIND)]
	pub bind: SocketAddr,
	#[arg(help = "The route which serves GraphQL requests")]
	#[arg(env = "PGQL_GRAPHQL_ROUTE", long = "graphql", default_value = DEFAULT_GRAPHQL_ROUTE)]
	pub graphql: String,
	#[arg(help = "The route which serves the GraphiQL explorer")]
	#[arg(env = "PGQL_GRAPHIQL_ROUTE", long = "graphiql", default_value = DEFAULT_GRAPHIQL_ROUTE)]
	pub graphiql: String,
	#[arg(help = "Do not serve the GraphiQL explorer")]
	#[arg(env = "PGQL_DISABLE_GRAPHIQL", long = "disable-graphiql")]
	pub disable_graphiql: bool,
	#[arg(help = "Allow requests from any origin")]
	#[arg(env = "PGQL_CORS", long = "cors")]
	pub cors: bool,
	#[arg(help = "The maximum size of a request body")]
	#[arg(env = "PGQL_BODY_SIZE_LIMIT", long = "body-size-limit", default_value = DEFAULT_BODY_SIZE_LIMIT)]
	#[arg(value_parser = crate::cli::validator::byte_size)]
	pub body_size_limit: usize,
	#[arg(help = "How long a request may take before it is abandoned")]
	#[arg(env = "PGQL_TIMEOUT", long = "timeout")]
	#[arg(value_parser = crate::cli::validator::duration)]
	pub timeout: Option<Duration>,
	#[arg(help = "Accept arrays of operations in one request")]
	#[arg(env = "PGQL_ENABLE_QUERY_BATCHING", long = "enable-query-batching")]
	pub enable_query_batching: bool,
	#[arg(help = "Do not log every GraphQL operation")]
	#[arg(env = "PGQL_DISABLE_QUERY_LOG", long = "disable-query-log")]
	pub disable_query_log: bool,
	#[arg(help = "Show the messages of internal errors to clients")]
	#[arg(env = "PGQL_SHOW_ERROR_STACK", long = "show-error-stack")]
	pub show_error_stack: bool,
	#[arg(help = "Add the database error detail to the error extensions")]
	#[arg(env = "PGQL_EXTENDED_ERRORS", long = "extended-errors")]
	pub extended_errors: bool,
}

/// What every request handler shares.
pub struct AppState {
	pub manager: Arc<SchemaManager>,
	pub pool: Pool,
	pub settings: RequestSettings,
	pub batching: bool,
	pub log_queries: bool,
}

fn router(opts: &HttpOptions, state: Arc<AppState>) -> Router {
	let graphql = post_service(GraphQL::new(state.clone()));
	let page = Html(GraphiQLSource::build().endpoint(&opts.graphql).finish());
	let graphiql = move || std::future::ready(page.clone());
	let router = match (opts.disable_graphiql, opts.graphiql == opts.graphql) {
		(true, _) => Router::new().route(&opts.graphql, graphql),
		(false, true) => Router::new().route(&opts.graphql, graphql.get(graphiql)),
		(false, false) => Router::new().route(&opts.graphql, graphql).route(&opts.graphiql, get(graphiql)),
	};
	let router = router
		.merge(health::router(state))
		.layer(RequestBodyLimitLayer::new(opts.body_size_limit))
		.layer(CatchPanicLayer::new())
		.layer(TraceLayer::new_for_http())
		.layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]));
	let router = match opts.cors {
		true => router.layer(CorsLayer::permissive()),
		false => router,
	};
	match opts.timeout {
		Some(timeout) => router.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(|_: BoxError| async { StatusCode::REQUEST_TIMEOUT }))
				.layer(TimeoutLayer::new(timeout)),
		),
		None => router,
	}
}

pub async fn init(opts: &HttpOptions, state: AppState) -> Result<(), Error> {
	let router = router(opts, Arc::new(state));
	let listener = TcpListener::bind(opts.bind).await?;
	info!(target: TARGET, "Started web server on {}", opts.bind);
	info!(target: TARGET, "GraphQL endpoint: http://{}{}", opts.bind, opts.graphql);
	if !opts.disable_graphiql {
		info!(target: TARGET, "GraphiQL: http://{}{}", opts.bind, opts.graphiql);
	}
	axum::serve(listener, router).with_graceful_shutdown(signals::shutdown()).await?;
	info!(target: TARGET, "Web server stopped. Bye!");
	Ok(())
}

#[cfg(test)]
mod tests {
	use axum::body::Body;
	use clap::Parser;
	use http::Request;
	use pgql_core::dbs::{PoolOptions, pool};
	use pgql_core::live::ManagerOptions;
	use tower::ServiceExt;

	use super::*;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		http: HttpOptions,
	}

	fn state() -> Arc<AppState> {
		Arc::new(AppState {
			manager: SchemaManager::new(ManagerOptions::default()),
			pool: pool("postgres://localhost/nothing", &PoolOptions::default()).unwrap(),
			settings: RequestSettings::default(),
			batching: false,
			log_queries: false,
		})
	}

	async fn status(router: Router, method: &str, uri: &str) -> StatusCode {
		let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
		router.oneshot(req).await.unwrap().status()
	}

	#[test]
	fn defaults() {
		let cli = Cli::parse_from(["pgql"]);
		assert_eq!(cli.http.bind.to_string(), "127.0.0.1:5000");
		assert_eq!(cli.http.graphql, "/graphql");
		assert_eq!(cli.http.graphiql, "/graphiql");
		assert_eq!(cli.http.body_size_limit, 102_400);
		assert!(cli.http.timeout.is_none());
	}

	#[tokio::test]
	async fn graphiql_is_served_unless_disabled() {
		let cli = Cli::parse_from(["pgql"]);
		assert_eq!(status(router(&cli.http, state()), "GET", "/graphiql").await, StatusCode::OK);
		let cli = Cli::parse_from(["pgql", "--disable-graphiql"]);
		assert_eq!(status(router(&cli.http, state()), "GET", "/graphiql").await, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn graphiql_can_share_the_graphql_route() {
		let cli = Cli::parse_from(["pgql", "--graphiql", "/graphql"]);
		assert_eq!(status(router(&cli.http, state()), "GET", "/graphql").await, StatusCode::OK);
	}

	#[tokio::test]
	async fn health_reports_an_unready_schema() {
		let cli = Cli::parse_from(["pgql", "--timeout", "5s"]);
		assert_eq!(status(router(&cli.http, state()), "GET", "/health").await, StatusCode::SERVICE_UNAVAILABLE);
	}
}
