#![allow(dead_code)]

use std::sync::Arc;

use async_graphql::{Request, Response};
use deadpool_postgres::Pool;
use pgql_core::build::BuildOptions;
use pgql_core::dbs::{PoolOptions, connect, pool};
use pgql_core::gql::execute::{RequestSettings, execute};
use pgql_core::gql::schema::BuiltSchema;
use pgql_core::introspect::IntrospectionOptions;
use pgql_core::live::{ManagerOptions, SchemaManager};
use serde_json::Value as Json;

pub const SCHEMA: &str = "pgql_test";

pub const READER: &str = "pgql_test_reader";

const FIXTURES: &str = "
	drop schema if exists pgql_test cascade;
	create schema pgql_test;
	create table pgql_test.t (
		id serial primary key,
		name text not null,
		parent_id int references pgql_test.t (id)
	);
	comment on table pgql_test.t is 'A self referencing table.';
	insert into pgql_test.t (id, name, parent_id) values (1, 'root', null), (2, 'child', 1), (3, 'leaf', 2);
	select setval('pgql_test.t_id_seq', 3);
	do $$ begin
		if not exists (select 1 from pg_catalog.pg_roles where rolname = 'pgql_test_reader') then
			create role pgql_test_reader nologin;
		end if;
	end $$;
	grant pgql_test_reader to current_user;
	grant usage on schema pgql_test to pgql_test_reader;
	grant select (id, name) on pgql_test.t to pgql_test_reader;
";

/// The database the live tests run against, when one is configured.
pub fn database_url() -> Option<String> {
	std::env::var("PGQL_TEST_DATABASE_URL").ok().filter(|url| !url.is_empty())
}

/// Recreates the test schema and its rows.
pub async fn setup(url: &str) {
	let client = connect(url).await.unwrap();
	client.batch_execute(FIXTURES).await.unwrap();
}

pub fn manager_options(url: &str) -> ManagerOptions {
	ManagerOptions {
		connection: url.to_owned(),
		introspection: IntrospectionOptions {
			schemas: vec![SCHEMA.to_owned()],
			..Default::default()
		},
		build: BuildOptions::default(),
		..Default::default()
	}
}

pub async fn build(opts: ManagerOptions) -> BuiltSchema {
	SchemaManager::new(opts).build_once().await.unwrap()
}

pub fn request_pool(url: &str) -> Pool {
	pool(url, &PoolOptions::default()).unwrap()
}

pub struct Harness {
	pub schema: Arc<BuiltSchema>,
	pub pool: Pool,
	pub settings: RequestSettings,
}

impl Harness {
	pub async fn new(url: &str) -> Self {
		setup(url).await;
		Self {
			schema: Arc::new(build(manager_options(url)).await),
			pool: request_pool(url),
			settings: RequestSettings::default(),
		}
	}

	pub async fn run(&self, query: &str) -> Response {
		execute(&self.schema, &self.pool, &self.settings, Request::new(query), None).await
	}

	/// Runs an operation which must succeed, returning its data.
	pub async fn data(&self, query: &str) -> Json {
		let response = self.run(query).await;
		assert!(response.errors.is_empty(), "{query}: {:?}", response.errors);
		response.data.into_json().unwrap()
	}
}
