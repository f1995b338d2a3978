mod common;

mod http_integration {
	use std::net::TcpListener;
	use std::process::{Child, Command, Stdio};
	use std::time::Duration;

	use serde_json::{Value, json};
	use serial_test::serial;
	use test_log::test;

	use crate::common::{self, SCHEMA, database_url};

	/// A running server, killed when dropped.
	struct Server {
		child: Child,
		addr: String,
	}

	impl Drop for Server {
		fn drop(&mut self) {
			let _ = self.child.kill();
			let _ = self.child.wait();
		}
	}

	fn free_port() -> u16 {
		TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
	}

	async fn start(url: &str, extra: &[&str]) -> Server {
		let addr = format!("127.0.0.1:{}", free_port());
		let child = Command::new(env!("CARGO_BIN_EXE_pgql"))
			.args(["start", "--no-banner", "--log", "warn", "--connection", url, "--schema", SCHEMA, "--bind", &addr])
			.args(extra)
			.stdout(Stdio::null())
			.spawn()
			.unwrap();
		let server = Server {
			child,
			addr,
		};
		let health = format!("http://{}/health", server.addr);
		for _ in 0..100 {
			if let Ok(res) = reqwest::get(&health).await {
				if res.status().is_success() {
					return server;
				}
			}
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
		panic!("the server did not become healthy");
	}

	async fn post(server: &Server, body: Value, token: Option<&str>) -> (u16, Value) {
		let client = reqwest::Client::new();
		let mut req = client.post(format!("http://{}/graphql", server.addr)).json(&body);
		if let Some(token) = token {
			req = req.bearer_auth(token);
		}
		let res = req.send().await.unwrap();
		let status = res.status().as_u16();
		(status, res.json().await.unwrap())
	}

	#[test(tokio::test)]
	#[serial]
	async fn operations_are_served_over_http() {
		let Some(url) = database_url() else {
			return;
		};
		common::setup(&url).await;
		let server = start(&url, &[]).await;
		let (status, body) = post(&server, json!({ "query": "{ tById(id: 2) { name } }" }), None).await;
		assert_eq!(status, 200);
		assert_eq!(body, json!({ "data": { "tById": { "name": "child" } } }));
		let graphiql = reqwest::get(format!("http://{}/graphiql", server.addr)).await.unwrap();
		assert_eq!(graphiql.status().as_u16(), 200);
	}

	#[test(tokio::test)]
	#[serial]
	async fn batches_are_refused_unless_enabled() {
		let Some(url) = database_url() else {
			return;
		};
		common::setup(&url).await;
		let batch = json!([{ "query": "{ a: tById(id: 1) { name } }" }, { "query": "{ b: tById(id: 3) { name } }" }]);
		let server = start(&url, &[]).await;
		let (status, _) = post(&server, batch.clone(), None).await;
		assert_eq!(status, 400);
		drop(server);
		let server = start(&url, &["--enable-query-batching"]).await;
		let (status, body) = post(&server, batch, None).await;
		assert_eq!(status, 200);
		assert_eq!(body[0]["data"]["a"]["name"], "root");
		assert_eq!(body[1]["data"]["b"]["name"], "leaf");
	}

	#[test(tokio::test)]
	#[serial]
	async fn invalid_tokens_are_unauthorized() {
		let Some(url) = database_url() else {
			return;
		};
		common::setup(&url).await;
		let server = start(&url, &["--jwt-secret", "integration"]).await;
		let (status, body) = post(&server, json!({ "query": "{ allTs { totalCount } }" }), Some("not.a.token")).await;
		assert_eq!(status, 200);
		assert_eq!(body["data"], Value::Null);
		assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
	}
}
