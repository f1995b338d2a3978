use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::{AppState, TARGET};
use crate::err::Error;

#[derive(Serialize)]
struct Health {
	status: &'static str,
	state: String,
}

pub(super) fn router(state: Arc<AppState>) -> Router {
	Router::new().route("/health", get(handler)).with_state(state)
}

async fn handler(State(state): State<Arc<AppState>>) -> Result<Json<Health>, Error> {
	// A published schema is served even while a rebuild runs
	if state.manager.schema().is_none() {
		return Err(Error::SchemaUnavailable);
	}
	// Check that a connection can be handed out
	if let Err(e) = state.pool.get().await {
		warn!(target: TARGET, "Health check could not reach the database: {e}");
		return Err(Error::DatabaseUnavailable);
	}
	Ok(Json(Health {
		status: "ok",
		state: format!("{:?}", state.manager.state()),
	}))
}
