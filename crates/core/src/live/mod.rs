//! Owns the schema build cycle: the initial build, rebuilds on catalog
//! changes, retries and publication of the result.

mod backoff;
mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tokio::sync::{Notify, watch as state};

pub use self::backoff::delay;
pub use self::watch::fixtures;
use crate::build::{BuildOptions, PluginList, build_schema};
use crate::catalog::Catalog;
use crate::cnf::DEFAULT_TAGS_FILE;
use crate::dbs::connect;
use crate::err::Error;
use crate::export::{ExportOptions, export_schema};
use crate::gql::schema::BuiltSchema;
use crate::introspect::{IntrospectionOptions, introspect, read_cache, write_cache};
use crate::smart::{TagFile, apply_tags};

const TARGET: &str = "pgql::core::live";

/// The stage of the build cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
	Idle,
	Introspecting,
	Tagging,
	BuildingSchema,
	Ready,
	Failed,
}

/// Everything a build needs.
#[derive(Clone, Debug, Default)]
pub struct ManagerOptions {
	/// The database to introspect
	pub connection: String,
	/// The connection installing the watch fixtures, `connection` if unset
	pub owner_connection: Option<String>,
	pub introspection: IntrospectionOptions,
	pub build: BuildOptions,
	pub plugins: PluginList,
	/// The tags file, the default one if it exists when unset
	pub tags_file: Option<PathBuf>,
	/// Read the catalog from this file instead of the database
	pub read_cache: Option<PathBuf>,
	/// Write the introspected catalog to this file
	pub write_cache: Option<PathBuf>,
	pub export: ExportOptions,
	/// Rebuild when the catalog changes
	pub watch: bool,
	/// Retry a failed initial build instead of returning its error
	pub retry_on_init_fail: bool,
}

/// Builds schemas and publishes the latest good one.
///
/// The published schema is swapped atomically, so requests keep the
/// snapshot they loaded. Rebuild triggers arriving during a build are
/// coalesced into one follow-up rebuild.
pub struct SchemaManager {
	opts: ManagerOptions,
	current: ArcSwapOption<BuiltSchema>,
	state: state::Sender<BuildState>,
	pending: Notify,
}

impl SchemaManager {
	pub fn new(opts: ManagerOptions) -> Arc<Self> {
		Arc::new(Self {
			opts,
			current: ArcSwapOption::empty(),
			state: state::channel(BuildState::Idle).0,
			pending: Notify::new(),
		})
	}

	/// The published schema, if a build has succeeded yet.
	pub fn schema(&self) -> Option<Arc<BuiltSchema>> {
		self.current.load_full()
	}

	pub fn state(&self) -> BuildState {
		*self.state.borrow()
	}

	/// Observes the state changes of the build cycle.
	pub fn subscribe(&self) -> state::Receiver<BuildState> {
		self.state.subscribe()
	}

	/// Requests a rebuild.
	pub fn trigger(&self) {
		self.pending.notify_one();
	}

	fn enter(&self, state: BuildState) {
		trace!(target: TARGET, "Entering {state:?}");
		self.state.send_replace(state);
	}

	/// The explicit tags file, or the default one when it exists.
	async fn tags_file(&self) -> Option<PathBuf> {
		if let Some(path) = &self.opts.tags_file {
			return Some(path.clone());
		}
		let default = Path::new(DEFAULT_TAGS_FILE.as_str());
		tokio::fs::try_exists(default).await.ok().filter(|e| *e).map(|_| default.to_path_buf())
	}

	async fn catalog(&self) -> Result<Catalog, Error> {
		if let Some(path) = &self.opts.read_cache {
			return read_cache(path).await;
		}
		let mut client = connect(&self.opts.connection).await?;
		let catalog = introspect(&mut client, &self.opts.introspection).await?;
		if let Some(path) = &self.opts.write_cache {
			write_cache(path, &catalog).await?;
		}
		Ok(catalog)
	}

	/// Runs one build, moving through the build states. Publishes nothing.
	pub async fn build_once(&self) -> Result<BuiltSchema, Error> {
		let result = self.stages().await;
		if result.is_err() {
			self.enter(BuildState::Failed);
		}
		result
	}

	async fn stages(&self) -> Result<BuiltSchema, Error> {
		let started = Instant::now();
		self.enter(BuildState::Introspecting);
		let mut catalog = self.catalog().await?;
		self.enter(BuildState::Tagging);
		let file = match self.tags_file().await {
			Some(path) => match TagFile::load(&path).await {
				Ok(file) => Some(file),
				Err(e) => {
					warn!(target: TARGET, "Ignoring the tags file {}: {e}", path.display());
					None
				}
			},
			None => None,
		};
		let report = apply_tags(&mut catalog, file.as_ref());
		for key in report.unmatched.iter() {
			warn!(target: TARGET, "The tags file entry '{key}' matches nothing in the catalog");
		}
		self.enter(BuildState::BuildingSchema);
		let schema = build_schema(Arc::new(catalog), &self.opts.build, &self.opts.plugins)?;
		if !self.opts.export.is_empty() {
			export_schema(&schema, &self.opts.export).await?;
		}
		info!(target: TARGET, "Schema ready in {:?}", started.elapsed());
		Ok(schema)
	}

	fn publish(&self, schema: BuiltSchema) {
		self.current.store(Some(Arc::new(schema)));
		self.enter(BuildState::Ready);
	}

	/// Builds until a build succeeds, waiting out an increasing delay between
	/// attempts.
	async fn build_until_ready(&self) {
		let mut attempt = 0;
		loop {
			match self.build_once().await {
				Ok(schema) => return self.publish(schema),
				Err(e) => {
					let delay = backoff::rebuild_delay(attempt);
					warn!(target: TARGET, "Schema build failed, retrying in {delay:?}: {e}");
					tokio::time::sleep(delay).await;
					attempt = attempt.saturating_add(1);
				}
			}
		}
	}

	/// Runs the initial build, then starts watching when configured to.
	///
	/// Without `retry_on_init_fail`, the initial failure is returned.
	pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
		match self.opts.retry_on_init_fail {
			true => self.build_until_ready().await,
			false => {
				let schema = self.build_once().await?;
				self.publish(schema);
			}
		}
		if self.opts.watch {
			let url = self.opts.owner_connection.clone().unwrap_or_else(|| self.opts.connection.clone());
			watch::install(&url).await;
			tokio::spawn(watch::run(self.opts.connection.clone(), self.clone()));
			tokio::spawn(self.clone().rebuilds());
		}
		Ok(())
	}

	/// Serves rebuild triggers. A failed rebuild keeps the published schema
	/// and is retried.
	async fn rebuilds(self: Arc<Self>) {
		loop {
			self.pending.notified().await;
			info!(target: TARGET, "Rebuilding the schema");
			self.build_until_ready().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::fixture::self_referencing;
	use crate::introspect::write_cache;

	async fn cached() -> (tempfile::TempDir, ManagerOptions) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cache.json");
		write_cache(&path, &self_referencing().link().unwrap()).await.unwrap();
		let opts = ManagerOptions {
			read_cache: Some(path),
			tags_file: Some(dir.path().join("missing.tags.json")),
			..Default::default()
		};
		(dir, opts)
	}

	#[test_log::test(tokio::test)]
	async fn builds_publish_the_schema() {
		let (_dir, opts) = cached().await;
		let manager = SchemaManager::new(opts);
		let mut states = manager.subscribe();
		assert_eq!(manager.state(), BuildState::Idle);
		assert!(manager.schema().is_none());
		manager.start().await.unwrap();
		assert_eq!(manager.state(), BuildState::Ready);
		assert!(states.has_changed().unwrap());
		assert_eq!(*states.borrow_and_update(), BuildState::Ready);
		assert!(manager.schema().unwrap().sdl().contains("type T"));
	}

	#[tokio::test]
	async fn initial_failures_are_returned_without_retry() {
		let dir = tempfile::tempdir().unwrap();
		let manager = SchemaManager::new(ManagerOptions {
			read_cache: Some(dir.path().join("nothing.json")),
			..Default::default()
		});
		assert!(manager.start().await.is_err());
		assert_eq!(manager.state(), BuildState::Failed);
		assert!(manager.schema().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn initial_failures_are_retried() {
		let (dir, mut opts) = cached().await;
		let path = dir.path().join("late.json");
		opts.read_cache = Some(path.clone());
		opts.retry_on_init_fail = true;
		let manager = SchemaManager::new(opts);
		let mut states = manager.subscribe();
		let starting = tokio::spawn({
			let manager = manager.clone();
			async move { manager.start().await }
		});
		states.wait_for(|s| *s == BuildState::Failed).await.unwrap();
		tokio::fs::copy(dir.path().join("cache.json"), &path).await.unwrap();
		starting.await.unwrap().unwrap();
		assert_eq!(manager.state(), BuildState::Ready);
	}

	#[tokio::test]
	async fn triggers_are_coalesced() {
		let (_dir, opts) = cached().await;
		let manager = SchemaManager::new(opts);
		manager.trigger();
		manager.trigger();
		manager.trigger();
		manager.pending.notified().await;
		let second = tokio::time::timeout(std::time::Duration::from_millis(20), manager.pending.notified()).await;
		assert!(second.is_err());
	}
}
