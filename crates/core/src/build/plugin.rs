use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::hooks::Hooks;
use super::plugins;
use crate::err::{Error, schema_error};

/// A named stage of the schema build.
pub trait Plugin: Send + Sync {
	fn name(&self) -> &str;

	/// Adds this stage's callbacks to the hook lists.
	fn register(&self, hooks: &mut Hooks);
}

/// The ordered stages of a schema build.
#[derive(Clone, Default)]
pub struct PluginList {
	prepend: Vec<Arc<dyn Plugin>>,
	append: Vec<Arc<dyn Plugin>>,
	skip: Vec<String>,
}

impl fmt::Debug for PluginList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PluginList")
			.field("prepend", &self.prepend.iter().map(|p| p.name()).collect::<Vec<_>>())
			.field("append", &self.append.iter().map(|p| p.name()).collect::<Vec<_>>())
			.field("skip", &self.skip)
			.finish()
	}
}

impl PluginList {
	/// The standard stages, unmodified.
	pub fn standard() -> Self {
		Self::default()
	}

	pub fn with_prepend(mut self, plugin: Arc<dyn Plugin>) -> Self {
		self.prepend.push(plugin);
		self
	}

	pub fn with_append(mut self, plugin: Arc<dyn Plugin>) -> Self {
		self.append.push(plugin);
		self
	}

	pub fn with_skip(mut self, name: impl Into<String>) -> Self {
		self.skip.push(name.into());
		self
	}

	/// Computes the final stage order: prepended, standard, then appended
	/// stages, without the skipped ones.
	pub fn resolve(&self) -> Result<Vec<Arc<dyn Plugin>>, Error> {
		let all: Vec<Arc<dyn Plugin>> = self
			.prepend
			.iter()
			.cloned()
			.chain(plugins::standard())
			.chain(self.append.iter().cloned())
			.collect();
		let mut names = HashSet::new();
		for p in all.iter() {
			if !names.insert(p.name().to_owned()) {
				return Err(schema_error(format!("Plugin '{}' is listed more than once", p.name())));
			}
		}
		for s in self.skip.iter() {
			if !names.contains(s) {
				return Err(schema_error(format!("Cannot skip unknown plugin '{s}'")));
			}
		}
		Ok(all.into_iter().filter(|p| !self.skip.iter().any(|s| s == p.name())).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Named(&'static str);

	impl Plugin for Named {
		fn name(&self) -> &str {
			self.0
		}

		fn register(&self, _: &mut Hooks) {}
	}

	fn names(list: &PluginList) -> Vec<String> {
		list.resolve().unwrap().iter().map(|p| p.name().to_owned()).collect()
	}

	#[test]
	fn standard_order() {
		let names = names(&PluginList::standard());
		assert_eq!(names.first().map(String::as_str), Some("StandardTypes"));
		assert_eq!(names.last().map(String::as_str), Some("SchemaFinalize"));
		assert_eq!(names.len(), 17);
	}

	#[test]
	fn prepend_append_and_skip() {
		let list = PluginList::standard()
			.with_prepend(Arc::new(Named("First")))
			.with_append(Arc::new(Named("Last")))
			.with_skip("PgConnectionFilter");
		let names = names(&list);
		assert_eq!(names[0], "First");
		assert_eq!(names[names.len() - 1], "Last");
		assert!(!names.iter().any(|n| n == "PgConnectionFilter"));
	}

	#[test]
	fn unknown_skip_fails() {
		let err = PluginList::standard().with_skip("Nope").resolve().err().unwrap();
		assert!(matches!(err, Error::SchemaBuild(_)));
	}

	#[test]
	fn duplicate_names_fail() {
		let list = PluginList::standard().with_append(Arc::new(Named("PgTables")));
		assert!(list.resolve().is_err());
	}
}
