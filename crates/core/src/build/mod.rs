//! The schema build pipeline.
//!
//! A build runs the tagged catalog through an ordered list of [`Plugin`]s.
//! Each plugin registers typed hooks, and the hooks of one kind run in plugin
//! order over an explicit [`BuildContext`]:
//!
//! 1. `build` and `init` hooks register the types.
//! 2. `object_fields`, `field_args`, `input_fields` and `enum_values` hooks
//!    fill in each type, one type at a time, in registration order.
//! 3. `schema` hooks refine the complete description, which is then
//!    materialized into an `async_graphql` dynamic schema.

pub mod context;
pub mod hooks;
mod materialize;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod source;
pub mod types;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

pub use self::context::BuildContext;
pub use self::hooks::Hooks;
pub use self::plugin::{Plugin, PluginList};
pub use self::registry::Registry;
pub use self::source::Blueprint;
use self::registry::{FieldScope, Members, TypeSpec};
use crate::catalog::{Catalog, Tags};
use crate::err::{Error, config_error};
use crate::gql::schema::BuiltSchema;

const TARGET: &str = "pgql::core::build";

/// Whether collections are exposed as connections, simple lists or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimpleCollections {
	#[default]
	Omit,
	Both,
	Only,
}

impl SimpleCollections {
	/// The mode of one entity, after its `@simpleCollections` tag.
	pub fn for_tags(self, tags: &Tags) -> Self {
		tags.string("simpleCollections").and_then(|v| v.parse().ok()).unwrap_or(self)
	}

	pub fn connections(&self) -> bool {
		!matches!(self, SimpleCollections::Only)
	}

	pub fn lists(&self) -> bool {
		!matches!(self, SimpleCollections::Omit)
	}
}

impl FromStr for SimpleCollections {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"omit" => Ok(Self::Omit),
			"both" => Ok(Self::Both),
			"only" => Ok(Self::Only),
			_ => Err(config_error(format!("Unknown collection mode '{s}'"))),
		}
	}
}

/// How one-to-one backward relations are exposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LegacyRelations {
	/// Only the single record field
	Omit,
	/// The single record field, plus the collection marked deprecated
	#[default]
	Deprecated,
	/// Only the collection
	Only,
}

impl FromStr for LegacyRelations {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"omit" => Ok(Self::Omit),
			"deprecated" => Ok(Self::Deprecated),
			"only" => Ok(Self::Only),
			_ => Err(config_error(format!("Unknown legacy relations mode '{s}'"))),
		}
	}
}

#[derive(Clone, Debug)]
pub struct BuildOptions {
	pub simple_collections: SimpleCollections,
	pub ignore_rbac: bool,
	pub ignore_indexes: bool,
	pub include_extension_resources: bool,
	pub disable_default_mutations: bool,
	pub dynamic_json: bool,
	pub setof_functions_contain_nulls: bool,
	pub legacy_relations: LegacyRelations,
}

impl Default for BuildOptions {
	fn default() -> Self {
		Self {
			simple_collections: SimpleCollections::Omit,
			ignore_rbac: true,
			ignore_indexes: true,
			include_extension_resources: false,
			disable_default_mutations: false,
			dynamic_json: false,
			setof_functions_contain_nulls: true,
			legacy_relations: LegacyRelations::Deprecated,
		}
	}
}

/// The complete schema description handed to the `schema` hooks.
#[derive(Clone, Debug)]
pub struct SchemaSpec {
	pub query: String,
	pub mutation: Option<String>,
	pub registry: Registry,
}

/// Attributes a schema build failure to the plugin whose hook raised it.
fn within<T>(plugin: &str, result: Result<T, Error>) -> Result<T, Error> {
	result.map_err(|e| match e {
		Error::SchemaBuild(msg) => Error::SchemaBuild(format!("{msg} (in {plugin})")),
		e => e,
	})
}

/// Builds a GraphQL schema from a tagged catalog.
pub fn build_schema(
	catalog: Arc<Catalog>,
	options: &BuildOptions,
	plugins: &PluginList,
) -> Result<BuiltSchema, Error> {
	let started = Instant::now();
	let stages = plugins.resolve()?;
	let mut hooks = Hooks::default();
	for stage in stages.iter() {
		hooks.enter(stage.name());
		stage.register(&mut hooks);
	}
	debug!(target: TARGET, "Building schema with {} plugins", stages.len());
	let mut ctx = BuildContext::new(catalog.clone(), options.clone());
	for h in hooks.build.iter().chain(hooks.init.iter()) {
		within(&h.plugin, (h.hook)(&mut ctx))?;
		ctx.version += 1;
	}
	for name in ctx.registry.names() {
		let Some(spec) = ctx.registry.get_mut(&name) else {
			continue;
		};
		match spec {
			TypeSpec::Object(obj) => {
				let scope = obj.scope.clone();
				let mut fields = std::mem::replace(&mut obj.fields, Members::new(name.clone()));
				for h in hooks.object_fields.iter() {
					fields = within(&h.plugin, (h.hook)(fields, &scope, &ctx))?;
				}
				let mut done = Members::new(name.clone());
				for mut field in fields {
					let mut args = std::mem::replace(&mut field.args, Members::new(field.name.clone()));
					let field_scope = FieldScope {
						object: &scope,
						field: &field,
					};
					for h in hooks.field_args.iter() {
						args = within(&h.plugin, (h.hook)(args, &field_scope, &ctx))?;
					}
					field.args = args;
					done.add(field)?;
				}
				if let Some(TypeSpec::Object(obj)) = ctx.registry.get_mut(&name) {
					obj.fields = done;
				}
			}
			TypeSpec::Input(input) => {
				let scope = input.scope.clone();
				let mut fields = std::mem::replace(&mut input.fields, Members::new(name.clone()));
				for h in hooks.input_fields.iter() {
					fields = within(&h.plugin, (h.hook)(fields, &scope, &ctx))?;
				}
				if let Some(TypeSpec::Input(input)) = ctx.registry.get_mut(&name) {
					input.fields = fields;
				}
			}
			TypeSpec::Enum(e) => {
				let scope = e.scope.clone();
				let mut values = std::mem::replace(&mut e.values, Members::new(name.clone()));
				for h in hooks.enum_values.iter() {
					values = within(&h.plugin, (h.hook)(values, &scope, &ctx))?;
				}
				if let Some(TypeSpec::Enum(e)) = ctx.registry.get_mut(&name) {
					e.values = values;
				}
			}
			TypeSpec::Scalar(_) => continue,
		}
		ctx.version += 1;
	}
	let mut spec = SchemaSpec {
		query: plugins::QUERY.to_owned(),
		mutation: Some(plugins::MUTATION.to_owned()),
		registry: std::mem::take(&mut ctx.registry),
	};
	for h in hooks.schema.iter() {
		spec = within(&h.plugin, (h.hook)(spec, &ctx))?;
		ctx.version += 1;
	}
	let types = spec.registry.len();
	let built = materialize::materialize(spec, catalog, options)?;
	info!(
		target: TARGET,
		"Built a schema with {types} types in {:?}",
		started.elapsed()
	);
	Ok(built)
}
