use std::path::PathBuf;

use clap::Args;
use pgql_core::build::plugins::by_name;
use pgql_core::build::{BuildOptions, LegacyRelations, PluginList, SimpleCollections};
use pgql_core::export::ExportOptions;
use pgql_core::introspect::IntrospectionOptions;
use pgql_core::live::ManagerOptions;

use crate::dbs::DbsOptions;
use crate::err::Error;

#[derive(Args, Debug)]
pub struct SchemaOptions {
	#[arg(help = "Whether collections are exposed as connections (omit), simple lists (only) or both")]
	#[arg(env = "PGQL_SIMPLE_COLLECTIONS", long = "simple-collections", default_value = "omit")]
	#[arg(value_parser = super::validator::simple_collections)]
	pub simple_collections: SimpleCollections,
	#[arg(help = "Only expose what the request roles are granted")]
	#[arg(env = "PGQL_NO_IGNORE_RBAC", long = "no-ignore-rbac")]
	pub no_ignore_rbac: bool,
	#[arg(help = "Only expose filters and orderings which an index supports")]
	#[arg(env = "PGQL_NO_IGNORE_INDEXES", long = "no-ignore-indexes")]
	pub no_ignore_indexes: bool,
	#[arg(help = "Also expose the resources which extensions own")]
	#[arg(env = "PGQL_INCLUDE_EXTENSION_RESOURCES", long = "include-extension-resources")]
	pub include_extension_resources: bool,
	#[arg(help = "Do not generate the create, update and delete mutations")]
	#[arg(env = "PGQL_DISABLE_DEFAULT_MUTATIONS", long = "disable-default-mutations")]
	pub disable_default_mutations: bool,
	#[arg(help = "Expose json columns as structured values instead of strings")]
	#[arg(env = "PGQL_DYNAMIC_JSON", long = "dynamic-json")]
	pub dynamic_json: bool,
	#[arg(help = "Mark the items of set returning functions as non-null")]
	#[arg(env = "PGQL_NO_SETOF_FUNCTIONS_CONTAIN_NULLS", long = "no-setof-functions-contain-nulls")]
	pub no_setof_functions_contain_nulls: bool,
	#[arg(help = "How one-to-one backward relations are exposed: omit, deprecated or only")]
	#[arg(env = "PGQL_LEGACY_RELATIONS", long = "legacy-relations", default_value = "deprecated")]
	#[arg(value_parser = super::validator::legacy_relations)]
	pub legacy_relations: LegacyRelations,
	#[arg(help = "Plugins which run after the standard ones")]
	#[arg(env = "PGQL_APPEND_PLUGINS", long = "append-plugins", value_delimiter = ',')]
	#[arg(value_parser = super::validator::plugin)]
	pub append_plugins: Vec<String>,
	#[arg(help = "Plugins which run before the standard ones")]
	#[arg(env = "PGQL_PREPEND_PLUGINS", long = "prepend-plugins", value_delimiter = ',')]
	#[arg(value_parser = super::validator::plugin)]
	pub prepend_plugins: Vec<String>,
	#[arg(help = "Standard plugins which do not run")]
	#[arg(env = "PGQL_SKIP_PLUGINS", long = "skip-plugins", value_delimiter = ',')]
	pub skip_plugins: Vec<String>,
	#[arg(help = "The smart tags file")]
	#[arg(env = "PGQL_TAGS_FILE", long = "tags-file")]
	pub tags_file: Option<PathBuf>,
	#[arg(help = "Read the catalog from this file instead of introspecting the database")]
	#[arg(env = "PGQL_READ_CACHE", long = "read-cache")]
	#[arg(value_parser = super::validator::file_exists)]
	pub read_cache: Option<PathBuf>,
	#[arg(help = "Write the introspected catalog to this file")]
	#[arg(env = "PGQL_WRITE_CACHE", long = "write-cache")]
	pub write_cache: Option<PathBuf>,
	#[arg(help = "Write the introspection result of the schema to this file")]
	#[arg(env = "PGQL_EXPORT_SCHEMA_JSON", long = "export-schema-json")]
	pub export_schema_json: Option<PathBuf>,
	#[arg(help = "Write the schema definition language of the schema to this file")]
	#[arg(env = "PGQL_EXPORT_SCHEMA_GRAPHQL", long = "export-schema-graphql")]
	pub export_schema_graphql: Option<PathBuf>,
	#[arg(help = "Sort the members of the exported schema by name")]
	#[arg(env = "PGQL_SORT_EXPORT", long = "sort-export")]
	pub sort_export: bool,
	#[arg(help = "Rebuild the schema when the database catalog changes")]
	#[arg(env = "PGQL_WATCH", short = 'w', long = "watch")]
	pub watch: bool,
	#[arg(help = "Keep retrying the initial schema build instead of exiting")]
	#[arg(env = "PGQL_RETRY_ON_INIT_FAIL", long = "retry-on-init-fail")]
	pub retry_on_init_fail: bool,
}

impl SchemaOptions {
	fn plugins(&self) -> Result<PluginList, Error> {
		let named = |name: &String| by_name(name).ok_or_else(|| Error::Config(format!("Unknown plugin '{name}'")));
		let mut plugins = PluginList::standard();
		for name in self.prepend_plugins.iter() {
			plugins = plugins.with_prepend(named(name)?);
		}
		for name in self.append_plugins.iter() {
			plugins = plugins.with_append(named(name)?);
		}
		for name in self.skip_plugins.iter() {
			plugins = plugins.with_skip(name.as_str());
		}
		Ok(plugins)
	}

	/// Everything a schema build needs, reading the catalog through `dbs`.
	pub fn manager(&self, dbs: &DbsOptions) -> Result<ManagerOptions, Error> {
		Ok(ManagerOptions {
			connection: dbs.connection.clone(),
			owner_connection: dbs.owner_connection.clone(),
			introspection: IntrospectionOptions {
				schemas: dbs.schemas.clone(),
				include_extension_resources: self.include_extension_resources,
			},
			build: BuildOptions {
				simple_collections: self.simple_collections,
				ignore_rbac: !self.no_ignore_rbac,
				ignore_indexes: !self.no_ignore_indexes,
				include_extension_resources: self.include_extension_resources,
				disable_default_mutations: self.disable_default_mutations,
				dynamic_json: self.dynamic_json,
				setof_functions_contain_nulls: !self.no_setof_functions_contain_nulls,
				legacy_relations: self.legacy_relations,
			},
			plugins: self.plugins()?,
			tags_file: self.tags_file.clone(),
			read_cache: self.read_cache.clone(),
			write_cache: self.write_cache.clone(),
			export: ExportOptions {
				graphql: self.export_schema_graphql.clone(),
				json: self.export_schema_json.clone(),
				sort: self.sort_export,
			},
			watch: self.watch,
			retry_on_init_fail: self.retry_on_init_fail,
		})
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		dbs: DbsOptions,
		#[command(flatten)]
		schema: SchemaOptions,
	}

	#[test]
	fn flags_invert_into_build_options() {
		let cli = Cli::parse_from([
			"pgql",
			"--schema",
			"app,app_private",
			"--no-ignore-rbac",
			"--simple-collections",
			"both",
			"--legacy-relations",
			"omit",
		]);
		let opts = cli.schema.manager(&cli.dbs).unwrap();
		assert_eq!(opts.introspection.schemas, vec!["app".to_owned(), "app_private".to_owned()]);
		assert!(!opts.build.ignore_rbac);
		assert!(opts.build.ignore_indexes);
		assert!(opts.build.setof_functions_contain_nulls);
		assert_eq!(opts.build.simple_collections, SimpleCollections::Both);
		assert_eq!(opts.build.legacy_relations, LegacyRelations::Omit);
		assert!(opts.export.is_empty());
	}

	#[test]
	fn unknown_plugins_are_refused() {
		assert!(Cli::try_parse_from(["pgql", "--append-plugins", "PgMadeUp"]).is_err());
		let cli = Cli::parse_from(["pgql", "--append-plugins", "PgNonNullRelations"]);
		assert!(cli.schema.manager(&cli.dbs).is_ok());
	}
}
