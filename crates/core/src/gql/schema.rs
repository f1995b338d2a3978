use std::sync::Arc;

use async_graphql::SDLExportOptions;
use async_graphql::dynamic::Schema;

use crate::build::Blueprint;
use crate::catalog::Catalog;

/// An executable schema, with what its resolvers were built from.
#[derive(Clone)]
pub struct BuiltSchema {
	pub schema: Schema,
	pub catalog: Arc<Catalog>,
	pub blueprint: Arc<Blueprint>,
}

impl BuiltSchema {
	/// The schema definition, in registration order.
	pub fn sdl(&self) -> String {
		self.schema.sdl()
	}

	/// The schema definition with types, fields, arguments and enum values in
	/// lexicographic order.
	pub fn sorted_sdl(&self) -> String {
		let opts = SDLExportOptions::new().sorted_fields().sorted_arguments().sorted_enum_items();
		self.schema.sdl_with_options(opts)
	}
}

impl std::fmt::Debug for BuiltSchema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BuiltSchema").field("types", &self.blueprint.objects.len()).finish_non_exhaustive()
	}
}
