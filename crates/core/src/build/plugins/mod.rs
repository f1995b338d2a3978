//! The standard build stages, plus the optional ones selectable by name.

mod backward;
mod columns;
mod computed;
mod conditions;
mod connections;
mod crud;
mod filter;
mod finalize;
mod forward;
mod mutation_procs;
mod non_null_relations;
mod order_by;
mod query_procs;
mod rbac;
mod row_by_key;
mod standard_types;
mod tables;

use std::sync::Arc;

use async_graphql::dynamic::TypeRef;

pub use self::backward::PgBackwardRelations;
pub use self::columns::PgColumns;
pub use self::computed::PgComputedColumns;
pub use self::conditions::PgConditions;
pub use self::connections::PgConnections;
pub use self::crud::{PgMutationCreate, PgMutationUpdateDelete};
pub use self::filter::PgConnectionFilter;
pub use self::finalize::{BUILTIN_SCALARS, SchemaFinalize};
pub use self::forward::PgForwardRelations;
pub use self::mutation_procs::PgMutationProcedures;
pub use self::non_null_relations::PgNonNullRelations;
pub use self::order_by::{NATURAL, PRIMARY_KEY_ASC, PRIMARY_KEY_DESC, PgOrderBy};
pub use self::query_procs::PgQueryProcedures;
pub use self::rbac::PgRbacPruning;
pub use self::row_by_key::PgRowByUniqueKey;
pub use self::standard_types::StandardTypes;
pub use self::tables::PgTables;
use super::context::BuildContext;
use super::plugin::Plugin;
use super::registry::{ArgSpec, FieldSpec, Members};
use super::source::{ArgSource, FieldSource, Shape};
use super::types::non_null;
use crate::catalog::{Class, Procedure};
use crate::err::Error;

pub const QUERY: &str = "Query";
pub const MUTATION: &str = "Mutation";
pub const PAGE_INFO: &str = "PageInfo";

/// The standard stages, in order.
pub fn standard() -> Vec<Arc<dyn Plugin>> {
	vec![
		Arc::new(StandardTypes),
		Arc::new(PgTables),
		Arc::new(PgColumns),
		Arc::new(PgConnections),
		Arc::new(PgOrderBy),
		Arc::new(PgConditions),
		Arc::new(PgConnectionFilter),
		Arc::new(PgRowByUniqueKey),
		Arc::new(PgForwardRelations),
		Arc::new(PgBackwardRelations),
		Arc::new(PgComputedColumns),
		Arc::new(PgQueryProcedures),
		Arc::new(PgMutationProcedures),
		Arc::new(PgMutationCreate),
		Arc::new(PgMutationUpdateDelete),
		Arc::new(PgRbacPruning),
		Arc::new(SchemaFinalize),
	]
}

/// The optional stages which can be prepended or appended by name.
pub fn by_name(name: &str) -> Option<Arc<dyn Plugin>> {
	match name {
		"PgNonNullRelations" => Some(Arc::new(PgNonNullRelations)),
		_ => None,
	}
}

/// The class whose rows a collection field pages through, and whether the
/// rows come from a procedure, in which case their order is natural.
pub(crate) fn collection_class<'a>(
	ctx: &'a BuildContext,
	source: &FieldSource,
) -> Option<(&'a Class, bool)> {
	match source {
		FieldSource::AllRows {
			class,
			shape,
		} if *shape != Shape::Single => ctx.catalog.class(*class).map(|c| (c, false)),
		FieldSource::BackwardRelation {
			constraint,
			shape,
		} if *shape != Shape::Single => {
			let c = ctx.catalog.constraint(*constraint)?;
			ctx.catalog.class(c.class_id).map(|c| (c, false))
		}
		FieldSource::ComputedColumn {
			proc,
			shape,
		}
		| FieldSource::Procedure {
			proc,
			shape,
		} if *shape != Shape::Single => {
			let proc = ctx.catalog.procedure(*proc)?;
			ctx.returned_class(proc).map(|c| (c, true))
		}
		_ => None,
	}
}

/// Adds the fields exposing a procedure result: a single value, or a
/// connection and/or a list of values per the collection mode.
pub(crate) fn add_procedure_fields(
	fields: &mut Members<FieldSpec>,
	ctx: &BuildContext,
	proc: &Procedure,
	name: String,
	list_name: String,
	skip: usize,
	make: impl Fn(Shape) -> FieldSource,
) -> Result<(), Error> {
	let class = ctx.returned_class(proc);
	let item = match class {
		Some(class) => TypeRef::named(ctx.inflector.table_type(class)),
		None => match ctx.output_type(proc.return_type_id) {
			Some(ty) => ty,
			None => return Ok(()),
		},
	};
	let args = procedure_args(ctx, proc, skip);
	let description = proc.description.clone();
	let deprecation = proc.tags.string("deprecated").map(str::to_owned);
	let mut add = |name: String, ty: TypeRef, shape: Shape| -> Result<(), Error> {
		let mut field = FieldSpec::new(name, ty, make(shape))
			.describe(description.clone())
			.deprecate(deprecation.clone());
		for arg in args.iter() {
			field = field.arg(arg.clone())?;
		}
		fields.add(field)
	};
	if !proc.returns_set {
		return add(name, item, Shape::Single);
	}
	let mode = ctx.options.simple_collections.for_tags(&proc.tags);
	let item = match ctx.options.setof_functions_contain_nulls {
		true => item,
		false => non_null(item),
	};
	if mode.connections() {
		let connection = match class {
			Some(class) => ctx.inflector.connection(class),
			None => ctx.inflector.scalar_connection(proc),
		};
		if ctx.registry.contains(&connection) {
			add(name, TypeRef::named_nn(connection), Shape::Connection)?;
		}
	}
	if mode.lists() {
		add(list_name, non_null(TypeRef::List(Box::new(item))), Shape::List)?;
	}
	Ok(())
}

/// The arguments of a procedure, without the first `skip` ones.
pub(crate) fn procedure_args(
	ctx: &BuildContext,
	proc: &Procedure,
	skip: usize,
) -> Vec<ArgSpec> {
	let mut args = vec![];
	for arg in proc.input_args().into_iter().skip(skip) {
		let Some(ty) = ctx.input_type(arg.type_id) else {
			continue;
		};
		let name = ctx.inflector.argument(arg.name, arg.index);
		args.push(ArgSpec::new(name, super::types::nullable(ty), ArgSource::ProcArg {
			index: arg.index,
		}));
	}
	args
}

/// Whether a procedure is a computed column of `class` returning one scalar
/// from the row alone, so rows can be ordered or filtered by it.
pub(crate) fn is_scalar_computed(ctx: &BuildContext, proc: &Procedure, class: &Class) -> bool {
	!proc.is_mutation()
		&& !proc.returns_set
		&& ctx.is_exposable(proc)
		&& ctx.is_computed_column_of(proc, class)
		&& proc.input_args().len() == 1
		&& ctx.returned_class(proc).is_none()
}

#[cfg(test)]
pub(crate) mod testing {
	//! Builds schemas from fixture catalogs for the stage tests.

	use std::sync::Arc;

	use crate::build::{BuildOptions, PluginList, build_schema};
	use crate::catalog::Catalog;
	use crate::gql::schema::BuiltSchema;

	pub fn build(catalog: Catalog, options: BuildOptions) -> BuiltSchema {
		build_schema(Arc::new(catalog.link().unwrap()), &options, &PluginList::standard()).unwrap()
	}

	pub fn sdl(catalog: Catalog, options: BuildOptions) -> String {
		build(catalog, options).sdl()
	}
}
