use async_graphql::dynamic::TypeRef;

use super::PAGE_INFO;
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, CollectionOf, FieldScope, FieldSpec, Members, ObjectKind, ObjectScope, TypeSpec,
};
use crate::build::source::{ArgSource, FieldSource, Shape};
use crate::build::types::{CURSOR, non_null};
use crate::catalog::Omit;
use crate::err::Error;

/// Relay connections for every collection, the root `allXs` fields, and
/// the pagination arguments.
pub struct PgConnections;

impl Plugin for PgConnections {
	fn name(&self) -> &str {
		"PgConnections"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.object_fields(fields);
		hooks.field_args(args);
	}
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		if !ctx.is_record(class) {
			continue;
		}
		let node = TypeRef::named(ctx.inflector.table_type(class));
		let connection = ctx.inflector.connection(class);
		let edge = ctx.inflector.edge(class);
		register(ctx, connection, edge, CollectionOf::Class(class.id), node)?;
	}
	// Functions returning sets of scalars get a connection of their own
	for proc in catalog.procedures.iter() {
		if !proc.returns_set || proc.is_mutation() || !ctx.is_exposable(proc) {
			continue;
		}
		if ctx.returned_class(proc).is_some() {
			continue;
		}
		let Some(node) = ctx.output_type(proc.return_type_id) else {
			continue;
		};
		let node = match ctx.options.setof_functions_contain_nulls {
			true => node,
			false => non_null(node),
		};
		let connection = ctx.inflector.scalar_connection(proc);
		let edge = ctx.inflector.scalar_edge(proc);
		register(ctx, connection, edge, CollectionOf::Procedure(proc.id), node)?;
	}
	Ok(())
}

fn register(
	ctx: &mut BuildContext,
	connection: String,
	edge: String,
	of: CollectionOf,
	node: TypeRef,
) -> Result<(), Error> {
	let node_name = crate::build::registry::named(&node).to_owned();
	ctx.registry.register(TypeSpec::object(
		&connection,
		ObjectKind::Connection {
			of,
			node: node.clone(),
			edge: edge.clone(),
		},
		Some(format!("A connection to a list of `{node_name}` values.")),
	))?;
	ctx.registry.register(TypeSpec::object(
		&edge,
		ObjectKind::Edge {
			of,
			node,
		},
		Some(format!("A `{node_name}` edge in the connection.")),
	))
}

fn fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	match &scope.kind {
		ObjectKind::Connection {
			node,
			edge,
			..
		} => {
			let name = crate::build::registry::named(node);
			fields.add(
				FieldSpec::new("nodes", non_null(TypeRef::List(Box::new(node.clone()))), FieldSource::Nodes)
					.describe(Some(format!("A list of `{name}` objects."))),
			)?;
			fields.add(
				FieldSpec::new("edges", TypeRef::named_nn_list_nn(edge), FieldSource::Edges)
					.describe(Some(format!("A list of edges which contains the `{name}` and cursor to aid in pagination."))),
			)?;
			fields.add(
				FieldSpec::new("pageInfo", TypeRef::named_nn(PAGE_INFO), FieldSource::PageInfo)
					.describe(Some("Information to aid in pagination.")),
			)?;
			fields.add(
				FieldSpec::new("totalCount", TypeRef::named_nn(TypeRef::INT), FieldSource::TotalCount)
					.describe(Some(format!("The count of *all* `{name}` you could get from the connection."))),
			)?;
		}
		ObjectKind::Edge {
			node,
			..
		} => {
			fields.add(
				FieldSpec::new("cursor", TypeRef::named(CURSOR), FieldSource::Cursor)
					.describe(Some("A cursor for use in pagination.")),
			)?;
			fields.add(
				FieldSpec::new("node", node.clone(), FieldSource::Node)
					.describe(Some(format!("The `{}` at the end of the edge.", crate::build::registry::named(node)))),
			)?;
		}
		ObjectKind::Query => {
			for class in ctx.row_classes() {
				if class.tags.omits(Omit::All) {
					continue;
				}
				let mode = ctx.options.simple_collections.for_tags(&class.tags);
				let node = ctx.inflector.table_type(class);
				if mode.connections() {
					fields.add(
						FieldSpec::new(
							ctx.inflector.all_rows(class),
							TypeRef::named(ctx.inflector.connection(class)),
							FieldSource::AllRows {
								class: class.id,
								shape: Shape::Connection,
							},
						)
						.describe(Some(format!("Reads and enables pagination through a set of `{node}`."))),
					)?;
				}
				if mode.lists() {
					fields.add(
						FieldSpec::new(
							ctx.inflector.all_rows_list(class),
							TypeRef::named_nn_list(&node),
							FieldSource::AllRows {
								class: class.id,
								shape: Shape::List,
							},
						)
						.describe(Some(format!("Reads a set of `{node}`."))),
					)?;
				}
			}
		}
		_ => {}
	}
	Ok(fields)
}

fn args(
	mut args: Members<ArgSpec>,
	scope: &FieldScope<'_>,
	_: &BuildContext,
) -> Result<Members<ArgSpec>, Error> {
	let Some(shape) = scope.field.source.shape() else {
		return Ok(args);
	};
	if shape == Shape::Single {
		return Ok(args);
	}
	let int = || TypeRef::named(TypeRef::INT);
	args.add(
		ArgSpec::new("first", int(), ArgSource::First).describe("Only read the first `n` values of the set."),
	)?;
	if shape == Shape::Connection {
		args.add(
			ArgSpec::new("last", int(), ArgSource::Last).describe("Only read the last `n` values of the set."),
		)?;
	}
	args.add(
		ArgSpec::new("offset", int(), ArgSource::Offset).describe(match shape {
			Shape::Connection => "Skip the first `n` values from our `after` cursor, an alternative to cursor based pagination. May not be used with `last`.",
			_ => "Skip the first `n` values.",
		}),
	)?;
	if shape == Shape::Connection {
		args.add(
			ArgSpec::new("before", TypeRef::named(CURSOR), ArgSource::Before)
				.describe("Read all values in the set before (above) this cursor."),
		)?;
		args.add(
			ArgSpec::new("after", TypeRef::named(CURSOR), ArgSource::After)
				.describe("Read all values in the set after (below) this cursor."),
		)?;
	}
	Ok(args)
}

#[cfg(test)]
mod tests {
	use crate::build::plugins::testing::build;
	use crate::build::source::{ArgSource, FieldSource, Shape};
	use crate::build::{BuildOptions, SimpleCollections};
	use crate::catalog::ClassId;
	use crate::catalog::fixture::self_referencing;

	#[test]
	fn connection_only_by_default() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("Query", "allTs"),
			Some(&FieldSource::AllRows {
				class: ClassId(100),
				shape: Shape::Connection
			})
		);
		assert!(schema.blueprint.field("Query", "allTsList").is_none());
		assert_eq!(schema.blueprint.arg("Query", "allTs", "last"), Some(&ArgSource::Last));
		assert_eq!(schema.blueprint.field("TsConnection", "totalCount"), Some(&FieldSource::TotalCount));
		assert_eq!(schema.blueprint.field("TsEdge", "cursor"), Some(&FieldSource::Cursor));
	}

	#[test]
	fn lists_have_no_cursor_arguments() {
		let options = BuildOptions {
			simple_collections: SimpleCollections::Both,
			..Default::default()
		};
		let schema = build(self_referencing(), options);
		assert!(schema.blueprint.field("Query", "allTs").is_some());
		assert_eq!(schema.blueprint.arg("Query", "allTsList", "first"), Some(&ArgSource::First));
		assert!(schema.blueprint.arg("Query", "allTsList", "after").is_none());
	}
}
