use async_graphql::dynamic::TypeRef;

use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{ArgSpec, FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::{ArgSource, FieldSource};
use crate::build::types::non_null;
use crate::catalog::Omit;
use crate::err::Error;

/// A root field per primary key or unique constraint, fetching one row.
pub struct PgRowByUniqueKey;

impl Plugin for PgRowByUniqueKey {
	fn name(&self) -> &str {
		"PgRowByUniqueKey"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.object_fields(fields);
	}
}

fn fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	if scope.kind != ObjectKind::Query {
		return Ok(fields);
	}
	for class in ctx.row_classes() {
		for constraint in ctx.catalog.constraints_of(class) {
			if !constraint.is_unique_key() || constraint.tags.omits(Omit::Read) {
				continue;
			}
			let keys = ctx.catalog.key_attributes(constraint);
			if keys.is_empty() || keys.iter().any(|a| a.tags.omits(Omit::Read)) {
				continue;
			}
			let mut args = Vec::with_capacity(keys.len());
			for attr in keys.iter() {
				let Some(ty) = ctx.input_type(attr.type_id) else {
					break;
				};
				args.push(ArgSpec::new(ctx.inflector.column(attr), non_null(ty), ArgSource::Key {
					num: attr.num,
				}));
			}
			if args.len() != keys.len() {
				continue;
			}
			let mut field = FieldSpec::new(
				ctx.inflector.row_by_unique_key(class, constraint, &keys),
				TypeRef::named(ctx.inflector.table_type(class)),
				FieldSource::RowByKey {
					constraint: constraint.id,
				},
			)
			.describe(constraint.description.clone());
			for arg in args {
				field = field.arg(arg)?;
			}
			fields.add(field)?;
		}
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::{build, sdl};
	use crate::build::source::{ArgSource, FieldSource};
	use crate::catalog::ConstraintId;
	use crate::catalog::fixture::self_referencing;

	#[test]
	fn primary_key_lookup() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("Query", "tById"),
			Some(&FieldSource::RowByKey {
				constraint: ConstraintId(200)
			})
		);
		assert_eq!(schema.blueprint.arg("Query", "tById", "id"), Some(&ArgSource::Key {
			num: 1
		}));
		assert!(sdl(self_referencing(), BuildOptions::default()).contains("id: Int!"));
	}
}
