use super::add_procedure_fields;
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::FieldSource;
use crate::err::Error;

/// Functions taking a row of a table as first argument, exposed as fields
/// of that table.
pub struct PgComputedColumns;

impl Plugin for PgComputedColumns {
	fn name(&self) -> &str {
		"PgComputedColumns"
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
	let ObjectKind::Record(class_id) = scope.kind else {
		return Ok(fields);
	};
	let class = ctx.class(class_id)?;
	for proc in ctx.catalog.procedures.iter() {
		if proc.is_mutation() || !ctx.is_exposable(proc) || !ctx.is_computed_column_of(proc, class) {
			continue;
		}
		let name = ctx.inflector.computed_column(proc, class);
		let list = format!("{name}List");
		add_procedure_fields(&mut fields, ctx, proc, name, list, 1, |shape| {
			FieldSource::ComputedColumn {
				proc: proc.id,
				shape,
			}
		})?;
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::build::source::{ArgSource, FieldSource, Shape};
	use crate::catalog::fixture::{procedure, self_referencing};
	use crate::catalog::{Catalog, ProcId, oid};

	fn catalog() -> Catalog {
		let mut catalog = self_referencing();
		catalog.procedures.push(procedure(400, "t_label", &[101, oid::TEXT], oid::TEXT));
		catalog.procedures.push(procedure(401, "other_label", &[101], oid::TEXT));
		catalog
	}

	#[test]
	fn prefixed_functions_become_fields() {
		let schema = build(catalog(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("T", "label"),
			Some(&FieldSource::ComputedColumn {
				proc: ProcId(400),
				shape: Shape::Single
			})
		);
		assert_eq!(schema.blueprint.arg("T", "label", "arg1"), Some(&ArgSource::ProcArg {
			index: 1
		}));
		assert!(schema.blueprint.arg("T", "label", "arg0").is_none());
		assert!(schema.blueprint.field("T", "otherLabel").is_none());
	}
}
