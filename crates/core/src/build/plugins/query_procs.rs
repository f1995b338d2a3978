use super::add_procedure_fields;
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::FieldSource;
use crate::catalog::oid;
use crate::err::Error;

/// Stable and immutable functions, as root query fields.
pub struct PgQueryProcedures;

impl Plugin for PgQueryProcedures {
	fn name(&self) -> &str {
		"PgQueryProcedures"
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
	for proc in ctx.catalog.procedures.iter() {
		if proc.is_mutation() || proc.return_type_id.0 == oid::VOID || !ctx.is_exposable(proc) {
			continue;
		}
		if ctx.computed_column_class(proc).is_some() {
			continue;
		}
		let name = ctx.inflector.procedure(proc);
		let list = ctx.inflector.procedure_list(proc);
		add_procedure_fields(&mut fields, ctx, proc, name, list, 0, |shape| FieldSource::Procedure {
			proc: proc.id,
			shape,
		})?;
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use crate::build::plugins::testing::{build, sdl};
	use crate::build::source::{FieldSource, Shape};
	use crate::build::{BuildOptions, SimpleCollections};
	use crate::catalog::fixture::{procedure, self_referencing};
	use crate::catalog::{ProcId, Procedure, Volatility, oid};

	fn setof(p: Procedure) -> Procedure {
		Procedure {
			returns_set: true,
			..p
		}
	}

	#[test]
	fn scalar_and_set_functions() {
		let mut catalog = self_referencing();
		let mut add = procedure(400, "add", &[oid::INT4, oid::INT4], oid::INT4);
		add.arg_names = vec!["a".into(), "b".into()];
		catalog.procedures.push(add);
		catalog.procedures.push(setof(procedure(401, "roots", &[], 101)));
		catalog.procedures.push(setof(procedure(402, "labels", &[], oid::TEXT)));
		catalog.procedures.push(Procedure {
			volatility: Volatility::Volatile,
			..procedure(403, "bump", &[], oid::INT4)
		});
		let options = BuildOptions {
			simple_collections: SimpleCollections::Both,
			..Default::default()
		};
		let schema = build(catalog.clone(), options.clone());
		assert_eq!(
			schema.blueprint.field("Query", "add"),
			Some(&FieldSource::Procedure {
				proc: ProcId(400),
				shape: Shape::Single
			})
		);
		assert_eq!(
			schema.blueprint.field("Query", "roots"),
			Some(&FieldSource::Procedure {
				proc: ProcId(401),
				shape: Shape::Connection
			})
		);
		assert!(schema.blueprint.field("Query", "rootsList").is_some());
		assert!(schema.blueprint.field("LabelsConnection", "nodes").is_some());
		assert!(schema.blueprint.field("Query", "bump").is_none());
		let sdl = sdl(catalog, options);
		assert!(sdl.contains("a: Int"), "{sdl}");
		assert!(sdl.contains("labels("), "{sdl}");
	}
}
