use async_graphql::dynamic::TypeRef;

use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::FieldSource;
use crate::catalog::{Class, Constraint, ConstraintKind, Omit};
use crate::err::Error;

/// A many-to-one field for each foreign key, reading the referenced row.
pub struct PgForwardRelations;

impl Plugin for PgForwardRelations {
	fn name(&self) -> &str {
		"PgForwardRelations"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.object_fields(fields);
	}
}

/// The foreign keys of `class` which can be followed, with their target.
pub(crate) fn followable<'a>(
	ctx: &'a BuildContext,
	class: &'a Class,
) -> impl Iterator<Item = (&'a Constraint, &'a Class)> + 'a {
	ctx.catalog.constraints_of(class).filter_map(move |c| {
		if c.kind != ConstraintKind::ForeignKey || c.tags.omits(Omit::Read) {
			return None;
		}
		let foreign = ctx.catalog.class(c.foreign_class_id?)?;
		if !ctx.is_record(foreign) || !foreign.is_selectable {
			return None;
		}
		let readable = ctx.catalog.key_attributes(c).iter().all(|a| !a.tags.omits(Omit::Read))
			&& ctx.catalog.foreign_key_attributes(c).iter().all(|a| !a.tags.omits(Omit::Read));
		readable.then_some((c, foreign))
	})
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
	if !class.has_rows() {
		return Ok(fields);
	}
	for (constraint, foreign) in followable(ctx, class) {
		let keys = ctx.catalog.key_attributes(constraint);
		let name = ctx.inflector.forward_relation(constraint, foreign, &keys);
		let target = ctx.inflector.table_type(foreign);
		fields.add(
			FieldSpec::new(name, TypeRef::named(&target), FieldSource::ForwardRelation {
				constraint: constraint.id,
			})
			.describe(Some(format!("Reads a single `{target}` that is related to this `{}`.", scope.name))),
		)?;
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::build::source::FieldSource;
	use crate::catalog::fixture::self_referencing;
	use crate::catalog::{ConstraintId, TagValue};

	#[test]
	fn self_reference() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("T", "parentByParentId"),
			Some(&FieldSource::ForwardRelation {
				constraint: ConstraintId(201)
			})
		);
	}

	#[test]
	fn field_name_tag() {
		let mut catalog = self_referencing();
		catalog.constraints[1].tags.insert("fieldName", TagValue::Text("ancestor".into()));
		let schema = build(catalog, BuildOptions::default());
		assert!(schema.blueprint.field("T", "ancestor").is_some());
		assert!(schema.blueprint.field("T", "parentByParentId").is_none());
	}
}
