use async_graphql::dynamic::TypeRef;

use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::{FieldSource, Shape};
use crate::build::LegacyRelations;
use crate::catalog::{Constraint, Omit};
use crate::err::Error;

/// The one-to-many fields reading the rows which reference a row, or a
/// one-to-one field when the foreign key is also unique.
pub struct PgBackwardRelations;

impl Plugin for PgBackwardRelations {
	fn name(&self) -> &str {
		"PgBackwardRelations"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.object_fields(fields);
	}
}

/// Whether the referencing columns of a foreign key are also a unique key.
fn is_one_to_one(ctx: &BuildContext, fk: &Constraint) -> bool {
	let Some(table) = ctx.catalog.class(fk.class_id) else {
		return false;
	};
	let mut keys = fk.key_attribute_nums.clone();
	keys.sort_unstable();
	ctx.catalog.constraints_of(table).filter(|c| c.is_unique_key()).any(|c| {
		let mut nums = c.key_attribute_nums.clone();
		nums.sort_unstable();
		nums == keys
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
	for fk in ctx.catalog.foreign_constraints_of(class) {
		if fk.tags.omits(Omit::Read) || fk.tags.omits(Omit::Many) {
			continue;
		}
		if !ctx.options.ignore_indexes && !fk.is_indexed {
			continue;
		}
		let table = ctx.class(fk.class_id)?;
		if !ctx.is_record(table) || !table.is_selectable || table.tags.omits(Omit::Many) {
			continue;
		}
		let keys = ctx.catalog.key_attributes(fk);
		if keys.iter().any(|a| a.tags.omits(Omit::Read)) {
			continue;
		}
		let node = ctx.inflector.table_type(table);
		let (single, collections, deprecated) = match is_one_to_one(ctx, fk) {
			false => (false, true, false),
			true => match ctx.options.legacy_relations {
				LegacyRelations::Omit => (true, false, false),
				LegacyRelations::Deprecated => (true, true, true),
				LegacyRelations::Only => (false, true, false),
			},
		};
		if single {
			fields.add(
				FieldSpec::new(
					ctx.inflector.backward_relation_single(fk, table, &keys),
					TypeRef::named(&node),
					FieldSource::BackwardRelation {
						constraint: fk.id,
						shape: Shape::Single,
					},
				)
				.describe(Some(format!("Reads a single `{node}` that is related to this `{}`.", scope.name))),
			)?;
		}
		if !collections {
			continue;
		}
		let deprecation = deprecated.then_some("Please use the single record field instead.");
		let mode = ctx.options.simple_collections.for_tags(&table.tags).for_tags(&fk.tags);
		if mode.connections() {
			fields.add(
				FieldSpec::new(
					ctx.inflector.backward_relation(fk, table, &keys),
					TypeRef::named_nn(ctx.inflector.connection(table)),
					FieldSource::BackwardRelation {
						constraint: fk.id,
						shape: Shape::Connection,
					},
				)
				.describe(Some(format!("Reads and enables pagination through a set of `{node}`.")))
				.deprecate(deprecation),
			)?;
		}
		if mode.lists() {
			fields.add(
				FieldSpec::new(
					ctx.inflector.backward_relation_list(fk, table, &keys),
					TypeRef::named_nn_list_nn(&node),
					FieldSource::BackwardRelation {
						constraint: fk.id,
						shape: Shape::List,
					},
				)
				.describe(Some(format!("Reads a set of `{node}`.")))
				.deprecate(deprecation),
			)?;
		}
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use crate::build::plugins::testing::build;
	use crate::build::source::{FieldSource, Shape};
	use crate::build::{BuildOptions, LegacyRelations};
	use crate::catalog::fixture::{constraint, self_referencing};
	use crate::catalog::{Catalog, ConstraintId, ConstraintKind};

	#[test]
	fn one_to_many() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("T", "tsByParentId"),
			Some(&FieldSource::BackwardRelation {
				constraint: ConstraintId(201),
				shape: Shape::Connection
			})
		);
		assert!(schema.blueprint.field("T", "tByParentId").is_none());
	}

	fn unique_parent() -> Catalog {
		let mut catalog = self_referencing();
		catalog.constraints.push(constraint(202, "t_parent_id_key", ConstraintKind::Unique, 100, &[3], None));
		catalog
	}

	#[rstest]
	#[case(LegacyRelations::Omit, true, false)]
	#[case(LegacyRelations::Deprecated, true, true)]
	#[case(LegacyRelations::Only, false, true)]
	fn one_to_one(#[case] legacy: LegacyRelations, #[case] single: bool, #[case] connection: bool) {
		let options = BuildOptions {
			legacy_relations: legacy,
			..Default::default()
		};
		let schema = build(unique_parent(), options);
		assert_eq!(schema.blueprint.field("T", "tByParentId").is_some(), single);
		assert_eq!(schema.blueprint.field("T", "tsByParentId").is_some(), connection);
	}

	#[test]
	fn unindexed_foreign_keys_are_skipped() {
		let options = BuildOptions {
			ignore_indexes: false,
			..Default::default()
		};
		let schema = build(self_referencing(), options);
		assert!(schema.blueprint.field("T", "tsByParentId").is_none());
		assert!(schema.blueprint.field("T", "parentByParentId").is_some());
	}
}
