use async_graphql::dynamic::TypeRef;

use super::collection_class;
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, FieldScope, InputFieldSpec, InputKind, InputScope, Members, TypeSpec,
};
use crate::build::source::{ArgSource, InputFieldSource};
use crate::build::types::nullable;
use crate::catalog::Omit;
use crate::err::Error;

/// Per-column equality conditions on row collections.
pub struct PgConditions;

impl Plugin for PgConditions {
	fn name(&self) -> &str {
		"PgConditions"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.input_fields(input_fields);
		hooks.field_args(args);
	}
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		if !ctx.is_record(class) || !class.has_rows() || class.tags.omits(Omit::Filter) {
			continue;
		}
		let description = format!(
			"A condition to be used against `{}` object types. All fields are tested for equality and combined with a logical 'and.'",
			ctx.inflector.table_type(class)
		);
		ctx.registry.register(TypeSpec::input(
			ctx.inflector.condition(class),
			InputKind::Condition(class.id),
			Some(description),
		))?;
	}
	Ok(())
}

fn input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	let InputKind::Condition(class_id) = scope.kind else {
		return Ok(fields);
	};
	let class = ctx.class(class_id)?;
	for attr in ctx.columns(class) {
		if attr.tags.omits(Omit::Filter) || !(ctx.options.ignore_indexes || attr.is_indexed) {
			continue;
		}
		let Some(ty) = ctx.input_type(attr.type_id) else {
			continue;
		};
		let column = ctx.inflector.column(attr);
		fields.add(
			InputFieldSpec::new(&column, nullable(ty), InputFieldSource::Column {
				class: class.id,
				num: attr.num,
			})
			.describe(Some(format!("Checks for equality with the object’s `{column}` field."))),
		)?;
	}
	Ok(fields)
}

fn args(
	mut args: Members<ArgSpec>,
	scope: &FieldScope<'_>,
	ctx: &BuildContext,
) -> Result<Members<ArgSpec>, Error> {
	let Some((class, _)) = collection_class(ctx, &scope.field.source) else {
		return Ok(args);
	};
	let name = ctx.inflector.condition(class);
	if class.tags.omits(Omit::Filter) || !ctx.registry.contains(&name) {
		return Ok(args);
	}
	args.add(
		ArgSpec::new("condition", TypeRef::named(name), ArgSource::Condition).describe(
			"A condition to be used in determining which values should be returned by the collection.",
		),
	)?;
	Ok(args)
}

#[cfg(test)]
mod tests {
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::build::source::{ArgSource, InputFieldSource};
	use crate::catalog::fixture::self_referencing;
	use crate::catalog::{ClassId, TagValue};

	#[test]
	fn condition_fields_per_column() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.input("TCondition", "parentId"),
			Some(&InputFieldSource::Column {
				class: ClassId(100),
				num: 3
			})
		);
		assert_eq!(schema.blueprint.arg("Query", "allTs", "condition"), Some(&ArgSource::Condition));
		assert_eq!(
			schema.blueprint.arg("T", "tsByParentId", "condition"),
			Some(&ArgSource::Condition)
		);
	}

	#[test]
	fn omit_filter_on_a_column() {
		let mut catalog = self_referencing();
		catalog.attributes[1].tags.insert("omit", TagValue::Text("filter".into()));
		let schema = build(catalog, BuildOptions::default());
		assert!(schema.blueprint.input("TCondition", "name").is_none());
		assert!(schema.blueprint.input("TCondition", "id").is_some());
	}
}
