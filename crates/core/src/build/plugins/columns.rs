use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectKind, ObjectScope};
use crate::build::source::FieldSource;
use crate::err::Error;

/// A field for each readable column of a table or composite type.
pub struct PgColumns;

impl Plugin for PgColumns {
	fn name(&self) -> &str {
		"PgColumns"
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
	for attr in ctx.columns(class) {
		let Some(ty) = ctx.column_type(attr) else {
			trace!(
				target: crate::build::TARGET,
				"Skipping column {}.{} of an unsupported type",
				class.name,
				attr.name
			);
			continue;
		};
		fields.add(
			FieldSpec::new(ctx.inflector.column(attr), ty, FieldSource::Column {
				class: class.id,
				num: attr.num,
			})
			.describe(attr.description.clone())
			.deprecate(attr.tags.string("deprecated")),
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
	use crate::catalog::{ClassId, TagValue};

	#[test]
	fn columns_become_fields() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("T", "parentId"),
			Some(&FieldSource::Column {
				class: ClassId(100),
				num: 3
			})
		);
		let sdl = schema.sdl();
		assert!(sdl.contains("type T {"), "{sdl}");
	}

	#[test]
	fn omitted_and_deprecated_columns() {
		let mut catalog = self_referencing();
		catalog.attributes[1].tags.insert("omit", TagValue::Flag(true));
		catalog.attributes[2].tags.insert("deprecated", TagValue::Text("Use parent".into()));
		let schema = build(catalog, BuildOptions::default());
		assert!(schema.blueprint.field("T", "name").is_none());
		assert!(schema.sdl().contains("@deprecated(reason: \"Use parent\")"));
	}
}
