use async_graphql::dynamic::TypeRef;

use super::{MUTATION, PAGE_INFO, QUERY};
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	EnumKind, EnumScope, EnumValueSpec, FieldSpec, Members, ObjectKind, ObjectScope, TypeSpec,
};
use crate::build::source::{EnumValueSource, FieldSource};
use crate::build::types::{CURSOR, CUSTOM_SCALARS};
use crate::catalog::TypeKind;
use crate::err::Error;

/// The scalars, the root types, `PageInfo`, and the Postgres enums.
pub struct StandardTypes;

impl Plugin for StandardTypes {
	fn name(&self) -> &str {
		"StandardTypes"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.build(build);
		hooks.init(init);
		hooks.object_fields(fields);
		hooks.enum_values(values);
	}
}

fn build(ctx: &mut BuildContext) -> Result<(), Error> {
	for (name, description) in CUSTOM_SCALARS {
		ctx.registry.register(TypeSpec::scalar(name, description))?;
	}
	ctx.registry.register(TypeSpec::object(
		QUERY,
		ObjectKind::Query,
		Some("The root query type which gives access points into the data universe.".into()),
	))?;
	ctx.registry.register(TypeSpec::object(
		MUTATION,
		ObjectKind::Mutation,
		Some("The root mutation type which contains root level fields which mutate data.".into()),
	))?;
	ctx.registry.register(TypeSpec::object(
		PAGE_INFO,
		ObjectKind::PageInfo,
		Some("Information about pagination in a connection.".into()),
	))
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for t in catalog.types.iter().filter(|t| t.kind == TypeKind::Enum) {
		ctx.registry.register(TypeSpec::enumeration(
			ctx.inflector.type_name(t),
			EnumKind::Pg(t.id),
			t.description.clone(),
		))?;
	}
	Ok(())
}

fn fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	_: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	match scope.kind {
		ObjectKind::Query => {
			fields.add(
				FieldSpec::new("query", TypeRef::named_nn(QUERY), FieldSource::QueryRoot).describe(Some(
					"Exposes the root query type nested one level down. This is helpful for Relay 1 which can only query top level fields if they are in a particular form.",
				)),
			)?;
		}
		ObjectKind::PageInfo => {
			fields.add(
				FieldSpec::new("hasNextPage", TypeRef::named_nn(TypeRef::BOOLEAN), FieldSource::HasNextPage)
					.describe(Some("When paginating forwards, are there more items?")),
			)?;
			fields.add(
				FieldSpec::new(
					"hasPreviousPage",
					TypeRef::named_nn(TypeRef::BOOLEAN),
					FieldSource::HasPreviousPage,
				)
				.describe(Some("When paginating backwards, are there more items?")),
			)?;
			fields.add(
				FieldSpec::new("startCursor", TypeRef::named(CURSOR), FieldSource::StartCursor)
					.describe(Some("When paginating backwards, the cursor to continue.")),
			)?;
			fields.add(
				FieldSpec::new("endCursor", TypeRef::named(CURSOR), FieldSource::EndCursor)
					.describe(Some("When paginating forwards, the cursor to continue.")),
			)?;
		}
		_ => {}
	}
	Ok(fields)
}

fn values(
	mut values: Members<EnumValueSpec>,
	scope: &EnumScope,
	ctx: &BuildContext,
) -> Result<Members<EnumValueSpec>, Error> {
	if let EnumKind::Pg(id) = scope.kind {
		if let Some(t) = ctx.catalog.pg_type(id) {
			for label in t.enum_variants.iter() {
				values.add(EnumValueSpec::new(
					ctx.inflector.enum_value(label),
					EnumValueSource::Label(label.clone()),
				))?;
			}
		}
	}
	Ok(values)
}
