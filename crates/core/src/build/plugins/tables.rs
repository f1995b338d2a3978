use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{InputFieldSpec, InputKind, InputScope, Members, ObjectKind, TypeSpec};
use crate::build::source::InputFieldSource;
use crate::build::types::{non_null, nullable};
use crate::catalog::{Identity, Omit};
use crate::err::Error;

/// The object type of each readable class, plus the record and patch inputs.
pub struct PgTables;

impl Plugin for PgTables {
	fn name(&self) -> &str {
		"PgTables"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.input_fields(input_fields);
	}
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		if !ctx.is_record(class) {
			continue;
		}
		let name = ctx.inflector.table_type(class);
		let description = class.description.clone();
		ctx.registry.register(TypeSpec::object(&name, ObjectKind::Record(class.id), description))?;
		ctx.registry.register(TypeSpec::input(
			ctx.inflector.input(class),
			InputKind::Record(class.id),
			Some(format!("An input for mutations affecting `{name}`")),
		))?;
		if class.has_rows() && class.is_updatable && !class.tags.omits(Omit::Update) {
			ctx.registry.register(TypeSpec::input(
				ctx.inflector.patch(class),
				InputKind::Patch(class.id),
				Some(format!(
					"Represents an update to a `{name}`. Fields that are set will be updated."
				)),
			))?;
		}
	}
	Ok(())
}

fn input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	let (class_id, patch) = match scope.kind {
		InputKind::Record(id) => (id, false),
		InputKind::Patch(id) => (id, true),
		_ => return Ok(fields),
	};
	let class = ctx.class(class_id)?;
	let action = match patch {
		true => Omit::Update,
		false => Omit::Create,
	};
	for attr in ctx.columns(class) {
		if attr.tags.omits(action) || (class.has_rows() && attr.identity == Identity::Always) {
			continue;
		}
		let Some(ty) = ctx.input_type(attr.type_id) else {
			continue;
		};
		let required = !patch
			&& class.has_rows()
			&& attr.is_not_null
			&& !attr.has_default
			&& attr.identity == Identity::None;
		let ty = match required {
			true => non_null(ty),
			false => nullable(ty),
		};
		fields.add(
			InputFieldSpec::new(ctx.inflector.column(attr), ty, InputFieldSource::Column {
				class: class.id,
				num: attr.num,
			})
			.describe(attr.description.clone()),
		)?;
	}
	Ok(fields)
}
