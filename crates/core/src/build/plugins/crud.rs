use async_graphql::dynamic::TypeRef;

use super::mutation_procs::{client_mutation_id, client_mutation_id_input, query_field};
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, FieldSpec, InputFieldSpec, InputKind, InputScope, Members, MutationOf, ObjectKind,
	ObjectScope, TypeSpec,
};
use crate::build::source::{ArgSource, FieldSource, InputFieldSource};
use crate::build::types::non_null;
use crate::catalog::{Attribute, Class, Constraint, Omit};
use crate::err::Error;

const INPUT_DESCRIPTION: &str = "The exclusive input argument for this mutation. An object type, make sure to see documentation for this object’s fields.";

/// The `createX` mutations.
pub struct PgMutationCreate;

/// The `updateXByKey` and `deleteXByKey` mutations.
pub struct PgMutationUpdateDelete;

impl Plugin for PgMutationCreate {
	fn name(&self) -> &str {
		"PgMutationCreate"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(create_init);
		hooks.object_fields(create_fields);
		hooks.input_fields(create_input_fields);
	}
}

impl Plugin for PgMutationUpdateDelete {
	fn name(&self) -> &str {
		"PgMutationUpdateDelete"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(update_delete_init);
		hooks.object_fields(update_delete_fields);
		hooks.input_fields(update_delete_input_fields);
	}
}

fn creatable(ctx: &BuildContext, class: &Class) -> bool {
	!ctx.options.disable_default_mutations
		&& ctx.is_record(class)
		&& class.has_rows()
		&& class.is_insertable
		&& !class.tags.omits(Omit::Create)
}

fn updatable(ctx: &BuildContext, class: &Class) -> bool {
	!ctx.options.disable_default_mutations
		&& ctx.is_record(class)
		&& class.has_rows()
		&& class.is_updatable
		&& !class.tags.omits(Omit::Update)
}

fn deletable(ctx: &BuildContext, class: &Class) -> bool {
	!ctx.options.disable_default_mutations
		&& ctx.is_record(class)
		&& class.has_rows()
		&& class.is_deletable
		&& !class.tags.omits(Omit::Delete)
}

/// The unique keys a row of `class` can be addressed by, with their columns.
fn unique_keys<'a>(ctx: &'a BuildContext, class: &'a Class) -> Vec<(&'a Constraint, Vec<&'a Attribute>)> {
	ctx.catalog
		.constraints_of(class)
		.filter(|c| c.is_unique_key() && !c.tags.omits(Omit::Read))
		.filter_map(|c| {
			let keys = ctx.catalog.key_attributes(c);
			let usable = !keys.is_empty()
				&& keys.iter().all(|a| !a.tags.omits(Omit::Read) && ctx.input_type(a.type_id).is_some());
			usable.then_some((c, keys))
		})
		.collect()
}

/// The fields of a payload returning the affected row.
fn payload_fields(
	fields: &mut Members<FieldSpec>,
	ctx: &BuildContext,
	class: &Class,
	verb: &str,
) -> Result<(), Error> {
	let node = ctx.inflector.table_type(class);
	fields.add(client_mutation_id())?;
	fields.add(
		FieldSpec::new(ctx.inflector.table_field(class), TypeRef::named(&node), FieldSource::PayloadRecord)
			.describe(Some(format!("The `{node}` that was {verb} by this mutation."))),
	)?;
	fields.add(query_field())
}

fn create_init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		if !creatable(ctx, class) {
			continue;
		}
		let field = ctx.inflector.create(class);
		let node = ctx.inflector.table_type(class);
		ctx.registry.register(TypeSpec::input(
			ctx.inflector.mutation_input(&field),
			InputKind::Mutation(MutationOf::Create(class.id)),
			Some(format!("All input for the create `{node}` mutation.")),
		))?;
		ctx.registry.register(TypeSpec::object(
			ctx.inflector.mutation_payload(&field),
			ObjectKind::Payload(MutationOf::Create(class.id)),
			Some(format!("The output of our create `{node}` mutation.")),
		))?;
	}
	Ok(())
}

fn create_fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	match scope.kind {
		ObjectKind::Mutation => {
			for class in ctx.catalog.classes.iter().filter(|c| creatable(ctx, c)) {
				let name = ctx.inflector.create(class);
				let field = FieldSpec::new(
					&name,
					TypeRef::named(ctx.inflector.mutation_payload(&name)),
					FieldSource::Create {
						class: class.id,
					},
				)
				.describe(Some(format!("Creates a single `{}`.", ctx.inflector.table_type(class))))
				.arg(
					ArgSpec::new("input", TypeRef::named_nn(ctx.inflector.mutation_input(&name)), ArgSource::Input)
						.describe(INPUT_DESCRIPTION),
				)?;
				fields.add(field)?;
			}
		}
		ObjectKind::Payload(MutationOf::Create(id)) => {
			payload_fields(&mut fields, ctx, ctx.class(id)?, "created")?;
		}
		_ => {}
	}
	Ok(fields)
}

fn create_input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	let InputKind::Mutation(MutationOf::Create(id)) = scope.kind else {
		return Ok(fields);
	};
	let class = ctx.class(id)?;
	fields.add(client_mutation_id_input())?;
	fields.add(
		InputFieldSpec::new(
			ctx.inflector.table_field(class),
			TypeRef::named_nn(ctx.inflector.input(class)),
			InputFieldSource::Record,
		)
		.describe(Some(format!("The `{}` to be created by this mutation.", ctx.inflector.table_type(class)))),
	)?;
	Ok(fields)
}

fn update_delete_init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		let (update, delete) = (updatable(ctx, class), deletable(ctx, class));
		if !update && !delete {
			continue;
		}
		let node = ctx.inflector.table_type(class);
		let keys: Vec<(String, String, _)> = unique_keys(ctx, class)
			.into_iter()
			.map(|(c, attrs)| {
				(
					ctx.inflector.update_by_key(class, c, &attrs),
					ctx.inflector.delete_by_key(class, c, &attrs),
					c.id,
				)
			})
			.collect();
		if keys.is_empty() {
			continue;
		}
		if update {
			ctx.registry.register(TypeSpec::object(
				ctx.inflector.mutation_payload(&ctx.inflector.update(class)),
				ObjectKind::Payload(MutationOf::Update(class.id)),
				Some(format!("The output of our update `{node}` mutation.")),
			))?;
		}
		if delete {
			ctx.registry.register(TypeSpec::object(
				ctx.inflector.mutation_payload(&ctx.inflector.delete(class)),
				ObjectKind::Payload(MutationOf::Delete(class.id)),
				Some(format!("The output of our delete `{node}` mutation.")),
			))?;
		}
		for (update_name, delete_name, id) in keys {
			if update {
				ctx.registry.register(TypeSpec::input(
					ctx.inflector.mutation_input(&update_name),
					InputKind::Mutation(MutationOf::UpdateByKey(id)),
					Some(format!("All input for the `{update_name}` mutation.")),
				))?;
			}
			if delete {
				ctx.registry.register(TypeSpec::input(
					ctx.inflector.mutation_input(&delete_name),
					InputKind::Mutation(MutationOf::DeleteByKey(id)),
					Some(format!("All input for the `{delete_name}` mutation.")),
				))?;
			}
		}
	}
	Ok(())
}

fn update_delete_fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	match scope.kind {
		ObjectKind::Mutation => {
			for class in ctx.catalog.classes.iter() {
				let (update, delete) = (updatable(ctx, class), deletable(ctx, class));
				let node = ctx.inflector.table_type(class);
				for (c, attrs) in unique_keys(ctx, class) {
					if update {
						let name = ctx.inflector.update_by_key(class, c, &attrs);
						let payload = ctx.inflector.mutation_payload(&ctx.inflector.update(class));
						let field = FieldSpec::new(&name, TypeRef::named(payload), FieldSource::Update {
							constraint: c.id,
						})
						.describe(Some(format!("Updates a single `{node}` using a unique key and a patch.")))
						.arg(
							ArgSpec::new("input", TypeRef::named_nn(ctx.inflector.mutation_input(&name)), ArgSource::Input)
								.describe(INPUT_DESCRIPTION),
						)?;
						fields.add(field)?;
					}
					if delete {
						let name = ctx.inflector.delete_by_key(class, c, &attrs);
						let payload = ctx.inflector.mutation_payload(&ctx.inflector.delete(class));
						let field = FieldSpec::new(&name, TypeRef::named(payload), FieldSource::Delete {
							constraint: c.id,
						})
						.describe(Some(format!("Deletes a single `{node}` using a unique key.")))
						.arg(
							ArgSpec::new("input", TypeRef::named_nn(ctx.inflector.mutation_input(&name)), ArgSource::Input)
								.describe(INPUT_DESCRIPTION),
						)?;
						fields.add(field)?;
					}
				}
			}
		}
		ObjectKind::Payload(MutationOf::Update(id)) => {
			payload_fields(&mut fields, ctx, ctx.class(id)?, "updated")?;
		}
		ObjectKind::Payload(MutationOf::Delete(id)) => {
			payload_fields(&mut fields, ctx, ctx.class(id)?, "deleted")?;
		}
		_ => {}
	}
	Ok(fields)
}

fn update_delete_input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	let (id, update) = match scope.kind {
		InputKind::Mutation(MutationOf::UpdateByKey(id)) => (id, true),
		InputKind::Mutation(MutationOf::DeleteByKey(id)) => (id, false),
		_ => return Ok(fields),
	};
	let constraint = ctx.constraint(id)?;
	let class = ctx.class(constraint.class_id)?;
	fields.add(client_mutation_id_input())?;
	if update {
		fields.add(
			InputFieldSpec::new(
				ctx.inflector.patch_field(class),
				TypeRef::named_nn(ctx.inflector.patch(class)),
				InputFieldSource::Patch,
			)
			.describe(Some(format!(
				"An object where the defined keys will be set on the `{}` being updated.",
				ctx.inflector.table_type(class)
			))),
		)?;
	}
	for attr in ctx.catalog.key_attributes(constraint) {
		let Some(ty) = ctx.input_type(attr.type_id) else {
			continue;
		};
		fields.add(InputFieldSpec::new(ctx.inflector.column(attr), non_null(ty), InputFieldSource::Key {
			num: attr.num,
		}))?;
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::{build, sdl};
	use crate::build::source::{FieldSource, InputFieldSource};
	use crate::catalog::fixture::self_referencing;
	use crate::catalog::{ClassId, ConstraintId, TagValue};

	#[test]
	fn crud_mutations() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(
			schema.blueprint.field("Mutation", "createT"),
			Some(&FieldSource::Create {
				class: ClassId(100)
			})
		);
		assert_eq!(
			schema.blueprint.field("Mutation", "updateTById"),
			Some(&FieldSource::Update {
				constraint: ConstraintId(200)
			})
		);
		assert_eq!(
			schema.blueprint.field("Mutation", "deleteTById"),
			Some(&FieldSource::Delete {
				constraint: ConstraintId(200)
			})
		);
		assert_eq!(schema.blueprint.input("CreateTInput", "t"), Some(&InputFieldSource::Record));
		assert_eq!(schema.blueprint.input("UpdateTByIdInput", "tPatch"), Some(&InputFieldSource::Patch));
		assert_eq!(schema.blueprint.input("DeleteTByIdInput", "id"), Some(&InputFieldSource::Key {
			num: 1
		}));
		assert_eq!(schema.blueprint.field("UpdateTPayload", "t"), Some(&FieldSource::PayloadRecord));
	}

	#[test]
	fn disabled_default_mutations_drop_the_mutation_type() {
		let options = BuildOptions {
			disable_default_mutations: true,
			..Default::default()
		};
		let sdl = sdl(self_referencing(), options);
		assert!(!sdl.contains("type Mutation"), "{sdl}");
		assert!(!sdl.contains("CreateTInput"));
	}

	#[test]
	fn omit_delete() {
		let mut catalog = self_referencing();
		catalog.classes[0].tags.insert("omit", TagValue::Text("delete".into()));
		let schema = build(catalog, BuildOptions::default());
		assert!(schema.blueprint.field("Mutation", "deleteTById").is_none());
		assert!(schema.blueprint.field("Mutation", "updateTById").is_some());
	}
}
