use async_graphql::dynamic::TypeRef;

use super::{QUERY, procedure_args};
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, FieldSpec, InputFieldSpec, InputKind, InputScope, Members, MutationOf, ObjectKind,
	ObjectScope, TypeSpec,
};
use crate::build::source::{ArgSource, FieldSource, InputFieldSource, Shape};
use crate::build::types::non_null;
use crate::catalog::{Procedure, oid};
use crate::err::Error;

/// Volatile functions, as root mutation fields taking an input object and
/// returning a payload.
pub struct PgMutationProcedures;

impl Plugin for PgMutationProcedures {
	fn name(&self) -> &str {
		"PgMutationProcedures"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.object_fields(fields);
		hooks.input_fields(input_fields);
	}
}

fn mutations(ctx: &BuildContext) -> impl Iterator<Item = &Procedure> {
	ctx.catalog.procedures.iter().filter(|p| p.is_mutation() && ctx.is_exposable(p))
}

/// The type of the payload field holding the function result.
fn result_type(ctx: &BuildContext, proc: &Procedure) -> Option<TypeRef> {
	if proc.return_type_id.0 == oid::VOID {
		return None;
	}
	let item = match ctx.returned_class(proc) {
		Some(class) => TypeRef::named(ctx.inflector.table_type(class)),
		None => ctx.output_type(proc.return_type_id)?,
	};
	match proc.returns_set {
		false => Some(item),
		true => match ctx.options.setof_functions_contain_nulls {
			true => Some(TypeRef::List(Box::new(item))),
			false => Some(TypeRef::List(Box::new(non_null(item)))),
		},
	}
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for proc in catalog.procedures.iter() {
		if !proc.is_mutation() || !ctx.is_exposable(proc) {
			continue;
		}
		let field = ctx.inflector.procedure(proc);
		ctx.registry.register(TypeSpec::input(
			ctx.inflector.mutation_input(&field),
			InputKind::Mutation(MutationOf::Procedure(proc.id)),
			Some(format!("All input for the `{field}` mutation.")),
		))?;
		ctx.registry.register(TypeSpec::object(
			ctx.inflector.mutation_payload(&field),
			ObjectKind::Payload(MutationOf::Procedure(proc.id)),
			Some(format!("The output of our `{field}` mutation.")),
		))?;
	}
	Ok(())
}

fn fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	match scope.kind {
		ObjectKind::Mutation => {
			for proc in mutations(ctx) {
				let name = ctx.inflector.procedure(proc);
				let shape = match proc.returns_set {
					true => Shape::List,
					false => Shape::Single,
				};
				let field = FieldSpec::new(
					&name,
					TypeRef::named(ctx.inflector.mutation_payload(&name)),
					FieldSource::MutationProcedure {
						proc: proc.id,
						shape,
					},
				)
				.describe(proc.description.clone())
				.deprecate(proc.tags.string("deprecated"))
				.arg(
					ArgSpec::new("input", TypeRef::named_nn(ctx.inflector.mutation_input(&name)), ArgSource::Input)
						.describe("The exclusive input argument for this mutation. An object type, make sure to see documentation for this object’s fields."),
				)?;
				fields.add(field)?;
			}
		}
		ObjectKind::Payload(MutationOf::Procedure(id)) => {
			let proc = ctx.procedure(id)?;
			fields.add(client_mutation_id())?;
			if let Some(ty) = result_type(ctx, proc) {
				let name = ctx.inflector.procedure_result(proc, ctx.returned_class(proc));
				fields.add(FieldSpec::new(name, ty, FieldSource::PayloadRecord))?;
			}
			fields.add(query_field())?;
		}
		_ => {}
	}
	Ok(fields)
}

/// The `clientMutationId` echoed back by every payload.
pub(crate) fn client_mutation_id() -> FieldSpec {
	FieldSpec::new("clientMutationId", TypeRef::named(TypeRef::STRING), FieldSource::ClientMutationId)
		.describe(Some("The exact same `clientMutationId` that was provided in the mutation input, unchanged and unused. May be used by a client to track mutations."))
}

/// The `query` field of every payload.
pub(crate) fn query_field() -> FieldSpec {
	FieldSpec::new("query", TypeRef::named(QUERY), FieldSource::QueryRoot)
		.describe(Some("Our root query field type. Allows us to run any query from our mutation payload."))
}

/// The `clientMutationId` accepted by every mutation input.
pub(crate) fn client_mutation_id_input() -> InputFieldSpec {
	InputFieldSpec::new("clientMutationId", TypeRef::named(TypeRef::STRING), InputFieldSource::ClientMutationId)
		.describe(Some("An arbitrary string value with no semantic meaning. Will be included in the payload verbatim. May be used to track mutations by the client."))
}

fn input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	let InputKind::Mutation(MutationOf::Procedure(id)) = scope.kind else {
		return Ok(fields);
	};
	let proc = ctx.procedure(id)?;
	fields.add(client_mutation_id_input())?;
	for arg in procedure_args(ctx, proc, 0) {
		let ArgSource::ProcArg {
			index,
		} = arg.source
		else {
			continue;
		};
		fields.add(InputFieldSpec::new(arg.name, arg.ty, InputFieldSource::ProcArg {
			index,
		}))?;
	}
	Ok(fields)
}
