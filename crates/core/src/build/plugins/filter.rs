use async_graphql::dynamic::TypeRef;

use super::{collection_class, is_scalar_computed};
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, FieldScope, InputFieldSpec, InputKind, InputScope, Members, TypeSpec, named,
};
use crate::build::source::{ArgSource, FilterOp, InputFieldSource};
use crate::catalog::{Omit, TypeId, TypeKind};
use crate::err::Error;

/// The connection filter: an `XFilter` input per collection, with operator
/// inputs per scalar and the `and`, `or` and `not` combinators.
pub struct PgConnectionFilter;

impl Plugin for PgConnectionFilter {
	fn name(&self) -> &str {
		"PgConnectionFilter"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.input_fields(input_fields);
		hooks.field_args(args);
	}
}

/// The GraphQL type the operators of a value compare against, if the value
/// can be filtered on.
fn operand(ctx: &BuildContext, type_id: TypeId) -> Option<String> {
	let base = ctx.catalog.resolve_base_type(type_id)?;
	if matches!(base.kind, TypeKind::Array | TypeKind::Composite | TypeKind::Pseudo) {
		return None;
	}
	ctx.input_type(type_id).map(|ty| named(&ty).to_owned())
}

fn operators_name(ty: &str) -> String {
	format!("{ty}Filter")
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	let mut operands = Vec::new();
	for class in catalog.classes.iter() {
		if !ctx.is_record(class) || !class.has_rows() || class.tags.omits(Omit::Filter) {
			continue;
		}
		let name = ctx.inflector.table_type(class);
		ctx.registry.register(TypeSpec::input(
			ctx.inflector.filter(class),
			InputKind::Filter(class.id),
			Some(format!(
				"A filter to be used against `{name}` object types. All fields are combined with a logical ‘and.’"
			)),
		))?;
		for attr in ctx.columns(class).filter(|a| !a.tags.omits(Omit::Filter)) {
			operands.extend(operand(ctx, attr.type_id));
		}
		for proc in catalog.procedures.iter() {
			if proc.tags.has("filterable") && is_scalar_computed(ctx, proc, class) {
				operands.extend(operand(ctx, proc.return_type_id));
			}
		}
	}
	for ty in operands {
		let textual = ty == TypeRef::STRING;
		ctx.registry.register(TypeSpec::input(
			operators_name(&ty),
			InputKind::Operators {
				ty: ty.clone(),
				textual,
			},
			Some(format!(
				"A filter to be used against {ty} fields. All fields are combined with a logical ‘and.’"
			)),
		))?;
	}
	Ok(())
}

fn input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	match &scope.kind {
		InputKind::Filter(class_id) => {
			let class = ctx.class(*class_id)?;
			for attr in ctx.columns(class) {
				if attr.tags.omits(Omit::Filter) || !(ctx.options.ignore_indexes || attr.is_indexed) {
					continue;
				}
				let Some(ty) = operand(ctx, attr.type_id) else {
					continue;
				};
				let column = ctx.inflector.column(attr);
				fields.add(
					InputFieldSpec::new(&column, TypeRef::named(operators_name(&ty)), InputFieldSource::Column {
						class: class.id,
						num: attr.num,
					})
					.describe(Some(format!("Filter by the object’s `{column}` field."))),
				)?;
			}
			for proc in ctx.catalog.procedures.iter() {
				if !proc.tags.has("filterable") || !is_scalar_computed(ctx, proc, class) {
					continue;
				}
				let Some(ty) = operand(ctx, proc.return_type_id) else {
					continue;
				};
				let field = ctx.inflector.computed_column(proc, class);
				fields.add(
					InputFieldSpec::new(&field, TypeRef::named(operators_name(&ty)), InputFieldSource::Computed {
						proc: proc.id,
					})
					.describe(Some(format!("Filter by the object’s `{field}` field."))),
				)?;
			}
			let own = scope.name.as_str();
			fields.add(
				InputFieldSpec::new("and", TypeRef::named_nn_list(own), InputFieldSource::And)
					.describe(Some("Checks for all expressions in this list.")),
			)?;
			fields.add(
				InputFieldSpec::new("or", TypeRef::named_nn_list(own), InputFieldSource::Or)
					.describe(Some("Checks for any expressions in this list.")),
			)?;
			fields.add(
				InputFieldSpec::new("not", TypeRef::named(own), InputFieldSource::Not)
					.describe(Some("Negates the expression.")),
			)?;
		}
		InputKind::Operators {
			ty,
			textual,
		} => {
			let text: &[FilterOp] = match textual {
				true => &FilterOp::TEXT,
				false => &[],
			};
			for op in FilterOp::BASIC.iter().chain(text) {
				let field_ty = match op {
					FilterOp::IsNull => TypeRef::named(TypeRef::BOOLEAN),
					FilterOp::In | FilterOp::NotIn => TypeRef::named_nn_list(ty),
					_ => TypeRef::named(ty),
				};
				fields.add(
					InputFieldSpec::new(op.name(), field_ty, InputFieldSource::Operator(*op))
						.describe(Some(describe(*op))),
				)?;
			}
		}
		_ => {}
	}
	Ok(fields)
}

fn describe(op: FilterOp) -> &'static str {
	match op {
		FilterOp::IsNull => "Is null (if `true` is specified) or is not null (if `false` is specified).",
		FilterOp::EqualTo => "Equal to the specified value.",
		FilterOp::NotEqualTo => "Not equal to the specified value.",
		FilterOp::DistinctFrom => "Not equal to the specified value, treating null like an ordinary value.",
		FilterOp::NotDistinctFrom => "Equal to the specified value, treating null like an ordinary value.",
		FilterOp::LessThan => "Less than the specified value.",
		FilterOp::LessThanOrEqualTo => "Less than or equal to the specified value.",
		FilterOp::GreaterThan => "Greater than the specified value.",
		FilterOp::GreaterThanOrEqualTo => "Greater than or equal to the specified value.",
		FilterOp::In => "Included in the specified list.",
		FilterOp::NotIn => "Not included in the specified list.",
		FilterOp::Includes => "Contains the specified string (case-sensitive).",
		FilterOp::NotIncludes => "Does not contain the specified string (case-sensitive).",
		FilterOp::StartsWith => "Starts with the specified string (case-sensitive).",
		FilterOp::EndsWith => "Ends with the specified string (case-sensitive).",
		FilterOp::Like => "Matches the specified pattern (case-sensitive). An underscore (_) matches any single character; a percent sign (%) matches any sequence of zero or more characters.",
		FilterOp::NotLike => "Does not match the specified pattern (case-sensitive). An underscore (_) matches any single character; a percent sign (%) matches any sequence of zero or more characters.",
		FilterOp::IncludesInsensitive => "Contains the specified string (case-insensitive).",
		FilterOp::LikeInsensitive => "Matches the specified pattern (case-insensitive). An underscore (_) matches any single character; a percent sign (%) matches any sequence of zero or more characters.",
	}
}

fn args(
	mut args: Members<ArgSpec>,
	scope: &FieldScope<'_>,
	ctx: &BuildContext,
) -> Result<Members<ArgSpec>, Error> {
	let Some((class, _)) = collection_class(ctx, &scope.field.source) else {
		return Ok(args);
	};
	let name = ctx.inflector.filter(class);
	if class.tags.omits(Omit::Filter) || !ctx.registry.contains(&name) {
		return Ok(args);
	}
	args.add(
		ArgSpec::new("filter", TypeRef::named(name), ArgSource::Filter)
			.describe("A filter to be used in determining which values should be returned by the collection."),
	)?;
	Ok(args)
}
