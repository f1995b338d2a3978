use async_graphql::dynamic::TypeRef;
use async_graphql::{Name, Value};

use super::{collection_class, is_scalar_computed};
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	ArgSpec, CollectionOf, EnumKind, EnumScope, EnumValueSpec, FieldScope, Members, TypeSpec,
};
use crate::build::source::{ArgSource, EnumValueSource, OrderTerm};
use crate::catalog::Omit;
use crate::err::Error;

pub const NATURAL: &str = "NATURAL";
pub const PRIMARY_KEY_ASC: &str = "PRIMARY_KEY_ASC";
pub const PRIMARY_KEY_DESC: &str = "PRIMARY_KEY_DESC";

/// The `XOrderBy` enums and the `orderBy` argument of row collections.
pub struct PgOrderBy;

impl Plugin for PgOrderBy {
	fn name(&self) -> &str {
		"PgOrderBy"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.init(init);
		hooks.enum_values(values);
		hooks.field_args(args);
	}
}

fn init(ctx: &mut BuildContext) -> Result<(), Error> {
	let catalog = ctx.catalog.clone();
	for class in catalog.classes.iter() {
		if !ctx.is_record(class) || !class.has_rows() || class.tags.omits(Omit::Order) {
			continue;
		}
		let name = ctx.inflector.order_by(class);
		let description = format!("Methods to use when ordering `{}`.", ctx.inflector.table_type(class));
		ctx.registry.register(TypeSpec::enumeration(
			name,
			EnumKind::OrderBy(CollectionOf::Class(class.id)),
			Some(description),
		))?;
	}
	Ok(())
}

fn values(
	mut values: Members<EnumValueSpec>,
	scope: &EnumScope,
	ctx: &BuildContext,
) -> Result<Members<EnumValueSpec>, Error> {
	let EnumKind::OrderBy(CollectionOf::Class(class_id)) = scope.kind else {
		return Ok(values);
	};
	let class = ctx.class(class_id)?;
	values.add(EnumValueSpec::new(NATURAL, EnumValueSource::Natural))?;
	if let Some(pk) = ctx.catalog.primary_key(class) {
		for asc in [true, false] {
			let terms = pk
				.key_attribute_nums
				.iter()
				.map(|num| OrderTerm::Column {
					num: *num,
					asc,
				})
				.collect();
			let name = match asc {
				true => PRIMARY_KEY_ASC,
				false => PRIMARY_KEY_DESC,
			};
			values.add(EnumValueSpec::new(name, EnumValueSource::Order(terms)))?;
		}
	}
	for attr in ctx.columns(class) {
		if attr.tags.omits(Omit::Order) || !(ctx.options.ignore_indexes || attr.is_indexed) {
			continue;
		}
		if ctx.output_type(attr.type_id).is_none() {
			continue;
		}
		for asc in [true, false] {
			values.add(EnumValueSpec::new(
				ctx.inflector.order_value(attr, asc),
				EnumValueSource::Order(vec![OrderTerm::Column {
					num: attr.num,
					asc,
				}]),
			))?;
		}
	}
	for proc in ctx.catalog.procedures.iter() {
		if !proc.tags.has("sortable") || !is_scalar_computed(ctx, proc, class) {
			continue;
		}
		for asc in [true, false] {
			values.add(EnumValueSpec::new(
				ctx.inflector.computed_order_value(proc, class, asc),
				EnumValueSource::Order(vec![OrderTerm::Computed {
					proc: proc.id,
					asc,
				}]),
			))?;
		}
	}
	Ok(values)
}

fn args(
	mut args: Members<ArgSpec>,
	scope: &FieldScope<'_>,
	ctx: &BuildContext,
) -> Result<Members<ArgSpec>, Error> {
	let Some((class, from_procedure)) = collection_class(ctx, &scope.field.source) else {
		return Ok(args);
	};
	if class.tags.omits(Omit::Order) {
		return Ok(args);
	}
	let name = ctx.inflector.order_by(class);
	if !ctx.registry.contains(&name) {
		return Ok(args);
	}
	let default = match ctx.catalog.primary_key(class).is_some() && !from_procedure {
		true => PRIMARY_KEY_ASC,
		false => NATURAL,
	};
	args.add(
		ArgSpec::new("orderBy", TypeRef::named_nn_list(&name), ArgSource::OrderBy)
			.describe(format!("The method to use when ordering `{}`.", ctx.inflector.table_type(class)))
			.with_default(Value::List(vec![Value::Enum(Name::new(default))])),
	)?;
	Ok(args)
}
