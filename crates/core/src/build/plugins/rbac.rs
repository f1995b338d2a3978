use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{
	EnumKind, EnumScope, EnumValueSpec, FieldSpec, InputFieldSpec, InputKind, InputScope, Members,
	ObjectScope,
};
use crate::build::source::{EnumValueSource, FieldSource, InputFieldSource, OrderTerm};
use crate::catalog::{Attribute, ClassId, ProcId};
use crate::err::Error;

/// Removes what the connecting roles are not granted, when RBAC pruning is
/// enabled.
pub struct PgRbacPruning;

impl Plugin for PgRbacPruning {
	fn name(&self) -> &str {
		"PgRbacPruning"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.object_fields(fields);
		hooks.input_fields(input_fields);
		hooks.enum_values(values);
	}
}

fn selectable(ctx: &BuildContext, class: ClassId) -> bool {
	ctx.catalog.class(class).is_some_and(|c| c.acl_selectable)
}

fn executable(ctx: &BuildContext, proc: ProcId) -> bool {
	ctx.catalog.procedure(proc).is_some_and(|p| p.acl_executable)
}

fn column(ctx: &BuildContext, class: ClassId, num: i16, flag: impl Fn(&Attribute) -> bool) -> bool {
	ctx.catalog.attribute(class, num).is_some_and(flag)
}

fn granted(ctx: &BuildContext, source: &FieldSource) -> bool {
	let catalog = &ctx.catalog;
	match source {
		FieldSource::Column {
			class,
			num,
		} => column(ctx, *class, *num, |a| a.acl_selectable),
		FieldSource::ForwardRelation {
			constraint,
		} => catalog
			.constraint(*constraint)
			.and_then(|c| c.foreign_class_id)
			.is_some_and(|f| selectable(ctx, f)),
		FieldSource::BackwardRelation {
			constraint,
			..
		} => catalog.constraint(*constraint).is_some_and(|c| selectable(ctx, c.class_id)),
		FieldSource::AllRows {
			class,
			..
		} => selectable(ctx, *class),
		FieldSource::RowByKey {
			constraint,
		} => catalog.constraint(*constraint).is_some_and(|c| {
			selectable(ctx, c.class_id)
				&& catalog.key_attributes(c).iter().all(|a| a.acl_selectable)
		}),
		FieldSource::ComputedColumn {
			proc,
			..
		}
		| FieldSource::Procedure {
			proc,
			..
		}
		| FieldSource::MutationProcedure {
			proc,
			..
		} => executable(ctx, *proc),
		FieldSource::Create {
			class,
		} => catalog.class(*class).is_some_and(|c| c.acl_insertable),
		FieldSource::Update {
			constraint,
		} => catalog
			.constraint(*constraint)
			.and_then(|c| catalog.class(c.class_id))
			.is_some_and(|c| c.acl_updatable),
		FieldSource::Delete {
			constraint,
		} => catalog
			.constraint(*constraint)
			.and_then(|c| catalog.class(c.class_id))
			.is_some_and(|c| c.acl_deletable),
		_ => true,
	}
}

fn fields(
	mut fields: Members<FieldSpec>,
	scope: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	if ctx.options.ignore_rbac {
		return Ok(fields);
	}
	let before = fields.len();
	fields.retain(|f| granted(ctx, &f.source));
	if fields.len() != before {
		trace!(
			target: crate::build::TARGET,
			"Pruned {} ungranted fields from {}",
			before - fields.len(),
			scope.name
		);
	}
	Ok(fields)
}

fn input_fields(
	mut fields: Members<InputFieldSpec>,
	scope: &InputScope,
	ctx: &BuildContext,
) -> Result<Members<InputFieldSpec>, Error> {
	if ctx.options.ignore_rbac {
		return Ok(fields);
	}
	let flag: fn(&Attribute) -> bool = match scope.kind {
		InputKind::Record(class) if ctx.class(class)?.has_rows() => |a: &Attribute| a.acl_insertable,
		InputKind::Patch(_) => |a: &Attribute| a.acl_updatable,
		InputKind::Condition(_) | InputKind::Filter(_) => |a: &Attribute| a.acl_selectable,
		_ => return Ok(fields),
	};
	fields.retain(|f| match &f.source {
		InputFieldSource::Column {
			class,
			num,
		} => column(ctx, *class, *num, flag),
		InputFieldSource::Computed {
			proc,
		} => executable(ctx, *proc),
		_ => true,
	});
	Ok(fields)
}

fn values(
	mut values: Members<EnumValueSpec>,
	scope: &EnumScope,
	ctx: &BuildContext,
) -> Result<Members<EnumValueSpec>, Error> {
	if ctx.options.ignore_rbac {
		return Ok(values);
	}
	let EnumKind::OrderBy(crate::build::registry::CollectionOf::Class(class)) = scope.kind else {
		return Ok(values);
	};
	values.retain(|v| match &v.source {
		EnumValueSource::Order(terms) => terms.iter().all(|t| match t {
			OrderTerm::Column {
				num,
				..
			} => column(ctx, class, *num, |a| a.acl_selectable),
			OrderTerm::Computed {
				proc,
				..
			} => executable(ctx, *proc),
		}),
		_ => true,
	});
	Ok(values)
}
