use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{FieldSpec, Members, ObjectScope};
use crate::build::source::FieldSource;
use crate::build::types::non_null;
use crate::err::Error;

/// Marks a forward relation non-null when every referencing column is
/// `not null`. Selected with `--append-plugins PgNonNullRelations`.
pub struct PgNonNullRelations;

impl Plugin for PgNonNullRelations {
	fn name(&self) -> &str {
		"PgNonNullRelations"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.object_fields(fields);
	}
}

fn fields(
	mut fields: Members<FieldSpec>,
	_: &ObjectScope,
	ctx: &BuildContext,
) -> Result<Members<FieldSpec>, Error> {
	for field in fields.iter_mut() {
		let FieldSource::ForwardRelation {
			constraint,
		} = field.source
		else {
			continue;
		};
		let constraint = ctx.constraint(constraint)?;
		let keys = ctx.catalog.key_attributes(constraint);
		if !keys.is_empty() && keys.iter().all(|a| a.is_not_null) {
			field.ty = non_null(field.ty.clone());
		}
	}
	Ok(fields)
}
