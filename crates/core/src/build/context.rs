use std::sync::Arc;

use async_graphql::dynamic::TypeRef;

use super::BuildOptions;
use super::registry::Registry;
use super::types::{non_null, scalar_of};
use crate::catalog::{
	Attribute, Catalog, Class, ClassId, Constraint, ConstraintId, Omit, ProcId, Procedure, TypeId,
	TypeKind,
};
use crate::err::{Error, schema_error};
use crate::inflect::Inflector;

/// The state threaded through every stage of a schema build.
pub struct BuildContext {
	pub catalog: Arc<Catalog>,
	pub inflector: Inflector,
	pub options: BuildOptions,
	pub registry: Registry,
	/// Bumped after every hook which could change the context
	pub version: u64,
}

impl BuildContext {
	pub fn new(catalog: Arc<Catalog>, options: BuildOptions) -> Self {
		Self {
			catalog,
			inflector: Inflector,
			options,
			registry: Registry::default(),
			version: 0,
		}
	}

	pub fn class(&self, id: ClassId) -> Result<&Class, Error> {
		self.catalog.class(id).ok_or_else(|| schema_error(format!("Unknown class {id}")))
	}

	pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint, Error> {
		self.catalog.constraint(id).ok_or_else(|| schema_error(format!("Unknown constraint {id}")))
	}

	pub fn procedure(&self, id: ProcId) -> Result<&Procedure, Error> {
		self.catalog.procedure(id).ok_or_else(|| schema_error(format!("Unknown procedure {id}")))
	}

	/// The classes which get an object type: tables, views and composite types
	/// which are not omitted from reads.
	pub fn record_classes(&self) -> impl Iterator<Item = &Class> {
		self.catalog.classes.iter().filter(|c| !c.tags.omits(Omit::Read))
	}

	/// The readable classes holding rows.
	pub fn row_classes(&self) -> impl Iterator<Item = &Class> {
		self.record_classes().filter(|c| c.has_rows() && c.is_selectable)
	}

	/// The readable columns of a class.
	pub fn columns<'a>(&'a self, class: &Class) -> impl Iterator<Item = &'a Attribute> {
		self.catalog.attributes_of(class.id).iter().filter(|a| !a.tags.omits(Omit::Read))
	}

	/// Whether a class gets an object type.
	pub fn is_record(&self, class: &Class) -> bool {
		!class.tags.omits(Omit::Read)
	}

	/// The GraphQL output type of a Postgres type. Domains declared `not null`
	/// map to non-null types.
	pub fn output_type(&self, type_id: TypeId) -> Option<TypeRef> {
		self.map_type(type_id, false)
	}

	/// The GraphQL input type of a Postgres type.
	pub fn input_type(&self, type_id: TypeId) -> Option<TypeRef> {
		self.map_type(type_id, true)
	}

	fn map_type(&self, type_id: TypeId, input: bool) -> Option<TypeRef> {
		let t = self.catalog.pg_type(type_id)?;
		match t.kind {
			TypeKind::Domain => {
				let inner = self.map_type(t.base_id?, input)?;
				Some(match t.domain_is_not_null {
					true => non_null(inner),
					false => inner,
				})
			}
			TypeKind::Array => {
				let item = self.map_type(t.item_id?, input)?;
				Some(TypeRef::List(Box::new(item)))
			}
			TypeKind::Enum => Some(TypeRef::named(self.inflector.type_name(t))),
			TypeKind::Composite => {
				let class = self.catalog.class(t.class_id?)?;
				if !self.is_record(class) {
					return None;
				}
				Some(TypeRef::named(match input {
					true => self.inflector.input(class),
					false => self.inflector.table_type(class),
				}))
			}
			TypeKind::Range | TypeKind::Multirange => Some(TypeRef::named(TypeRef::STRING)),
			TypeKind::Pseudo => None,
			TypeKind::Base => Some(TypeRef::named(scalar_of(t))),
		}
	}

	/// The output type of a column. `not null` columns map to non-null types.
	pub fn column_type(&self, attr: &Attribute) -> Option<TypeRef> {
		let ty = self.output_type(attr.type_id)?;
		Some(match attr.is_not_null {
			true => non_null(ty),
			false => ty,
		})
	}

	/// The class whose rows a procedure returns, if it returns table rows.
	pub fn returned_class(&self, proc: &Procedure) -> Option<&Class> {
		self.catalog.class_by_type(proc.return_type_id).filter(|c| self.is_record(c))
	}

	/// Whether a procedure can be exposed: every input argument and the
	/// return type map to a GraphQL type.
	pub fn is_exposable(&self, proc: &Procedure) -> bool {
		if proc.tags.omits(Omit::Execute) || proc.has_output_args() {
			return false;
		}
		let returns = proc.return_type_id.0 == crate::catalog::oid::VOID
			|| self.output_type(proc.return_type_id).is_some();
		returns && proc.input_args().iter().all(|a| self.input_type(a.type_id).is_some())
	}

	/// Whether a procedure is a computed column of `class`: its first
	/// argument is a row of the class and its name has the class prefix.
	pub fn is_computed_column_of(&self, proc: &Procedure, class: &Class) -> bool {
		let args = proc.input_args();
		args.first().is_some_and(|a| a.type_id == class.type_id)
			&& proc.name.starts_with(&format!("{}_", class.name))
			&& proc.namespace_id == class.namespace_id
	}

	/// The class a procedure is a computed column of, if any.
	pub fn computed_column_class(&self, proc: &Procedure) -> Option<&Class> {
		let first = proc.input_args().first()?.type_id;
		let class = self.catalog.class_by_type(first)?;
		self.is_computed_column_of(proc, class).then_some(class)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::fixture::{base_type, self_referencing};
	use crate::catalog::{PgType, TagValue, oid};

	fn context() -> BuildContext {
		let mut catalog = self_referencing();
		catalog.types.push(PgType {
			kind: TypeKind::Domain,
			base_id: Some(TypeId(oid::TEXT)),
			domain_is_not_null: true,
			..base_type(500, "email", "S")
		});
		catalog.types.push(PgType {
			kind: TypeKind::Array,
			item_id: Some(TypeId(oid::INT4)),
			..base_type(1007, "_int4", "A")
		});
		BuildContext::new(Arc::new(catalog.link().unwrap()), BuildOptions::default())
	}

	#[test]
	fn maps_postgres_types() {
		let ctx = context();
		assert_eq!(ctx.output_type(TypeId(oid::INT4)), Some(TypeRef::named("Int")));
		assert_eq!(ctx.output_type(TypeId(500)), Some(TypeRef::named_nn("String")));
		assert_eq!(ctx.output_type(TypeId(1007)), Some(TypeRef::named_list("Int")));
		assert_eq!(ctx.output_type(TypeId(101)), Some(TypeRef::named("T")));
		assert_eq!(ctx.input_type(TypeId(101)), Some(TypeRef::named("TInput")));
	}

	#[test]
	fn omitted_classes_have_no_type() {
		let mut catalog = self_referencing();
		catalog.classes[0].tags.insert("omit", TagValue::Flag(true));
		let ctx = BuildContext::new(Arc::new(catalog.link().unwrap()), BuildOptions::default());
		assert_eq!(ctx.output_type(TypeId(101)), None);
		assert_eq!(ctx.row_classes().count(), 0);
	}
}
