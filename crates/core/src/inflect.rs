//! GraphQL naming rules.
//!
//! Every generated name is a pure function of a catalog entity's identity and
//! its `@name`, `@fieldName` and `@foreignFieldName` tags.

use inflector::Inflector as _;

use crate::catalog::{Attribute, Class, Constraint, PgType, Procedure};
use crate::err::{Error, schema_error};

/// Turns catalog entities into GraphQL type, field and value names.
#[derive(Clone, Debug, Default)]
pub struct Inflector;

fn camel(v: &str) -> String {
	v.to_camel_case()
}

fn pascal(v: &str) -> String {
	v.to_pascal_case()
}

fn constant(v: &str) -> String {
	v.to_screaming_snake_case()
}

fn singular(v: &str) -> String {
	let s = v.to_singular();
	if s.is_empty() { v.to_owned() } else { s }
}

fn plural(v: &str) -> String {
	// Plural names are pluralized from their singular, so they stay plural
	let p = singular(v).to_plural();
	if p.is_empty() { v.to_owned() } else { p }
}

impl Inflector {
	/// The name of a class after its `@name` tag.
	pub fn class_base(&self, class: &Class) -> String {
		class.tags.string("name").unwrap_or(&class.name).to_owned()
	}

	/// The name of a column after its `@name` tag.
	pub fn attribute_base(&self, attr: &Attribute) -> String {
		attr.tags.string("name").unwrap_or(&attr.name).to_owned()
	}

	fn keys(&self, keys: &[&Attribute]) -> String {
		keys.iter().map(|a| self.attribute_base(a)).collect::<Vec<_>>().join("_and_")
	}

	/// The key phrase of a unique constraint, after its `@name` tag.
	fn unique_keys(&self, constraint: &Constraint, keys: &[&Attribute]) -> String {
		match constraint.tags.string("name") {
			Some(name) => name.to_owned(),
			None => self.keys(keys),
		}
	}

	pub fn table_type(&self, class: &Class) -> String {
		pascal(&singular(&self.class_base(class)))
	}

	pub fn all_rows(&self, class: &Class) -> String {
		camel(&format!("all_{}", plural(&self.class_base(class))))
	}

	/// The plural name of a class, as mutation errors name it.
	pub fn collection(&self, class: &Class) -> String {
		camel(&plural(&self.class_base(class)))
	}

	pub fn all_rows_list(&self, class: &Class) -> String {
		format!("{}List", self.all_rows(class))
	}

	pub fn connection(&self, class: &Class) -> String {
		pascal(&format!("{}_connection", plural(&self.class_base(class))))
	}

	pub fn edge(&self, class: &Class) -> String {
		pascal(&format!("{}_edge", plural(&self.class_base(class))))
	}

	pub fn order_by(&self, class: &Class) -> String {
		pascal(&format!("{}_order_by", plural(&self.class_base(class))))
	}

	pub fn condition(&self, class: &Class) -> String {
		format!("{}Condition", self.table_type(class))
	}

	pub fn filter(&self, class: &Class) -> String {
		format!("{}Filter", self.table_type(class))
	}

	pub fn input(&self, class: &Class) -> String {
		format!("{}Input", self.table_type(class))
	}

	pub fn patch(&self, class: &Class) -> String {
		format!("{}Patch", self.table_type(class))
	}

	/// The field holding the record in a mutation input or payload.
	pub fn table_field(&self, class: &Class) -> String {
		camel(&singular(&self.class_base(class)))
	}

	pub fn patch_field(&self, class: &Class) -> String {
		format!("{}Patch", self.table_field(class))
	}

	pub fn column(&self, attr: &Attribute) -> String {
		camel(&self.attribute_base(attr))
	}

	pub fn order_value(&self, attr: &Attribute, asc: bool) -> String {
		let dir = if asc { "asc" } else { "desc" };
		constant(&format!("{}_{dir}", self.attribute_base(attr)))
	}

	pub fn computed_order_value(&self, proc: &Procedure, class: &Class, asc: bool) -> String {
		let dir = if asc { "asc" } else { "desc" };
		constant(&format!("{}_{dir}", self.computed_base(proc, class)))
	}

	pub fn row_by_unique_key(&self, class: &Class, c: &Constraint, keys: &[&Attribute]) -> String {
		if let Some(name) = c.tags.string("fieldName") {
			return name.to_owned();
		}
		let table = singular(&self.class_base(class));
		camel(&format!("{table}_by_{}", self.unique_keys(c, keys)))
	}

	pub fn create(&self, class: &Class) -> String {
		camel(&format!("create_{}", singular(&self.class_base(class))))
	}

	/// The stem shared by the update mutations of a class, naming their payload.
	pub fn update(&self, class: &Class) -> String {
		camel(&format!("update_{}", singular(&self.class_base(class))))
	}

	/// The stem shared by the delete mutations of a class, naming their payload.
	pub fn delete(&self, class: &Class) -> String {
		camel(&format!("delete_{}", singular(&self.class_base(class))))
	}

	pub fn update_by_key(&self, class: &Class, c: &Constraint, keys: &[&Attribute]) -> String {
		let table = singular(&self.class_base(class));
		camel(&format!("update_{table}_by_{}", self.unique_keys(c, keys)))
	}

	pub fn delete_by_key(&self, class: &Class, c: &Constraint, keys: &[&Attribute]) -> String {
		let table = singular(&self.class_base(class));
		camel(&format!("delete_{table}_by_{}", self.unique_keys(c, keys)))
	}

	/// The input type of a mutation field.
	pub fn mutation_input(&self, field: &str) -> String {
		format!("{}Input", pascal(field))
	}

	/// The payload type of a mutation field.
	pub fn mutation_payload(&self, field: &str) -> String {
		format!("{}Payload", pascal(field))
	}

	/// The many-to-one field on the referencing table, such as `parentByParentId`.
	pub fn forward_relation(
		&self,
		constraint: &Constraint,
		foreign: &Class,
		keys: &[&Attribute],
	) -> String {
		if let Some(name) = constraint.tags.string("fieldName") {
			return name.to_owned();
		}
		let subject = match keys {
			[only] => {
				let base = self.attribute_base(only);
				match base.strip_suffix("_id").filter(|s| !s.is_empty()) {
					Some(stem) => stem.to_owned(),
					None => singular(&self.class_base(foreign)),
				}
			}
			_ => singular(&self.class_base(foreign)),
		};
		camel(&format!("{subject}_by_{}", self.keys(keys)))
	}

	/// The one-to-many field on the referenced table, such as `tsByParentId`.
	pub fn backward_relation(
		&self,
		constraint: &Constraint,
		table: &Class,
		keys: &[&Attribute],
	) -> String {
		if let Some(name) = constraint.tags.string("foreignFieldName") {
			return name.to_owned();
		}
		camel(&format!("{}_by_{}", plural(&self.class_base(table)), self.keys(keys)))
	}

	pub fn backward_relation_list(
		&self,
		constraint: &Constraint,
		table: &Class,
		keys: &[&Attribute],
	) -> String {
		format!("{}List", self.backward_relation(constraint, table, keys))
	}

	/// The one-to-one field on the referenced table of a unique foreign key.
	pub fn backward_relation_single(
		&self,
		constraint: &Constraint,
		table: &Class,
		keys: &[&Attribute],
	) -> String {
		if let Some(name) = constraint.tags.string("foreignFieldName") {
			return name.to_owned();
		}
		camel(&format!("{}_by_{}", singular(&self.class_base(table)), self.keys(keys)))
	}

	/// The procedure name without its `<table>_` prefix.
	fn computed_base(&self, proc: &Procedure, class: &Class) -> String {
		if let Some(name) = proc.tags.string("name") {
			return name.to_owned();
		}
		let prefix = format!("{}_", class.name);
		proc.name.strip_prefix(&prefix).unwrap_or(&proc.name).to_owned()
	}

	pub fn computed_column(&self, proc: &Procedure, class: &Class) -> String {
		camel(&self.computed_base(proc, class))
	}

	pub fn procedure(&self, proc: &Procedure) -> String {
		camel(proc.tags.string("name").unwrap_or(&proc.name))
	}

	pub fn procedure_list(&self, proc: &Procedure) -> String {
		format!("{}List", self.procedure(proc))
	}

	/// The payload field holding the result of a mutation procedure.
	pub fn procedure_result(&self, proc: &Procedure, class: Option<&Class>) -> String {
		match class {
			Some(class) if proc.returns_set => camel(&plural(&self.class_base(class))),
			Some(class) => self.table_field(class),
			None => "result".to_owned(),
		}
	}

	/// The connection type of a function returning a set of scalars.
	pub fn scalar_connection(&self, proc: &Procedure) -> String {
		pascal(&format!("{}_connection", proc.tags.string("name").unwrap_or(&proc.name)))
	}

	pub fn scalar_edge(&self, proc: &Procedure) -> String {
		pascal(&format!("{}_edge", proc.tags.string("name").unwrap_or(&proc.name)))
	}

	/// The GraphQL type of an enum or composite Postgres type.
	pub fn type_name(&self, t: &PgType) -> String {
		pascal(t.tags.string("name").unwrap_or(&t.name))
	}

	pub fn type_input(&self, t: &PgType) -> String {
		format!("{}Input", self.type_name(t))
	}

	/// The GraphQL value of a Postgres enum label.
	pub fn enum_value(&self, label: &str) -> String {
		let v = constant(label);
		match v.chars().next() {
			None => "_EMPTY_".to_owned(),
			Some(c) if c.is_ascii_digit() => format!("_{v}"),
			Some(_) => v,
		}
	}

	/// The argument name of a procedure argument.
	pub fn argument(&self, name: Option<&str>, index: usize) -> String {
		match name {
			Some(n) => camel(n),
			None => format!("arg{index}"),
		}
	}
}

/// Checks a generated name against the GraphQL name grammar.
pub fn validate_name(name: &str, origin: &str) -> Result<(), Error> {
	let mut chars = name.chars();
	let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
		&& !name.starts_with("__");
	match valid {
		true => Ok(()),
		false => Err(schema_error(format!("'{name}' generated for {origin} is not a valid GraphQL name"))),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::catalog::fixture::{column, constraint, table};
	use crate::catalog::{ConstraintKind, TagValue, oid};

	#[test]
	fn table_names() {
		let inflect = Inflector;
		let t = table(1, "user_accounts", 2);
		assert_eq!(inflect.table_type(&t), "UserAccount");
		assert_eq!(inflect.all_rows(&t), "allUserAccounts");
		assert_eq!(inflect.connection(&t), "UserAccountsConnection");
		assert_eq!(inflect.edge(&t), "UserAccountsEdge");
		assert_eq!(inflect.order_by(&t), "UserAccountsOrderBy");
		assert_eq!(inflect.condition(&t), "UserAccountCondition");
		assert_eq!(inflect.patch_field(&t), "userAccountPatch");
		assert_eq!(inflect.create(&t), "createUserAccount");
		assert_eq!(inflect.mutation_payload(&inflect.create(&t)), "CreateUserAccountPayload");
		assert_eq!(inflect.mutation_payload(&inflect.update(&t)), "UpdateUserAccountPayload");
		assert_eq!(inflect.mutation_payload(&inflect.delete(&t)), "DeleteUserAccountPayload");
	}

	#[test]
	fn self_referencing_relations() {
		let inflect = Inflector;
		let t = table(100, "t", 101);
		let parent_id = column(100, 3, "parent_id", oid::INT4, false);
		let id = column(100, 1, "id", oid::INT4, true);
		let fk = constraint(201, "fk", ConstraintKind::ForeignKey, 100, &[3], Some((100, &[1])));
		let pk = constraint(200, "pk", ConstraintKind::PrimaryKey, 100, &[1], None);
		assert_eq!(inflect.forward_relation(&fk, &t, &[&parent_id]), "parentByParentId");
		assert_eq!(inflect.backward_relation(&fk, &t, &[&parent_id]), "tsByParentId");
		assert_eq!(inflect.backward_relation_list(&fk, &t, &[&parent_id]), "tsByParentIdList");
		assert_eq!(inflect.row_by_unique_key(&t, &pk, &[&id]), "tById");
		assert_eq!(inflect.update_by_key(&t, &pk, &[&id]), "updateTById");
		assert_eq!(inflect.all_rows(&t), "allTs");
	}

	#[test]
	fn tags_override_names() {
		let inflect = Inflector;
		let mut t = table(100, "t", 101);
		t.tags.insert("name", TagValue::Text("node".into()));
		assert_eq!(inflect.table_type(&t), "Node");
		let parent_id = column(100, 3, "parent_id", oid::INT4, false);
		let mut fk = constraint(201, "fk", ConstraintKind::ForeignKey, 100, &[3], Some((100, &[1])));
		fk.tags.insert("fieldName", TagValue::Text("ancestor".into()));
		fk.tags.insert("foreignFieldName", TagValue::Text("children".into()));
		assert_eq!(inflect.forward_relation(&fk, &t, &[&parent_id]), "ancestor");
		assert_eq!(inflect.backward_relation(&fk, &t, &[&parent_id]), "children");
	}

	#[rstest]
	#[case("active", "ACTIVE")]
	#[case("in progress", "IN_PROGRESS")]
	#[case("1st", "_1ST")]
	fn enum_values(#[case] label: &str, #[case] expected: &str) {
		assert_eq!(Inflector.enum_value(label), expected);
	}

	#[rstest]
	#[case("allTs", true)]
	#[case("_private", true)]
	#[case("__typename", false)]
	#[case("1abc", false)]
	#[case("has-dash", false)]
	#[case("", false)]
	fn name_validation(#[case] name: &str, #[case] valid: bool) {
		assert_eq!(validate_name(name, "test").is_ok(), valid);
	}
}
