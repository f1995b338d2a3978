//! The intermediate description of the schema which the hooks refine.

use async_graphql::Value;
use async_graphql::dynamic::TypeRef;
use indexmap::IndexMap;

use super::source::{ArgSource, EnumValueSource, FieldSource, InputFieldSource};
use crate::catalog::{ClassId, ConstraintId, ProcId, TypeId};
use crate::err::{Error, schema_error};

/// The innermost type name of a type reference.
pub fn named(ty: &TypeRef) -> &str {
	match ty {
		TypeRef::Named(n) => n,
		TypeRef::NonNull(t) | TypeRef::List(t) => named(t),
	}
}

/// A reference to a row collection or a procedure result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionOf {
	Class(ClassId),
	Procedure(ProcId),
}

/// What a mutation input or payload type belongs to. Payloads are shared by
/// all the update or delete mutations of a class, inputs are per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationOf {
	Create(ClassId),
	Update(ClassId),
	Delete(ClassId),
	UpdateByKey(ConstraintId),
	DeleteByKey(ConstraintId),
	Procedure(ProcId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
	Query,
	Mutation,
	PageInfo,
	/// The row of a table, view or composite type
	Record(ClassId),
	Connection {
		of: CollectionOf,
		node: TypeRef,
		edge: String,
	},
	Edge {
		of: CollectionOf,
		node: TypeRef,
	},
	Payload(MutationOf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
	/// The full record of a table or composite type
	Record(ClassId),
	Patch(ClassId),
	Condition(ClassId),
	Filter(ClassId),
	/// The operators applicable to one GraphQL type
	Operators {
		ty: String,
		textual: bool,
	},
	Mutation(MutationOf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumKind {
	Pg(TypeId),
	OrderBy(CollectionOf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectScope {
	pub name: String,
	pub kind: ObjectKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputScope {
	pub name: String,
	pub kind: InputKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumScope {
	pub name: String,
	pub kind: EnumKind,
}

/// The field whose arguments an argument hook refines.
#[derive(Debug)]
pub struct FieldScope<'a> {
	pub object: &'a ObjectScope,
	pub field: &'a FieldSpec,
}

pub trait Member {
	fn name(&self) -> &str;
}

/// The named members of a type, in the order they were added.
#[derive(Clone, Debug, Default)]
pub struct Members<T> {
	owner: String,
	items: IndexMap<String, T>,
}

impl<T: Member> Members<T> {
	pub fn new(owner: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			items: IndexMap::new(),
		}
	}

	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Adds a member, failing when the name is taken.
	pub fn add(&mut self, item: T) -> Result<(), Error> {
		let name = item.name().to_owned();
		if self.items.contains_key(&name) {
			return Err(schema_error(format!(
				"'{name}' is defined more than once on '{}'",
				self.owner
			)));
		}
		self.items.insert(name, item);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<&T> {
		self.items.get(name)
	}

	pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
		self.items.get_mut(name)
	}

	pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
		self.items.retain(|_, v| keep(v));
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.items.values()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
		self.items.values_mut()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

impl<T> IntoIterator for Members<T> {
	type Item = T;
	type IntoIter = indexmap::map::IntoValues<String, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.into_values()
	}
}

#[derive(Clone, Debug)]
pub struct ArgSpec {
	pub name: String,
	pub ty: TypeRef,
	pub description: Option<String>,
	pub default: Option<Value>,
	pub source: ArgSource,
}

impl ArgSpec {
	pub fn new(name: impl Into<String>, ty: TypeRef, source: ArgSource) -> Self {
		Self {
			name: name.into(),
			ty,
			description: None,
			default: None,
			source,
		}
	}

	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_default(mut self, value: Value) -> Self {
		self.default = Some(value);
		self
	}
}

impl Member for ArgSpec {
	fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
	pub name: String,
	pub ty: TypeRef,
	pub description: Option<String>,
	pub deprecation: Option<String>,
	pub args: Members<ArgSpec>,
	pub source: FieldSource,
}

impl FieldSpec {
	pub fn new(name: impl Into<String>, ty: TypeRef, source: FieldSource) -> Self {
		let name = name.into();
		Self {
			args: Members::new(name.clone()),
			name,
			ty,
			description: None,
			deprecation: None,
			source,
		}
	}

	pub fn describe(mut self, description: Option<impl Into<String>>) -> Self {
		self.description = description.map(Into::into);
		self
	}

	pub fn deprecate(mut self, reason: Option<impl Into<String>>) -> Self {
		self.deprecation = reason.map(Into::into);
		self
	}

	pub fn arg(mut self, arg: ArgSpec) -> Result<Self, Error> {
		self.args.add(arg)?;
		Ok(self)
	}
}

impl Member for FieldSpec {
	fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Clone, Debug)]
pub struct InputFieldSpec {
	pub name: String,
	pub ty: TypeRef,
	pub description: Option<String>,
	pub source: InputFieldSource,
}

impl InputFieldSpec {
	pub fn new(name: impl Into<String>, ty: TypeRef, source: InputFieldSource) -> Self {
		Self {
			name: name.into(),
			ty,
			description: None,
			source,
		}
	}

	pub fn describe(mut self, description: Option<impl Into<String>>) -> Self {
		self.description = description.map(Into::into);
		self
	}
}

impl Member for InputFieldSpec {
	fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Clone, Debug)]
pub struct EnumValueSpec {
	pub name: String,
	pub description: Option<String>,
	pub source: EnumValueSource,
}

impl EnumValueSpec {
	pub fn new(name: impl Into<String>, source: EnumValueSource) -> Self {
		Self {
			name: name.into(),
			description: None,
			source,
		}
	}
}

impl Member for EnumValueSpec {
	fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Clone, Debug)]
pub struct ObjectSpec {
	pub scope: ObjectScope,
	pub description: Option<String>,
	pub fields: Members<FieldSpec>,
}

#[derive(Clone, Debug)]
pub struct InputSpec {
	pub scope: InputScope,
	pub description: Option<String>,
	pub fields: Members<InputFieldSpec>,
}

#[derive(Clone, Debug)]
pub struct EnumSpec {
	pub scope: EnumScope,
	pub description: Option<String>,
	pub values: Members<EnumValueSpec>,
}

#[derive(Clone, Debug)]
pub struct ScalarSpec {
	pub name: String,
	pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub enum TypeSpec {
	Object(ObjectSpec),
	Input(InputSpec),
	Enum(EnumSpec),
	Scalar(ScalarSpec),
}

impl TypeSpec {
	pub fn object(name: impl Into<String>, kind: ObjectKind, description: Option<String>) -> Self {
		let name = name.into();
		TypeSpec::Object(ObjectSpec {
			fields: Members::new(name.clone()),
			scope: ObjectScope {
				name,
				kind,
			},
			description,
		})
	}

	pub fn input(name: impl Into<String>, kind: InputKind, description: Option<String>) -> Self {
		let name = name.into();
		TypeSpec::Input(InputSpec {
			fields: Members::new(name.clone()),
			scope: InputScope {
				name,
				kind,
			},
			description,
		})
	}

	pub fn enumeration(name: impl Into<String>, kind: EnumKind, description: Option<String>) -> Self {
		let name = name.into();
		TypeSpec::Enum(EnumSpec {
			values: Members::new(name.clone()),
			scope: EnumScope {
				name,
				kind,
			},
			description,
		})
	}

	pub fn scalar(name: impl Into<String>, description: impl Into<String>) -> Self {
		TypeSpec::Scalar(ScalarSpec {
			name: name.into(),
			description: Some(description.into()),
		})
	}

	pub fn name(&self) -> &str {
		match self {
			TypeSpec::Object(o) => &o.scope.name,
			TypeSpec::Input(i) => &i.scope.name,
			TypeSpec::Enum(e) => &e.scope.name,
			TypeSpec::Scalar(s) => &s.name,
		}
	}

	/// Describes what this type was generated for, in collision errors.
	pub fn origin(&self) -> String {
		match self {
			TypeSpec::Object(o) => format!("object {:?}", o.scope.kind),
			TypeSpec::Input(i) => format!("input {:?}", i.scope.kind),
			TypeSpec::Enum(e) => format!("enum {:?}", e.scope.kind),
			TypeSpec::Scalar(s) => format!("scalar {}", s.name),
		}
	}

	/// Whether this type has no members, which GraphQL forbids.
	pub fn is_empty(&self) -> bool {
		match self {
			TypeSpec::Object(o) => o.fields.is_empty(),
			TypeSpec::Input(i) => i.fields.is_empty(),
			TypeSpec::Enum(e) => e.values.is_empty(),
			TypeSpec::Scalar(_) => false,
		}
	}
}

/// All the types of the schema under construction, in registration order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
	types: IndexMap<String, TypeSpec>,
}

impl Registry {
	/// Registers a type. Registering the same type twice is a no-op, while
	/// two different types with the same name fail the build.
	pub fn register(&mut self, spec: TypeSpec) -> Result<(), Error> {
		let name = spec.name().to_owned();
		if let Some(existing) = self.types.get(&name) {
			let (a, b) = (existing.origin(), spec.origin());
			if a == b {
				return Ok(());
			}
			return Err(schema_error(format!(
				"Type '{name}' generated for {b} collides with the type generated for {a}"
			)));
		}
		self.types.insert(name, spec);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<&TypeSpec> {
		self.types.get(name)
	}

	pub fn get_mut(&mut self, name: &str) -> Option<&mut TypeSpec> {
		self.types.get_mut(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.types.contains_key(name)
	}

	pub fn remove(&mut self, name: &str) -> Option<TypeSpec> {
		self.types.shift_remove(name)
	}

	pub fn names(&self) -> Vec<String> {
		self.types.keys().cloned().collect()
	}

	pub fn iter(&self) -> impl Iterator<Item = &TypeSpec> {
		self.types.values()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TypeSpec> {
		self.types.values_mut()
	}

	pub fn len(&self) -> usize {
		self.types.len()
	}

	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_origin_is_memoized() {
		let mut registry = Registry::default();
		registry.register(TypeSpec::object("T", ObjectKind::Record(ClassId(1)), None)).unwrap();
		registry.register(TypeSpec::object("T", ObjectKind::Record(ClassId(1)), None)).unwrap();
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn different_origins_collide() {
		let mut registry = Registry::default();
		registry.register(TypeSpec::object("T", ObjectKind::Record(ClassId(1)), None)).unwrap();
		let err = registry
			.register(TypeSpec::object("T", ObjectKind::Record(ClassId(2)), None))
			.unwrap_err();
		assert!(matches!(err, Error::SchemaBuild(_)));
		assert!(err.to_string().contains("'T'"));
	}

	#[test]
	fn duplicate_members_fail() {
		let mut fields = Members::new("T");
		fields.add(FieldSpec::new("id", TypeRef::named(TypeRef::INT), FieldSource::QueryRoot)).unwrap();
		let err = fields
			.add(FieldSpec::new("id", TypeRef::named(TypeRef::STRING), FieldSource::QueryRoot))
			.unwrap_err();
		assert!(err.to_string().contains("'id' is defined more than once on 'T'"));
	}

	#[test]
	fn named_unwraps_modifiers() {
		let ty = TypeRef::named_nn_list_nn("T");
		assert_eq!(named(&ty), "T");
	}
}
