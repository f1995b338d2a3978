//! The introspected Postgres catalog.
//!
//! A [`Catalog`] is an arena of flat entity tables. Entities refer to each
//! other by id only, and [`Catalog::link`] computes the lookup tables and the
//! derived inverse links once, after load.

mod class;
mod constraint;
mod namespace;
mod procedure;
mod tags;
mod types;

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub use self::class::{Attribute, Class, ClassKind, Identity};
pub use self::constraint::{Constraint, ConstraintKind, Index};
pub use self::namespace::{Extension, Namespace};
pub use self::procedure::{ArgMode, ProcArg, Procedure, Volatility};
pub use self::tags::{Omit, TagValue, Tags};
pub use self::types::{PgType, TypeKind, oid};
use crate::err::{Error, introspection_error};

oid_type!(NamespaceId);
oid_type!(ClassId);
oid_type!(TypeId);
oid_type!(ConstraintId);
oid_type!(ProcId);
oid_type!(IndexId);
oid_type!(ExtensionId);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
	pub namespaces: Vec<Namespace>,
	pub classes: Vec<Class>,
	pub attributes: Vec<Attribute>,
	pub types: Vec<PgType>,
	pub constraints: Vec<Constraint>,
	pub procedures: Vec<Procedure>,
	pub indexes: Vec<Index>,
	pub extensions: Vec<Extension>,
	#[serde(skip)]
	lookup: Lookup,
}

#[derive(Clone, Debug, Default)]
struct Lookup {
	namespaces: HashMap<NamespaceId, usize>,
	classes: HashMap<ClassId, usize>,
	attributes: HashMap<ClassId, Range<usize>>,
	types: HashMap<TypeId, usize>,
	constraints: HashMap<ConstraintId, usize>,
	procedures: HashMap<ProcId, usize>,
	indexes: HashMap<ClassId, Vec<usize>>,
}

/// Builds an id to position map, failing on a repeated id.
fn positions<T, K>(items: &[T], kind: &str, key: impl Fn(&T) -> K) -> Result<HashMap<K, usize>, Error>
where
	K: std::hash::Hash + Eq + std::fmt::Display + Copy,
{
	let mut map = HashMap::with_capacity(items.len());
	for (i, item) in items.iter().enumerate() {
		let k = key(item);
		if map.insert(k, i).is_some() {
			return Err(introspection_error(format!("Duplicate {kind} id {k}")));
		}
	}
	Ok(map)
}

impl Catalog {
	/// Sorts the entity tables, builds the lookups, computes the derived
	/// links and validates every cross reference.
	pub fn link(mut self) -> Result<Self, Error> {
		// Sort namespaces and everything keyed by namespace name
		self.namespaces.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
		let ns_names: HashMap<NamespaceId, String> =
			self.namespaces.iter().map(|n| (n.id, n.name.clone())).collect();
		let ns_name = |id: &NamespaceId| ns_names.get(id).cloned().unwrap_or_default();
		self.classes.sort_by(|a, b| {
			(ns_name(&a.namespace_id), &a.name, a.id).cmp(&(ns_name(&b.namespace_id), &b.name, b.id))
		});
		self.procedures.sort_by(|a, b| {
			(ns_name(&a.namespace_id), &a.name, a.id).cmp(&(ns_name(&b.namespace_id), &b.name, b.id))
		});
		self.types.sort_by_key(|t| t.id);
		self.attributes.sort_by_key(|a| (a.class_id, a.num));
		self.indexes.sort_by(|a, b| (a.class_id, &a.name).cmp(&(b.class_id, &b.name)));
		let class_order: HashMap<ClassId, usize> =
			self.classes.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
		self.constraints.sort_by(|a, b| {
			(class_order.get(&a.class_id), &a.name, a.id).cmp(&(
				class_order.get(&b.class_id),
				&b.name,
				b.id,
			))
		});
		self.extensions.sort_by(|a, b| a.name.cmp(&b.name));
		// Build the lookup tables
		let mut lookup = Lookup {
			namespaces: positions(&self.namespaces, "namespace", |v| v.id)?,
			classes: positions(&self.classes, "class", |v| v.id)?,
			types: positions(&self.types, "type", |v| v.id)?,
			constraints: positions(&self.constraints, "constraint", |v| v.id)?,
			procedures: positions(&self.procedures, "procedure", |v| v.id)?,
			..Default::default()
		};
		let mut start = 0;
		while start < self.attributes.len() {
			let class_id = self.attributes[start].class_id;
			let mut end = start;
			while end < self.attributes.len() && self.attributes[end].class_id == class_id {
				end += 1;
			}
			lookup.attributes.insert(class_id, start..end);
			start = end;
		}
		for (i, index) in self.indexes.iter().enumerate() {
			lookup.indexes.entry(index.class_id).or_default().push(i);
		}
		self.lookup = lookup;
		self.validate()?;
		self.derive();
		Ok(self)
	}

	/// Computes the inverse links and the advisory flags.
	fn derive(&mut self) {
		let mut primary: HashMap<ClassId, ConstraintId> = HashMap::new();
		let mut own: HashMap<ClassId, Vec<ConstraintId>> = HashMap::new();
		let mut foreign: HashMap<ClassId, Vec<ConstraintId>> = HashMap::new();
		for c in self.constraints.iter() {
			own.entry(c.class_id).or_default().push(c.id);
			if c.kind == ConstraintKind::PrimaryKey {
				primary.insert(c.class_id, c.id);
			}
			if let Some(f) = c.foreign_class_id {
				foreign.entry(f).or_default().push(c.id);
			}
		}
		let config: HashSet<ClassId> =
			self.extensions.iter().flat_map(|e| e.config_class_ids.iter().copied()).collect();
		for class in self.classes.iter_mut() {
			class.primary_key_id = primary.get(&class.id).copied();
			class.constraint_ids = own.remove(&class.id).unwrap_or_default();
			class.foreign_constraint_ids = foreign.remove(&class.id).unwrap_or_default();
			class.is_extension_configuration_table = config.contains(&class.id);
		}
		let mut indexed: HashSet<(ClassId, i16)> = HashSet::new();
		let mut unique: HashSet<(ClassId, i16)> = HashSet::new();
		for index in self.indexes.iter().filter(|i| !i.is_partial) {
			if let Some(first) = index.attribute_nums.first() {
				indexed.insert((index.class_id, *first));
			}
			if index.is_unique && index.attribute_nums.len() == 1 {
				unique.insert((index.class_id, index.attribute_nums[0]));
			}
		}
		for attr in self.attributes.iter_mut() {
			attr.is_indexed = indexed.contains(&(attr.class_id, attr.num));
			attr.is_unique = unique.contains(&(attr.class_id, attr.num));
		}
		let indexes = &self.indexes;
		for c in self.constraints.iter_mut() {
			c.is_indexed = indexes
				.iter()
				.filter(|i| i.class_id == c.class_id)
				.any(|i| i.leads_with(&c.key_attribute_nums));
		}
	}

	/// Checks that every cross reference resolves.
	pub fn validate(&self) -> Result<(), Error> {
		for class in self.classes.iter() {
			self.check_namespace(class.namespace_id, &class.name)?;
			self.check_type(class.type_id, &class.name)?;
		}
		for (class_id, range) in self.lookup.attributes.iter() {
			if self.class(*class_id).is_none() {
				return Err(introspection_error(format!(
					"Attribute of unknown class {class_id} found"
				)));
			}
			let attrs = &self.attributes[range.clone()];
			for (i, attr) in attrs.iter().enumerate() {
				if attr.num < 1 {
					return Err(introspection_error(format!(
						"Attribute '{}' has an invalid number {}",
						attr.name, attr.num
					)));
				}
				if i > 0 && attrs[i - 1].num == attr.num {
					return Err(introspection_error(format!(
						"Attribute number {} is repeated in class {class_id}",
						attr.num
					)));
				}
				self.check_type(attr.type_id, &attr.name)?;
			}
		}
		for t in self.types.iter() {
			for r in [t.item_id, t.base_id, t.range_sub_id].into_iter().flatten() {
				self.check_type(r, &t.name)?;
			}
			if let Some(class_id) = t.class_id {
				self.check_class(class_id, &t.name)?;
			}
			self.check_chain(t)?;
		}
		for c in self.constraints.iter() {
			self.check_class(c.class_id, &c.name)?;
			for num in c.key_attribute_nums.iter() {
				self.check_attribute(c.class_id, *num, &c.name)?;
			}
			if let Some(foreign) = c.foreign_class_id {
				self.check_class(foreign, &c.name)?;
				for num in c.foreign_key_attribute_nums.iter() {
					self.check_attribute(foreign, *num, &c.name)?;
				}
			}
		}
		for p in self.procedures.iter() {
			self.check_namespace(p.namespace_id, &p.name)?;
			self.check_type(p.return_type_id, &p.name)?;
			for t in p.arg_type_ids.iter() {
				self.check_type(*t, &p.name)?;
			}
		}
		for index in self.indexes.iter() {
			self.check_class(index.class_id, &index.name)?;
		}
		Ok(())
	}

	fn check_namespace(&self, id: NamespaceId, from: &str) -> Result<(), Error> {
		match self.namespace(id) {
			Some(_) => Ok(()),
			None => Err(introspection_error(format!("'{from}' refers to unknown namespace {id}"))),
		}
	}

	fn check_class(&self, id: ClassId, from: &str) -> Result<(), Error> {
		match self.class(id) {
			Some(_) => Ok(()),
			None => Err(introspection_error(format!("'{from}' refers to unknown class {id}"))),
		}
	}

	fn check_type(&self, id: TypeId, from: &str) -> Result<(), Error> {
		match self.pg_type(id) {
			Some(_) => Ok(()),
			None => Err(introspection_error(format!("'{from}' refers to unknown type {id}"))),
		}
	}

	fn check_attribute(&self, class: ClassId, num: i16, from: &str) -> Result<(), Error> {
		match self.attribute(class, num) {
			Some(_) => Ok(()),
			None => Err(introspection_error(format!(
				"'{from}' refers to unknown attribute {num} of class {class}"
			))),
		}
	}

	/// Follows array, domain and range links, failing on a cycle.
	fn check_chain(&self, start: &PgType) -> Result<(), Error> {
		let mut seen = HashSet::new();
		let mut current = Some(start);
		while let Some(t) = current {
			if !seen.insert(t.id) {
				return Err(introspection_error(format!(
					"Type '{}' has a cyclic definition",
					start.name
				)));
			}
			current = t.item_id.or(t.base_id).or(t.range_sub_id).and_then(|id| self.pg_type(id));
		}
		Ok(())
	}

	pub fn namespace(&self, id: NamespaceId) -> Option<&Namespace> {
		self.lookup.namespaces.get(&id).map(|i| &self.namespaces[*i])
	}

	pub fn class(&self, id: ClassId) -> Option<&Class> {
		self.lookup.classes.get(&id).map(|i| &self.classes[*i])
	}

	pub fn pg_type(&self, id: TypeId) -> Option<&PgType> {
		self.lookup.types.get(&id).map(|i| &self.types[*i])
	}

	pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
		self.lookup.constraints.get(&id).map(|i| &self.constraints[*i])
	}

	pub fn procedure(&self, id: ProcId) -> Option<&Procedure> {
		self.lookup.procedures.get(&id).map(|i| &self.procedures[*i])
	}

	/// The attributes of a class, ordered by number.
	pub fn attributes_of(&self, class: ClassId) -> &[Attribute] {
		match self.lookup.attributes.get(&class) {
			Some(range) => &self.attributes[range.clone()],
			None => &[],
		}
	}

	pub fn attribute(&self, class: ClassId, num: i16) -> Option<&Attribute> {
		let attrs = self.attributes_of(class);
		attrs.binary_search_by_key(&num, |a| a.num).ok().map(|i| &attrs[i])
	}

	pub fn constraints_of(&self, class: &Class) -> impl Iterator<Item = &Constraint> {
		class.constraint_ids.iter().filter_map(|id| self.constraint(*id))
	}

	/// Foreign keys on other classes which reference `class`.
	pub fn foreign_constraints_of(&self, class: &Class) -> impl Iterator<Item = &Constraint> {
		class.foreign_constraint_ids.iter().filter_map(|id| self.constraint(*id))
	}

	pub fn primary_key(&self, class: &Class) -> Option<&Constraint> {
		class.primary_key_id.and_then(|id| self.constraint(id))
	}

	pub fn indexes_of(&self, class: ClassId) -> impl Iterator<Item = &Index> {
		self.lookup.indexes.get(&class).into_iter().flatten().map(|i| &self.indexes[*i])
	}

	/// The class whose row type is `type_id`.
	pub fn class_by_type(&self, type_id: TypeId) -> Option<&Class> {
		self.pg_type(type_id).and_then(|t| t.class_id).and_then(|id| self.class(id))
	}

	/// Strips domains until a non-domain type is reached.
	pub fn resolve_base_type(&self, type_id: TypeId) -> Option<&PgType> {
		let mut t = self.pg_type(type_id)?;
		while t.kind == TypeKind::Domain {
			t = self.pg_type(t.base_id?)?;
		}
		Some(t)
	}

	/// The namespace name of a class, for qualified SQL identifiers.
	pub fn namespace_name(&self, id: NamespaceId) -> &str {
		self.namespace(id).map(|n| n.name.as_str()).unwrap_or_default()
	}

	/// The key attributes of a constraint, in key order.
	pub fn key_attributes(&self, constraint: &Constraint) -> Vec<&Attribute> {
		constraint
			.key_attribute_nums
			.iter()
			.filter_map(|n| self.attribute(constraint.class_id, *n))
			.collect()
	}

	/// The referenced attributes of a foreign key, in key order.
	pub fn foreign_key_attributes(&self, constraint: &Constraint) -> Vec<&Attribute> {
		match constraint.foreign_class_id {
			Some(foreign) => constraint
				.foreign_key_attribute_nums
				.iter()
				.filter_map(|n| self.attribute(foreign, *n))
				.collect(),
			None => vec![],
		}
	}
}


#[cfg(test)]
mod tests {
	use super::fixture::*;
	use super::*;

	#[test]
	fn link_computes_inverse_links() {
		let catalog = self_referencing().link().unwrap();
		let t = catalog.class(ClassId(100)).unwrap();
		assert_eq!(t.primary_key_id, Some(ConstraintId(200)));
		assert_eq!(t.constraint_ids, vec![ConstraintId(201), ConstraintId(200)]);
		assert_eq!(t.foreign_constraint_ids, vec![ConstraintId(201)]);
		let id = catalog.attribute(ClassId(100), 1).unwrap();
		assert!(id.is_indexed);
		assert!(id.is_unique);
		assert!(!catalog.attribute(ClassId(100), 3).unwrap().is_indexed);
		assert!(catalog.constraint(ConstraintId(200)).unwrap().is_indexed);
		assert!(!catalog.constraint(ConstraintId(201)).unwrap().is_indexed);
		assert_eq!(catalog.class_by_type(TypeId(101)).map(|c| c.name.as_str()), Some("t"));
	}

	#[test]
	fn dangling_reference_fails() {
		let mut catalog = self_referencing();
		catalog.attributes.push(column(100, 4, "broken", 999, false));
		let err = catalog.link().unwrap_err();
		assert!(matches!(err, Error::Introspection(_)));
		assert!(err.to_string().contains("unknown type 999"));
	}

	#[test]
	fn repeated_attribute_number_fails() {
		let mut catalog = self_referencing();
		catalog.attributes.push(column(100, 2, "other", oid::TEXT, false));
		assert!(catalog.link().is_err());
	}

	#[test]
	fn zero_attribute_number_fails() {
		let mut catalog = self_referencing();
		catalog.attributes.push(column(100, 0, "ctid", oid::TEXT, false));
		assert!(catalog.link().is_err());
	}

	#[test]
	fn duplicate_ids_fail() {
		let mut catalog = self_referencing();
		catalog.classes.push(table(100, "u", 101));
		assert!(catalog.link().unwrap_err().to_string().contains("Duplicate class id 100"));
	}

	#[test]
	fn cyclic_domains_fail() {
		let mut catalog = self_referencing();
		catalog.types.push(PgType {
			kind: TypeKind::Domain,
			base_id: Some(TypeId(501)),
			..base_type(500, "a", "N")
		});
		catalog.types.push(PgType {
			kind: TypeKind::Domain,
			base_id: Some(TypeId(500)),
			..base_type(501, "b", "N")
		});
		assert!(catalog.link().unwrap_err().to_string().contains("cyclic"));
	}

	#[test]
	fn domains_resolve_to_base() {
		let mut catalog = self_referencing();
		catalog.types.push(PgType {
			kind: TypeKind::Domain,
			base_id: Some(TypeId(oid::TEXT)),
			..base_type(500, "email", "S")
		});
		let catalog = catalog.link().unwrap();
		assert_eq!(catalog.resolve_base_type(TypeId(500)).map(|t| t.id), Some(TypeId(oid::TEXT)));
	}

	#[test]
	fn serialization_skips_derived_state() {
		let catalog = self_referencing().link().unwrap();
		let json = serde_json::to_string(&catalog).unwrap();
		assert!(!json.contains("foreign_constraint_ids"));
		let back: Catalog = serde_json::from_str(&json).unwrap();
		let back = back.link().unwrap();
		assert_eq!(back.classes.len(), 1);
		assert_eq!(
			back.class(ClassId(100)).unwrap().foreign_constraint_ids,
			vec![ConstraintId(201)]
		);
	}
}
