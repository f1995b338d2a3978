use serde::{Deserialize, Serialize};

use super::{ClassId, ConstraintId, NamespaceId, Tags, TypeId};
use crate::err::{Error, introspection_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
	Table,
	View,
	MaterializedView,
	ForeignTable,
	PartitionedTable,
	CompositeType,
}

impl ClassKind {
	/// Parses a `pg_class.relkind` value.
	pub fn from_relkind(v: &str) -> Result<Self, Error> {
		match v {
			"r" => Ok(ClassKind::Table),
			"v" => Ok(ClassKind::View),
			"m" => Ok(ClassKind::MaterializedView),
			"f" => Ok(ClassKind::ForeignTable),
			"p" => Ok(ClassKind::PartitionedTable),
			"c" => Ok(ClassKind::CompositeType),
			v => Err(introspection_error(format!("Unexpected relation kind '{v}'"))),
		}
	}
}

/// A table, view, materialized view or composite type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Class {
	pub id: ClassId,
	pub name: String,
	pub namespace_id: NamespaceId,
	pub kind: ClassKind,
	/// The composite type describing a row of this class
	pub type_id: TypeId,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
	pub is_selectable: bool,
	pub is_insertable: bool,
	pub is_updatable: bool,
	pub is_deletable: bool,
	pub acl_selectable: bool,
	pub acl_insertable: bool,
	pub acl_updatable: bool,
	pub acl_deletable: bool,
	#[serde(default)]
	pub is_extension_configuration_table: bool,
	#[serde(skip)]
	pub primary_key_id: Option<ConstraintId>,
	#[serde(skip)]
	pub constraint_ids: Vec<ConstraintId>,
	/// Foreign keys on other classes which reference this class
	#[serde(skip)]
	pub foreign_constraint_ids: Vec<ConstraintId>,
}

impl Class {
	/// Composite types only describe values, they hold no rows.
	pub fn has_rows(&self) -> bool {
		self.kind != ClassKind::CompositeType
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
	#[default]
	None,
	Always,
	ByDefault,
}

impl Identity {
	/// Parses a `pg_attribute.attidentity` value.
	pub fn from_code(v: &str) -> Self {
		match v {
			"a" => Identity::Always,
			"d" => Identity::ByDefault,
			_ => Identity::None,
		}
	}
}

/// A column of a class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attribute {
	pub class_id: ClassId,
	/// The 1-based ordinal of the column within its class
	pub num: i16,
	pub name: String,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
	pub type_id: TypeId,
	pub type_modifier: i32,
	pub is_not_null: bool,
	pub has_default: bool,
	pub identity: Identity,
	pub acl_selectable: bool,
	pub acl_insertable: bool,
	pub acl_updatable: bool,
	#[serde(skip)]
	pub is_indexed: bool,
	#[serde(skip)]
	pub is_unique: bool,
}
