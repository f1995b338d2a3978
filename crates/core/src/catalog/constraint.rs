use serde::{Deserialize, Serialize};

use super::{ClassId, ConstraintId, IndexId, Tags};
use crate::err::{Error, introspection_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
	PrimaryKey,
	Unique,
	ForeignKey,
	Check,
	Exclusion,
}

impl ConstraintKind {
	/// Parses a `pg_constraint.contype` value.
	pub fn from_code(v: &str) -> Result<Self, Error> {
		match v {
			"p" => Ok(ConstraintKind::PrimaryKey),
			"u" => Ok(ConstraintKind::Unique),
			"f" => Ok(ConstraintKind::ForeignKey),
			"c" => Ok(ConstraintKind::Check),
			"x" => Ok(ConstraintKind::Exclusion),
			v => Err(introspection_error(format!("Unexpected constraint kind '{v}'"))),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Constraint {
	pub id: ConstraintId,
	pub name: String,
	pub kind: ConstraintKind,
	pub class_id: ClassId,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
	pub key_attribute_nums: Vec<i16>,
	pub foreign_class_id: Option<ClassId>,
	pub foreign_key_attribute_nums: Vec<i16>,
	/// Whether an index leads with exactly the key columns, in order
	#[serde(skip)]
	pub is_indexed: bool,
}

impl Constraint {
	/// Primary keys and unique constraints identify a single row.
	pub fn is_unique_key(&self) -> bool {
		matches!(self.kind, ConstraintKind::PrimaryKey | ConstraintKind::Unique)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Index {
	pub id: IndexId,
	pub name: String,
	pub class_id: ClassId,
	/// Zero stands for an expression column
	pub attribute_nums: Vec<i16>,
	pub is_unique: bool,
	pub is_primary: bool,
	pub is_partial: bool,
	pub attribute_properties_asc: Vec<bool>,
	pub attribute_properties_nulls_first: Vec<bool>,
}

impl Index {
	/// Whether this index can serve lookups on `nums`, in that order.
	pub fn leads_with(&self, nums: &[i16]) -> bool {
		!nums.is_empty()
			&& !self.is_partial
			&& self.attribute_nums.len() >= nums.len()
			&& self.attribute_nums.iter().zip(nums).all(|(a, b)| a == b)
	}
}
