use serde::{Deserialize, Serialize};

use super::{ClassId, NamespaceId, Tags, TypeId};
use crate::err::{Error, introspection_error};

/// Well known type oids from `pg_type.dat`.
pub mod oid {
	pub const BOOL: u32 = 16;
	pub const BYTEA: u32 = 17;
	pub const CHAR: u32 = 18;
	pub const NAME: u32 = 19;
	pub const INT8: u32 = 20;
	pub const INT2: u32 = 21;
	pub const INT4: u32 = 23;
	pub const TEXT: u32 = 25;
	pub const OID: u32 = 26;
	pub const JSON: u32 = 114;
	pub const XML: u32 = 142;
	pub const FLOAT4: u32 = 700;
	pub const FLOAT8: u32 = 701;
	pub const MONEY: u32 = 790;
	pub const BPCHAR: u32 = 1042;
	pub const VARCHAR: u32 = 1043;
	pub const DATE: u32 = 1082;
	pub const TIME: u32 = 1083;
	pub const TIMESTAMP: u32 = 1114;
	pub const TIMESTAMPTZ: u32 = 1184;
	pub const INTERVAL: u32 = 1186;
	pub const TIMETZ: u32 = 1266;
	pub const NUMERIC: u32 = 1700;
	pub const VOID: u32 = 2278;
	pub const UUID: u32 = 2950;
	pub const JSONB: u32 = 3802;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
	Base,
	Array,
	Composite,
	Domain,
	Enum,
	Range,
	Multirange,
	Pseudo,
}

impl TypeKind {
	/// Derives the kind from `pg_type.typtype` and `pg_type.typcategory`.
	pub fn from_codes(typtype: &str, category: &str) -> Result<Self, Error> {
		match (typtype, category) {
			("b", "A") => Ok(TypeKind::Array),
			("b", _) => Ok(TypeKind::Base),
			("c", _) => Ok(TypeKind::Composite),
			("d", _) => Ok(TypeKind::Domain),
			("e", _) => Ok(TypeKind::Enum),
			("r", _) => Ok(TypeKind::Range),
			("m", _) => Ok(TypeKind::Multirange),
			("p", _) => Ok(TypeKind::Pseudo),
			(v, _) => Err(introspection_error(format!("Unexpected type kind '{v}'"))),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PgType {
	pub id: TypeId,
	pub name: String,
	pub namespace_id: NamespaceId,
	pub namespace_name: String,
	pub kind: TypeKind,
	pub category: String,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
	/// The class of a composite type, when that class was introspected
	pub class_id: Option<ClassId>,
	/// The element type of an array
	pub item_id: Option<TypeId>,
	/// The underlying type of a domain
	pub base_id: Option<TypeId>,
	pub domain_is_not_null: bool,
	pub domain_has_default: bool,
	pub range_sub_id: Option<TypeId>,
	pub enum_variants: Vec<String>,
	pub type_length: i16,
}

impl PgType {
	pub fn is_oid(&self, oid: u32) -> bool {
		self.id.0 == oid
	}

	/// Values of these types lose precision as JSON numbers, so they travel as text.
	pub fn is_big_number(&self) -> bool {
		matches!(self.id.0, oid::INT8 | oid::NUMERIC | oid::MONEY)
	}

	pub fn is_json(&self) -> bool {
		matches!(self.id.0, oid::JSON | oid::JSONB)
	}

	/// Whether values of this type can be matched with `like` patterns.
	pub fn is_textual(&self) -> bool {
		self.category == "S" || self.name == "citext"
	}
}
