use serde::{Deserialize, Serialize};

use super::{ClassId, ExtensionId, NamespaceId, Tags};

/// A Postgres schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Namespace {
	pub id: NamespaceId,
	pub name: String,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
}

/// An installed extension.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Extension {
	pub id: ExtensionId,
	pub name: String,
	/// Only set when the extension lives in one of the introspected namespaces
	pub namespace_id: Option<NamespaceId>,
	pub relocatable: bool,
	pub version: String,
	/// The tables registered through `pg_extension_config_dump`
	pub config_class_ids: Vec<ClassId>,
}
