use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Tags;
use crate::err::{Error, tag_error};

/// The tags and description given to one entity in a tags file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagEntry {
	pub tags: Tags,
	pub description: Option<String>,
	/// Columns of a class entry, keyed by column name
	pub attribute: BTreeMap<String, TagEntry>,
	/// Constraints of a class entry, keyed by constraint name
	pub constraint: BTreeMap<String, TagEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagConfig {
	pub class: BTreeMap<String, TagEntry>,
	pub attribute: BTreeMap<String, TagEntry>,
	pub constraint: BTreeMap<String, TagEntry>,
	pub procedure: BTreeMap<String, TagEntry>,
	#[serde(rename = "type")]
	pub kind: BTreeMap<String, TagEntry>,
	pub namespace: BTreeMap<String, TagEntry>,
}

/// The contents of a `postgraphile.tags.json` file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TagFile {
	pub version: u32,
	#[serde(default)]
	pub config: TagConfig,
}

impl TagFile {
	pub fn parse(text: &str) -> Result<Self, Error> {
		let file: TagFile =
			serde_json::from_str(text).map_err(|e| tag_error(format!("Invalid tags file: {e}")))?;
		if file.version != 1 {
			return Err(tag_error(format!("Unsupported tags file version {}", file.version)));
		}
		Ok(file)
	}

	pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
		let path = path.as_ref();
		debug!(target: super::TARGET, "Loading tags file {}", path.display());
		let text = tokio::fs::read_to_string(path).await?;
		Self::parse(&text)
	}

	/// Lifts the columns and constraints nested in class entries to
	/// dotted top level keys, so that every entry is matched the same way.
	pub(super) fn flattened(&self) -> TagConfig {
		let mut config = self.config.clone();
		for (class, entry) in self.config.class.iter() {
			for (name, nested) in entry.attribute.iter() {
				config.attribute.insert(format!("{class}.{name}"), nested.clone());
			}
			for (name, nested) in entry.constraint.iter() {
				config.constraint.insert(format!("{class}.{name}"), nested.clone());
			}
		}
		config
	}
}
