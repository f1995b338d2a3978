use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The value of a single smart tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
	/// The tag was given without a value (`@omit`)
	Flag(bool),
	/// The tag was given once with a value (`@name person`)
	Text(String),
	/// The tag was given several times, or as a list in a tags file
	List(Vec<String>),
}

impl TagValue {
	/// The values carried by this tag, in the order they were given.
	pub fn values(&self) -> Vec<&str> {
		match self {
			TagValue::Flag(_) => vec![],
			TagValue::Text(v) => vec![v.as_str()],
			TagValue::List(v) => v.iter().map(String::as_str).collect(),
		}
	}
}

/// The smart tags attached to a catalog entity, sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, TagValue>);

impl Tags {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn get(&self, key: &str) -> Option<&TagValue> {
		self.0.get(key)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &TagValue)> {
		self.0.iter()
	}

	/// Whether the tag is present and not explicitly disabled.
	pub fn has(&self, key: &str) -> bool {
		!matches!(self.0.get(key), None | Some(TagValue::Flag(false)))
	}

	/// The first value of a tag, if it was given with one.
	pub fn string(&self, key: &str) -> Option<&str> {
		match self.0.get(key) {
			Some(TagValue::Text(v)) => Some(v.as_str()),
			Some(TagValue::List(v)) => v.first().map(String::as_str),
			_ => None,
		}
	}

	pub fn insert(&mut self, key: impl Into<String>, value: TagValue) {
		self.0.insert(key.into(), value);
	}

	/// Adds one occurrence of a tag, accumulating repeated tags into a list.
	pub fn push(&mut self, key: &str, value: Option<String>) {
		let next = match (self.0.remove(key), value) {
			(None, None) => TagValue::Flag(true),
			(None, Some(v)) => TagValue::Text(v),
			(Some(TagValue::Flag(_)), None) => TagValue::Flag(true),
			(Some(TagValue::Flag(_)), Some(v)) => TagValue::Text(v),
			(Some(TagValue::Text(a)), Some(b)) => TagValue::List(vec![a, b]),
			(Some(TagValue::Text(a)), None) => TagValue::Text(a),
			(Some(TagValue::List(mut l)), Some(v)) => {
				l.push(v);
				TagValue::List(l)
			}
			(Some(TagValue::List(l)), None) => TagValue::List(l),
		};
		self.0.insert(key.to_owned(), next);
	}

	/// Merges `other` over these tags key by key. Keys in `other` win.
	pub fn merge(&mut self, other: &Tags) {
		for (k, v) in other.0.iter() {
			self.0.insert(k.clone(), v.clone());
		}
	}

	/// Whether `@omit` hides this entity from the given action.
	pub fn omits(&self, action: Omit) -> bool {
		match self.0.get("omit") {
			None | Some(TagValue::Flag(false)) => false,
			Some(TagValue::Flag(true)) => true,
			Some(v) => v
				.values()
				.iter()
				.flat_map(|s| s.split(','))
				.map(str::trim)
				.any(|s| s.eq_ignore_ascii_case(action.as_str())),
		}
	}
}

impl FromIterator<(String, TagValue)> for Tags {
	fn from_iter<T: IntoIterator<Item = (String, TagValue)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// The actions an `@omit` tag can hide an entity from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Omit {
	Read,
	Create,
	Update,
	Delete,
	/// The root `allXs` collection
	All,
	/// The backward relation collection
	Many,
	Filter,
	Order,
	Execute,
}

impl Omit {
	pub fn as_str(&self) -> &'static str {
		match self {
			Omit::Read => "read",
			Omit::Create => "create",
			Omit::Update => "update",
			Omit::Delete => "delete",
			Omit::All => "all",
			Omit::Many => "many",
			Omit::Filter => "filter",
			Omit::Order => "order",
			Omit::Execute => "execute",
		}
	}
}

impl fmt::Display for Omit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn push_accumulates_repeated_tags() {
		let mut tags = Tags::new();
		tags.push("foreignKey", Some("(a) references b".into()));
		tags.push("foreignKey", Some("(c) references d".into()));
		tags.push("omit", None);
		assert_eq!(
			tags.get("foreignKey"),
			Some(&TagValue::List(vec!["(a) references b".into(), "(c) references d".into()]))
		);
		assert_eq!(tags.get("omit"), Some(&TagValue::Flag(true)));
	}

	#[test]
	fn merge_overrides_per_key() {
		let mut tags = Tags::new();
		tags.push("name", Some("first".into()));
		tags.push("deprecated", Some("old".into()));
		let mut file = Tags::new();
		file.push("name", Some("second".into()));
		tags.merge(&file);
		assert_eq!(tags.string("name"), Some("second"));
		assert_eq!(tags.string("deprecated"), Some("old"));
	}

	#[test]
	fn omit_actions() {
		let mut tags = Tags::new();
		tags.push("omit", Some("create, delete".into()));
		assert!(tags.omits(Omit::Create));
		assert!(tags.omits(Omit::Delete));
		assert!(!tags.omits(Omit::Update));
		assert!(!tags.omits(Omit::Read));
		let mut all = Tags::new();
		all.push("omit", None);
		assert!(all.omits(Omit::Read));
		assert!(all.omits(Omit::Execute));
	}

	#[test]
	fn deserializes_all_shapes() {
		let tags: Tags =
			serde_json::from_str(r#"{"omit": true, "name": "x", "unique": ["a", "b"]}"#).unwrap();
		assert!(tags.has("omit"));
		assert_eq!(tags.string("name"), Some("x"));
		assert_eq!(tags.get("unique"), Some(&TagValue::List(vec!["a".into(), "b".into()])));
	}
}
