//! Smart tags: naming, visibility and behavior overrides read from database
//! comments and from a tags file.

mod comment;
mod file;

use std::collections::{BTreeMap, HashMap};

pub use self::comment::{Parsed, parse_comment};
pub use self::file::{TagConfig, TagEntry, TagFile};
use crate::catalog::{Catalog, ClassId, NamespaceId, Tags};

const TARGET: &str = "pgql::core::smart";

/// What happened while applying tags to a catalog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagReport {
	/// Tags file keys which matched no entity
	pub unmatched: Vec<String>,
	/// Entities whose comment could not be parsed
	pub malformed: Vec<String>,
}

/// Replaces the tags and description of an entity with those of its comment.
fn apply_comment(
	what: String,
	comment: Option<&str>,
	tags: &mut Tags,
	description: &mut Option<String>,
	report: &mut TagReport,
) {
	let Some(text) = comment else {
		*tags = Tags::new();
		*description = None;
		return;
	};
	match parse_comment(text) {
		Ok(parsed) => {
			*tags = parsed.tags;
			*description = parsed.description;
		}
		Err(e) => {
			warn!(target: TARGET, "Ignoring smart tags on {what}: {e}");
			report.malformed.push(what);
			*tags = Tags::new();
			*description = Some(text.trim().to_owned()).filter(|d| !d.is_empty());
		}
	}
}

/// Finds the entities each entry of a tags file section applies to.
///
/// A key matches an entity when its dotted parts are a suffix of the entity's
/// qualified path and it has at least `min` parts. The matches are ordered so
/// that less qualified keys come first, and qualified keys are applied last.
fn matches<'a>(
	section: &str,
	entries: &'a BTreeMap<String, TagEntry>,
	paths: &[Vec<&str>],
	min: usize,
	report: &mut TagReport,
) -> Vec<(usize, &'a TagEntry)> {
	let mut keys: Vec<(&String, Vec<&str>, &TagEntry)> =
		entries.iter().map(|(k, e)| (k, k.split('.').collect(), e)).collect();
	keys.sort_by_key(|(_, parts, _)| parts.len());
	let mut found = Vec::new();
	for (key, parts, entry) in keys {
		let before = found.len();
		if parts.len() >= min {
			for (i, path) in paths.iter().enumerate() {
				if path.len() >= parts.len() && path[path.len() - parts.len()..] == parts[..] {
					found.push((i, entry));
				}
			}
		}
		if found.len() == before {
			warn!(target: TARGET, "The {section} '{key}' in the tags file matches nothing");
			report.unmatched.push(format!("{section}:{key}"));
		}
	}
	found
}

/// Merges one tags file entry over an entity.
fn merge_entry(entry: &TagEntry, tags: &mut Tags, description: &mut Option<String>) {
	tags.merge(&entry.tags);
	if let Some(d) = &entry.description {
		*description = Some(d.clone());
	}
}

/// Decorates every entity of the catalog with the smart tags of its comment,
/// then with the tags file entries which apply to it.
///
/// Any tags from a previous application are replaced.
pub fn apply_tags(catalog: &mut Catalog, file: Option<&TagFile>) -> TagReport {
	let mut report = TagReport::default();
	let namespaces: HashMap<_, String> =
		catalog.namespaces.iter().map(|n| (n.id, n.name.clone())).collect();
	let ns = |id: NamespaceId| namespaces.get(&id).cloned().unwrap_or_default();
	let classes: HashMap<ClassId, (String, String)> =
		catalog.classes.iter().map(|c| (c.id, (ns(c.namespace_id), c.name.clone()))).collect();
	let class = |id: ClassId| classes.get(&id).cloned().unwrap_or_default();
	// Comments
	for n in catalog.namespaces.iter_mut() {
		let what = format!("schema {}", n.name);
		apply_comment(what, n.comment.as_deref(), &mut n.tags, &mut n.description, &mut report);
	}
	for c in catalog.classes.iter_mut() {
		let what = format!("table {}.{}", ns(c.namespace_id), c.name);
		apply_comment(what, c.comment.as_deref(), &mut c.tags, &mut c.description, &mut report);
	}
	for a in catalog.attributes.iter_mut() {
		let (n, t) = class(a.class_id);
		let what = format!("column {n}.{t}.{}", a.name);
		apply_comment(what, a.comment.as_deref(), &mut a.tags, &mut a.description, &mut report);
	}
	for c in catalog.constraints.iter_mut() {
		let (n, t) = class(c.class_id);
		let what = format!("constraint {} on {n}.{t}", c.name);
		apply_comment(what, c.comment.as_deref(), &mut c.tags, &mut c.description, &mut report);
	}
	for p in catalog.procedures.iter_mut() {
		let what = format!("function {}.{}", ns(p.namespace_id), p.name);
		apply_comment(what, p.comment.as_deref(), &mut p.tags, &mut p.description, &mut report);
	}
	for t in catalog.types.iter_mut() {
		let what = format!("type {}.{}", t.namespace_name, t.name);
		apply_comment(what, t.comment.as_deref(), &mut t.tags, &mut t.description, &mut report);
	}
	// Tags file
	let Some(file) = file else {
		return report;
	};
	let config = file.flattened();
	let paths: Vec<Vec<String>> = catalog.namespaces.iter().map(|n| vec![n.name.clone()]).collect();
	for (i, e) in matches("namespace", &config.namespace, &borrowed(&paths), 1, &mut report) {
		let n = &mut catalog.namespaces[i];
		merge_entry(e, &mut n.tags, &mut n.description);
	}
	let paths: Vec<Vec<String>> =
		catalog.classes.iter().map(|c| vec![ns(c.namespace_id), c.name.clone()]).collect();
	for (i, e) in matches("class", &config.class, &borrowed(&paths), 1, &mut report) {
		let c = &mut catalog.classes[i];
		merge_entry(e, &mut c.tags, &mut c.description);
	}
	let paths: Vec<Vec<String>> = catalog
		.attributes
		.iter()
		.map(|a| {
			let (n, t) = class(a.class_id);
			vec![n, t, a.name.clone()]
		})
		.collect();
	for (i, e) in matches("attribute", &config.attribute, &borrowed(&paths), 2, &mut report) {
		let a = &mut catalog.attributes[i];
		merge_entry(e, &mut a.tags, &mut a.description);
	}
	let paths: Vec<Vec<String>> = catalog
		.constraints
		.iter()
		.map(|c| {
			let (n, t) = class(c.class_id);
			vec![n, t, c.name.clone()]
		})
		.collect();
	for (i, e) in matches("constraint", &config.constraint, &borrowed(&paths), 2, &mut report) {
		let c = &mut catalog.constraints[i];
		merge_entry(e, &mut c.tags, &mut c.description);
	}
	let paths: Vec<Vec<String>> =
		catalog.procedures.iter().map(|p| vec![ns(p.namespace_id), p.name.clone()]).collect();
	for (i, e) in matches("procedure", &config.procedure, &borrowed(&paths), 1, &mut report) {
		let p = &mut catalog.procedures[i];
		merge_entry(e, &mut p.tags, &mut p.description);
	}
	let paths: Vec<Vec<String>> =
		catalog.types.iter().map(|t| vec![t.namespace_name.clone(), t.name.clone()]).collect();
	for (i, e) in matches("type", &config.kind, &borrowed(&paths), 1, &mut report) {
		let t = &mut catalog.types[i];
		merge_entry(e, &mut t.tags, &mut t.description);
	}
	report
}

fn borrowed(paths: &[Vec<String>]) -> Vec<Vec<&str>> {
	paths.iter().map(|p| p.iter().map(String::as_str).collect()).collect()
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;
	use crate::catalog::fixture::self_referencing;
	use crate::catalog::{ClassId, ConstraintId, Omit};

	#[test]
	fn comments_become_tags() {
		let mut catalog = self_referencing();
		catalog.classes[0].comment = Some("A tree.\n@name node\n@omit delete".into());
		catalog.attributes[1].comment = Some("@deprecated Use title".into());
		let mut catalog = catalog.link().unwrap();
		let report = apply_tags(&mut catalog, None);
		assert_eq!(report, TagReport::default());
		let t = catalog.class(ClassId(100)).unwrap();
		assert_eq!(t.tags.string("name"), Some("node"));
		assert!(t.tags.omits(Omit::Delete));
		assert_eq!(t.description.as_deref(), Some("A tree."));
		let name = catalog.attribute(ClassId(100), 2).unwrap();
		assert_eq!(name.tags.string("deprecated"), Some("Use title"));
		assert_eq!(name.description, None);
	}

	#[test]
	fn malformed_comments_keep_the_description() {
		let mut catalog = self_referencing();
		catalog.classes[0].comment = Some("@name a\nsome text\n@omit".into());
		let mut catalog = catalog.link().unwrap();
		let report = apply_tags(&mut catalog, None);
		assert_eq!(report.malformed, vec!["table public.t".to_string()]);
		let t = catalog.class(ClassId(100)).unwrap();
		assert!(t.tags.is_empty());
		assert_eq!(t.description.as_deref(), Some("@name a\nsome text\n@omit"));
	}

	#[test]
	fn file_tags_override_comment_tags() {
		let mut catalog = self_referencing();
		catalog.classes[0].comment = Some("Comment.\n@name node\n@omit delete".into());
		let mut catalog = catalog.link().unwrap();
		let file = TagFile::parse(
			r#"{"version": 1, "config": {
				"class": {
					"t": {"tags": {"name": "bare"}},
					"public.t": {
						"tags": {"name": "qualified"},
						"description": "From file",
						"attribute": {"parent_id": {"tags": {"name": "ancestor_id"}}}
					}
				},
				"constraint": {"t.t_parent_id_fkey": {"tags": {"fieldName": "ancestor"}}},
				"procedure": {"missing": {"tags": {"omit": true}}}
			}}"#,
		)
		.unwrap();
		let report = apply_tags(&mut catalog, Some(&file));
		assert_eq!(report.unmatched, vec!["procedure:missing".to_string()]);
		let t = catalog.class(ClassId(100)).unwrap();
		assert_eq!(t.tags.string("name"), Some("qualified"));
		assert!(t.tags.omits(Omit::Delete));
		assert_eq!(t.description.as_deref(), Some("From file"));
		let parent = catalog.attribute(ClassId(100), 3).unwrap();
		assert_eq!(parent.tags.string("name"), Some("ancestor_id"));
		let fk = catalog.constraint(ConstraintId(201)).unwrap();
		assert_eq!(fk.tags.string("fieldName"), Some("ancestor"));
	}

	#[test]
	fn reapplying_starts_from_comments() {
		let mut catalog = self_referencing().link().unwrap();
		let file =
			TagFile::parse(r#"{"version": 1, "config": {"class": {"t": {"tags": {"omit": true}}}}}"#)
				.unwrap();
		apply_tags(&mut catalog, Some(&file));
		assert!(catalog.classes[0].tags.has("omit"));
		apply_tags(&mut catalog, None);
		assert!(catalog.classes[0].tags.is_empty());
	}
}
