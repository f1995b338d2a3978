use std::path::Path;

use super::TARGET;
use crate::catalog::Catalog;
use crate::err::Error;

/// Writes an untagged catalog to `path` as JSON.
///
/// Tags are reapplied on every build, so they are not written out.
pub async fn write_cache(path: impl AsRef<Path>, catalog: &Catalog) -> Result<(), Error> {
	let path = path.as_ref();
	let mut untagged = catalog.clone();
	for n in untagged.namespaces.iter_mut() {
		n.tags = Default::default();
		n.description = None;
	}
	for c in untagged.classes.iter_mut() {
		c.tags = Default::default();
		c.description = None;
	}
	for a in untagged.attributes.iter_mut() {
		a.tags = Default::default();
		a.description = None;
	}
	for t in untagged.types.iter_mut() {
		t.tags = Default::default();
		t.description = None;
	}
	for c in untagged.constraints.iter_mut() {
		c.tags = Default::default();
		c.description = None;
	}
	for p in untagged.procedures.iter_mut() {
		p.tags = Default::default();
		p.description = None;
	}
	let json = serde_json::to_vec_pretty(&untagged)?;
	tokio::fs::write(path, json).await?;
	info!(target: TARGET, "Wrote introspection cache to {}", path.display());
	Ok(())
}

/// Loads a catalog written by [`write_cache`] and links it.
pub async fn read_cache(path: impl AsRef<Path>) -> Result<Catalog, Error> {
	let path = path.as_ref();
	info!(target: TARGET, "Reading introspection cache from {}", path.display());
	let bytes = tokio::fs::read(path).await?;
	let catalog: Catalog = serde_json::from_slice(&bytes)?;
	catalog.link()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::fixture::self_referencing;
	use crate::catalog::{ClassId, ConstraintId};
	use crate::smart::apply_tags;

	#[tokio::test]
	async fn cache_round_trip_drops_tags() {
		let mut catalog = self_referencing();
		catalog.classes[0].comment = Some("@name node".into());
		let mut catalog = catalog.link().unwrap();
		apply_tags(&mut catalog, None);
		assert!(catalog.classes[0].tags.has("name"));
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("catalog.json");
		write_cache(&path, &catalog).await.unwrap();
		let read = read_cache(&path).await.unwrap();
		let t = read.class(ClassId(100)).unwrap();
		assert!(t.tags.is_empty());
		assert_eq!(t.comment.as_deref(), Some("@name node"));
		assert_eq!(t.primary_key_id, Some(ConstraintId(200)));
	}

	#[tokio::test]
	async fn missing_cache_fails() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(read_cache(dir.path().join("nope.json")).await, Err(Error::Io(_))));
	}
}
