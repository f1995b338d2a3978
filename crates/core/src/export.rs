//! Writes the schema definition and the introspection result to files.

use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use crate::err::{Error, schema_error};
use crate::gql::schema::BuiltSchema;

const TARGET: &str = "pgql::core::export";

/// The standard introspection query.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
	/// Where to write the schema definition
	pub graphql: Option<PathBuf>,
	/// Where to write the introspection result
	pub json: Option<PathBuf>,
	/// Order types and their members by name
	pub sort: bool,
}

impl ExportOptions {
	pub fn is_empty(&self) -> bool {
		self.graphql.is_none() && self.json.is_none()
	}
}

/// Sorts the lists of named members in an introspection result.
fn sort(json: &mut Json) {
	match json {
		Json::Object(map) => {
			for (key, value) in map.iter_mut() {
				if let ("types" | "fields" | "inputFields" | "enumValues" | "args" | "directives", Json::Array(items)) =
					(key.as_str(), &mut *value)
				{
					items.sort_by(|a, b| {
						let name = |v: &Json| v.get("name").and_then(Json::as_str).map(str::to_owned);
						name(a).cmp(&name(b))
					});
				}
				sort(value);
			}
		}
		Json::Array(items) => items.iter_mut().for_each(sort),
		_ => {}
	}
}

/// The introspection result of a schema, as written to the JSON export.
pub async fn introspection(schema: &BuiltSchema, sorted: bool) -> Result<Json, Error> {
	let response = schema.schema.execute(INTROSPECTION_QUERY).await;
	if let Some(e) = response.errors.first() {
		return Err(schema_error(format!("Could not introspect the schema: {}", e.message)));
	}
	let mut data = response.data.into_json()?;
	if sorted {
		sort(&mut data);
	}
	Ok(serde_json::json!({ "data": data }))
}

/// Writes `contents` unless the file already holds them. Returns whether the
/// file was written.
async fn write_if_changed(path: &Path, contents: &str) -> Result<bool, Error> {
	match tokio::fs::read_to_string(path).await {
		Ok(existing) if existing == contents => {
			debug!(target: TARGET, "{} is up to date", path.display());
			return Ok(false);
		}
		Ok(_) => {}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => return Err(e.into()),
	}
	tokio::fs::write(path, contents).await?;
	info!(target: TARGET, "Wrote {}", path.display());
	Ok(true)
}

/// Writes the configured exports. Returns whether any file changed.
pub async fn export_schema(schema: &BuiltSchema, opts: &ExportOptions) -> Result<bool, Error> {
	let mut changed = false;
	if let Some(path) = &opts.graphql {
		let sdl = match opts.sort {
			true => schema.sorted_sdl(),
			false => schema.sdl(),
		};
		changed |= write_if_changed(path, &sdl).await?;
	}
	if let Some(path) = &opts.json {
		let json = introspection(schema, opts.sort).await?;
		let mut text = serde_json::to_string_pretty(&json)?;
		text.push('\n');
		changed |= write_if_changed(path, &text).await?;
	}
	Ok(changed)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::catalog::fixture::self_referencing;

	#[tokio::test]
	async fn files_are_only_written_on_change() {
		let dir = tempfile::tempdir().unwrap();
		let opts = ExportOptions {
			graphql: Some(dir.path().join("schema.graphql")),
			json: Some(dir.path().join("schema.json")),
			sort: true,
		};
		let schema = build(self_referencing(), BuildOptions::default());
		assert!(export_schema(&schema, &opts).await.unwrap());
		assert!(!export_schema(&schema, &opts).await.unwrap());
		let sdl = tokio::fs::read_to_string(dir.path().join("schema.graphql")).await.unwrap();
		assert!(sdl.contains("type Query"));
		tokio::fs::write(dir.path().join("schema.graphql"), "stale").await.unwrap();
		assert!(export_schema(&schema, &opts).await.unwrap());
	}

	#[tokio::test]
	async fn introspection_names_the_root_types() {
		let schema = build(self_referencing(), BuildOptions::default());
		let json = introspection(&schema, true).await.unwrap();
		assert_eq!(json["data"]["__schema"]["queryType"]["name"], json!("Query"));
		let types = json["data"]["__schema"]["types"].as_array().unwrap();
		let names: Vec<_> = types.iter().filter_map(|t| t["name"].as_str()).collect();
		let mut sorted = names.clone();
		sorted.sort();
		assert_eq!(names, sorted);
	}

	#[test]
	fn members_are_sorted_by_name() {
		let mut json = json!({ "fields": [{ "name": "b", "args": [{ "name": "y" }, { "name": "x" }] }, { "name": "a" }] });
		sort(&mut json);
		assert_eq!(json, json!({ "fields": [{ "name": "a" }, { "name": "b", "args": [{ "name": "x" }, { "name": "y" }] }] }));
	}
}
