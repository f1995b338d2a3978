//! Conversions between GraphQL values, Postgres text values and the JSON
//! documents the statements produce.

use async_graphql::dynamic::{FieldValue, TypeRef};
use async_graphql::{Name, Value};
use serde_json::Value as Json;

use super::cursor;
use super::error::{GqlError, internal_error, validation_error};
use super::{Engine, Row};
use crate::build::Blueprint;
use crate::build::source::EnumValueSource;
use crate::build::types::CURSOR;
use crate::catalog::{TypeId, TypeKind};
use crate::inflect::Inflector;

/// Quotes an element of an array or record literal.
fn quote(text: &str) -> String {
	format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn scalar(value: &Value) -> Result<String, GqlError> {
	match value {
		Value::String(s) => Ok(s.clone()),
		Value::Number(n) => Ok(n.to_string()),
		Value::Boolean(b) => Ok(b.to_string()),
		Value::Enum(n) => Ok(n.to_string()),
		v => Err(validation_error(format!("Expected a scalar value, got {v}"))),
	}
}

/// Converts an input value into the text Postgres parses as `type_id`.
pub fn to_text(engine: &Engine, type_id: TypeId, value: &Value) -> Result<Option<String>, GqlError> {
	if matches!(value, Value::Null) {
		return Ok(None);
	}
	let t = engine
		.catalog
		.resolve_base_type(type_id)
		.ok_or_else(|| internal_error(format!("Type {type_id} is not in the catalog")))?;
	match t.kind {
		TypeKind::Array => {
			let item = t.item_id.ok_or_else(|| internal_error(format!("Array type {} has no item", t.name)))?;
			let Value::List(items) = value else {
				return Err(validation_error(format!("Expected a list, got {value}")));
			};
			let mut parts = Vec::with_capacity(items.len());
			for v in items {
				parts.push(match to_text(engine, item, v)? {
					Some(text) => quote(&text),
					None => "NULL".to_owned(),
				});
			}
			Ok(Some(format!("{{{}}}", parts.join(","))))
		}
		TypeKind::Composite => {
			let class = t.class_id.ok_or_else(|| internal_error(format!("Composite type {} has no class", t.name)))?;
			let Value::Object(fields) = value else {
				return Err(validation_error(format!("Expected an object, got {value}")));
			};
			let mut parts = vec![];
			for attr in engine.catalog.attributes_of(class) {
				let v = fields.get(Inflector.column(attr).as_str()).unwrap_or(&Value::Null);
				parts.push(match to_text(engine, attr.type_id, v)? {
					Some(text) => quote(&text),
					None => String::new(),
				});
			}
			Ok(Some(format!("({})", parts.join(","))))
		}
		TypeKind::Enum => {
			let ty = Inflector.type_name(t);
			let name = scalar(value)?;
			match engine.blueprint.enum_value(&ty, &name) {
				Some(EnumValueSource::Label(label)) => Ok(Some(label.clone())),
				_ => Err(validation_error(format!("Value `{name}` does not exist in `{ty}` enum"))),
			}
		}
		_ if t.is_json() => match value {
			Value::String(s) if !engine.blueprint.dynamic_json => Ok(Some(s.clone())),
			v => {
				let json = v.clone().into_json().map_err(|e| validation_error(e.to_string()))?;
				Ok(Some(json.to_string()))
			}
		},
		_ => scalar(value).map(Some),
	}
}

/// Converts part of a statement result into the value of a field of type `ty`.
pub fn to_field_value<'a>(
	blueprint: &Blueprint,
	ty: &TypeRef,
	json: Json,
) -> Result<Option<FieldValue<'a>>, GqlError> {
	if json.is_null() {
		return Ok(None);
	}
	match ty {
		TypeRef::NonNull(inner) => to_field_value(blueprint, inner, json),
		TypeRef::List(inner) => {
			let Json::Array(items) = json else {
				return Err(internal_error(format!("Expected a list for {ty}")));
			};
			let mut values = Vec::with_capacity(items.len());
			for item in items {
				values.push(to_field_value(blueprint, inner, item)?.unwrap_or(FieldValue::NULL));
			}
			Ok(Some(FieldValue::list(values)))
		}
		TypeRef::Named(name) => {
			if blueprint.objects.contains(&name[..]) {
				return Ok(Some(FieldValue::owned_any(Row(json))));
			}
			if name == CURSOR {
				return Ok(Some(FieldValue::value(cursor::encode(&json))));
			}
			if let Some(Json::String(label)) = blueprint.enums.contains_key(&name[..]).then_some(&json) {
				let value = blueprint
					.enum_name(name, label)
					.ok_or_else(|| internal_error(format!("`{label}` is not a value of {name}")))?;
				return Ok(Some(FieldValue::value(Value::Enum(Name::new(value)))));
			}
			let value = Value::from_json(json).map_err(|e| internal_error(e.to_string()))?;
			Ok(Some(FieldValue::value(value)))
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use serde_json::json;

	use super::*;
	use crate::build::plugins::testing::build;
	use crate::build::BuildOptions;
	use crate::catalog::fixture::{base_type, column, self_referencing};
	use crate::catalog::{PgType, oid};

	fn engine() -> Engine {
		let mut catalog = self_referencing();
		catalog.types.push(PgType {
			kind: TypeKind::Enum,
			enum_variants: vec!["red".into(), "light blue".into()],
			..base_type(500, "colour", "E")
		});
		catalog.types.push(PgType {
			kind: TypeKind::Array,
			item_id: Some(TypeId(oid::TEXT)),
			..base_type(1009, "_text", "A")
		});
		catalog.types.push(base_type(oid::JSONB, "jsonb", "U"));
		catalog.attributes.push(column(100, 4, "colour", 500, false));
		let schema = build(catalog, BuildOptions::default());
		Engine::new(schema.catalog.clone(), schema.blueprint.clone())
	}

	#[test]
	fn scalars_travel_as_text() {
		let engine = engine();
		assert_eq!(to_text(&engine, TypeId(oid::INT4), &Value::from(2)).unwrap(), Some("2".into()));
		assert_eq!(to_text(&engine, TypeId(oid::TEXT), &Value::Null).unwrap(), None);
		assert!(to_text(&engine, TypeId(oid::INT4), &Value::List(vec![])).is_err());
	}

	#[test]
	fn arrays_and_records_are_literals() {
		let engine = engine();
		let list = Value::List(vec![Value::from("a\"b"), Value::Null]);
		assert_eq!(to_text(&engine, TypeId(1009), &list).unwrap(), Some("{\"a\\\"b\",NULL}".into()));
		let record = Value::from_json(json!({ "id": 1, "name": "x" })).unwrap();
		assert_eq!(to_text(&engine, TypeId(101), &record).unwrap(), Some("(\"1\",\"x\",,)".into()));
	}

	#[test]
	fn enums_and_json() {
		let engine = engine();
		let colour = Value::Enum(Name::new("LIGHT_BLUE"));
		assert_eq!(to_text(&engine, TypeId(500), &colour).unwrap(), Some("light blue".into()));
		assert!(to_text(&engine, TypeId(500), &Value::Enum(Name::new("GREEN"))).is_err());
		let doc = Value::from("{\"a\":1}");
		assert_eq!(to_text(&engine, TypeId(oid::JSONB), &doc).unwrap(), Some("{\"a\":1}".into()));
	}

	#[test]
	fn results_become_field_values() {
		let engine = engine();
		let blueprint = Arc::clone(&engine.blueprint);
		let colour = to_field_value(&blueprint, &TypeRef::named("Colour"), json!("light blue")).unwrap().unwrap();
		assert_eq!(colour.as_value(), Some(&Value::Enum(Name::new("LIGHT_BLUE"))));
		let row = to_field_value(&blueprint, &TypeRef::named_nn("T"), json!({ "id": 1 })).unwrap().unwrap();
		assert_eq!(row.try_downcast_ref::<Row>().unwrap(), &Row(json!({ "id": 1 })));
		let list = to_field_value(&blueprint, &TypeRef::named_list("Int"), json!([1, null])).unwrap().unwrap();
		assert_eq!(list.as_list().map(<[_]>::len), Some(2));
		assert!(to_field_value(&blueprint, &TypeRef::named("Int"), Json::Null).unwrap().is_none());
		let cursor = to_field_value(&blueprint, &TypeRef::named(CURSOR), json!(["NATURAL", ["1"]])).unwrap().unwrap();
		assert_eq!(cursor.as_value(), Some(&Value::from(cursor::encode(&json!(["NATURAL", ["1"]])))));
	}
}
