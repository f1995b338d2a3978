//! The mapping between Postgres types and GraphQL types.

use async_graphql::dynamic::TypeRef;

use crate::catalog::{Catalog, PgType, TypeId, TypeKind, oid};

pub const BIG_INT: &str = "BigInt";
pub const BIG_FLOAT: &str = "BigFloat";
pub const CURSOR: &str = "Cursor";
pub const DATE: &str = "Date";
pub const DATETIME: &str = "Datetime";
pub const TIME: &str = "Time";
pub const INTERVAL: &str = "Interval";
pub const JSON: &str = "JSON";
pub const UUID: &str = "UUID";

/// The scalars registered on top of the GraphQL built-in ones.
pub const CUSTOM_SCALARS: [(&str, &str); 9] = [
	(BIG_INT, "A signed eight-byte integer. The upper big integer values are greater than the max value for a JavaScript number. Therefore all big integers will be output as strings and not numbers."),
	(BIG_FLOAT, "A floating point number that requires more precision than IEEE 754 binary 64"),
	(CURSOR, "A location in a connection that can be used for resuming pagination."),
	(DATE, "The day, does not include a time."),
	(DATETIME, "A point in time as described by the [ISO 8601](https://en.wikipedia.org/wiki/ISO_8601) standard. May or may not include a timezone."),
	(TIME, "The exact time of day, does not include the date. May or may not have a timezone offset."),
	(INTERVAL, "An interval of time that has passed where the smallest distinct unit is a second."),
	(JSON, "A JavaScript object encoded in the JSON format as specified by [ECMA-404](http://www.ecma-international.org/publications/files/ECMA-ST/ECMA-404.pdf)."),
	(UUID, "A universally unique identifier as defined by [RFC 4122](https://tools.ietf.org/html/rfc4122)."),
];

/// The GraphQL scalar of a Postgres base type.
pub fn scalar_of(t: &PgType) -> &'static str {
	match t.id.0 {
		oid::BOOL => TypeRef::BOOLEAN,
		oid::INT2 | oid::INT4 => TypeRef::INT,
		oid::INT8 => BIG_INT,
		oid::FLOAT4 | oid::FLOAT8 => TypeRef::FLOAT,
		oid::NUMERIC | oid::MONEY => BIG_FLOAT,
		oid::JSON | oid::JSONB => JSON,
		oid::UUID => UUID,
		oid::DATE => DATE,
		oid::TIMESTAMP | oid::TIMESTAMPTZ => DATETIME,
		oid::TIME | oid::TIMETZ => TIME,
		oid::INTERVAL => INTERVAL,
		_ => TypeRef::STRING,
	}
}

pub fn non_null(ty: TypeRef) -> TypeRef {
	match ty {
		TypeRef::NonNull(_) => ty,
		ty => TypeRef::NonNull(Box::new(ty)),
	}
}

pub fn nullable(ty: TypeRef) -> TypeRef {
	match ty {
		TypeRef::NonNull(inner) => *inner,
		ty => ty,
	}
}

/// The cast to apply to a column before it is turned into JSON, if any.
///
/// Big numbers travel as text to keep their precision, and types without a
/// native JSON representation travel as their text output.
pub fn output_cast(catalog: &Catalog, type_id: TypeId, dynamic_json: bool) -> Option<&'static str> {
	let t = catalog.resolve_base_type(type_id)?;
	match t.kind {
		TypeKind::Array => {
			let item = t.item_id?;
			output_cast(catalog, item, dynamic_json).map(|_| "text[]")
		}
		TypeKind::Enum | TypeKind::Composite => None,
		TypeKind::Range | TypeKind::Multirange | TypeKind::Pseudo => Some("text"),
		TypeKind::Domain => None,
		TypeKind::Base => {
			if t.is_big_number() {
				Some("text")
			} else if t.is_json() {
				(!dynamic_json).then_some("text")
			} else if scalar_of(t) == TypeRef::STRING && !t.is_textual() {
				Some("text")
			} else {
				None
			}
		}
	}
}

/// The qualified SQL name of a type, for parameter casts.
pub fn sql_type_name(catalog: &Catalog, type_id: TypeId) -> String {
	match catalog.pg_type(type_id) {
		Some(t) => format!("{}.{}", ident(&t.namespace_name), ident(&t.name)),
		None => "text".to_owned(),
	}
}

/// Double-quotes an identifier.
pub fn ident(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::fixture::{base_type, self_referencing};

	#[test]
	fn scalars_by_oid() {
		assert_eq!(scalar_of(&base_type(oid::INT8, "int8", "N")), BIG_INT);
		assert_eq!(scalar_of(&base_type(oid::INT4, "int4", "N")), "Int");
		assert_eq!(scalar_of(&base_type(oid::TIMESTAMPTZ, "timestamptz", "D")), DATETIME);
		assert_eq!(scalar_of(&base_type(869, "inet", "I")), "String");
	}

	#[test]
	fn big_numbers_are_cast_to_text() {
		let mut catalog = self_referencing();
		catalog.types.push(base_type(oid::INT8, "int8", "N"));
		catalog.types.push(base_type(oid::JSONB, "jsonb", "U"));
		catalog.types.push(base_type(869, "inet", "I"));
		let catalog = catalog.link().unwrap();
		assert_eq!(output_cast(&catalog, TypeId(oid::INT8), false), Some("text"));
		assert_eq!(output_cast(&catalog, TypeId(oid::INT4), false), None);
		assert_eq!(output_cast(&catalog, TypeId(oid::TEXT), false), None);
		assert_eq!(output_cast(&catalog, TypeId(oid::JSONB), false), Some("text"));
		assert_eq!(output_cast(&catalog, TypeId(oid::JSONB), true), None);
		assert_eq!(output_cast(&catalog, TypeId(869), false), Some("text"));
	}

	#[test]
	fn identifiers_are_quoted() {
		assert_eq!(ident("t"), "\"t\"");
		assert_eq!(ident("we\"ird"), "\"we\"\"ird\"");
	}

	#[test]
	fn nullability_wrappers() {
		let ty = non_null(non_null(TypeRef::named("T")));
		assert_eq!(ty, TypeRef::named_nn("T"));
		assert_eq!(nullable(ty), TypeRef::named("T"));
	}
}
