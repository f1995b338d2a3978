//! Connection cursors: `base64(JSON([order name, [values...]]))`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as Json;

use super::error::{GqlError, validation_error};

/// A decoded cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
	/// The ordering the cursor was minted under
	pub order: String,
	/// The text values of the ordering columns
	pub values: Vec<Option<String>>,
}

/// Encodes the JSON cursor produced by a statement.
pub fn encode(value: &Json) -> String {
	STANDARD.encode(value.to_string())
}

fn invalid() -> GqlError {
	validation_error("Invalid cursor")
}

/// Decodes a cursor minted under `order` with `len` values.
pub fn decode(text: &str, order: &str, len: usize) -> Result<Cursor, GqlError> {
	let bytes = STANDARD.decode(text).map_err(|_| invalid())?;
	let json: Json = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
	let Json::Array(parts) = json else {
		return Err(invalid());
	};
	let [Json::String(name), Json::Array(values)] = parts.as_slice() else {
		return Err(invalid());
	};
	if name != order || values.len() != len {
		return Err(validation_error(
			"Invalid cursor, the cursor was created with a different ordering",
		));
	}
	let values = values
		.iter()
		.map(|v| match v {
			Json::Null => Ok(None),
			Json::String(s) => Ok(Some(s.clone())),
			_ => Err(invalid()),
		})
		.collect::<Result<_, _>>()?;
	Ok(Cursor {
		order: name.clone(),
		values,
	})
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[test]
	fn cursors_decode_strictly() {
		let text = encode(&json!(["PRIMARY_KEY_ASC", ["2", null]]));
		let cursor = decode(&text, "PRIMARY_KEY_ASC", 2).unwrap();
		assert_eq!(cursor.values, vec![Some("2".to_owned()), None]);
	}

	#[rstest]
	#[case("not base64!")]
	#[case("bnVsbA==")]
	#[case("WyJQUklNQVJZX0tFWV9BU0MiXQ==")]
	fn malformed_cursors_fail(#[case] text: &str) {
		let err = decode(text, "PRIMARY_KEY_ASC", 1).unwrap_err();
		assert!(matches!(err, GqlError::Validation(_)));
	}

	#[test]
	fn cursors_of_another_ordering_fail() {
		let text = encode(&json!(["NAME_ASC,PRIMARY_KEY_ASC", ["a", "1"]]));
		assert!(decode(&text, "PRIMARY_KEY_ASC", 1).is_err());
		assert!(decode(&text, "NAME_ASC,PRIMARY_KEY_ASC", 2).is_ok());
	}
}
