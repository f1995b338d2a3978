//! SQL text assembly. Values never reach the SQL text: they are bound as
//! text parameters and cast to their type in the statement.

use crate::cnf::MAX_JSON_FIELDS_PER_CALL;

/// A compiled statement: the SQL text and its text parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statement {
	pub sql: String,
	pub params: Vec<Option<String>>,
}

/// Collects the parameters and table aliases of one statement.
#[derive(Debug, Default)]
pub struct SqlBuilder {
	params: Vec<Option<String>>,
	aliases: usize,
}

impl SqlBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds a value, returning the placeholder cast to `ty`.
	pub fn param(&mut self, value: Option<String>, ty: &str) -> String {
		self.params.push(value);
		format!("${}::text::{ty}", self.params.len())
	}

	/// Binds a text value.
	pub fn text(&mut self, value: impl Into<String>) -> String {
		self.params.push(Some(value.into()));
		format!("${}::text", self.params.len())
	}

	/// A fresh table alias.
	pub fn alias(&mut self) -> String {
		self.aliases += 1;
		format!("__t{}", self.aliases)
	}

	pub fn finish(self, sql: String) -> Statement {
		Statement {
			sql,
			params: self.params,
		}
	}
}

/// Quotes a string literal. Only used for names generated by the schema.
pub fn literal(s: &str) -> String {
	format!("'{}'", s.replace('\'', "''"))
}

/// A `jsonb` object from key and expression pairs. Large objects are
/// assembled from several builder calls, as functions take at most 100
/// arguments.
pub fn json_object(pairs: &[(String, String)]) -> String {
	if pairs.is_empty() {
		return "jsonb_build_object()".to_owned();
	}
	pairs
		.chunks(*MAX_JSON_FIELDS_PER_CALL)
		.map(|chunk| {
			let args = chunk
				.iter()
				.map(|(key, expr)| format!("{}, {expr}", literal(key)))
				.collect::<Vec<_>>()
				.join(", ");
			format!("jsonb_build_object({args})")
		})
		.collect::<Vec<_>>()
		.join(" || ")
}

/// Joins predicates with `and`, `true` when there are none.
pub fn conjunction(predicates: &[String]) -> String {
	match predicates.is_empty() {
		true => "true".to_owned(),
		false => predicates.iter().map(|p| format!("({p})")).collect::<Vec<_>>().join(" and "),
	}
}

/// Escapes the wildcards of a `like` pattern.
pub fn escape_like(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		if matches!(c, '\\' | '%' | '_') {
			out.push('\\');
		}
		out.push(c);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parameters_are_numbered_and_cast() {
		let mut sql = SqlBuilder::new();
		assert_eq!(sql.param(Some("2".into()), "\"pg_catalog\".\"int4\""), "$1::text::\"pg_catalog\".\"int4\"");
		assert_eq!(sql.text("x"), "$2::text");
		assert_eq!(sql.alias(), "__t1");
		let statement = sql.finish("select 1".into());
		assert_eq!(statement.params, vec![Some("2".to_owned()), Some("x".to_owned())]);
	}

	#[test]
	fn large_objects_are_chunked() {
		let pairs: Vec<_> = (0..120).map(|i| (format!("f{i}"), i.to_string())).collect();
		let sql = json_object(&pairs);
		assert_eq!(sql.matches("jsonb_build_object(").count(), 3);
		assert_eq!(sql.matches(" || ").count(), 2);
		assert_eq!(json_object(&[]), "jsonb_build_object()");
	}

	#[test]
	fn literals_and_patterns_are_escaped() {
		assert_eq!(literal("it's"), "'it''s'");
		assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
		assert_eq!(conjunction(&[]), "true");
		assert_eq!(conjunction(&["a".into(), "b".into()]), "(a) and (b)");
	}
}
