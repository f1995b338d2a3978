use crate::catalog::Tags;
use crate::err::{Error, tag_error};

/// A comment split into its smart tags and its free text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parsed {
	pub tags: Tags,
	pub description: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Line {
	Blank,
	Tag,
	Text,
}

/// Parses one `@key` or `@key value` line.
fn parse_tag(line: &str) -> Result<(&str, Option<String>), Error> {
	let rest = &line[1..];
	let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len());
	let key = &rest[..end];
	let starts_ok = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
	if !starts_ok {
		return Err(tag_error(format!("Expected a tag name after '@' in '{line}'")));
	}
	let value = &rest[end..];
	if !value.is_empty() && !value.starts_with(char::is_whitespace) {
		return Err(tag_error(format!("Invalid tag name in '{line}'")));
	}
	let value = value.trim();
	Ok((key, (!value.is_empty()).then(|| value.to_owned())))
}

/// Splits a database comment into smart tags and a description.
///
/// Tag lines form one block, either after the description or before it.
/// Tag lines mixed into the description are rejected.
pub fn parse_comment(text: &str) -> Result<Parsed, Error> {
	let lines: Vec<&str> = text.lines().collect();
	let kinds: Vec<Line> = lines
		.iter()
		.map(|l| {
			let l = l.trim_start();
			if l.is_empty() {
				Line::Blank
			} else if l.starts_with('@') {
				Line::Tag
			} else {
				Line::Text
			}
		})
		.collect();
	// The non blank lines must switch between tags and text at most once
	let mut switches = 0;
	let mut last = Line::Blank;
	for kind in kinds.iter().copied().filter(|k| *k != Line::Blank) {
		if last != Line::Blank && kind != last {
			switches += 1;
		}
		last = kind;
	}
	if switches > 1 {
		return Err(tag_error("Smart tags must not be interleaved with the description"));
	}
	let mut tags = Tags::new();
	let mut text = Vec::new();
	for (line, kind) in lines.iter().zip(kinds) {
		match kind {
			Line::Tag => {
				let (key, value) = parse_tag(line.trim())?;
				tags.push(key, value);
			}
			_ => text.push(*line),
		}
	}
	let description = text.join("\n").trim().to_owned();
	Ok(Parsed {
		tags,
		description: (!description.is_empty()).then_some(description),
	})
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::catalog::TagValue;

	#[test]
	fn trailing_block() {
		let parsed = parse_comment("A person.\n\n@name member\n@omit create,delete").unwrap();
		assert_eq!(parsed.description.as_deref(), Some("A person."));
		assert_eq!(parsed.tags.string("name"), Some("member"));
		assert_eq!(parsed.tags.string("omit"), Some("create,delete"));
	}

	#[test]
	fn leading_block() {
		let parsed = parse_comment("@sortable\n@filterable\nFull name of the person").unwrap();
		assert!(parsed.tags.has("sortable"));
		assert!(parsed.tags.has("filterable"));
		assert_eq!(parsed.description.as_deref(), Some("Full name of the person"));
	}

	#[test]
	fn repeated_tags_become_lists() {
		let parsed = parse_comment("@unique a\n@unique b").unwrap();
		assert_eq!(parsed.tags.get("unique"), Some(&TagValue::List(vec!["a".into(), "b".into()])));
		assert_eq!(parsed.description, None);
	}

	#[test]
	fn multiline_description_is_kept() {
		let parsed = parse_comment("First line.\nSecond line.").unwrap();
		assert!(parsed.tags.is_empty());
		assert_eq!(parsed.description.as_deref(), Some("First line.\nSecond line."));
	}

	#[rstest]
	#[case::interleaved("@name a\nsome text\n@omit")]
	#[case::text_around("text\n@omit\nmore text")]
	#[case::bare_at("@\ntext")]
	#[case::digit_key("@1abc")]
	#[case::punctuated_key("@na-me x")]
	fn malformed_comments_fail(#[case] text: &str) {
		assert!(matches!(parse_comment(text), Err(Error::TagParse(_))));
	}

	#[test]
	fn email_like_text_is_not_a_tag() {
		let parsed = parse_comment("Contact admin@example.com").unwrap();
		assert!(parsed.tags.is_empty());
	}
}
