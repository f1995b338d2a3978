use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pgql_core::build::plugins;
use pgql_core::build::{LegacyRelations, SimpleCollections};
use pgql_core::iam::Algorithm;

pub(crate) mod parser;

pub(crate) fn path_exists(path: &str) -> Result<PathBuf, String> {
	let path = Path::new(path);
	if !*path.try_exists().as_ref().map_err(ToString::to_string)? {
		return Err(String::from("Ensure the path exists"));
	}
	Ok(path.to_owned())
}

pub(crate) fn file_exists(path: &str) -> Result<PathBuf, String> {
	let path = path_exists(path)?;
	if !path.is_file() {
		return Err(String::from("Ensure the path is a file"));
	}
	Ok(path)
}

pub(crate) fn duration(v: &str) -> Result<Duration, String> {
	humantime::parse_duration(v).map_err(|_| String::from("invalid duration"))
}

/// Parses a size such as `100kB` or `2MB` into bytes.
pub(crate) fn byte_size(v: &str) -> Result<usize, String> {
	let v = v.trim();
	let split = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
	let (digits, unit) = v.split_at(split);
	let n = digits.parse::<usize>().map_err(|_| String::from("Provide a size such as 100kB"))?;
	let factor = match unit.trim().to_ascii_lowercase().as_str() {
		"" | "b" => 1,
		"kb" => 1024,
		"mb" => 1024 * 1024,
		"gb" => 1024 * 1024 * 1024,
		_ => return Err(format!("Unknown size unit '{unit}'")),
	};
	n.checked_mul(factor).ok_or_else(|| String::from("The size is too large"))
}

/// Accepts the name of a plugin which can be added to the build.
pub(crate) fn plugin(v: &str) -> Result<String, String> {
	match plugins::by_name(v) {
		Some(_) => Ok(v.to_owned()),
		None => Err(format!("Unknown plugin '{v}'")),
	}
}

pub(crate) fn algorithm(v: &str) -> Result<Algorithm, String> {
	Algorithm::from_str(v).map_err(|_| format!("Unknown signature algorithm '{v}'"))
}

pub(crate) fn simple_collections(v: &str) -> Result<SimpleCollections, String> {
	SimpleCollections::from_str(v).map_err(|e| e.to_string())
}

pub(crate) fn legacy_relations(v: &str) -> Result<LegacyRelations, String> {
	LegacyRelations::from_str(v).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("512", 512)]
	#[case("100kB", 102_400)]
	#[case("2MB", 2 * 1024 * 1024)]
	#[case(" 1 gb", 1024 * 1024 * 1024)]
	fn sizes_are_parsed(#[case] input: &str, #[case] expected: usize) {
		assert_eq!(byte_size(input), Ok(expected));
	}

	#[rstest]
	#[case("")]
	#[case("kB")]
	#[case("10 parsecs")]
	fn bad_sizes_are_refused(#[case] input: &str) {
		assert!(byte_size(input).is_err());
	}

	#[test]
	fn durations_are_human() {
		assert_eq!(duration("30s"), Ok(Duration::from_secs(30)));
		assert_eq!(duration("1m 500ms"), Ok(Duration::from_millis(60_500)));
		assert!(duration("soon").is_err());
	}

	#[test]
	fn only_known_plugins_are_accepted() {
		assert_eq!(plugin("PgNonNullRelations"), Ok("PgNonNullRelations".to_owned()));
		assert!(plugin("PgMadeUp").is_err());
	}

	#[test]
	fn modes_and_algorithms_are_parsed() {
		assert_eq!(simple_collections("both"), Ok(SimpleCollections::Both));
		assert_eq!(legacy_relations("omit"), Ok(LegacyRelations::Omit));
		assert_eq!(algorithm("RS256"), Ok(Algorithm::RS256));
		assert!(algorithm("none").is_err());
	}
}
