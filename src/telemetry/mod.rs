mod logs;

use clap::ValueEnum;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::cli::validator::parser::LogFilter;

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

#[derive(Default, Debug, Clone)]
pub struct Builder {
	filter: Option<LogFilter>,
	format: LogFormat,
}

pub fn builder() -> Builder {
	Builder::default()
}

impl Builder {
	/// Set the filter on the builder
	pub fn with_filter(mut self, filter: LogFilter) -> Self {
		self.filter = Some(filter);
		self
	}

	/// Set the output format on the builder
	pub fn with_format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	/// Build a tracing dispatcher with the fmt subscriber
	pub fn build(self) -> Box<dyn Subscriber + Send + Sync + 'static> {
		let filter = self.filter.unwrap_or_else(|| LogFilter(EnvFilter::new("info")));
		let registry = tracing_subscriber::registry().with(logs::new(filter, self.format));
		Box::new(registry)
	}

	/// Install the dispatcher globally
	pub fn init(self) -> Result<(), TryInitError> {
		self.build().try_init()
	}
}

/// Parses a log level, or a complete filter directive.
pub fn filter_from_value(v: &str) -> Result<EnvFilter, ParseError> {
	match v {
		// Don't show any logs at all
		"none" => Ok(EnvFilter::new("off")),
		// Check if we should show all log levels
		"full" => EnvFilter::builder().parse("trace"),
		// Otherwise, let's only show errors
		"error" => EnvFilter::builder().parse("error"),
		// Specify the log level for each code area
		"warn" | "info" | "debug" | "trace" => {
			EnvFilter::builder().parse(format!("error,pgql={v},pgql_core={v}"))
		}
		// Let's try to parse the custom log level
		_ => EnvFilter::builder().parse(v),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("none", "off")]
	#[case("full", "trace")]
	#[case("error", "error")]
	#[case("debug", "error,pgql=debug,pgql_core=debug")]
	#[case("pgql::core::gql=trace", "pgql::core::gql=trace")]
	fn levels_become_filters(#[case] input: &str, #[case] expected: &str) {
		let filter = filter_from_value(input).unwrap().to_string();
		for directive in expected.split(',') {
			assert!(filter.split(',').any(|d| d == directive), "{directive} is not in {filter}");
		}
	}

	#[test]
	fn malformed_directives_are_refused() {
		assert!(filter_from_value("pgql=loud").is_err());
	}

	#[test]
	fn subscribers_build_in_both_formats() {
		let _text = builder().build();
		let warn = LogFilter(filter_from_value("warn").unwrap());
		let _json = builder().with_filter(warn).with_format(LogFormat::Json).build();
	}
}
