use serde::{Deserialize, Serialize};

use super::{NamespaceId, ProcId, Tags, TypeId};
use crate::err::{Error, introspection_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
	Immutable,
	Stable,
	Volatile,
}

impl Volatility {
	pub fn from_code(v: &str) -> Result<Self, Error> {
		match v {
			"i" => Ok(Volatility::Immutable),
			"s" => Ok(Volatility::Stable),
			"v" => Ok(Volatility::Volatile),
			v => Err(introspection_error(format!("Unexpected volatility '{v}'"))),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgMode {
	In,
	Out,
	InOut,
	Variadic,
	Table,
}

impl ArgMode {
	pub fn from_code(v: &str) -> Result<Self, Error> {
		match v {
			"i" => Ok(ArgMode::In),
			"o" => Ok(ArgMode::Out),
			"b" => Ok(ArgMode::InOut),
			"v" => Ok(ArgMode::Variadic),
			"t" => Ok(ArgMode::Table),
			v => Err(introspection_error(format!("Unexpected argument mode '{v}'"))),
		}
	}

	pub fn is_input(&self) -> bool {
		matches!(self, ArgMode::In | ArgMode::InOut | ArgMode::Variadic)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Procedure {
	pub id: ProcId,
	pub name: String,
	pub namespace_id: NamespaceId,
	pub comment: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Tags,
	pub is_strict: bool,
	pub returns_set: bool,
	pub volatility: Volatility,
	pub return_type_id: TypeId,
	/// All argument types, including output arguments
	pub arg_type_ids: Vec<TypeId>,
	pub arg_names: Vec<String>,
	/// Empty when every argument is an input argument
	pub arg_modes: Vec<ArgMode>,
	pub arg_defaults_num: i16,
	pub cost: f32,
	pub acl_executable: bool,
	pub language: String,
}

/// A positional input argument of a procedure.
#[derive(Clone, Debug)]
pub struct ProcArg<'a> {
	/// The position among the input arguments
	pub index: usize,
	pub name: Option<&'a str>,
	pub type_id: TypeId,
	pub has_default: bool,
}

impl Procedure {
	pub fn is_mutation(&self) -> bool {
		self.volatility == Volatility::Volatile
	}

	/// Whether this procedure declares output or table arguments.
	pub fn has_output_args(&self) -> bool {
		self.arg_modes.iter().any(|m| !m.is_input())
	}

	/// The input arguments, in call order.
	pub fn input_args(&self) -> Vec<ProcArg<'_>> {
		let inputs: Vec<(usize, &TypeId)> = self
			.arg_type_ids
			.iter()
			.enumerate()
			.filter(|(i, _)| self.arg_modes.get(*i).is_none_or(ArgMode::is_input))
			.collect();
		let first_default = inputs.len().saturating_sub(self.arg_defaults_num.max(0) as usize);
		inputs
			.into_iter()
			.enumerate()
			.map(|(index, (i, type_id))| ProcArg {
				index,
				name: self.arg_names.get(i).map(String::as_str).filter(|n| !n.is_empty()),
				type_id: *type_id,
				has_default: index >= first_default,
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn proc(types: &[u32], names: &[&str], modes: &[ArgMode], defaults: i16) -> Procedure {
		Procedure {
			id: ProcId(1),
			name: "f".into(),
			namespace_id: NamespaceId(1),
			comment: None,
			description: None,
			tags: Tags::new(),
			is_strict: false,
			returns_set: false,
			volatility: Volatility::Stable,
			return_type_id: TypeId(23),
			arg_type_ids: types.iter().map(|t| TypeId(*t)).collect(),
			arg_names: names.iter().map(|n| n.to_string()).collect(),
			arg_modes: modes.to_vec(),
			arg_defaults_num: defaults,
			cost: 100.0,
			acl_executable: true,
			language: "sql".into(),
		}
	}

	#[test]
	fn input_args_skip_output_arguments() {
		let p = proc(&[23, 25, 23], &["a", "b", "c"], &[ArgMode::In, ArgMode::Out, ArgMode::In], 1);
		let args = p.input_args();
		assert_eq!(args.len(), 2);
		assert_eq!(args[0].name, Some("a"));
		assert!(!args[0].has_default);
		assert_eq!(args[1].name, Some("c"));
		assert_eq!(args[1].index, 1);
		assert!(args[1].has_default);
		assert!(p.has_output_args());
	}

	#[test]
	fn unnamed_arguments_have_no_name() {
		let p = proc(&[23, 23], &[], &[], 0);
		let args = p.input_args();
		assert_eq!(args.len(), 2);
		assert!(args.iter().all(|a| a.name.is_none()));
		assert!(!p.has_output_args());
	}
}
