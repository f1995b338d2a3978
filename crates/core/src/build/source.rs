//! What each generated field, argument, input field and enum value stands
//! for in the catalog. The resolvers compile SQL from these.

use std::collections::{HashMap, HashSet};

use async_graphql::dynamic::TypeRef;

use crate::catalog::{ClassId, ConstraintId, ProcId};

/// How a collection of rows is exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
	/// A relay style `XConnection`
	Connection,
	/// A plain list
	List,
	/// At most one row
	Single,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSource {
	/// The `query` field re-exposing the root query type
	QueryRoot,
	Column {
		class: ClassId,
		num: i16,
	},
	ForwardRelation {
		constraint: ConstraintId,
	},
	BackwardRelation {
		constraint: ConstraintId,
		shape: Shape,
	},
	ComputedColumn {
		proc: ProcId,
		shape: Shape,
	},
	AllRows {
		class: ClassId,
		shape: Shape,
	},
	RowByKey {
		constraint: ConstraintId,
	},
	Procedure {
		proc: ProcId,
		shape: Shape,
	},
	// Connection and edge internals
	Nodes,
	Edges,
	PageInfo,
	TotalCount,
	Cursor,
	Node,
	HasNextPage,
	HasPreviousPage,
	StartCursor,
	EndCursor,
	// Mutations
	Create {
		class: ClassId,
	},
	Update {
		constraint: ConstraintId,
	},
	Delete {
		constraint: ConstraintId,
	},
	MutationProcedure {
		proc: ProcId,
		shape: Shape,
	},
	// Mutation payload internals
	ClientMutationId,
	PayloadRecord,
}

impl FieldSource {
	/// Whether this field pages through rows, and so takes pagination arguments.
	pub fn shape(&self) -> Option<Shape> {
		match self {
			FieldSource::BackwardRelation {
				shape,
				..
			}
			| FieldSource::ComputedColumn {
				shape,
				..
			}
			| FieldSource::AllRows {
				shape,
				..
			}
			| FieldSource::Procedure {
				shape,
				..
			} => Some(*shape),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgSource {
	First,
	Last,
	Offset,
	Before,
	After,
	OrderBy,
	Condition,
	Filter,
	/// A key column of a row lookup
	Key {
		num: i16,
	},
	/// A positional input argument of a procedure
	ProcArg {
		index: usize,
	},
	/// The single `input` argument of a mutation
	Input,
}

/// The comparison operators of the connection filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOp {
	IsNull,
	EqualTo,
	NotEqualTo,
	DistinctFrom,
	NotDistinctFrom,
	LessThan,
	LessThanOrEqualTo,
	GreaterThan,
	GreaterThanOrEqualTo,
	In,
	NotIn,
	Includes,
	NotIncludes,
	StartsWith,
	EndsWith,
	Like,
	NotLike,
	IncludesInsensitive,
	LikeInsensitive,
}

impl FilterOp {
	pub const BASIC: [FilterOp; 11] = [
		FilterOp::IsNull,
		FilterOp::EqualTo,
		FilterOp::NotEqualTo,
		FilterOp::DistinctFrom,
		FilterOp::NotDistinctFrom,
		FilterOp::LessThan,
		FilterOp::LessThanOrEqualTo,
		FilterOp::GreaterThan,
		FilterOp::GreaterThanOrEqualTo,
		FilterOp::In,
		FilterOp::NotIn,
	];

	pub const TEXT: [FilterOp; 8] = [
		FilterOp::Includes,
		FilterOp::NotIncludes,
		FilterOp::StartsWith,
		FilterOp::EndsWith,
		FilterOp::Like,
		FilterOp::NotLike,
		FilterOp::IncludesInsensitive,
		FilterOp::LikeInsensitive,
	];

	pub fn name(&self) -> &'static str {
		match self {
			FilterOp::IsNull => "isNull",
			FilterOp::EqualTo => "equalTo",
			FilterOp::NotEqualTo => "notEqualTo",
			FilterOp::DistinctFrom => "distinctFrom",
			FilterOp::NotDistinctFrom => "notDistinctFrom",
			FilterOp::LessThan => "lessThan",
			FilterOp::LessThanOrEqualTo => "lessThanOrEqualTo",
			FilterOp::GreaterThan => "greaterThan",
			FilterOp::GreaterThanOrEqualTo => "greaterThanOrEqualTo",
			FilterOp::In => "in",
			FilterOp::NotIn => "notIn",
			FilterOp::Includes => "includes",
			FilterOp::NotIncludes => "notIncludes",
			FilterOp::StartsWith => "startsWith",
			FilterOp::EndsWith => "endsWith",
			FilterOp::Like => "like",
			FilterOp::NotLike => "notLike",
			FilterOp::IncludesInsensitive => "includesInsensitive",
			FilterOp::LikeInsensitive => "likeInsensitive",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputFieldSource {
	ClientMutationId,
	/// The record of a create mutation
	Record,
	/// The patch of an update mutation
	Patch,
	/// A key column identifying the row of an update or delete mutation
	Key {
		num: i16,
	},
	ProcArg {
		index: usize,
	},
	/// A column of a record, patch or condition
	Column {
		class: ClassId,
		num: i16,
	},
	/// A computed column of a filter
	Computed {
		proc: ProcId,
	},
	And,
	Or,
	Not,
	Operator(FilterOp),
}

/// One ordering term of an `orderBy` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderTerm {
	Column {
		num: i16,
		asc: bool,
	},
	Computed {
		proc: ProcId,
		asc: bool,
	},
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumValueSource {
	/// The label of a Postgres enum
	Label(String),
	/// The natural order of the rows
	Natural,
	/// An ordering of the rows
	Order(Vec<OrderTerm>),
}

/// The lookup tables the resolvers use to interpret a request.
#[derive(Clone, Debug, Default)]
pub struct Blueprint {
	/// Keyed by type name then field name
	pub fields: HashMap<String, HashMap<String, FieldSource>>,
	/// The output type of each field, keyed like `fields`
	pub types: HashMap<String, HashMap<String, TypeRef>>,
	/// Keyed by type name, field name then argument name
	pub args: HashMap<(String, String), HashMap<String, ArgSource>>,
	/// The type of each argument, keyed like `args`
	pub arg_types: HashMap<(String, String), HashMap<String, TypeRef>>,
	/// Keyed by input type name then field name
	pub inputs: HashMap<String, HashMap<String, InputFieldSource>>,
	/// The type of each input field, keyed like `inputs`
	pub input_types: HashMap<String, HashMap<String, TypeRef>>,
	/// Keyed by enum type name then value name
	pub enums: HashMap<String, HashMap<String, EnumValueSource>>,
	/// The object types whose values are JSON records
	pub objects: HashSet<String>,
	pub dynamic_json: bool,
}

impl Blueprint {
	pub fn field(&self, ty: &str, field: &str) -> Option<&FieldSource> {
		self.fields.get(ty).and_then(|f| f.get(field))
	}

	pub fn field_type(&self, ty: &str, field: &str) -> Option<&TypeRef> {
		self.types.get(ty).and_then(|f| f.get(field))
	}

	pub fn arg(&self, ty: &str, field: &str, arg: &str) -> Option<&ArgSource> {
		self.args.get(&(ty.to_owned(), field.to_owned())).and_then(|a| a.get(arg))
	}

	pub fn arg_type(&self, ty: &str, field: &str, arg: &str) -> Option<&TypeRef> {
		self.arg_types.get(&(ty.to_owned(), field.to_owned())).and_then(|a| a.get(arg))
	}

	pub fn input(&self, ty: &str, field: &str) -> Option<&InputFieldSource> {
		self.inputs.get(ty).and_then(|f| f.get(field))
	}

	pub fn input_type(&self, ty: &str, field: &str) -> Option<&TypeRef> {
		self.input_types.get(ty).and_then(|f| f.get(field))
	}

	pub fn enum_value(&self, ty: &str, value: &str) -> Option<&EnumValueSource> {
		self.enums.get(ty).and_then(|v| v.get(value))
	}

	/// Maps a Postgres enum label back to its GraphQL value name.
	pub fn enum_name(&self, ty: &str, label: &str) -> Option<&str> {
		self.enums.get(ty).and_then(|v| {
			v.iter().find_map(|(name, src)| match src {
				EnumValueSource::Label(l) if l == label => Some(name.as_str()),
				_ => None,
			})
		})
	}
}
