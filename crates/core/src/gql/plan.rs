//! Compiles a selection into SQL.
//!
//! Records become `jsonb_build_object` calls keyed by response key. Many to
//! one relations become correlated scalar subqueries, and collections become
//! correlated aggregates over an ordered and limited page, so a root field
//! always compiles into one statement however deep its selection goes.

use std::collections::HashSet;

use async_graphql::{SelectionField, Value};
use indexmap::IndexMap;

use super::Engine;
use super::cursor::{self, Cursor};
use super::error::{GqlError, internal_error, validation_error};
use super::sql::{SqlBuilder, Statement, conjunction, json_object, literal};
use super::value::to_text;
use crate::build::plugins::{NATURAL, PRIMARY_KEY_ASC};
use crate::build::registry::named;
use crate::build::source::{ArgSource, EnumValueSource, FieldSource, OrderTerm, Shape};
use crate::build::types::{ident, output_cast, sql_type_name};
use crate::catalog::{
	Attribute, Class, ClassId, Constraint, ConstraintId, ProcId, Procedure, TypeId, TypeKind,
};

/// A field of a GraphQL selection, with fragments flattened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
	pub name: String,
	/// The alias, or the name when there is none
	pub key: String,
	pub arguments: IndexMap<String, Value>,
	pub children: Vec<Selection>,
}

impl Selection {
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			key: name.clone(),
			name,
			..Default::default()
		}
	}

	pub fn alias(mut self, key: impl Into<String>) -> Self {
		self.key = key.into();
		self
	}

	pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
		self.arguments.insert(name.into(), value);
		self
	}

	pub fn child(mut self, child: Selection) -> Self {
		self.add(child);
		self
	}

	/// Adds a child, merging it with a child of the same response key.
	fn add(&mut self, child: Selection) {
		match self.children.iter_mut().find(|c| c.key == child.key) {
			Some(existing) => {
				for c in child.children {
					existing.add(c);
				}
			}
			None => self.children.push(child),
		}
	}

	pub fn from_field(field: SelectionField<'_>) -> Result<Self, GqlError> {
		let mut sel = Selection::new(field.name()).alias(field.alias().unwrap_or(field.name()));
		for (name, value) in field.arguments().map_err(|e| validation_error(e.message))? {
			sel.arguments.insert(name.to_string(), value);
		}
		for child in field.selection_set() {
			if child.name().starts_with("__") {
				continue;
			}
			sel.add(Selection::from_field(child)?);
		}
		Ok(sel)
	}
}

/// A row in scope of an expression: a table alias, or a composite expression.
#[derive(Clone, Debug)]
pub(crate) struct Row {
	expr: String,
	aliased: bool,
}

impl Row {
	pub(crate) fn alias(alias: &str) -> Self {
		Self {
			expr: alias.to_owned(),
			aliased: true,
		}
	}

	pub(crate) fn expr(expr: String) -> Self {
		Self {
			expr,
			aliased: false,
		}
	}

	pub(crate) fn column(&self, name: &str) -> String {
		match self.aliased {
			true => format!("{}.{}", self.expr, ident(name)),
			false => format!("({}).{}", self.expr, ident(name)),
		}
	}

	pub(crate) fn whole(&self) -> &str {
		&self.expr
	}
}

/// Where the rows of a collection come from.
struct Source<'e> {
	/// A table, or a function call
	from: String,
	/// The class of the rows, when they are records
	class: Option<&'e Class>,
	/// The type of a row
	item_type: TypeId,
	/// Whether the rows are numbered, for sources without a primary key
	numbered: bool,
	/// Columns which must equal an expression of the enclosing row
	correlation: Vec<(String, String)>,
}

impl Source<'_> {
	fn from_sql(&self, alias: &str) -> String {
		match self.numbered {
			true => format!(
				"(select __s, row_number() over () as \"__n\" from {} as __s) as {alias}",
				self.from
			),
			false => format!("{} as {alias}", self.from),
		}
	}

	fn row(&self, alias: &str) -> Row {
		match self.numbered {
			true => Row::expr(format!("{alias}.__s")),
			false => Row::alias(alias),
		}
	}
}

struct OrderExpr {
	expr: String,
	asc: bool,
	ty: String,
}

#[derive(Default)]
struct PageArgs {
	first: Option<u64>,
	last: Option<u64>,
	offset: Option<u64>,
	before: Option<String>,
	after: Option<String>,
	order: Option<Vec<String>>,
	condition: Option<(String, Value)>,
	filter: Option<(String, Value)>,
}

fn count(name: &str, value: &Value) -> Result<u64, GqlError> {
	match value {
		Value::Number(n) => n.as_u64(),
		_ => None,
	}
	.ok_or_else(|| validation_error(format!("Argument `{name}` must be a non-negative integer")))
}

fn string(name: &str, value: &Value) -> Result<String, GqlError> {
	match value {
		Value::String(s) => Ok(s.clone()),
		_ => Err(validation_error(format!("Argument `{name}` must be a string"))),
	}
}

pub(crate) fn class(engine: &Engine, id: ClassId) -> Result<&Class, GqlError> {
	engine.catalog.class(id).ok_or_else(|| internal_error(format!("Class {id} is not in the catalog")))
}

pub(crate) fn constraint(engine: &Engine, id: ConstraintId) -> Result<&Constraint, GqlError> {
	engine
		.catalog
		.constraint(id)
		.ok_or_else(|| internal_error(format!("Constraint {id} is not in the catalog")))
}

pub(crate) fn procedure(engine: &Engine, id: ProcId) -> Result<&Procedure, GqlError> {
	engine
		.catalog
		.procedure(id)
		.ok_or_else(|| internal_error(format!("Procedure {id} is not in the catalog")))
}

pub(crate) fn attribute(engine: &Engine, class: ClassId, num: i16) -> Result<&Attribute, GqlError> {
	engine
		.catalog
		.attribute(class, num)
		.ok_or_else(|| internal_error(format!("Column {num} of class {class} is not in the catalog")))
}

/// The qualified name of a table.
pub(crate) fn table(engine: &Engine, class: &Class) -> String {
	format!("{}.{}", ident(engine.catalog.namespace_name(class.namespace_id)), ident(&class.name))
}

/// The qualified name of a function.
pub(crate) fn function(engine: &Engine, proc: &Procedure) -> String {
	format!("{}.{}", ident(engine.catalog.namespace_name(proc.namespace_id)), ident(&proc.name))
}

/// The named type of a field, or an empty name.
fn field_type<'e>(engine: &'e Engine, ty: &str, field: &str) -> &'e str {
	engine.blueprint.field_type(ty, field).map(named).unwrap_or_default()
}

/// Compiles the selections of one statement.
pub struct Planner<'a> {
	pub(crate) engine: &'a Engine,
	pub(crate) sql: SqlBuilder,
}

impl<'a> Planner<'a> {
	pub fn new(engine: &'a Engine) -> Self {
		Self {
			engine,
			sql: SqlBuilder::new(),
		}
	}

	pub fn finish(self, sql: String) -> Statement {
		trace!(target: super::TARGET, "Compiled {sql}");
		self.sql.finish(sql)
	}

	/// Binds an input value as a parameter of type `type_id`.
	pub(crate) fn param(&mut self, type_id: TypeId, value: &Value) -> Result<String, GqlError> {
		let text = to_text(self.engine, type_id, value)?;
		Ok(self.sql.param(text, &sql_type_name(&self.engine.catalog, type_id)))
	}

	/// Compiles the value of field `sel` of type `ty`. Root fields take no
	/// row. `None` means the value is known to be null without a statement.
	pub(crate) fn field(&mut self, ty: &str, sel: &Selection, row: Option<&Row>) -> Result<Option<String>, GqlError> {
		let engine = self.engine;
		let source = engine
			.blueprint
			.field(ty, &sel.name)
			.ok_or_else(|| validation_error(format!("Field `{}` not found on `{ty}`", sel.name)))?;
		let field_ty = field_type(engine, ty, &sel.name);
		let outer = || row.ok_or_else(|| internal_error(format!("`{ty}.{}` needs a row", sel.name)));
		match source {
			FieldSource::Column {
				class,
				num,
			} => {
				let attr = attribute(engine, *class, *num)?;
				let expr = outer()?.column(&attr.name);
				self.output(expr, attr.type_id, field_ty, &sel.children).map(Some)
			}
			FieldSource::ForwardRelation {
				constraint,
			} => self.forward(*constraint, field_ty, sel, outer()?).map(Some),
			FieldSource::BackwardRelation {
				constraint,
				shape,
			} => self.backward(ty, *constraint, *shape, field_ty, sel, outer()?).map(Some),
			FieldSource::ComputedColumn {
				proc,
				shape,
			} => {
				let row = outer()?.whole().to_owned();
				self.procedure(ty, sel, *proc, *shape, field_ty, Some(&row))
			}
			FieldSource::AllRows {
				class,
				shape,
			} => {
				let class = self::class(engine, *class)?;
				let src = Source {
					from: table(engine, class),
					class: Some(class),
					item_type: class.type_id,
					numbered: engine.catalog.primary_key(class).is_none(),
					correlation: vec![],
				};
				self.collection(ty, sel, &src, *shape, field_ty).map(Some)
			}
			FieldSource::RowByKey {
				constraint,
			} => self.row_by_key(ty, sel, *constraint, field_ty),
			FieldSource::Procedure {
				proc,
				shape,
			} => self.procedure(ty, sel, *proc, *shape, field_ty, None),
			s => Err(internal_error(format!("`{ty}.{}` ({s:?}) is not compiled into SQL", sel.name))),
		}
	}

	/// The JSON of one value of type `type_id`, as field type `field_ty`.
	pub(crate) fn output(
		&mut self,
		expr: String,
		type_id: TypeId,
		field_ty: &str,
		children: &[Selection],
	) -> Result<String, GqlError> {
		let engine = self.engine;
		let composite = engine.catalog.resolve_base_type(type_id).is_some_and(|t| t.kind == TypeKind::Composite);
		if composite && engine.blueprint.objects.contains(field_ty) {
			let record = self.record(field_ty, &Row::expr(expr.clone()), children)?;
			return Ok(format!("case when ({expr}) is null then null else {record} end"));
		}
		Ok(match output_cast(&engine.catalog, type_id, engine.blueprint.dynamic_json) {
			Some(cast) => format!("({expr})::{cast}"),
			None => expr,
		})
	}

	/// The JSON object of a row of object type `ty`.
	pub(crate) fn record(&mut self, ty: &str, row: &Row, children: &[Selection]) -> Result<String, GqlError> {
		let mut pairs = Vec::with_capacity(children.len());
		for child in children {
			let expr = self.field(ty, child, Some(row))?.unwrap_or_else(|| "null".to_owned());
			pairs.push((child.key.clone(), expr));
		}
		Ok(json_object(&pairs))
	}

	fn forward(&mut self, id: ConstraintId, field_ty: &str, sel: &Selection, row: &Row) -> Result<String, GqlError> {
		let engine = self.engine;
		let fk = constraint(engine, id)?;
		let foreign = fk.foreign_class_id.ok_or_else(|| internal_error(format!("{} is not a foreign key", fk.name)))?;
		let foreign = class(engine, foreign)?;
		let alias = self.sql.alias();
		let inner = Row::alias(&alias);
		let predicates: Vec<String> = engine
			.catalog
			.key_attributes(fk)
			.iter()
			.zip(engine.catalog.foreign_key_attributes(fk))
			.map(|(key, referenced)| format!("{} = {}", inner.column(&referenced.name), row.column(&key.name)))
			.collect();
		let record = self.record(field_ty, &inner, &sel.children)?;
		Ok(format!(
			"(select {record} from {} as {alias} where {} limit 1)",
			table(engine, foreign),
			conjunction(&predicates)
		))
	}

	fn backward(
		&mut self,
		ty: &str,
		id: ConstraintId,
		shape: Shape,
		field_ty: &str,
		sel: &Selection,
		row: &Row,
	) -> Result<String, GqlError> {
		let engine = self.engine;
		let fk = constraint(engine, id)?;
		let referencing = class(engine, fk.class_id)?;
		let pairs: Vec<(String, String)> = engine
			.catalog
			.key_attributes(fk)
			.iter()
			.zip(engine.catalog.foreign_key_attributes(fk))
			.map(|(key, referenced)| (key.name.clone(), row.column(&referenced.name)))
			.collect();
		if shape == Shape::Single {
			let alias = self.sql.alias();
			let inner = Row::alias(&alias);
			let predicates: Vec<String> =
				pairs.iter().map(|(col, outer)| format!("{} = {outer}", inner.column(col))).collect();
			let record = self.record(field_ty, &inner, &sel.children)?;
			return Ok(format!(
				"(select {record} from {} as {alias} where {} limit 1)",
				table(engine, referencing),
				conjunction(&predicates)
			));
		}
		let src = Source {
			from: table(engine, referencing),
			class: Some(referencing),
			item_type: referencing.type_id,
			numbered: engine.catalog.primary_key(referencing).is_none(),
			correlation: pairs,
		};
		self.collection(ty, sel, &src, shape, field_ty)
	}

	fn row_by_key(
		&mut self,
		ty: &str,
		sel: &Selection,
		id: ConstraintId,
		field_ty: &str,
	) -> Result<Option<String>, GqlError> {
		let engine = self.engine;
		let key = constraint(engine, id)?;
		let alias = self.sql.alias();
		let inner = Row::alias(&alias);
		let mut predicates = vec![];
		for (name, value) in sel.arguments.iter() {
			let Some(ArgSource::Key {
				num,
			}) = engine.blueprint.arg(ty, &sel.name, name)
			else {
				continue;
			};
			if matches!(value, Value::Null) {
				return Ok(None);
			}
			let attr = attribute(engine, key.class_id, *num)?;
			let param = self.param(attr.type_id, value)?;
			predicates.push(format!("{} = {param}", inner.column(&attr.name)));
		}
		if predicates.len() != key.key_attribute_nums.len() {
			return Err(validation_error(format!("`{}` needs a value for every key column", sel.name)));
		}
		let record = self.record(field_ty, &inner, &sel.children)?;
		Ok(Some(format!(
			"(select {record} from {} as {alias} where {} limit 1)",
			table(engine, class(engine, key.class_id)?),
			conjunction(&predicates)
		)))
	}

	/// A call of `proc`, with `first` as the row argument of a computed
	/// column. `None` when a strict function would be called with a null.
	pub(crate) fn call(
		&mut self,
		proc: &Procedure,
		first: Option<&str>,
		values: &[(usize, Value)],
	) -> Result<Option<String>, GqlError> {
		let catalog = &self.engine.catalog;
		let skip = usize::from(first.is_some());
		let inputs = proc.input_args();
		let given = |index: usize| values.iter().find(|(i, _)| *i == index).map(|(_, v)| v);
		// Trailing arguments with defaults are left out when not given
		let last = inputs
			.iter()
			.filter(|a| a.index >= skip && (given(a.index).is_some() || !a.has_default))
			.map(|a| a.index)
			.max();
		let mut args: Vec<String> = first.map(str::to_owned).into_iter().collect();
		for arg in inputs.iter().filter(|a| a.index >= skip && Some(a.index) <= last) {
			let text = match given(arg.index) {
				Some(v) => to_text(self.engine, arg.type_id, v)?,
				None => None,
			};
			if text.is_none() && proc.is_strict {
				return Ok(None);
			}
			args.push(self.sql.param(text, &sql_type_name(catalog, arg.type_id)));
		}
		Ok(Some(format!("{}({})", function(self.engine, proc), args.join(", "))))
	}

	fn procedure(
		&mut self,
		ty: &str,
		sel: &Selection,
		id: ProcId,
		shape: Shape,
		field_ty: &str,
		row: Option<&str>,
	) -> Result<Option<String>, GqlError> {
		let engine = self.engine;
		let proc = procedure(engine, id)?;
		let mut values = vec![];
		for (name, value) in sel.arguments.iter() {
			if let Some(ArgSource::ProcArg {
				index,
			}) = engine.blueprint.arg(ty, &sel.name, name)
			{
				values.push((*index, value.clone()));
			}
		}
		let Some(call) = self.call(proc, row, &values)? else {
			return Ok(None);
		};
		let returned = engine.catalog.class_by_type(proc.return_type_id);
		if shape != Shape::Single {
			let src = Source {
				from: call,
				class: returned,
				item_type: proc.return_type_id,
				numbered: true,
				correlation: vec![],
			};
			return self.collection(ty, sel, &src, shape, field_ty).map(Some);
		}
		if returned.is_none() {
			return self.output(call, proc.return_type_id, field_ty, &sel.children).map(Some);
		}
		let alias = self.sql.alias();
		let record = self.record(field_ty, &Row::alias(&alias), &sel.children)?;
		Ok(Some(format!("(select {record} from {call} as {alias} where not ({alias} is null))")))
	}

	fn page_args(&self, ty: &str, sel: &Selection) -> Result<PageArgs, GqlError> {
		let blueprint = &self.engine.blueprint;
		let mut args = PageArgs::default();
		for (name, value) in sel.arguments.iter() {
			if matches!(value, Value::Null) {
				continue;
			}
			let input_type = || {
				blueprint.arg_type(ty, &sel.name, name).map(|t| named(t).to_owned()).unwrap_or_default()
			};
			match blueprint.arg(ty, &sel.name, name) {
				Some(ArgSource::First) => args.first = Some(count(name, value)?),
				Some(ArgSource::Last) => args.last = Some(count(name, value)?),
				Some(ArgSource::Offset) => args.offset = Some(count(name, value)?),
				Some(ArgSource::Before) => args.before = Some(string(name, value)?),
				Some(ArgSource::After) => args.after = Some(string(name, value)?),
				Some(ArgSource::OrderBy) => {
					let items = match value {
						Value::List(items) => items.as_slice(),
						v => std::slice::from_ref(v),
					};
					let names = items
						.iter()
						.map(|v| match v {
							Value::Enum(n) => Ok(n.to_string()),
							Value::String(s) => Ok(s.clone()),
							_ => Err(validation_error("Argument `orderBy` must list enum values")),
						})
						.collect::<Result<Vec<_>, _>>()?;
					args.order = Some(names);
				}
				Some(ArgSource::Condition) => args.condition = Some((input_type(), value.clone())),
				Some(ArgSource::Filter) => args.filter = Some((input_type(), value.clone())),
				_ => {}
			}
		}
		if args.first.is_some() && args.last.is_some() {
			return Err(validation_error("Arguments `first` and `last` may not be combined"));
		}
		if args.last.is_some() && args.offset.is_some() {
			return Err(validation_error("Argument `offset` may not be used with `last`"));
		}
		Ok(args)
	}

	/// The requested ordering: its name, which cursors are minted under, and
	/// its terms.
	fn ordering(
		&self,
		ty: &str,
		sel: &Selection,
		src: &Source<'_>,
		args: &PageArgs,
	) -> Result<(String, Vec<OrderTerm>), GqlError> {
		let engine = self.engine;
		let Some(enum_ty) = engine.blueprint.arg_type(ty, &sel.name, "orderBy").map(named) else {
			return Ok((NATURAL.to_owned(), vec![]));
		};
		let default = match src.class.and_then(|c| engine.catalog.primary_key(c)).is_some() && !src.numbered {
			true => PRIMARY_KEY_ASC,
			false => NATURAL,
		};
		let names = match &args.order {
			Some(names) if !names.is_empty() => names.clone(),
			_ => vec![default.to_owned()],
		};
		let mut terms = vec![];
		for name in names.iter() {
			match engine.blueprint.enum_value(enum_ty, name) {
				Some(EnumValueSource::Natural) => {}
				Some(EnumValueSource::Order(t)) => terms.extend(t.iter().cloned()),
				_ => return Err(validation_error(format!("Value `{name}` does not exist in `{enum_ty}` enum"))),
			}
		}
		Ok((names.join(","), terms))
	}

	/// The ordering expressions, with a unique tiebreak appended.
	fn order_exprs(
		&self,
		src: &Source<'_>,
		terms: &[OrderTerm],
		alias: &str,
		row: &Row,
	) -> Result<Vec<OrderExpr>, GqlError> {
		let engine = self.engine;
		let catalog = &engine.catalog;
		let mut exprs = vec![];
		let mut seen = HashSet::new();
		for term in terms {
			match term {
				OrderTerm::Column {
					num,
					asc,
				} => {
					let class = src.class.ok_or_else(|| internal_error("Only records order by columns"))?;
					let attr = attribute(engine, class.id, *num)?;
					seen.insert(*num);
					exprs.push(OrderExpr {
						expr: row.column(&attr.name),
						asc: *asc,
						ty: sql_type_name(catalog, attr.type_id),
					});
				}
				OrderTerm::Computed {
					proc,
					asc,
				} => {
					let proc = procedure(engine, *proc)?;
					exprs.push(OrderExpr {
						expr: format!("{}({})", function(engine, proc), row.whole()),
						asc: *asc,
						ty: sql_type_name(catalog, proc.return_type_id),
					});
				}
			}
		}
		if src.numbered {
			exprs.push(OrderExpr {
				expr: format!("{alias}.\"__n\""),
				asc: true,
				ty: "bigint".to_owned(),
			});
		} else if let Some(pk) = src.class.and_then(|c| catalog.primary_key(c)) {
			for attr in catalog.key_attributes(pk) {
				if seen.insert(attr.num) {
					exprs.push(OrderExpr {
						expr: row.column(&attr.name),
						asc: true,
						ty: sql_type_name(catalog, attr.type_id),
					});
				}
			}
		}
		Ok(exprs)
	}

	/// The rows strictly after (or before) a cursor, as a lexicographic
	/// comparison which places nulls last when ascending and first when
	/// descending.
	fn seek(&mut self, exprs: &[OrderExpr], values: &[Option<String>], after: bool) -> String {
		let mut alternatives = vec![];
		for (i, e) in exprs.iter().enumerate() {
			let mut terms = vec![];
			for (prefix, value) in exprs[..i].iter().zip(values) {
				let p = self.sql.param(value.clone(), &prefix.ty);
				terms.push(format!("{} is not distinct from {p}", prefix.expr));
			}
			let expr = &e.expr;
			let beyond = match (after == e.asc, &values[i]) {
				(true, Some(v)) => {
					let p = self.sql.param(Some(v.clone()), &e.ty);
					format!("({expr} > {p} or {expr} is null)")
				}
				(true, None) => "false".to_owned(),
				(false, Some(v)) => {
					let p = self.sql.param(Some(v.clone()), &e.ty);
					format!("{expr} < {p}")
				}
				(false, None) => format!("{expr} is not null"),
			};
			terms.push(beyond);
			alternatives.push(terms.join(" and "));
		}
		format!("coalesce(({}), false)", alternatives.join(") or ("))
	}

	fn predicates(&mut self, src: &Source<'_>, row: &Row, args: &PageArgs) -> Result<Vec<String>, GqlError> {
		let mut predicates: Vec<String> =
			src.correlation.iter().map(|(col, outer)| format!("{} = {outer}", row.column(col))).collect();
		if let Some((ty, value)) = &args.condition {
			predicates.extend(self.condition(ty, value, row)?);
		}
		if let Some((ty, value)) = &args.filter {
			predicates.push(self.filter(ty, value, row)?);
		}
		Ok(predicates)
	}

	/// Whether rows exist on the far side of a cursor.
	fn probe(
		&mut self,
		src: &Source<'_>,
		args: &PageArgs,
		terms: &[OrderTerm],
		cursor: &Cursor,
		after: bool,
	) -> Result<String, GqlError> {
		let alias = self.sql.alias();
		let row = src.row(&alias);
		let exprs = self.order_exprs(src, terms, &alias, &row)?;
		let mut predicates = self.predicates(src, &row, args)?;
		let seek = self.seek(&exprs, &cursor.values, after);
		predicates.push(format!("not {seek}"));
		Ok(format!("exists (select 1 from {} where {})", src.from_sql(&alias), conjunction(&predicates)))
	}

	fn node(&mut self, src: &Source<'_>, row: &Row, node_ty: &str, children: &[Selection]) -> Result<String, GqlError> {
		match src.class {
			Some(_) => self.record(node_ty, row, children),
			None => self.output(row.whole().to_owned(), src.item_type, node_ty, children),
		}
	}

	fn collection(
		&mut self,
		ty: &str,
		sel: &Selection,
		src: &Source<'_>,
		shape: Shape,
		field_ty: &str,
	) -> Result<String, GqlError> {
		let engine = self.engine;
		let args = self.page_args(ty, sel)?;
		let (order_name, terms) = self.ordering(ty, sel, src, &args)?;
		let alias = self.sql.alias();
		let row = src.row(&alias);
		let exprs = self.order_exprs(src, &terms, &alias, &row)?;
		let mut predicates = self.predicates(src, &row, &args)?;
		let after = args.after.as_deref().map(|c| cursor::decode(c, &order_name, exprs.len())).transpose()?;
		let before = args.before.as_deref().map(|c| cursor::decode(c, &order_name, exprs.len())).transpose()?;
		if let Some(c) = &after {
			predicates.push(self.seek(&exprs, &c.values, true));
		}
		if let Some(c) = &before {
			predicates.push(self.seek(&exprs, &c.values, false));
		}
		let reverse = args.last.is_some();
		let order = exprs
			.iter()
			.map(|e| format!("{} {}", e.expr, if e.asc != reverse { "asc" } else { "desc" }))
			.collect::<Vec<_>>()
			.join(", ");
		let offset = args.offset.unwrap_or(0);
		let page = self.sql.alias();
		let from = src.from_sql(&alias);
		let filtered = conjunction(&predicates);
		let window = |limit: Option<u64>| {
			let mut tail = String::new();
			if let Some(n) = limit {
				tail.push_str(&format!(" limit {n}"));
			}
			if offset > 0 {
				tail.push_str(&format!(" offset {offset}"));
			}
			tail
		};
		if shape == Shape::List {
			let node = self.node(src, &row, field_ty, &sel.children)?;
			return Ok(format!(
				"(select coalesce(jsonb_agg({page}.\"__n\" order by {page}.\"__r\"), '[]'::jsonb) from (select {node} as \"__n\", row_number() over (order by {order}) as \"__r\" from {from} where {filtered} order by {order}{}) as {page})",
				window(args.first)
			));
		}
		let col = |name: &str| format!("{page}.\"{name}\"");
		let size = args.first.or(args.last);
		let in_page = match size {
			Some(n) => format!("{} <= {}", col("__r"), offset + n),
			None => "true".to_owned(),
		};
		let direction = if reverse { "desc" } else { "asc" };
		let agg = |expr: &str| {
			format!("jsonb_agg({expr} order by {} {direction}) filter (where {in_page})", col("__r"))
		};
		let keys = exprs.iter().map(|e| format!("({})::text", e.expr)).collect::<Vec<_>>().join(", ");
		let mut columns = vec![
			(format!("jsonb_build_array({}, jsonb_build_array({keys}))", literal(&order_name)), "__c".to_owned()),
			(format!("row_number() over (order by {order})"), "__r".to_owned()),
		];
		let mut pairs = vec![];
		let mut paged = false;
		for child in sel.children.iter() {
			let child_ty = field_type(engine, field_ty, &child.name);
			match engine.blueprint.field(field_ty, &child.name) {
				Some(FieldSource::Nodes) => {
					let name = format!("__n{}", columns.len());
					columns.push((self.node(src, &row, child_ty, &child.children)?, name.clone()));
					pairs.push((child.key.clone(), format!("coalesce({}, '[]'::jsonb)", agg(&col(&name)))));
					paged = true;
				}
				Some(FieldSource::Edges) => {
					let mut edge = vec![];
					for part in child.children.iter() {
						match engine.blueprint.field(child_ty, &part.name) {
							Some(FieldSource::Cursor) => edge.push((part.key.clone(), col("__c"))),
							Some(FieldSource::Node) => {
								let node_ty = field_type(engine, child_ty, &part.name);
								let name = format!("__n{}", columns.len());
								columns.push((self.node(src, &row, node_ty, &part.children)?, name.clone()));
								edge.push((part.key.clone(), col(&name)));
							}
							_ => {}
						}
					}
					pairs.push((child.key.clone(), format!("coalesce({}, '[]'::jsonb)", agg(&json_object(&edge)))));
					paged = true;
				}
				Some(FieldSource::PageInfo) => {
					let mut info = vec![];
					for part in child.children.iter() {
						let expr = match engine.blueprint.field(child_ty, &part.name) {
							Some(FieldSource::HasNextPage) => match (reverse, args.first, &before) {
								(false, Some(n), _) => format!("count(*) > {n}"),
								(_, _, Some(c)) => self.probe(src, &args, &terms, c, false)?,
								_ => "false".to_owned(),
							},
							Some(FieldSource::HasPreviousPage) => match (reverse, args.last, &after) {
								(true, Some(n), _) => format!("count(*) > {n}"),
								(_, _, Some(c)) => self.probe(src, &args, &terms, c, true)?,
								_ => (offset > 0).to_string(),
							},
							Some(FieldSource::StartCursor) => format!("({}) -> 0", agg(&col("__c"))),
							Some(FieldSource::EndCursor) => format!("({}) -> -1", agg(&col("__c"))),
							_ => continue,
						};
						info.push((part.key.clone(), expr));
					}
					pairs.push((child.key.clone(), json_object(&info)));
					paged = true;
				}
				Some(FieldSource::TotalCount) => {
					let alias = self.sql.alias();
					let row = src.row(&alias);
					let predicates = self.predicates(src, &row, &args)?;
					pairs.push((
						child.key.clone(),
						format!(
							"(select count(*) from {} where {})::int",
							src.from_sql(&alias),
							conjunction(&predicates)
						),
					));
				}
				_ => {}
			}
		}
		let object = json_object(&pairs);
		if !paged {
			return Ok(format!("(select {object})"));
		}
		let limit = size.map(|n| n + 1);
		let columns = columns.iter().map(|(e, c)| format!("{e} as \"{c}\"")).collect::<Vec<_>>().join(", ");
		Ok(format!(
			"(select {object} from (select {columns} from {from} where {filtered} order by {order}{}) as {page})",
			window(limit)
		))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use async_graphql::Name;

	use super::*;
	use crate::build::plugins::testing::build;
	use crate::build::{BuildOptions, SimpleCollections};
	use crate::catalog::fixture::{procedure as function_fixture, self_referencing};
	use crate::catalog::{Catalog, oid};

	fn engine_for(catalog: Catalog, options: BuildOptions) -> Engine {
		let schema = build(catalog, options);
		Engine::new(Arc::clone(&schema.catalog), Arc::clone(&schema.blueprint))
	}

	fn engine() -> Engine {
		engine_for(self_referencing(), BuildOptions::default())
	}

	fn compile(engine: &Engine, sel: &Selection) -> Result<Statement, GqlError> {
		let mut planner = Planner::new(engine);
		let expr = planner.field("Query", sel, None)?.unwrap_or_else(|| "null".into());
		Ok(planner.finish(format!("select {expr} as \"value\"")))
	}

	#[test]
	fn row_by_key_with_a_forward_relation() {
		let engine = engine();
		let sel = Selection::new("tById")
			.arg("id", Value::from(2))
			.child(Selection::new("name"))
			.child(Selection::new("parentByParentId").child(Selection::new("name")));
		let statement = compile(&engine, &sel).unwrap();
		assert_eq!(statement.params, vec![Some("2".to_owned())]);
		assert!(statement.sql.contains("from \"public\".\"t\" as __t1 where (__t1.\"id\" = $1::text::\"pg_catalog\".\"int4\")"));
		assert!(statement.sql.contains("'parentByParentId', (select jsonb_build_object('name', __t2.\"name\") from \"public\".\"t\" as __t2 where (__t2.\"id\" = __t1.\"parent_id\") limit 1)"));
	}

	#[test]
	fn aliases_key_the_document() {
		let engine = engine();
		let sel = Selection::new("tById")
			.arg("id", Value::from(1))
			.child(Selection::new("name").alias("label"))
			.child(Selection::new("name"));
		let statement = compile(&engine, &sel).unwrap();
		assert!(statement.sql.contains("jsonb_build_object('label', __t1.\"name\", 'name', __t1.\"name\")"));
	}

	#[test]
	fn connections_page_one_extra_row() {
		let engine = engine();
		let sel = Selection::new("allTs")
			.arg("first", Value::from(2))
			.child(Selection::new("nodes").child(Selection::new("id")))
			.child(Selection::new("pageInfo").child(Selection::new("hasNextPage")).child(Selection::new("hasPreviousPage")))
			.child(Selection::new("totalCount"));
		let statement = compile(&engine, &sel).unwrap();
		assert!(statement.sql.contains("order by __t1.\"id\" asc limit 3)"), "{}", statement.sql);
		assert!(statement.sql.contains("'hasNextPage', count(*) > 2"));
		assert!(statement.sql.contains("'hasPreviousPage', false"));
		assert!(statement.sql.contains("(select count(*) from \"public\".\"t\" as __t3 where true)::int"));
		assert!(statement.sql.contains("jsonb_build_array('PRIMARY_KEY_ASC', jsonb_build_array((__t1.\"id\")::text))"));
	}

	#[test]
	fn last_reverses_the_order() {
		let engine = engine();
		let sel = Selection::new("allTs")
			.arg("last", Value::from(1))
			.arg("orderBy", Value::List(vec![Value::Enum(Name::new("NAME_ASC"))]))
			.child(Selection::new("nodes").child(Selection::new("id")));
		let statement = compile(&engine, &sel).unwrap();
		assert!(statement.sql.contains("order by __t1.\"name\" desc, __t1.\"id\" desc limit 2"), "{}", statement.sql);
		assert!(statement.sql.contains("order by __t2.\"__r\" desc"));
	}

	#[test]
	fn cursors_seek_past_their_row() {
		let engine = engine();
		let after = cursor::encode(&serde_json::json!(["PRIMARY_KEY_ASC", ["1"]]));
		let sel = Selection::new("allTs")
			.arg("after", Value::from(after))
			.child(Selection::new("edges").child(Selection::new("cursor")));
		let statement = compile(&engine, &sel).unwrap();
		assert!(statement.sql.contains("coalesce(((__t1.\"id\" > $1::text::\"pg_catalog\".\"int4\" or __t1.\"id\" is null)), false)"));
		assert_eq!(statement.params, vec![Some("1".to_owned())]);
	}

	#[test]
	fn cursors_of_another_ordering_are_rejected() {
		let engine = engine();
		let after = cursor::encode(&serde_json::json!(["NAME_ASC,PRIMARY_KEY_ASC", ["a", "1"]]));
		let sel = Selection::new("allTs").arg("after", Value::from(after)).child(Selection::new("totalCount"));
		assert!(matches!(compile(&engine, &sel), Err(GqlError::Validation(_))));
	}

	#[test]
	fn backward_relations_correlate() {
		let engine = engine_for(self_referencing(), BuildOptions {
			simple_collections: SimpleCollections::Both,
			..Default::default()
		});
		let sel = Selection::new("tById")
			.arg("id", Value::from(1))
			.child(Selection::new("tsByParentIdList").child(Selection::new("name")));
		let statement = compile(&engine, &sel).unwrap();
		assert!(statement.sql.contains("where (__t2.\"parent_id\" = __t1.\"id\")"), "{}", statement.sql);
		assert!(statement.sql.contains("coalesce(jsonb_agg(__t3.\"__n\" order by __t3.\"__r\"), '[]'::jsonb)"));
	}

	#[test]
	fn strict_functions_skip_sql_for_nulls() {
		let mut catalog = self_referencing();
		catalog.procedures.push(Procedure {
			is_strict: true,
			..function_fixture(400, "double", &[oid::INT4], oid::INT4)
		});
		let engine = engine_for(catalog, BuildOptions::default());
		let mut planner = Planner::new(&engine);
		assert_eq!(planner.field("Query", &Selection::new("double"), None).unwrap(), None);
		let sel = Selection::new("double").arg("arg0", Value::from(2));
		let expr = planner.field("Query", &sel, None).unwrap().unwrap();
		assert_eq!(expr, "\"public\".\"double\"($1::text::\"pg_catalog\".\"int4\")");
	}

	#[test]
	fn first_and_last_together_are_rejected() {
		let engine = engine();
		let sel = Selection::new("allTs")
			.arg("first", Value::from(1))
			.arg("last", Value::from(1))
			.child(Selection::new("totalCount"));
		assert!(matches!(compile(&engine, &sel), Err(GqlError::Validation(_))));
	}
}
