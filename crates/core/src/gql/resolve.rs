//! The root resolvers. Each one compiles its selection and runs it through
//! the request [`Session`].

use async_graphql::{Name, Value};
use serde_json::{Map, Value as Json};

use super::Engine;
use super::error::{GqlError, internal_error, unknown_field, validation_error};
use super::plan::{Planner, Row, Selection, class, constraint, function, procedure, table};
use super::sql::{conjunction, json_object};
use crate::build::registry::named;
use crate::build::source::{FieldSource, InputFieldSource, Shape};
use crate::build::types::{ident, sql_type_name};
use crate::catalog::{Attribute, Class, ClassId, ConstraintId, ProcId, oid};
use crate::dbs::Session;
use crate::inflect::Inflector;

/// Resolves field `sel` of root type `ty` into the JSON document its nested
/// fields read from.
pub async fn root(engine: &Engine, session: &dyn Session, ty: &str, sel: &Selection) -> Result<Json, GqlError> {
	match engine.blueprint.field(ty, &sel.name) {
		Some(FieldSource::QueryRoot) => Ok(Json::Object(Map::new())),
		Some(FieldSource::Create {
			class,
		}) => create(engine, session, ty, sel, *class).await,
		Some(FieldSource::Update {
			constraint,
		}) => update(engine, session, ty, sel, *constraint).await,
		Some(FieldSource::Delete {
			constraint,
		}) => delete(engine, session, ty, sel, *constraint).await,
		Some(FieldSource::MutationProcedure {
			proc,
			shape,
		}) => mutation_procedure(engine, session, ty, sel, *proc, *shape).await,
		_ => {
			let mut planner = Planner::new(engine);
			let Some(expr) = planner.field(ty, sel, None)? else {
				return Ok(Json::Null);
			};
			let statement = planner.finish(format!("select {expr} as \"value\""));
			Ok(session.fetch(&statement).await?.unwrap_or(Json::Null))
		}
	}
}

/// The fields of the `input` argument of a mutation, with its type name.
fn input<'s>(engine: &Engine, ty: &str, sel: &'s Selection) -> Result<(String, Vec<(&'s Name, &'s Value)>), GqlError> {
	let input_ty = engine
		.blueprint
		.arg_type(ty, &sel.name, "input")
		.map(|t| named(t).to_owned())
		.ok_or_else(|| internal_error(format!("`{ty}.{}` takes no input", sel.name)))?;
	match sel.arguments.get("input") {
		Some(Value::Object(fields)) => Ok((input_ty, fields.iter().collect())),
		_ => Err(validation_error(format!("Field `{}` needs an `input` object", sel.name))),
	}
}

fn object<'v>(ty: &str, value: &'v Value) -> Result<Vec<(&'v Name, &'v Value)>, GqlError> {
	match value {
		Value::Object(fields) => Ok(fields.iter().collect()),
		_ => Err(validation_error(format!("Expected an object of type `{ty}`"))),
	}
}

/// The columns set by a record or patch input, with their values.
fn columns<'v>(
	engine: &'v Engine,
	ty: &str,
	value: &'v Value,
) -> Result<Vec<(&'v Attribute, &'v Value)>, GqlError> {
	let mut columns = vec![];
	for (name, v) in object(ty, value)? {
		let Some(InputFieldSource::Column {
			class,
			num,
		}) = engine.blueprint.input(ty, name)
		else {
			return Err(unknown_field(name));
		};
		columns.push((super::plan::attribute(engine, *class, *num)?, v));
	}
	Ok(columns)
}

/// The payload children holding the affected record.
fn payload_records<'s>(engine: &Engine, payload: &str, sel: &'s Selection) -> Vec<&'s Selection> {
	sel.children
		.iter()
		.filter(|c| matches!(engine.blueprint.field(payload, &c.name), Some(FieldSource::PayloadRecord)))
		.collect()
}

fn payload_type(engine: &Engine, ty: &str, sel: &Selection) -> String {
	engine.blueprint.field_type(ty, &sel.name).map(|t| named(t).to_owned()).unwrap_or_default()
}

/// The JSON object of the payload records of a row in scope.
fn record_object(
	planner: &mut Planner<'_>,
	payload: &str,
	records: &[&Selection],
	row: &Row,
) -> Result<String, GqlError> {
	let engine = planner.engine;
	let mut pairs = vec![];
	for r in records {
		let node = engine.blueprint.field_type(payload, &r.name).map(named).unwrap_or_default();
		pairs.push((r.key.clone(), planner.record(node, row, &r.children)?));
	}
	Ok(json_object(&pairs))
}

/// Assembles a payload from the client mutation id and the records.
fn payload(engine: &Engine, payload: &str, sel: &Selection, client_id: Option<&Value>, mut records: Json) -> Result<Json, GqlError> {
	let mut out = Map::new();
	for child in sel.children.iter() {
		let value = match engine.blueprint.field(payload, &child.name) {
			Some(FieldSource::ClientMutationId) => match client_id {
				Some(v) => v.clone().into_json().map_err(|e| internal_error(e.to_string()))?,
				None => Json::Null,
			},
			Some(FieldSource::PayloadRecord) => records.get_mut(&child.key).map(Json::take).unwrap_or(Json::Null),
			Some(FieldSource::QueryRoot) => Json::Object(Map::new()),
			_ => return Err(validation_error(format!("Field `{}` not found on `{payload}`", child.name))),
		};
		out.insert(child.key.clone(), value);
	}
	Ok(Json::Object(out))
}

/// The text values of a key, as returned by `key_array`.
fn key_values(json: Json) -> Result<Vec<Option<String>>, GqlError> {
	let Json::Array(values) = json else {
		return Err(internal_error("Expected the key of the affected row"));
	};
	values
		.into_iter()
		.map(|v| match v {
			Json::Null => Ok(None),
			Json::String(s) => Ok(Some(s)),
			v => Err(internal_error(format!("Unexpected key value {v}"))),
		})
		.collect()
}

fn key_array(keys: &[&Attribute], row: &Row) -> String {
	let values = keys.iter().map(|a| format!("({})::text", row.column(&a.name))).collect::<Vec<_>>();
	format!("jsonb_build_array({})", values.join(", "))
}

/// Fetches the payload records of the row whose `keys` have `values`.
async fn refetch(
	engine: &Engine,
	session: &dyn Session,
	class: &Class,
	keys: &[&Attribute],
	values: Vec<Option<String>>,
	payload: &str,
	records: &[&Selection],
) -> Result<Json, GqlError> {
	let mut planner = Planner::new(engine);
	let alias = planner.sql.alias();
	let row = Row::alias(&alias);
	let mut predicates = vec![];
	for (attr, value) in keys.iter().zip(values) {
		let param = planner.sql.param(value, &sql_type_name(&engine.catalog, attr.type_id));
		predicates.push(format!("{} = {param}", row.column(&attr.name)));
	}
	let object = record_object(&mut planner, payload, records, &row)?;
	let statement = planner.finish(format!(
		"select {object} as \"value\" from {} as {alias} where {}",
		table(engine, class),
		conjunction(&predicates)
	));
	Ok(session.fetch(&statement).await?.unwrap_or(Json::Null))
}

async fn create(engine: &Engine, session: &dyn Session, ty: &str, sel: &Selection, id: ClassId) -> Result<Json, GqlError> {
	let class = class(engine, id)?;
	let (input_ty, fields) = input(engine, ty, sel)?;
	let mut client_id = None;
	let mut record = None;
	for (name, v) in fields {
		match engine.blueprint.input(&input_ty, name) {
			Some(InputFieldSource::ClientMutationId) => client_id = Some(v),
			Some(InputFieldSource::Record) => {
				let record_ty = engine.blueprint.input_type(&input_ty, name).map(named).unwrap_or_default();
				record = Some(columns(engine, record_ty, v)?);
			}
			_ => return Err(unknown_field(name)),
		}
	}
	let record = record.unwrap_or_default();
	let payload_ty = payload_type(engine, ty, sel);
	let records = payload_records(engine, &payload_ty, sel);
	let mut planner = Planner::new(engine);
	let alias = planner.sql.alias();
	let row = Row::alias(&alias);
	let mut names = vec![];
	let mut values = vec![];
	for (attr, v) in record {
		names.push(ident(&attr.name));
		values.push(planner.param(attr.type_id, v)?);
	}
	let insert = match names.is_empty() {
		true => format!("insert into {} as {alias} default values", table(engine, class)),
		false => format!(
			"insert into {} as {alias} ({}) values ({})",
			table(engine, class),
			names.join(", "),
			values.join(", ")
		),
	};
	let Some(pk) = engine.catalog.primary_key(class) else {
		// Without a key the row cannot be found again, so it is read from the insert itself
		let object = record_object(&mut planner, &payload_ty, &records, &row)?;
		let statement = planner.finish(format!(
			"with __m as ({insert} returning {alias}.*) select {object} as \"value\" from __m as {alias}"
		));
		let records = session.fetch(&statement).await?.unwrap_or(Json::Null);
		return payload(engine, &payload_ty, sel, client_id, records);
	};
	let keys = engine.catalog.key_attributes(pk);
	let statement = planner.finish(format!("{insert} returning {} as \"value\"", key_array(&keys, &row)));
	let key = session.fetch(&statement).await?.ok_or_else(|| internal_error("The insert returned no row"))?;
	if records.is_empty() {
		return payload(engine, &payload_ty, sel, client_id, Json::Null);
	}
	let records = refetch(engine, session, class, &keys, key_values(key)?, &payload_ty, &records).await?;
	payload(engine, &payload_ty, sel, client_id, records)
}

/// The identifying columns of an update or delete, with their values.
fn target<'v>(
	engine: &'v Engine,
	planner: &mut Planner<'_>,
	ty: &str,
	sel: &'v Selection,
	id: ConstraintId,
	row: &Row,
) -> Result<(&'v Class, Vec<String>, Option<&'v Value>, Option<(String, &'v Value)>), GqlError> {
	let key = constraint(engine, id)?;
	let class = class(engine, key.class_id)?;
	let (input_ty, fields) = input(engine, ty, sel)?;
	let mut client_id = None;
	let mut patch = None;
	let mut predicates = vec![];
	for (name, v) in fields {
		match engine.blueprint.input(&input_ty, name) {
			Some(InputFieldSource::ClientMutationId) => client_id = Some(v),
			Some(InputFieldSource::Patch) => {
				let patch_ty = engine.blueprint.input_type(&input_ty, name).map(named).unwrap_or_default();
				patch = Some((patch_ty.to_owned(), v));
			}
			Some(InputFieldSource::Key {
				num,
			}) => {
				let attr = super::plan::attribute(engine, key.class_id, *num)?;
				if matches!(v, Value::Null) {
					return Err(validation_error(format!("Key `{name}` may not be null")));
				}
				let param = planner.param(attr.type_id, v)?;
				predicates.push(format!("{} = {param}", row.column(&attr.name)));
			}
			_ => return Err(unknown_field(name)),
		}
	}
	if predicates.len() != key.key_attribute_nums.len() {
		return Err(validation_error(format!("`{}` needs a value for every key column", sel.name)));
	}
	Ok((class, predicates, client_id, patch))
}

async fn update(
	engine: &Engine,
	session: &dyn Session,
	ty: &str,
	sel: &Selection,
	id: ConstraintId,
) -> Result<Json, GqlError> {
	let mut planner = Planner::new(engine);
	let alias = planner.sql.alias();
	let row = Row::alias(&alias);
	let (class, predicates, client_id, patch) = target(engine, &mut planner, ty, sel, id, &row)?;
	let mut sets = vec![];
	if let Some((patch_ty, value)) = patch {
		for (attr, v) in columns(engine, &patch_ty, value)? {
			sets.push(format!("{} = {}", ident(&attr.name), planner.param(attr.type_id, v)?));
		}
	}
	// The primary key identifies the row afterwards, as the patch may change other keys
	let key = match engine.catalog.primary_key(class) {
		Some(pk) => pk,
		None => constraint(engine, id)?,
	};
	let keys = engine.catalog.key_attributes(key);
	let returned = key_array(&keys, &row);
	let sql = match sets.is_empty() {
		true => format!(
			"select {returned} as \"value\" from {} as {alias} where {}",
			table(engine, class),
			conjunction(&predicates)
		),
		false => format!(
			"update {} as {alias} set {} where {} returning {returned} as \"value\"",
			table(engine, class),
			sets.join(", "),
			conjunction(&predicates)
		),
	};
	let statement = planner.finish(sql);
	let Some(key) = session.fetch(&statement).await? else {
		return Err(validation_error(format!(
			"No values were updated in collection '{}' because no values you asked to update were found.",
			Inflector.collection(class)
		)));
	};
	let payload_ty = payload_type(engine, ty, sel);
	let records = payload_records(engine, &payload_ty, sel);
	if records.is_empty() {
		return payload(engine, &payload_ty, sel, client_id, Json::Null);
	}
	let records = refetch(engine, session, class, &keys, key_values(key)?, &payload_ty, &records).await?;
	payload(engine, &payload_ty, sel, client_id, records)
}

async fn delete(
	engine: &Engine,
	session: &dyn Session,
	ty: &str,
	sel: &Selection,
	id: ConstraintId,
) -> Result<Json, GqlError> {
	let mut planner = Planner::new(engine);
	let alias = planner.sql.alias();
	let row = Row::alias(&alias);
	let (class, predicates, client_id, _) = target(engine, &mut planner, ty, sel, id, &row)?;
	let payload_ty = payload_type(engine, ty, sel);
	let records = payload_records(engine, &payload_ty, sel);
	let object = record_object(&mut planner, &payload_ty, &records, &row)?;
	let statement = planner.finish(format!(
		"with __m as (delete from {} as {alias} where {} returning {alias}.*) select {object} as \"value\" from __m as {alias}",
		table(engine, class),
		conjunction(&predicates)
	));
	let Some(records) = session.fetch(&statement).await? else {
		return Err(validation_error(format!(
			"No values were deleted in collection '{}' because no values you asked to delete were found.",
			Inflector.collection(class)
		)));
	};
	payload(engine, &payload_ty, sel, client_id, records)
}

async fn mutation_procedure(
	engine: &Engine,
	session: &dyn Session,
	ty: &str,
	sel: &Selection,
	id: ProcId,
	shape: Shape,
) -> Result<Json, GqlError> {
	let proc = procedure(engine, id)?;
	let (input_ty, fields) = input(engine, ty, sel)?;
	let mut client_id = None;
	let mut values = vec![];
	for (name, v) in fields {
		match engine.blueprint.input(&input_ty, name) {
			Some(InputFieldSource::ClientMutationId) => client_id = Some(v),
			Some(InputFieldSource::ProcArg {
				index,
			}) => values.push((*index, v.clone())),
			_ => return Err(unknown_field(name)),
		}
	}
	let payload_ty = payload_type(engine, ty, sel);
	let records = payload_records(engine, &payload_ty, sel);
	let mut planner = Planner::new(engine);
	let Some(call) = planner.call(proc, None, &values)? else {
		return payload(engine, &payload_ty, sel, client_id, Json::Null);
	};
	let alias = planner.sql.alias();
	let row = Row::alias(&alias);
	let returned = engine.catalog.class_by_type(proc.return_type_id);
	let mut pairs = vec![];
	for r in records.iter() {
		let item_ty = engine.blueprint.field_type(&payload_ty, &r.name).map(named).unwrap_or_default();
		let item = match returned {
			Some(_) => format!("case when ({alias} is null) then null else {} end", planner.record(item_ty, &row, &r.children)?),
			None => planner.output(alias.clone(), proc.return_type_id, item_ty, &r.children)?,
		};
		pairs.push((r.key.clone(), item));
	}
	let sql = match (shape, proc.return_type_id.0 == oid::VOID) {
		(_, true) => format!("select null::jsonb as \"value\" from {call} as {alias}"),
		(Shape::Single, false) if returned.is_some() => format!(
			"select {} as \"value\" from {call} as {alias} where not ({alias} is null)",
			json_object(&pairs)
		),
		(Shape::Single, false) => format!("select {} as \"value\" from {call} as {alias}", json_object(&pairs)),
		(_, false) => {
			// One aggregate per record key, so every key holds the whole set
			let aggs: Vec<(String, String)> = pairs
				.into_iter()
				.map(|(key, item)| (key, format!("coalesce(jsonb_agg({item}), '[]'::jsonb)")))
				.collect();
			format!("select {} as \"value\" from {call} as {alias}", json_object(&aggs))
		}
	};
	trace!(target: super::TARGET, "Calling {}", function(engine, proc));
	let statement = planner.finish(sql);
	let records = session.fetch(&statement).await?.unwrap_or(Json::Null);
	payload(engine, &payload_ty, sel, client_id, records)
}
