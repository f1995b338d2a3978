//! Compiles `condition` and `filter` arguments into predicates.

use async_graphql::{Name, Value};

use super::error::{GqlError, unknown_field, validation_error};
use super::plan::{Planner, Row, attribute, function, procedure};
use super::sql::{conjunction, escape_like};
use crate::build::registry::named;
use crate::build::source::{FilterOp, InputFieldSource};
use crate::catalog::TypeId;

fn fields<'v>(ty: &str, value: &'v Value) -> Result<impl Iterator<Item = (&'v Name, &'v Value)>, GqlError> {
	match value {
		Value::Object(fields) => Ok(fields.iter()),
		_ => Err(validation_error(format!("Expected an object of type `{ty}`"))),
	}
}

impl Planner<'_> {
	/// The equality predicates of a `condition` argument of input type `ty`.
	pub(crate) fn condition(&mut self, ty: &str, value: &Value, row: &Row) -> Result<Vec<String>, GqlError> {
		let engine = self.engine;
		let mut predicates = vec![];
		for (name, v) in fields(ty, value)? {
			let Some(InputFieldSource::Column {
				class,
				num,
			}) = engine.blueprint.input(ty, name)
			else {
				return Err(unknown_field(name));
			};
			let attr = attribute(engine, *class, *num)?;
			let column = row.column(&attr.name);
			predicates.push(match v {
				Value::Null => format!("{column} is null"),
				v => format!("{column} = {}", self.param(attr.type_id, v)?),
			});
		}
		Ok(predicates)
	}

	/// The predicate of a `filter` argument of input type `ty`.
	pub(crate) fn filter(&mut self, ty: &str, value: &Value, row: &Row) -> Result<String, GqlError> {
		let engine = self.engine;
		let mut predicates = vec![];
		for (name, v) in fields(ty, value)? {
			if matches!(v, Value::Null) {
				continue;
			}
			let field_ty = engine.blueprint.input_type(ty, name).map(named).unwrap_or_default();
			match engine.blueprint.input(ty, name) {
				Some(InputFieldSource::Column {
					class,
					num,
				}) => {
					let attr = attribute(engine, *class, *num)?;
					predicates.extend(self.operators(field_ty, v, &row.column(&attr.name), attr.type_id)?);
				}
				Some(InputFieldSource::Computed {
					proc,
				}) => {
					let proc = procedure(engine, *proc)?;
					let expr = format!("{}({})", function(engine, proc), row.whole());
					predicates.extend(self.operators(field_ty, v, &expr, proc.return_type_id)?);
				}
				Some(InputFieldSource::And) => {
					let Value::List(items) = v else {
						return Err(validation_error("Expected a list for `and`"));
					};
					let mut all = vec![];
					for item in items {
						all.push(self.filter(ty, item, row)?);
					}
					predicates.push(conjunction(&all));
				}
				Some(InputFieldSource::Or) => {
					let Value::List(items) = v else {
						return Err(validation_error("Expected a list for `or`"));
					};
					let mut any = vec![];
					for item in items {
						any.push(format!("({})", self.filter(ty, item, row)?));
					}
					predicates.push(match any.is_empty() {
						true => "false".to_owned(),
						false => any.join(" or "),
					});
				}
				Some(InputFieldSource::Not) => {
					predicates.push(format!("not ({})", self.filter(ty, v, row)?));
				}
				_ => return Err(unknown_field(name)),
			}
		}
		Ok(conjunction(&predicates))
	}

	/// The predicates of an operator input applied to `expr`.
	fn operators(&mut self, ty: &str, value: &Value, expr: &str, type_id: TypeId) -> Result<Vec<String>, GqlError> {
		let engine = self.engine;
		let mut predicates = vec![];
		for (name, v) in fields(ty, value)? {
			if matches!(v, Value::Null) {
				continue;
			}
			let Some(InputFieldSource::Operator(op)) = engine.blueprint.input(ty, name) else {
				return Err(unknown_field(name));
			};
			predicates.push(self.operator(*op, v, expr, type_id)?);
		}
		Ok(predicates)
	}

	fn operator(&mut self, op: FilterOp, value: &Value, expr: &str, type_id: TypeId) -> Result<String, GqlError> {
		let cmp = match op {
			FilterOp::IsNull => {
				return match value {
					Value::Boolean(true) => Ok(format!("{expr} is null")),
					Value::Boolean(false) => Ok(format!("{expr} is not null")),
					_ => Err(validation_error("Operator `isNull` takes a boolean")),
				};
			}
			FilterOp::EqualTo => "=",
			FilterOp::NotEqualTo => "<>",
			FilterOp::DistinctFrom => "is distinct from",
			FilterOp::NotDistinctFrom => "is not distinct from",
			FilterOp::LessThan => "<",
			FilterOp::LessThanOrEqualTo => "<=",
			FilterOp::GreaterThan => ">",
			FilterOp::GreaterThanOrEqualTo => ">=",
			FilterOp::In | FilterOp::NotIn => {
				let Value::List(items) = value else {
					return Err(validation_error(format!("Operator `{}` takes a list", op.name())));
				};
				let negated = op == FilterOp::NotIn;
				if items.is_empty() {
					return Ok((if negated { "true" } else { "false" }).to_owned());
				}
				let mut params = Vec::with_capacity(items.len());
				for item in items {
					params.push(self.param(type_id, item)?);
				}
				let keyword = if negated { "not in" } else { "in" };
				return Ok(format!("{expr} {keyword} ({})", params.join(", ")));
			}
			_ => return self.pattern(op, value, expr),
		};
		Ok(format!("{expr} {cmp} {}", self.param(type_id, value)?))
	}

	/// The `like` family, matching the text of `expr`.
	fn pattern(&mut self, op: FilterOp, value: &Value, expr: &str) -> Result<String, GqlError> {
		let Value::String(s) = value else {
			return Err(validation_error(format!("Operator `{}` takes a string", op.name())));
		};
		let (pattern, keyword) = match op {
			FilterOp::Includes => (format!("%{}%", escape_like(s)), "like"),
			FilterOp::NotIncludes => (format!("%{}%", escape_like(s)), "not like"),
			FilterOp::StartsWith => (format!("{}%", escape_like(s)), "like"),
			FilterOp::EndsWith => (format!("%{}", escape_like(s)), "like"),
			FilterOp::Like => (s.clone(), "like"),
			FilterOp::NotLike => (s.clone(), "not like"),
			FilterOp::IncludesInsensitive => (format!("%{}%", escape_like(s)), "ilike"),
			FilterOp::LikeInsensitive => (s.clone(), "ilike"),
			op => return Err(validation_error(format!("Operator `{}` does not match patterns", op.name()))),
		};
		let param = self.sql.text(pattern);
		Ok(format!("({expr})::text {keyword} {param}"))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use async_graphql::value;

	use super::*;
	use crate::build::BuildOptions;
	use crate::build::plugins::testing::build;
	use crate::catalog::fixture::self_referencing;
	use crate::gql::Engine;

	fn engine() -> Engine {
		let schema = build(self_referencing(), BuildOptions::default());
		Engine::new(Arc::clone(&schema.catalog), Arc::clone(&schema.blueprint))
	}

	#[test]
	fn conditions_compare_or_test_for_null() {
		let engine = engine();
		let mut planner = Planner::new(&engine);
		let row = Row::alias("__t1");
		let predicates = planner.condition("TCondition", &value!({ "id": 1, "parentId": null }), &row).unwrap();
		assert_eq!(predicates, vec![
			"__t1.\"id\" = $1::text::\"pg_catalog\".\"int4\"".to_owned(),
			"__t1.\"parent_id\" is null".to_owned(),
		]);
		let err = planner.condition("TCondition", &value!({ "nope": 1 }), &row).unwrap_err();
		assert_eq!(err.to_string(), "Field `nope` not found");
	}

	#[test]
	fn filters_combine() {
		let engine = engine();
		let mut planner = Planner::new(&engine);
		let row = Row::alias("__t1");
		let filter = value!({
			"or": [{ "id": { "lessThan": 2 } }, { "name": { "startsWith": "50%" } }],
			"not": { "parentId": { "isNull": true } },
		});
		let sql = planner.filter("TFilter", &filter, &row).unwrap();
		assert_eq!(
			sql,
			"(((__t1.\"id\" < $1::text::\"pg_catalog\".\"int4\")) or (((__t1.\"name\")::text like $2::text))) and (not ((__t1.\"parent_id\" is null)))"
		);
		let statement = planner.finish(sql);
		assert_eq!(statement.params, vec![Some("2".to_owned()), Some("50\\%%".to_owned())]);
	}

	#[test]
	fn empty_lists_are_constant() {
		let engine = engine();
		let mut planner = Planner::new(&engine);
		let row = Row::alias("__t1");
		let filter = value!({ "id": { "in": [] }, "and": [] });
		assert_eq!(planner.filter("TFilter", &filter, &row).unwrap(), "(false) and (true)");
		let or = value!({ "or": [] });
		assert_eq!(planner.filter("TFilter", &or, &row).unwrap(), "(false)");
	}

	#[test]
	fn in_binds_each_item() {
		let engine = engine();
		let mut planner = Planner::new(&engine);
		let row = Row::alias("__t1");
		let filter = value!({ "id": { "notIn": [1, 2] } });
		assert_eq!(
			planner.filter("TFilter", &filter, &row).unwrap(),
			"(__t1.\"id\" not in ($1::text::\"pg_catalog\".\"int4\", $2::text::\"pg_catalog\".\"int4\"))"
		);
	}

	#[test]
	fn unknown_operators_fail() {
		let engine = engine();
		let mut planner = Planner::new(&engine);
		let filter = value!({ "id": { "like": "1%" } });
		assert!(matches!(planner.filter("TFilter", &filter, &Row::alias("__t1")), Err(GqlError::Validation(_))));
	}
}
