//! Turns the refined schema description into an executable dynamic schema.

use std::sync::Arc;

use async_graphql::dynamic::{
	Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Object, ResolverContext, Scalar,
	Schema, TypeRef,
};
use serde_json::Value as Json;

use super::plugins::BUILTIN_SCALARS;
use super::registry::{ObjectSpec, TypeSpec};
use super::source::Blueprint;
use super::{BuildOptions, SchemaSpec, TARGET};
use crate::catalog::Catalog;
use crate::cnf::MAX_QUERY_DEPTH;
use crate::dbs::Session;
use crate::err::{Error, schema_error};
use crate::gql::plan::Selection;
use crate::gql::schema::BuiltSchema;
use crate::gql::value::to_field_value;
use crate::gql::{Engine, Row, resolve};

/// Collects what every field, argument, input field and enum value stands for.
fn blueprint(spec: &SchemaSpec, options: &BuildOptions) -> Blueprint {
	let mut bp = Blueprint {
		dynamic_json: options.dynamic_json,
		..Default::default()
	};
	for ty in spec.registry.iter() {
		match ty {
			TypeSpec::Object(obj) => {
				let name = obj.scope.name.clone();
				bp.objects.insert(name.clone());
				for field in obj.fields.iter() {
					bp.fields.entry(name.clone()).or_default().insert(field.name.clone(), field.source.clone());
					bp.types.entry(name.clone()).or_default().insert(field.name.clone(), field.ty.clone());
					let key = (name.clone(), field.name.clone());
					for arg in field.args.iter() {
						bp.args.entry(key.clone()).or_default().insert(arg.name.clone(), arg.source.clone());
						bp.arg_types.entry(key.clone()).or_default().insert(arg.name.clone(), arg.ty.clone());
					}
				}
			}
			TypeSpec::Input(input) => {
				let name = input.scope.name.clone();
				for field in input.fields.iter() {
					bp.inputs.entry(name.clone()).or_default().insert(field.name.clone(), field.source.clone());
					bp.input_types.entry(name.clone()).or_default().insert(field.name.clone(), field.ty.clone());
				}
			}
			TypeSpec::Enum(e) => {
				let values = bp.enums.entry(e.scope.name.clone()).or_default();
				for value in e.values.iter() {
					values.insert(value.name.clone(), value.source.clone());
				}
			}
			TypeSpec::Scalar(_) => {}
		}
	}
	bp
}

/// A field of a root type, which runs a statement.
///
/// A nullable field that fails resolves to null and reports its error at its
/// own path, so its siblings still resolve.
fn root_field(engine: Arc<Engine>, ty: String, name: &str, out: TypeRef) -> Field {
	Field::new(name, out.clone(), move |ctx: ResolverContext| {
		let engine = engine.clone();
		let ty = ty.clone();
		let out = out.clone();
		FieldFuture::new(async move {
			let resolved = async {
				let session = ctx.data::<Arc<dyn Session>>()?;
				let sel = Selection::from_field(ctx.ctx.field())?;
				let json = resolve::root(&engine, session.as_ref(), &ty, &sel).await?;
				Ok::<_, async_graphql::Error>(to_field_value(&engine.blueprint, &out, json)?)
			};
			match resolved.await {
				Err(e) if !matches!(out, TypeRef::NonNull(_)) => {
					ctx.ctx.add_error(ctx.ctx.set_error_path(e.into_server_error(ctx.ctx.item.pos)));
					Ok(None)
				}
				resolved => resolved,
			}
		})
	})
}

/// A field of any other type, which reads its value from the parent document.
fn nested_field(blueprint: Arc<Blueprint>, name: &str, out: TypeRef) -> Field {
	Field::new(name, out.clone(), move |ctx: ResolverContext| {
		let blueprint = blueprint.clone();
		let out = out.clone();
		FieldFuture::new(async move {
			let field = ctx.ctx.field();
			let key = field.alias().unwrap_or_else(|| field.name());
			let parent = ctx.parent_value.try_downcast_ref::<Row>()?;
			let value = parent.0.get(key).cloned().unwrap_or(Json::Null);
			Ok(to_field_value(&blueprint, &out, value)?)
		})
	})
}

fn object(obj: &ObjectSpec, engine: &Arc<Engine>, root: bool) -> Object {
	let ty = &obj.scope.name;
	let mut object = Object::new(ty.as_str());
	if let Some(description) = &obj.description {
		object = object.description(description);
	}
	for spec in obj.fields.iter() {
		let mut field = match root {
			true => root_field(engine.clone(), ty.clone(), &spec.name, spec.ty.clone()),
			false => nested_field(engine.blueprint.clone(), &spec.name, spec.ty.clone()),
		};
		if let Some(description) = &spec.description {
			field = field.description(description);
		}
		if spec.deprecation.is_some() {
			field = field.deprecation(spec.deprecation.as_deref());
		}
		for arg in spec.args.iter() {
			let mut input = InputValue::new(arg.name.as_str(), arg.ty.clone());
			if let Some(description) = &arg.description {
				input = input.description(description);
			}
			if let Some(default) = &arg.default {
				input = input.default_value(default.clone());
			}
			field = field.argument(input);
		}
		object = object.field(field);
	}
	object
}

pub(super) fn materialize(
	spec: SchemaSpec,
	catalog: Arc<Catalog>,
	options: &BuildOptions,
) -> Result<BuiltSchema, Error> {
	let blueprint = Arc::new(blueprint(&spec, options));
	let engine = Arc::new(Engine::new(catalog.clone(), blueprint.clone()));
	let mut builder = Schema::build(&spec.query, spec.mutation.as_deref(), None);
	for ty in spec.registry.iter() {
		match ty {
			TypeSpec::Object(obj) => {
				let root = obj.scope.name == spec.query || Some(&obj.scope.name) == spec.mutation.as_ref();
				builder = builder.register(object(obj, &engine, root));
			}
			TypeSpec::Input(input) => {
				let mut object = InputObject::new(input.scope.name.as_str());
				if let Some(description) = &input.description {
					object = object.description(description);
				}
				for f in input.fields.iter() {
					let mut field = InputValue::new(f.name.as_str(), f.ty.clone());
					if let Some(description) = &f.description {
						field = field.description(description);
					}
					object = object.field(field);
				}
				builder = builder.register(object);
			}
			TypeSpec::Enum(e) => {
				let mut en = Enum::new(e.scope.name.as_str());
				if let Some(description) = &e.description {
					en = en.description(description);
				}
				for v in e.values.iter() {
					let mut item = EnumItem::new(v.name.as_str());
					if let Some(description) = &v.description {
						item = item.description(description);
					}
					en = en.item(item);
				}
				builder = builder.register(en);
			}
			TypeSpec::Scalar(s) if BUILTIN_SCALARS.contains(&s.name.as_str()) => {}
			TypeSpec::Scalar(s) => {
				let mut scalar = Scalar::new(s.name.as_str());
				if let Some(description) = &s.description {
					scalar = scalar.description(description);
				}
				builder = builder.register(scalar);
			}
		}
	}
	let schema = builder.limit_depth(*MAX_QUERY_DEPTH).finish().map_err(|e| {
		error!(target: TARGET, "The generated schema is not valid: {}", e.0);
		schema_error(e.0)
	})?;
	Ok(BuiltSchema {
		schema,
		catalog,
		blueprint,
	})
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use async_graphql::{PathSegment, Request, value};
	use async_trait::async_trait;
	use serde_json::json;

	use super::*;
	use crate::build::plugins::testing::build;
	use crate::catalog::fixture::self_referencing;
	use crate::gql::error::GqlError;
	use crate::gql::sql::Statement;

	/// Answers every statement with the same document.
	struct Answering {
		answer: Json,
		seen: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl Session for Answering {
		async fn fetch(&self, statement: &Statement) -> Result<Option<Json>, GqlError> {
			self.seen.lock().unwrap().push(statement.sql.clone());
			Ok(Some(self.answer.clone()))
		}

		fn statements(&self) -> usize {
			self.seen.lock().unwrap().len()
		}
	}

	fn session(answer: Json) -> Arc<Answering> {
		Arc::new(Answering {
			answer,
			seen: Mutex::default(),
		})
	}

	#[test]
	fn every_member_is_in_the_blueprint() {
		let schema = build(self_referencing(), BuildOptions::default());
		let bp = &schema.blueprint;
		assert!(bp.objects.contains("Query"));
		assert!(bp.objects.contains("TsConnection"));
		assert!(bp.field("T", "parentByParentId").is_some());
		assert!(bp.arg("Query", "allTs", "orderBy").is_some());
		assert!(bp.input("TFilter", "and").is_some());
		assert!(bp.enum_value("TsOrderBy", "NATURAL").is_some());
	}

	#[test_log::test(tokio::test)]
	async fn nested_fields_read_the_root_document() {
		let schema = build(self_referencing(), BuildOptions::default());
		let session = session(json!({ "name": "child", "parent": { "name": "root" } }));
		let request = Request::new("{ tById(id: 2) { name parent: parentByParentId { name } } }")
			.data(session.clone() as Arc<dyn Session>);
		let response = schema.schema.execute(request).await;
		assert!(response.errors.is_empty(), "{:?}", response.errors);
		assert_eq!(response.data, value!({ "tById": { "name": "child", "parent": { "name": "root" } } }));
		assert_eq!(session.statements(), 1);
	}

	#[tokio::test]
	async fn the_nested_query_field_reaches_the_root() {
		let schema = build(self_referencing(), BuildOptions::default());
		let session = session(json!({ "totalCount": 3 }));
		let request = Request::new("{ query { query { allTs { totalCount } } } }")
			.data(session.clone() as Arc<dyn Session>);
		let response = schema.schema.execute(request).await;
		assert!(response.errors.is_empty(), "{:?}", response.errors);
		assert_eq!(response.data, value!({ "query": { "query": { "allTs": { "totalCount": 3 } } } }));
	}

	#[test_log::test(tokio::test)]
	async fn failed_root_fields_keep_their_siblings() {
		let schema = build(self_referencing(), BuildOptions::default());
		let session = session(json!({ "totalCount": 3 }));
		let request = Request::new(r#"{ a: allTs(after: "zz") { totalCount } b: allTs { totalCount } }"#)
			.data(session.clone() as Arc<dyn Session>);
		let response = schema.schema.execute(request).await;
		assert_eq!(response.errors.len(), 1);
		assert_eq!(response.errors[0].message, "Invalid cursor");
		assert_eq!(response.errors[0].path, vec![PathSegment::Field("a".to_owned())]);
		assert_eq!(response.data, value!({ "a": null, "b": { "totalCount": 3 } }));
		assert_eq!(session.statements(), 1);
	}

	#[tokio::test]
	async fn requests_without_a_session_fail() {
		let schema = build(self_referencing(), BuildOptions::default());
		let response = schema.schema.execute("{ allTs { totalCount } }").await;
		assert_eq!(response.errors.len(), 1);
	}

	#[test]
	fn sorted_definitions_are_stable() {
		let schema = build(self_referencing(), BuildOptions::default());
		assert_eq!(schema.sorted_sdl(), build(self_referencing(), BuildOptions::default()).sorted_sdl());
		assert!(schema.sdl().contains("scalar Cursor"));
	}
}
