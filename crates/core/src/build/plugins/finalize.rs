use std::collections::{HashSet, VecDeque};

use async_graphql::dynamic::TypeRef;

use crate::build::SchemaSpec;
use crate::build::context::BuildContext;
use crate::build::hooks::Hooks;
use crate::build::plugin::Plugin;
use crate::build::registry::{Registry, TypeSpec, named};
use crate::err::Error;
use crate::inflect::validate_name;

/// The scalars every GraphQL schema has.
pub const BUILTIN_SCALARS: [&str; 5] =
	[TypeRef::INT, TypeRef::FLOAT, TypeRef::STRING, TypeRef::BOOLEAN, TypeRef::ID];

/// Drops what cannot be expressed, drops an empty `Mutation`, and validates
/// every generated name.
pub struct SchemaFinalize;

impl Plugin for SchemaFinalize {
	fn name(&self) -> &str {
		"SchemaFinalize"
	}

	fn register(&self, hooks: &mut Hooks) {
		hooks.schema(finalize);
	}
}

fn exists(registry: &Registry, ty: &TypeRef) -> bool {
	let name = named(ty);
	BUILTIN_SCALARS.contains(&name) || registry.contains(name)
}

fn is_required(ty: &TypeRef) -> bool {
	matches!(ty, TypeRef::NonNull(_))
}

/// Removes one round of dangling references, returning whether anything changed.
fn prune(registry: &mut Registry, query: &str) -> bool {
	let mut changed = false;
	for name in registry.names() {
		if name != query && registry.get(&name).is_some_and(TypeSpec::is_empty) {
			debug!(target: crate::build::TARGET, "Removing the empty type {name}");
			registry.remove(&name);
			changed = true;
		}
	}
	let snapshot = registry.clone();
	let mut broken_inputs = Vec::new();
	for spec in registry.iter_mut() {
		match spec {
			TypeSpec::Object(obj) => {
				let before = obj.fields.len();
				obj.fields.retain(|f| {
					exists(&snapshot, &f.ty)
						&& f.args.iter().all(|a| !is_required(&a.ty) || exists(&snapshot, &a.ty))
				});
				changed |= obj.fields.len() != before;
				for field in obj.fields.iter_mut() {
					let before = field.args.len();
					field.args.retain(|a| exists(&snapshot, &a.ty));
					changed |= field.args.len() != before;
				}
			}
			TypeSpec::Input(input) => {
				if input.fields.iter().any(|f| is_required(&f.ty) && !exists(&snapshot, &f.ty)) {
					broken_inputs.push(input.scope.name.clone());
					continue;
				}
				let before = input.fields.len();
				input.fields.retain(|f| exists(&snapshot, &f.ty));
				changed |= input.fields.len() != before;
			}
			TypeSpec::Enum(_) | TypeSpec::Scalar(_) => {}
		}
	}
	for name in broken_inputs {
		debug!(target: crate::build::TARGET, "Removing the input {name} which requires a missing type");
		registry.remove(&name);
		changed = true;
	}
	changed
}

/// The types reachable from the root types.
fn reachable(registry: &Registry, roots: &[&str]) -> HashSet<String> {
	let mut seen: HashSet<String> = HashSet::new();
	let mut queue: VecDeque<String> = roots.iter().map(|r| (*r).to_owned()).collect();
	while let Some(name) = queue.pop_front() {
		if !seen.insert(name.clone()) {
			continue;
		}
		let mut visit = |ty: &TypeRef| {
			let n = named(ty);
			if !seen.contains(n) {
				queue.push_back(n.to_owned());
			}
		};
		match registry.get(&name) {
			Some(TypeSpec::Object(obj)) => {
				for field in obj.fields.iter() {
					visit(&field.ty);
					field.args.iter().for_each(|a| visit(&a.ty));
				}
			}
			Some(TypeSpec::Input(input)) => input.fields.iter().for_each(|f| visit(&f.ty)),
			_ => {}
		}
	}
	seen
}

fn validate(registry: &Registry) -> Result<(), Error> {
	for spec in registry.iter() {
		let ty = spec.name();
		validate_name(ty, "a type")?;
		match spec {
			TypeSpec::Object(obj) => {
				for field in obj.fields.iter() {
					validate_name(&field.name, &format!("a field of {ty}"))?;
					for arg in field.args.iter() {
						validate_name(&arg.name, &format!("an argument of {ty}.{}", field.name))?;
					}
				}
			}
			TypeSpec::Input(input) => {
				for field in input.fields.iter() {
					validate_name(&field.name, &format!("a field of {ty}"))?;
				}
			}
			TypeSpec::Enum(e) => {
				for value in e.values.iter() {
					validate_name(&value.name, &format!("a value of {ty}"))?;
				}
			}
			TypeSpec::Scalar(_) => {}
		}
	}
	Ok(())
}

fn finalize(mut spec: SchemaSpec, _: &BuildContext) -> Result<SchemaSpec, Error> {
	while prune(&mut spec.registry, &spec.query) {}
	if spec.mutation.as_ref().is_some_and(|m| !spec.registry.contains(m)) {
		spec.mutation = None;
	}
	let mut roots = vec![spec.query.as_str()];
	roots.extend(spec.mutation.as_deref());
	let keep = reachable(&spec.registry, &roots);
	for name in spec.registry.names() {
		if !keep.contains(&name) {
			spec.registry.remove(&name);
		}
	}
	validate(&spec.registry)?;
	Ok(spec)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::build::registry::{FieldSpec, InputFieldSpec, InputKind, ObjectKind};
	use crate::build::source::{FieldSource, InputFieldSource};
	use crate::catalog::ClassId;

	fn object(name: &str, fields: &[(&str, TypeRef)]) -> TypeSpec {
		let mut spec = TypeSpec::object(name, ObjectKind::Record(ClassId(1)), None);
		if let TypeSpec::Object(obj) = &mut spec {
			for (n, ty) in fields {
				obj.fields.add(FieldSpec::new(*n, ty.clone(), FieldSource::QueryRoot)).unwrap();
			}
		}
		spec
	}

	#[test]
	fn dangling_references_cascade() {
		let mut registry = Registry::default();
		registry
			.register(object("Query", &[("a", TypeRef::named("A")), ("x", TypeRef::named_nn("Int"))]))
			.unwrap();
		registry.register(object("A", &[("b", TypeRef::named("B"))])).unwrap();
		let mut input = TypeSpec::input("AInput", InputKind::Record(ClassId(1)), None);
		if let TypeSpec::Input(i) = &mut input {
			i.fields
				.add(InputFieldSpec::new("b", TypeRef::named_nn("B"), InputFieldSource::Record))
				.unwrap();
		}
		registry.register(input).unwrap();
		let spec = SchemaSpec {
			query: "Query".into(),
			mutation: Some("Mutation".into()),
			registry,
		};
		let ctx = BuildContext::new(
			std::sync::Arc::new(crate::catalog::Catalog::default()),
			Default::default(),
		);
		let spec = finalize(spec, &ctx).unwrap();
		assert!(spec.mutation.is_none());
		assert!(!spec.registry.contains("A"));
		assert!(!spec.registry.contains("AInput"));
		let TypeSpec::Object(query) = spec.registry.get("Query").unwrap() else {
			panic!("Query is not an object");
		};
		assert!(query.fields.get("a").is_none());
		assert!(query.fields.get("x").is_some());
	}

	#[test]
	fn invalid_names_fail() {
		let mut registry = Registry::default();
		registry.register(object("Query", &[("has-dash", TypeRef::named("Int"))])).unwrap();
		assert!(validate(&registry).is_err());
	}
}
