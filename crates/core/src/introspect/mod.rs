//! Reads the Postgres system catalogs into a [`Catalog`].

mod cache;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, IsolationLevel, Row};

pub use self::cache::{read_cache, write_cache};
use crate::catalog::{
	ArgMode, Attribute, Catalog, Class, ClassId, ClassKind, Constraint, ConstraintId,
	ConstraintKind, Extension, ExtensionId, Identity, Index, IndexId, Namespace, NamespaceId,
	PgType, ProcId, Procedure, Tags, TypeId, TypeKind, Volatility,
};
use crate::err::Error;

const TARGET: &str = "pgql::core::introspect";

/// What to read from the catalogs.
#[derive(Clone, Debug)]
pub struct IntrospectionOptions {
	/// The namespaces to expose
	pub schemas: Vec<String>,
	/// Whether classes, types and functions owned by extensions are read
	pub include_extension_resources: bool,
}

impl Default for IntrospectionOptions {
	fn default() -> Self {
		Self {
			schemas: vec!["public".to_owned()],
			include_extension_resources: false,
		}
	}
}

/// Prefixes a catalog query with the namespaces and classes in scope.
///
/// `$1` is the list of namespace names and `$2` whether extension members are kept.
macro_rules! scoped {
	($query:literal) => {
		concat!(
			"with scope as (
				select n.oid from pg_catalog.pg_namespace n where n.nspname = any($1::text[])
			),
			classes as (
				select c.oid from pg_catalog.pg_class c
				where c.relnamespace in (select oid from scope)
				and c.relkind in ('r', 'v', 'm', 'f', 'p', 'c')
				and (
					$2::bool
					or not exists (
						select 1 from pg_catalog.pg_depend d
						where d.classid = 'pg_catalog.pg_class'::regclass
						and d.objid = c.oid and d.deptype = 'e'
					)
					or exists (
						select 1 from pg_catalog.pg_extension e where c.oid = any(e.extconfig)
					)
				)
			)
			",
			$query
		)
	};
}

/// Whether any role the current user is a member of holds a privilege.
macro_rules! any_role {
	($check:literal) => {
		concat!(
			"exists (select 1 from pg_catalog.pg_roles r ",
			"where pg_catalog.pg_has_role(current_user, r.oid, 'member') and ",
			$check,
			")"
		)
	};
}

const NAMESPACES: &str = scoped!(
	"select n.oid as id, n.nspname::text as name,
		pg_catalog.obj_description(n.oid, 'pg_namespace') as comment
	from pg_catalog.pg_namespace n
	where n.oid in (select oid from scope)"
);

const CLASSES: &str = scoped!(
	"select c.oid as id, c.relname::text as name, c.relnamespace as namespace_id,
		c.relkind::text as kind, c.reltype as type_id,
		pg_catalog.obj_description(c.oid, 'pg_class') as comment,
		c.relkind <> 'c' as is_selectable,
		(pg_catalog.pg_relation_is_updatable(c.oid, true) & 8) = 8 as is_insertable,
		(pg_catalog.pg_relation_is_updatable(c.oid, true) & 4) = 4 as is_updatable,
		(pg_catalog.pg_relation_is_updatable(c.oid, true) & 16) = 16 as is_deletable,"
);

const CLASSES_ACL: &str = concat!(
	any_role!("pg_catalog.has_any_column_privilege(r.oid, c.oid, 'SELECT')"),
	" as acl_selectable, ",
	any_role!("pg_catalog.has_any_column_privilege(r.oid, c.oid, 'INSERT')"),
	" as acl_insertable, ",
	any_role!("pg_catalog.has_any_column_privilege(r.oid, c.oid, 'UPDATE')"),
	" as acl_updatable, ",
	any_role!("pg_catalog.has_table_privilege(r.oid, c.oid, 'DELETE')"),
	" as acl_deletable
	from pg_catalog.pg_class c
	where c.oid in (select oid from classes)"
);

const ATTRIBUTES: &str = scoped!(
	"select a.attrelid as class_id, a.attnum as num, a.attname::text as name,
		pg_catalog.col_description(a.attrelid, a.attnum) as comment,
		a.atttypid as type_id, a.atttypmod as type_modifier,
		a.attnotnull as is_not_null, a.atthasdef as has_default,
		a.attidentity::text as identity,"
);

const ATTRIBUTES_ACL: &str = concat!(
	any_role!("pg_catalog.has_column_privilege(r.oid, a.attrelid, a.attnum, 'SELECT')"),
	" as acl_selectable, ",
	any_role!("pg_catalog.has_column_privilege(r.oid, a.attrelid, a.attnum, 'INSERT')"),
	" as acl_insertable, ",
	any_role!("pg_catalog.has_column_privilege(r.oid, a.attrelid, a.attnum, 'UPDATE')"),
	" as acl_updatable
	from pg_catalog.pg_attribute a
	where a.attrelid in (select oid from classes)
	and a.attnum > 0 and not a.attisdropped"
);

const TYPES: &str = scoped!(
	"select t.oid as id, t.typname::text as name, t.typnamespace as namespace_id,
		n.nspname::text as namespace_name,
		t.typtype::text as typtype, t.typcategory::text as category,
		pg_catalog.obj_description(t.oid, 'pg_type') as comment,
		case when t.typrelid in (select oid from classes) then t.typrelid end as class_id,
		case when t.typcategory = 'A' then nullif(t.typelem, 0) end as item_id,
		case when t.typtype = 'd' then nullif(t.typbasetype, 0) end as base_id,
		t.typnotnull as domain_is_not_null,
		t.typdefault is not null as domain_has_default,
		(select rng.rngsubtype from pg_catalog.pg_range rng where rng.rngtypid = t.oid) as range_sub_id,
		array(
			select e.enumlabel::text from pg_catalog.pg_enum e
			where e.enumtypid = t.oid order by e.enumsortorder
		) as enum_variants,
		t.typlen as type_length
	from pg_catalog.pg_type t
	join pg_catalog.pg_namespace n on n.oid = t.typnamespace
	where n.nspname <> 'pg_toast'"
);

const CONSTRAINTS: &str = scoped!(
	"select c.oid as id, c.conname::text as name, c.contype::text as kind,
		c.conrelid as class_id,
		pg_catalog.obj_description(c.oid, 'pg_constraint') as comment,
		coalesce(c.conkey, '{}') as key_attribute_nums,
		nullif(c.confrelid, 0) as foreign_class_id,
		coalesce(c.confkey, '{}') as foreign_key_attribute_nums
	from pg_catalog.pg_constraint c
	where c.conrelid in (select oid from classes)
	and c.contype in ('p', 'u', 'f', 'c', 'x')
	and (c.confrelid = 0 or c.confrelid in (select oid from classes))"
);

const PROCEDURES: &str = scoped!(
	"select p.oid as id, p.proname::text as name, p.pronamespace as namespace_id,
		pg_catalog.obj_description(p.oid, 'pg_proc') as comment,
		p.proisstrict as is_strict, p.proretset as returns_set,
		p.provolatile::text as volatility, p.prorettype as return_type_id,
		coalesce(p.proallargtypes, p.proargtypes::oid[]) as arg_type_ids,
		coalesce(p.proargnames, '{}') as arg_names,
		coalesce(p.proargmodes::text[], '{}') as arg_modes,
		p.pronargdefaults as arg_defaults_num,
		p.procost as cost, l.lanname::text as language,"
);

const PROCEDURES_ACL: &str = concat!(
	any_role!("pg_catalog.has_function_privilege(r.oid, p.oid, 'EXECUTE')"),
	" as acl_executable
	from pg_catalog.pg_proc p
	join pg_catalog.pg_language l on l.oid = p.prolang
	where p.pronamespace in (select oid from scope)
	and p.prokind = 'f'
	and (
		$2::bool
		or not exists (
			select 1 from pg_catalog.pg_depend d
			where d.classid = 'pg_catalog.pg_proc'::regclass
			and d.objid = p.oid and d.deptype = 'e'
		)
	)"
);

const INDEXES: &str = scoped!(
	"select i.indexrelid as id, ic.relname::text as name, i.indrelid as class_id,
		(i.indkey::int2[])[0:i.indnkeyatts - 1] as attribute_nums,
		i.indisunique as is_unique, i.indisprimary as is_primary,
		i.indpred is not null as is_partial,
		array(
			select (o.v & 1) = 0 from unnest((i.indoption::int2[])[0:i.indnkeyatts - 1])
			with ordinality as o(v, n) order by o.n
		) as attribute_properties_asc,
		array(
			select (o.v & 2) = 2 from unnest((i.indoption::int2[])[0:i.indnkeyatts - 1])
			with ordinality as o(v, n) order by o.n
		) as attribute_properties_nulls_first
	from pg_catalog.pg_index i
	join pg_catalog.pg_class ic on ic.oid = i.indexrelid
	where i.indrelid in (select oid from classes)"
);

const EXTENSIONS: &str = scoped!(
	"select e.oid as id, e.extname::text as name,
		case when e.extnamespace in (select oid from scope) then e.extnamespace end as namespace_id,
		e.extrelocatable as relocatable, e.extversion::text as version,
		coalesce(e.extconfig, '{}') as config_class_ids
	from pg_catalog.pg_extension e"
);

fn ids<T: From<u32>>(v: Vec<u32>) -> Vec<T> {
	v.into_iter().map(T::from).collect()
}

fn namespace(row: &Row) -> Result<Namespace, Error> {
	Ok(Namespace {
		id: NamespaceId(row.try_get("id")?),
		name: row.try_get("name")?,
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
	})
}

fn class(row: &Row) -> Result<Class, Error> {
	let kind: String = row.try_get("kind")?;
	Ok(Class {
		id: ClassId(row.try_get("id")?),
		name: row.try_get("name")?,
		namespace_id: NamespaceId(row.try_get("namespace_id")?),
		kind: ClassKind::from_relkind(&kind)?,
		type_id: TypeId(row.try_get("type_id")?),
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
		is_selectable: row.try_get("is_selectable")?,
		is_insertable: row.try_get("is_insertable")?,
		is_updatable: row.try_get("is_updatable")?,
		is_deletable: row.try_get("is_deletable")?,
		acl_selectable: row.try_get("acl_selectable")?,
		acl_insertable: row.try_get("acl_insertable")?,
		acl_updatable: row.try_get("acl_updatable")?,
		acl_deletable: row.try_get("acl_deletable")?,
		is_extension_configuration_table: false,
		primary_key_id: None,
		constraint_ids: vec![],
		foreign_constraint_ids: vec![],
	})
}

fn attribute(row: &Row) -> Result<Attribute, Error> {
	let identity: String = row.try_get("identity")?;
	Ok(Attribute {
		class_id: ClassId(row.try_get("class_id")?),
		num: row.try_get("num")?,
		name: row.try_get("name")?,
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
		type_id: TypeId(row.try_get("type_id")?),
		type_modifier: row.try_get("type_modifier")?,
		is_not_null: row.try_get("is_not_null")?,
		has_default: row.try_get("has_default")?,
		identity: Identity::from_code(&identity),
		acl_selectable: row.try_get("acl_selectable")?,
		acl_insertable: row.try_get("acl_insertable")?,
		acl_updatable: row.try_get("acl_updatable")?,
		is_indexed: false,
		is_unique: false,
	})
}

fn pg_type(row: &Row) -> Result<PgType, Error> {
	let typtype: String = row.try_get("typtype")?;
	let category: String = row.try_get("category")?;
	Ok(PgType {
		id: TypeId(row.try_get("id")?),
		name: row.try_get("name")?,
		namespace_id: NamespaceId(row.try_get("namespace_id")?),
		namespace_name: row.try_get("namespace_name")?,
		kind: TypeKind::from_codes(&typtype, &category)?,
		category,
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
		class_id: row.try_get::<_, Option<u32>>("class_id")?.map(ClassId),
		item_id: row.try_get::<_, Option<u32>>("item_id")?.map(TypeId),
		base_id: row.try_get::<_, Option<u32>>("base_id")?.map(TypeId),
		domain_is_not_null: row.try_get("domain_is_not_null")?,
		domain_has_default: row.try_get("domain_has_default")?,
		range_sub_id: row.try_get::<_, Option<u32>>("range_sub_id")?.map(TypeId),
		enum_variants: row.try_get("enum_variants")?,
		type_length: row.try_get("type_length")?,
	})
}

fn constraint(row: &Row) -> Result<Constraint, Error> {
	let kind: String = row.try_get("kind")?;
	Ok(Constraint {
		id: ConstraintId(row.try_get("id")?),
		name: row.try_get("name")?,
		kind: ConstraintKind::from_code(&kind)?,
		class_id: ClassId(row.try_get("class_id")?),
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
		key_attribute_nums: row.try_get("key_attribute_nums")?,
		foreign_class_id: row.try_get::<_, Option<u32>>("foreign_class_id")?.map(ClassId),
		foreign_key_attribute_nums: row.try_get("foreign_key_attribute_nums")?,
		is_indexed: false,
	})
}

fn procedure(row: &Row) -> Result<Procedure, Error> {
	let volatility: String = row.try_get("volatility")?;
	let modes: Vec<String> = row.try_get("arg_modes")?;
	Ok(Procedure {
		id: ProcId(row.try_get("id")?),
		name: row.try_get("name")?,
		namespace_id: NamespaceId(row.try_get("namespace_id")?),
		comment: row.try_get("comment")?,
		description: None,
		tags: Tags::new(),
		is_strict: row.try_get("is_strict")?,
		returns_set: row.try_get("returns_set")?,
		volatility: Volatility::from_code(&volatility)?,
		return_type_id: TypeId(row.try_get("return_type_id")?),
		arg_type_ids: ids(row.try_get("arg_type_ids")?),
		arg_names: row.try_get("arg_names")?,
		arg_modes: modes.iter().map(|m| ArgMode::from_code(m)).collect::<Result<_, _>>()?,
		arg_defaults_num: row.try_get("arg_defaults_num")?,
		cost: row.try_get("cost")?,
		acl_executable: row.try_get("acl_executable")?,
		language: row.try_get("language")?,
	})
}

fn index(row: &Row) -> Result<Index, Error> {
	Ok(Index {
		id: IndexId(row.try_get("id")?),
		name: row.try_get("name")?,
		class_id: ClassId(row.try_get("class_id")?),
		attribute_nums: row.try_get("attribute_nums")?,
		is_unique: row.try_get("is_unique")?,
		is_primary: row.try_get("is_primary")?,
		is_partial: row.try_get("is_partial")?,
		attribute_properties_asc: row.try_get("attribute_properties_asc")?,
		attribute_properties_nulls_first: row.try_get("attribute_properties_nulls_first")?,
	})
}

fn extension(row: &Row) -> Result<Extension, Error> {
	Ok(Extension {
		id: ExtensionId(row.try_get("id")?),
		name: row.try_get("name")?,
		namespace_id: row.try_get::<_, Option<u32>>("namespace_id")?.map(NamespaceId),
		relocatable: row.try_get("relocatable")?,
		version: row.try_get("version")?,
		config_class_ids: ids(row.try_get("config_class_ids")?),
	})
}

/// Reads the catalog of the configured namespaces in one consistent snapshot.
pub async fn introspect(client: &mut Client, opts: &IntrospectionOptions) -> Result<Catalog, Error> {
	info!(target: TARGET, "Introspecting schemas {}", opts.schemas.join(", "));
	let txn = client
		.build_transaction()
		.isolation_level(IsolationLevel::RepeatableRead)
		.read_only(true)
		.start()
		.await?;
	let schemas = &opts.schemas;
	let params: [&(dyn ToSql + Sync); 2] = [schemas, &opts.include_extension_resources];
	let classes_sql = format!("{CLASSES}{CLASSES_ACL}");
	let attributes_sql = format!("{ATTRIBUTES}{ATTRIBUTES_ACL}");
	let procedures_sql = format!("{PROCEDURES}{PROCEDURES_ACL}");
	macro_rules! load {
		($sql:expr, $map:ident) => {
			txn.query($sql, &params)
				.await?
				.iter()
				.map($map)
				.collect::<Result<Vec<_>, Error>>()?
		};
	}
	let mut catalog = Catalog::default();
	catalog.namespaces = load!(NAMESPACES, namespace);
	catalog.classes = load!(classes_sql.as_str(), class);
	catalog.attributes = load!(attributes_sql.as_str(), attribute);
	catalog.types = load!(TYPES, pg_type);
	catalog.constraints = load!(CONSTRAINTS, constraint);
	catalog.procedures = load!(procedures_sql.as_str(), procedure);
	catalog.indexes = load!(INDEXES, index);
	catalog.extensions = load!(EXTENSIONS, extension);
	txn.commit().await?;
	let missing: Vec<&String> =
		schemas.iter().filter(|s| !catalog.namespaces.iter().any(|n| &n.name == *s)).collect();
	if !missing.is_empty() {
		warn!(target: TARGET, "Schemas not found: {missing:?}");
	}
	debug!(
		target: TARGET,
		"Read {} classes, {} attributes, {} types, {} constraints and {} procedures",
		catalog.classes.len(),
		catalog.attributes.len(),
		catalog.types.len(),
		catalog.constraints.len(),
		catalog.procedures.len()
	);
	catalog.link()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn queries_share_the_scope() {
		for sql in [NAMESPACES, CLASSES, ATTRIBUTES, TYPES, CONSTRAINTS, PROCEDURES, INDEXES, EXTENSIONS]
		{
			assert!(sql.starts_with("with scope as"));
			assert!(sql.contains("$1::text[]"));
			assert!(sql.contains("$2::bool"));
		}
		assert!(CLASSES_ACL.contains("pg_has_role(current_user, r.oid, 'member')"));
	}

	#[test]
	fn default_options() {
		let opts = IntrospectionOptions::default();
		assert_eq!(opts.schemas, vec!["public".to_string()]);
		assert!(!opts.include_extension_resources);
	}
}
