use anyhow::{Context, bail};
use clap::Args;
use pgql_core::export::export_schema;
use pgql_core::live::SchemaManager;

use super::schema::SchemaOptions;
use crate::dbs::DbsOptions;

#[derive(Args, Debug)]
pub struct ExportCommandArguments {
	#[command(flatten)]
	dbs: DbsOptions,
	#[command(flatten)]
	schema: SchemaOptions,
}

pub async fn init(
	ExportCommandArguments {
		dbs,
		schema,
	}: ExportCommandArguments,
) -> anyhow::Result<()> {
	let mut opts = schema.manager(&dbs)?;
	if opts.export.is_empty() && opts.write_cache.is_none() {
		bail!("Nothing to export, add --export-schema-graphql, --export-schema-json or --write-cache");
	}
	// Export once, after the build, and never watch
	let export = std::mem::take(&mut opts.export);
	opts.watch = false;
	let manager = SchemaManager::new(opts);
	let built = manager.build_once().await.context("The schema build failed")?;
	if export.is_empty() {
		info!("The catalog was written to the cache");
		return Ok(());
	}
	match export_schema(&built, &export).await? {
		true => info!("The schema was exported"),
		false => info!("The exported schema is unchanged"),
	}
	Ok(())
}
