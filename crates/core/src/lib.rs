//! # pgql core
//!
//! This crate is the internal core library of pgql. It reads a Postgres
//! catalog, decorates it with smart tags, builds a GraphQL schema from it and
//! resolves GraphQL operations against the database.
//!
//! <section class="warning">
//! <h3>Unstable!</h3>
//! This crate is <b>pgql internal API</b>. It does not adhere to semver and its API is free to
//! change and break code even between patch versions.
//! </section>

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod build;
pub mod catalog;
pub mod cnf;
pub mod dbs;
pub mod err;
pub mod export;
pub mod gql;
pub mod iam;
pub mod inflect;
pub mod introspect;
pub mod live;
pub mod smart;
