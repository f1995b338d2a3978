//! The pgql server: serves the GraphQL schema synthesized from a Postgres
//! catalog over HTTP, and exports it on request.

#[macro_use]
extern crate tracing;

pub mod cli;
mod cnf;
mod dbs;
mod err;
mod gql;
mod iam;
mod net;
mod telemetry;
