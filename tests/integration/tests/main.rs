//! End-to-end integration tests.
//!
//! Directory scenarios run against the in-memory directory and account
//! store. The `PostgreSQL` tests use testcontainers for an ephemeral
//! database and are ignored unless a Docker daemon is available.

mod batch_import;
mod common;
mod credential_login;
mod events;
mod postgres_store;
mod windows_login;
