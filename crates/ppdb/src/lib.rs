//! Student admission (PPDB) registration workflow.
//!
//! The [`admissions`] module holds the registration record, the per-year number
//! generator, the status lifecycle, the academic-year fee catalog and the
//! query/report layer, together with in-memory and SQLite stores and an axum
//! router exposing them. [`config`], [`telemetry`] and [`error`] carry the
//! application-level concerns shared with the `ppdb-api` service.

pub mod admissions;
pub mod config;
pub mod error;
pub mod telemetry;
