//! # Review Common Library
//!
//! Shared code for the review validator:
//! - Warehouse clients (Databricks SQL statements, SQLite)
//! - Vector similarity client
//! - Review data model and row-grouping converter
//! - Evaluation upsert builder, schema and statement builders
//! - Configuration loading

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod models;
pub mod time;
pub mod upsert;
pub mod vector;
pub mod warehouse;

pub use error::{Error, Result};
