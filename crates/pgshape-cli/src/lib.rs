//! Schema code generator for pgshape.
//!
//! Introspects a live PostgreSQL catalog and emits a static Rust description
//! of every schema object: per-table `Selectable` / `Insertable` /
//! `Updatable` / `Whereable` structs, column and unique-index constants, and
//! enum types with ordered label tuples.

pub mod cli;
pub mod codegen;
pub mod config;
pub mod generate;
pub mod introspect;
pub mod type_mapper;
pub mod write;
