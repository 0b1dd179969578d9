//! core
//!
//! Core domain types, settings and path handling for p4conn.
//!
//! # Modules
//!
//! - [`params`] - Resolved connection parameters and the `P4*` key set
//! - [`types`] - Connection identity and state types
//! - [`config`] - Settings schema and loading
//! - [`env`] - Injectable environment variable lookup
//! - [`paths`] - Path normalization, ancestry and settings locations
//!
//! # Design Principles
//!
//! - Parameter identity is explicit: equality covers only the fields that
//!   decide which server and workspace a command talks to
//! - Settings are strict and self-describing
//! - No process-wide mutable state

pub mod config;
pub mod env;
pub mod params;
pub mod paths;
pub mod types;
