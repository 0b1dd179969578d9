//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing output of the CLI goes through this module so that
//! quiet, debug and JSON modes are handled in one place. Library code logs
//! through `tracing` instead.

pub mod output;
