//! resolve
//!
//! Hierarchical discovery of connection parameters.
//!
//! # Modules
//!
//! - [`locator`] - nearest ancestor holding a config file, memoized
//! - [`parser`] - direct reading of `KEY=VALUE` config files
//! - [`probe`] - `p4 set` output parsing and default promotion
//! - [`calculator`] - per-root resolution and the two filtering passes

pub mod calculator;
pub mod locator;
pub mod parser;
pub mod probe;

pub use calculator::{ConnectionCalculator, MultipleConnections, RootEntry};
pub use locator::ConfigFileLocator;
pub use probe::{EnvironmentProbe, ProbeOutput};
