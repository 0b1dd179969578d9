//! p4conn - Perforce connection resolution and client execution
//!
//! p4conn decides, for any file in a working tree, which Perforce server
//! connection (port, user, client workspace, password, charset) governs it,
//! and runs the installed `p4` client against that connection with a hard
//! deadline and cooperative cancellation.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`core`] - Parameters, identity types, settings, environment, paths
//! - [`resolve`] - Config file discovery, `p4 set` probing, root filtering
//! - [`exec`] - Subprocess execution, bounded waiting, cancellation
//! - [`connection`] - Connections, registries and the project manager
//! - [`cli`] - Command-line interface layer
//! - [`ui`] - User-facing output
//!
//! # Invariants
//!
//! 1. A file maps to the deepest surviving root that contains it
//! 2. No surviving root is a descendant of another root with the same
//!    config directory or identical effective parameters
//! 3. At most one `Connection` is built per root per resolution
//! 4. Every command yields exactly one terminal outcome, and no child
//!    process outlives the call that spawned it

pub mod cli;
pub mod connection;
pub mod core;
pub mod exec;
pub mod resolve;
pub mod ui;
