// SPDX-License-Identifier: MIT OR Apache-2.0
//! NodeView application layer.
//!
//! Ties the graph model and its views into a [`Session`] configured from a
//! [`ViewerConfig`] file. The `nodeview` binary is a thin command line over
//! this crate.

pub mod config;
pub mod session;

pub use config::{ConfigError, ViewerConfig, CONFIG_FORMAT_VERSION};
pub use session::{Session, SessionError};
