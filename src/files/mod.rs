//! Container format support
//!
//! This module provides the container side of the crate: the format
//! trait, the per-format drivers and the sniffing registry.

pub mod formats;
pub mod handler;
pub mod registry;

pub use handler::{ContainerFormat, ParseOptions, RawMeta, ScanOutcome};
pub use registry::{Container, ContainerRegistry};
