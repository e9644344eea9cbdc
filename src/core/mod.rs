//! Core model: errors, time precision, and the unified attribute map.

pub mod error;
pub mod metadata;
pub mod time;

pub use error::{MetaError, MetaResult};
pub use metadata::{AttrValue, Metadata};
pub use time::MetaTime;
