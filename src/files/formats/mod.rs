//! Per-format container drivers.

#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "mp4")]
pub mod mp4;
#[cfg(feature = "png")]
pub mod png;
