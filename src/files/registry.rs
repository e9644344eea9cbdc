//! Container format registry
//!
//! The registry is plain data assembled at construction time: an enum of
//! the supported formats dispatched by match, with prefix sniffing to
//! pick the driver for a byte stream. No process-wide mutable state is
//! involved.

use std::io::{Read, Seek, Write};

use crate::core::error::MetaResult;
use crate::files::handler::{ContainerFormat, RawMeta, ScanOutcome};

#[cfg(feature = "jpeg")]
use crate::files::formats::jpeg::JpegFormat;
#[cfg(feature = "mp4")]
use crate::files::formats::mp4::Mp4Format;
#[cfg(feature = "png")]
use crate::files::formats::png::PngFormat;

/// Bytes peeked from the stream head for format sniffing.
pub const PEEK_LEN: usize = 256;

/// Enum of the supported container formats.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum Container {
    #[cfg(feature = "jpeg")]
    Jpeg(JpegFormat),
    #[cfg(feature = "mp4")]
    Mp4(Mp4Format),
    #[cfg(feature = "png")]
    Png(PngFormat),
}

impl ContainerFormat for Container {
    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "jpeg")]
            Container::Jpeg(f) => f.name(),
            #[cfg(feature = "mp4")]
            Container::Mp4(f) => f.name(),
            #[cfg(feature = "png")]
            Container::Png(f) => f.name(),
        }
    }

    fn sniff(&self, prefix: &[u8]) -> bool {
        match self {
            #[cfg(feature = "jpeg")]
            Container::Jpeg(f) => f.sniff(prefix),
            #[cfg(feature = "mp4")]
            Container::Mp4(f) => f.sniff(prefix),
            #[cfg(feature = "png")]
            Container::Png(f) => f.sniff(prefix),
        }
    }

    fn scan<R: Read>(&self, r: R) -> MetaResult<ScanOutcome> {
        match self {
            #[cfg(feature = "jpeg")]
            Container::Jpeg(f) => f.scan(r),
            #[cfg(feature = "mp4")]
            Container::Mp4(f) => f.scan(r),
            #[cfg(feature = "png")]
            Container::Png(f) => f.scan(r),
        }
    }

    fn write_with_meta<R: Read + Seek, W: Write>(
        &self,
        w: &mut W,
        r: &mut R,
        meta: &[RawMeta],
    ) -> MetaResult<()> {
        match self {
            #[cfg(feature = "jpeg")]
            Container::Jpeg(f) => f.write_with_meta(w, r, meta),
            #[cfg(feature = "mp4")]
            Container::Mp4(f) => f.write_with_meta(w, r, meta),
            #[cfg(feature = "png")]
            Container::Png(f) => f.write_with_meta(w, r, meta),
        }
    }
}

/// Registry of container formats, built by explicit composition.
#[derive(Debug, Clone)]
pub struct ContainerRegistry {
    containers: Vec<Container>,
}

impl ContainerRegistry {
    /// A registry with the built-in formats registered.
    pub fn new() -> Self {
        let mut registry = ContainerRegistry {
            containers: Vec::new(),
        };
        #[cfg(feature = "jpeg")]
        registry.register(Container::Jpeg(JpegFormat));
        #[cfg(feature = "mp4")]
        registry.register(Container::Mp4(Mp4Format));
        #[cfg(feature = "png")]
        registry.register(Container::Png(PngFormat));
        registry
    }

    /// Registers an additional container format.
    pub fn register(&mut self, container: Container) {
        self.containers.push(container);
    }

    /// Finds the container whose magic matches the stream prefix.
    pub fn find_by_prefix(&self, prefix: &[u8]) -> Option<&Container> {
        self.containers.iter().find(|c| c.sniff(prefix))
    }

    /// All registered containers.
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
