//! Container format trait
//!
//! A container format knows how to recognise its byte-stream magic, how
//! to scan out the raw metadata blobs it embeds, and how to rewrite the
//! stream with new blobs substituted. All formats implement this trait
//! to provide a unified interface.

use std::io::{Read, Seek, Write};

use crate::core::error::MetaResult;
use crate::core::metadata::Metadata;

/// One encoded metadata blob tagged with its format name
/// (`"exif"` or `"xmp"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMeta {
    pub name: &'static str,
    pub bytes: Vec<u8>,
}

/// What a container scan produced: the embedded metadata blobs, plus
/// attributes implicit in the container structure itself (MVHD creation
/// date, track frame size, image dimensions).
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub meta: Vec<RawMeta>,
    pub implicit: Metadata,
}

/// Options controlling how [`crate::parse`] treats codec errors.
///
/// Use the builder pattern to configure options.
///
/// # Example
///
/// ```rust
/// use metakit::ParseOptions;
///
/// let opts = ParseOptions::default().strict();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Fail on the first codec error instead of continuing best-effort.
    pub(crate) strict: bool,
}

impl ParseOptions {
    /// Fail on the first metadata codec error.
    ///
    /// By default parsing is best-effort: a blob that fails to decode is
    /// skipped so other codecs can still contribute, and the first error
    /// is reported beside the result.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Trait implemented by every container format.
pub trait ContainerFormat {
    /// The container's registry name (e.g. "jpeg", "mp4").
    fn name(&self) -> &'static str;

    /// Whether the stream prefix matches this container's magic.
    ///
    /// `prefix` holds at least [`crate::files::registry::PEEK_LEN`]
    /// bytes unless the stream itself is shorter.
    fn sniff(&self, prefix: &[u8]) -> bool;

    /// Scans the stream, returning embedded metadata blobs and implicit
    /// container attributes.
    fn scan<R: Read>(&self, r: R) -> MetaResult<ScanOutcome>;

    /// Copies `r` to `w` with the supplied metadata blobs substituted.
    /// The source must be rewindable; rewriting starts from offset 0.
    fn write_with_meta<R: Read + Seek, W: Write>(
        &self,
        w: &mut W,
        r: &mut R,
        meta: &[RawMeta],
    ) -> MetaResult<()>;
}
