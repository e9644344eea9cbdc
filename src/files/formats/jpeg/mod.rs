//! JPEG container driver
//!
//! JPEG metadata storage:
//! - Exif lives in an APP1 segment with prefix `Exif\0\0`
//! - XMP lives in an APP1 segment with prefix
//!   `http://ns.adobe.com/xap/1.0/\0`
//! - Rewrites emit the standard header order: SOI, JFIF, JFXX, Exif,
//!   XMP, then everything else in input order, then the entropy data
//!   untouched

pub mod scanner;

use std::io::{Read, Seek, SeekFrom, Write};

use crate::core::error::MetaResult;
use crate::files::handler::{ContainerFormat, RawMeta, ScanOutcome};
use crate::meta::{FORMAT_EXIF, FORMAT_XMP};
use scanner::{write_segment, Scanner, MARKER_APP0, MARKER_APP1};

/// APP1 payload prefix of Exif metadata.
pub const EXIF_PREFIX: &[u8] = b"Exif\x00\x00";

/// APP1 payload prefix of XMP metadata.
pub const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\x00";

const JFIF_HEADER: &[u8] = b"JFIF\x00";
const JFXX_HEADER: &[u8] = b"JFXX\x00";

/// JPEG container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegFormat;

impl ContainerFormat for JpegFormat {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn sniff(&self, prefix: &[u8]) -> bool {
        prefix.len() >= 3 && prefix[..3] == [0xFF, 0xD8, 0xFF]
    }

    /// Scans for APP1 metadata segments. The first segment of each kind
    /// wins; scanning stops once both kinds have been seen.
    fn scan<R: Read>(&self, r: R) -> MetaResult<ScanOutcome> {
        let mut j = Scanner::new(r)?;

        let mut exif: Option<Vec<u8>> = None;
        let mut xmp: Option<Vec<u8>> = None;

        while (exif.is_none() || xmp.is_none()) && j.next() {
            if !j.is_segment_start() {
                continue;
            }

            let p = j.bytes();
            if p.len() < 4 || p[0] != 0xFF || p[1] != MARKER_APP1 {
                continue;
            }

            let (slot, trim) = if exif.is_none() && p[4..].starts_with(EXIF_PREFIX) {
                (&mut exif, EXIF_PREFIX.len())
            } else if xmp.is_none() && p[4..].starts_with(XMP_PREFIX) {
                (&mut xmp, XMP_PREFIX.len())
            } else {
                continue;
            };

            let seg = j.read_segment()?;
            *slot = Some(seg[4 + trim..].to_vec());
        }

        let mut out = ScanOutcome::default();
        if let Some(bytes) = exif {
            out.meta.push(RawMeta {
                name: FORMAT_EXIF,
                bytes,
            });
        }
        if let Some(bytes) = xmp {
            out.meta.push(RawMeta {
                name: FORMAT_XMP,
                bytes,
            });
        }

        if out.meta.is_empty() {
            if let Some(e) = j.err() {
                return Err(e);
            }
        }
        Ok(out)
    }

    /// Copies `r` to `w` with the supplied metadata segments substituted
    /// in canonical header order.
    fn write_with_meta<R: Read + Seek, W: Write>(
        &self,
        w: &mut W,
        r: &mut R,
        meta: &[RawMeta],
    ) -> MetaResult<()> {
        r.seek(SeekFrom::Start(0))?;
        let mut j = Scanner::new(r)?;

        // supplied blobs get their APP1 prefixes attached up front
        let mut exifdata: Option<Vec<u8>> = None;
        let mut xmpdata: Option<Vec<u8>> = None;
        for rm in meta {
            let (slot, prefix) = match rm.name {
                FORMAT_EXIF => (&mut exifdata, EXIF_PREFIX),
                FORMAT_XMP => (&mut xmpdata, XMP_PREFIX),
                _ => continue,
            };
            let mut p = Vec::with_capacity(prefix.len() + rm.bytes.len());
            p.extend_from_slice(prefix);
            p.extend_from_slice(&rm.bytes);
            *slot = Some(p);
        }

        const HAS_JFIF: u8 = 1;
        const HAS_JFXX: u8 = 2;
        const HAS_EXIF: u8 = 4;
        const HAS_XMP: u8 = 8;
        const HAS_ALL: u8 = HAS_JFIF | HAS_JFXX | HAS_EXIF | HAS_XMP;

        let mut segments: Vec<Vec<u8>> = Vec::new();
        let mut jfif_seg: Option<Vec<u8>> = None;
        let mut jfxx_seg: Option<Vec<u8>> = None;
        let mut mask = 0u8;

        while mask != HAS_ALL && j.next() {
            let seg = j.read_segment()?;

            if jfif_seg.is_none() && is_segment(&seg, MARKER_APP0, JFIF_HEADER) {
                mask |= HAS_JFIF;
                jfif_seg = Some(seg);
            } else if jfxx_seg.is_none() && is_segment(&seg, MARKER_APP0, JFXX_HEADER) {
                mask |= HAS_JFXX;
                jfxx_seg = Some(seg);
            } else if is_segment(&seg, MARKER_APP1, EXIF_PREFIX) {
                // consumed: replaced or re-emitted at its standard slot
                mask |= HAS_EXIF;
                if exifdata.is_none() {
                    exifdata = Some(seg[4..].to_vec());
                }
            } else if is_segment(&seg, MARKER_APP1, XMP_PREFIX) {
                mask |= HAS_XMP;
                if xmpdata.is_none() {
                    xmpdata = Some(seg[4..].to_vec());
                }
            } else {
                segments.push(seg);
            }
        }
        if let Some(e) = j.err() {
            return Err(e);
        }

        // write segments in standard jpeg/jfif header order
        w.write_all(&segments[0])?;
        if let Some(seg) = &jfif_seg {
            w.write_all(seg)?;
        }
        if let Some(seg) = &jfxx_seg {
            w.write_all(seg)?;
        }

        if let Some(data) = &exifdata {
            write_segment(w, MARKER_APP1, data)?;
        }
        if let Some(data) = &xmpdata {
            write_segment(w, MARKER_APP1, data)?;
        }

        // other segments (DQT, DHT, COM, remaining APPn...) keep their
        // input order
        for seg in &segments[1..] {
            w.write_all(seg)?;
        }

        // copy bytes unread so far, such as the actual image data
        std::io::copy(&mut j.into_reader(), w)?;
        Ok(())
    }
}

fn is_segment(seg: &[u8], marker: u8, prefix: &[u8]) -> bool {
    seg.len() >= 4 && seg[0] == 0xFF && seg[1] == marker && seg[4..].starts_with(prefix)
}
