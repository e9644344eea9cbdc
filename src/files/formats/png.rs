//! PNG container driver (read-only)
//!
//! PNG XMP storage:
//! - XMP lives in an `iTXt` chunk whose keyword is `XML:com.adobe.xmp`
//! - The text may be zlib-compressed (compression flag 1, method 0)
//! - `IHDR` contributes the image dimensions as implicit attributes
//!
//! Rewriting PNG files is not supported; the handler only scans.

use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ByteOrder as _};
use flate2::read::ZlibDecoder;

use crate::core::error::{MetaError, MetaResult};
use crate::core::metadata::{self, AttrValue};
use crate::files::handler::{ContainerFormat, RawMeta, ScanOutcome};
use crate::meta::FORMAT_XMP;

/// PNG file signature.
pub const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// Largest iTXt chunk accepted.
const MAX_CHUNK_SIZE: u32 = 1 << 24;

/// PNG container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngFormat;

impl ContainerFormat for PngFormat {
    fn name(&self) -> &'static str {
        "png"
    }

    fn sniff(&self, prefix: &[u8]) -> bool {
        prefix.len() >= PNG_HEADER.len() && prefix[..PNG_HEADER.len()] == PNG_HEADER
    }

    fn scan<R: Read>(&self, mut r: R) -> MetaResult<ScanOutcome> {
        let mut header = [0u8; 8];
        r.read_exact(&mut header)?;
        if header != PNG_HEADER {
            return Err(MetaError::format("png: missing file header"));
        }

        let mut out = ScanOutcome::default();
        let mut head = [0u8; 8];
        loop {
            if r.read_exact(&mut head).is_err() {
                // stream ended without an iTXt chunk of interest
                return Ok(out);
            }
            let length = BigEndian::read_u32(&head[..4]);
            let typ = &head[4..8];

            match typ {
                b"IHDR" => {
                    if length < 8 {
                        return Err(MetaError::format("png: short IHDR"));
                    }
                    let mut dims = [0u8; 8];
                    r.read_exact(&mut dims)?;
                    out.implicit.set(
                        metadata::IMAGE_WIDTH,
                        AttrValue::Int(BigEndian::read_u32(&dims[..4]) as i32),
                    );
                    out.implicit.set(
                        metadata::IMAGE_HEIGHT,
                        AttrValue::Int(BigEndian::read_u32(&dims[4..]) as i32),
                    );
                    // rest of IHDR plus CRC
                    skip(&mut r, u64::from(length) - 8 + 4)?;
                }
                b"iTXt" => {
                    if length > MAX_CHUNK_SIZE {
                        return Err(MetaError::format("png: iTXt too long"));
                    }
                    let mut chunk = vec![0u8; length as usize];
                    r.read_exact(&mut chunk)?;
                    skip(&mut r, 4)?; // CRC

                    if let Some(xmp) = decode_itxt_xmp(&chunk)? {
                        out.meta.push(RawMeta {
                            name: FORMAT_XMP,
                            bytes: xmp,
                        });
                        return Ok(out);
                    }
                }
                b"IEND" => return Ok(out),
                _ => {
                    skip(&mut r, u64::from(length) + 4)?;
                }
            }
        }
    }

    fn write_with_meta<R: Read + Seek, W: Write>(
        &self,
        _w: &mut W,
        _r: &mut R,
        _meta: &[RawMeta],
    ) -> MetaResult<()> {
        Err(MetaError::Unsupported("png: writing metadata"))
    }
}

fn skip<R: Read>(r: &mut R, n: u64) -> MetaResult<()> {
    let copied = std::io::copy(&mut r.by_ref().take(n), &mut std::io::sink())?;
    if copied != n {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

/// Extracts the XMP text of an iTXt chunk, or None when the chunk
/// carries a different keyword.
fn decode_itxt_xmp(chunk: &[u8]) -> MetaResult<Option<Vec<u8>>> {
    let mut d = ItxtFields { src: chunk, pos: 0 };

    let keyword = d.string()?;
    let compression = d.byte()?;
    let method = d.byte()?;
    let _language_tag = d.string()?;
    let _translated_keyword = d.string()?;

    if keyword != XMP_KEYWORD {
        return Ok(None);
    }

    let text = &chunk[d.pos..];
    match (compression, method) {
        (0, _) => Ok(Some(text.to_vec())),
        (1, 0) => {
            let mut xmp = Vec::new();
            ZlibDecoder::new(text)
                .read_to_end(&mut xmp)
                .map_err(|e| MetaError::format(format!("png: bad iTXt deflate: {}", e)))?;
            Ok(Some(xmp))
        }
        _ => Err(MetaError::format("png: unsupported compression method")),
    }
}

/// Cursor over the NUL-delimited iTXt header fields. Reads past the end
/// of the chunk fail.
struct ItxtFields<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> ItxtFields<'a> {
    fn string(&mut self) -> MetaResult<&'a [u8]> {
        let rest = &self.src[self.pos.min(self.src.len())..];
        let i = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| MetaError::format("png: invalid iTXt header"))?;
        let s = &rest[..i];
        self.pos += i + 1;
        Ok(s)
    }

    fn byte(&mut self) -> MetaResult<u8> {
        if self.pos >= self.src.len() {
            return Err(MetaError::format("png: invalid iTXt header"));
        }
        let b = self.src[self.pos];
        self.pos += 1;
        Ok(b)
    }
}
