//! metakit parses and rewrites metadata in media files.
//!
//! Exif and XMP metadata embedded in JPEG, MP4 and PNG containers are
//! decoded into a unified attribute set; the JPEG and MP4 containers can
//! also be rewritten with updated metadata while every non-metadata byte
//! passes through untouched.
//!
//! # Reading
//!
//! ```no_run
//! use metakit::{parse, DATE_TIME_ORIGINAL};
//!
//! # fn main() -> Result<(), metakit::MetaError> {
//! let file = std::fs::File::open("photo.jpg")?;
//! let parsed = parse(file)?;
//! if let Some(t) = parsed.metadata.get(DATE_TIME_ORIGINAL) {
//!     println!("taken {}", t);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Rewriting
//!
//! Containers expose their rewriters directly: see
//! [`files::formats::jpeg::JpegFormat`] and
//! [`files::formats::mp4::Mp4File`].

pub mod core;
pub mod files;
pub mod meta;

use std::io::{Cursor, Read, Seek, SeekFrom};

pub use crate::core::error::{MetaError, MetaResult};
pub use crate::core::metadata::{
    AttrValue, Metadata, DATE_TIME_CREATED, DATE_TIME_ORIGINAL, GPS_DATE_TIME, GPS_LATITUDE,
    GPS_LONGITUDE, IMAGE_HEIGHT, IMAGE_WIDTH, KNOWN_ATTRS, MAKE, MODEL, ORIENTATION, RATING,
};
pub use crate::core::time::MetaTime;
pub use crate::files::handler::{ParseOptions, RawMeta};
pub use crate::files::registry::{Container, ContainerRegistry};
pub use crate::meta::{new_metadata, MetaCodec, MetadataFormat};

use crate::files::handler::ContainerFormat;
use crate::files::registry::PEEK_LEN;

/// A successful parse: the attributes found, plus the first non-fatal
/// codec error encountered while collecting them.
#[derive(Debug)]
pub struct Parsed {
    pub metadata: Metadata,
    /// First error hit while decoding an individual metadata blob.
    /// Valid attributes from other blobs are still present.
    pub warning: Option<MetaError>,
}

/// Parses metadata from `r` on a best-effort basis.
///
/// The stream head is sniffed against the registered container magics,
/// the matching container scanned, and every recognised attribute
/// projected into the unified map.
///
/// Fails with [`MetaError::UnknownFormat`] when no container matches and
/// [`MetaError::NoMeta`] when the container holds no usable metadata.
pub fn parse<R: Read>(r: R) -> MetaResult<Parsed> {
    parse_with(r, ParseOptions::default())
}

/// Like [`parse`], with options.
pub fn parse_with<R: Read>(mut r: R, opts: ParseOptions) -> MetaResult<Parsed> {
    let mut prefix = vec![0u8; PEEK_LEN];
    let n = read_up_to(&mut r, &mut prefix)?;
    prefix.truncate(n);

    let registry = ContainerRegistry::new();
    let container = registry
        .find_by_prefix(&prefix)
        .ok_or(MetaError::UnknownFormat)?;

    // hand the container the stream from its very first byte
    let outcome = container.scan(Cursor::new(prefix).chain(r))?;

    // container-implicit attributes first, codec values refine them
    let mut metadata = outcome.implicit;
    let mut warning = None;

    for rm in &outcome.meta {
        let Some(mut codec) = new_metadata(rm.name) else {
            continue;
        };
        if let Err(e) = codec.unmarshal(&rm.bytes) {
            if opts.strict {
                return Err(e);
            }
            if warning.is_none() {
                warning = Some(e);
            }
            continue;
        }
        for attr in KNOWN_ATTRS {
            if let Some(v) = codec.get_attr(attr) {
                metadata.update(attr, v);
            }
        }
    }

    if metadata.is_empty() {
        return Err(match warning {
            Some(e) => e,
            None => MetaError::NoMeta,
        });
    }
    Ok(Parsed { metadata, warning })
}

/// Parses metadata from a positional input, rewinding it first.
pub fn parse_at<R: Read + Seek>(mut r: R) -> MetaResult<Parsed> {
    r.seek(SeekFrom::Start(0))?;
    parse(r)
}

/// Merges metadata from multiple sources.
///
/// Later sources win, except for time attributes where the better-ranked
/// value is kept: higher precision first, then zone-known over
/// zone-unknown at hour precision and above.
pub fn merge<I>(sources: I) -> Metadata
where
    I: IntoIterator<Item = Metadata>,
{
    Metadata::merge(sources)
}

fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        let m = r.read(&mut buf[n..])?;
        if m == 0 {
            break;
        }
        n += m;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::formats::jpeg::scanner::write_segment;
    use crate::files::formats::jpeg::{EXIF_PREFIX, XMP_PREFIX};
    use crate::meta::exif::Exif;

    fn jpeg_with_meta(exif: Option<&[u8]>, xmp: Option<&[u8]>) -> Vec<u8> {
        let mut p = vec![0xFF, 0xD8];
        let mut sof = Vec::new();
        write_segment(&mut sof, 0xC0, &[8, 0, 16, 0, 16, 3, 0, 0, 0]).unwrap();
        p.extend(sof);
        if let Some(body) = exif {
            let mut payload = EXIF_PREFIX.to_vec();
            payload.extend_from_slice(body);
            let mut seg = Vec::new();
            write_segment(&mut seg, 0xE1, &payload).unwrap();
            p.extend(seg);
        }
        if let Some(body) = xmp {
            let mut payload = XMP_PREFIX.to_vec();
            payload.extend_from_slice(body);
            let mut seg = Vec::new();
            write_segment(&mut seg, 0xE1, &payload).unwrap();
            p.extend(seg);
        }
        let mut sos = Vec::new();
        write_segment(&mut sos, 0xDA, &[0; 4]).unwrap();
        p.extend(sos);
        p.extend([1, 2, 3, 0xFF, 0xD9]);
        p
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = parse(&b"GIF89a and then some data"[..]).unwrap_err();
        assert!(matches!(err, MetaError::UnknownFormat));
    }

    #[test]
    fn test_parse_no_meta() {
        let input = jpeg_with_meta(None, None);
        let err = parse(&input[..]).unwrap_err();
        assert!(matches!(err, MetaError::NoMeta));
    }

    #[test]
    fn test_parse_jpeg_exif() {
        let mut x = Exif::new(16, 16);
        x.set_attr(MAKE, &AttrValue::Text("Acme".into())).unwrap();
        x.set_attr(
            DATE_TIME_ORIGINAL,
            &AttrValue::Time(MetaTime::parse("1984-02-10T22:48:56.998")),
        )
        .unwrap();
        let blob = x.marshal().unwrap();

        let input = jpeg_with_meta(Some(&blob), None);
        let parsed = parse(&input[..]).unwrap();
        assert!(parsed.warning.is_none());

        assert_eq!(
            parsed.metadata.get(MAKE).and_then(|v| v.as_text()),
            Some("Acme")
        );
        let t = parsed
            .metadata
            .get(DATE_TIME_ORIGINAL)
            .and_then(|v| v.as_time())
            .unwrap();
        assert_eq!(t.prec, 7);
        assert!(t.offset.is_none());
        assert_eq!(
            parsed.metadata.get(IMAGE_WIDTH).and_then(|v| v.as_int()),
            Some(16)
        );
    }

    #[test]
    fn test_parse_bad_codec_is_soft() {
        // an unreadable exif blob beside a valid xmp blob
        let xmp = br#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/">
<xmp:Rating>5</xmp:Rating>
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>"#;
        let input = jpeg_with_meta(Some(b"garbage"), Some(xmp));

        let parsed = parse(&input[..]).unwrap();
        assert!(parsed.warning.is_some());
        assert_eq!(
            parsed.metadata.get(RATING).and_then(|v| v.as_int()),
            Some(5)
        );

        // strict mode surfaces the error instead
        let err = parse_with(&input[..], ParseOptions::default().strict()).unwrap_err();
        assert!(matches!(err, MetaError::Format(_)));
    }

    #[test]
    fn test_parse_at_rewinds() {
        let input = jpeg_with_meta(None, Some(br#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/"><xmp:Rating>3</xmp:Rating></rdf:Description></rdf:RDF>"#));
        let mut cur = std::io::Cursor::new(input);
        cur.set_position(7);
        let parsed = parse_at(&mut cur).unwrap();
        assert_eq!(parsed.metadata.get(RATING).and_then(|v| v.as_int()), Some(3));
    }

    #[test]
    fn test_merge_time_precision() {
        let mut a = Metadata::new();
        a.set(
            DATE_TIME_ORIGINAL,
            AttrValue::Time(MetaTime::parse("2018-07-16T18:32")),
        );
        let mut b = Metadata::new();
        b.set(
            DATE_TIME_ORIGINAL,
            AttrValue::Time(MetaTime::parse("2018-07-16T18:32:55+02:00")),
        );

        let m = merge([a, b]);
        let t = m.get(DATE_TIME_ORIGINAL).and_then(|v| v.as_time()).unwrap();
        assert_eq!(t.to_string(), "2018-07-16T18:32:55+02:00");
    }
}
