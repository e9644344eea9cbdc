//! Metadata codecs and the unified attribute interface over them.

pub mod exif;
pub mod xmp;

use crate::core::error::MetaResult;
use crate::core::metadata::AttrValue;

/// Names the container drivers use to tag metadata blobs.
pub const FORMAT_EXIF: &str = "exif";
pub const FORMAT_XMP: &str = "xmp";

/// A metadata codec: a named encoding that can be unmarshaled from and
/// marshaled to raw bytes, exposing the unified attributes.
pub trait MetadataFormat {
    /// The format name, as used by container drivers.
    fn name(&self) -> &'static str;

    /// Decodes the codec's native bytes.
    fn unmarshal(&mut self, p: &[u8]) -> MetaResult<()>;

    /// Encodes back into the codec's native bytes.
    fn marshal(&self) -> MetaResult<Vec<u8>>;

    /// Reads a unified attribute, if the codec carries it.
    fn get_attr(&self, attr: &str) -> Option<AttrValue>;

    /// Writes a unified attribute. Fails for unknown attributes and for
    /// values of the wrong kind.
    fn set_attr(&mut self, attr: &str, value: &AttrValue) -> MetaResult<()>;

    /// Removes a unified attribute. Fails for unknown attributes.
    fn delete_attr(&mut self, attr: &str) -> MetaResult<()>;
}

/// Enum of the supported metadata codecs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum MetaCodec {
    Exif(exif::Exif),
    Xmp(xmp::Xmp),
}

/// Constructs an empty codec by format name.
pub fn new_metadata(name: &str) -> Option<MetaCodec> {
    match name {
        FORMAT_EXIF => Some(MetaCodec::Exif(exif::Exif::default())),
        FORMAT_XMP => Some(MetaCodec::Xmp(xmp::Xmp::default())),
        _ => None,
    }
}

impl MetadataFormat for MetaCodec {
    fn name(&self) -> &'static str {
        match self {
            MetaCodec::Exif(m) => m.name(),
            MetaCodec::Xmp(m) => m.name(),
        }
    }

    fn unmarshal(&mut self, p: &[u8]) -> MetaResult<()> {
        match self {
            MetaCodec::Exif(m) => m.unmarshal(p),
            MetaCodec::Xmp(m) => m.unmarshal(p),
        }
    }

    fn marshal(&self) -> MetaResult<Vec<u8>> {
        match self {
            MetaCodec::Exif(m) => m.marshal(),
            MetaCodec::Xmp(m) => m.marshal(),
        }
    }

    fn get_attr(&self, attr: &str) -> Option<AttrValue> {
        match self {
            MetaCodec::Exif(m) => m.get_attr(attr),
            MetaCodec::Xmp(m) => m.get_attr(attr),
        }
    }

    fn set_attr(&mut self, attr: &str, value: &AttrValue) -> MetaResult<()> {
        match self {
            MetaCodec::Exif(m) => m.set_attr(attr, value),
            MetaCodec::Xmp(m) => m.set_attr(attr, value),
        }
    }

    fn delete_attr(&mut self, attr: &str) -> MetaResult<()> {
        match self {
            MetaCodec::Exif(m) => m.delete_attr(attr),
            MetaCodec::Xmp(m) => m.delete_attr(attr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata() {
        assert!(matches!(new_metadata("exif"), Some(MetaCodec::Exif(_))));
        assert!(matches!(new_metadata("xmp"), Some(MetaCodec::Xmp(_))));
        assert!(new_metadata("id3").is_none());
    }
}
