//! XMP namespaces and attribute value conversions
//!
//! The unified attributes map onto a fixed set of element names under
//! `rdf:Description` parents. Each entry pairs a qualified name with the
//! value conversion used to read and write its text content.

use crate::core::metadata::{self, AttrValue};
use crate::core::time::MetaTime;
use crate::meta::xmp::document::Name;

/// Built-in XMP namespaces.
pub mod ns {
    /// XMP Basic namespace
    pub const XMP: &str = "http://ns.adobe.com/xap/1.0/";
    /// EXIF namespace
    pub const EXIF: &str = "http://ns.adobe.com/exif/1.0/";
    /// TIFF namespace
    pub const TIFF: &str = "http://ns.adobe.com/tiff/1.0/";
    /// RDF namespace
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    /// x:xmpmeta wrapper namespace
    pub const META: &str = "adobe:ns:meta/";

    /// XMP Basic prefix
    pub const XMP_PREFIX: &str = "xmp";
    /// EXIF prefix
    pub const EXIF_PREFIX: &str = "exif";
    /// TIFF prefix
    pub const TIFF_PREFIX: &str = "tiff";
    /// RDF prefix
    pub const RDF_PREFIX: &str = "rdf";
    /// x:xmpmeta wrapper prefix
    pub const META_PREFIX: &str = "x";
}

/// The recognised prefix for a namespace URI, if any.
pub fn prefix_for(uri: &str) -> Option<&'static str> {
    match uri {
        ns::XMP => Some(ns::XMP_PREFIX),
        ns::EXIF => Some(ns::EXIF_PREFIX),
        ns::TIFF => Some(ns::TIFF_PREFIX),
        ns::RDF => Some(ns::RDF_PREFIX),
        ns::META => Some(ns::META_PREFIX),
        _ => None,
    }
}

/// How an attribute's text content converts to and from [`AttrValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueConv {
    Text,
    Int,
    Time,
    /// Coordinate with its positive and negative direction letters.
    Coord(char, char),
}

/// One entry of the unified-attribute conversion table.
#[derive(Debug, Clone, Copy)]
pub struct AttrConv {
    pub space: &'static str,
    pub local: &'static str,
    pub conv: ValueConv,
}

impl AttrConv {
    pub fn name(&self) -> Name {
        Name::new(self.space, self.local)
    }
}

/// Looks up the conversion entry for a unified attribute name.
pub fn attr_conv(attr: &str) -> Option<AttrConv> {
    let (space, local, conv) = match attr {
        metadata::DATE_TIME_CREATED => (ns::XMP, "CreateDate", ValueConv::Time),
        metadata::RATING => (ns::XMP, "Rating", ValueConv::Int),
        metadata::DATE_TIME_ORIGINAL => (ns::EXIF, "DateTimeOriginal", ValueConv::Time),
        metadata::GPS_LATITUDE => (ns::EXIF, "GPSLatitude", ValueConv::Coord('N', 'S')),
        metadata::GPS_LONGITUDE => (ns::EXIF, "GPSLongitude", ValueConv::Coord('E', 'W')),
        metadata::GPS_DATE_TIME => (ns::EXIF, "GPSTimeStamp", ValueConv::Time),
        metadata::ORIENTATION => (ns::EXIF, "Orientation", ValueConv::Int),
        metadata::MAKE => (ns::TIFF, "Make", ValueConv::Text),
        metadata::MODEL => (ns::TIFF, "Model", ValueConv::Text),
        _ => return None,
    };
    Some(AttrConv { space, local, conv })
}

impl ValueConv {
    /// Parses text content into an attribute value. Failures are a soft
    /// absence, not an error, so partial metadata still round-trips.
    pub fn parse(&self, s: &str) -> Option<AttrValue> {
        match self {
            ValueConv::Text => Some(AttrValue::Text(s.to_string())),
            ValueConv::Int => s.trim().parse::<i32>().ok().map(AttrValue::Int),
            ValueConv::Time => {
                let t = MetaTime::parse(s);
                t.is_valid().then_some(AttrValue::Time(t))
            }
            ValueConv::Coord(pos, neg) => parse_coord(s, *pos, *neg).map(AttrValue::Real),
        }
    }

    /// Formats an attribute value as text content. `None` when the value
    /// kind does not fit the conversion.
    pub fn format(&self, v: &AttrValue) -> Option<String> {
        match self {
            ValueConv::Text => v.as_text().map(|s| s.to_string()),
            ValueConv::Int => v.as_int().map(|i| i.to_string()),
            ValueConv::Time => v.as_time().filter(|t| t.is_valid()).map(|t| t.to_string()),
            ValueConv::Coord(pos, neg) => v.as_real().map(|f| format_coord(f, *pos, *neg)),
        }
    }
}

/// Parses `DEG,MIN.FFFFFF±` style coordinates: comma-separated numeric
/// components, each divided by 60 raised to its position, signed by the
/// trailing direction letter.
fn parse_coord(s: &str, pos: char, neg: char) -> Option<f64> {
    if s.len() < 2 {
        return None;
    }
    let last = s.chars().last()?;
    let sign = if last == pos {
        1.0
    } else if last == neg {
        -1.0
    } else {
        return None;
    };

    let body = &s[..s.len() - last.len_utf8()];
    let mut value = 0.0;
    let mut div = 1.0;
    for part in body.split(',') {
        let num: f64 = part.trim().parse().ok()?;
        value += num / div;
        div *= 60.0;
    }
    Some(sign * value)
}

/// Formats signed decimal degrees as `DEG,MIN.FFFFFF` plus the
/// direction letter.
fn format_coord(f: f64, pos: char, neg: char) -> String {
    let (sign, f) = if f < 0.0 { (neg, -f) } else { (pos, f) };
    let deg = f.trunc();
    let min = 60.0 * f.fract();
    format!("{:.0},{:.6}{}", deg, min, sign)
}
