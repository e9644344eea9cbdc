//! Unified attribute model
//!
//! Every metadata codec projects what it understands into a small common
//! attribute set. Attribute values are a tagged union over the four value
//! kinds that actually occur, so no downcasting happens on lookups.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::time::MetaTime;

/// Date of the original image (eg. scanned photo).
pub const DATE_TIME_ORIGINAL: &str = "DateTimeOriginal";

/// Original file creation date (eg. time of scan).
pub const DATE_TIME_CREATED: &str = "DateTimeCreated";

/// Date/time of the GPS fix, always UTC.
pub const GPS_DATE_TIME: &str = "GPSDateTime";

/// Latitude in signed decimal degrees, positive north.
pub const GPS_LATITUDE: &str = "GPSLatitude";

/// Longitude in signed decimal degrees, positive east.
pub const GPS_LONGITUDE: &str = "GPSLongitude";

/// Exif orientation, 1..8; 0 means undefined.
pub const ORIENTATION: &str = "Orientation";

/// XMP rating: -1 rejected, 0 unrated, 1..5 user rating.
pub const RATING: &str = "Rating";

/// Recording equipment manufacturer.
pub const MAKE: &str = "Make";

/// Recording equipment model name/number.
pub const MODEL: &str = "Model";

/// Image or video frame width in pixels.
pub const IMAGE_WIDTH: &str = "ImageWidth";

/// Image or video frame height in pixels.
pub const IMAGE_HEIGHT: &str = "ImageHeight";

/// Attributes holding time values, ranked by precision when merging.
pub const TIME_ATTRS: &[&str] = &[DATE_TIME_ORIGINAL, DATE_TIME_CREATED, GPS_DATE_TIME];

/// Every attribute name the unified model recognises.
pub const KNOWN_ATTRS: &[&str] = &[
    DATE_TIME_ORIGINAL,
    DATE_TIME_CREATED,
    GPS_DATE_TIME,
    GPS_LATITUDE,
    GPS_LONGITUDE,
    ORIENTATION,
    RATING,
    MAKE,
    MODEL,
    IMAGE_WIDTH,
    IMAGE_HEIGHT,
];

/// A metadata attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Calendar instant with precision and zone flags.
    Time(MetaTime),
    /// Signed decimal degrees.
    Real(f64),
    /// Small integer (orientation, rating, dimensions).
    Int(i32),
    /// Free-form text (make, model).
    Text(String),
}

impl AttrValue {
    pub fn as_time(&self) -> Option<&MetaTime> {
        match self {
            AttrValue::Time(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttrValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Time(t) => write!(f, "{}", t),
            AttrValue::Real(v) => write!(f, "{}", v),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Metadata records the unified attributes of one media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    attrs: BTreeMap<String, AttrValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata::default()
    }

    /// Returns an attribute value.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Sets an attribute unconditionally.
    pub fn set(&mut self, key: &str, value: AttrValue) {
        self.attrs.insert(key.to_string(), value);
    }

    /// Removes an attribute.
    pub fn remove(&mut self, key: &str) {
        self.attrs.remove(key);
    }

    /// Whether any attribute is present.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Applies the update policy: time attributes only improve, other
    /// attributes are replaced by later sources.
    pub fn update(&mut self, key: &str, value: AttrValue) {
        if TIME_ATTRS.contains(&key) {
            if let AttrValue::Time(incoming) = &value {
                let existing = self.get(key).and_then(|v| v.as_time());
                if let Some(old) = existing {
                    if incoming.score() <= old.score() {
                        return;
                    }
                }
            }
        }
        self.set(key, value);
    }

    /// Merges metadata from multiple sources.
    ///
    /// Later sources replace earlier ones except for time attributes,
    /// which are kept when they rank better: higher precision wins, and
    /// at hour precision or above a zone-bearing value beats a zone-less
    /// one.
    pub fn merge<I>(sources: I) -> Metadata
    where
        I: IntoIterator<Item = Metadata>,
    {
        let mut result = Metadata::new();
        for m in sources {
            for (key, value) in m.attrs {
                result.update(&key, value);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut m = Metadata::new();
        m.set(MAKE, AttrValue::Text("Acme".into()));
        assert_eq!(m.get(MAKE).and_then(|v| v.as_text()), Some("Acme"));
        assert!(m.get(MODEL).is_none());
    }

    #[test]
    fn test_update_replaces_non_time() {
        let mut m = Metadata::new();
        m.update(ORIENTATION, AttrValue::Int(1));
        m.update(ORIENTATION, AttrValue::Int(6));
        assert_eq!(m.get(ORIENTATION).and_then(|v| v.as_int()), Some(6));
    }

    #[test]
    fn test_merge_prefers_better_time() {
        // input A: minute precision, zone unknown
        let mut a = Metadata::new();
        a.set(
            DATE_TIME_ORIGINAL,
            AttrValue::Time(MetaTime::parse("2018-07-16T18:32")),
        );

        // input B: second precision with zone
        let mut b = Metadata::new();
        b.set(
            DATE_TIME_ORIGINAL,
            AttrValue::Time(MetaTime::parse("2018-07-16T18:32:55+02:00")),
        );

        let merged = Metadata::merge([a.clone(), b.clone()]);
        let t = merged.get(DATE_TIME_ORIGINAL).unwrap().as_time().unwrap();
        assert_eq!(t.prec, 6);
        assert!(t.offset.is_some());

        // order independent
        let merged = Metadata::merge([b, a]);
        let t = merged.get(DATE_TIME_ORIGINAL).unwrap().as_time().unwrap();
        assert_eq!(t.prec, 6);
        assert!(t.offset.is_some());
    }

    #[test]
    fn test_merge_non_time_last_wins() {
        let mut a = Metadata::new();
        a.set(MODEL, AttrValue::Text("one".into()));
        let mut b = Metadata::new();
        b.set(MODEL, AttrValue::Text("two".into()));

        let merged = Metadata::merge([a, b]);
        assert_eq!(merged.get(MODEL).and_then(|v| v.as_text()), Some("two"));
    }
}
