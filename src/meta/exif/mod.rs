//! Exif (TIFF-layout) metadata codec
//!
//! An Exif blob is a TIFF header followed by a chain of Image File
//! Directories. The decoded form keeps the top-level `IFD0`/`IFD1` chain
//! plus the three reserved sub-IFDs as named fields; the pointer entries
//! that reach them inside the blob stay in `IFD0` but their values are
//! only meaningful after `encode` lays the directories out again.
//!
//! Exif Storage:
//! - Byte order selector `MM`/`II` + magic 42 + IFD0 pointer
//! - `IFD0` holds the reserved sub-IFD pointer tags 0x8769 (Exif),
//!   0x8825 (GPS) and 0xA005 (Interop)
//! - `IFD1` describes the thumbnail via tags 0x0201/0x0202
//! - In JPEG the blob lives in APP1 and must fit 65 533 bytes

pub mod convert;
pub mod entry;
pub mod tag;
pub mod tags;
pub mod value;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::core::error::{MetaError, MetaResult};
use crate::core::time::MetaTime;
use chrono::FixedOffset;
use entry::{decode_dir, field_offset, put_field_offset, Dir, Entry};
use tag::TagRef;
use value::{ByteOrder, Rational, Value, TYPE_LONG};

/// Exif time tag layout, and its variant with an explicit UTC marker.
pub const TIME_FORMAT: &str = "%Y:%m:%dT%H:%M:%S";
const TIME_FORMAT_Z: &str = "%Y:%m:%dT%H:%M:%SZ";
const DATE_STAMP_FORMAT: &str = "%Y:%m:%d";

/// Largest blob an APP1 segment can carry.
const MAX_ENCODED_LEN: usize = 65533;

const RES_UNIT_INCH: u32 = 2;

/// Decoded Exif structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exif {
    /// TIFF byte order; `None` only on a default-constructed value.
    pub byte_order: Option<ByteOrder>,

    /// Primary image directory.
    pub ifd0: Dir,
    /// Thumbnail directory.
    pub ifd1: Dir,

    /// The three reserved sub-IFDs reached from IFD0.
    pub exif: Dir,
    pub gps: Dir,
    pub interop: Dir,

    /// Raw thumbnail bytes referenced by IFD1.
    pub thumb: Vec<u8>,
}

impl Exif {
    /// Initializes a new big-endian Exif structure for an image with the
    /// provided dimensions, carrying the baseline tags writers expect.
    pub fn new(dx: u32, dy: u32) -> Exif {
        let bo = ByteOrder::Big;
        let mut x = Exif {
            byte_order: Some(bo),
            ..Exif::default()
        };

        x.set(tags::X_RESOLUTION, Value::Rational(Rational::new(&[72, 1])));
        x.set(tags::Y_RESOLUTION, Value::Rational(Rational::new(&[72, 1])));
        x.set(tags::RESOLUTION_UNIT, Value::Long(vec![RES_UNIT_INCH]));

        x.set(tags::EXIF_VERSION, Value::Undef(b"0220".to_vec()));
        x.set(tags::FLASHPIX_VERSION, Value::Undef(b"0100".to_vec()));
        x.set(tags::PIXEL_X_DIMENSION, Value::Long(vec![dx]));
        x.set(tags::PIXEL_Y_DIMENSION, Value::Long(vec![dy]));
        // centered subsampling
        x.set(tags::YCBCR_POSITIONING, Value::Short(vec![1]));
        // sRGB colorspace
        x.set(tags::COLOR_SPACE, Value::Short(vec![1]));
        // YCbCr, therefore not RGB
        x.set(tags::COMPONENTS_CONFIGURATION, Value::Undef(vec![1, 2, 3, 0]));

        x
    }

    /// Decodes the raw Exif data from `p`.
    pub fn decode(p: &[u8]) -> MetaResult<Exif> {
        if p.len() < 8 {
            return Err(MetaError::format("exif: corrupt header"));
        }

        let bo = match (p[0], p[1]) {
            (b'M', b'M') => ByteOrder::Big,
            (b'I', b'I') => ByteOrder::Little,
            _ => return Err(MetaError::format("exif: corrupt header")),
        };

        if bo.u16(&p[2..]) != 42 {
            return Err(MetaError::format("exif: corrupt header"));
        }

        // follow the next-IFD pointer chain from the IFD0 pointer
        let mut dirs = Vec::new();
        let mut offset = 4usize;
        loop {
            if p.len() < offset + 4 {
                return Err(MetaError::format("exif: corrupt IFD"));
            }
            let ptr = bo.u32(&p[offset..]) as usize;
            if ptr == 0 {
                break;
            }
            if p.len() < ptr {
                return Err(MetaError::format("exif: corrupt IFD"));
            }
            let (dir, next) = decode_dir(bo, p, ptr)?;
            dirs.push(dir);
            offset = next;
        }

        let mut iter = dirs.into_iter();
        let mut x = Exif {
            byte_order: Some(bo),
            ifd0: iter.next().unwrap_or_default(),
            ifd1: iter.next().unwrap_or_default(),
            ..Exif::default()
        };

        // populate sub-IFDs from the reserved pointer tags
        for e in &x.ifd0.0 {
            let slot = match e.tag {
                tags::EXIF_IFD_POINTER => &mut x.exif,
                tags::GPS_IFD_POINTER => &mut x.gps,
                tags::INTEROP_IFD_POINTER => &mut x.interop,
                _ => continue,
            };
            if !slot.is_empty() {
                return Err(MetaError::format("exif: duplicate sub-IFD entry"));
            }
            if e.typ != TYPE_LONG {
                return Err(MetaError::format("exif: corrupt IFD tag"));
            }
            let ptr = bo.u32(&e.value) as usize;
            if p.len() < ptr {
                return Err(MetaError::format("exif: corrupt IFD tag"));
            }
            let (dir, _) = decode_dir(bo, p, ptr)?;
            *slot = dir;
        }

        // preserve raw thumb data
        let tofs = field_offset(bo, x.ifd1.tag(tags::THUMB_OFFSET));
        let tlen = field_offset(bo, x.ifd1.tag(tags::THUMB_LENGTH));
        if let (Some(tofs), Some(tlen)) = (tofs, tlen) {
            if tofs + tlen <= p.len() {
                x.thumb = p[tofs..tofs + tlen].to_vec();
            }
        }

        Ok(x)
    }

    /// Encodes the Exif data as a byte blob.
    ///
    /// IFD0 ends up holding pointer entries exactly for the non-empty
    /// sub-IFDs. Fails when the byte order is unset or the result would
    /// not fit a JPEG APP1 segment.
    pub fn encode(&self) -> MetaResult<Vec<u8>> {
        let Some(bo) = self.byte_order else {
            return Err(MetaError::format("exif: corrupt header"));
        };

        let subdirs = [
            (tags::EXIF_IFD_POINTER, &self.exif),
            (tags::GPS_IFD_POINTER, &self.gps),
            (tags::INTEROP_IFD_POINTER, &self.interop),
        ];

        // filter IFD0 so it has pointer entries exactly for the
        // non-empty sub-IFDs
        let mut ifd0 = Dir::default();
        for e in &self.ifd0.0 {
            let empty_sub = subdirs
                .iter()
                .any(|(tag, dir)| e.tag == *tag && dir.is_empty());
            if !empty_sub {
                ifd0.0.push(e.clone());
            }
        }
        for (tag, dir) in &subdirs {
            if !dir.is_empty() && ifd0.index(*tag).is_none() {
                ifd0.0.push(Entry {
                    tag: *tag,
                    typ: TYPE_LONG,
                    count: 1,
                    value: vec![0; 4],
                });
            }
        }
        ifd0.sort();

        // the thumbnail needs IFD1 entries able to hold its position
        let mut ifd1 = self.ifd1.clone();
        let mut thumb: &[u8] = &self.thumb;
        let holds_thumb = !thumb.is_empty()
            && field_offset(bo, ifd1.tag(tags::THUMB_OFFSET)).is_some()
            && field_offset(bo, ifd1.tag(tags::THUMB_LENGTH)).is_some();
        if !holds_thumb {
            ifd1 = Dir::default();
            thumb = &[];
        }

        let mut dirs = vec![ifd0];
        if !ifd1.is_empty() {
            dirs.push(ifd1);
        }

        // lay out: header, IFDs, sub-IFDs, thumbnail
        let mut suboffset = 8usize;
        for d in &dirs {
            suboffset += d.encoded_len(false);
        }

        for (tag, dir) in &subdirs {
            if dir.is_empty() {
                continue;
            }
            let i = dirs[0].index(*tag).expect("pointer entry present");
            bo.put_u32(&mut dirs[0].0[i].value, suboffset as u32);
            suboffset += dir.encoded_len(true);
        }

        if !thumb.is_empty() {
            let at = dirs[1].index(tags::THUMB_OFFSET).unwrap();
            put_field_offset(bo, dirs[1].0.get_mut(at), suboffset);
            let at = dirs[1].index(tags::THUMB_LENGTH).unwrap();
            put_field_offset(bo, dirs[1].0.get_mut(at), thumb.len());
        }
        let total = suboffset + thumb.len();

        let mut p = vec![0u8; total];
        match bo {
            ByteOrder::Big => {
                p[0] = b'M';
                p[1] = b'M';
            }
            ByteOrder::Little => {
                p[0] = b'I';
                p[1] = b'I';
            }
        }
        bo.put_u16(&mut p[2..], 42);
        bo.put_u32(&mut p[4..], 8);

        let mut offset = 8usize;
        let ndirs = dirs.len();
        for (i, d) in dirs.iter().enumerate() {
            offset = d.encode(bo, &mut p, offset, false, i + 1 != ndirs);
        }
        for (_, dir) in &subdirs {
            if !dir.is_empty() {
                offset = dir.encode(bo, &mut p, offset, true, false);
            }
        }
        p[offset..offset + thumb.len()].copy_from_slice(thumb);

        if p.len() > MAX_ENCODED_LEN {
            return Err(MetaError::TooLong("exif"));
        }

        Ok(p)
    }

    fn dir(&self, sel: u32) -> &Dir {
        match sel {
            tags::DIR_EXIF => &self.exif,
            tags::DIR_GPS => &self.gps,
            tags::DIR_INTEROP => &self.interop,
            _ => &self.ifd0,
        }
    }

    fn dir_mut(&mut self, sel: u32) -> &mut Dir {
        match sel {
            tags::DIR_EXIF => &mut self.exif,
            tags::DIR_GPS => &mut self.gps,
            tags::DIR_INTEROP => &mut self.interop,
            _ => &mut self.ifd0,
        }
    }

    /// Returns a typed view of the tag `id`, present or not.
    pub fn tag(&self, id: u32) -> TagRef<'_> {
        let (sel, t) = tags::split(id);
        TagRef::new(
            self.byte_order.unwrap_or(ByteOrder::Big),
            self.dir(sel).tag(t),
        )
    }

    /// Sets tag `id` to `v` in its directory, keeping the directory
    /// sorted.
    pub fn set(&mut self, id: u32, v: Value) {
        let bo = self.byte_order.unwrap_or(ByteOrder::Big);
        let (sel, t) = tags::split(id);
        self.dir_mut(sel).ensure_tag(t).set_value(bo, &v);
    }

    /// Removes tag `id` from its directory.
    pub fn delete(&mut self, id: u32) {
        let (sel, t) = tags::split(id);
        self.dir_mut(sel).remove(t);
    }

    /// Reads the time recorded by a DateTime/SubSecTime tag pair.
    ///
    /// The sub-seconds tag, when present, raises the precision to
    /// subsecond; a trailing `Z` on the primary string marks the value
    /// as UTC, otherwise the zone is unknown.
    pub fn time(&self, dt_id: u32, subsec_id: u32) -> Option<MetaTime> {
        let s = self.tag(dt_id).ascii()?;

        let (mut t, utc) = parse_time_part(&s)?;

        let mut prec = 6;
        if let Some(subs) = self.tag(subsec_id).ascii() {
            let mut nanos: i64 = 0;
            let mut res: i64 = 1_000_000_000;
            for c in subs.bytes() {
                if !c.is_ascii_digit() {
                    break;
                }
                nanos = nanos * 10 + i64::from(c - b'0');
                res /= 10;
                if res == 0 {
                    break;
                }
            }
            t += Duration::nanoseconds(nanos * res);
            prec = 7;
        }

        Some(MetaTime {
            time: t,
            offset: if utc { FixedOffset::east_opt(0) } else { None },
            prec,
        })
    }

    /// Writes a DateTime/SubSecTime tag pair.
    ///
    /// The primary value gets a `Z` suffix only when the time is
    /// explicitly UTC. Sub-seconds are written as a decimal fraction
    /// with trailing zeros trimmed, or removed when the time has none.
    pub fn set_time(&mut self, dt_id: u32, subsec_id: u32, t: &MetaTime) {
        let is_utc = t.offset.map(|o| o.local_minus_utc() == 0).unwrap_or(false);
        let layout = if is_utc { TIME_FORMAT_Z } else { TIME_FORMAT };
        self.set(dt_id, Value::Ascii(t.time.format(layout).to_string()));

        let nano = t.time.nanosecond();
        if nano == 0 {
            self.delete(subsec_id);
            return;
        }
        let mut s = format!("{:09}", nano);
        while s.len() > 1 && s.ends_with('0') {
            s.pop();
        }
        self.set(subsec_id, Value::Ascii(s));
    }

    /// Reports the Exif datetime, checking DateTimeOriginal,
    /// DateTimeDigitized and DateTime in order.
    pub fn date_time(&self) -> Option<MetaTime> {
        self.time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL)
            .or_else(|| self.time(tags::DATE_TIME_DIGITIZED, tags::SUB_SEC_TIME_DIGITIZED))
            .or_else(|| self.time(tags::DATE_TIME, tags::SUB_SEC_TIME))
    }

    /// Sets DateTimeOriginal, DateTimeDigitized and DateTime to `t`.
    pub fn set_date_time(&mut self, t: &MetaTime) {
        self.set_time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL, t);
        self.set_time(tags::DATE_TIME_DIGITIZED, tags::SUB_SEC_TIME_DIGITIZED, t);
        self.set_time(tags::DATE_TIME, tags::SUB_SEC_TIME, t);
    }

    /// Reports the GPS latitude and longitude in signed decimal degrees.
    pub fn lat_long(&self) -> Option<(f64, f64)> {
        let latsig = ref_sign(self.tag(tags::GPS_LATITUDE_REF).ascii()?, "N", "S")?;
        let lonsig = ref_sign(self.tag(tags::GPS_LONGITUDE_REF).ascii()?, "E", "W")?;
        let latabs = self.tag(tags::GPS_LATITUDE).rational().degrees()?;
        let lonabs = self.tag(tags::GPS_LONGITUDE).rational().degrees()?;
        Some((latsig * latabs, lonsig * lonabs))
    }

    /// Sets the GPS latitude and longitude.
    pub fn set_lat_long(&mut self, lat: f64, lon: f64) {
        self.init_gps_version();

        let (latsig, lat) = if lat < 0.0 { ("S", -lat) } else { ("N", lat) };
        self.set(tags::GPS_LATITUDE_REF, Value::Ascii(latsig.into()));

        let (lonsig, lon) = if lon < 0.0 { ("W", -lon) } else { ("E", lon) };
        self.set(tags::GPS_LONGITUDE_REF, Value::Ascii(lonsig.into()));

        self.set(
            tags::GPS_LATITUDE,
            Value::Rational(Rational::from_degrees(lat)),
        );
        self.set(
            tags::GPS_LONGITUDE,
            Value::Rational(Rational::from_degrees(lon)),
        );
    }

    /// Reads the GPS fix time from GPSDateStamp and GPSTimeStamp.
    pub fn gps_date_time(&self) -> Option<MetaTime> {
        let ds = self.tag(tags::GPS_DATE_STAMP).ascii()?;
        let d = NaiveDate::parse_from_str(&ds, DATE_STAMP_FORMAT).ok()?;

        let (hi, lo) = self
            .tag(tags::GPS_TIME_STAMP)
            .rational()
            .sexagesimal(1_000_000_000)?;
        if hi != 0 {
            return None;
        }

        let t = d.and_hms_opt(0, 0, 0)? + Duration::nanoseconds(lo as i64);
        Some(MetaTime {
            time: t,
            offset: FixedOffset::east_opt(0),
            prec: if t.nanosecond() != 0 { 7 } else { 6 },
        })
    }

    /// Writes the GPS fix time. Times with a known zone are converted to
    /// UTC first; the timestamp fraction resolution is one microsecond.
    pub fn set_gps_date_time(&mut self, t: &MetaTime) {
        self.init_gps_version();

        let utc = match t.offset {
            Some(off) => t.time - off,
            None => t.time,
        };

        self.set(
            tags::GPS_DATE_STAMP,
            Value::Ascii(utc.format(DATE_STAMP_FORMAT).to_string()),
        );

        let day_nanos = utc.num_seconds_from_midnight() as u64 * 1_000_000_000
            + utc.nanosecond() as u64;
        self.set(
            tags::GPS_TIME_STAMP,
            Value::Rational(Rational::from_sexagesimal(day_nanos, 1_000_000_000)),
        );
    }

    fn init_gps_version(&mut self) {
        if !self.tag(tags::GPS_VERSION_ID).valid() {
            self.set(tags::GPS_VERSION_ID, Value::Byte(vec![2, 2, 0, 0]));
        }
    }

    /// Compact textual dump of every directory, for tests and debugging.
    pub fn dump(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let dirs = [
            ("IFD0", &self.ifd0),
            ("IFD1", &self.ifd1),
            ("Exif", &self.exif),
            ("GPS", &self.gps),
            ("Interop", &self.interop),
        ];
        for (name, d) in dirs {
            if d.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}:", name);
            for e in &d.0 {
                let _ = write!(out, "  {:04x} {}x{}: [", e.tag, e.count, e.typ);
                for (i, b) in e.value.iter().enumerate() {
                    if i != 0 && i % 4 == 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{:02x}", b);
                }
                out.push_str("]\n");
            }
        }
        if !self.thumb.is_empty() {
            let _ = writeln!(out, "thumb: {} bytes", self.thumb.len());
        }
        out
    }
}

fn parse_time_part(s: &str) -> Option<(NaiveDateTime, bool)> {
    if let Ok(t) = NaiveDateTime::parse_from_str(s, TIME_FORMAT_Z) {
        return Some((t, true));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, TIME_FORMAT) {
        return Some((t, false));
    }
    // tolerate trailing garbage after a well-formed prefix
    let layout_len = "2006:01:02T15:04:05".len();
    if s.len() > layout_len {
        if let Ok(t) = NaiveDateTime::parse_from_str(&s[..layout_len], TIME_FORMAT) {
            return Some((t, false));
        }
    }
    None
}

fn ref_sign(s: String, pos: &str, neg: &str) -> Option<f64> {
    if s == pos {
        Some(1.0)
    } else if s == neg {
        Some(-1.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_bad_header() {
        assert!(Exif::decode(b"XX\x00\x2a\x00\x00\x00\x08").is_err());
        assert!(Exif::decode(b"MM\x00\x29\x00\x00\x00\x08").is_err());
        assert!(Exif::decode(b"MM").is_err());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut x = Exif::new(640, 480);
        x.set(tags::MAKE, Value::Ascii("Acme".into()));
        x.set(tags::MODEL, Value::Ascii("Roadrunner 9000".into()));
        x.set(tags::ORIENTATION, Value::Short(vec![6]));
        x.set_lat_long(51.5125, -0.125);

        let p = x.encode().unwrap();
        let y = Exif::decode(&p).unwrap();

        assert_eq!(y.byte_order, Some(ByteOrder::Big));
        assert_eq!(y.tag(tags::MAKE).ascii().as_deref(), Some("Acme"));
        assert_eq!(y.tag(tags::ORIENTATION).short(), vec![6]);
        assert_eq!(y.exif.len(), x.exif.len());
        assert_eq!(y.gps.len(), x.gps.len());

        // entries compare equal except for the sub-IFD pointer values
        for (a, b) in x.ifd0.0.iter().zip(y.ifd0.0.iter()) {
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.typ, b.typ);
            assert_eq!(a.count, b.count);
            match a.tag {
                tags::EXIF_IFD_POINTER | tags::GPS_IFD_POINTER | tags::INTEROP_IFD_POINTER => {}
                _ => assert_eq!(a.value, b.value, "tag {:04x}", a.tag),
            }
        }
        for (a, b) in x.exif.0.iter().zip(y.exif.0.iter()) {
            assert_eq!(a, b);
        }
        for (a, b) in x.gps.0.iter().zip(y.gps.0.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_gps_scenario() {
        let mut x = Exif::new(8, 8);
        x.set_lat_long(51.5125, -0.125);

        assert_eq!(
            x.tag(tags::GPS_LATITUDE).rational().0,
            vec![51, 1, 30, 1, 4500, 100]
        );
        assert_eq!(x.tag(tags::GPS_LATITUDE_REF).ascii().as_deref(), Some("N"));
        assert_eq!(x.tag(tags::GPS_LONGITUDE_REF).ascii().as_deref(), Some("W"));
        // version tag initialised on first GPS write
        assert_eq!(x.tag(tags::GPS_VERSION_ID).byte(), &[2, 2, 0, 0]);

        let (lat, lon) = x.lat_long().unwrap();
        assert_eq!(lat, 51.5125);
        assert_eq!(lon, -0.125);
    }

    #[test]
    fn test_time_with_subseconds() {
        let mut x = Exif::new(8, 8);
        let t = MetaTime::parse("1984-02-10T22:48:56.998");
        x.set_time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL, &t);

        assert_eq!(
            x.tag(tags::DATE_TIME_ORIGINAL).ascii().as_deref(),
            Some("1984:02:10T22:48:56")
        );
        assert_eq!(
            x.tag(tags::SUB_SEC_TIME_ORIGINAL).ascii().as_deref(),
            Some("998")
        );

        let got = x
            .time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL)
            .unwrap();
        assert_eq!(got.time, t.time);
        assert_eq!(got.prec, 7);
        assert!(got.offset.is_none());
    }

    #[test]
    fn test_time_without_subseconds() {
        let mut x = Exif::new(8, 8);
        let t = MetaTime::parse("2018-03-27T13:24:55");
        x.set_time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL, &t);

        let got = x
            .time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL)
            .unwrap();
        assert_eq!(got.prec, 6);
        assert!(got.offset.is_none());
        assert_eq!(got.time, t.time);
    }

    #[test]
    fn test_time_utc_marker() {
        let mut x = Exif::new(8, 8);
        let t = MetaTime::parse("2018-03-27T13:24:55Z");
        x.set_time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL, &t);

        assert_eq!(
            x.tag(tags::DATE_TIME_ORIGINAL).ascii().as_deref(),
            Some("2018:03:27T13:24:55Z")
        );
        let got = x
            .time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL)
            .unwrap();
        assert_eq!(got.offset.map(|o| o.local_minus_utc()), Some(0));
    }

    #[test]
    fn test_gps_date_time_round_trip() {
        let mut x = Exif::new(8, 8);
        let t = MetaTime::parse("2020-06-01T10:20:30Z");
        x.set_gps_date_time(&t);

        assert_eq!(
            x.tag(tags::GPS_DATE_STAMP).ascii().as_deref(),
            Some("2020:06:01")
        );
        let got = x.gps_date_time().unwrap();
        assert_eq!(got.time, t.time);
        assert_eq!(got.offset.map(|o| o.local_minus_utc()), Some(0));
    }

    #[test]
    fn test_thumb_round_trip() {
        let mut x = Exif::new(8, 8);
        x.thumb = vec![0xAB; 64];
        x.ifd1
            .ensure_tag(tags::THUMB_OFFSET)
            .set_value(ByteOrder::Big, &Value::Long(vec![0]));
        x.ifd1
            .ensure_tag(tags::THUMB_LENGTH)
            .set_value(ByteOrder::Big, &Value::Long(vec![0]));

        let p = x.encode().unwrap();
        let y = Exif::decode(&p).unwrap();
        assert_eq!(y.thumb, x.thumb);
    }

    #[test]
    fn test_thumb_dropped_without_slots() {
        let mut x = Exif::new(8, 8);
        x.thumb = vec![1, 2, 3];

        let p = x.encode().unwrap();
        let y = Exif::decode(&p).unwrap();
        assert!(y.thumb.is_empty());
        assert!(y.ifd1.is_empty());
    }

    #[test]
    fn test_encode_too_long() {
        let mut x = Exif::new(8, 8);
        x.set(tags::MAKE, Value::Undef(vec![0u8; 70_000]));
        assert!(matches!(x.encode(), Err(MetaError::TooLong(_))));
    }

    #[test]
    fn test_empty_subifd_pointer_stripped() {
        let x = Exif::new(8, 8);
        // no GPS data: encode must not emit a GPS pointer entry
        let p = x.encode().unwrap();
        let y = Exif::decode(&p).unwrap();
        assert!(y.ifd0.tag(tags::GPS_IFD_POINTER).is_none());
        assert!(y.ifd0.tag(tags::EXIF_IFD_POINTER).is_some());
    }
}
