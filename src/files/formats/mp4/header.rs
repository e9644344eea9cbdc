//! Movie and track header decoding
//!
//! `mvhd` and `tkhd` share a layout convention: a version byte selects
//! whether dates and durations are 32 or 64 bits wide, and dates count
//! seconds since 1904-01-01 UTC. Only the fields metadata needs are
//! decoded; the undecoded tail of `mvhd` is preserved as raw bytes.

use byteorder::{BigEndian, ByteOrder as _};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::core::error::{MetaError, MetaResult};

/// Movie header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mvhd {
    pub version: u8,
    pub flags: [u8; 3],
    /// Creation date, seconds since the 1904 epoch.
    pub date_created: NaiveDateTime,
    pub date_modified: NaiveDateTime,

    /// Time units per second (default 600).
    pub time_unit: u32,
    /// Duration in time units.
    pub duration_units: u64,

    /// Undecoded bytes after the decoded fields.
    pub raw: Vec<u8>,
}

impl Mvhd {
    pub fn decode(p: &[u8]) -> MetaResult<Mvhd> {
        let mut f = BoxFields::new(p);
        let (version, flags) = f.version_flags("MVHD")?;

        let date_created = f.date();
        let date_modified = f.date();
        let time_unit = f.u32();
        let duration_units = f.uint_var();

        if f.short() {
            return Err(MetaError::format("mp4: MVHD too short"));
        }

        Ok(Mvhd {
            version,
            flags,
            date_created,
            date_modified,
            time_unit,
            duration_units,
            raw: f.rest().to_vec(),
        })
    }

    /// Movie duration at the declared time scale.
    pub fn duration(&self) -> Duration {
        if self.time_unit == 0 {
            return Duration::zero();
        }
        Duration::seconds((self.duration_units / u64::from(self.time_unit)) as i64)
    }
}

/// Track header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tkhd {
    pub version: u8,
    pub flags: [u8; 3],
    pub date_created: NaiveDateTime,
    pub date_modified: NaiveDateTime,

    pub track_id: u32,
    /// Duration in time units (see [`Mvhd::time_unit`]).
    pub duration_units: u64,

    /// Fixed-point dimensions; the upper 16 bits are the integer part.
    pub width: u32,
    pub height: u32,
}

impl Tkhd {
    pub fn decode(p: &[u8]) -> MetaResult<Tkhd> {
        let mut f = BoxFields::new(p);
        let (version, flags) = f.version_flags("TKHD")?;

        let date_created = f.date();
        let date_modified = f.date();
        let track_id = f.u32();
        f.skip(8);
        let duration_units = f.uint_var();
        f.skip(48);
        let width = f.u32();
        let height = f.u32();

        if f.short() {
            return Err(MetaError::format("mp4: TKHD too short"));
        }

        Ok(Tkhd {
            version,
            flags,
            date_created,
            date_modified,
            track_id,
            duration_units,
            width,
            height,
        })
    }

    /// Integer frame size in pixels.
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width >> 16, self.height >> 16)
    }
}

/// Seconds-since-1904 epoch used by mp4 dates.
fn mac_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1904, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Cursor over header fields whose widths depend on the version byte.
/// Reads past the end set a flag instead of failing immediately, so the
/// caller checks once after decoding.
struct BoxFields<'a> {
    data: &'a [u8],
    /// Dates and durations are 8 bytes when set, otherwise 4.
    big: bool,
    i: usize,
    is_short: bool,
}

impl<'a> BoxFields<'a> {
    fn new(data: &'a [u8]) -> Self {
        BoxFields {
            data,
            big: false,
            i: 0,
            is_short: false,
        }
    }

    fn version_flags(&mut self, what: &str) -> MetaResult<(u8, [u8; 3])> {
        let b = self.next(4);
        let version = b[0];
        let flags = [b[1], b[2], b[3]];
        if self.is_short {
            return Err(MetaError::format(format!("mp4: {} too short", what)));
        }
        if version > 1 {
            return Err(MetaError::format(format!(
                "mp4: unknown {} version {}",
                what, version
            )));
        }
        self.big = version == 1;
        Ok((version, flags))
    }

    fn next(&mut self, n: usize) -> [u8; 8] {
        let mut out = [0u8; 8];
        let start = self.i;
        self.i += n;
        if self.i <= self.data.len() {
            out[..n].copy_from_slice(&self.data[start..self.i]);
        } else {
            self.is_short = true;
        }
        out
    }

    fn skip(&mut self, n: usize) {
        self.i += n;
        if self.i > self.data.len() {
            self.is_short = true;
        }
    }

    fn short(&self) -> bool {
        self.is_short
    }

    fn rest(&self) -> &'a [u8] {
        if self.is_short || self.i > self.data.len() {
            return &[];
        }
        &self.data[self.i..]
    }

    fn u32(&mut self) -> u32 {
        let b = self.next(4);
        BigEndian::read_u32(&b)
    }

    fn uint_var(&mut self) -> u64 {
        if self.big {
            let b = self.next(8);
            BigEndian::read_u64(&b)
        } else {
            u64::from(self.u32())
        }
    }

    fn date(&mut self) -> NaiveDateTime {
        mac_epoch() + Duration::seconds(self.uint_var() as i64)
    }
}
