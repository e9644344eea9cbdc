//! Calendar instants with component precision
//!
//! Metadata formats record times with varying fidelity: MVHD stores
//! seconds since 1904 with no zone, Exif uses a fixed text layout that is
//! normally zone-less, and XMP may truncate components from the end of an
//! RFC 3339 style string. `MetaTime` keeps the parsed calendar value
//! together with how many components were actually present and whether a
//! zone was given, so later sources can be ranked against earlier ones.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};

/// Number of components a fully specified time carries
/// (year, month, day, hour, minute, second, subsecond).
pub const PREC_SUBSEC: u8 = 7;

/// A calendar instant plus parse fidelity.
///
/// `prec` records the number of leading components present in the parsed
/// representation, between 1 (year) and 7 (subsecond). A `MetaTime` with
/// `prec == 0` is invalid. `offset` is `Some` only when the parsed value
/// included a zone; zone-less values keep their calendar and clock fields
/// as written and are interpreted in the host's local zone when an
/// absolute instant is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaTime {
    /// Calendar and clock value as written.
    pub time: NaiveDateTime,
    /// Zone offset, when the source representation carried one.
    pub offset: Option<FixedOffset>,
    /// Number of valid components, 1 (year) ..= 7 (subsecond).
    pub prec: u8,
}

impl MetaTime {
    /// An invalid time (prec 0).
    pub fn invalid() -> Self {
        MetaTime {
            time: NaiveDateTime::default(),
            offset: None,
            prec: 0,
        }
    }

    /// Whether this time has at least one valid component.
    pub fn is_valid(&self) -> bool {
        self.prec > 0
    }

    /// A fully precise UTC instant.
    pub fn from_utc(time: NaiveDateTime) -> Self {
        MetaTime {
            time,
            offset: Some(FixedOffset::east_opt(0).unwrap()),
            prec: PREC_SUBSEC,
        }
    }

    /// Build from an absolute instant, keeping its offset.
    pub fn from_datetime(dt: DateTime<FixedOffset>, prec: u8) -> Self {
        MetaTime {
            time: dt.naive_local(),
            offset: Some(*dt.offset()),
            prec,
        }
    }

    /// Parse a time string based on the RFC 3339 format, possibly
    /// truncated and with or without a zone.
    ///
    /// Returns an invalid `MetaTime` when not even a year is present.
    pub fn parse(s: &str) -> MetaTime {
        let mut p = TimeParser::new(s);

        let year = p.val(b":-");
        let month = p.xval(b":-");
        let day = p.xval(b"tT");

        if p.prec == 0 {
            return MetaTime::invalid();
        }

        let hour = p.val(b":");
        let min = p.val(b":");
        let sec = p.val(b".");

        let mut nsec: u32 = 0;
        if let Some((mut num, mut denom)) = p.frac() {
            while denom < 1_000_000_000 {
                num *= 10;
                denom *= 10;
            }
            nsec = num as u32;
        }

        let offset = p.zone();

        let date = NaiveDate::from_ymd_opt(year as i32, month.clamp(1, 12), day.clamp(1, 31));
        let Some(date) = date else {
            return MetaTime::invalid();
        };
        let Some(time) = date.and_hms_nano_opt(
            (hour as u32).min(23),
            (min as u32).min(59),
            (sec as u32).min(59),
            nsec,
        ) else {
            return MetaTime::invalid();
        };

        MetaTime {
            time,
            offset,
            prec: p.prec,
        }
    }

    /// Return self with the zone set to `offset`.
    ///
    /// If the zone was already known the instant is preserved and the
    /// calendar value converted. If it was unknown, the calendar and
    /// clock values are preserved and the zone merely attached.
    pub fn with_offset(&self, offset: FixedOffset) -> MetaTime {
        let time = match self.offset {
            Some(old) => {
                let utc = self.time - old;
                utc + offset
            }
            None => self.time,
        };
        MetaTime {
            time,
            offset: Some(offset),
            prec: self.prec,
        }
    }

    /// Ranking used by the merge policy: precision, with a bonus of 2 for
    /// zone-bearing values of at least hour precision.
    pub fn score(&self) -> u8 {
        let mut s = self.prec;
        if self.prec > 3 && self.offset.is_some() {
            s += 2;
        }
        s
    }
}

impl std::fmt::Display for MetaTime {
    /// Formats using the layout understood by [`MetaTime::parse`],
    /// truncated to the recorded precision.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prec == 0 {
            return Ok(());
        }
        let t = &self.time;
        write!(f, "{:04}", t.year())?;
        if self.prec >= 2 {
            write!(f, "-{:02}", t.month())?;
        }
        if self.prec >= 3 {
            write!(f, "-{:02}", t.day())?;
        }
        if self.prec >= 4 {
            write!(f, "T{:02}", t.hour())?;
        }
        if self.prec >= 5 {
            write!(f, ":{:02}", t.minute())?;
        }
        if self.prec >= 6 {
            write!(f, ":{:02}", t.second())?;
        }
        if self.prec >= 7 {
            // keep at least one fraction digit so the precision survives
            // a round trip even for whole seconds
            let ns = t.nanosecond();
            if ns == 0 {
                write!(f, ".0")?;
            } else {
                let mut s = format!("{:09}", ns);
                while s.len() > 1 && s.ends_with('0') {
                    s.pop();
                }
                write!(f, ".{}", s)?;
            }
        }
        if let Some(off) = self.offset {
            let secs = off.local_minus_utc();
            if secs == 0 {
                write!(f, "Z")?;
            } else {
                let (sign, secs) = if secs < 0 { ('-', -secs) } else { ('+', secs) };
                write!(f, "{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)?;
            }
        }
        Ok(())
    }
}

struct TimeParser<'a> {
    p: &'a [u8],
    r: usize,
    prec: u8,
    done: bool,
}

impl<'a> TimeParser<'a> {
    fn new(s: &'a str) -> Self {
        TimeParser {
            p: s.as_bytes(),
            r: 0,
            prec: 0,
            done: false,
        }
    }

    fn val(&mut self, sep: &[u8]) -> u64 {
        self.rat(sep).map(|(n, _)| n).unwrap_or(0)
    }

    /// Like `val` but yields 1 for a missing component, so that
    /// truncated dates land on the first of the month or year.
    fn xval(&mut self, sep: &[u8]) -> u32 {
        self.rat(sep).map(|(n, _)| n as u32).unwrap_or(1)
    }

    fn rat(&mut self, sep: &[u8]) -> Option<(u64, u64)> {
        if self.done {
            return None;
        }
        let start = self.r;
        let mut num: u64 = 0;
        let mut denom: u64 = 1;
        while self.r < self.p.len() {
            let c = self.p[self.r];
            if c.is_ascii_digit() {
                if denom < 1_000_000_000 {
                    num = num * 10 + u64::from(c - b'0');
                    denom *= 10;
                }
                self.r += 1;
            } else {
                break;
            }
        }
        if start == self.r {
            self.done = true;
            return None;
        }
        self.prec += 1;
        if !sep.is_empty() {
            self.sep(sep);
        }
        Some((num, denom))
    }

    /// Fraction digits after the seconds separator, if any.
    fn frac(&mut self) -> Option<(u64, u64)> {
        self.rat(b"")
    }

    fn sep(&mut self, chars: &[u8]) {
        if self.done {
            return;
        }
        if self.r < self.p.len() && chars.contains(&self.p[self.r]) {
            self.r += 1;
            return;
        }
        self.done = true;
    }

    /// Parse the zone suffix: `Z`, `±hh`, `±hh:mm`, `±hhmm`,
    /// `±hh:mm:ss` or `±hhmmss`.
    fn zone(&mut self) -> Option<FixedOffset> {
        let rest = &self.p[self.r.min(self.p.len())..];
        if rest.is_empty() {
            return None;
        }

        let (sign, digits) = match rest[0] {
            b'Z' | b'z' => {
                if rest.len() == 1 {
                    return FixedOffset::east_opt(0);
                }
                (1i32, &rest[1..])
            }
            b'+' => (1i32, &rest[1..]),
            b'-' => (-1i32, &rest[1..]),
            _ => return None,
        };

        let mut nums = [0u32; 3];
        let mut n = 0;
        let mut i = 0;
        while n < 3 {
            if digits.len() < i + 2
                || !digits[i].is_ascii_digit()
                || !digits[i + 1].is_ascii_digit()
            {
                break;
            }
            nums[n] = u32::from(digits[i] - b'0') * 10 + u32::from(digits[i + 1] - b'0');
            n += 1;
            i += 2;
            if i < digits.len() && digits[i] == b':' {
                i += 1;
            }
        }
        if n == 0 || i != digits.len() {
            // can't parse zone
            return None;
        }

        let secs = (nums[0] * 3600 + nums[1] * 60 + nums[2]) as i32;
        FixedOffset::east_opt(sign * secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(t: &MetaTime) -> (i32, u32, u32, u32, u32, u32, u32) {
        (
            t.time.year(),
            t.time.month(),
            t.time.day(),
            t.time.hour(),
            t.time.minute(),
            t.time.second(),
            t.time.nanosecond(),
        )
    }

    #[test]
    fn test_parse_full() {
        let t = MetaTime::parse("2018-07-16T18:32:55+02:00");
        assert_eq!(t.prec, 6);
        assert!(t.offset.is_some());
        assert_eq!(parts(&t), (2018, 7, 16, 18, 32, 55, 0));
        assert_eq!(t.offset.unwrap().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_parse_truncated() {
        let t = MetaTime::parse("2018-07");
        assert_eq!(t.prec, 2);
        assert!(t.offset.is_none());
        assert_eq!(parts(&t).0, 2018);
        assert_eq!(parts(&t).1, 7);
        assert_eq!(parts(&t).2, 1);

        let t = MetaTime::parse("2018-07-16T18:32");
        assert_eq!(t.prec, 5);
        assert!(t.offset.is_none());
    }

    #[test]
    fn test_parse_subsecond() {
        let t = MetaTime::parse("1984-02-10T22:48:56.998");
        assert_eq!(t.prec, 7);
        assert!(t.offset.is_none());
        assert_eq!(parts(&t), (1984, 2, 10, 22, 48, 56, 998_000_000));
    }

    #[test]
    fn test_parse_zulu() {
        let t = MetaTime::parse("2020-01-02T03:04:05Z");
        assert_eq!(t.prec, 6);
        assert_eq!(t.offset.unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(!MetaTime::parse("").is_valid());
        assert!(!MetaTime::parse("next tuesday").is_valid());
    }

    #[test]
    fn test_display_round_trip() {
        for s in [
            "2018",
            "2018-07",
            "2018-07-16",
            "2018-07-16T18",
            "2018-07-16T18:32",
            "2018-07-16T18:32:55",
            "2018-07-16T18:32:55+02:00",
            "2018-07-16T18:32:55Z",
            "1984-02-10T22:48:56.998",
        ] {
            let t = MetaTime::parse(s);
            assert_eq!(t.to_string(), s, "round trip of {:?}", s);
        }
    }

    #[test]
    fn test_display_whole_second_subsec() {
        // precision 7 with zero nanoseconds keeps a fraction digit
        let t = MetaTime::parse("2018-07-16T18:32:55.0");
        assert_eq!(t.prec, 7);
        assert_eq!(t.to_string(), "2018-07-16T18:32:55.0");
    }

    #[test]
    fn test_with_offset_zone_unknown() {
        let t = MetaTime::parse("2018-07-16T18:32:55");
        let off = FixedOffset::east_opt(3600).unwrap();
        let u = t.with_offset(off);
        // clock values preserved, zone attached
        assert_eq!(parts(&u), parts(&t));
        assert_eq!(u.offset, Some(off));
    }

    #[test]
    fn test_with_offset_zone_known() {
        let t = MetaTime::parse("2018-07-16T18:32:55+02:00");
        let u = t.with_offset(FixedOffset::east_opt(0).unwrap());
        assert_eq!(u.time.hour(), 16);
        assert_eq!(u.time.minute(), 32);
    }

    #[test]
    fn test_score() {
        let a = MetaTime::parse("2018-07-16T18:32");
        let b = MetaTime::parse("2018-07-16T18:32:55+02:00");
        assert!(b.score() > a.score());

        // zone bonus does not apply below hour precision
        let c = MetaTime::parse("2018-07-16");
        let mut d = c;
        d.offset = FixedOffset::east_opt(0);
        assert_eq!(c.score(), d.score());
    }
}
