//! JPEG segment scanner
//!
//! Walks the marker-prefixed segment structure of a JPEG stream using a
//! rolling buffer, without requiring seek support. Items are either
//! segments (`FF m L_hi L_lo payload`) or padding runs of fill bytes
//! between segments. Scanning stops at start-of-scan; the untouched
//! entropy-coded tail stays available through [`Scanner::into_reader`].
//!
//! Large segments need not be materialized: [`Scanner::next`] yields a
//! long segment in buffer-sized pieces, and [`Scanner::read_segment`]
//! collects the rest of the current segment into one allocation when a
//! caller wants it whole.

use std::io::{Chain, Cursor, Read};

use crate::core::error::{MetaError, MetaResult};

/// Marker byte values the scanner cares about.
pub const MARKER_SOI: u8 = 0xD8;
pub const MARKER_SOS: u8 = 0xDA;
pub const MARKER_APP0: u8 = 0xE0;
pub const MARKER_APP1: u8 = 0xE1;

/// Working buffer size.
const BUF_SIZE: usize = 4096;

/// Bytes needed to recognise APP segments before returning them:
/// JFIF  9 bytes: FF E0 .. .. 'J' 'F' 'I' 'F' 00
/// JFXX  9 bytes: FF E0 .. .. 'J' 'F' 'X' 'X' 00
/// EXIF 10 bytes: FF E1 .. .. 'E' 'x' 'i' 'f' 00 00
const READ_AHEAD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Begin,
    Normal,
    Scan,
}

/// Streaming scanner over JPEG segments.
#[derive(Debug)]
pub struct Scanner<R: Read> {
    rr: R,

    buf: Vec<u8>,
    r: usize,
    w: usize,

    cur: (usize, usize),
    start_segment: bool,
    segment_left: usize,

    state: ScanState,
    eof: bool,
    err: Option<std::io::Error>,

    format_errors: usize,
}

impl<R: Read> Scanner<R> {
    /// Creates a scanner, verifying the start-of-image marker.
    pub fn new(rr: R) -> MetaResult<Scanner<R>> {
        let mut j = Scanner {
            rr,
            buf: vec![0; BUF_SIZE],
            r: 0,
            w: 0,
            cur: (0, 0),
            start_segment: false,
            segment_left: 0,
            state: ScanState::Begin,
            eof: false,
            err: None,
            format_errors: 0,
        };

        let n = read_at_least(&mut j.rr, &mut j.buf, 2)?;
        if j.buf[0] != 0xFF || j.buf[1] != MARKER_SOI {
            return Err(MetaError::format("jpeg: missing start of image marker"));
        }
        j.w = n;
        Ok(j)
    }

    /// Advances to the next item. The current bytes are available from
    /// [`Scanner::bytes`] until the next call.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        match self.state {
            ScanState::Begin => {
                // start of image
                self.cur = (0, 2);
                self.r = 2;
                self.state = ScanState::Normal;
                return true;
            }
            ScanState::Scan => return false,
            ScanState::Normal => {}
        }

        self.cur = (0, 0);
        self.start_segment = false;

        // continue a segment longer than the buffer
        if self.segment_left > 0 {
            let min = self.segment_left.min(self.buf.len());
            match read_at_least(&mut self.rr, &mut self.buf, min) {
                Ok(n) => {
                    self.cur = (0, min);
                    self.r = min;
                    self.w = n;
                    self.segment_left -= min;
                    return true;
                }
                Err(e) => {
                    self.set_err(e);
                    return false;
                }
            }
        }

        // fill the buffer until there is enough data to examine,
        // or the stream ends
        while !self.eof && self.err.is_none() && self.r + READ_AHEAD > self.w {
            if self.r != 0 {
                self.buf.copy_within(self.r..self.w, 0);
                self.w -= self.r;
                self.r = 0;
            }
            match self.rr.read(&mut self.buf[self.w..]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.w += n,
                Err(e) => self.err = Some(e),
            }
        }

        let n = self.w - self.r;
        if n < 4 {
            // no room for useful data left: yield the tail as padding
            self.format_errors += usize::from(n != 0);
            self.cur = (self.r, self.w);
            self.r = 0;
            self.w = 0;
            return self.cur.0 != self.cur.1;
        }

        // find the next marker
        let i = next_marker(&self.buf[self.r..self.w]);
        if i > 0 {
            // no marker in the buffer, or padding before the marker
            self.cur = (self.r, self.r + i);
            self.r += i;
            return true;
        }

        // marker at self.buf[self.r]: 0xff marker sizehi sizelo
        if self.buf[self.r + 1] == MARKER_SOS {
            // start of scan, we're done
            self.state = ScanState::Scan;
            return false;
        }

        match segment_len(&self.buf[self.r..self.w]) {
            None => {
                // invalid segment length: yield marker and size bytes
                // as padding and continue
                self.format_errors += 1;
                self.cur = (self.r, self.r + 4);
                self.r += 4;
                if self.r == self.w {
                    self.r = 0;
                    self.w = 0;
                }
                true
            }
            Some(l) => {
                self.start_segment = true;
                if self.r + l <= self.w {
                    self.cur = (self.r, self.r + l);
                    self.r += l;
                } else {
                    self.cur = (self.r, self.w);
                    self.segment_left = l - (self.w - self.r);
                    self.r = 0;
                    self.w = 0;
                }
                true
            }
        }
    }

    /// Whether the last [`Scanner::next`] found the start of a segment
    /// (as opposed to padding or a continuation piece).
    pub fn is_segment_start(&self) -> bool {
        self.start_segment
    }

    /// The most recent item's bytes. Valid until the next call of
    /// [`Scanner::next`] or [`Scanner::read_segment`].
    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.cur.0..self.cur.1]
    }

    /// Number of bytes currently available from [`Scanner::bytes`].
    pub fn len(&self) -> usize {
        self.cur.1 - self.cur.0
    }

    pub fn is_empty(&self) -> bool {
        self.cur.0 == self.cur.1
    }

    /// Reads the whole current segment into a new allocation: the
    /// buffered piece plus whatever remains unread of it. For a padding
    /// item, returns the padding bytes.
    pub fn read_segment(&mut self) -> MetaResult<Vec<u8>> {
        if let Some(e) = &self.err {
            return Err(MetaError::Io(clone_io_err(e)));
        }

        let mut p = Vec::with_capacity(self.len() + self.segment_left);
        p.extend_from_slice(self.bytes());
        self.cur = (0, 0);

        let want = self.segment_left;
        if want > 0 {
            if want > self.buf.len() {
                // read a large tail directly into the result
                let start = p.len();
                p.resize(start + want, 0);
                if let Err(e) = self.rr.read_exact(&mut p[start..]) {
                    self.set_err(e);
                    return Err(MetaError::Io(clone_io_err(self.err.as_ref().unwrap())));
                }
                self.segment_left = 0;
            } else {
                match read_at_least(&mut self.rr, &mut self.buf, want) {
                    Ok(buffered) => {
                        p.extend_from_slice(&self.buf[..want]);
                        self.r = want;
                        self.w = buffered;
                        self.segment_left = 0;
                    }
                    Err(e) => {
                        self.set_err(e);
                        return Err(MetaError::Io(clone_io_err(self.err.as_ref().unwrap())));
                    }
                }
            }
        }

        Ok(p)
    }

    /// The transport error that terminated scanning, if any.
    pub fn err(&self) -> Option<MetaError> {
        self.err.as_ref().map(|e| MetaError::Io(clone_io_err(e)))
    }

    /// Number of format errors skipped over while scanning.
    pub fn format_errors(&self) -> usize {
        self.format_errors
    }

    /// Consumes the scanner, returning a reader over the bytes not yet
    /// examined: buffered data first, then the underlying stream.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.buf[self.r..self.w].to_vec()).chain(self.rr)
    }

    fn set_err(&mut self, e: std::io::Error) {
        if self.err.is_none() {
            self.err = Some(e);
        }
    }
}

/// Scans for the next marker position in `p`, ignoring fill bytes,
/// stuffed zero bytes and stray restart markers. Returns the marker
/// position, or an index near the end of `p` when none is present.
fn next_marker(p: &[u8]) -> usize {
    // search omitting the last 2 bytes to simplify checking markers
    // with content
    let n = p.len().saturating_sub(2);
    for i in 0..n {
        let (a, b) = (p[i], p[i + 1]);
        if a == 0xFF && b != 0xFF && b != 0x00 {
            if (0xD0..=0xD9).contains(&b) {
                // marker with no content
                // NB: these should not appear here, SOI has been seen
                // already and RST/EOI belong after SOS
                continue;
            }
            return i;
        }
    }
    n
}

/// Returns the full byte length (marker included) of the segment at the
/// start of `p`, or None when the declared length is invalid.
fn segment_len(p: &[u8]) -> Option<usize> {
    if p.len() < 4 {
        return None;
    }
    let l = usize::from(p[2]) << 8 | usize::from(p[3]);
    if l < 2 {
        return None;
    }
    Some(l + 2)
}

/// Writes one segment: marker, recomputed length, payload.
pub fn write_segment<W: std::io::Write>(w: &mut W, marker: u8, payload: &[u8]) -> MetaResult<()> {
    let l = payload.len() + 2;
    if l > 65535 {
        return Err(MetaError::TooLong("jpeg"));
    }

    let head = [0xFF, marker, (l >> 8) as u8, l as u8];
    w.write_all(&head)?;
    w.write_all(payload)?;
    Ok(())
}

/// Reads at least `min` bytes into `buf`, returning how many were read.
fn read_at_least<R: Read>(r: &mut R, buf: &mut [u8], min: usize) -> std::io::Result<usize> {
    let mut n = 0;
    while n < min {
        let m = r.read(&mut buf[n..])?;
        if m == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of JPEG stream",
            ));
        }
        n += m;
    }
    Ok(n)
}

fn clone_io_err(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}
