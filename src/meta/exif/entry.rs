//! Image File Directories and their raw tagged entries.
//!
//! A `Dir` is kept sorted by tag number at all times; lookups are binary
//! searches. Entry values are raw bytes in the byte order of the
//! enclosing Exif blob.

use crate::core::error::{MetaError, MetaResult};
use crate::meta::exif::value::{type_size, ByteOrder, Value, TYPE_LONG};

/// A raw directory entry: tag, element type, element count and the value
/// bytes (out-of-line values already dereferenced).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub tag: u16,
    pub typ: u16,
    pub count: u32,
    pub value: Vec<u8>,
}

impl Entry {
    /// Replaces the entry's payload with a typed value.
    pub fn set_value(&mut self, bo: ByteOrder, v: &Value) {
        self.typ = v.type_code();
        self.count = v.count();
        self.value = v.encode(bo);
    }
}

/// An Image File Directory: entries sorted by tag number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dir(pub Vec<Entry>);

impl Dir {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Restores the sort order after direct mutation.
    pub fn sort(&mut self) {
        self.0.sort_by_key(|e| e.tag);
    }

    /// Returns the index of tag `t`, or None.
    pub fn index(&self, t: u16) -> Option<usize> {
        self.0.binary_search_by_key(&t, |e| e.tag).ok()
    }

    /// Returns the entry with tag `t`, or None.
    pub fn tag(&self, t: u16) -> Option<&Entry> {
        self.index(t).map(|i| &self.0[i])
    }

    /// Returns the entry with tag `t`, inserting an empty one in sorted
    /// position if absent.
    pub fn ensure_tag(&mut self, t: u16) -> &mut Entry {
        let i = match self.0.binary_search_by_key(&t, |e| e.tag) {
            Ok(i) => i,
            Err(i) => {
                self.0.insert(
                    i,
                    Entry {
                        tag: t,
                        ..Entry::default()
                    },
                );
                i
            }
        };
        &mut self.0[i]
    }

    /// Removes tag `t` preserving sort order.
    pub fn remove(&mut self, t: u16) {
        if let Some(i) = self.index(t) {
            self.0.remove(i);
        }
    }

    /// Encoded length: entry headers, the optional next-IFD pointer, and
    /// out-of-line value bytes.
    pub fn encoded_len(&self, sub_ifd: bool) -> usize {
        let mut n = 2 + self.0.len() * 12;
        if !sub_ifd {
            n += 4;
        }
        for e in &self.0 {
            if e.value.len() > 4 {
                n += e.value.len();
            }
        }
        n
    }

    /// Encodes the directory into `p` at `offset`, placing out-of-line
    /// values after the entry table. Returns the offset past the
    /// directory's data. When `has_next` the next-IFD pointer is set to
    /// that offset, otherwise it is left zero (sub-IFDs carry none).
    pub fn encode(&self, bo: ByteOrder, p: &mut [u8], offset: usize, sub_ifd: bool, has_next: bool) -> usize {
        let mut dataoffset = offset + 2 + self.0.len() * 12;
        if !sub_ifd {
            dataoffset += 4;
        }

        bo.put_u16(&mut p[offset..], self.0.len() as u16);
        let mut offset = offset + 2;

        for e in &self.0 {
            bo.put_u16(&mut p[offset..], e.tag);
            bo.put_u16(&mut p[offset + 2..], e.typ);
            bo.put_u32(&mut p[offset + 4..], e.count);
            if e.value.len() <= 4 {
                p[offset + 8..offset + 8 + e.value.len()].copy_from_slice(&e.value);
            } else {
                bo.put_u32(&mut p[offset + 8..], dataoffset as u32);
                p[dataoffset..dataoffset + e.value.len()].copy_from_slice(&e.value);
                dataoffset += e.value.len();
            }
            offset += 12;
        }

        if !sub_ifd && has_next {
            bo.put_u32(&mut p[offset..], dataoffset as u32);
        }

        dataoffset
    }
}

/// Decodes the directory at `offset` within the Exif blob `p`.
///
/// Returns the directory and the offset of its next-IFD pointer.
pub fn decode_dir(bo: ByteOrder, p: &[u8], offset: usize) -> MetaResult<(Dir, usize)> {
    if p.len() < offset + 2 {
        return Err(MetaError::format("exif: corrupt IFD"));
    }
    let ntags = bo.u16(&p[offset..]) as usize;
    let mut offset = offset + 2;

    let mut entries = Vec::with_capacity(ntags);
    for _ in 0..ntags {
        if p.len() < offset + 12 {
            return Err(MetaError::format("exif: corrupt IFD tag"));
        }
        let tag = bo.u16(&p[offset..]);
        let typ = bo.u16(&p[offset + 2..]);
        let count = bo.u32(&p[offset + 4..]);
        let valuebits = &p[offset + 8..offset + 12];
        offset += 12;

        let nbytes = type_size(typ, count);
        if nbytes == 0 && count != 0 {
            return Err(MetaError::format("exif: corrupt IFD"));
        }

        // Values that do not fit inline are stored at an offset from the
        // start of the TIFF header (Exif 2.2 §4.6.2).
        let value = if nbytes > 4 {
            let valueoffset = bo.u32(valuebits) as usize;
            if p.len() < valueoffset + nbytes {
                return Err(MetaError::format("exif: corrupt IFD"));
            }
            p[valueoffset..valueoffset + nbytes].to_vec()
        } else {
            valuebits[..nbytes].to_vec()
        };

        entries.push(Entry {
            tag,
            typ,
            count,
            value,
        });
    }

    // Tags should appear sorted according to the TIFF spec, and sorting
    // keeps the binary searches valid for inputs that violate it.
    let mut d = Dir(entries);
    d.sort();

    Ok((d, offset))
}

/// Reads a u32 offset-like field value (a Long of count 1).
pub fn field_offset(bo: ByteOrder, e: Option<&Entry>) -> Option<usize> {
    let e = e?;
    if e.typ != TYPE_LONG || e.count != 1 || e.value.len() != 4 {
        return None;
    }
    Some(bo.u32(&e.value) as usize)
}

/// Writes a u32 offset-like field value in place. Fails when the entry is
/// missing or not a single Long.
pub fn put_field_offset(bo: ByteOrder, e: Option<&mut Entry>, v: usize) -> bool {
    let Some(e) = e else {
        return false;
    };
    if e.typ != TYPE_LONG || e.count != 1 || e.value.len() != 4 {
        return false;
    }
    bo.put_u32(&mut e.value, v as u32);
    true
}
