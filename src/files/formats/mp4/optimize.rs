//! File layout optimization and sample-offset fix-up
//!
//! Editing the top level can move `mdat`, which invalidates every
//! absolute sample offset in the `stco`/`co64` tables under
//! `trak/mdia/minf/stbl`. Optimizing sorts the top level into the
//! canonical order, recomputes each offset against the moved `mdat`
//! start, and widens 32-bit tables to `co64` when the new layout pushes
//! offsets past 2^32.

use byteorder::{BigEndian, ByteOrder as _};

use crate::core::error::{MetaError, MetaResult};
use crate::files::formats::mp4::boxes::{
    box_size, BoxNode, CO64, FTYP, MDAT, MDIA, MINF, MOOV, STBL, STCO, TRAK, UUID,
};
use crate::files::formats::mp4::Mp4File;

/// Canonical top-level ordering: ftyp, moov, uuid, other, mdat.
fn box_order(b: &BoxNode) -> u8 {
    match b.typ {
        FTYP => 0,
        MOOV => 1,
        UUID => 2,
        MDAT => 4,
        _ => 3,
    }
}

/// An stco or co64 table view over a box payload.
struct OffsetTable<'a> {
    wide: bool,
    count: usize,
    entries: &'a [u8],
}

impl<'a> OffsetTable<'a> {
    fn get(&self, i: usize) -> i64 {
        if self.wide {
            BigEndian::read_u64(&self.entries[i * 8..]) as i64
        } else {
            i64::from(BigEndian::read_u32(&self.entries[i * 4..]))
        }
    }
}

/// Reads a valid, non-empty offset table from an stco/co64 box.
/// Layout: version/flags (4), entry count (4), entries.
fn offset_table(b: Option<&BoxNode>) -> Option<OffsetTable<'_>> {
    let b = b?;
    let wide = match b.typ {
        STCO => false,
        CO64 => true,
        _ => return None,
    };
    if b.raw.len() < 8 {
        return None;
    }
    let count = BigEndian::read_u32(&b.raw[4..]) as usize;
    let entry_size = if wide { 8 } else { 4 };
    if count == 0 || 8 + count * entry_size > b.raw.len() {
        return None;
    }
    Some(OffsetTable {
        wide,
        count,
        entries: &b.raw[8..],
    })
}

/// Builds a freshly encoded stco or co64 box for the given offsets.
fn build_offset_table(offsets: &[i64], wide: bool) -> BoxNode {
    let entry_size = if wide { 8 } else { 4 };
    let mut raw = vec![0u8; 8 + offsets.len() * entry_size];
    BigEndian::write_u32(&mut raw[4..], offsets.len() as u32);
    for (i, off) in offsets.iter().enumerate() {
        if wide {
            BigEndian::write_u64(&mut raw[8 + i * 8..], *off as u64);
        } else {
            BigEndian::write_u32(&mut raw[8 + i * 4..], *off as u32);
        }
    }
    BoxNode {
        offset: -1,
        size: box_size(raw.len()),
        typ: if wide { CO64 } else { STCO },
        raw,
        ..BoxNode::default()
    }
}

/// Encoded size of an offset table box holding `n` entries.
fn table_size(n: usize, wide: bool) -> i64 {
    box_size(8 + n * if wide { 8 } else { 4 })
}

impl Mp4File {
    /// Restores the canonical box order and recomputes sample offsets
    /// for the new layout, widening `stco` into `co64` when needed.
    ///
    /// Call after edits that may have changed the file structure.
    pub fn optimize(&mut self) -> MetaResult<()> {
        self.boxes.sort_by_key(box_order);

        let Some(moov_idx) = self.boxes.iter().position(|b| b.typ == MOOV) else {
            // no offsets to adjust
            return Ok(());
        };

        // old mdat start offsets, in stream order
        let oo: Vec<i64> = self
            .boxes
            .iter()
            .filter(|b| b.typ == MDAT)
            .map(|b| b.offset)
            .collect();

        // total size of everything but moov
        let len_x_moov: i64 = self
            .boxes
            .iter()
            .filter(|b| b.typ != MOOV)
            .map(|b| b.size)
            .sum();

        // moov content without its current offset tables, plus the
        // per-track entry counts the new tables must hold
        let (base, counts) = analyse_moov(&self.boxes[moov_idx]);
        let moov_size = |wide: bool| -> i64 {
            8 + base + counts.iter().map(|n| table_size(*n, wide)).sum::<i64>()
        };

        // widen when the 32-bit layout would already run past 2^32
        let use_wide = len_x_moov + moov_size(false) >= 1 << 32;
        let predicted = moov_size(use_wide);
        self.boxes[moov_idx].size = predicted;

        // new mdat start offsets under the predicted layout
        let mut no = Vec::with_capacity(oo.len());
        let mut off = 0i64;
        for b in &self.boxes {
            if b.typ == MDAT {
                no.push(off);
            }
            off += b.size;
        }

        shift_moov_offsets(&mut self.boxes[moov_idx], &oo, &no, use_wide);

        self.boxes[moov_idx].pack_children();
        if self.boxes[moov_idx].size != predicted {
            return Err(MetaError::format("mp4: moov size inconsistency"));
        }

        Ok(())
    }
}

/// Sums moov's child sizes excluding current offset tables, and collects
/// the entry count of every track's table.
fn analyse_moov(moov: &BoxNode) -> (i64, Vec<usize>) {
    let mut base: i64 = moov
        .children
        .as_ref()
        .map(|cs| cs.iter().map(|c| c.size).sum())
        .unwrap_or(0);
    let mut counts = Vec::new();

    let Some(children) = &moov.children else {
        return (base, counts);
    };
    for c in children {
        if c.typ != TRAK {
            continue;
        }
        let Some(stbl) = c.find(&[MDIA, MINF, STBL]) else {
            continue;
        };
        let stco = stbl.find(&[STCO]);
        let co64 = stbl.find(&[CO64]);

        if let Some(t) = offset_table(stco) {
            counts.push(t.count);
            base -= stco.unwrap().size;
            if let Some(c64) = co64 {
                // both present: the duplicate is pruned on rewrite
                base -= c64.size;
            }
        } else if let Some(t) = offset_table(co64) {
            counts.push(t.count);
            base -= co64.unwrap().size;
        }
    }
    (base, counts)
}

/// Rewrites every track's offset table, remapping each offset through
/// the old-to-new mdat start mapping.
fn shift_moov_offsets(moov: &mut BoxNode, oo: &[i64], no: &[i64], wide: bool) {
    if oo.is_empty() {
        return;
    }
    let Some(children) = &mut moov.children else {
        return;
    };

    for c in children {
        if c.typ != TRAK {
            continue;
        }
        let Some(stbl) = c.find_mut(&[MDIA, MINF, STBL]) else {
            continue;
        };

        let offsets: Vec<i64> = {
            let table = offset_table(stbl.find(&[STCO]))
                .or_else(|| offset_table(stbl.find(&[CO64])));
            let Some(t) = table else {
                continue;
            };
            (0..t.count).map(|i| t.get(i)).collect()
        };

        let shifted: Vec<i64> = offsets
            .iter()
            .map(|&off| {
                // locate the mdat the offset points into
                let idx = oo.partition_point(|&start| start <= off);
                if idx == 0 {
                    // offset before the first mdat
                    return off;
                }
                off - oo[idx - 1] + no[idx - 1]
            })
            .collect();

        let stbl_children = stbl.children.as_mut().expect("stbl unpacked");
        stbl_children.retain(|b| b.typ != STCO && b.typ != CO64);
        stbl_children.push(build_offset_table(&shifted, wide));
    }
}
