//! MP4 / ISO base media container driver
//!
//! MP4 XMP storage:
//! - XMP lives in a top-level `uuid` box whose payload starts with the
//!   16-byte XMP UUID BE7ACFCB-97A9-42E8-9C71-999491E3AFAC
//! - The container itself contributes a creation date (`moov/mvhd`) and
//!   the frame size of the largest track (`trak/tkhd`)
//!
//! Editing keeps the file playable: [`Mp4File::add_uuid`] reuses free
//! space where it can, and [`Mp4File::optimize`] re-sorts the top level
//! and rewrites the sample offset tables for the moved `mdat`.

pub mod boxes;
pub mod header;
pub mod optimize;

use std::io::{Read, Seek, SeekFrom, Write};

use chrono::FixedOffset;

use crate::core::error::{MetaError, MetaResult};
use crate::core::metadata::{self, AttrValue};
use crate::core::time::MetaTime;
use crate::files::handler::{ContainerFormat, RawMeta, ScanOutcome};
use crate::meta::FORMAT_XMP;
use boxes::{
    box_size, fourcc_str, header_size_for, parse_top_level, write_box_bytes, BoxNode,
    DiscardSource, SeekSource, SkipRead, FREE, MDIA, MINF, MOOV, MVHD, STBL, TKHD, TRAK, UUID,
};
use header::{Mvhd, Tkhd};

/// UUID identifying XMP payload in a top-level `uuid` box.
pub const XMP_UUID: [u8; 16] = [
    0xBE, 0x7A, 0xCF, 0xCB, 0x97, 0xA9, 0x42, 0xE8, 0x9C, 0x71, 0x99, 0x94, 0x91, 0xE3, 0xAF,
    0xAC,
];

/// A parsed MP4 file: the top-level boxes plus the decoded movie header.
#[derive(Debug, Clone)]
pub struct Mp4File {
    pub boxes: Vec<BoxNode>,
    pub header: Mvhd,
}

impl Mp4File {
    /// Parses an MP4 stream, reading and discarding skipped regions.
    pub fn parse<R: Read>(r: R) -> MetaResult<Mp4File> {
        Self::parse_from(&mut DiscardSource::new(r))
    }

    /// Parses an MP4 stream, seeking over skipped regions.
    pub fn parse_seekable<R: Read + Seek>(r: R) -> MetaResult<Mp4File> {
        Self::parse_from(&mut SeekSource(r))
    }

    fn parse_from<S: SkipRead>(src: &mut S) -> MetaResult<Mp4File> {
        let mut boxes = parse_top_level(src)?;

        let moov = boxes
            .iter_mut()
            .find(|b| b.typ == MOOV)
            .ok_or_else(|| MetaError::format("mp4: moov missing"))?;
        moov.unpack_children()?;

        let mvhd = moov
            .find(&[MVHD])
            .ok_or_else(|| MetaError::format("mp4: mvhd missing"))?;
        let header = Mvhd::decode(&mvhd.raw)?;

        Ok(Mp4File { boxes, header })
    }

    fn find_top(&self, typ: boxes::FourCc) -> Option<&BoxNode> {
        self.boxes.iter().find(|b| b.typ == typ)
    }

    /// Frame size of the largest track, from the track headers.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        let moov = self.find_top(MOOV)?;
        let mut best: Option<(u32, u32)> = None;
        for c in moov.children.as_ref()? {
            if c.typ != TRAK {
                continue;
            }
            let Some(tkhd) = c.find(&[TKHD]) else {
                continue;
            };
            let Ok(t) = Tkhd::decode(&tkhd.raw) else {
                continue;
            };
            let (w, h) = t.frame_size();
            if w == 0 || h == 0 {
                continue;
            }
            let area = u64::from(w) * u64::from(h);
            if best.map_or(true, |(bw, bh)| area > u64::from(bw) * u64::from(bh)) {
                best = Some((w, h));
            }
        }
        best
    }

    /// Inserts or replaces the top-level `uuid` box whose UUID equals
    /// the first 16 bytes of `data`.
    ///
    /// Replacement happens in place when the new box fits the old box
    /// plus any directly following `free` boxes, re-emitting an exact
    /// remainder as a trailing `free` box. Otherwise the old box turns
    /// into free space and the new one lands in any other large enough
    /// free region, or at the end of the file.
    pub fn add_uuid(&mut self, data: &[u8]) -> MetaResult<()> {
        if data.len() < 16 {
            return Err(MetaError::BadValue(
                "mp4: uuid box payload shorter than its UUID".into(),
            ));
        }

        let new_box = BoxNode {
            offset: -1,
            size: box_size(data.len()),
            ext: header_size_for(data.len()) == 16,
            typ: UUID,
            raw: data.to_vec(),
            children: None,
        };

        let existing = self.boxes.iter().position(|b| {
            b.typ == UUID && b.raw.len() >= 16 && b.raw[..16] == data[..16]
        });

        if let Some(i) = existing {
            if self.replace(i, new_box.clone()) {
                return Ok(());
            }
            // the new box does not fit here: surrender the old slot
            self.boxes[i] = BoxNode::free(self.boxes[i].size);
        }

        if let Some(room) = self.find_free_space(new_box.size) {
            let ok = self.replace(room, new_box);
            debug_assert!(ok, "free space search and replace disagree");
        } else {
            self.boxes.push(new_box);
        }
        Ok(())
    }

    /// Replaces the box at `idx` with `new_box`, consuming directly
    /// following `free` boxes until it fits. A replacement fits when the
    /// sizes match exactly or leave at least a minimal free box.
    fn replace(&mut self, idx: usize, new_box: BoxNode) -> bool {
        let mut space = self.boxes[idx].size;
        let mut next = idx + 1;
        while next < self.boxes.len()
            && new_box.size != space
            && !replacement_fits(new_box.size, space)
        {
            if self.boxes[next].typ != FREE {
                break;
            }
            space += self.boxes[next].size;
            next += 1;
        }

        if !replacement_fits(new_box.size, space) {
            return false;
        }

        let new_size = new_box.size;
        self.boxes[idx] = new_box;

        // drop the consumed free boxes, keeping one slot when a
        // remainder must be re-emitted
        let mut keep = next;
        if new_size < space {
            keep -= 1;
        }
        if keep < idx + 1 {
            self.boxes.insert(idx + 1, BoxNode::default());
        } else {
            self.boxes.drain(idx + 1..keep);
        }

        if new_size == space {
            return true;
        }
        self.boxes[idx + 1] = BoxNode::free(space - new_size);
        true
    }

    /// Finds a run of `free` boxes able to hold a box of `size` bytes,
    /// returning the run's first index.
    fn find_free_space(&self, size: i64) -> Option<usize> {
        let mut space = 0i64;
        let mut start = 0usize;
        for (i, b) in self.boxes.iter().enumerate() {
            if b.typ == FREE {
                space += b.size;
                if replacement_fits(size, space) {
                    return Some(start);
                }
            } else {
                space = 0;
                start = i + 1;
            }
        }
        None
    }

    /// Writes the file out, copying unloaded payloads (such as `mdat`)
    /// from the original stream `r`.
    pub fn write_to<W: Write, R: Read + Seek>(&self, w: &mut W, r: &mut R) -> MetaResult<()> {
        for b in &self.boxes {
            if b.size == 0 {
                // box runs to end of stream: emit its zero-size header
                // and copy the remainder verbatim
                let mut head = [0u8; 8];
                head[4..8].copy_from_slice(&b.typ);
                w.write_all(&head)?;
                r.seek(SeekFrom::Start((b.offset + 8) as u64))?;
                std::io::copy(r, w)?;
                continue;
            }

            if b.children.is_some() || !b.raw.is_empty() || b.offset < 0 {
                // loaded or synthetic: emit from memory
                let mut packed = b.clone();
                packed.pack_children();
                if packed.size != b.size {
                    return Err(MetaError::format(format!(
                        "mp4: {} size changed without repack",
                        fourcc_str(b.typ)
                    )));
                }
                let mut out = Vec::new();
                write_box_bytes(&mut out, &packed);
                w.write_all(&out)?;
            } else {
                // skipped on parse: copy header and payload from source
                let mut head = [0u8; 16];
                let head_len = b.header_size() as usize;
                r.seek(SeekFrom::Start(b.offset as u64))?;
                r.read_exact(&mut head[..head_len])?;
                w.write_all(&head[..head_len])?;

                let want = b.content_size() as u64;
                let copied = std::io::copy(&mut r.by_ref().take(want), w)?;
                if copied != want {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
            }
        }
        Ok(())
    }
}

/// A new box fits a space when the sizes are equal or the remainder can
/// hold a minimal (header-only) `free` box.
fn replacement_fits(size: i64, space: i64) -> bool {
    size == space || space - size >= 8
}

/// MP4 container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4Format;

impl ContainerFormat for Mp4Format {
    fn name(&self) -> &'static str {
        "mp4"
    }

    fn sniff(&self, prefix: &[u8]) -> bool {
        if prefix.len() < 12 {
            return false;
        }
        let box_size = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        if box_size % 4 != 0 {
            return false;
        }
        // the brand does not matter for metadata
        &prefix[4..8] == b"ftyp"
    }

    fn scan<R: Read>(&self, r: R) -> MetaResult<ScanOutcome> {
        let f = Mp4File::parse(r)?;

        let mut out = ScanOutcome::default();
        out.implicit.set(
            metadata::DATE_TIME_CREATED,
            AttrValue::Time(MetaTime {
                time: f.header.date_created,
                offset: FixedOffset::east_opt(0),
                prec: 6,
            }),
        );
        if let Some((w, h)) = f.frame_size() {
            out.implicit
                .set(metadata::IMAGE_WIDTH, AttrValue::Int(w as i32));
            out.implicit
                .set(metadata::IMAGE_HEIGHT, AttrValue::Int(h as i32));
        }

        for b in &f.boxes {
            if b.typ == UUID && b.raw.starts_with(&XMP_UUID) {
                out.meta.push(RawMeta {
                    name: FORMAT_XMP,
                    bytes: b.raw[XMP_UUID.len()..].to_vec(),
                });
            }
        }
        Ok(out)
    }

    fn write_with_meta<R: Read + Seek, W: Write>(
        &self,
        w: &mut W,
        r: &mut R,
        meta: &[RawMeta],
    ) -> MetaResult<()> {
        r.seek(SeekFrom::Start(0))?;
        let mut f = Mp4File::parse_seekable(&mut *r)?;

        for rm in meta {
            if rm.name != FORMAT_XMP {
                continue;
            }
            let mut payload = Vec::with_capacity(XMP_UUID.len() + rm.bytes.len());
            payload.extend_from_slice(&XMP_UUID);
            payload.extend_from_slice(&rm.bytes);
            f.add_uuid(&payload)?;
        }

        f.optimize()?;
        f.write_to(w, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::formats::mp4::boxes::FourCc;
    use std::io::Cursor;

    fn leaf(typ: FourCc, raw: Vec<u8>) -> BoxNode {
        BoxNode {
            offset: -1,
            size: box_size(raw.len()),
            typ,
            raw,
            ..BoxNode::default()
        }
    }

    fn uuid_box(uuid: [u8; 16], body_len: usize) -> BoxNode {
        let mut raw = uuid.to_vec();
        raw.extend(vec![0xEE; body_len]);
        leaf(UUID, raw)
    }

    /// Serializes a minimal playable-shaped MP4 into bytes.
    fn sample_mp4_bytes() -> Vec<u8> {
        let stco = {
            let mut raw = vec![0u8; 8];
            raw[7] = 1; // one entry
            raw.extend(&300u32.to_be_bytes());
            leaf(boxes::STCO, raw)
        };
        let mut stbl = BoxNode {
            typ: STBL,
            children: Some(vec![stco]),
            ..BoxNode::default()
        };
        stbl.pack_children();
        let mut minf = BoxNode {
            typ: MINF,
            children: Some(vec![stbl]),
            ..BoxNode::default()
        };
        minf.pack_children();
        let mut mdia = BoxNode {
            typ: MDIA,
            children: Some(vec![minf]),
            ..BoxNode::default()
        };
        mdia.pack_children();
        let tkhd = leaf(TKHD, header::tests::tkhd_v0(1, 320, 240));
        let mut trak = BoxNode {
            typ: TRAK,
            children: Some(vec![tkhd, mdia]),
            ..BoxNode::default()
        };
        trak.pack_children();
        let mvhd = leaf(MVHD, header::tests::mvhd_v0(3_600_000_000, 600, 600));
        let mut moov = BoxNode {
            typ: MOOV,
            children: Some(vec![mvhd, trak]),
            ..BoxNode::default()
        };
        moov.pack_children();

        let ftyp = leaf(boxes::FTYP, b"isom\0\0\0\0isom".to_vec());
        let mdat = leaf(boxes::MDAT, vec![0x42; 64]);

        let mut out = Vec::new();
        for b in [&ftyp, &moov, &mdat] {
            write_box_bytes(&mut out, b);
        }
        out
    }

    #[test]
    fn test_sniff() {
        let f = Mp4Format;
        let p = sample_mp4_bytes();
        assert!(f.sniff(&p));
        assert!(!f.sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]));

        // first four bytes must be a multiple of 4
        let mut bad = p.clone();
        bad[3] = 0x1D;
        assert!(!f.sniff(&bad));
    }

    #[test]
    fn test_parse_decodes_headers() {
        let p = sample_mp4_bytes();
        let f = Mp4File::parse(&p[..]).unwrap();
        assert_eq!(f.header.time_unit, 600);
        assert_eq!(f.frame_size(), Some((320, 240)));
    }

    #[test]
    fn test_parse_missing_moov() {
        let ftyp = leaf(boxes::FTYP, b"isom\0\0\0\0isom".to_vec());
        let mut p = Vec::new();
        write_box_bytes(&mut p, &ftyp);
        let err = Mp4File::parse(&p[..]).unwrap_err();
        assert!(err.to_string().contains("moov missing"));
    }

    #[test]
    fn test_write_round_trip_without_edits() {
        let p = sample_mp4_bytes();
        let f = Mp4File::parse_seekable(Cursor::new(&p)).unwrap();

        let mut out = Vec::new();
        f.write_to(&mut out, &mut Cursor::new(&p)).unwrap();
        assert_eq!(out, p);
    }

    #[test]
    fn test_add_uuid_appends() {
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse(&p[..]).unwrap();

        let mut payload = XMP_UUID.to_vec();
        payload.extend(b"<xmp/>");
        f.add_uuid(&payload).unwrap();

        let n = f
            .boxes
            .iter()
            .filter(|b| b.typ == UUID && b.raw.starts_with(&XMP_UUID))
            .count();
        assert_eq!(n, 1);
        assert_eq!(f.boxes.last().unwrap().typ, UUID);
    }

    #[test]
    fn test_add_uuid_at_most_one_per_uuid() {
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse(&p[..]).unwrap();

        for body in [&b"first"[..], b"second", b"third-longer-payload"] {
            let mut payload = XMP_UUID.to_vec();
            payload.extend_from_slice(body);
            f.add_uuid(&payload).unwrap();
        }

        let matching: Vec<_> = f
            .boxes
            .iter()
            .filter(|b| b.typ == UUID && b.raw.starts_with(&XMP_UUID))
            .collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].raw.ends_with(b"third-longer-payload"));
    }

    #[test]
    fn test_uuid_replace_consumes_free_exactly() {
        // ftyp, moov, uuid(A, 40 total), free(16), mdat
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse(&p[..]).unwrap();

        let uuid_a = [0xA0u8; 16];
        f.boxes.insert(2, uuid_box(uuid_a, 16)); // 8 + 16 + 16 = 40
        f.boxes.insert(3, BoxNode::free(16));

        // replacing with total size 56 consumes the free box entirely
        let mut payload = uuid_a.to_vec();
        payload.extend(vec![0x11; 32]); // 8 + 48 = 56
        f.add_uuid(&payload).unwrap();

        let order: Vec<FourCc> = f.boxes.iter().map(|b| b.typ).collect();
        assert_eq!(order, vec![boxes::FTYP, MOOV, UUID, boxes::MDAT]);
        assert_eq!(f.boxes[2].size, 56);

        // shrinking to 48 re-emits the 8-byte remainder as free space
        let mut payload = uuid_a.to_vec();
        payload.extend(vec![0x22; 24]); // 8 + 40 = 48
        f.add_uuid(&payload).unwrap();

        let order: Vec<FourCc> = f.boxes.iter().map(|b| b.typ).collect();
        assert_eq!(order, vec![boxes::FTYP, MOOV, UUID, FREE, boxes::MDAT]);
        assert_eq!(f.boxes[2].size, 48);
        assert_eq!(f.boxes[3].size, 8);
    }

    #[test]
    fn test_free_region_smaller_than_8_unusable() {
        // replacing a 40-byte box with 36 bytes would leave 4 free bytes
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse(&p[..]).unwrap();

        let uuid_a = [0xA1u8; 16];
        f.boxes.insert(2, uuid_box(uuid_a, 16)); // size 40

        let mut payload = uuid_a.to_vec();
        payload.extend(vec![0x33; 12]); // 8 + 28 = 36, leaves 4
        f.add_uuid(&payload).unwrap();

        // in-place replacement impossible: old slot freed, box appended
        assert_eq!(f.boxes[2].typ, FREE);
        assert_eq!(f.boxes[2].size, 40);
        let last = f.boxes.last().unwrap();
        assert_eq!(last.typ, UUID);
        assert_eq!(last.size, 36);
    }

    #[test]
    fn test_add_uuid_too_short() {
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse(&p[..]).unwrap();
        assert!(f.add_uuid(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_scan_yields_xmp_and_implicit_attrs() {
        let p = sample_mp4_bytes();
        let mut f = Mp4File::parse_seekable(Cursor::new(&p)).unwrap();
        let mut payload = XMP_UUID.to_vec();
        payload.extend(b"<x:xmpmeta/>");
        f.add_uuid(&payload).unwrap();
        f.optimize().unwrap();

        let mut edited = Vec::new();
        f.write_to(&mut edited, &mut Cursor::new(&p)).unwrap();

        let out = Mp4Format.scan(&edited[..]).unwrap();
        assert_eq!(out.meta.len(), 1);
        assert_eq!(out.meta[0].name, FORMAT_XMP);
        assert_eq!(out.meta[0].bytes, b"<x:xmpmeta/>");

        assert!(out.implicit.get(metadata::DATE_TIME_CREATED).is_some());
        assert_eq!(
            out.implicit.get(metadata::IMAGE_WIDTH).and_then(|v| v.as_int()),
            Some(320)
        );
    }

    #[test]
    fn test_write_with_meta_updates_offsets() {
        let p = sample_mp4_bytes();

        // original mdat payload starts after ftyp + moov + header
        let f0 = Mp4File::parse(&p[..]).unwrap();
        let old_mdat_start = f0.find_top(boxes::MDAT).unwrap().offset;

        let meta = [RawMeta {
            name: FORMAT_XMP,
            bytes: b"<x/>".to_vec(),
        }];
        let mut out = Vec::new();
        Mp4Format
            .write_with_meta(&mut out, &mut Cursor::new(&p), &meta)
            .unwrap();

        let f1 = Mp4File::parse(&out[..]).unwrap();
        let order: Vec<FourCc> = f1.boxes.iter().map(|b| b.typ).collect();
        assert_eq!(order, vec![boxes::FTYP, MOOV, UUID, boxes::MDAT]);

        let new_mdat_start = f1.find_top(boxes::MDAT).unwrap().offset;
        let moov = f1.find_top(MOOV).unwrap();
        let stbl = moov.find(&[TRAK, MDIA, MINF, STBL]).unwrap();
        let stco = stbl.find(&[boxes::STCO]).unwrap();
        let entry = u32::from_be_bytes([stco.raw[8], stco.raw[9], stco.raw[10], stco.raw[11]]);

        // the single chunk offset moved exactly as far as mdat did
        assert_eq!(i64::from(entry), 300 - old_mdat_start + new_mdat_start);

        // mdat payload preserved byte for byte
        let mdat = f1.find_top(boxes::MDAT).unwrap();
        let start = (mdat.offset + mdat.header_size()) as usize;
        assert_eq!(&out[start..start + 64], &[0x42; 64][..]);
    }
}
