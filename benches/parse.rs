//! Parsing benchmarks over synthetic in-memory files.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use metakit::files::formats::jpeg::scanner::{write_segment, Scanner};
use metakit::files::formats::jpeg::EXIF_PREFIX;
use metakit::meta::exif::Exif;
use metakit::meta::xmp::Xmp;
use metakit::meta::MetadataFormat;
use metakit::{parse, AttrValue, MetaTime, DATE_TIME_ORIGINAL, MAKE};

fn sample_exif() -> Vec<u8> {
    let mut x = Exif::new(4000, 3000);
    x.set_attr(MAKE, &AttrValue::Text("Acme".into())).unwrap();
    x.set_attr(
        DATE_TIME_ORIGINAL,
        &AttrValue::Time(MetaTime::parse("2024-03-01T12:00:00.5")),
    )
    .unwrap();
    x.set_lat_long(51.5125, -0.125);
    x.marshal().unwrap()
}

fn sample_jpeg() -> Vec<u8> {
    let mut p = vec![0xFF, 0xD8];
    let mut seg = Vec::new();
    write_segment(&mut seg, 0xC0, &[8, 0, 16, 0, 16, 3, 0, 0, 0]).unwrap();
    p.extend(&seg);

    let mut payload = EXIF_PREFIX.to_vec();
    payload.extend(sample_exif());
    seg.clear();
    write_segment(&mut seg, 0xE1, &payload).unwrap();
    p.extend(&seg);

    // a couple of bulky non-metadata segments
    for _ in 0..4 {
        seg.clear();
        write_segment(&mut seg, 0xDB, &[0x11; 4096]).unwrap();
        p.extend(&seg);
    }

    seg.clear();
    write_segment(&mut seg, 0xDA, &[0; 10]).unwrap();
    p.extend(&seg);
    p.extend(vec![0x42; 256 * 1024]);
    p
}

fn sample_xmp() -> Vec<u8> {
    let xmp = br#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about=""
  xmlns:xmp="http://ns.adobe.com/xap/1.0/"
  xmlns:exif="http://ns.adobe.com/exif/1.0/">
<xmp:Rating>5</xmp:Rating>
<xmp:CreateDate>2024-03-01T12:00:00+01:00</xmp:CreateDate>
<exif:GPSLatitude>51,30.750000N</exif:GPSLatitude>
<exif:GPSLongitude>0,7.500000W</exif:GPSLongitude>
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>"#;
    xmp.to_vec()
}

fn bench_jpeg_scan(c: &mut Criterion) {
    let input = sample_jpeg();
    c.bench_function("jpeg_scan", |b| {
        b.iter(|| {
            let mut j = Scanner::new(black_box(&input[..])).unwrap();
            let mut segments = 0;
            while j.next() {
                segments += usize::from(j.is_segment_start());
            }
            black_box(segments)
        })
    });
}

fn bench_facade_parse(c: &mut Criterion) {
    let input = sample_jpeg();
    c.bench_function("facade_parse_jpeg", |b| {
        b.iter(|| parse(black_box(&input[..])).unwrap())
    });
}

fn bench_exif_decode(c: &mut Criterion) {
    let blob = sample_exif();
    c.bench_function("exif_decode", |b| {
        b.iter(|| Exif::decode(black_box(&blob)).unwrap())
    });
}

fn bench_xmp_decode(c: &mut Criterion) {
    let blob = sample_xmp();
    c.bench_function("xmp_decode", |b| {
        b.iter(|| Xmp::decode(black_box(&blob)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_jpeg_scan,
    bench_facade_parse,
    bench_exif_decode,
    bench_xmp_decode
);
criterion_main!(benches);
