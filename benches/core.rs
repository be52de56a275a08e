use bgt_core::atomize::atomize;
use bgt_core::codec::{decode_typed_integer, encode_single_integer};
use bgt_core::collaborators::InMemoryIndex;
use bgt_core::genotype::InMemoryGenotypeMatrixBackend;
use bgt_core::merge::{MergeFlags, MergedReader};
use bgt_core::reader::{InMemorySiteSource, SingleFileReader};
use bgt_core::site::{encode_shared_blob, SiteRecord};
use bgt_core::types::Header;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;

fn child(
    samples: &[&str],
    sites: &[(i32, &[u8], &[u8])],
) -> SingleFileReader<InMemorySiteSource, InMemoryGenotypeMatrixBackend> {
    let mut header = Header::new();
    header.add_contig("chr1", 1_000_000);
    header.set_samples(samples.iter().map(|s| s.to_string()).collect());
    let header = Rc::new(header);
    let n_hap = samples.len() * 2;

    let mut rows = Vec::new();
    let mut backend = InMemoryGenotypeMatrixBackend::new(n_hap);
    let mut index_rows = Vec::new();
    for &(pos, r, a) in sites {
        let shared = encode_shared_blob(
            0,
            pos,
            r.len() as i32,
            None,
            samples.len() as u32,
            b".",
            &[r.to_vec(), a.to_vec()],
            &[],
            &[],
        );
        rows.push((shared, Vec::new()));
        backend.push_row(&vec![1u8; n_hap]);
        index_rows.push((0usize, pos as i64, r.len() as i64));
    }
    let source = InMemorySiteSource::new(rows);
    let index = Box::new(InMemoryIndex::new(index_rows));
    let mut reader = SingleFileReader::new(header, source, backend, index);
    reader.set_full_scan();
    reader.prepare().unwrap();
    reader
}

fn benchmark_typed_integer_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let values: Vec<i32> = (0..2000).map(|i| i * 37 - 1000).collect();
    group.bench_function(BenchmarkId::new("encode_single_integer", values.len()), |b| {
        b.iter(|| {
            let mut out = Vec::new();
            for &v in &values {
                encode_single_integer(&mut out, black_box(v as i64));
            }
            out
        })
    });
    let mut encoded = Vec::new();
    for &v in &values {
        encode_single_integer(&mut encoded, v as i64);
    }
    group.bench_function(BenchmarkId::new("decode_typed_integer", values.len()), |b| {
        b.iter(|| {
            let mut offset = 0;
            let mut sum = 0i64;
            while offset < encoded.len() {
                let (v, consumed) = decode_typed_integer(black_box(&encoded[offset..])).unwrap();
                sum += v as i64;
                offset += consumed;
            }
            sum
        })
    });
}

fn benchmark_single_file_scan(c: &mut Criterion) {
    let sites: Vec<(i32, &[u8], &[u8])> = (0..500).map(|i| (i * 2, b"A" as &[u8], b"C" as &[u8])).collect();
    let mut group = c.benchmark_group("reader");
    group.bench_function(BenchmarkId::new("full_scan", sites.len()), |b| {
        b.iter_batched(
            || child(&["s1", "s2", "s3"], &sites),
            |mut reader| {
                let mut n = 0usize;
                while let Some(site) = reader.next() {
                    black_box(site.unwrap());
                    n += 1;
                }
                n
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn benchmark_merge(c: &mut Criterion) {
    let sites_a: Vec<(i32, &[u8], &[u8])> = (0..500).map(|i| (i * 2, b"A" as &[u8], b"C" as &[u8])).collect();
    let sites_b: Vec<(i32, &[u8], &[u8])> = (0..500).map(|i| (i * 2 + 1, b"A" as &[u8], b"G" as &[u8])).collect();
    let mut group = c.benchmark_group("merge");
    group.bench_function(BenchmarkId::new("k_way_merge", sites_a.len() + sites_b.len()), |b| {
        b.iter_batched(
            || {
                let a = child(&["s1"], &sites_a);
                let b = child(&["s2"], &sites_b);
                MergedReader::new(vec![a, b]).unwrap()
            },
            |mut merged| {
                merged.set_flags(MergeFlags::new().with_set_ac());
                let mut n = 0usize;
                while let Some(site) = merged.next() {
                    black_box(site.unwrap());
                    n += 1;
                }
                n
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn benchmark_atomize(c: &mut Criterion) {
    let mut header = Header::new();
    header.add_contig("chr1", 1000);
    header.set_samples((0..8).map(|i| format!("s{}", i)).collect());
    let shared = encode_shared_blob(
        0,
        99,
        3,
        None,
        8,
        b".",
        &[b"ACG".to_vec(), b"A".to_vec(), b"ATG".to_vec()],
        &[],
        &[],
    );
    let header = Rc::new(header);
    let mut group = c.benchmark_group("atomize");
    group.bench_function("multi_allelic_dedup", |b| {
        b.iter_batched(
            || {
                let mut site = SiteRecord::from_bytes(shared.clone(), Vec::new(), header.clone());
                site.unpack(bgt_core::site::UN_ALL).unwrap();
                site
            },
            |site| {
                let mut out = Vec::new();
                atomize(&site, None, &vec![1u8; 16], 2, &mut out).unwrap();
                black_box(out)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    benchmark_typed_integer_roundtrip,
    benchmark_single_file_scan,
    benchmark_merge,
    benchmark_atomize
);
criterion_main!(benches);
