//! Illustrative command-line front-end (§1 "out of scope": the CLI is an
//! interface-only collaborator, not part of the core). Reads one or more
//! small tab-separated variant tables — one row per site, columns
//! `chrom pos ref alt sample1_gt sample2_gt ...` with `a|b` or `a/b`
//! haplotype pairs — opens each transparently through `niffler` (so a
//! gzipped table works exactly like a plain one), wires a
//! [`bgt_core::reader::SingleFileReader`] per input, and streams the
//! k-way merge to stdout as a minimal VCF-shaped table.
//!
//! This binary exists to exercise the core end-to-end without a real
//! `.bcf`/`.pbf`/`.spl` triple on hand; it is not an implementation of the
//! on-disk BGT format (§6.6), which remains an external collaborator.

use anyhow::{bail, Context, Result};
use bgt_core::collaborators::InMemoryIndex;
use bgt_core::genotype::InMemoryGenotypeMatrixBackend;
use bgt_core::merge::{MergeFlags, MergedReader};
use bgt_core::reader::{InMemorySiteSource, SingleFileReader};
use bgt_core::site::encode_shared_blob;
use bgt_core::types::Header;
use itertools::Itertools;
use log::{info, warn};
use std::io::{BufReader, Read};
use std::rc::Rc;

struct ParsedFile {
    header: Rc<Header>,
    reader: SingleFileReader<InMemorySiteSource, InMemoryGenotypeMatrixBackend>,
}

/// Table row -> `(pos, ref, alt, per_sample_pair_of_allele_indices)`.
fn parse_line(line: &str) -> Result<(i32, Vec<u8>, Vec<u8>, Vec<(i32, i32)>)> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 5 {
        bail!("expected at least 5 tab-separated fields, got {}", fields.len());
    }
    let pos: i32 = fields[1].parse().context("bad position")?;
    let reference = fields[2].as_bytes().to_vec();
    let alt = fields[3].as_bytes().to_vec();
    let mut calls = Vec::new();
    for field in &fields[4..] {
        let mut parts = field.split(|c| c == '|' || c == '/');
        let a = parts.next().context("empty genotype field")?;
        let b = parts.next().context("genotype field missing second allele")?;
        let parse_allele = |tok: &str| -> Result<i32> {
            if tok == "." {
                Ok(-1)
            } else {
                tok.parse::<i32>().context("non-integer allele index")
            }
        };
        calls.push((parse_allele(a)?, parse_allele(b)?));
    }
    Ok((pos, reference, alt, calls))
}

fn load_file(path: &str, sample_names: &[String]) -> Result<ParsedFile> {
    let (raw, format) = niffler::from_path(path).with_context(|| format!("opening {}", path))?;
    info!("{}: detected {:?} compression", path, format);
    let mut text = String::new();
    BufReader::new(raw)
        .read_to_string(&mut text)
        .with_context(|| format!("reading {}", path))?;

    let mut header = Header::new();
    header.set_samples(sample_names.to_vec());

    let mut rows = Vec::new();
    let mut backend = InMemoryGenotypeMatrixBackend::new(sample_names.len() * 2);
    let mut index_rows = Vec::new();
    let mut contigs_seen = Vec::new();

    for (row_idx, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let fields: Vec<&str> = line.splitn(2, '\t').collect();
        let chrom = fields.first().copied().unwrap_or_default().to_string();
        if !contigs_seen.contains(&chrom) {
            header.add_contig(chrom.clone(), i32::MAX as u32);
            contigs_seen.push(chrom.clone());
        }
        let rid = header.contig_idx(&chrom).unwrap() as i32;
        let (pos, reference, alt, calls) = parse_line(line)
            .with_context(|| format!("{}:{}: malformed row", path, row_idx + 1))?;
        if calls.len() != sample_names.len() {
            bail!(
                "{}:{}: {} genotype column(s), expected {}",
                path,
                row_idx + 1,
                calls.len(),
                sample_names.len()
            );
        }
        let codes: Vec<u8> = calls
            .iter()
            .flat_map(|&(a, b)| {
                [a, b].map(|allele| match allele {
                    -1 => 2,
                    0 => 0,
                    1 => 1,
                    other => {
                        warn!("allele index {} beyond this table's biallelic model, treating as ALT", other);
                        1
                    }
                })
            })
            .collect();
        backend.push_row(&codes);
        let rlen = reference.len().max(1) as i64;
        index_rows.push((rid as usize, pos as i64, rlen));
        let shared = encode_shared_blob(
            rid,
            pos,
            rlen as i32,
            None,
            sample_names.len() as u32,
            b".",
            &[reference, alt],
            &[],
            &[],
        );
        rows.push((shared, Vec::new()));
    }

    let header = Rc::new(header);
    let source = InMemorySiteSource::new(rows);
    let index = Box::new(InMemoryIndex::new(index_rows));
    let mut reader = SingleFileReader::new(header.clone(), source, backend, index);
    reader.set_full_scan();
    reader.prepare()?;
    Ok(ParsedFile { header, reader })
}

fn print_usage() {
    eprintln!(
        "usage: bgt-demo --samples <s1,s2,...> <table1.tsv[.gz]> [table2.tsv[.gz]] ...\n\
         \n\
         Each input table has one row per site: chrom\\tpos\\tref\\talt\\t<gt>...\n\
         with one genotype column per sample (\"0|1\", \"1/1\", \".|.\"  allowed)."
    );
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 || args[1] != "--samples" {
        print_usage();
        std::process::exit(2);
    }
    let sample_names: Vec<String> = args[2].split(',').map(|s| s.to_string()).collect_vec();
    let paths = &args[3..];

    let mut files = Vec::new();
    for path in paths {
        files.push(load_file(path, &sample_names)?);
    }
    for pair in files.windows(2) {
        if !pair[0].header.contigs_match(&pair[1].header) {
            bail!("input files do not share a contig dictionary");
        }
    }

    let readers = files.into_iter().map(|f| f.reader).collect_vec();
    let mut merged = MergedReader::new(readers)?;
    merged.set_flags(MergeFlags::new().with_set_ac());

    println!("##fileformat=VCFv4.2");
    println!(
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
        merged.header().samples.join("\t")
    );
    let mut n_records = 0usize;
    while let Some(site) = merged.next() {
        let site = site?;
        let alleles = site.record.alleles();
        let chrom = merged
            .header()
            .contig_name(site.record.rid as u32)
            .unwrap_or("?");
        let alt = alleles[1..]
            .iter()
            .map(|a| String::from_utf8_lossy(a))
            .join(",");
        println!(
            "{}\t{}\t.\t{}\t{}\t.\t.\t.\tGT",
            chrom,
            site.record.pos + 1,
            String::from_utf8_lossy(&alleles[0]),
            alt,
        );
        n_records += 1;
    }
    info!("wrote {} merged record(s)", n_records);
    Ok(())
}
