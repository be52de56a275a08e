//! C5: SingleFileReader — per-file site/genotype readback (§4.5), generic
//! over the two opaque collaborators it reads through: a [`SiteSource`]
//! (§6.1, the binary record stream) and a [`GenotypeMatrixBackend`] (§6.2).
//!
//! Open once, then call `next()` repeatedly, reusing internal buffers; the
//! unit of iteration is a site plus its two genotype planes rather than a
//! raw BCF record, and a group/region/filter configuration stage
//! (`prepare`) sits in front of it.

use crate::collaborators::{compile, Index, IntervalFilter, Region, SampleTable};
use crate::error::{BgtError, Result};
use crate::genotype::{GenotypeMatrix, GenotypeMatrixBackend};
use crate::site::{SiteRecord, UN_ALL};
use crate::types::Header;
use log::{debug, trace, warn};
use std::rc::Rc;

pub const MAX_GROUPS: u8 = 8;

/// §6.1: random access, by row, to the two blobs one site record is decoded
/// from. The reference/test implementation keeps every row in memory; a
/// production backend would stream a block-compressed `.bcf`.
pub trait SiteSource {
    fn n_rows(&self) -> u64;
    fn read_row(&self, row: u64) -> Result<(Vec<u8>, Vec<u8>)>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySiteSource {
    rows: Vec<(Vec<u8>, Vec<u8>)>,
}

impl InMemorySiteSource {
    pub fn new(rows: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { rows }
    }
}

impl SiteSource for InMemorySiteSource {
    fn n_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    fn read_row(&self, row: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        self.rows
            .get(row as usize)
            .cloned()
            .ok_or_else(|| BgtError::OutOfRange(format!("row {} out of range", row)))
    }
}

/// One read site: the decoded record, its recovered global row (from the
/// INFO field `_row`), and the two genotype planes restricted to the
/// reader's output sample subset.
pub struct Site {
    pub record: SiteRecord,
    pub row: u64,
    pub plane0: Vec<u8>,
    pub plane1: Vec<u8>,
}

pub struct SingleFileReader<S: SiteSource, B: GenotypeMatrixBackend> {
    header: Rc<Header>,
    output_header: Option<Header>,
    site_source: S,
    matrix: GenotypeMatrix<B>,
    index: Box<dyn Index>,
    sample_table: Option<Box<dyn SampleTable>>,

    /// One bitmask per source-header sample index.
    group_bits: Vec<u8>,
    next_group_bit: u8,
    output_samples: Vec<usize>,

    region: Option<Region>,
    rows: Vec<u64>,
    cursor: usize,
    interval_filter: Option<(Box<dyn IntervalFilter>, bool)>,
}

/// Parsed result of an `add_group` selector string (§6.7), before it is
/// resolved against the header/sample table.
enum Selector {
    All,
    Names(Vec<String>),
    Expr(crate::collaborators::Expr),
}

fn parse_selector(s: &str) -> Result<Selector> {
    if s == "?" {
        return Ok(Selector::All);
    }
    if let Some(rest) = s.strip_prefix(':') {
        let names = rest
            .split(|c| c == ',' || c == '\n')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(Selector::Names(names));
    }
    if let Ok(text) = std::fs::read_to_string(s) {
        let names = text
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(Selector::Names(names));
    }
    Ok(Selector::Expr(compile(s)?))
}

impl<S: SiteSource, B: GenotypeMatrixBackend> SingleFileReader<S, B> {
    pub fn new(header: Rc<Header>, site_source: S, matrix: B, index: Box<dyn Index>) -> Self {
        debug!(
            "opened BGT file handle: {} contigs, {} samples",
            header.contigs.len(),
            header.samples.len()
        );
        let n_samples = header.samples.len();
        Self {
            header,
            output_header: None,
            site_source,
            matrix: GenotypeMatrix::new(matrix),
            index,
            sample_table: None,
            group_bits: vec![0u8; n_samples],
            next_group_bit: 0,
            output_samples: Vec::new(),
            region: None,
            rows: Vec::new(),
            cursor: 0,
            interval_filter: None,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn set_sample_table(&mut self, table: Box<dyn SampleTable>) {
        self.sample_table = Some(table);
    }

    /// §4.5 `add_group`. `selector` follows §6.7's grammar.
    pub fn add_group(&mut self, selector: &str) -> Result<()> {
        if self.next_group_bit >= MAX_GROUPS {
            return Err(BgtError::TooManyGroups { max: MAX_GROUPS });
        }
        let bit = 1u8 << self.next_group_bit;
        let names: Vec<String> = match parse_selector(selector)? {
            Selector::All => self.header.samples.clone(),
            Selector::Names(names) => names,
            Selector::Expr(expr) => {
                let table = self.sample_table.as_ref().ok_or_else(|| {
                    BgtError::Collaborator("expression selector needs a sample table".into())
                })?;
                let mut matched = Vec::new();
                for name in &self.header.samples {
                    if let Some(row) = table.sample_row(name) {
                        if table.eval(row, &expr)? {
                            matched.push(name.clone());
                        }
                    }
                }
                matched
            }
        };
        let mut n_matched = 0usize;
        for name in &names {
            if let Some(idx) = self.header.sample_idx(name) {
                self.group_bits[idx] |= bit;
                n_matched += 1;
            } else {
                warn!("add_group: sample {:?} not present in this file", name);
            }
        }
        debug!(
            "add_group({:?}): {} sample(s) in group bit {}",
            selector, n_matched, self.next_group_bit
        );
        self.next_group_bit += 1;
        Ok(())
    }

    pub fn n_groups(&self) -> u8 {
        self.next_group_bit
    }

    pub fn group_bits(&self) -> &[u8] {
        &self.group_bits
    }

    /// §4.5 `prepare`. Idempotent: safe to call again after further
    /// `add_group` calls, rebuilding the output header/subset from scratch.
    pub fn prepare(&mut self) -> Result<()> {
        if self.next_group_bit == 0 {
            self.add_group("?")?;
        }
        self.output_samples = (0..self.header.samples.len())
            .filter(|&i| self.group_bits[i] != 0)
            .collect();

        let haplotypes: Vec<u32> = self
            .output_samples
            .iter()
            .flat_map(|&i| [2 * i as u32, 2 * i as u32 + 1])
            .collect();
        self.matrix.subset(&haplotypes);

        let mut out = Header::new();
        out.dict = self.header.dict.clone();
        out.contigs = self.header.contigs.clone();
        out.meta_lines = self.header.meta_lines.clone();
        out.set_samples(
            self.output_samples
                .iter()
                .map(|&i| self.header.samples[i].clone())
                .collect(),
        );
        debug!("prepare(): {} output sample(s)", out.samples.len());
        self.output_header = Some(out);
        Ok(())
    }

    pub fn output_header(&self) -> Option<&Header> {
        self.output_header.as_ref()
    }

    /// §4.5 `set_region`. A region unknown to the index yields nothing
    /// rather than erroring (§7).
    pub fn set_region(&mut self, region_str: &str) -> Result<()> {
        match crate::collaborators::parse_region(&self.header, region_str) {
            Ok(region) => {
                self.rows = self.index.query(&region).collect();
                self.region = Some(region);
            }
            Err(_) => {
                warn!("set_region({:?}): unknown to the index, yields nothing", region_str);
                self.rows = Vec::new();
                self.region = None;
            }
        }
        self.cursor = 0;
        Ok(())
    }

    /// Resets to a full scan of every row in file order.
    pub fn set_full_scan(&mut self) {
        self.rows = (0..self.index.n_rows()).collect();
        self.region = None;
        self.cursor = 0;
    }

    pub fn set_start(&mut self, row: u64) {
        self.cursor = self.rows.iter().position(|&r| r >= row).unwrap_or(self.rows.len());
    }

    pub fn set_interval_filter(&mut self, filter: Box<dyn IntervalFilter>, exclude: bool) {
        self.interval_filter = Some((filter, exclude));
    }

    fn read_one(&mut self, row: u64) -> Result<Option<Site>> {
        let (shared, indiv) = self.site_source.read_row(row)?;
        let mut record = SiteRecord::from_bytes(shared, indiv, self.header.clone());
        record.unpack(UN_ALL)?;

        if let Some(region) = &self.region {
            let overlaps = record.rid as usize == region.rid
                && record.pos < region.end as i32
                && (region.start as i32) < record.pos + record.rlen;
            if !overlaps {
                return Ok(None);
            }
        }

        if let Some((filter, exclude)) = &self.interval_filter {
            let ov = filter.overlaps(
                record.rid as usize,
                record.pos as i64,
                (record.pos + record.rlen) as i64,
            );
            let keep = if *exclude { !ov } else { ov };
            if !keep {
                return Ok(None);
            }
        }

        let recovered_row = record
            .info_by_tag("_row")
            .and_then(|v| v.as_ints())
            .and_then(|ints| ints.first())
            .map(|&v| v as u64)
            .unwrap_or(row);

        self.matrix.seek(recovered_row)?;
        let (p0, p1) = self.matrix.read()?;
        Ok(Some(Site {
            record,
            row: recovered_row,
            plane0: p0.to_vec(),
            plane1: p1.to_vec(),
        }))
    }

    /// §4.5 `next`. Advances until a site passes the region and
    /// interval-filter gates, or the row list is exhausted.
    pub fn next(&mut self) -> Option<Result<Site>> {
        loop {
            if self.cursor >= self.rows.len() {
                trace!("region iterator exhausted after {} row(s) visited", self.cursor);
                return None;
            }
            let row = self.rows[self.cursor];
            self.cursor += 1;
            match self.read_one(row) {
                Ok(Some(site)) => return Some(Ok(site)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryIndex;
    use crate::genotype::InMemoryGenotypeMatrixBackend;
    use crate::site::encode_shared_blob;
    use crate::types::TypedVec;

    fn fixture() -> SingleFileReader<InMemorySiteSource, InMemoryGenotypeMatrixBackend> {
        let mut header = Header::new();
        header.add_contig("chr1", 1000);
        header.set_samples(vec!["s1".to_string(), "s2".to_string()]);
        let header = Rc::new(header);

        let mut rows = Vec::new();
        let mut backend = InMemoryGenotypeMatrixBackend::new(4);
        let mut index_rows = Vec::new();
        for (i, pos) in [10i32, 20, 30].iter().enumerate() {
            let info = vec![(0usize, TypedVec::Int32(vec![i as i32]))];
            let shared = encode_shared_blob(
                0,
                *pos,
                1,
                Some(30.0),
                2,
                b".",
                &[b"A".to_vec(), b"C".to_vec()],
                &[],
                &info,
            );
            rows.push((shared, Vec::new()));
            backend.push_row(&[0, 1, 2, 3]);
            index_rows.push((0usize, *pos as i64, 1i64));
        }
        let source = InMemorySiteSource::new(rows);
        let index = Box::new(InMemoryIndex::new(index_rows));
        let mut reader = SingleFileReader::new(header, source, backend, index);
        reader.set_full_scan();
        reader
    }

    #[test]
    fn prepare_defaults_to_all_samples() {
        let mut reader = fixture();
        reader.prepare().unwrap();
        assert_eq!(reader.output_header().unwrap().samples, vec!["s1", "s2"]);
    }

    #[test]
    fn add_group_restricts_output_samples() {
        let mut reader = fixture();
        reader.add_group(":s1").unwrap();
        reader.prepare().unwrap();
        assert_eq!(reader.output_header().unwrap().samples, vec!["s1"]);
    }

    #[test]
    fn too_many_groups_errors() {
        let mut reader = fixture();
        for _ in 0..MAX_GROUPS {
            reader.add_group(":s1").unwrap();
        }
        assert!(matches!(
            reader.add_group(":s1"),
            Err(BgtError::TooManyGroups { max: MAX_GROUPS })
        ));
    }

    #[test]
    fn next_reads_all_rows_in_order() {
        let mut reader = fixture();
        reader.prepare().unwrap();
        let mut positions = Vec::new();
        while let Some(site) = reader.next() {
            positions.push(site.unwrap().record.pos);
        }
        assert_eq!(positions, vec![10, 20, 30]);
    }

    #[test]
    fn set_region_filters_rows() {
        let mut reader = fixture();
        reader.prepare().unwrap();
        reader.set_region("chr1:15-25").unwrap();
        let mut positions = Vec::new();
        while let Some(site) = reader.next() {
            positions.push(site.unwrap().record.pos);
        }
        assert_eq!(positions, vec![20]);
    }
}
