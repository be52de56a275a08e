//! C6: MergedReader — k-way synchronized merge across `N` SingleFileReaders
//! (§4.6), grounded directly in `bgtm_prepare`/`bgtm_read_core` (`bgt.c`).

use crate::codec::TypeKind;
use crate::collaborators::SampleTable;
use crate::error::{BgtError, Result};
use crate::genotype::GenotypeMatrixBackend;
use crate::reader::{SingleFileReader, Site, SiteSource};
use crate::site::{FormatColumn, SiteRecord};
use crate::types::{Header, HeaderDictEntry, LengthClass, LogicalColumn, TypedVec};
use log::{debug, warn};
use std::rc::Rc;

pub const MAX_GROUPS: u8 = 8;

/// §4.6 "Operating modes (bit flags)". A small `u8`-backed struct rather
/// than a `bitflags!` macro, matching the group-mask's own `u8`
/// representation elsewhere in this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeFlags(u8);

impl MergeFlags {
    const NO_GT: u8 = 1;
    const SET_AC: u8 = 2;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_no_gt(mut self) -> Self {
        self.0 |= Self::NO_GT;
        self
    }

    pub fn with_set_ac(mut self) -> Self {
        self.0 |= Self::SET_AC;
        self
    }

    pub fn no_gt(&self) -> bool {
        self.0 & Self::NO_GT != 0
    }

    pub fn set_ac(&self) -> bool {
        self.0 & Self::SET_AC != 0
    }
}

/// `(0+1)<<1, (1+1)<<1, 0<<1, (2+1)<<1` from `bgt_gen_gt`: ref, alt1,
/// missing, alt2, each shifted by the VCF GT allele-index convention.
pub const GT_ENCODE: [u8; 4] = [2, 4, 0, 6];

const SYMBOLIC_ALTS: [&str; 8] = ["M", "DEL", "DUP", "INS", "INV", "DUP:TANDEM", "DEL:ME", "INS:ME"];

fn alt_description(id: &str) -> &'static str {
    match id {
        "M" => "Multi-allelic site; see the per-file records for detail",
        "DEL" => "Deletion",
        "DUP" => "Duplication",
        "INS" => "Insertion",
        "INV" => "Inversion",
        "DUP:TANDEM" => "Tandem duplication",
        "DEL:ME" => "Deletion of mobile element",
        "INS:ME" => "Insertion of mobile element",
        _ => unreachable!(),
    }
}

fn info_line(id: &str, number: &str, ty: &str, description: &str) -> String {
    format!(
        "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
        id, number, ty, description
    )
}

/// One output site of a merge: the assembled record and the concatenated
/// (child-order) genotype planes it was built from.
pub struct MergedSite {
    pub record: SiteRecord,
    pub plane0: Vec<u8>,
    pub plane1: Vec<u8>,
}

pub struct MergedReader<S: SiteSource, B: GenotypeMatrixBackend> {
    children: Vec<SingleFileReader<S, B>>,
    header: Rc<Header>,
    child_n_hap: Vec<usize>,
    flags: MergeFlags,
    filter: Option<Box<dyn FnMut(&SiteRecord) -> bool>>,
    buffered: Vec<Option<Site>>,
    sample_table: Option<Box<dyn SampleTable>>,
    group_bits: Vec<u8>,
    next_group_bit: u8,
}

impl<S: SiteSource, B: GenotypeMatrixBackend> MergedReader<S, B> {
    /// §4.6: verifies the children share a contig dictionary, then builds
    /// the merged header (`bgtm_prepare`'s text, reproduced in
    /// [`build_header`]).
    pub fn new(children: Vec<SingleFileReader<S, B>>) -> Result<Self> {
        for c in children.iter().skip(1) {
            if !children[0].header().contigs_match(c.header()) {
                return Err(BgtError::HeaderMismatch(
                    "child files do not share a contig dictionary".into(),
                ));
            }
        }
        let header = Rc::new(build_header(&children)?);
        debug!(
            "merged header: {} contig(s), {} sample(s) across {} file(s)",
            header.contigs.len(),
            header.samples.len(),
            children.len()
        );
        let child_n_hap = children
            .iter()
            .map(|c| {
                c.output_header()
                    .map(|h| h.samples.len())
                    .unwrap_or_else(|| c.header().samples.len())
                    * 2
            })
            .collect();
        let n_samples = header.samples.len();
        let n = children.len();
        Ok(Self {
            children,
            header,
            child_n_hap,
            flags: MergeFlags::new(),
            filter: None,
            buffered: vec![None; n],
            sample_table: None,
            group_bits: vec![0u8; n_samples],
            next_group_bit: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn set_flags(&mut self, flags: MergeFlags) {
        self.flags = flags;
    }

    pub fn set_filter(&mut self, filter: impl FnMut(&SiteRecord) -> bool + 'static) {
        self.filter = Some(Box::new(filter));
    }

    pub fn set_sample_table(&mut self, table: Box<dyn SampleTable>) {
        self.sample_table = Some(table);
    }

    /// Cross-file sample grouping used for the per-group AC/AN INFO fields
    /// (distinct from each child's own per-file `add_group`, which only
    /// decides that child's output sample subset).
    pub fn add_group(&mut self, selector: &str) -> Result<()> {
        if self.next_group_bit >= MAX_GROUPS {
            return Err(BgtError::TooManyGroups { max: MAX_GROUPS });
        }
        let bit = 1u8 << self.next_group_bit;
        let names: Vec<String> = if selector == "?" {
            self.header.samples.clone()
        } else if let Some(rest) = selector.strip_prefix(':') {
            rest.split(|c| c == ',' || c == '\n')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Ok(text) = std::fs::read_to_string(selector) {
            text.lines().map(|l| l.trim().to_string()).filter(|s| !s.is_empty()).collect()
        } else {
            let expr = crate::collaborators::compile(selector)?;
            let table = self
                .sample_table
                .as_ref()
                .ok_or_else(|| BgtError::Collaborator("expression selector needs a sample table".into()))?;
            let mut matched = Vec::new();
            for name in &self.header.samples {
                if let Some(row) = table.sample_row(name) {
                    if table.eval(row, &expr)? {
                        matched.push(name.clone());
                    }
                }
            }
            matched
        };
        for name in &names {
            if let Some(idx) = self.header.sample_idx(name) {
                self.group_bits[idx] |= bit;
            } else {
                warn!("add_group: sample {:?} not present in the merged sample list", name);
            }
        }
        self.next_group_bit += 1;
        Ok(())
    }

    fn fill_buffers(&mut self) -> Result<()> {
        for i in 0..self.children.len() {
            if self.buffered[i].is_none() {
                if let Some(res) = self.children[i].next() {
                    self.buffered[i] = Some(res?);
                }
            }
        }
        Ok(())
    }

    fn select_min_index(&self) -> Option<usize> {
        self.buffered
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
            .min_by(|(_, a), (_, b)| a.record.sort_key().cmp(&b.record.sort_key()))
            .map(|(i, _)| i)
    }

    /// `1 + (distinct ALT[0] alleles seen across every slot whose site
    /// compares equal to `b0`)`. Two children agreeing on REF but disagreeing
    /// on ALT (e.g. `A/C` vs `A/G`) cannot both be represented by one
    /// biallelic output record, so this is what actually drives the `<M>`
    /// promotion — not any single child's own (always-biallelic) `n_allele`.
    fn max_allele_among_equal(&self, min_idx: usize) -> usize {
        let b0 = &self.buffered[min_idx].as_ref().unwrap().record;
        let mut alts: Vec<&[u8]> = self
            .buffered
            .iter()
            .filter_map(|o| o.as_ref())
            .filter(|s| s.record.site_equal(b0))
            .filter_map(|s| s.record.alt_alleles().first().map(|v| v.as_slice()))
            .collect();
        alts.sort_unstable();
        alts.dedup();
        1 + alts.len()
    }

    /// §4.6 "Merge loop". One call produces (at most) one merged record.
    pub fn next(&mut self) -> Option<Result<MergedSite>> {
        loop {
            if let Err(e) = self.fill_buffers() {
                return Some(Err(e));
            }
            if self.buffered.iter().all(|b| b.is_none()) {
                return None;
            }
            let min_idx = self.select_min_index().unwrap();
            let max_allele = self.max_allele_among_equal(min_idx);

            let (b0_rid, b0_pos, b0_rlen, ref_allele, alt0) = {
                let b0 = &self.buffered[min_idx].as_ref().unwrap().record;
                (
                    b0.rid,
                    b0.pos,
                    b0.rlen,
                    b0.ref_allele().to_vec(),
                    b0.alt_alleles().first().cloned(),
                )
            };

            let mut alleles = vec![ref_allele.clone()];
            if let Some(alt0) = alt0 {
                alleles.push(alt0);
            }
            let mut rlen = b0_rlen;
            let mut end_info = None;
            if max_allele > 2 {
                alleles.push(b"<M>".to_vec());
                end_info = Some(b0_pos + b0_rlen);
                rlen = 1;
            }

            let merged_alt0 = alleles.get(1).map(|v| v.as_slice());
            let mut plane0 = Vec::new();
            let mut plane1 = Vec::new();
            for (ci, slot) in self.buffered.iter_mut().enumerate() {
                let n_hap = self.child_n_hap[ci];
                let contributes = slot
                    .as_ref()
                    .map(|s| s.record.rid == b0_rid && s.record.pos == b0_pos && s.record.ref_allele() == ref_allele.as_slice())
                    .unwrap_or(false);
                if contributes {
                    let site = slot.take().unwrap();
                    let tr = allele_translation(site.record.alleles(), merged_alt0);
                    for i in 0..site.plane0.len() {
                        let code = (site.plane1[i] << 1) | site.plane0[i];
                        let mapped = tr[code as usize];
                        plane0.push(mapped & 1);
                        plane1.push((mapped >> 1) & 1);
                    }
                } else {
                    plane0.extend(std::iter::repeat(0u8).take(n_hap));
                    plane1.extend(std::iter::repeat(1u8).take(n_hap));
                }
            }

            let mut record = SiteRecord::from_bytes(Vec::new(), Vec::new(), self.header.clone());
            record.rid = b0_rid;
            record.pos = b0_pos;
            record.rlen = rlen;
            record.set_alleles(alleles);
            if let Some(end) = end_info {
                if let Some(id) = self.header.dict_idx("END") {
                    record.push_info(id, TypedVec::Int32(vec![end]));
                }
            }

            if self.flags.set_ac() || self.filter.is_some() {
                // `group_bits` is one mask per sample; expand to one per
                // haplotype (each sample contributes two, consecutively) to
                // line up with `plane0`/`plane1`.
                let hap_group_bits: Vec<u8> = self.group_bits.iter().flat_map(|&b| [b, b]).collect();
                let (an, ac, group_ans, group_acs) =
                    accumulate_ac_an(&plane0, &plane1, &hap_group_bits, self.next_group_bit, record.n_allele());
                if let Some(id) = self.header.dict_idx("AN") {
                    record.push_info(id, TypedVec::Int32(vec![an]));
                }
                if let Some(id) = self.header.dict_idx("AC") {
                    record.push_info(id, TypedVec::Int32(ac));
                }
                for g in 1..=self.next_group_bit {
                    let gi = (g - 1) as usize;
                    if let Some(id) = self.header.dict_idx(&format!("AN{}", g)) {
                        record.push_info(id, TypedVec::Int32(vec![group_ans[gi]]));
                    }
                    if let Some(id) = self.header.dict_idx(&format!("AC{}", g)) {
                        record.push_info(id, TypedVec::Int32(group_acs[gi].clone()));
                    }
                }
            }

            if let Some(filter) = &mut self.filter {
                if filter(&record) {
                    continue;
                }
            }

            if !self.flags.no_gt() {
                let data: Vec<u8> = (0..plane0.len())
                    .map(|i| GT_ENCODE[((plane1[i] << 1) | plane0[i]) as usize])
                    .collect();
                let gt_id = self.header.dict_idx("GT").unwrap_or(0);
                record.set_fmt(vec![FormatColumn {
                    dict_id: gt_id,
                    elem_type: TypeKind::Int8,
                    count_per_sample: 2,
                    data,
                }]);
            }

            return Some(Ok(MergedSite { record, plane0, plane1 }));
        }
    }
}

/// Maps a contributing child's own 2-bit haplotype codes onto the merged
/// record's allele list. `ref` and `missing` always pass through; a child's
/// own ALT (code 1 or 3, i.e. that child's `alleles[1]`/`alleles[2]`) passes
/// through as the merged ALT1 (code 1) only if it textually matches the
/// merged `ALT[0]`, otherwise it folds into the symbolic `<M>` (code 3).
/// Without this, a child whose own ALT disagrees with the merged ALT[0]
/// would keep reporting code 1 downstream, which misrepresents it as
/// carrying the other child's allele.
fn allele_translation(child_alleles: &[Vec<u8>], merged_alt0: Option<&[u8]>) -> [u8; 4] {
    let matches = |a: &[u8]| merged_alt0.map(|m| a == m).unwrap_or(false);
    let mut tr = [0u8, 3, 2, 3];
    if child_alleles.len() > 1 && matches(&child_alleles[1]) {
        tr[1] = 1;
    }
    if child_alleles.len() > 2 && matches(&child_alleles[2]) {
        tr[3] = 1;
    }
    tr
}

fn push_info_entry(header: &mut Header, id: &str, idx: usize) {
    header.add_dict_entry(HeaderDictEntry::new(
        id,
        idx,
        LogicalColumn::Info,
        TypeKind::Int32,
        LengthClass::PerAlt,
    ));
}

/// `bgtm_prepare`'s merged-header text, reproduced in structure: fixed
/// preamble, `AC`/`AN`/`END`/per-group `AC{1..8}`/`AN{1..8}` INFO lines, the
/// eight symbolic `##ALT` lines, contigs, then the concatenated sample list.
fn build_header<S: SiteSource, B: GenotypeMatrixBackend>(children: &[SingleFileReader<S, B>]) -> Result<Header> {
    let mut header = Header::new();
    if let Some(first) = children.first() {
        header.contigs = first.header().contigs.clone();
    }

    let mut idx = 0usize;
    push_info_entry(&mut header, "AC", idx);
    idx += 1;
    header.add_dict_entry(HeaderDictEntry::new("AN", idx, LogicalColumn::Info, TypeKind::Int32, LengthClass::Fixed(1)));
    idx += 1;
    header.add_dict_entry(HeaderDictEntry::new("END", idx, LogicalColumn::Info, TypeKind::Int32, LengthClass::Fixed(1)));
    idx += 1;
    for g in 1..=8u8 {
        push_info_entry(&mut header, &format!("AC{}", g), idx);
        idx += 1;
        header.add_dict_entry(HeaderDictEntry::new(
            format!("AN{}", g),
            idx,
            LogicalColumn::Info,
            TypeKind::Int32,
            LengthClass::Fixed(1),
        ));
        idx += 1;
    }
    header.add_dict_entry(HeaderDictEntry::new(
        "GT",
        idx,
        LogicalColumn::Format,
        TypeKind::Int8,
        LengthClass::Fixed(2),
    ));

    let mut lines = vec!["##fileformat=VCFv4.2".to_string()];
    lines.push(info_line("AC", "A", "Integer", "Allele count in genotypes, for each ALT allele"));
    lines.push(info_line("AN", "1", "Integer", "Total number of alleles in called genotypes"));
    lines.push(info_line("END", "1", "Integer", "End position of the variant described in this record"));
    for g in 1..=8u8 {
        lines.push(info_line(
            &format!("AC{}", g),
            "A",
            "Integer",
            &format!("Allele count in genotypes, for each ALT allele, in group {}", g),
        ));
        lines.push(info_line(
            &format!("AN{}", g),
            "1",
            "Integer",
            &format!("Total number of alleles in called genotypes, in group {}", g),
        ));
    }
    for sym in SYMBOLIC_ALTS {
        lines.push(format!("##ALT=<ID={},Description=\"{}\">", sym, alt_description(sym)));
    }
    for (id, meta) in &header.contigs {
        lines.push(format!("##contig=<ID={},length={}>", id, meta.length));
    }
    header.meta_lines = lines;

    let mut samples = Vec::new();
    for c in children {
        match c.output_header() {
            Some(out) => samples.extend(out.samples.iter().cloned()),
            None => {
                warn!("merging a child reader that was never prepare()d; using its full sample list");
                samples.extend(c.header().samples.iter().cloned());
            }
        }
    }
    header.set_samples(samples);
    Ok(header)
}

/// Per-haplotype loop strategy (§4.6 step 5, "fewer than 1024 haplotypes").
/// Returns `(AN, AC, per_group_AN, per_group_AC)`.
pub(crate) fn accumulate_per_haplotype(
    plane0: &[u8],
    plane1: &[u8],
    group_bits: &[u8],
    n_groups: u8,
    ac_len: usize,
) -> (i32, Vec<i32>, Vec<i32>, Vec<Vec<i32>>) {
    let mut cnt = [0i64; 4];
    let mut group_cnt = vec![[0i64; 4]; n_groups as usize];
    for i in 0..plane0.len() {
        let code = ((plane1[i] << 1) | plane0[i]) as usize;
        cnt[code] += 1;
        for g in 0..n_groups {
            if group_bits[i] & (1 << g) != 0 {
                group_cnt[g as usize][code] += 1;
            }
        }
    }
    fold_counts(&cnt, &group_cnt, ac_len)
}

/// Bucket-then-fold strategy (§4.6 step 5, "otherwise"): a `256×4` table
/// keyed by the 8-bit group mask and the 2-bit code, folded by group bit.
pub(crate) fn accumulate_bucketed(
    plane0: &[u8],
    plane1: &[u8],
    group_bits: &[u8],
    n_groups: u8,
    ac_len: usize,
) -> (i32, Vec<i32>, Vec<i32>, Vec<Vec<i32>>) {
    let mut table = [[0i64; 4]; 256];
    for i in 0..plane0.len() {
        let code = ((plane1[i] << 1) | plane0[i]) as usize;
        table[group_bits[i] as usize][code] += 1;
    }
    let mut cnt = [0i64; 4];
    let mut group_cnt = vec![[0i64; 4]; n_groups as usize];
    for (mask, counts) in table.iter().enumerate() {
        for (code, &v) in counts.iter().enumerate() {
            if v == 0 {
                continue;
            }
            cnt[code] += v;
            for g in 0..n_groups {
                if mask & (1 << g) != 0 {
                    group_cnt[g as usize][code] += v;
                }
            }
        }
    }
    fold_counts(&cnt, &group_cnt, ac_len)
}

fn fold_counts(cnt: &[i64; 4], group_cnt: &[[i64; 4]], ac_len: usize) -> (i32, Vec<i32>, Vec<i32>, Vec<Vec<i32>>) {
    let an = (cnt[0] + cnt[1] + cnt[3]) as i32;
    let mut ac = vec![cnt[1] as i32, cnt[3] as i32];
    ac.truncate(ac_len.min(2));
    let mut group_ans = Vec::with_capacity(group_cnt.len());
    let mut group_acs = Vec::with_capacity(group_cnt.len());
    for c in group_cnt {
        group_ans.push((c[0] + c[1] + c[3]) as i32);
        let mut gac = vec![c[1] as i32, c[3] as i32];
        gac.truncate(ac_len.min(2));
        group_acs.push(gac);
    }
    (an, ac, group_ans, group_acs)
}

fn accumulate_ac_an(
    plane0: &[u8],
    plane1: &[u8],
    group_bits: &[u8],
    n_groups: u8,
    n_allele: usize,
) -> (i32, Vec<i32>, Vec<i32>, Vec<Vec<i32>>) {
    let ac_len = n_allele.saturating_sub(1);
    if plane0.len() < 1024 {
        accumulate_per_haplotype(plane0, plane1, group_bits, n_groups, ac_len)
    } else {
        accumulate_bucketed(plane0, plane1, group_bits, n_groups, ac_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryIndex;
    use crate::genotype::InMemoryGenotypeMatrixBackend;
    use crate::reader::InMemorySiteSource;
    use crate::site::encode_shared_blob;

    fn child(samples: &[&str], contig_len: u32, sites: &[(i32, &[u8], &[u8])]) -> SingleFileReader<InMemorySiteSource, InMemoryGenotypeMatrixBackend> {
        let mut header = Header::new();
        header.add_contig("chr1", contig_len);
        header.set_samples(samples.iter().map(|s| s.to_string()).collect());
        let header = Rc::new(header);
        let n_hap = samples.len() * 2;

        let mut rows = Vec::new();
        let mut backend = InMemoryGenotypeMatrixBackend::new(n_hap);
        let mut index_rows = Vec::new();
        for &(pos, r, a) in sites {
            let shared = encode_shared_blob(0, pos, 1, None, samples.len() as u32, b".", &[r.to_vec(), a.to_vec()], &[], &[]);
            rows.push((shared, Vec::new()));
            backend.push_row(&vec![1u8; n_hap]);
            index_rows.push((0usize, pos as i64, 1i64));
        }
        let source = InMemorySiteSource::new(rows);
        let index = Box::new(InMemoryIndex::new(index_rows));
        let mut reader = SingleFileReader::new(header, source, backend, index);
        reader.set_full_scan();
        reader.prepare().unwrap();
        reader
    }

    #[test]
    fn mismatched_headers_error() {
        let a = child(&["s1"], 1000, &[]);
        let b = child(&["s2"], 2000, &[]);
        assert!(matches!(
            MergedReader::new(vec![a, b]),
            Err(BgtError::HeaderMismatch(_))
        ));
    }

    #[test]
    fn disjoint_sites_fill_missing_for_absent_child() {
        let a = child(&["s1"], 1000, &[(10, b"A", b"C")]);
        let b = child(&["s2"], 1000, &[(20, b"A", b"G")]);
        let mut merged = MergedReader::new(vec![a, b]).unwrap();
        merged.set_flags(MergeFlags::new().with_set_ac());

        let first = merged.next().unwrap().unwrap();
        assert_eq!(first.record.pos, 10);
        // s1's haplotypes are alt(1,1), s2's two are filled missing (plane1=1,plane0=0 -> code 2)
        assert_eq!(first.plane0, vec![1, 1, 0, 0]);
        assert_eq!(first.plane1, vec![0, 0, 1, 1]);

        let second = merged.next().unwrap().unwrap();
        assert_eq!(second.record.pos, 20);
        assert!(merged.next().is_none());
    }

    #[test]
    fn matching_sites_merge_alleles_and_promote_to_m() {
        let a = child(&["s1"], 1000, &[(10, b"A", b"C")]);
        let b = child(&["s2"], 1000, &[(10, b"A", b"G")]);
        let mut merged = MergedReader::new(vec![a, b]).unwrap();
        let site = merged.next().unwrap().unwrap();
        assert_eq!(site.record.alleles(), &[b"A".to_vec(), b"C".to_vec(), b"<M>".to_vec()]);
        assert_eq!(site.record.rlen, 1);
        // s1 carries the merged ALT1 ("C") directly; s2's "G" doesn't match
        // ALT1 so its alt1 codes fold into alt2 (<M>).
        assert_eq!(site.plane0, vec![1, 1, 1, 1]);
        assert_eq!(site.plane1, vec![0, 0, 1, 1]);
    }

    #[test]
    fn ac_an_strategies_agree_on_random_planes() {
        let n_hap = 37;
        let n_groups = 3u8;
        let plane0: Vec<u8> = (0..n_hap).map(|i| (i * 7 % 3 == 0) as u8).collect();
        let plane1: Vec<u8> = (0..n_hap).map(|i| (i * 11 % 5 == 0) as u8).collect();
        let group_bits: Vec<u8> = (0..n_hap).map(|i| (i % 8) as u8).collect();

        let a = accumulate_per_haplotype(&plane0, &plane1, &group_bits, n_groups, 2);
        let b = accumulate_bucketed(&plane0, &plane1, &group_bits, n_groups, 2);
        assert_eq!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn ac_an_strategies_agree_for_arbitrary_planes(
            plane0 in proptest::collection::vec(0u8..=1, 1..128),
            n_allele in 2usize..=3,
            seed in 0u64..1000,
        ) {
            let n_hap = plane0.len();
            let plane1: Vec<u8> = (0..n_hap).map(|i| ((i as u64 * 13 + seed) % 7 < 2) as u8).collect();
            let n_groups = 4u8;
            let group_bits: Vec<u8> = (0..n_hap).map(|i| 1u8 << (i % n_groups as usize)).collect();

            let a = accumulate_per_haplotype(&plane0, &plane1, &group_bits, n_groups, n_allele);
            let b = accumulate_bucketed(&plane0, &plane1, &group_bits, n_groups, n_allele);
            proptest::prop_assert_eq!(a, b);
        }
    }
}
