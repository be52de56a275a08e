//! C4: Atomizer — decomposes a multi-allelic site into canonical
//! single-allele atoms and rewrites genotypes against them (§4.4).
//!
//! Grounded directly in `atomic.c`'s `bcf_atomize`/`bcf_atom_gen_at`: the
//! CIGAR-walk emission pass, the sort-dedup-translate pass, and the
//! quadratic overlap check (§9 "Quadratic atom overlap check") are ports of
//! that algorithm, not a reinvention.

use crate::error::{BgtError, Result};
use crate::site::SiteRecord;
use itertools::Itertools;

pub const GT_REF: u8 = 0;
pub const GT_ALT: u8 = 1;
pub const GT_MISSING: u8 = 2;
pub const GT_OVERLAP: u8 = 3;

/// A canonical single-allele variant (§3 "Atom").
#[derive(Debug, Clone)]
pub struct Atom {
    pub rid: i32,
    pub pos: i32,
    pub rlen: i32,
    /// The ALT index (≥1) in the source site this atom was generated from.
    /// After dedup this is the index of the representative; see
    /// `source_anums` for the full duplicate run.
    pub anum: usize,
    pub ref_allele: Vec<u8>,
    pub alt_allele: Vec<u8>,
    /// `{0=ref, 1=this atom's alt, 2=missing, 3=overlapping other allele}`
    /// per sample haplotype, in source-sample order.
    pub gt: Vec<u8>,
    /// Every original ALT index that coalesced into this atom (length 1
    /// unless this atom is the representative of a duplicate run).
    pub source_anums: Vec<usize>,
}

impl Atom {
    fn key(&self) -> (i32, i32, i32, &[u8], &[u8]) {
        (self.rid, self.pos, self.rlen, &self.ref_allele, &self.alt_allele)
    }

    fn key_eq(&self, other: &Atom) -> bool {
        self.key() == other.key()
    }

    fn overlaps(&self, other: &Atom) -> bool {
        self.pos < other.pos + other.rlen && other.pos < self.pos + self.rlen
    }
}

fn new_atom(rid: i32, pos: i32, rlen: i32, anum: usize, ref_allele: &[u8], alt_allele: &[u8]) -> Atom {
    Atom {
        rid,
        pos,
        rlen,
        anum,
        ref_allele: ref_allele.to_vec(),
        alt_allele: alt_allele.to_vec(),
        gt: Vec::new(),
        source_anums: vec![anum],
    }
}

/// Decodes one haplotype's standard VCF/BCF GT-encoded byte — `(allele+1)<<1
/// | phase` — into an allele index, or a negative value for missing (ground
/// truth: `atomic.c`'s `c = (gt->p[m+j] >> 1) - 1`).
fn decode_gt_allele(byte: u8) -> i32 {
    (byte as i32 >> 1) - 1
}

fn parse_cigar(s: &[u8]) -> Result<Vec<(usize, u8)>> {
    let mut ops = Vec::new();
    let mut i = 0;
    while i < s.len() {
        let start = i;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return Err(BgtError::InvalidCigar(format!(
                "expected a length at offset {} in {:?}",
                start,
                String::from_utf8_lossy(s)
            )));
        }
        let len: usize = std::str::from_utf8(&s[start..i]).unwrap().parse().unwrap();
        if i >= s.len() {
            return Err(BgtError::InvalidCigar("CIGAR ends without an operator".into()));
        }
        let op = s[i];
        i += 1;
        match op {
            b'M' | b'=' | b'X' | b'I' | b'D' => ops.push((len, op)),
            other => {
                return Err(BgtError::InvalidCigar(format!(
                    "unsupported CIGAR operator '{}'",
                    other as char
                )))
            }
        }
    }
    Ok(ops)
}

fn synthetic_cigar(ref_len: usize, alt_len: usize) -> Vec<(usize, u8)> {
    if ref_len == alt_len {
        return vec![(ref_len, b'M')];
    }
    let delta = alt_len as i64 - ref_len as i64;
    let mut ops = vec![(1usize, b'M')];
    let rest = if delta > 0 {
        ops.push((delta as usize, b'I'));
        ref_len.saturating_sub(1)
    } else {
        ops.push(((-delta) as usize, b'D'));
        alt_len.saturating_sub(1)
    };
    if rest > 0 {
        ops.push((rest, b'M'));
    }
    ops
}

/// Splits the INFO `CIGAR` value into its comma-separated segments, one per
/// non-symbolic ALT, in ALT order.
fn split_cigar_segments(cigar_info: &[u8], n_needed: usize) -> Result<Vec<Vec<u8>>> {
    let segments: Vec<Vec<u8>> = cigar_info
        .split(|&b| b == b',')
        .map(|s| s.to_vec())
        .collect();
    if segments.len() < n_needed {
        return Err(BgtError::InvalidCigar(format!(
            "INFO CIGAR has {} segment(s), need {} for the non-symbolic ALTs",
            segments.len(),
            n_needed
        )));
    }
    Ok(segments)
}

fn walk_cigar(
    rid: i32,
    pos: i32,
    anum: usize,
    ref_allele: &[u8],
    alt_allele: &[u8],
    ops: &[(usize, u8)],
    out: &mut Vec<Atom>,
) -> Result<()> {
    let (mut x, mut y) = (0usize, 0usize);
    for &(len, op) in ops {
        match op {
            b'M' | b'=' | b'X' => {
                for j in 0..len {
                    if ref_allele[x + j] != alt_allele[y + j] {
                        out.push(new_atom(
                            rid,
                            pos + (x + j) as i32,
                            1,
                            anum,
                            &ref_allele[x + j..x + j + 1],
                            &alt_allele[y + j..y + j + 1],
                        ));
                    }
                }
                x += len;
                y += len;
            }
            b'I' => {
                if x == 0 || y == 0 {
                    return Err(BgtError::InvalidCigar(
                        "insertion CIGAR operator at the start of the allele".into(),
                    ));
                }
                out.push(new_atom(
                    rid,
                    pos + x as i32 - 1,
                    1,
                    anum,
                    &ref_allele[x - 1..x],
                    &alt_allele[y - 1..y + len],
                ));
                y += len;
            }
            b'D' => {
                if x == 0 || y == 0 {
                    return Err(BgtError::InvalidCigar(
                        "deletion CIGAR operator at the start of the allele".into(),
                    ));
                }
                out.push(new_atom(
                    rid,
                    pos + x as i32 - 1,
                    len as i32 + 1,
                    anum,
                    &ref_allele[x - 1..x + len],
                    &ref_allele[x - 1..x],
                ));
                x += len;
            }
            _ => unreachable!("parse_cigar only emits M/=/X/I/D"),
        }
    }
    Ok(())
}

/// Decomposes one multi-allelic site into atoms, appended to `out`.
///
/// `cigar_info` is the raw INFO `CIGAR` value, if present. `gt` is the raw
/// per-sample-haplotype GT-encoded byte array (standard VCF/BCF encoding,
/// `(allele+1)<<1|phase`), length `n_sample * ploidy`.
pub fn atomize(
    site: &SiteRecord,
    cigar_info: Option<&[u8]>,
    gt: &[u8],
    ploidy: usize,
    out: &mut Vec<Atom>,
) -> Result<()> {
    let alleles = site.alleles();
    if alleles.len() < 2 {
        return Err(BgtError::CorruptRecord(
            "atomize requires at least one ALT allele".into(),
        ));
    }
    let ref_allele = &alleles[0];
    let n_allele = alleles.len();
    // `false` means this record describes a symbolic/END-based span (rlen
    // doesn't agree with len(REF)): every ALT, symbolic or not, then gets a
    // single whole-span atom and no CIGAR segments are consumed at all.
    let conventional = site.rlen as usize == ref_allele.len();

    let non_symbolic_count = (1..n_allele)
        .filter(|&i| conventional && !SiteRecord::is_symbolic_allele(&alleles[i]))
        .count();
    let segments = match cigar_info {
        Some(c) => Some(split_cigar_segments(c, non_symbolic_count)?),
        None => None,
    };
    let mut seg_idx = 0usize;

    let start = out.len();
    for i in 1..n_allele {
        let alt = &alleles[i];
        let is_symbolic = SiteRecord::is_symbolic_allele(alt);
        if !conventional || is_symbolic {
            out.push(new_atom(site.rid, site.pos, site.rlen, i, ref_allele, alt));
            continue;
        }
        let ops = if let Some(segs) = &segments {
            let seg = &segs[seg_idx];
            seg_idx += 1;
            parse_cigar(seg)?
        } else {
            synthetic_cigar(ref_allele.len(), alt.len())
        };
        walk_cigar(site.rid, site.pos, i, ref_allele, alt, &ops, out)?;
    }

    let n = out.len() - start;
    let n_sample = gt.len() / ploidy;
    let n_reps = dedup_and_translate(&mut out[start..start + n], n, n_allele, gt, n_sample, ploidy);
    out.truncate(start + n_reps);
    Ok(())
}

/// Sorts `atoms[..n]` by `(rid,pos,rlen,ref,alt)`, coalesces duplicate runs,
/// builds the per-representative translation table, and rewrites genotypes.
/// Partitions representatives to the front; callers truncate to the
/// representative count.
/// Returns the number of representative atoms; callers truncate to that
/// count after reordering representatives to the front.
fn dedup_and_translate(
    atoms: &mut [Atom],
    n: usize,
    n_allele: usize,
    gt: &[u8],
    n_sample: usize,
    ploidy: usize,
) -> usize {
    atoms[..n].sort_by(|a, b| a.key().cmp(&b.key()));

    // eq[i] = index of the first atom in i's duplicate run.
    let mut eq = vec![0usize; n];
    for i in 1..n {
        eq[i] = if !atoms[i - 1].key_eq(&atoms[i]) { i } else { eq[i - 1] };
    }

    // Representative indices, in order.
    let reps: Vec<usize> = (0..n).filter(|&i| eq[i] == i).collect();

    // Merge source_anums for duplicate runs before reordering.
    let mut merged_anums = vec![Vec::new(); n];
    for i in 0..n {
        merged_anums[eq[i]].push(atoms[i].anum);
    }

    for &k in &reps {
        let mut tr = vec![0u8; n_allele];
        for i in 0..n {
            if eq[i] == eq[k] {
                tr[atoms[i].anum] = GT_ALT;
            } else if atoms[i].overlaps(&atoms[k]) {
                tr[atoms[i].anum] = GT_OVERLAP;
            }
        }
        let mut out_gt = Vec::with_capacity(n_sample * ploidy);
        for s in 0..n_sample {
            for h in 0..ploidy {
                let c = decode_gt_allele(gt[s * ploidy + h]);
                out_gt.push(if c < 0 {
                    GT_MISSING
                } else {
                    tr[c as usize]
                });
            }
        }
        atoms[k].gt = out_gt;
        atoms[k].source_anums = merged_anums[eq[k]].clone();
    }

    // Partition: representatives first (in sorted order), duplicates after.
    let n_reps = reps.len();
    let ordered: Vec<Atom> = reps
        .iter()
        .map(|&i| atoms[i].clone())
        .chain((0..n).filter(|i| eq[*i] != *i).map(|i| atoms[i].clone()))
        .collect_vec();
    for (slot, atom) in atoms.iter_mut().zip(ordered.into_iter()) {
        *slot = atom;
    }
    n_reps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::encode_shared_blob;
    use crate::types::{Header, TypedVec};
    use std::rc::Rc;

    fn site(pos: i32, rlen: i32, alleles: &[&[u8]]) -> SiteRecord {
        let header = Rc::new(Header::new());
        let alleles: Vec<Vec<u8>> = alleles.iter().map(|a| a.to_vec()).collect();
        let shared = encode_shared_blob(0, pos, rlen, None, 0, b".", &alleles, &[], &[]);
        let mut s = SiteRecord::from_bytes(shared, Vec::new(), header);
        s.unpack(crate::site::UN_ALL).unwrap();
        s
    }

    fn gt_byte(allele: i32, phase: u8) -> u8 {
        (((allele + 1) << 1) as u8) | phase
    }

    #[test]
    fn snv_atomization() {
        let s = site(100, 3, &[b"ACG", b"ATG"]);
        let gt = [gt_byte(0, 0), gt_byte(1, 0)]; // one sample, 0|1
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].pos, 101);
        assert_eq!(atoms[0].rlen, 1);
        assert_eq!(atoms[0].ref_allele, b"C");
        assert_eq!(atoms[0].alt_allele, b"T");
    }

    #[test]
    fn anchored_insertion() {
        let s = site(50, 1, &[b"A", b"ACGT"]);
        let gt = [gt_byte(0, 0), gt_byte(1, 0)];
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].pos, 50);
        assert_eq!(atoms[0].rlen, 1);
        assert_eq!(atoms[0].ref_allele, b"A");
        assert_eq!(atoms[0].alt_allele, b"ACGT");
    }

    #[test]
    fn anchored_deletion() {
        let s = site(10, 4, &[b"ACGT", b"A"]);
        let gt = [gt_byte(0, 0), gt_byte(1, 0)];
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].pos, 10);
        assert_eq!(atoms[0].rlen, 4);
        assert_eq!(atoms[0].ref_allele, b"ACGT");
        assert_eq!(atoms[0].alt_allele, b"A");
    }

    #[test]
    fn multi_alt_dedup_collapses_identical_atoms() {
        let s = site(7, 1, &[b"A", b"C", b"C"]);
        // one sample, genotype (1,2) i.e. both ALTs
        let gt = [gt_byte(1, 0), gt_byte(2, 0)];
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].gt, vec![GT_ALT, GT_ALT]);
    }

    #[test]
    fn symbolic_allele_emits_one_atom_without_cigar() {
        let s = site(200, 500, &[b"A", b"<DEL>"]);
        let gt = [gt_byte(1, 0), gt_byte(0, 0)];
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].alt_allele, b"<DEL>");
        assert_eq!(atoms[0].rlen, 500);
    }

    #[test]
    fn missing_cigar_segments_is_an_error() {
        let s = site(0, 4, &[b"ACGT", b"A", b"ACGG"]);
        let gt = [gt_byte(0, 0), gt_byte(1, 0)];
        let mut atoms = Vec::new();
        let err = atomize(&s, Some(b"1M3D"), &gt, 2, &mut atoms).unwrap_err();
        assert!(matches!(err, BgtError::InvalidCigar(_)));
    }

    #[test]
    fn overlapping_other_allele_is_flagged() {
        // REF=AC, ALT1=TC (SNV at pos+0), ALT2=AG (SNV at pos+1): same span as ALT1's atom? use an
        // overlapping deletion/SNV pair instead: ALT1 a 2bp deletion spanning pos..pos+2,
        // ALT2 a SNV at pos+1 (inside that span).
        let s = site(0, 2, &[b"AC", b"A", b"AG"]);
        // ALT1 = "A" (1bp deletion anchored at pos-? anchor needs x>0,y>0: ref=AC,alt=A -> 1M1D)
        // ALT2 = "AG" (SNV at pos+1: C->G)
        let gt = [gt_byte(1, 0), gt_byte(2, 0)];
        let mut atoms = Vec::new();
        atomize(&s, None, &gt, 2, &mut atoms).unwrap();
        // two distinct atoms should be present, each referencing the other as overlap for the
        // haplotype that carries it
        assert_eq!(atoms.len(), 2);
    }
}
