//! C3: GenotypeMatrix — a column-subset, seekable reader over the bit-packed
//! two-plane genotype matrix (§4.3, §6.2).
//!
//! The on-disk storage (one bit per haplotype per plane, random-access by
//! row) is an external collaborator (§6.2): this module only specifies and
//! implements the *reader* contract — `seek`, `subset`, `read` — against a
//! small [`GenotypeMatrixBackend`] trait. [`InMemoryGenotypeMatrixBackend`]
//! is the reference/test implementation; a production backend would instead
//! mmap or stream the `.pbf` file.

use crate::error::{BgtError, Result};

/// Opaque collaborator (§6.2): random access by row index to the packed
/// bit-planes, O(log rows) or better.
pub trait GenotypeMatrixBackend {
    fn n_rows(&self) -> u64;
    /// Total (unsubset) haplotype count, i.e. `2 * n_samples`.
    fn n_haplotypes(&self) -> usize;
    /// Packed bit-planes for `row`: each plane has `ceil(n_haplotypes/8)`
    /// bytes, bit `i` of byte `i/8` holding haplotype `i`'s value.
    fn row_planes(&self, row: u64) -> Result<(&[u8], &[u8])>;
}

/// A backend that keeps every row's planes in memory; used by tests and by
/// small fixtures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenotypeMatrixBackend {
    n_haplotypes: usize,
    rows: Vec<(Vec<u8>, Vec<u8>)>,
}

impl InMemoryGenotypeMatrixBackend {
    pub fn new(n_haplotypes: usize) -> Self {
        Self {
            n_haplotypes,
            rows: Vec::new(),
        }
    }

    /// Appends one row given per-haplotype 2-bit codes (`0..=3`, per the
    /// `{00=ref,01=alt1,10=missing,11=alt2}` table in §3).
    pub fn push_row(&mut self, codes: &[u8]) {
        assert_eq!(codes.len(), self.n_haplotypes);
        let nbytes = (self.n_haplotypes + 7) / 8;
        let mut p0 = vec![0u8; nbytes];
        let mut p1 = vec![0u8; nbytes];
        for (i, &c) in codes.iter().enumerate() {
            let bit0 = c & 1;
            let bit1 = (c >> 1) & 1;
            if bit0 != 0 {
                p0[i / 8] |= 1 << (i % 8);
            }
            if bit1 != 0 {
                p1[i / 8] |= 1 << (i % 8);
            }
        }
        self.rows.push((p0, p1));
    }
}

impl GenotypeMatrixBackend for InMemoryGenotypeMatrixBackend {
    fn n_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    fn n_haplotypes(&self) -> usize {
        self.n_haplotypes
    }

    fn row_planes(&self, row: u64) -> Result<(&[u8], &[u8])> {
        let r = self
            .rows
            .get(row as usize)
            .ok_or_else(|| BgtError::OutOfRange(format!("row {} out of range", row)))?;
        Ok((&r.0, &r.1))
    }
}

fn bit_at(plane: &[u8], i: usize) -> u8 {
    (plane[i / 8] >> (i % 8)) & 1
}

/// The reader contract of §4.3, generic over a storage [`GenotypeMatrixBackend`].
///
/// `read()` unpacks the active haplotype subset into byte-per-haplotype
/// planes (`0`/`1`), matching the representation every downstream consumer
/// (the atomizer, the merge's AC/AN accumulation) expects.
pub struct GenotypeMatrix<B: GenotypeMatrixBackend> {
    backend: B,
    subset: Vec<u32>,
    current_row: Option<u64>,
    plane0: Vec<u8>,
    plane1: Vec<u8>,
}

impl<B: GenotypeMatrixBackend> GenotypeMatrix<B> {
    pub fn new(backend: B) -> Self {
        let n = backend.n_haplotypes();
        let subset: Vec<u32> = (0..n as u32).collect();
        Self {
            backend,
            subset,
            current_row: None,
            plane0: Vec::new(),
            plane1: Vec::new(),
        }
    }

    /// Restricts future `read()`s to the given haplotype indices (twice the
    /// sample index plus 0 or 1), in the given order.
    pub fn subset(&mut self, indices: &[u32]) {
        self.subset = indices.to_vec();
        self.current_row = None;
    }

    pub fn subset_indices(&self) -> &[u32] {
        &self.subset
    }

    pub fn seek(&mut self, row: u64) -> Result<()> {
        if row >= self.backend.n_rows() {
            return Err(BgtError::OutOfRange(format!(
                "row {} >= n_rows {}",
                row,
                self.backend.n_rows()
            )));
        }
        self.current_row = Some(row);
        Ok(())
    }

    /// Returns the two unpacked, subset-restricted planes for the current
    /// row. Valid only until the next `seek`/`subset` call (§5
    /// "single-borrow `next()`").
    pub fn read(&mut self) -> Result<(&[u8], &[u8])> {
        let row = self
            .current_row
            .ok_or_else(|| BgtError::OutOfRange("read() before seek()".into()))?;
        let (raw0, raw1) = self.backend.row_planes(row)?;
        let n_bits = self.backend.n_haplotypes();
        self.plane0.clear();
        self.plane1.clear();
        for &hap in &self.subset {
            let i = hap as usize;
            if i >= n_bits {
                return Err(BgtError::OutOfRange(format!(
                    "haplotype index {} out of range",
                    i
                )));
            }
            self.plane0.push(bit_at(raw0, i));
            self.plane1.push(bit_at(raw1, i));
        }
        Ok((&self.plane0, &self.plane1))
    }

    pub fn n_rows(&self) -> u64 {
        self.backend.n_rows()
    }
}

/// Decodes one haplotype's 2-bit code from its plane bits, per §3: `(p1<<1)
/// | p0` with `{00=ref, 01=alt1, 10=missing, 11=alt2}`.
#[inline]
pub fn haplotype_code(p0: u8, p1: u8) -> u8 {
    (p1 << 1) | p0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_restricts_and_reorders_haplotypes() {
        let mut backend = InMemoryGenotypeMatrixBackend::new(4);
        backend.push_row(&[0, 1, 2, 3]);
        let mut m = GenotypeMatrix::new(backend);
        m.subset(&[3, 0]);
        m.seek(0).unwrap();
        let (p0, p1) = m.read().unwrap();
        // haplotype 3 has code 3 -> p0=1,p1=1; haplotype 0 has code 0 -> p0=0,p1=0
        assert_eq!(p0, &[1, 0]);
        assert_eq!(p1, &[1, 0]);
    }

    #[test]
    fn seek_out_of_range_errors() {
        let backend = InMemoryGenotypeMatrixBackend::new(2);
        let mut m = GenotypeMatrix::new(backend);
        assert!(m.seek(0).is_err());
    }

    #[test]
    fn haplotype_code_table_matches_spec() {
        assert_eq!(haplotype_code(0, 0), 0); // ref
        assert_eq!(haplotype_code(1, 0), 1); // alt1
        assert_eq!(haplotype_code(0, 1), 2); // missing
        assert_eq!(haplotype_code(1, 1), 3); // alt2
    }
}
