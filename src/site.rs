//! C2: SiteRecord — lazily-decoded in-memory model of one variant site
//! (§4.2).
//!
//! A record is constructed from the two blobs the wire format (§6.1) hands
//! over (`shared`, up to and including INFO; `indiv`, the FORMAT columns)
//! and decoded on demand, one level of the `{STR, FLT, INFO, FMT}` bitmask
//! at a time. Calling `unpack` again with a subset of already-decoded bits
//! is a no-op; calling it with new bits decodes only what's missing.

use crate::codec;
use crate::codec::TypeKind;
use crate::error::{BgtError, Result};
use crate::types::{DictId, Header, TypedVec};
use std::rc::Rc;

pub const UN_STR: u8 = 1;
pub const UN_FLT: u8 = 2;
pub const UN_INFO: u8 = 4;
pub const UN_FMT: u8 = 8;
pub const UN_SHR: u8 = UN_STR | UN_FLT | UN_INFO;
pub const UN_ALL: u8 = UN_SHR | UN_FMT;

/// One FORMAT column: a dictionary id, an element type/count-per-sample,
/// and the raw fixed-width per-sample payload (§4.2 "individual-blob
/// layout").
#[derive(Debug, Clone, PartialEq)]
pub struct FormatColumn {
    pub dict_id: DictId,
    pub elem_type: TypeKind,
    pub count_per_sample: usize,
    pub data: Vec<u8>,
}

impl FormatColumn {
    fn elem_size(&self) -> usize {
        match self.elem_type {
            TypeKind::Missing => 0,
            TypeKind::Int8 | TypeKind::Char => 1,
            TypeKind::Int16 => 2,
            TypeKind::Int32 | TypeKind::Float32 => 4,
        }
    }

    pub fn sample_value(&self, sample: usize) -> TypedVec {
        let k = self.count_per_sample;
        let es = self.elem_size();
        let start = sample * k * es;
        let bytes = &self.data[start..start + k * es];
        match self.elem_type {
            TypeKind::Int8 => TypedVec::Int32(bytes.iter().map(|&b| b as i8 as i32).collect()),
            TypeKind::Int16 => TypedVec::Int32(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]) as i32)
                    .collect(),
            ),
            TypeKind::Int32 => TypedVec::Int32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            TypeKind::Float32 => TypedVec::Float32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            TypeKind::Char => TypedVec::String(bytes.to_vec()),
            TypeKind::Missing => TypedVec::Missing,
        }
    }

    pub fn from_i8_matrix(dict_id: DictId, n_sample: usize, per_sample: usize, values: &[i8]) -> Self {
        assert_eq!(values.len(), n_sample * per_sample);
        Self {
            dict_id,
            elem_type: TypeKind::Int8,
            count_per_sample: per_sample,
            data: values.iter().map(|&v| v as u8).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteRecord {
    header: Rc<Header>,
    shared: Vec<u8>,
    indiv: Vec<u8>,
    unpacked: u8,

    pub rid: i32,
    pub pos: i32,
    pub rlen: i32,
    pub qual: Option<f32>,
    n_info: u16,
    n_allele: u16,
    n_fmt: u8,
    n_sample: u32,
    id: Vec<u8>,
    alleles: Vec<Vec<u8>>,
    filters: Vec<DictId>,
    info: Vec<(DictId, TypedVec)>,
    fmt: Vec<FormatColumn>,

    shared_cursor: usize,
}

impl SiteRecord {
    pub fn from_bytes(shared: Vec<u8>, indiv: Vec<u8>, header: Rc<Header>) -> Self {
        Self {
            header,
            shared,
            indiv,
            unpacked: 0,
            rid: 0,
            pos: 0,
            rlen: 0,
            qual: None,
            n_info: 0,
            n_allele: 0,
            n_fmt: 0,
            n_sample: 0,
            id: Vec::new(),
            alleles: Vec::new(),
            filters: Vec::new(),
            info: Vec::new(),
            fmt: Vec::new(),
            shared_cursor: 0,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decode through level `mask`. The levels are a sequential cursor walk
    /// over the shared blob (STR, then FLT, then INFO, then FMT), so
    /// requesting a level implies every lower level too, whether or not its
    /// bit is set in `mask`: the highest requested bit determines how far
    /// to walk. Idempotent: bits already decoded are skipped.
    pub fn unpack(&mut self, mask: u8) -> Result<()> {
        let mask = if mask & UN_FMT != 0 {
            UN_ALL
        } else if mask & UN_INFO != 0 {
            UN_SHR
        } else if mask & UN_FLT != 0 {
            UN_STR | UN_FLT
        } else {
            mask & UN_STR
        };
        if mask & UN_STR != 0 && self.unpacked & UN_STR == 0 {
            self.unpack_str()?;
            self.unpacked |= UN_STR;
        }
        if mask & UN_FLT != 0 && self.unpacked & UN_FLT == 0 {
            self.unpack_flt()?;
            self.unpacked |= UN_FLT;
        }
        if mask & UN_INFO != 0 && self.unpacked & UN_INFO == 0 {
            self.unpack_info()?;
            self.unpacked |= UN_INFO;
        }
        if mask & UN_FMT != 0 && self.unpacked & UN_FMT == 0 {
            self.unpack_fmt()?;
            self.unpacked |= UN_FMT;
        }
        Ok(())
    }

    fn need_bytes(&self, at: usize, n: usize) -> Result<()> {
        if self.shared.len() < at + n {
            Err(BgtError::Truncated {
                offset: at,
                expected: at + n - self.shared.len(),
            })
        } else {
            Ok(())
        }
    }

    fn unpack_str(&mut self) -> Result<()> {
        let mut cur = 0usize;
        self.need_bytes(cur, 4 * 3 + 4 + 2 + 2 + 1 + 3)?;
        self.rid = read_i32(&self.shared, &mut cur);
        self.pos = read_i32(&self.shared, &mut cur);
        self.rlen = read_i32(&self.shared, &mut cur);
        let qual_bits = read_i32(&self.shared, &mut cur);
        let qual = f32::from_bits(qual_bits as u32);
        self.qual = if qual.is_nan() { None } else { Some(qual) };
        self.n_info = read_u16(&self.shared, &mut cur);
        self.n_allele = read_u16(&self.shared, &mut cur);
        self.n_fmt = self.shared[cur];
        cur += 1;
        self.n_sample = read_u24(&self.shared, &mut cur);

        let (id, consumed) = codec::decode_typed_string(&self.shared[cur..])?;
        self.id = id;
        cur += consumed;

        self.alleles.clear();
        for _ in 0..self.n_allele {
            let (allele, consumed) = codec::decode_typed_string(&self.shared[cur..])?;
            self.alleles.push(allele);
            cur += consumed;
        }
        self.shared_cursor = cur;
        Ok(())
    }

    fn unpack_flt(&mut self) -> Result<()> {
        let cur = self.shared_cursor;
        let (filters, consumed) = codec::decode_typed_int_vec(&self.shared[cur..])?;
        self.filters = filters.into_iter().map(|v| v as usize).collect();
        self.shared_cursor = cur + consumed;
        Ok(())
    }

    fn unpack_info(&mut self) -> Result<()> {
        let mut cur = self.shared_cursor;
        self.info.clear();
        for _ in 0..self.n_info {
            let (dict_id, consumed) = codec::decode_typed_integer(&self.shared[cur..])?;
            cur += consumed;
            let (value, consumed) = decode_typed_vec(&self.shared[cur..])?;
            cur += consumed;
            self.info.push((dict_id as usize, value));
        }
        self.shared_cursor = cur;
        Ok(())
    }

    fn unpack_fmt(&mut self) -> Result<()> {
        self.fmt.clear();
        if self.indiv.is_empty() {
            return Ok(());
        }
        let mut cur = 0usize;
        for _ in 0..self.n_fmt {
            let (dict_id, consumed) = codec::decode_typed_integer(&self.indiv[cur..])?;
            cur += consumed;
            let (n, kind, consumed) = codec::decode_size_header(&self.indiv[cur..])?;
            cur += consumed;
            let elem_size = match kind {
                TypeKind::Missing => 0,
                TypeKind::Int8 | TypeKind::Char => 1,
                TypeKind::Int16 => 2,
                TypeKind::Int32 | TypeKind::Float32 => 4,
            };
            let total = self.n_sample as usize * n * elem_size;
            if self.indiv.len() < cur + total {
                return Err(BgtError::Truncated {
                    offset: cur,
                    expected: cur + total - self.indiv.len(),
                });
            }
            let data = self.indiv[cur..cur + total].to_vec();
            cur += total;
            self.fmt.push(FormatColumn {
                dict_id: dict_id as usize,
                elem_type: kind,
                count_per_sample: n,
                data,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn alleles(&self) -> &[Vec<u8>] {
        &self.alleles
    }

    pub fn set_alleles(&mut self, alleles: Vec<Vec<u8>>) {
        self.n_allele = alleles.len() as u16;
        self.alleles = alleles;
    }

    pub fn ref_allele(&self) -> &[u8] {
        &self.alleles[0]
    }

    pub fn alt_alleles(&self) -> &[Vec<u8>] {
        &self.alleles[1..]
    }

    pub fn n_allele(&self) -> usize {
        self.alleles.len()
    }

    pub fn filters(&self) -> &[DictId] {
        &self.filters
    }

    pub fn info(&self) -> &[(DictId, TypedVec)] {
        &self.info
    }

    pub fn info_by_id(&self, dict_id: DictId) -> Option<&TypedVec> {
        self.info.iter().find(|(id, _)| *id == dict_id).map(|(_, v)| v)
    }

    pub fn info_by_tag(&self, tag: &str) -> Option<&TypedVec> {
        let id = self.header.dict_idx(tag)?;
        self.info_by_id(id)
    }

    pub fn push_info(&mut self, dict_id: DictId, value: TypedVec) {
        self.info.push((dict_id, value));
        self.n_info = self.info.len() as u16;
    }

    pub fn fmt(&self) -> &[FormatColumn] {
        &self.fmt
    }

    pub fn set_fmt(&mut self, fmt: Vec<FormatColumn>) {
        self.n_fmt = fmt.len() as u8;
        self.fmt = fmt;
    }

    pub fn fmt_by_tag(&self, tag: &str) -> Option<&FormatColumn> {
        let id = self.header.dict_idx(tag)?;
        self.fmt.iter().find(|c| c.dict_id == id)
    }

    pub fn is_symbolic_allele(allele: &[u8]) -> bool {
        allele.first() == Some(&b'<') && allele.last() == Some(&b'>')
    }

    /// Sort key for ordered comparisons across the merge (§4.6): `(rid, pos,
    /// rlen, REF, ALT[0])`.
    pub fn sort_key(&self) -> (i32, i32, i32, &[u8], &[u8]) {
        let alt0: &[u8] = if self.alleles.len() > 1 { &self.alleles[1] } else { &[] };
        (self.rid, self.pos, self.rlen, self.ref_allele(), alt0)
    }

    /// `true` when this site compares equal to `other` by the site key used
    /// in the merge: position and REF identical (ALTs may differ).
    pub fn site_equal(&self, other: &SiteRecord) -> bool {
        self.rid == other.rid && self.pos == other.pos && self.ref_allele() == other.ref_allele()
    }
}

fn read_i32(buf: &[u8], cur: &mut usize) -> i32 {
    let v = i32::from_le_bytes([buf[*cur], buf[*cur + 1], buf[*cur + 2], buf[*cur + 3]]);
    *cur += 4;
    v
}

fn read_u16(buf: &[u8], cur: &mut usize) -> u16 {
    let v = u16::from_le_bytes([buf[*cur], buf[*cur + 1]]);
    *cur += 2;
    v
}

fn read_u24(buf: &[u8], cur: &mut usize) -> u32 {
    let v = u32::from_le_bytes([buf[*cur], buf[*cur + 1], buf[*cur + 2], 0]);
    *cur += 3;
    v
}

fn decode_typed_vec(buf: &[u8]) -> Result<(TypedVec, usize)> {
    let (n, kind, header_len) = codec::decode_size_header(buf)?;
    match kind {
        TypeKind::Missing => Ok((TypedVec::Missing, header_len)),
        TypeKind::Char => {
            if buf.len() < header_len + n {
                return Err(BgtError::Truncated {
                    offset: header_len,
                    expected: header_len + n - buf.len(),
                });
            }
            Ok((
                TypedVec::String(buf[header_len..header_len + n].to_vec()),
                header_len + n,
            ))
        }
        TypeKind::Int8 | TypeKind::Int16 | TypeKind::Int32 => {
            let (ints, consumed) = codec::decode_typed_int_vec(buf)?;
            Ok((TypedVec::Int32(ints), consumed))
        }
        TypeKind::Float32 => {
            let elem = 4usize;
            if buf.len() < header_len + n * elem {
                return Err(BgtError::Truncated {
                    offset: header_len,
                    expected: header_len + n * elem - buf.len(),
                });
            }
            let payload = &buf[header_len..];
            let floats = (0..n)
                .map(|i| {
                    f32::from_le_bytes([
                        payload[i * 4],
                        payload[i * 4 + 1],
                        payload[i * 4 + 2],
                        payload[i * 4 + 3],
                    ])
                })
                .collect();
            Ok((TypedVec::Float32(floats), header_len + n * elem))
        }
    }
}

/// Encodes one [`TypedVec`] the way `unpack_info`/`decode_typed_vec` expect
/// to read it back. Used by test fixtures and by the merge's INFO
/// construction.
pub fn encode_typed_vec(out: &mut Vec<u8>, value: &TypedVec) {
    match value {
        TypedVec::Missing => codec::encode_size_header(out, 0, TypeKind::Missing),
        TypedVec::Flag => codec::encode_size_header(out, 0, TypeKind::Missing),
        TypedVec::String(s) => codec::encode_typed_string(out, s),
        TypedVec::Int32(v) => {
            let kind = narrowest_int_kind(v);
            codec::encode_size_header(out, v.len(), kind);
            for &x in v {
                match kind {
                    TypeKind::Int8 => out.push(x as i8 as u8),
                    TypeKind::Int16 => out.extend_from_slice(&(x as i16).to_le_bytes()),
                    _ => out.extend_from_slice(&x.to_le_bytes()),
                }
            }
        }
        TypedVec::Float32(v) => {
            codec::encode_size_header(out, v.len(), TypeKind::Float32);
            for &x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
    }
}

fn narrowest_int_kind(v: &[i32]) -> TypeKind {
    if v.iter().all(|&x| x <= i32::from(i8::MAX) && x > i32::from(i8::MIN)) {
        TypeKind::Int8
    } else if v.iter().all(|&x| x <= i32::from(i16::MAX) && x > i32::from(i16::MIN)) {
        TypeKind::Int16
    } else {
        TypeKind::Int32
    }
}

/// Builds the `shared` blob for a freshly-constructed site (used by tests
/// and by fixture encoders — the engine itself never writes `.bcf` files).
pub fn encode_shared_blob(
    rid: i32,
    pos: i32,
    rlen: i32,
    qual: Option<f32>,
    n_sample: u32,
    id: &[u8],
    alleles: &[Vec<u8>],
    filters: &[DictId],
    info: &[(DictId, TypedVec)],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&rid.to_le_bytes());
    out.extend_from_slice(&pos.to_le_bytes());
    out.extend_from_slice(&rlen.to_le_bytes());
    let qual_bits = qual.unwrap_or(f32::NAN).to_bits();
    out.extend_from_slice(&qual_bits.to_le_bytes());
    out.extend_from_slice(&(info.len() as u16).to_le_bytes());
    out.extend_from_slice(&(alleles.len() as u16).to_le_bytes());
    out.push(0); // n_fmt, filled separately in the indiv blob
    let sample_bytes = n_sample.to_le_bytes();
    out.extend_from_slice(&sample_bytes[0..3]);
    codec::encode_typed_string(&mut out, id);
    for allele in alleles {
        codec::encode_typed_string(&mut out, allele);
    }
    let filter_kind = narrowest_int_kind(&filters.iter().map(|&f| f as i32).collect::<Vec<_>>());
    if filters.is_empty() {
        codec::encode_size_header(&mut out, 0, TypeKind::Missing);
    } else {
        codec::encode_size_header(&mut out, filters.len(), filter_kind);
        for &f in filters {
            match filter_kind {
                TypeKind::Int8 => out.push(f as i8 as u8),
                TypeKind::Int16 => out.extend_from_slice(&(f as i16).to_le_bytes()),
                _ => out.extend_from_slice(&(f as i32).to_le_bytes()),
            }
        }
    }
    for (dict_id, value) in info {
        codec::encode_single_integer(&mut out, *dict_id as i64);
        encode_typed_vec(&mut out, value);
    }
    out
}

pub fn encode_indiv_blob(fmt: &[FormatColumn]) -> Vec<u8> {
    let mut out = Vec::new();
    for col in fmt {
        codec::encode_single_integer(&mut out, col.dict_id as i64);
        codec::encode_size_header(&mut out, col.count_per_sample, col.elem_type);
        out.extend_from_slice(&col.data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Header;

    fn sample_record() -> SiteRecord {
        let header = Rc::new(Header::new());
        let info = vec![(0usize, TypedVec::Int32(vec![42]))];
        let shared = encode_shared_blob(
            0,
            99,
            1,
            Some(30.0),
            0,
            b".",
            &[b"A".to_vec(), b"T".to_vec()],
            &[],
            &info,
        );
        SiteRecord::from_bytes(shared, Vec::new(), header)
    }

    #[test]
    fn lazy_unpack_is_idempotent() {
        let mut a = sample_record();
        let mut b = sample_record();
        a.unpack(UN_STR).unwrap();
        a.unpack(UN_INFO).unwrap();
        b.unpack(UN_STR | UN_INFO).unwrap();
        assert_eq!(a.pos, b.pos);
        assert_eq!(a.alleles(), b.alleles());
        assert_eq!(a.info(), b.info());
    }

    #[test]
    fn repeated_unpack_is_a_no_op() {
        let mut rec = sample_record();
        rec.unpack(UN_STR).unwrap();
        let pos_before = rec.pos;
        rec.unpack(UN_STR).unwrap();
        assert_eq!(rec.pos, pos_before);
    }

    #[test]
    fn decodes_fields_in_shared_blob() {
        let mut rec = sample_record();
        rec.unpack(UN_ALL).unwrap();
        assert_eq!(rec.pos, 99);
        assert_eq!(rec.ref_allele(), b"A");
        assert_eq!(rec.alt_alleles()[0], b"T");
        assert_eq!(rec.qual, Some(30.0));
        assert_eq!(rec.info()[0].1.as_ints(), Some(&[42][..]));
    }
}
