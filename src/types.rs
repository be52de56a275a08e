//! Header model: the three string dictionaries (§3 "Header") plus the typed
//! value representation shared by INFO and FORMAT columns.

use crate::codec::TypeKind;
use getset::Getters;
use indexmap::IndexMap;
use std::collections::HashMap;

pub type DictId = usize;

pub const MISSING_QUAL: f32 = f32::NAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LogicalColumn {
    Filter,
    Info,
    Format,
}

/// Length class of a dictionary entry's value, per the VCF `Number=` axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    Fixed(usize),
    Variable,
    PerAlt,
    PerGenotype,
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct HeaderDictEntry {
    id: String,
    idx: DictId,
    column: LogicalColumn,
    value_type: TypeKind,
    length_class: LengthClass,
}

impl HeaderDictEntry {
    pub fn new(
        id: impl Into<String>,
        idx: DictId,
        column: LogicalColumn,
        value_type: TypeKind,
        length_class: LengthClass,
    ) -> Self {
        Self {
            id: id.into(),
            idx,
            column,
            value_type,
            length_class,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContigMeta {
    pub length: u32,
}

/// One variant-typed value, shared by INFO values and per-sample FORMAT
/// columns (§9 "Dynamic INFO/FORMAT values").
#[derive(Debug, Clone, PartialEq)]
pub enum TypedVec {
    Missing,
    Flag,
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    /// Raw character bytes; VCF-style comma-joined when representing a
    /// multi-valued string field.
    String(Vec<u8>),
}

impl TypedVec {
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            TypedVec::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            TypedVec::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            TypedVec::String(v) => Some(v),
            _ => None,
        }
    }
}

/// The three header dictionaries (§3 "Header") plus the sample list.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// FILTER/INFO/FORMAT ids, keyed by their textual id.
    pub dict: IndexMap<String, HeaderDictEntry>,
    pub contigs: IndexMap<String, ContigMeta>,
    pub samples: Vec<String>,
    sample_index: HashMap<String, usize>,
    /// Free-form header metadata lines (`##...`) preserved verbatim, in
    /// declaration order, for rebuilding the textual preamble.
    pub meta_lines: Vec<String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dict_entry(&mut self, entry: HeaderDictEntry) {
        self.dict.insert(entry.id().clone(), entry);
    }

    pub fn add_contig(&mut self, id: impl Into<String>, length: u32) {
        self.contigs.insert(id.into(), ContigMeta { length });
    }

    pub fn set_samples(&mut self, samples: Vec<String>) {
        self.sample_index = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        self.samples = samples;
    }

    pub fn sample_idx(&self, name: &str) -> Option<usize> {
        self.sample_index.get(name).copied()
    }

    pub fn contig_idx(&self, id: &str) -> Option<usize> {
        self.contigs.get_index_of(id)
    }

    pub fn contig_name(&self, rid: u32) -> Option<&str> {
        self.contigs.get_index(rid as usize).map(|(k, _)| k.as_str())
    }

    pub fn dict_idx(&self, id: &str) -> Option<DictId> {
        self.dict.get(id).map(|e| *e.idx())
    }

    /// Same contig dictionary, by id and length, in the same order — the
    /// check `MergedReader::new` requires before merging (§9 "Header
    /// equality").
    pub fn contigs_match(&self, other: &Header) -> bool {
        self.contigs.len() == other.contigs.len()
            && self
                .contigs
                .iter()
                .zip(other.contigs.iter())
                .all(|((a_id, a_meta), (b_id, b_meta))| {
                    a_id == b_id && a_meta.length == b_meta.length
                })
    }
}
