//! External interfaces (§6): the index, the sample-metadata table and its
//! expression evaluator, and the interval-filter collaborator. Each is kept
//! to the narrow contract the core components actually call through —
//! `SingleFileReader`/`MergedReader` own a boxed collaborator and never
//! depend on its concrete storage.
//!
//! The expression grammar is parsed with `nom` combinators rather than a
//! hand-rolled tokenizer.

use crate::error::{BgtError, Result};
use crate::types::Header;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alphanumeric1, char, multispace0};
use nom::combinator::{map, recognize};
use nom::multi::{many1, separated_list1};
use nom::sequence::{delimited, preceded, separated_pair};
use nom::IResult;
use std::collections::HashMap;

/// §6.3: index over the record stream. `query` yields global row indices
/// lazily and matching the given region string; `seek` resolves a row index
/// to the byte offset the record stream should be positioned at.
pub trait Index {
    fn query<'a>(&'a self, region: &Region) -> Box<dyn Iterator<Item = u64> + 'a>;
    fn seek(&self, row: u64) -> Result<u64>;
    fn n_rows(&self) -> u64;
}

/// A parsed `chr[:start-end]` region, 0-based half-open, resolved against a
/// header's contig dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub rid: usize,
    pub start: i64,
    pub end: i64,
}

/// Parses `chr`, `chr:start-end`, or `chr:pos` (a 1-base point region),
/// 1-based and inclusive in the input per VCF/samtools convention.
pub fn parse_region(header: &Header, s: &str) -> Result<Region> {
    let (chr, range) = match s.split_once(':') {
        Some((c, r)) => (c, Some(r)),
        None => (s, None),
    };
    let rid = header
        .contig_idx(chr)
        .ok_or_else(|| BgtError::Collaborator(format!("unknown contig {:?}", chr)))?;
    let len = header
        .contigs
        .get_index(rid)
        .map(|(_, meta)| meta.length as i64)
        .ok_or_else(|| BgtError::Collaborator(format!("unknown contig {:?}", chr)))?;
    let (start, end) = match range {
        None => (0, len),
        Some(r) => match r.split_once('-') {
            Some((a, b)) => {
                let a: i64 = a
                    .parse()
                    .map_err(|_| BgtError::Collaborator(format!("bad region start {:?}", a)))?;
                let b: i64 = b
                    .parse()
                    .map_err(|_| BgtError::Collaborator(format!("bad region end {:?}", b)))?;
                (a - 1, b)
            }
            None => {
                let p: i64 = r
                    .parse()
                    .map_err(|_| BgtError::Collaborator(format!("bad region position {:?}", r)))?;
                (p - 1, p)
            }
        },
    };
    if start < 0 || end < start {
        return Err(BgtError::Collaborator(format!("invalid region {:?}", s)));
    }
    Ok(Region { rid, start, end })
}

/// Reference `Index` implementation: an in-memory `(rid, pos)` table, one
/// entry per row, linearly scanned. A production index would be a BAI/CSI
/// style interval tree with O(log rows) lookups; this is a correctness
/// fixture only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    /// `(rid, pos, rlen)` per row, in row order.
    rows: Vec<(usize, i64, i64)>,
}

impl InMemoryIndex {
    pub fn new(rows: Vec<(usize, i64, i64)>) -> Self {
        Self { rows }
    }
}

impl Index for InMemoryIndex {
    fn query<'a>(&'a self, region: &Region) -> Box<dyn Iterator<Item = u64> + 'a> {
        let region = *region;
        Box::new(self.rows.iter().enumerate().filter_map(move |(i, &(rid, pos, rlen))| {
            let overlaps = rid == region.rid && pos < region.end && region.start < pos + rlen;
            overlaps.then_some(i as u64)
        }))
    }

    fn seek(&self, row: u64) -> Result<u64> {
        if row >= self.rows.len() as u64 {
            return Err(BgtError::OutOfRange(format!("row {} out of range", row)));
        }
        Ok(row)
    }

    fn n_rows(&self) -> u64 {
        self.rows.len() as u64
    }
}

/// §6.5: interval-filter collaborator.
pub trait IntervalFilter {
    fn overlaps(&self, rid: usize, beg: i64, end: i64) -> bool;
}

/// Reference implementation: a flat, linearly-scanned interval list (e.g.
/// parsed from a BED file — parsing itself is out of scope).
#[derive(Debug, Clone, Default)]
pub struct IntervalListFilter {
    intervals: Vec<(usize, i64, i64)>,
}

impl IntervalListFilter {
    pub fn new(intervals: Vec<(usize, i64, i64)>) -> Self {
        Self { intervals }
    }
}

impl IntervalFilter for IntervalListFilter {
    fn overlaps(&self, rid: usize, beg: i64, end: i64) -> bool {
        self.intervals
            .iter()
            .any(|&(r, s, e)| r == rid && s < end && beg < e)
    }
}

/// §6.4: a boolean expression over sample-metadata attributes, evaluated per
/// sample row by a `SampleTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Eq(String, String),
    Ne(String, String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((alphanumeric1, tag("_"), tag(".")))))(input)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn term(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), term), |e| Expr::Not(Box::new(e))),
        delimited(ws(char('(')), expr, ws(char(')'))),
        map(
            separated_pair(ws(ident), ws(tag("!=")), ws(ident)),
            |(k, v)| Expr::Ne(k.to_string(), v.to_string()),
        ),
        map(
            separated_pair(ws(ident), ws(tag("==")), ws(ident)),
            |(k, v)| Expr::Eq(k.to_string(), v.to_string()),
        ),
    ))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(tag("&&")), term), |mut terms| {
        let mut e = terms.remove(0);
        for t in terms {
            e = Expr::And(Box::new(e), Box::new(t));
        }
        e
    })(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(tag("||")), and_expr), |mut terms| {
        let mut e = terms.remove(0);
        for t in terms {
            e = Expr::Or(Box::new(e), Box::new(t));
        }
        e
    })(input)
}

/// Compiles a sample-metadata expression (§6.7 "anything else is a
/// sample-metadata expression") into an [`Expr`].
pub fn compile(source: &str) -> Result<Expr> {
    let (rest, e) =
        expr(source).map_err(|e| BgtError::Collaborator(format!("bad expression: {}", e)))?;
    if !rest.trim().is_empty() {
        return Err(BgtError::Collaborator(format!(
            "trailing input in expression: {:?}",
            rest
        )));
    }
    Ok(e)
}

/// §6.4: row-oriented tagged-attribute store, addressable by sample name and
/// row index.
pub trait SampleTable {
    fn sample_row(&self, sample: &str) -> Option<usize>;
    fn row_count(&self) -> usize;
    fn eval(&self, row: usize, expr: &Expr) -> Result<bool>;
}

/// Reference `SampleTable`: an in-memory `key -> value` map per row.
#[derive(Debug, Clone, Default)]
pub struct InMemorySampleTable {
    sample_to_row: HashMap<String, usize>,
    rows: Vec<HashMap<String, String>>,
}

impl InMemorySampleTable {
    pub fn new(samples: &[String], rows: Vec<HashMap<String, String>>) -> Self {
        let sample_to_row = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { sample_to_row, rows }
    }

    fn eval_inner(&self, row: usize, expr: &Expr) -> Result<bool> {
        let attrs = self
            .rows
            .get(row)
            .ok_or_else(|| BgtError::Collaborator(format!("row {} out of range", row)))?;
        Ok(match expr {
            Expr::Eq(k, v) => attrs.get(k).map(|a| a == v).unwrap_or(false),
            Expr::Ne(k, v) => attrs.get(k).map(|a| a != v).unwrap_or(true),
            Expr::And(a, b) => self.eval_inner(row, a)? && self.eval_inner(row, b)?,
            Expr::Or(a, b) => self.eval_inner(row, a)? || self.eval_inner(row, b)?,
            Expr::Not(a) => !self.eval_inner(row, a)?,
        })
    }
}

impl SampleTable for InMemorySampleTable {
    fn sample_row(&self, sample: &str) -> Option<usize> {
        self.sample_to_row.get(sample).copied()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn eval(&self, row: usize, expr: &Expr) -> Result<bool> {
        self.eval_inner(row, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_range_and_point() {
        let mut h = Header::new();
        h.add_contig("chr1", 1000);
        let r = parse_region(&h, "chr1:101-200").unwrap();
        assert_eq!(r, Region { rid: 0, start: 100, end: 200 });
        let p = parse_region(&h, "chr1:101").unwrap();
        assert_eq!(p, Region { rid: 0, start: 100, end: 101 });
        let whole = parse_region(&h, "chr1").unwrap();
        assert_eq!(whole, Region { rid: 0, start: 0, end: 1000 });
    }

    #[test]
    fn region_unknown_contig_is_collaborator_error() {
        let h = Header::new();
        assert!(matches!(
            parse_region(&h, "chrX:1-2"),
            Err(BgtError::Collaborator(_))
        ));
    }

    #[test]
    fn index_query_filters_by_overlap() {
        let idx = InMemoryIndex::new(vec![(0, 10, 5), (0, 100, 5), (1, 10, 5)]);
        let region = Region { rid: 0, start: 0, end: 20 };
        let hits: Vec<u64> = idx.query(&region).collect();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn expression_and_or_not_evaluate() {
        let mut row = HashMap::new();
        row.insert("pop".to_string(), "CHB".to_string());
        row.insert("sex".to_string(), "M".to_string());
        let table = InMemorySampleTable::new(&["s1".to_string()], vec![row]);

        let e = compile("pop == CHB && sex != F").unwrap();
        assert!(table.eval(0, &e).unwrap());

        let e2 = compile("!(pop == CHS) || sex == F").unwrap();
        assert!(table.eval(0, &e2).unwrap());
    }

    #[test]
    fn interval_filter_overlap() {
        let f = IntervalListFilter::new(vec![(0, 100, 200)]);
        assert!(f.overlaps(0, 150, 160));
        assert!(!f.overlaps(0, 300, 400));
    }
}
