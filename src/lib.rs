//! Genotype-query engine: allele atomization, per-file site/genotype
//! readback, and k-way synchronized merge across files.

pub mod allele;
pub mod atomize;
pub mod codec;
pub mod collaborators;
pub mod error;
pub mod genotype;
pub mod merge;
pub mod reader;
pub mod site;
pub mod types;
