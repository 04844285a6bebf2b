//! The seam between the aggregation pipeline and whatever component owns
//! the identification results.
//!
//! The pipeline never parses files: callers materialize their records into
//! these plain structs and hand the pipeline anything implementing
//! [`RecordSource`]. Tests use a small in-memory implementation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SpectrumId = u64;

/// A named quantitation channel reported by the record source.
#[derive(Debug, Clone, Serialize)]
pub struct StudyVariable {
    pub id: Arc<str>,
    pub description: Arc<str>,
}

/// Per-peptide quantitation scores, keyed by study-variable id. A missing
/// score is represented as `None` and skipped during accumulation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuantPeptideRecord {
    pub study_scores: BTreeMap<Arc<str>, Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeptideRecord {
    pub sequence: Arc<str>,
    pub precursor_mz: Option<f64>,
    pub precursor_charge: Option<i32>,
    /// Monoisotopic mass deltas of the attached modifications.
    pub modification_masses: Vec<f64>,
    /// `None` when the source reports no decoy information.
    pub decoy: Option<bool>,
    /// The spectrum this identification came from, when known.
    pub spectrum_id: Option<SpectrumId>,
}

impl PeptideRecord {
    pub fn new(sequence: impl Into<Arc<str>>) -> Self {
        Self {
            sequence: sequence.into(),
            precursor_mz: None,
            precursor_charge: None,
            modification_masses: Vec::new(),
            decoy: None,
            spectrum_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProteinRecord {
    pub accession: Arc<str>,
    pub peptides: Vec<PeptideRecord>,
    pub quant_peptides: Vec<QuantPeptideRecord>,
}

impl ProteinRecord {
    pub fn new(accession: impl Into<Arc<str>>, peptides: Vec<PeptideRecord>) -> Self {
        Self {
            accession: accession.into(),
            peptides,
            quant_peptides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpectrumRecord {
    pub id: SpectrumId,
    pub ms_level: u8,
    /// Instrument-reported precursor metadata, used when the spectrum has
    /// no identification attached.
    pub precursor_mz: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub peaks_mz: Vec<f64>,
    pub peaks_intensity: Vec<f64>,
}

impl SpectrumRecord {
    pub fn new(id: SpectrumId, ms_level: u8) -> Self {
        Self {
            id,
            ms_level,
            precursor_mz: None,
            precursor_charge: None,
            peaks_mz: Vec::new(),
            peaks_intensity: Vec::new(),
        }
    }
}

/// Abstract capability set the pipeline consumes. One traversal per run;
/// the record set is expected to be fully materialized.
pub trait RecordSource {
    fn proteins(&self) -> &[ProteinRecord];

    fn spectra(&self) -> &[SpectrumRecord];

    fn has_decoy_information(&self) -> bool;

    fn has_quantitation(&self) -> bool;

    fn study_variables(&self) -> &[StudyVariable];
}

/// Protein pre-filter applied before accumulation. Closures over the
/// accession string implement this directly.
pub trait AccessionFilter {
    fn accept(&self, accession: &str) -> bool;
}

impl<F> AccessionFilter for F
where
    F: Fn(&str) -> bool,
{
    fn accept(&self, accession: &str) -> bool {
        self(accession)
    }
}
