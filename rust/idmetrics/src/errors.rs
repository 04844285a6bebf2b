use serde::Serialize;
use std::fmt::Display;

/// Structural errors raised by the bin model and the histogram accumulators.
///
/// These abort only the call that raised them, never a whole pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum HistogramError {
    /// A bin was constructed with `end <= start` (or a non-finite bound).
    InvalidBin { start: f64, end: f64 },
    /// Bad bin-generation parameters or a width-uniformity violation.
    InvalidArgument { context: String },
    /// An appended bin starts before the current last bin ends.
    OverlappingBin { last_end: f64, appended_start: f64 },
}

impl Display for HistogramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdMetricsError {
    Histogram(HistogramError),
    ClassificationNotFound { title: String },
}

impl Display for IdMetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl IdMetricsError {
    pub fn invalid_argument(context: impl Display) -> Self {
        Self::Histogram(HistogramError::InvalidArgument {
            context: context.to_string(),
        })
    }
}

impl From<HistogramError> for IdMetricsError {
    fn from(e: HistogramError) -> Self {
        IdMetricsError::Histogram(e)
    }
}

pub type Result<T> = std::result::Result<T, IdMetricsError>;

/// Per-metric precondition failures.
///
/// These are never raised as errors; the pipeline records them against the
/// metric's slot in the report and keeps going, so a sparse input (no decoy
/// annotations, no MS2 spectra ...) does not suppress the unrelated metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricError {
    NoPeptide,
    NoSpectra,
    NoTandemSpectra,
    NoPrecursorCharge,
    NoPrecursorMass,
    NoProteinQuantitation,
}

impl Display for MetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPeptide => write!(f, "No peptides found in the record source"),
            Self::NoSpectra => write!(f, "No spectra found in the record source"),
            Self::NoTandemSpectra => write!(f, "No MS2 spectra found in the record source"),
            Self::NoPrecursorCharge => write!(f, "No plausible precursor charge found"),
            Self::NoPrecursorMass => write!(f, "No positive precursor mass found"),
            Self::NoProteinQuantitation => {
                write!(f, "No quantitation values found in the record source")
            }
        }
    }
}
