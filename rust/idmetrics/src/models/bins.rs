use crate::errors::{
    HistogramError,
    Result,
};
use crate::models::dataset::Observation;
use serde::Serialize;
use std::cmp::Ordering;

/// A half-open numeric interval `[start, end)` used to bucket observations.
///
/// Bins are values: immutable after construction, totally ordered by
/// `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    start: f64,
    end: f64,
}

impl HistogramBin {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(end > start) || !start.is_finite() {
            return Err(HistogramError::InvalidBin { start, end }.into());
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value < self.end
    }
}

impl Eq for HistogramBin {}

impl PartialOrd for HistogramBin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HistogramBin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.end.total_cmp(&other.end))
    }
}

/// A sorted collection of non-overlapping bins.
///
/// Appends must arrive in ascending start order; an append whose start falls
/// before the current last bin's end fails, so the sorted/non-overlapping
/// invariant holds by construction. Contiguity is conventional, not required.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BinSet {
    bins: Vec<HistogramBin>,
}

impl BinSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, bin: HistogramBin) -> Result<()> {
        if let Some(last) = self.bins.last() {
            if bin.start() < last.end() {
                return Err(HistogramError::OverlappingBin {
                    last_end: last.end(),
                    appended_start: bin.start(),
                }
                .into());
            }
        }
        self.bins.push(bin);
        Ok(())
    }

    pub fn append_all(&mut self, bins: impl IntoIterator<Item = HistogramBin>) -> Result<()> {
        for bin in bins {
            self.append(bin)?;
        }
        Ok(())
    }

    pub fn bins(&self) -> &[HistogramBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn first(&self) -> Option<&HistogramBin> {
        self.bins.first()
    }

    pub fn last(&self) -> Option<&HistogramBin> {
        self.bins.last()
    }

    pub fn span_start(&self) -> Option<f64> {
        self.first().map(HistogramBin::start)
    }

    pub fn span_end(&self) -> Option<f64> {
        self.last().map(HistogramBin::end)
    }

    /// The first bin's width, the reference width for uniform bin sets.
    pub fn bin_width(&self) -> Option<f64> {
        self.first().map(HistogramBin::width)
    }

    /// Index of the first bin containing `value`. Linear scan; bin counts
    /// stay small (a few hundred at most).
    pub fn locate(&self, value: f64) -> Option<usize> {
        self.bins.iter().position(|bin| bin.contains(value))
    }

    /// Like `locate`, but folds values below the first bin into the first
    /// bin and values at/above the last bin's end into the last bin.
    pub fn locate_folded(&self, value: f64) -> Option<usize> {
        let first = self.first()?;
        if value < first.start() {
            return Some(0);
        }
        if let Some(last) = self.last() {
            if value >= last.end() {
                return Some(self.bins.len() - 1);
            }
        }
        self.locate(value)
    }
}

/// `count` contiguous bins of exact `width`, the first starting at `start`.
pub fn fixed_width_bins(start: f64, width: f64, count: usize) -> Result<Vec<HistogramBin>> {
    if width <= 0.0 || !width.is_finite() {
        return Err(HistogramError::InvalidArgument {
            context: format!("bin width must be greater than 0, got {}", width),
        }
        .into());
    }
    let mut bins = Vec::with_capacity(count);
    let mut lower = start;
    for _ in 0..count {
        let upper = lower + width;
        bins.push(HistogramBin::new(lower, upper)?);
        lower = upper;
    }
    Ok(bins)
}

/// Maximum observed value truncated to integer magnitude. The truncation is
/// part of the binning contract: bin spans snap to whole units.
fn truncated_max(values: &[Observation]) -> Option<f64> {
    values
        .iter()
        .map(|obs| obs.value() as i64)
        .max()
        .map(|max| max as f64)
}

/// Fixed-width bins covering the observed data range: the bin count is
/// derived as `ceil((max - start) / width)`. Empty input yields no bins.
pub fn data_range_bins(
    start: f64,
    width: f64,
    values: &[Observation],
) -> Result<Vec<HistogramBin>> {
    if width <= 0.0 || !width.is_finite() {
        return Err(HistogramError::InvalidArgument {
            context: format!("bin width must be greater than 0, got {}", width),
        }
        .into());
    }
    let Some(end) = truncated_max(values) else {
        return Ok(Vec::new());
    };
    let count = ((end - start) / width).ceil().max(0.0) as usize;
    fixed_width_bins(start, width, count)
}

/// Exactly `count` bins whose common width is `ceil((max - start) / count)`
/// rounded up to the next multiple of `granularity` (an exact multiple is
/// left unchanged, and the width never drops below one granularity quantum).
/// Empty input yields no bins.
pub fn granularity_bins(
    start: f64,
    count: usize,
    granularity: u64,
    values: &[Observation],
) -> Result<Vec<HistogramBin>> {
    if count == 0 {
        return Err(HistogramError::InvalidArgument {
            context: "bin count must be greater than 0".to_string(),
        }
        .into());
    }
    if granularity == 0 {
        return Err(HistogramError::InvalidArgument {
            context: "granularity must be greater than 0".to_string(),
        }
        .into());
    }
    let Some(end) = truncated_max(values) else {
        return Ok(Vec::new());
    };
    let raw = ((end - start) / count as f64).ceil().max(0.0) as u64;
    let width = if raw % granularity == 0 {
        raw
    } else {
        (raw / granularity + 1) * granularity
    };
    let width = width.max(granularity);
    fixed_width_bins(start, width as f64, count)
}
