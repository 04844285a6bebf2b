use crate::errors::{
    IdMetricsError,
    Result,
};
use crate::models::classification::DataClass;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The nine datasets produced by one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricKind {
    DeltaMass,
    PeptidesPerProtein,
    MissedCleavages,
    PrecursorCharge,
    PrecursorMass,
    AverageSpectrum,
    PeaksPerSpectrum,
    PeakIntensity,
    Quantitation,
}

impl MetricKind {
    pub const MEMBERS: [MetricKind; 9] = [
        MetricKind::DeltaMass,
        MetricKind::PeptidesPerProtein,
        MetricKind::MissedCleavages,
        MetricKind::PrecursorCharge,
        MetricKind::PrecursorMass,
        MetricKind::AverageSpectrum,
        MetricKind::PeaksPerSpectrum,
        MetricKind::PeakIntensity,
        MetricKind::Quantitation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::DeltaMass => "Delta m/z",
            MetricKind::PeptidesPerProtein => "Peptides per Protein",
            MetricKind::MissedCleavages => "Missed Tryptic Cleavages",
            MetricKind::PrecursorCharge => "Precursor Ion Charge",
            MetricKind::PrecursorMass => "Precursor Ion Masses",
            MetricKind::AverageSpectrum => "Average MS/MS Spectrum",
            MetricKind::PeaksPerSpectrum => "Peaks per MS/MS Spectrum",
            MetricKind::PeakIntensity => "Peak Intensity Distribution",
            MetricKind::Quantitation => "Peptide Quantitation Distribution",
        }
    }
}

/// A single classified scalar observation.
///
/// Exactly one of the two keys matters per accumulator variant: the
/// classification for taxonomy-keyed histograms, the category label for
/// study-variable histograms. Category observations keep the `AllSpectra`
/// class so they stay valid for either variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    value: f64,
    class: DataClass,
    category: Option<Arc<str>>,
}

impl Observation {
    pub fn new(value: f64, class: DataClass) -> Self {
        Self {
            value,
            class,
            category: None,
        }
    }

    pub fn with_category(value: f64, category: impl Into<Arc<str>>) -> Self {
        Self {
            value,
            class: DataClass::AllSpectra,
            category: Some(category.into()),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn class(&self) -> DataClass {
        self.class
    }

    pub fn category(&self) -> Option<&Arc<str>> {
        self.category.as_ref()
    }
}

impl PartialOrd for Observation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

/// Minimum and maximum value over a collection of observations.
pub fn value_bounds(values: &[Observation]) -> Option<(f64, f64)> {
    let mut iter = values.iter().map(Observation::value);
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some((min, max))
}

/// A finished domain/range dataset: two equal-length ordered sequences of
/// `(x, classified y)` pairs plus the default display class.
#[derive(Debug, Clone, Serialize)]
pub struct XySeries {
    domain: Vec<f64>,
    range: Vec<Observation>,
    reference: DataClass,
}

impl XySeries {
    pub fn new(domain: Vec<f64>, range: Vec<Observation>, reference: DataClass) -> Result<Self> {
        if domain.len() != range.len() {
            return Err(IdMetricsError::invalid_argument(format!(
                "domain length {} does not match range length {}",
                domain.len(),
                range.len()
            )));
        }
        Ok(Self {
            domain,
            range,
            reference,
        })
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn range(&self) -> &[Observation] {
        &self.range
    }

    pub fn reference(&self) -> DataClass {
        self.reference
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    /// The `(x, y)` pairs belonging to one classification series.
    pub fn class_values(&self, class: DataClass) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.domain
            .iter()
            .zip(self.range.iter())
            .filter(move |(_, obs)| obs.class() == class)
            .map(|(x, obs)| (*x, obs.value()))
    }

    /// The `(x, y)` pairs belonging to one category series.
    pub fn category_values<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = (f64, f64)> + 'a {
        self.domain
            .iter()
            .zip(self.range.iter())
            .filter(move |(_, obs)| obs.category().is_some_and(|c| c.as_ref() == category))
            .map(|(x, obs)| (*x, obs.value()))
    }
}

/// Per-class visibility flags handed to the rendering layer.
///
/// A freshly built option set shows the reference class and hides its
/// children; `select` is the single-select toggle that hides the siblings of
/// the newly chosen class.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesOptions {
    visible: BTreeMap<DataClass, bool>,
}

impl SeriesOptions {
    pub fn new(present: impl IntoIterator<Item = DataClass>, reference: DataClass) -> Self {
        let mut visible: BTreeMap<DataClass, bool> =
            present.into_iter().map(|c| (c, true)).collect();
        for child in reference.children() {
            visible.insert(*child, false);
        }
        visible.insert(reference, true);
        Self { visible }
    }

    pub fn select(&mut self, class: DataClass) {
        for sibling in class.siblings() {
            if let Some(flag) = self.visible.get_mut(sibling) {
                *flag = false;
            }
        }
        self.visible.insert(class, true);
    }

    pub fn is_visible(&self, class: DataClass) -> bool {
        self.visible.get(&class).copied().unwrap_or(false)
    }

    pub fn classes(&self) -> impl Iterator<Item = DataClass> + '_ {
        self.visible.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_bounds() {
        let values = vec![
            Observation::new(3.0, DataClass::IdentifiedSpectra),
            Observation::new(-1.5, DataClass::IdentifiedSpectra),
            Observation::new(8.0, DataClass::UnidentifiedSpectra),
        ];
        assert_eq!(value_bounds(&values), Some((-1.5, 8.0)));
        assert_eq!(value_bounds(&[]), None);
    }

    #[test]
    fn test_xy_series_length_mismatch() {
        let result = XySeries::new(
            vec![1.0, 2.0],
            vec![Observation::new(0.5, DataClass::IdentifiedSpectra)],
            DataClass::IdentifiedSpectra,
        );
        assert!(matches!(
            result,
            Err(IdMetricsError::Histogram(
                crate::errors::HistogramError::InvalidArgument { .. }
            ))
        ));
    }

    #[test]
    fn test_xy_series_class_filter() {
        let series = XySeries::new(
            vec![1.0, 1.0, 2.0],
            vec![
                Observation::new(0.5, DataClass::IdentifiedSpectra),
                Observation::new(0.1, DataClass::IdentifiedDecoy),
                Observation::new(0.9, DataClass::IdentifiedSpectra),
            ],
            DataClass::IdentifiedSpectra,
        )
        .unwrap();
        let identified: Vec<(f64, f64)> =
            series.class_values(DataClass::IdentifiedSpectra).collect();
        assert_eq!(identified, vec![(1.0, 0.5), (2.0, 0.9)]);
    }

    #[test]
    fn test_series_options_hide_children_of_reference() {
        let options = SeriesOptions::new(
            [
                DataClass::IdentifiedSpectra,
                DataClass::IdentifiedTarget,
                DataClass::IdentifiedDecoy,
            ],
            DataClass::IdentifiedSpectra,
        );
        assert!(options.is_visible(DataClass::IdentifiedSpectra));
        assert!(!options.is_visible(DataClass::IdentifiedTarget));
        assert!(!options.is_visible(DataClass::IdentifiedDecoy));
    }

    #[test]
    fn test_series_options_exclusive_select() {
        let mut options = SeriesOptions::new(
            [
                DataClass::IdentifiedSpectra,
                DataClass::IdentifiedTarget,
                DataClass::IdentifiedDecoy,
            ],
            DataClass::IdentifiedSpectra,
        );
        options.select(DataClass::IdentifiedTarget);
        assert!(options.is_visible(DataClass::IdentifiedTarget));
        assert!(!options.is_visible(DataClass::IdentifiedDecoy));
    }
}
