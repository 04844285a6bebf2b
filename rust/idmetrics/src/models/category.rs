use crate::errors::{
    HistogramError,
    Result,
};
use crate::models::bins::{
    BinSet,
    HistogramBin,
};
use crate::models::dataset::Observation;
use crate::models::histogram::FrequencyTable;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::{
    Arc,
    OnceLock,
};

/// Rounding used for the width-uniformity check: two decimal places,
/// rounded towards positive infinity.
fn rounded_width(width: f64) -> f64 {
    (width * 100.0).ceil()
}

/// Histogram accumulator keyed by a free-form category label, used for
/// study-variable quantitation data.
///
/// Two deliberate differences from the taxonomy-keyed accumulator: appended
/// bins must share a uniform width (compared after rounding to two decimal
/// places), and out-of-range values are folded into the first/last bin
/// instead of being dropped.
#[derive(Debug)]
pub struct CategoryHistogram {
    bins: BinSet,
    values: Vec<Observation>,
    categories: BTreeSet<Arc<str>>,
    tables: OnceLock<BTreeMap<Arc<str>, FrequencyTable>>,
}

impl CategoryHistogram {
    pub fn new(values: Vec<Observation>) -> Self {
        let categories: BTreeSet<Arc<str>> = values
            .iter()
            .filter_map(|obs| obs.category().cloned())
            .collect();
        Self {
            bins: BinSet::new(),
            values,
            categories,
            tables: OnceLock::new(),
        }
    }

    pub fn append_bin(&mut self, bin: HistogramBin) -> Result<()> {
        if let Some(existing) = self.bins.bin_width() {
            if rounded_width(bin.width()) != rounded_width(existing) {
                return Err(HistogramError::InvalidArgument {
                    context: format!(
                        "bin width {} does not match the existing bin width {}",
                        bin.width(),
                        existing
                    ),
                }
                .into());
            }
        }
        self.bins.append(bin)
    }

    pub fn append_bins(&mut self, bins: impl IntoIterator<Item = HistogramBin>) -> Result<()> {
        for bin in bins {
            self.append_bin(bin)?;
        }
        Ok(())
    }

    pub fn bins(&self) -> &BinSet {
        &self.bins
    }

    pub fn values(&self) -> &[Observation] {
        &self.values
    }

    pub fn categories(&self) -> &BTreeSet<Arc<str>> {
        &self.categories
    }

    /// Per-category frequency tables, computed on first access and cached.
    /// Observations without a category label are ignored.
    pub fn frequency_tables(&self) -> &BTreeMap<Arc<str>, FrequencyTable> {
        self.tables.get_or_init(|| {
            let mut tables: BTreeMap<Arc<str>, FrequencyTable> = BTreeMap::new();
            for obs in &self.values {
                let Some(category) = obs.category() else {
                    continue;
                };
                let Some(index) = self.bins.locate_folded(obs.value()) else {
                    continue;
                };
                let bin = self.bins.bins()[index];
                tables
                    .entry(category.clone())
                    .or_insert_with(|| FrequencyTable::zeroed(&self.bins))
                    .increment(&bin);
            }
            tables
        })
    }
}

impl Serialize for CategoryHistogram {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CategoryHistogram", 2)?;
        state.serialize_field("bins", &self.bins)?;
        state.serialize_field("tables", self.frequency_tables())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IdMetricsError;

    fn two_bins() -> Vec<HistogramBin> {
        vec![
            HistogramBin::new(0.0, 10.0).unwrap(),
            HistogramBin::new(10.0, 20.0).unwrap(),
        ]
    }

    #[test]
    fn test_width_uniformity_enforced() {
        let mut hist = CategoryHistogram::new(Vec::new());
        hist.append_bin(HistogramBin::new(0.0, 10.0).unwrap())
            .unwrap();
        let err = hist
            .append_bin(HistogramBin::new(10.0, 25.0).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            IdMetricsError::Histogram(HistogramError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut hist = CategoryHistogram::new(Vec::new());
        hist.append_bin(HistogramBin::new(0.0, 10.0).unwrap())
            .unwrap();
        let err = hist
            .append_bin(HistogramBin::new(5.0, 15.0).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            IdMetricsError::Histogram(HistogramError::OverlappingBin { .. })
        ));
    }

    #[test]
    fn test_out_of_range_folds_into_edge_bins() {
        let mut hist = CategoryHistogram::new(vec![
            Observation::with_category(-5.0, "heavy"),
            Observation::with_category(25.0, "heavy"),
            Observation::with_category(12.0, "heavy"),
        ]);
        hist.append_bins(two_bins()).unwrap();
        let table = &hist.frequency_tables()[&Arc::from("heavy")];
        assert_eq!(table.count(&HistogramBin::new(0.0, 10.0).unwrap()), 1);
        assert_eq!(table.count(&HistogramBin::new(10.0, 20.0).unwrap()), 2);
    }

    #[test]
    fn test_categories_accumulate_independently() {
        let mut hist = CategoryHistogram::new(vec![
            Observation::with_category(5.0, "light"),
            Observation::with_category(5.0, "heavy"),
            Observation::with_category(15.0, "heavy"),
        ]);
        hist.append_bins(two_bins()).unwrap();
        let tables = hist.frequency_tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[&Arc::from("light")].total(), 1);
        assert_eq!(tables[&Arc::from("heavy")].total(), 2);
    }

    #[test]
    fn test_tables_are_dense_per_category() {
        let mut hist =
            CategoryHistogram::new(vec![Observation::with_category(5.0, "light")]);
        hist.append_bins(two_bins()).unwrap();
        let table = &hist.frequency_tables()[&Arc::from("light")];
        assert_eq!(table.len(), 2);
        assert_eq!(table.count(&HistogramBin::new(10.0, 20.0).unwrap()), 0);
    }
}
