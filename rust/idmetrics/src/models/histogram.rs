use crate::errors::Result;
use crate::models::bins::{
    BinSet,
    HistogramBin,
};
use crate::models::classification::DataClass;
use crate::models::dataset::Observation;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::OnceLock;

/// Dense bin -> count mapping.
///
/// Built from a bin set with every bin pre-populated at zero, so a zero
/// count is always distinguishable from a missing bin.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    counts: BTreeMap<HistogramBin, u64>,
}

// Serialized as `(start, end, count)` triples: struct-keyed maps do not
// survive JSON.
impl Serialize for FrequencyTable {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(
            self.counts
                .iter()
                .map(|(bin, count)| (bin.start(), bin.end(), *count)),
        )
    }
}

impl FrequencyTable {
    pub fn zeroed(bins: &BinSet) -> Self {
        Self {
            counts: bins.bins().iter().map(|bin| (*bin, 0)).collect(),
        }
    }

    pub(crate) fn increment(&mut self, bin: &HistogramBin) {
        *self.counts.entry(*bin).or_insert(0) += 1;
    }

    pub fn count(&self, bin: &HistogramBin) -> u64 {
        self.counts.get(bin).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HistogramBin, u64)> {
        self.counts.iter().map(|(bin, count)| (bin, *count))
    }

    pub fn max_count(&self) -> u64 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Taxonomy-keyed histogram accumulator.
///
/// Holds the full observation collection rather than bare counts so the
/// per-class frequency tables can be derived lazily, exactly once.
/// Observations matching no bin are silently dropped. With `calc_all`
/// enabled, every matched observation also lands once in the umbrella
/// `AllSpectra` table.
#[derive(Debug)]
pub struct ClassHistogram {
    bins: BinSet,
    values: Vec<Observation>,
    calc_all: bool,
    classes: BTreeSet<DataClass>,
    tables: OnceLock<BTreeMap<DataClass, FrequencyTable>>,
}

impl ClassHistogram {
    pub fn new(values: Vec<Observation>, calc_all: bool) -> Self {
        let mut classes: BTreeSet<DataClass> =
            values.iter().map(Observation::class).collect();
        if calc_all {
            classes.insert(DataClass::AllSpectra);
        }
        Self {
            bins: BinSet::new(),
            values,
            calc_all,
            classes,
            tables: OnceLock::new(),
        }
    }

    pub fn append_bin(&mut self, bin: HistogramBin) -> Result<()> {
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

    pub fn is_calc_all(&self) -> bool {
        self.calc_all
    }

    /// The classes stored in this accumulator, `AllSpectra` included when
    /// the umbrella bucket is enabled. Drives the rendering option list.
    pub fn data_classes(&self) -> &BTreeSet<DataClass> {
        &self.classes
    }

    /// Per-class frequency tables, computed on first access and cached.
    pub fn frequency_tables(&self) -> &BTreeMap<DataClass, FrequencyTable> {
        self.tables.get_or_init(|| {
            let mut tables: BTreeMap<DataClass, FrequencyTable> = BTreeMap::new();
            if self.calc_all {
                tables.insert(DataClass::AllSpectra, FrequencyTable::zeroed(&self.bins));
            }
            for obs in &self.values {
                let Some(index) = self.bins.locate(obs.value()) else {
                    continue;
                };
                let bin = self.bins.bins()[index];
                tables
                    .entry(obs.class())
                    .or_insert_with(|| FrequencyTable::zeroed(&self.bins))
                    .increment(&bin);
                if self.calc_all && obs.class() != DataClass::AllSpectra {
                    tables
                        .get_mut(&DataClass::AllSpectra)
                        .expect("umbrella table is created up front")
                        .increment(&bin);
                }
            }
            tables
        })
    }
}

impl Serialize for ClassHistogram {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClassHistogram", 3)?;
        state.serialize_field("bins", &self.bins)?;
        state.serialize_field("calc_all", &self.calc_all)?;
        state.serialize_field("tables", self.frequency_tables())?;
        state.end()
    }
}
