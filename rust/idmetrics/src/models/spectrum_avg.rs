use crate::models::bins::HistogramBin;
use crate::models::classification::DataClass;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running average-spectrum profile accumulator.
///
/// Intensities are summed into implicit unit-width m/z bins anchored at
/// zero (`bin i == [i, i+1)`). Every added spectrum also lands in the
/// umbrella `AllSpectra` profile. Per-class spectrum counts are tracked so
/// the rendering layer can divide the sums into an average; nothing is
/// normalized here. Peaks with negative m/z are ignored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpectrumAverageCollector {
    sums: BTreeMap<DataClass, Vec<f64>>,
    spectra: BTreeMap<DataClass, u64>,
}

impl SpectrumAverageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_spectrum(&mut self, mz: &[f64], intensity: &[f64], class: DataClass) {
        self.bump_spectrum_count(class);
        if class != DataClass::AllSpectra {
            self.bump_spectrum_count(DataClass::AllSpectra);
        }
        for (m, i) in mz.iter().zip(intensity.iter()) {
            if *m < 0.0 {
                continue;
            }
            let index = *m as usize;
            Self::accumulate(self.sums.entry(class).or_default(), index, *i);
            if class != DataClass::AllSpectra {
                Self::accumulate(
                    self.sums.entry(DataClass::AllSpectra).or_default(),
                    index,
                    *i,
                );
            }
        }
    }

    fn bump_spectrum_count(&mut self, class: DataClass) {
        *self.spectra.entry(class).or_insert(0) += 1;
    }

    fn accumulate(sums: &mut Vec<f64>, index: usize, intensity: f64) {
        if sums.len() <= index {
            sums.resize(index + 1, 0.0);
        }
        sums[index] += intensity;
    }

    pub fn spectrum_count(&self, class: DataClass) -> u64 {
        self.spectra.get(&class).copied().unwrap_or(0)
    }

    pub fn classes(&self) -> impl Iterator<Item = DataClass> + '_ {
        self.spectra.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// The accumulated intensity sums for one class, as `(bin, sum)` pairs.
    pub fn profile(&self, class: DataClass) -> Vec<(HistogramBin, f64)> {
        let Some(sums) = self.sums.get(&class) else {
            return Vec::new();
        };
        sums.iter()
            .enumerate()
            .map(|(i, sum)| {
                let bin = HistogramBin::new(i as f64, (i + 1) as f64)
                    .expect("unit bins are always valid");
                (bin, *sum)
            })
            .collect()
    }
}
