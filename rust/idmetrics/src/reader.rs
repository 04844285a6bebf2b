//! One-pass metric extraction over a record source.
//!
//! A [`MetricsReader`] walks the proteins and spectra of a [`RecordSource`]
//! exactly once, tagging every scalar it extracts with a [`DataClass`], and
//! then materializes nine independent datasets. Metric preconditions that
//! fail are recorded per metric and never abort the run, so one degenerate
//! input (no decoy annotations, no MS2 spectra ...) leaves the remaining
//! metrics intact.

use crate::data_sources::{
    AccessionFilter,
    RecordSource,
    SpectrumId,
    StudyVariable,
};
use crate::errors::MetricError;
use crate::models::bins::{
    data_range_bins,
    fixed_width_bins,
    granularity_bins,
    HistogramBin,
};
use crate::models::category::CategoryHistogram;
use crate::models::classification::DataClass;
use crate::models::dataset::{
    value_bounds,
    MetricKind,
    Observation,
    SeriesOptions,
    XySeries,
};
use crate::models::histogram::ClassHistogram;
use crate::models::spectrum_avg::SpectrumAverageCollector;
use crate::utils::chem::{
    calc_delta_mz,
    CleavageCounter,
};
use crate::utils::time_cost_secs;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    HashMap,
};
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    debug,
    warn,
};

const DELTA_BIN_COUNT: usize = 200;
const DELTA_MIN_BIN_WIDTH: f64 = 0.0005;
const PRE_MASS_BIN_WIDTH: f64 = 100.0;
const QUANT_BIN_COUNT: usize = 20;
const QUANT_MIN_BIN_WIDTH: f64 = 0.1;
const PEPTIDE_BUCKETS: usize = 6;
const CHARGE_BUCKETS: usize = 8;
const MISSED_CLEAVAGE_CAP: usize = 4;
const PEAKS_BIN_COUNT: usize = 10;
const PEAKS_GRANULARITY: u64 = 50;

/// Fixed intensity ladder for the peak-intensity histogram. The ladder is
/// intentionally non-contiguous and non-uniform.
const INTENSITY_LADDER: [(f64, f64); 11] = [
    (0.0, 5.0),
    (10.0, 100.0),
    (100.0, 300.0),
    (300.0, 500.0),
    (500.0, 700.0),
    (700.0, 900.0),
    (900.0, 1000.0),
    (1000.0, 3000.0),
    (3000.0, 6000.0),
    (6000.0, 10000.0),
    (10000.0, i32::MAX as f64),
];

/// What a spectrum's identifications contributed: precursor metadata from
/// the first peptide, plus target/decoy hits when decoy information exists.
#[derive(Debug, Default, Clone, Copy)]
struct SpectrumLink {
    precursor_mz: Option<f64>,
    precursor_charge: Option<i32>,
    target: bool,
    decoy: bool,
}

/// Run-scoped accumulation buffers. Created per invocation, discarded when
/// the run's datasets have been materialized.
struct Accumulation {
    has_decoy: bool,
    has_quant: bool,
    no_peptide: bool,
    no_spectra: bool,
    no_tandem: bool,
    peptide_count: u64,
    identified_spectra: u64,
    unidentified_spectra: u64,
    peptide_bars: [u64; PEPTIDE_BUCKETS],
    charge_bars: [u64; CHARGE_BUCKETS],
    delta: Vec<Observation>,
    missed: Vec<Observation>,
    pre_masses: Vec<Observation>,
    peaks_ms: Vec<Observation>,
    peak_intensity: Vec<Observation>,
    average: SpectrumAverageCollector,
    variables: Vec<StudyVariable>,
    variable_values: BTreeMap<Arc<str>, Vec<f64>>,
    links: HashMap<SpectrumId, SpectrumLink>,
}

impl Accumulation {
    fn new() -> Self {
        Self {
            has_decoy: false,
            has_quant: false,
            no_peptide: true,
            no_spectra: true,
            no_tandem: true,
            peptide_count: 0,
            identified_spectra: 0,
            unidentified_spectra: 0,
            peptide_bars: [0; PEPTIDE_BUCKETS],
            charge_bars: [0; CHARGE_BUCKETS],
            delta: Vec::new(),
            missed: Vec::new(),
            pre_masses: Vec::new(),
            peaks_ms: Vec::new(),
            peak_intensity: Vec::new(),
            average: SpectrumAverageCollector::new(),
            variables: Vec::new(),
            variable_values: BTreeMap::new(),
            links: HashMap::new(),
        }
    }

    /// Push an identified-peptide observation, duplicated into the target
    /// or decoy series when the source reports decoy information.
    fn push_peptide_tagged(list: &mut Vec<Observation>, value: f64, decoy: Option<bool>) {
        list.push(Observation::new(value, DataClass::IdentifiedSpectra));
        match decoy {
            Some(true) => list.push(Observation::new(value, DataClass::IdentifiedDecoy)),
            Some(false) => list.push(Observation::new(value, DataClass::IdentifiedTarget)),
            None => {}
        }
    }

    /// Push a spectrum-level observation, duplicated into the target/decoy
    /// series according to the spectrum's identification link.
    fn push_spectrum_tagged(
        list: &mut Vec<Observation>,
        value: f64,
        class: DataClass,
        link: Option<&SpectrumLink>,
    ) {
        list.push(Observation::new(value, class));
        if let Some(link) = link {
            if link.target {
                list.push(Observation::new(value, DataClass::IdentifiedTarget));
            }
            if link.decoy {
                list.push(Observation::new(value, DataClass::IdentifiedDecoy));
            }
        }
    }
}

/// Single-use pipeline over one record source.
///
/// `read` consumes the reader: intermediate buffers are scoped to a single
/// run and a finished run cannot be replayed against mutated state.
pub struct MetricsReader<S: RecordSource> {
    source: S,
    filter: Option<Box<dyn AccessionFilter>>,
    cleavage: CleavageCounter,
}

impl<S: RecordSource> MetricsReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            filter: None,
            cleavage: CleavageCounter::default(),
        }
    }

    /// Restrict accumulation to proteins whose accession passes `filter`.
    pub fn with_filter(source: S, filter: impl AccessionFilter + 'static) -> Self {
        Self {
            source,
            filter: Some(Box::new(filter)),
            cleavage: CleavageCounter::default(),
        }
    }

    pub fn read(self) -> MetricsReport {
        let MetricsReader {
            source,
            filter,
            cleavage,
        } = self;
        let run_start = Instant::now();

        let mut acc = Accumulation::new();
        Self::execute(&source, filter.as_deref(), &cleavage, &mut acc);

        // The record set behind the source is typically large; release it
        // before materializing the datasets.
        drop(source);

        let mut report = MetricsReport::new(
            acc.peptide_count,
            acc.identified_spectra,
            acc.unidentified_spectra,
        );

        read_peptides(&mut report, acc.peptide_bars, acc.no_peptide);
        read_delta(&mut report, acc.delta, acc.no_peptide);
        read_missed(&mut report, acc.missed, acc.no_peptide);
        read_pre_charge(&mut report, acc.charge_bars, acc.no_spectra);
        read_pre_masses(&mut report, acc.pre_masses, acc.no_spectra);
        read_average(&mut report, acc.average, acc.no_tandem);
        read_peaks_ms(&mut report, acc.peaks_ms, acc.no_tandem);
        read_peak_intensity(&mut report, acc.peak_intensity, acc.no_tandem);
        read_quantitation(
            &mut report,
            acc.variables,
            acc.variable_values,
            acc.no_peptide,
        );

        report.run_time = run_start.elapsed();
        debug!(
            "created metric datasets in {}s",
            time_cost_secs(report.run_time)
        );
        report
    }

    fn execute(
        source: &S,
        filter: Option<&dyn AccessionFilter>,
        cleavage: &CleavageCounter,
        acc: &mut Accumulation,
    ) {
        acc.has_decoy = source.has_decoy_information();
        acc.has_quant = source.has_quantitation();

        if acc.has_quant {
            for variable in source.study_variables() {
                acc.variables.push(variable.clone());
                acc.variable_values
                    .insert(variable.id.clone(), Vec::new());
            }
        }

        for protein in source.proteins() {
            if let Some(filter) = filter {
                if !filter.accept(&protein.accession) {
                    continue;
                }
            }

            let size = protein.peptides.len();
            if size > 0 {
                acc.peptide_bars[size.min(PEPTIDE_BUCKETS) - 1] += 1;
            }

            for peptide in &protein.peptides {
                acc.no_peptide = false;
                acc.peptide_count += 1;

                let decoy = if acc.has_decoy { peptide.decoy } else { None };

                if let Some(delta) = calc_delta_mz(
                    &peptide.sequence,
                    peptide.precursor_mz,
                    peptide.precursor_charge,
                    &peptide.modification_masses,
                ) {
                    Accumulation::push_peptide_tagged(&mut acc.delta, delta, decoy);
                }

                let missed = cleavage.count(&peptide.sequence).min(MISSED_CLEAVAGE_CAP);
                Accumulation::push_peptide_tagged(&mut acc.missed, missed as f64, decoy);

                if let Some(id) = peptide.spectrum_id {
                    let link = acc.links.entry(id).or_insert_with(|| SpectrumLink {
                        precursor_mz: peptide.precursor_mz,
                        precursor_charge: peptide.precursor_charge,
                        ..SpectrumLink::default()
                    });
                    match decoy {
                        Some(true) => link.decoy = true,
                        Some(false) => link.target = true,
                        None => {}
                    }
                }
            }

            if acc.has_quant {
                for quant_peptide in &protein.quant_peptides {
                    for (variable_id, score) in &quant_peptide.study_scores {
                        let (Some(values), Some(score)) =
                            (acc.variable_values.get_mut(variable_id), score)
                        else {
                            continue;
                        };
                        values.push(*score);
                    }
                }
            }
        }

        for spectrum in source.spectra() {
            acc.no_spectra = false;
            let link = acc.links.get(&spectrum.id).copied();

            let (pre_charge, pre_mz) = match &link {
                Some(link) => (link.precursor_charge, link.precursor_mz),
                None => (spectrum.precursor_charge, spectrum.precursor_mz),
            };

            // Charge annotations above 8 exist in the wild but are not
            // plausible; they are excluded rather than clamped.
            if let Some(charge) = pre_charge {
                if charge > 0 && charge < CHARGE_BUCKETS as i32 {
                    acc.charge_bars[(charge - 1) as usize] += 1;
                }
            }

            if let (Some(mz), Some(charge)) = (pre_mz, pre_charge) {
                if mz > -1.0 && charge < CHARGE_BUCKETS as i32 {
                    let class = if link.is_some() {
                        DataClass::IdentifiedSpectra
                    } else {
                        DataClass::UnidentifiedSpectra
                    };
                    Accumulation::push_spectrum_tagged(
                        &mut acc.pre_masses,
                        mz * charge as f64,
                        class,
                        link.as_ref(),
                    );
                }
            }

            let class = if link.is_some() {
                acc.identified_spectra += 1;
                DataClass::IdentifiedSpectra
            } else {
                acc.unidentified_spectra += 1;
                DataClass::UnidentifiedSpectra
            };

            if spectrum.ms_level == 2 {
                acc.no_tandem = false;

                let peaks = spectrum.peaks_mz.len() as f64;
                acc.peaks_ms
                    .push(Observation::new(peaks, DataClass::AllSpectra));
                Accumulation::push_spectrum_tagged(
                    &mut acc.peaks_ms,
                    peaks,
                    class,
                    link.as_ref(),
                );

                acc.average
                    .add_spectrum(&spectrum.peaks_mz, &spectrum.peaks_intensity, class);

                for intensity in &spectrum.peaks_intensity {
                    Accumulation::push_spectrum_tagged(
                        &mut acc.peak_intensity,
                        *intensity,
                        class,
                        link.as_ref(),
                    );
                }
            }
        }
    }
}

/// The finished datasets of one pipeline run.
///
/// Each metric holds exactly one of: a domain/range series, a binned
/// histogram, the average-spectrum profile, or a recorded [`MetricError`].
/// The report is immutable once returned and safe to share across readers.
#[derive(Debug, Serialize)]
pub struct MetricsReport {
    xy: BTreeMap<MetricKind, XySeries>,
    histograms: BTreeMap<MetricKind, ClassHistogram>,
    average_spectrum: Option<SpectrumAverageCollector>,
    errors: BTreeMap<MetricKind, MetricError>,
    pub peptide_count: u64,
    pub identified_spectra: u64,
    pub unidentified_spectra: u64,
    run_time: Duration,
}

impl MetricsReport {
    fn new(peptide_count: u64, identified_spectra: u64, unidentified_spectra: u64) -> Self {
        Self {
            xy: BTreeMap::new(),
            histograms: BTreeMap::new(),
            average_spectrum: None,
            errors: BTreeMap::new(),
            peptide_count,
            identified_spectra,
            unidentified_spectra,
            run_time: Duration::ZERO,
        }
    }

    pub fn xy_series(&self, kind: MetricKind) -> Option<&XySeries> {
        self.xy.get(&kind)
    }

    pub fn histogram(&self, kind: MetricKind) -> Option<&ClassHistogram> {
        self.histograms.get(&kind)
    }

    pub fn average_spectrum(&self) -> Option<&SpectrumAverageCollector> {
        self.average_spectrum.as_ref()
    }

    pub fn error(&self, kind: MetricKind) -> Option<MetricError> {
        self.errors.get(&kind).copied()
    }

    pub fn has_result(&self, kind: MetricKind) -> bool {
        self.xy.contains_key(&kind)
            || self.histograms.contains_key(&kind)
            || (kind == MetricKind::AverageSpectrum && self.average_spectrum.is_some())
    }

    /// Rendering option list for a dataset: the classes it carries, with
    /// the reference class selected.
    pub fn series_options(&self, kind: MetricKind) -> Option<SeriesOptions> {
        if let Some(series) = self.xy.get(&kind) {
            let present: Vec<DataClass> =
                series.range().iter().map(Observation::class).collect();
            return Some(SeriesOptions::new(present, series.reference()));
        }
        if let Some(histogram) = self.histograms.get(&kind) {
            let present: Vec<DataClass> =
                histogram.data_classes().iter().copied().collect();
            return Some(SeriesOptions::new(present, DataClass::IdentifiedSpectra));
        }
        None
    }

    pub fn run_time(&self) -> Duration {
        self.run_time
    }

    fn record_error(&mut self, kind: MetricKind, error: MetricError) {
        self.errors.insert(kind, error);
    }
}

fn read_peptides(report: &mut MetricsReport, bars: [u64; PEPTIDE_BUCKETS], no_peptide: bool) {
    if no_peptide {
        report.record_error(MetricKind::PeptidesPerProtein, MetricError::NoPeptide);
        return;
    }

    let domain: Vec<f64> = (1..=PEPTIDE_BUCKETS).map(|i| i as f64).collect();
    let range: Vec<Observation> = bars
        .iter()
        .map(|count| Observation::new(*count as f64, DataClass::AllSpectra))
        .collect();
    insert_xy(
        report,
        MetricKind::PeptidesPerProtein,
        domain,
        range,
        DataClass::AllSpectra,
    );
}

fn read_delta(report: &mut MetricsReport, values: Vec<Observation>, no_peptide: bool) {
    if no_peptide || values.is_empty() {
        report.record_error(MetricKind::DeltaMass, MetricError::NoPeptide);
        return;
    }

    let Some((min, max)) = value_bounds(&values) else {
        report.record_error(MetricKind::DeltaMass, MetricError::NoPeptide);
        return;
    };

    let width = ((max - min) / DELTA_BIN_COUNT as f64).max(DELTA_MIN_BIN_WIDTH);
    let mut histogram = ClassHistogram::new(values, true);
    let appended = fixed_width_bins(
        -(DELTA_BIN_COUNT as f64) * width,
        width,
        DELTA_BIN_COUNT * 2,
    )
    .and_then(|bins| histogram.append_bins(bins));
    if let Err(e) = appended {
        warn!("delta-mass binning failed: {:?}", e);
        return;
    }

    // Peak-normalized: every class series is scaled by its own maximum.
    let mut domain = Vec::new();
    let mut range = Vec::new();
    for (class, table) in histogram.frequency_tables() {
        let max_count = table.max_count();
        for (bin, count) in table.iter() {
            domain.push(bin.start());
            let relative = if max_count == 0 {
                0.0
            } else {
                count as f64 / max_count as f64
            };
            range.push(Observation::new(relative, *class));
        }
    }
    insert_xy(
        report,
        MetricKind::DeltaMass,
        domain,
        range,
        DataClass::IdentifiedSpectra,
    );
}

fn read_missed(report: &mut MetricsReport, values: Vec<Observation>, no_peptide: bool) {
    if no_peptide {
        report.record_error(MetricKind::MissedCleavages, MetricError::NoPeptide);
        return;
    }

    let bins = match granularity_bins(0.0, MISSED_CLEAVAGE_CAP, 1, &values) {
        Ok(bins) => bins,
        Err(e) => {
            warn!("missed-cleavage binning failed: {:?}", e);
            return;
        }
    };
    let mut histogram = ClassHistogram::new(values, false);
    if let Err(e) = histogram.append_bins(bins) {
        warn!("missed-cleavage binning failed: {:?}", e);
        return;
    }
    report
        .histograms
        .insert(MetricKind::MissedCleavages, histogram);
}

fn read_pre_charge(report: &mut MetricsReport, bars: [u64; CHARGE_BUCKETS], no_spectra: bool) {
    if no_spectra {
        report.record_error(MetricKind::PrecursorCharge, MetricError::NoSpectra);
        return;
    }
    if bars.iter().all(|count| *count == 0) {
        report.record_error(MetricKind::PrecursorCharge, MetricError::NoPrecursorCharge);
        return;
    }

    let domain: Vec<f64> = (1..=CHARGE_BUCKETS).map(|i| i as f64).collect();
    let range: Vec<Observation> = bars
        .iter()
        .map(|count| Observation::new(*count as f64, DataClass::IdentifiedSpectra))
        .collect();
    insert_xy(
        report,
        MetricKind::PrecursorCharge,
        domain,
        range,
        DataClass::IdentifiedSpectra,
    );
}

fn read_pre_masses(report: &mut MetricsReport, values: Vec<Observation>, no_spectra: bool) {
    if no_spectra {
        report.record_error(MetricKind::PrecursorMass, MetricError::NoSpectra);
        return;
    }
    if !values.iter().any(|obs| obs.value() > 0.0) {
        report.record_error(MetricKind::PrecursorMass, MetricError::NoPrecursorMass);
        return;
    }

    let bins = match data_range_bins(0.0, PRE_MASS_BIN_WIDTH, &values) {
        Ok(bins) => bins,
        Err(e) => {
            warn!("precursor-mass binning failed: {:?}", e);
            return;
        }
    };
    let mut histogram = ClassHistogram::new(values, true);
    if let Err(e) = histogram.append_bins(bins) {
        warn!("precursor-mass binning failed: {:?}", e);
        return;
    }

    // Proportion-normalized: every class series sums to one.
    let mut domain = Vec::new();
    let mut range = Vec::new();
    for (class, table) in histogram.frequency_tables() {
        let total = table.total();
        for (bin, count) in table.iter() {
            domain.push(bin.start());
            let relative = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            };
            range.push(Observation::new(relative, *class));
        }
    }
    insert_xy(
        report,
        MetricKind::PrecursorMass,
        domain,
        range,
        DataClass::AllSpectra,
    );
}

fn read_average(
    report: &mut MetricsReport,
    average: SpectrumAverageCollector,
    no_tandem: bool,
) {
    if no_tandem {
        report.record_error(MetricKind::AverageSpectrum, MetricError::NoTandemSpectra);
        return;
    }
    report.average_spectrum = Some(average);
}

fn read_peaks_ms(report: &mut MetricsReport, values: Vec<Observation>, no_tandem: bool) {
    if no_tandem {
        report.record_error(MetricKind::PeaksPerSpectrum, MetricError::NoTandemSpectra);
        return;
    }

    let bins = match granularity_bins(0.0, PEAKS_BIN_COUNT, PEAKS_GRANULARITY, &values) {
        Ok(bins) => bins,
        Err(e) => {
            warn!("peaks-per-spectrum binning failed: {:?}", e);
            return;
        }
    };
    let mut histogram = ClassHistogram::new(values, false);
    if let Err(e) = histogram.append_bins(bins) {
        warn!("peaks-per-spectrum binning failed: {:?}", e);
        return;
    }
    report
        .histograms
        .insert(MetricKind::PeaksPerSpectrum, histogram);
}

fn read_peak_intensity(report: &mut MetricsReport, values: Vec<Observation>, no_tandem: bool) {
    if no_tandem {
        report.record_error(MetricKind::PeakIntensity, MetricError::NoTandemSpectra);
        return;
    }

    let mut histogram = ClassHistogram::new(values, true);
    let appended = INTENSITY_LADDER
        .iter()
        .try_for_each(|(start, end)| {
            histogram.append_bin(HistogramBin::new(*start, *end)?)
        });
    if let Err(e) = appended {
        warn!("peak-intensity binning failed: {:?}", e);
        return;
    }
    report
        .histograms
        .insert(MetricKind::PeakIntensity, histogram);
}

fn read_quantitation(
    report: &mut MetricsReport,
    variables: Vec<StudyVariable>,
    variable_values: BTreeMap<Arc<str>, Vec<f64>>,
    no_peptide: bool,
) {
    if no_peptide {
        report.record_error(MetricKind::Quantitation, MetricError::NoProteinQuantitation);
        return;
    }
    let has_values = variable_values.values().any(|values| !values.is_empty());
    if variables.is_empty() || !has_values {
        report.record_error(MetricKind::Quantitation, MetricError::NoProteinQuantitation);
        return;
    }

    let mut observations = Vec::new();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for variable in &variables {
        let Some(values) = variable_values.get(&variable.id) else {
            continue;
        };
        for value in values {
            observations.push(Observation::with_category(
                *value,
                variable.description.clone(),
            ));
            min = min.min(*value);
            max = max.max(*value);
        }
    }

    // Equal-width empirical boundaries over the pooled value range; the
    // accumulator folds out-of-range values into the edge bins.
    let width = ((max - min) / QUANT_BIN_COUNT as f64).max(QUANT_MIN_BIN_WIDTH);
    let bounds: Vec<f64> = (1..=QUANT_BIN_COUNT)
        .map(|i| min + i as f64 * width)
        .collect();

    let mut histogram = CategoryHistogram::new(observations);
    let appended = bounds.windows(2).try_for_each(|pair| {
        histogram.append_bin(HistogramBin::new(pair[0], pair[1])?)
    });
    if let Err(e) = appended {
        warn!("quantitation binning failed: {:?}", e);
        return;
    }

    // Proportion-normalized per study variable.
    let mut domain = Vec::new();
    let mut range = Vec::new();
    for (category, table) in histogram.frequency_tables() {
        let total = table.total();
        for (bin, count) in table.iter() {
            domain.push(bin.start());
            let relative = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            };
            range.push(Observation::with_category(relative, category.clone()));
        }
    }
    insert_xy(
        report,
        MetricKind::Quantitation,
        domain,
        range,
        DataClass::IdentifiedSpectra,
    );
}

fn insert_xy(
    report: &mut MetricsReport,
    kind: MetricKind,
    domain: Vec<f64>,
    range: Vec<Observation>,
    reference: DataClass,
) {
    match XySeries::new(domain, range, reference) {
        Ok(series) => {
            report.xy.insert(kind, series);
        }
        Err(e) => {
            warn!("{} dataset rejected: {:?}", kind.title(), e);
        }
    }
}
