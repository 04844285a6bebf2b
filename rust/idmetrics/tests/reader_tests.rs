use idmetrics::utils::chem::{
    monoisotopic_mass,
    PROTON_MASS,
};
use idmetrics::{
    DataClass,
    MetricError,
    MetricKind,
    MetricsReader,
    PeptideRecord,
    ProteinRecord,
    QuantPeptideRecord,
    RecordSource,
    SpectrumRecord,
    StudyVariable,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct MockSource {
    proteins: Vec<ProteinRecord>,
    spectra: Vec<SpectrumRecord>,
    has_decoy: bool,
    has_quant: bool,
    study_variables: Vec<StudyVariable>,
}

impl RecordSource for MockSource {
    fn proteins(&self) -> &[ProteinRecord] {
        &self.proteins
    }

    fn spectra(&self) -> &[SpectrumRecord] {
        &self.spectra
    }

    fn has_decoy_information(&self) -> bool {
        self.has_decoy
    }

    fn has_quantitation(&self) -> bool {
        self.has_quant
    }

    fn study_variables(&self) -> &[StudyVariable] {
        &self.study_variables
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("idmetrics=debug")
        .try_init();
}

/// A peptide whose observed m/z sits `delta` above the theoretical value.
fn peptide(sequence: &str, charge: i32, delta: f64) -> PeptideRecord {
    let mass = monoisotopic_mass(sequence).unwrap();
    let mz = (mass + charge as f64 * PROTON_MASS) / charge as f64 + delta;
    PeptideRecord {
        precursor_mz: Some(mz),
        precursor_charge: Some(charge),
        ..PeptideRecord::new(sequence)
    }
}

fn ms2_spectrum(id: u64, mz: f64, charge: i32, peaks: usize) -> SpectrumRecord {
    SpectrumRecord {
        precursor_mz: Some(mz),
        precursor_charge: Some(charge),
        peaks_mz: (0..peaks).map(|i| 100.0 + i as f64).collect(),
        peaks_intensity: (0..peaks).map(|i| 50.0 * (i + 1) as f64).collect(),
        ..SpectrumRecord::new(id, 2)
    }
}

#[test]
fn test_no_peptides_leaves_spectrum_metrics_alive() {
    init_tracing();
    let source = MockSource {
        spectra: vec![ms2_spectrum(1, 500.5, 2, 3)],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    assert_eq!(
        report.error(MetricKind::PeptidesPerProtein),
        Some(MetricError::NoPeptide)
    );
    assert_eq!(report.error(MetricKind::DeltaMass), Some(MetricError::NoPeptide));
    assert_eq!(
        report.error(MetricKind::MissedCleavages),
        Some(MetricError::NoPeptide)
    );
    assert_eq!(
        report.error(MetricKind::Quantitation),
        Some(MetricError::NoProteinQuantitation)
    );

    assert!(report.has_result(MetricKind::PrecursorCharge));
    assert!(report.has_result(MetricKind::PrecursorMass));
    assert!(report.has_result(MetricKind::PeaksPerSpectrum));
    assert!(report.has_result(MetricKind::AverageSpectrum));
}

#[test]
fn test_peptides_per_protein_buckets() {
    let proteins = (0..5)
        .map(|i| {
            ProteinRecord::new(format!("P{:05}", i), vec![peptide("PEPTIDEK", 2, 0.0)])
        })
        .collect();
    let source = MockSource {
        proteins,
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::PeptidesPerProtein).unwrap();
    assert_eq!(series.domain(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let counts: Vec<f64> = series.range().iter().map(|obs| obs.value()).collect();
    assert_eq!(counts, vec![5.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(report.peptide_count, 5);
}

#[test]
fn test_peptides_per_protein_overflow_bucket() {
    let peptides: Vec<PeptideRecord> =
        (0..9).map(|_| peptide("PEPTIDEK", 2, 0.0)).collect();
    let source = MockSource {
        proteins: vec![ProteinRecord::new("P00001", peptides)],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::PeptidesPerProtein).unwrap();
    let counts: Vec<f64> = series.range().iter().map(|obs| obs.value()).collect();
    assert_eq!(counts, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_delta_mass_is_peak_normalized_per_class() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![
                PeptideRecord {
                    decoy: Some(false),
                    ..peptide("PEPTIDEK", 2, 0.001)
                },
                PeptideRecord {
                    decoy: Some(false),
                    ..peptide("PEPTIDEK", 2, 0.001)
                },
                PeptideRecord {
                    decoy: Some(true),
                    ..peptide("LVMEPTIDR", 2, -0.002)
                },
            ],
        )],
        has_decoy: true,
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::DeltaMass).unwrap();
    for class in [
        DataClass::IdentifiedSpectra,
        DataClass::IdentifiedTarget,
        DataClass::IdentifiedDecoy,
    ] {
        let max = series
            .class_values(class)
            .map(|(_, y)| y)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(
            (max - 1.0).abs() < 1e-12,
            "{:?} series peaks at {}, expected 1.0",
            class,
            max
        );
    }
}

#[test]
fn test_precursor_mass_proportions_sum_to_one() {
    let mut identified = peptide("PEPTIDEK", 2, 0.0);
    identified.spectrum_id = Some(1);
    let source = MockSource {
        proteins: vec![ProteinRecord::new("P00001", vec![identified])],
        spectra: vec![
            ms2_spectrum(1, 500.5, 2, 3),
            ms2_spectrum(2, 430.2, 3, 4),
            ms2_spectrum(3, 810.9, 1, 5),
        ],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::PrecursorMass).unwrap();
    for class in [
        DataClass::IdentifiedSpectra,
        DataClass::UnidentifiedSpectra,
        DataClass::AllSpectra,
    ] {
        let sum: f64 = series.class_values(class).map(|(_, y)| y).sum();
        assert!(
            (sum - 1.0).abs() < 1e-9,
            "{:?} series sums to {}, expected 1.0",
            class,
            sum
        );
    }
}

#[test]
fn test_precursor_mass_requires_positive_mass() {
    let source = MockSource {
        spectra: vec![SpectrumRecord {
            precursor_mz: Some(0.0),
            precursor_charge: Some(2),
            ..SpectrumRecord::new(1, 2)
        }],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();
    assert_eq!(
        report.error(MetricKind::PrecursorMass),
        Some(MetricError::NoPrecursorMass)
    );
}

#[test]
fn test_implausible_charges_are_excluded() {
    let source = MockSource {
        spectra: vec![
            SpectrumRecord {
                precursor_mz: Some(400.0),
                precursor_charge: Some(9),
                ..SpectrumRecord::new(1, 2)
            },
            SpectrumRecord {
                precursor_mz: Some(400.0),
                precursor_charge: Some(0),
                ..SpectrumRecord::new(2, 2)
            },
        ],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();
    assert_eq!(
        report.error(MetricKind::PrecursorCharge),
        Some(MetricError::NoPrecursorCharge)
    );
}

#[test]
fn test_charge_distribution() {
    let source = MockSource {
        spectra: vec![
            ms2_spectrum(1, 500.0, 2, 2),
            ms2_spectrum(2, 500.0, 2, 2),
            ms2_spectrum(3, 500.0, 3, 2),
        ],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::PrecursorCharge).unwrap();
    let counts: Vec<f64> = series.range().iter().map(|obs| obs.value()).collect();
    assert_eq!(counts, vec![0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_ms1_spectra_carry_no_peak_statistics() {
    let source = MockSource {
        spectra: vec![SpectrumRecord {
            precursor_mz: Some(500.0),
            precursor_charge: Some(2),
            peaks_mz: vec![100.0, 200.0],
            peaks_intensity: vec![10.0, 20.0],
            ..SpectrumRecord::new(1, 1)
        }],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    assert_eq!(
        report.error(MetricKind::PeaksPerSpectrum),
        Some(MetricError::NoTandemSpectra)
    );
    assert_eq!(
        report.error(MetricKind::PeakIntensity),
        Some(MetricError::NoTandemSpectra)
    );
    assert_eq!(
        report.error(MetricKind::AverageSpectrum),
        Some(MetricError::NoTandemSpectra)
    );
    // Charge statistics still work from MS1 precursor metadata.
    assert!(report.has_result(MetricKind::PrecursorCharge));
}

#[test]
fn test_decoy_tagging_reaches_missed_cleavage_tables() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![
                PeptideRecord {
                    decoy: Some(false),
                    ..peptide("PEKTIDER", 2, 0.0)
                },
                PeptideRecord {
                    decoy: Some(true),
                    ..peptide("PEPTIDEK", 2, 0.0)
                },
            ],
        )],
        has_decoy: true,
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let histogram = report.histogram(MetricKind::MissedCleavages).unwrap();
    let tables = histogram.frequency_tables();
    assert!(tables.contains_key(&DataClass::IdentifiedSpectra));
    assert!(tables.contains_key(&DataClass::IdentifiedTarget));
    assert!(tables.contains_key(&DataClass::IdentifiedDecoy));
    assert_eq!(tables[&DataClass::IdentifiedSpectra].total(), 2);
    assert_eq!(tables[&DataClass::IdentifiedTarget].total(), 1);
    assert_eq!(tables[&DataClass::IdentifiedDecoy].total(), 1);
}

#[test]
fn test_no_decoy_information_no_target_series() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![PeptideRecord {
                decoy: Some(false),
                ..peptide("PEPTIDEK", 2, 0.0)
            }],
        )],
        has_decoy: false,
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let histogram = report.histogram(MetricKind::MissedCleavages).unwrap();
    let tables = histogram.frequency_tables();
    assert!(!tables.contains_key(&DataClass::IdentifiedTarget));
    assert!(!tables.contains_key(&DataClass::IdentifiedDecoy));
}

#[test]
fn test_missed_cleavage_counts_land_in_unit_bins() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![
                peptide("PEPTIDEK", 2, 0.0),
                peptide("PEKTIDER", 2, 0.0),
                peptide("PEKTIRDEK", 2, 0.0),
            ],
        )],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let histogram = report.histogram(MetricKind::MissedCleavages).unwrap();
    let bins = histogram.bins();
    assert_eq!(bins.len(), 4);
    assert_eq!(bins.bin_width(), Some(1.0));
    let table = &histogram.frequency_tables()[&DataClass::IdentifiedSpectra];
    let counts: Vec<u64> = table.iter().map(|(_, count)| count).collect();
    assert_eq!(counts, vec![1, 1, 1, 0]);
}

#[test]
fn test_quantitation_proportions_per_study_variable() {
    let heavy: Arc<str> = Arc::from("sv_1");
    let light: Arc<str> = Arc::from("sv_2");
    let mut quant = Vec::new();
    for (h, l) in [(1.2, 8.0), (1.4, 9.5), (2.8, f64::NAN)] {
        let mut scores: BTreeMap<Arc<str>, Option<f64>> = BTreeMap::new();
        scores.insert(heavy.clone(), Some(h));
        scores.insert(light.clone(), if l.is_nan() { None } else { Some(l) });
        quant.push(QuantPeptideRecord {
            study_scores: scores,
        });
    }
    let mut protein = ProteinRecord::new("P00001", vec![peptide("PEPTIDEK", 2, 0.0)]);
    protein.quant_peptides = quant;

    let source = MockSource {
        proteins: vec![protein],
        has_quant: true,
        study_variables: vec![
            StudyVariable {
                id: heavy.clone(),
                description: Arc::from("heavy label"),
            },
            StudyVariable {
                id: light.clone(),
                description: Arc::from("light label"),
            },
        ],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let series = report.xy_series(MetricKind::Quantitation).unwrap();
    for category in ["heavy label", "light label"] {
        let sum: f64 = series.category_values(category).map(|(_, y)| y).sum();
        assert!(
            (sum - 1.0).abs() < 1e-9,
            "{} sums to {}, expected 1.0",
            category,
            sum
        );
    }
    // The None score was skipped: two light values, three heavy ones.
    let light_total: usize = series.category_values("light label").count();
    assert!(light_total > 0);
}

#[test]
fn test_quantitation_requires_scores() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![peptide("PEPTIDEK", 2, 0.0)],
        )],
        has_quant: true,
        study_variables: vec![StudyVariable {
            id: Arc::from("sv_1"),
            description: Arc::from("heavy label"),
        }],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();
    assert_eq!(
        report.error(MetricKind::Quantitation),
        Some(MetricError::NoProteinQuantitation)
    );
}

#[test]
fn test_identified_and_unidentified_spectra_are_counted() {
    let mut identified = peptide("PEPTIDEK", 2, 0.0);
    identified.spectrum_id = Some(1);
    let source = MockSource {
        proteins: vec![ProteinRecord::new("P00001", vec![identified])],
        spectra: vec![
            ms2_spectrum(1, 500.5, 2, 3),
            ms2_spectrum(2, 430.2, 3, 4),
        ],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();
    assert_eq!(report.identified_spectra, 1);
    assert_eq!(report.unidentified_spectra, 1);
}

#[test]
fn test_accession_filter_skips_proteins() {
    let source = MockSource {
        proteins: vec![
            ProteinRecord::new("KEEP_1", vec![peptide("PEPTIDEK", 2, 0.0)]),
            ProteinRecord::new("DROP_1", vec![peptide("PEKTIDER", 2, 0.0)]),
        ],
        ..MockSource::default()
    };
    let report =
        MetricsReader::with_filter(source, |accession: &str| accession.starts_with("KEEP"))
            .read();
    assert_eq!(report.peptide_count, 1);
}

#[test]
fn test_series_options_from_report() {
    let source = MockSource {
        proteins: vec![ProteinRecord::new(
            "P00001",
            vec![PeptideRecord {
                decoy: Some(false),
                ..peptide("PEPTIDEK", 2, 0.0)
            }],
        )],
        has_decoy: true,
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let options = report.series_options(MetricKind::MissedCleavages).unwrap();
    assert!(options.is_visible(DataClass::IdentifiedSpectra));
    assert!(!options.is_visible(DataClass::IdentifiedTarget));
}

#[test]
fn test_peak_statistics_cover_every_intensity() {
    let source = MockSource {
        spectra: vec![ms2_spectrum(1, 500.5, 2, 4)],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    // Intensities 50, 100, 150, 200 all fall inside the ladder.
    let histogram = report.histogram(MetricKind::PeakIntensity).unwrap();
    let table = &histogram.frequency_tables()[&DataClass::UnidentifiedSpectra];
    assert_eq!(table.total(), 4);

    let peaks = report.histogram(MetricKind::PeaksPerSpectrum).unwrap();
    let table = &peaks.frequency_tables()[&DataClass::AllSpectra];
    assert_eq!(table.total(), 1);

    let average = report.average_spectrum().unwrap();
    assert_eq!(average.spectrum_count(DataClass::AllSpectra), 1);
    assert_eq!(
        average.spectrum_count(DataClass::UnidentifiedSpectra),
        1
    );
}

#[test]
fn test_report_serializes_to_json() {
    let mut identified = peptide("PEPTIDEK", 2, 0.001);
    identified.spectrum_id = Some(1);
    let source = MockSource {
        proteins: vec![ProteinRecord::new("P00001", vec![identified])],
        spectra: vec![ms2_spectrum(1, 500.5, 2, 3)],
        ..MockSource::default()
    };
    let report = MetricsReader::new(source).read();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["peptide_count"], 1);
    assert!(json["xy"]["DeltaMass"]["domain"].is_array());
    assert!(json["histograms"]["MissedCleavages"]["tables"].is_object());
    assert!(json["errors"]["Quantitation"].is_string());
}

#[test]
fn test_data_range_round_trip_drops_nothing() {
    use idmetrics::{data_range_bins, ClassHistogram, Observation};

    let values: Vec<Observation> = [0.0, 3.3, 7.9, 12.0, 18.6, 24.7]
        .iter()
        .map(|v| Observation::new(*v, DataClass::IdentifiedSpectra))
        .collect();
    let bins = data_range_bins(0.0, 5.0, &values).unwrap();
    let mut histogram = ClassHistogram::new(values.clone(), false);
    histogram.append_bins(bins).unwrap();
    let table = &histogram.frequency_tables()[&DataClass::IdentifiedSpectra];
    assert_eq!(table.total() as usize, values.len());
}
