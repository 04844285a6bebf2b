#![doc = include_str!("../README.md")]

// Declare modules
pub mod data_sources;
pub mod errors;
pub mod models;
pub mod reader;
pub mod utils;

// Re-export main structures
pub use crate::data_sources::{
    AccessionFilter,
    PeptideRecord,
    ProteinRecord,
    QuantPeptideRecord,
    RecordSource,
    SpectrumId,
    SpectrumRecord,
    StudyVariable,
};
pub use crate::models::bins::{
    data_range_bins,
    fixed_width_bins,
    granularity_bins,
    BinSet,
    HistogramBin,
};
pub use crate::models::{
    CategoryHistogram,
    ClassHistogram,
    DataClass,
    FrequencyTable,
    MetricKind,
    Observation,
    SeriesOptions,
    SpectrumAverageCollector,
    XySeries,
};
pub use crate::reader::{
    MetricsReader,
    MetricsReport,
};

// Re-export errors
pub use crate::errors::{
    HistogramError,
    IdMetricsError,
    MetricError,
    Result,
};
