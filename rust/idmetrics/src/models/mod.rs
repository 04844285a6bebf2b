pub mod bins;
pub mod category;
pub mod classification;
pub mod dataset;
pub mod histogram;
pub mod spectrum_avg;

pub use bins::{
    BinSet,
    HistogramBin,
};
pub use category::CategoryHistogram;
pub use classification::DataClass;
pub use dataset::{
    MetricKind,
    Observation,
    SeriesOptions,
    XySeries,
};
pub use histogram::{
    ClassHistogram,
    FrequencyTable,
};
pub use spectrum_avg::SpectrumAverageCollector;
