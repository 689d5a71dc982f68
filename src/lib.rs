use std::ops::Range;

mod fetch;
mod process;
mod render;
mod service;

pub use fetch::{history_window, FetchError, Fetcher, HistoryPayload, RawHistoryRecord};
pub use fetch::{DEFAULT_ENDPOINT, HISTORY_WINDOW};
pub use process::{average_intensity, normalize, AggregateError, NormalizeError};
pub use render::{render, to_csv, to_html, write_table, RenderError, ReportFiles};
pub use render::{CSV_FILE_NAME, HTML_FILE_NAME};
pub use service::{CarbonIntensityService, RunOutcome, ServiceError};

/// One validated reading of the history, in API order.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensitySample {
    /// `YYYY-MM-DD HH:MM:SS`, UTC without the zone suffix.
    pub timestamp: String,
    /// gCO2eq/kWh
    pub intensity: f64,
}

impl IntensitySample {
    pub fn new(timestamp: impl Into<String>, intensity: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            intensity,
        }
    }
}

/// The normalized samples of a run together with their mean intensity.
///
/// A report can only be built from at least one sample, so the mean and the
/// accessors below are always defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    samples: Vec<IntensitySample>,
    mean: f64,
}

impl Report {
    pub fn new(samples: Vec<IntensitySample>) -> Result<Self, AggregateError> {
        let mean = average_intensity(&intensities(&samples))?;
        Ok(Self { samples, mean })
    }

    pub fn samples(&self) -> &[IntensitySample] {
        &self.samples
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> &str {
        &self.samples[0].timestamp
    }

    pub fn last_timestamp(&self) -> &str {
        &self.samples[self.samples.len() - 1].timestamp
    }

    /// Lowest to highest intensity of the report.
    pub fn intensity_range(&self) -> Range<f64> {
        let first = self.samples[0].intensity;
        self.samples
            .iter()
            .map(|sample| sample.intensity)
            .fold(first..first, |range, intensity| {
                range.start.min(intensity)..range.end.max(intensity)
            })
    }
}

/// Extracts the intensity column of a sample sequence, keeping its order.
pub fn intensities(samples: &[IntensitySample]) -> Vec<f64> {
    samples.iter().map(|sample| sample.intensity).collect()
}
