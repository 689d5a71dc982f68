use std::{
    io::{self, Write},
    path::PathBuf,
};

use miette::Diagnostic;
use thiserror::Error;
use tracing::info;

use crate::{
    normalize, render, AggregateError, FetchError, Fetcher, NormalizeError, RenderError, Report,
};

/// How a run ended. Everything but [`RunOutcome::Completed`] is an early stop
/// that has already been reported on the console.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Report),
    FetchFailed(FetchError),
    MalformedData(NormalizeError),
    NoData,
    EmptyAggregation(AggregateError),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Process exit status for the outcome. An empty history is only
    /// informational and exits like a completed run, the other early stops
    /// mean the data could not be used.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed(_) | Self::NoData => 0,
            Self::FetchFailed(_) | Self::MalformedData(_) | Self::EmptyAggregation(_) => 1,
        }
    }
}

/// Failures the run cannot report on the console itself.
#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("Could not write to the console: {0}")]
    #[diagnostic(code(carbon_intensity::service::console))]
    Console(#[from] io::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),
}

/// Fetches, normalizes, renders and averages the history of one region.
#[derive(Debug, Clone)]
pub struct CarbonIntensityService {
    fetcher: Fetcher,
    region: String,
    report_dir: PathBuf,
}

impl CarbonIntensityService {
    pub fn new(api_token: impl Into<String>, region: impl Into<String>) -> Self {
        Self::from_fetcher(Fetcher::new(api_token), region)
    }

    pub fn from_fetcher(fetcher: Fetcher, region: impl Into<String>) -> Self {
        Self {
            fetcher,
            region: region.into(),
            report_dir: PathBuf::from("."),
        }
    }

    /// Directory receiving the CSV and HTML reports, the working directory by
    /// default.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn run(&self, out: &mut impl Write) -> Result<RunOutcome, ServiceError> {
        let payload = match self.fetcher.fetch(&self.region) {
            Ok(payload) => payload,
            Err(err) => {
                writeln!(out, "Failed to retrieve data.")?;
                return Ok(RunOutcome::FetchFailed(err));
            }
        };

        let samples = match normalize(&payload) {
            Ok(samples) => samples,
            Err(err) => {
                writeln!(out, "{err}")?;
                return Ok(RunOutcome::MalformedData(err));
            }
        };
        if samples.is_empty() {
            writeln!(out, "No valid data to process.")?;
            return Ok(RunOutcome::NoData);
        }

        render(&samples, out, &self.report_dir)?;

        let report = match Report::new(samples) {
            Ok(report) => report,
            Err(err) => {
                writeln!(out, "{err}")?;
                return Ok(RunOutcome::EmptyAggregation(err));
            }
        };

        writeln!(
            out,
            "\nAverage Carbon Intensity over the last 24 hours: {:.2} gCO2eq/kWh",
            report.mean()
        )?;
        info!(
            region = %self.region,
            samples = report.len(),
            mean = report.mean(),
            "run completed"
        );
        Ok(RunOutcome::Completed(report))
    }
}
