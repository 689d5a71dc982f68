use std::{fmt, time::Duration};

use miette::Diagnostic;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, error, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.electricitymap.org/v3/carbon-intensity/history";

/// Length of the trailing window requested from the history endpoint.
pub const HISTORY_WINDOW: time::Duration = time::Duration::hours(24);

/// Decoded body of the history endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryPayload {
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<RawHistoryRecord>,
}

/// `null` reads as no history, and any entry that is not an object reads as
/// an empty record so that normalization drops it.
fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<RawHistoryRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            entry @ serde_json::Value::Object(_) => {
                RawHistoryRecord::deserialize(entry).unwrap_or_default()
            }
            _ => RawHistoryRecord::default(),
        })
        .collect())
}

/// A history entry as the API sends it. Both fields are kept as raw JSON so
/// that a `null` or a value of the wrong type only drops the entry instead of
/// failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawHistoryRecord {
    #[serde(default)]
    pub datetime: Option<serde_json::Value>,
    #[serde(default, rename = "carbonIntensity")]
    pub carbon_intensity: Option<serde_json::Value>,
}

impl RawHistoryRecord {
    pub fn datetime_str(&self) -> Option<&str> {
        self.datetime.as_ref()?.as_str()
    }

    pub fn intensity(&self) -> Option<f64> {
        self.carbon_intensity.as_ref()?.as_f64()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("Region code must not be empty")]
    #[diagnostic(code(carbon_intensity::fetch::empty_region))]
    EmptyRegion,
    #[error("Could not format the history window: {0}")]
    #[diagnostic(code(carbon_intensity::fetch::window))]
    Window(#[from] time::error::Format),
    #[error("Request error occurred: {0}")]
    #[diagnostic(code(carbon_intensity::fetch::transport))]
    Transport(#[source] Box<ureq::Transport>),
    #[error("Request error occurred: server answered with status {status}")]
    #[diagnostic(code(carbon_intensity::fetch::status))]
    Status { status: u16, body: String },
    #[error("Could not read the response body: {0}")]
    #[diagnostic(code(carbon_intensity::fetch::body))]
    Body(#[source] std::io::Error),
    #[error("Malformed JSON in response: {0}")]
    #[diagnostic(code(carbon_intensity::fetch::decode))]
    Decode(#[from] serde_json::Error),
}

/// Returns the `(start, end)` of the history window ending at `now`, with the
/// sub-second part of `now` dropped.
pub fn history_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let end = now - time::Duration::nanoseconds(i64::from(now.nanosecond()));
    (end - HISTORY_WINDOW, end)
}

/// Client of the carbon intensity history endpoint.
#[derive(Clone)]
pub struct Fetcher {
    api_token: String,
    endpoint: String,
    timeout: Option<Duration>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("api_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Fetcher {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            endpoint: String::from(DEFAULT_ENDPOINT),
            timeout: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches and decodes the last 24 hours of history for `region`.
    ///
    /// Every failure is logged here before being returned, callers only have
    /// to decide what to tell the user.
    pub fn fetch(&self, region: &str) -> Result<HistoryPayload, FetchError> {
        let body = self.fetch_raw(region)?;
        let payload: HistoryPayload = serde_json::from_str(&body).map_err(|err| {
            error!(%err, region, "malformed history payload");
            FetchError::from(err)
        })?;

        info!(
            zone = payload.zone.as_deref().unwrap_or(region),
            records = payload.history.len(),
            "fetched carbon intensity history"
        );
        Ok(payload)
    }

    /// Same request as [`Fetcher::fetch`] but returns the body untouched.
    pub fn fetch_raw(&self, region: &str) -> Result<String, FetchError> {
        self.request(region, OffsetDateTime::now_utc())
            .inspect_err(|err| error!(%err, region, "request error occurred"))
    }

    fn request(&self, region: &str, now: OffsetDateTime) -> Result<String, FetchError> {
        if region.trim().is_empty() {
            return Err(FetchError::EmptyRegion);
        }

        let (start, end) = history_window(now);
        let start = start.format(&Rfc3339)?;
        let end = end.format(&Rfc3339)?;
        debug!(endpoint = %self.endpoint, region, %start, %end, "requesting history");

        let response = self
            .agent()
            .get(&self.endpoint)
            .set("auth-token", &self.api_token)
            .query("zone", region)
            .query("start", &start)
            .query("end", &end)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => FetchError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(transport) => FetchError::Transport(Box::new(transport)),
            })?;

        response.into_string().map_err(FetchError::Body)
    }

    fn agent(&self) -> ureq::Agent {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
