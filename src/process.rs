use miette::Diagnostic;
use thiserror::Error;
use time::{format_description::BorrowedFormatItem, macros::format_description, PrimitiveDateTime};
use tracing::{debug, warn};

use crate::{HistoryPayload, IntensitySample};

/// `2024-01-01T00:00:00.000Z`, the fraction can have any number of digits.
const API_DATETIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z");

const SAMPLE_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Error, Diagnostic)]
pub enum NormalizeError {
    #[error("Malformed timestamp `{value}` in history record {index}: {source}")]
    #[diagnostic(
        code(carbon_intensity::normalize::malformed_timestamp),
        help("expected a UTC timestamp such as `2024-01-01T00:00:00.000Z`")
    )]
    MalformedTimestamp {
        index: usize,
        value: String,
        #[source]
        source: time::error::Error,
    },
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Intensity list is empty.")]
    #[diagnostic(code(carbon_intensity::aggregate::empty))]
    Empty,
}

/// Turns the raw history into samples.
///
/// Entries lacking a `datetime` string or a numeric `carbonIntensity` are
/// skipped. A `datetime` string that does not parse aborts the whole call.
pub fn normalize(payload: &HistoryPayload) -> Result<Vec<IntensitySample>, NormalizeError> {
    let mut samples = Vec::with_capacity(payload.history.len());

    for (index, record) in payload.history.iter().enumerate() {
        let (Some(datetime), Some(intensity)) = (record.datetime_str(), record.intensity()) else {
            debug!(index, "dropping incomplete history record");
            continue;
        };

        let timestamp = reformat(datetime).map_err(|source| {
            warn!(index, datetime, "unparseable history timestamp");
            NormalizeError::MalformedTimestamp {
                index,
                value: datetime.to_string(),
                source,
            }
        })?;

        samples.push(IntensitySample {
            timestamp,
            intensity,
        });
    }

    debug!(
        kept = samples.len(),
        dropped = payload.history.len() - samples.len(),
        "normalized history"
    );
    Ok(samples)
}

fn reformat(datetime: &str) -> Result<String, time::error::Error> {
    let parsed = PrimitiveDateTime::parse(datetime, API_DATETIME)?;
    Ok(parsed.format(SAMPLE_TIMESTAMP)?)
}

/// Plain arithmetic mean of `values`.
pub fn average_intensity(values: &[f64]) -> Result<f64, AggregateError> {
    if values.is_empty() {
        return Err(AggregateError::Empty);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> HistoryPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn normalizes_two_hours() {
        let samples = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T00:00:00.000Z","carbonIntensity":120},
                {"datetime":"2024-01-01T01:00:00.000Z","carbonIntensity":100}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(
            samples,
            vec![
                IntensitySample::new("2024-01-01 00:00:00", 120.0),
                IntensitySample::new("2024-01-01 01:00:00", 100.0),
            ]
        );
        let values: Vec<f64> = samples.iter().map(|s| s.intensity).collect();
        assert_eq!(format!("{:.2}", average_intensity(&values).unwrap()), "110.00");
    }

    #[test]
    fn drops_incomplete_records() {
        let samples = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T00:00:00.000Z","carbonIntensity":120},
                {"datetime":"2024-01-01T01:00:00.000Z"},
                {"datetime":"2024-01-01T02:00:00.000Z","carbonIntensity":90.5}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, "2024-01-01 00:00:00");
        assert_eq!(samples[1].timestamp, "2024-01-01 02:00:00");
        assert_eq!(samples[1].intensity, 90.5);
    }

    #[test]
    fn drops_null_and_mistyped_fields() {
        let samples = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T00:00:00.000Z","carbonIntensity":null},
                {"datetime":1704067200,"carbonIntensity":120},
                {"datetime":"2024-01-01T02:00:00.000Z","carbonIntensity":"120"},
                {"carbonIntensity":120}
            ]}"#,
        ))
        .unwrap();

        assert!(samples.is_empty());
    }

    #[test]
    fn keeps_api_order() {
        let samples = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T05:00:00.000Z","carbonIntensity":1},
                {"datetime":"2024-01-01T03:00:00.000Z","carbonIntensity":2},
                {"datetime":"2024-01-01T04:00:00.000Z","carbonIntensity":3}
            ]}"#,
        ))
        .unwrap();

        let timestamps: Vec<&str> = samples.iter().map(|s| s.timestamp.as_str()).collect();
        assert_eq!(
            timestamps,
            ["2024-01-01 05:00:00", "2024-01-01 03:00:00", "2024-01-01 04:00:00"]
        );
    }

    #[test]
    fn drops_sub_second_precision() {
        let samples = normalize(&payload(
            r#"{"history":[{"datetime":"2024-03-10T23:59:59.999999Z","carbonIntensity":42}]}"#,
        ))
        .unwrap();
        assert_eq!(samples[0].timestamp, "2024-03-10 23:59:59");
    }

    #[test]
    fn drops_non_object_entries() {
        let samples = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T00:00:00.000Z","carbonIntensity":120},
                null,
                {"datetime":"2024-01-01T02:00:00.000Z","carbonIntensity":80}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(
            samples,
            vec![
                IntensitySample::new("2024-01-01 00:00:00", 120.0),
                IntensitySample::new("2024-01-01 02:00:00", 80.0),
            ]
        );
    }

    #[test]
    fn missing_history_is_empty() {
        assert!(normalize(&payload("{}")).unwrap().is_empty());
        assert!(normalize(&payload(r#"{"history":null}"#)).unwrap().is_empty());
        assert!(normalize(&payload(r#"{"history":[]}"#)).unwrap().is_empty());
    }

    #[test]
    fn malformed_timestamp_aborts() {
        let err = normalize(&payload(
            r#"{"history":[
                {"datetime":"2024-01-01T00:00:00.000Z","carbonIntensity":120},
                {"datetime":"yesterday at noon","carbonIntensity":100}
            ]}"#,
        ))
        .unwrap_err();

        let NormalizeError::MalformedTimestamp { index, value, .. } = err;
        assert_eq!(index, 1);
        assert_eq!(value, "yesterday at noon");
    }

    #[test]
    fn timestamp_without_fraction_is_malformed() {
        let err = normalize(&payload(
            r#"{"history":[{"datetime":"2024-01-01T00:00:00Z","carbonIntensity":120}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedTimestamp { index: 0, .. }));
    }

    #[test]
    fn average_of_nothing_fails() {
        assert_eq!(average_intensity(&[]), Err(AggregateError::Empty));
        assert_eq!(AggregateError::Empty.to_string(), "Intensity list is empty.");
    }

    #[test]
    fn average_of_one_is_itself() {
        assert_eq!(average_intensity(&[231.7]), Ok(231.7));
    }

    #[test]
    fn average_ignores_order() {
        let forward = [120.0, 100.0, 95.5, 310.25, 42.0];
        let mut backward = forward;
        backward.reverse();
        let mut shuffled = forward;
        shuffled.swap(0, 3);
        shuffled.swap(1, 4);

        let expected = average_intensity(&forward).unwrap();
        for values in [backward, shuffled] {
            assert!((average_intensity(&values).unwrap() - expected).abs() < 1e-9);
        }
    }
}
