use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use miette::Diagnostic;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::IntensitySample;

pub const CSV_FILE_NAME: &str = "carbon_intensity_data.csv";
pub const HTML_FILE_NAME: &str = "carbon_intensity_data.html";

const INTENSITY_HEADER: &str = "Carbon Intensity (gCO2eq/kWh)";

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("Could not print the table: {0}")]
    #[diagnostic(code(carbon_intensity::render::console))]
    Console(#[source] io::Error),
    #[error("Could not encode the CSV report: {0}")]
    #[diagnostic(code(carbon_intensity::render::csv))]
    Csv(#[from] csv::Error),
    #[error("Could not write `{}`: {source}", .path.display())]
    #[diagnostic(code(carbon_intensity::render::write))]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where [`render`] placed its reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub csv: PathBuf,
    pub html: PathBuf,
}

/// Prints the table to `out` then writes the CSV and HTML reports in `dir`,
/// replacing any previous ones.
pub fn render(
    samples: &[IntensitySample],
    out: &mut impl Write,
    dir: &Path,
) -> Result<ReportFiles, RenderError> {
    write_table(out, samples).map_err(RenderError::Console)?;

    let files = ReportFiles {
        csv: dir.join(CSV_FILE_NAME),
        html: dir.join(HTML_FILE_NAME),
    };
    place(&files.csv, &to_csv(samples)?)?;
    place(&files.html, to_html(samples).as_bytes())?;

    info!(
        csv = %files.csv.display(),
        html = %files.html.display(),
        samples = samples.len(),
        "wrote reports"
    );
    Ok(files)
}

/// Fixed width console table: a 20 character timestamp column and the
/// intensity with two decimals.
pub fn write_table(out: &mut impl Write, samples: &[IntensitySample]) -> io::Result<()> {
    writeln!(out, "{:<20} | {INTENSITY_HEADER}", "Timestamp")?;
    writeln!(out, "{}", "-".repeat(50))?;
    for sample in samples {
        writeln!(out, "{:<20} | {:.2}", sample.timestamp, sample.intensity)?;
    }
    Ok(())
}

pub fn to_csv(samples: &[IntensitySample]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(["Timestamp", INTENSITY_HEADER])?;
    for sample in samples {
        writer.write_record([
            sample.timestamp.as_str(),
            format!("{:.2}", sample.intensity).as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// A standalone page holding the same table as the console.
pub fn to_html(samples: &[IntensitySample]) -> String {
    let mut html = String::from(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Carbon Intensity Data</title>
<style>
  body { font-family: sans-serif; margin: 2em; color: #222; }
  table { border-collapse: collapse; }
  th, td { border: 1px solid #ccc; padding: 4px 12px; }
  th { background: #eef3ee; text-align: left; }
  td:last-child { text-align: right; }
</style>
</head>
<body>
<h1>Carbon Intensity Data</h1>
<table>
<thead>
"#,
    );
    html.push_str(&format!(
        "<tr><th>Timestamp</th><th>{}</th></tr>\n",
        escape(INTENSITY_HEADER)
    ));
    html.push_str("</thead>\n<tbody>\n");
    for sample in samples {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}</td></tr>\n",
            escape(&sample.timestamp),
            sample.intensity
        ));
    }
    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Writes `contents` to a temporary file next to `path` and renames it over
/// `path`, so a reader never sees a half written report.
fn place(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    let write_error = |source: io::Error| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(contents).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    file.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}
