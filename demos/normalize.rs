use carbon_intensity::{normalize, HistoryPayload, Report};

fn main() {
    let file = std::env::args().nth(1).expect("Missing filename");
    println!("opening {file}");
    let file = std::fs::read_to_string(file).unwrap();

    let payload: HistoryPayload = serde_json::from_str(&file).unwrap();
    let samples = normalize(&payload).unwrap();
    println!(
        "Kept {} of {} history records",
        samples.len(),
        payload.history.len()
    );

    let report = Report::new(samples).expect("No valid data in the history");
    let range = report.intensity_range();
    println!(
        "From {} to {}: mean {:.2}, low {:.2}, high {:.2} gCO2eq/kWh",
        report.first_timestamp(),
        report.last_timestamp(),
        report.mean(),
        range.start,
        range.end,
    );
}
