use carbon_intensity::Fetcher;

fn main() {
    let token = std::env::var("ELECTRICITYMAP_API_TOKEN").expect("Missing ELECTRICITYMAP_API_TOKEN");
    let fetcher = Fetcher::new(token);

    for region in std::env::args().skip(1) {
        let body = match fetcher.fetch_raw(&region) {
            Ok(body) => body,
            Err(e) => {
                eprintln!("Could not fetch history for {region}. {e}");
                continue;
            }
        };

        std::fs::write(format!("{region}.json"), &body).unwrap();

        println!("Wrote history of {region}");
    }
}
