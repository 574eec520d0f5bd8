fn main() {
    if let Err(err) = report_etl::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
