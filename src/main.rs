fn main() {
    if let Err(err) = gradex_ingest::cli::run() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}
