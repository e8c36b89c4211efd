fn main() {
    if let Err(e) = famforge::cli::run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
