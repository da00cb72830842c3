fn main() {
    if let Err(e) = medcheck_lib::run() {
        eprintln!("medcheck: {e}");
        std::process::exit(1);
    }
}
