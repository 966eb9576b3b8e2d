fn main() {
    if let Err(err) = srpvac::cli::run() {
        let verbose = std::env::args().any(|a| a == "--verbose");
        srpvac::ui::eprintln_error(&err, verbose);
        std::process::exit(srpvac::exit::exit_code(&err));
    }
}
