fn main() {
    if let Err(err) = dispensing_eda::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
