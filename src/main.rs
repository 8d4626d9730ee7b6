fn main() {
    if let Err(e) = parlor_lib::run() {
        eprintln!("parlor: {}", e);
        std::process::exit(1);
    }
}
