fn main() {
    if let Err(err) = ald_prep::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
