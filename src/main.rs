fn main() {
    if let Err(err) = codeplan_sync::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
