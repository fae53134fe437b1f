fn main() {
    if let Err(e) = epa_feedback_lib::run() {
        eprintln!("epa-feedback: {e}");
        std::process::exit(1);
    }
}
