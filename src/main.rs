use std::process;

fn main() {
    if let Err(e) = specline::app::run() {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
