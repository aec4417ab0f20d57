use std::process;

fn main() {
    if let Err(err) = tally::app::run() {
        eprintln!("fatal: {err}");
        process::exit(1);
    }
}
