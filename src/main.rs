use std::process;

fn main() {
    if let Err(err) = healthmon::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
