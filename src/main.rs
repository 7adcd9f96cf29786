use anyhow::Result;
use focustally::cli::run_cli;

fn main() -> Result<()> {
    run_cli().inspect_err(|e| {
        eprintln!("Error running focustally {e:?}");
    })
}
