use clap::Parser;
use edgefinder::cli::{init_logging, run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
