use clap::Parser;
use sentrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
