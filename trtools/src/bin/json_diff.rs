//! json_diff: compare two JSON files ignoring array order.

use std::path::PathBuf;

use clap::Parser;
use tranger::document::from_file;
use tranger::{compare, compare_verbose, CompareOptions};
use tranger_tools::{exit_on_error, logging, parse_args, CliError, Result};

#[derive(Parser)]
#[command(name = "json_diff")]
#[command(about = "Compare two JSON files; arrays may be disordered")]
#[command(version)]
struct Cli {
    /// Json file 1
    #[arg(short = 'a', long = "file1", value_name = "PATH")]
    file1: Option<PathBuf>,

    /// Json file 2
    #[arg(short = 'b', long = "file2", value_name = "PATH")]
    file2: Option<PathBuf>,

    /// Without metadata (__* fields)
    #[arg(short = 'm', long = "without_metadata")]
    without_metadata: bool,

    /// Without private (_* fields)
    #[arg(short = 'p', long = "without_private")]
    without_private: bool,

    /// Show the first difference found
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    logging::init();
    let cli: Cli = parse_args();
    exit_on_error(run(&cli));
}

fn run(cli: &Cli) -> Result<()> {
    let file1 = cli
        .file1
        .as_deref()
        .ok_or_else(|| CliError::usage("What file1 path?"))?;
    let file2 = cli
        .file2
        .as_deref()
        .ok_or_else(|| CliError::usage("What file2 path?"))?;

    let first = from_file(file1)
        .map_err(|e| CliError::usage(format!("{}: {}", file1.display(), e)))?;
    let second = from_file(file2)
        .map_err(|e| CliError::SecondInput(format!("{}: {}", file2.display(), e)))?;

    let options = CompareOptions::new(cli.without_metadata, cli.without_private);
    let equal = if cli.verbose {
        let comparison = compare_verbose(&first, &second, options);
        if let Some(divergence) = &comparison.divergence {
            println!("{}", divergence);
        }
        comparison.equal
    } else {
        compare(&first, &second, options)
    };

    println!("Same json? {}", if equal { "yes" } else { "no" });
    Ok(())
}
