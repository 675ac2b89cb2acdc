//! tranger_search: search text inside a content field of TimeRanger records.

use std::io::Write;
use std::ops::ControlFlow;

use clap::Parser;
use tranger::Config;
use tranger_tools::args::{ContentSearchArgs, LocationArgs, MatchArgs, PresentationArgs};
use tranger_tools::output::{RecordPrinter, Stopwatch};
use tranger_tools::targets::{open_topic, resolve_targets, Tally};
use tranger_tools::{exit_on_error, logging, parse_args, CliError, Result};

#[derive(Parser)]
#[command(name = "tranger_search")]
#[command(about = "Search messages of a TimeRanger database by content")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    #[command(flatten)]
    presentation: PresentationArgs,

    #[command(flatten)]
    matching: MatchArgs,

    #[command(flatten)]
    content: ContentSearchArgs,
}

fn main() {
    logging::init();
    let cli: Cli = parse_args();
    exit_on_error(run(&cli));
}

fn run(cli: &Cli) -> Result<()> {
    let stopwatch = Stopwatch::start();
    let mut condition = cli.matching.to_condition();
    cli.content.apply(&mut condition);
    if condition
        .search_content_key
        .as_deref()
        .map_or(true, str::is_empty)
    {
        return Err(CliError::usage(
            "You must input a key where search in his content (--search-content-key)",
        ));
    }

    let config = Config::load()?;
    let root = cli.location.root(&config)?;
    let targets = resolve_targets(&root, &cli.location)?;

    let level = if cli.presentation.table_mode() {
        cli.presentation.verbose.max(3)
    } else {
        cli.presentation.verbose
    };
    let mut printer = RecordPrinter::new(level)
        .with_form(cli.presentation.form_mode())
        .with_fields(cli.presentation.field_list());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut tally = Tally::default();

    for target in &targets {
        let topic = open_topic(target, false)?;
        let filter = condition.compile(topic.last_rowid())?;
        tally.begin_topic();

        let summary = topic.scan(&filter, |md, body| {
            printer.print(&mut out, md, topic.dir(), body)?;
            Ok(ControlFlow::Continue(()))
        })?;
        tally.add_scan(summary);

        if cli.location.recursive {
            writeln!(
                out,
                "\n====> {} {}: {} records",
                target.database, target.topic, tally.partial
            )?;
        }
    }

    writeln!(
        out,
        "\n====> Found {} records in total of {};  {}\n",
        tally.found,
        tally.total,
        stopwatch.summary(tally.total)
    )?;
    Ok(())
}
