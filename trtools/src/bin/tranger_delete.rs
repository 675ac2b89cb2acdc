//! tranger_delete: list and delete messages of a TimeRanger database.

use std::io::Write;
use std::ops::ControlFlow;

use clap::Parser;
use tranger::Config;
use tranger_tools::args::{LocationArgs, MatchArgs, PresentationArgs};
use tranger_tools::output::{confirm, md_title, print_databases, RecordPrinter, Stopwatch};
use tranger_tools::targets::{open_topic, resolve_targets, Tally};
use tranger_tools::{exit_on_error, logging, parse_args, Result};

#[derive(Parser)]
#[command(name = "tranger_delete")]
#[command(about = "List and delete messages of a TimeRanger database")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    #[command(flatten)]
    presentation: PresentationArgs,

    #[command(flatten)]
    matching: MatchArgs,

    /// Regular expression the key must match
    #[arg(long = "rkey", value_name = "REGEX")]
    rkey: Option<String>,

    /// JSON object the records must match
    #[arg(long = "filter", value_name = "JSON")]
    filter: Option<String>,

    /// Delete found records
    #[arg(short = 'D', long = "delete")]
    delete: bool,

    /// List databases and their topics
    #[arg(long = "list-databases")]
    list_databases: bool,
}

fn main() {
    logging::init();
    let cli: Cli = parse_args();
    exit_on_error(run(&cli));
}

fn run(cli: &Cli) -> Result<()> {
    let stopwatch = Stopwatch::start();
    let mut condition = cli.matching.to_condition();
    condition.rkey = cli.rkey.clone();
    if let Some(filter) = &cli.filter {
        condition = condition.with_filter_json(filter)?;
    }

    let config = Config::load()?;
    let root = cli.location.root(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if cli.list_databases {
        print_databases(&mut out, &root)?;
        return Ok(());
    }

    let targets = resolve_targets(&root, &cli.location)?;

    if cli.delete {
        let question = "Do a backup! Records will be unrecoverable. Are you sure to delete?";
        if !confirm(&mut std::io::stdin().lock(), &mut out, question)? {
            writeln!(out, "Write 'yes' to continue")?;
            return Ok(());
        }
    }

    let level = if cli.presentation.table_mode() || condition.filter.is_some() {
        cli.presentation.verbose.max(3)
    } else {
        cli.presentation.verbose
    };
    let mut printer = RecordPrinter::new(level)
        .with_form(cli.presentation.form_mode())
        .with_fields(cli.presentation.field_list())
        .with_row_titles(true);
    condition.only_md = !condition.is_empty() && (cli.delete || !printer.shows_content());

    let mut tally = Tally::default();
    for target in &targets {
        let mut topic = open_topic(target, cli.delete)?;
        let filter = condition.compile(topic.last_rowid())?;
        tally.begin_topic();

        let mut doomed = Vec::new();
        let summary = topic.scan(&filter, |md, body| {
            if cli.delete {
                doomed.push(md.clone());
            } else {
                printer.print(&mut out, md, topic.dir(), body)?;
            }
            Ok(ControlFlow::Continue(()))
        })?;
        tally.add_scan(summary);

        if !doomed.is_empty() {
            let rowids: Vec<u64> = doomed.iter().map(|md| md.rowid).collect();
            tally.deleted += topic.delete(&rowids)?;
            for md in &doomed {
                writeln!(out, "Deleted {}", md_title(md))?;
            }
        }

        writeln!(
            out,
            "====> {} {}: {} records\n",
            target.database, target.topic, tally.partial
        )?;
    }

    if cli.delete {
        writeln!(
            out,
            "====> Total deleted: {} records; {}\n",
            tally.deleted,
            stopwatch.summary(tally.total)
        )?;
    } else {
        writeln!(
            out,
            "====> Total: {} records; {}\n",
            tally.found,
            stopwatch.summary(tally.total)
        )?;
    }
    Ok(())
}
