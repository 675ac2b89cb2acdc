//! trmsg_list: list the messages of a topic grouped by key.
//!
//! Each key is one message; its records are the instances of that message
//! and the latest instance is the active one.

use std::collections::BTreeMap;
use std::io::Write;
use std::ops::ControlFlow;

use clap::Parser;
use tranger::{Config, Document, RecordMd};
use tranger_tools::args::{LocationArgs, MatchArgs, PresentationArgs};
use tranger_tools::output::{print_json, with_metadata, Stopwatch, TableWriter};
use tranger_tools::targets::{open_topic, resolve_targets, Tally};
use tranger_tools::{exit_on_error, logging, parse_args, Result};

#[derive(Parser)]
#[command(name = "trmsg_list")]
#[command(about = "List messages of a TimeRanger database grouped by key")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    // Level 0 counts messages, 1 prints the active instance, 2 adds its
    // metadata, 3 prints every instance and 4 adds their metadata.
    #[command(flatten)]
    presentation: PresentationArgs,

    #[command(flatten)]
    matching: MatchArgs,
}

/// What to print for each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Totals,
    Active { with_md: bool },
    Instances { with_md: bool },
}

impl Listing {
    fn from_level(level: u8) -> Self {
        match level {
            0 => Listing::Totals,
            1 => Listing::Active { with_md: false },
            2 => Listing::Active { with_md: true },
            3 => Listing::Instances { with_md: false },
            _ => Listing::Instances { with_md: true },
        }
    }

    fn with_md(&self) -> bool {
        matches!(
            self,
            Listing::Active { with_md: true } | Listing::Instances { with_md: true }
        )
    }
}

fn main() {
    logging::init();
    let cli: Cli = parse_args();
    exit_on_error(run(&cli));
}

fn run(cli: &Cli) -> Result<()> {
    let stopwatch = Stopwatch::start();
    let config = Config::load()?;
    let root = cli.location.root(&config)?;
    let targets = resolve_targets(&root, &cli.location)?;

    let condition = cli.matching.to_condition();
    let presentation = &cli.presentation;
    let fields = presentation.field_list();
    let listing = Listing::from_level(presentation.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut table = TableWriter::new();
    let mut tally = Tally::default();

    for target in &targets {
        let topic = open_topic(target, false)?;
        let filter = condition.compile(topic.last_rowid())?;
        tally.begin_topic();

        let mut messages: BTreeMap<String, Vec<(RecordMd, Document)>> = BTreeMap::new();
        let summary = topic.scan(&filter, |md, body| {
            let doc = if listing == Listing::Totals {
                Document::Null
            } else {
                body.into_document()?
            };
            messages.entry(md.key.clone()).or_default().push((md.clone(), doc));
            Ok(ControlFlow::Continue(()))
        })?;
        tally.total += summary.visited;

        for (key, instances) in messages {
            tally.partial += 1;
            tally.found += 1;
            let shown = match listing {
                Listing::Totals => continue,
                Listing::Active { .. } => match instances.into_iter().last() {
                    Some((md, doc)) => decorate(listing, &md, doc)?,
                    None => continue,
                },
                Listing::Instances { .. } => {
                    let mut docs = Vec::with_capacity(instances.len());
                    for (md, doc) in instances {
                        docs.push(decorate(listing, &md, doc)?);
                    }
                    Document::Array(docs)
                }
            };
            print_message(&mut out, presentation, &fields, &mut table, &key, &shown)?;
        }

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
        "\n====> Total: {} records; {}\n",
        tally.found,
        stopwatch.summary(tally.total)
    )?;
    Ok(())
}

fn decorate(listing: Listing, md: &RecordMd, doc: Document) -> Result<Document> {
    if listing.with_md() {
        Ok(with_metadata(md, doc)?)
    } else {
        Ok(doc)
    }
}

fn print_message<W: Write>(
    out: &mut W,
    presentation: &PresentationArgs,
    fields: &[String],
    table: &mut TableWriter,
    key: &str,
    shown: &Document,
) -> Result<()> {
    if !presentation.table_mode() || presentation.form_mode() {
        print_json(out, key, shown)?;
        return Ok(());
    }
    let rows = match shown {
        Document::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    };
    for row in rows {
        let row = if fields.is_empty() {
            row.clone()
        } else {
            tranger::document::select_paths(row, fields)
        };
        table.write_row(out, &row)?;
    }
    Ok(())
}
