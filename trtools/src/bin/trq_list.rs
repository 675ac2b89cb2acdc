//! trq_list: list the messages of a queue topic.
//!
//! A queue is a topic whose records carry the pending bit in their user
//! flag until they are acknowledged.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;

use clap::Parser;
use tranger::schema::QUEUE_MSG_PENDING;
use tranger::{DatabaseLocation, MatchCondition, TimeRanger};
use tranger_tools::output::{md_detail, md_title, print_json};
use tranger_tools::{exit_on_error, logging, parse_args, CliError, Result};

#[derive(Parser)]
#[command(name = "trq_list")]
#[command(about = "List messages of a TimeRanger queue")]
#[command(version)]
struct Cli {
    /// Verbose level (0=total, 1=metadata, 2=metadata+path, 3=metadata+record)
    #[arg(short = 'l', long = "verbose", value_name = "LEVEL", default_value_t = 0)]
    verbose: u8,

    /// List all messages, not only pending ones
    #[arg(short = 'f', long = "full")]
    full: bool,

    /// Queue database directory
    #[arg(short = 'a', long = "database", value_name = "DATABASE")]
    database: Option<PathBuf>,

    /// Queue topic name
    #[arg(short = 'b', long = "topic", value_name = "TOPIC")]
    topic: Option<String>,

    /// From rowid; negative counts back from the last record
    #[arg(long = "from", value_name = "ROWID", allow_hyphen_values = true)]
    from: Option<i64>,

    /// To rowid; negative counts back from the last record
    #[arg(long = "to", value_name = "ROWID", allow_hyphen_values = true)]
    to: Option<i64>,

    /// Key
    #[arg(long = "key", value_name = "KEY")]
    key: Option<String>,
}

impl Cli {
    fn condition(&self) -> MatchCondition {
        MatchCondition {
            from_rowid: self.from,
            to_rowid: self.to,
            key: self.key.clone(),
            user_flag_mask_set: (!self.full).then_some(QUEUE_MSG_PENDING),
            only_md: self.verbose < 3,
            ..MatchCondition::default()
        }
    }
}

fn main() {
    logging::init();
    let cli: Cli = parse_args();
    exit_on_error(run(&cli));
}

fn run(cli: &Cli) -> Result<()> {
    let database = cli
        .database
        .as_deref()
        .ok_or_else(|| CliError::usage("What queue database?"))?;
    let topic_name = cli
        .topic
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CliError::usage("What queue topic?"))?;

    let location = DatabaseLocation::from_database_dir(database)?;
    let tranger = TimeRanger::startup(&location.root, &location.database, false)?;
    let topic = tranger.open_topic(topic_name)?;
    let filter = cli.condition().compile(topic.last_rowid())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let summary = topic.scan(&filter, |md, body| {
        match cli.verbose {
            0 => {}
            1 => writeln!(out, "{}", md_title(md))?,
            2 => writeln!(out, "{}", md_detail(md, topic.dir()))?,
            _ => print_json(&mut out, &md_title(md), &body.into_document()?)?,
        }
        Ok(ControlFlow::Continue(()))
    })?;

    writeln!(out, "Total: {} records\n", summary.matched)?;
    Ok(())
}
