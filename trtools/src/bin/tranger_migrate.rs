//! tranger_migrate: copy matching records into a new TimeRanger database.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use clap::Parser;
use tranger::store::walk::is_database_dir;
use tranger::{Config, Document, TimeRanger, TopicLocation};
use tranger_tools::args::{LocationArgs, MatchArgs};
use tranger_tools::output::{RecordPrinter, Stopwatch};
use tranger_tools::targets::{resolve_targets, Tally};
use tranger_tools::{exit_on_error, logging, parse_args, CliError, Result};

#[derive(Parser)]
#[command(name = "tranger_migrate")]
#[command(about = "Migrate messages of a TimeRanger database to another path")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    /// Destination directory
    #[arg(short = 'd', long = "destination", value_name = "DESTINATION")]
    destination: Option<PathBuf>,

    /// Verbose level (0=total, 1=metadata, 2=metadata+path, 3=metadata+record)
    #[arg(short = 'l', long = "verbose", value_name = "LEVEL", default_value_t = 0)]
    verbose: u8,

    #[command(flatten)]
    matching: MatchArgs,

    /// Name of the old primary key
    #[arg(long = "change-pkey", value_name = "OLD-PKEY-NAME")]
    change_pkey: Option<String>,

    /// Name of the new primary key
    #[arg(long = "new-pkey", value_name = "NEW-PKEY-NAME")]
    new_pkey: Option<String>,
}

/// Primary key rename applied to migrated records.
struct PkeyChange {
    old: String,
    new: String,
}

impl PkeyChange {
    fn apply(&self, mut doc: Document) -> Document {
        if let Some(obj) = doc.as_object_mut() {
            if !obj.contains_key(&self.new) {
                if let Some(value) = obj.shift_remove(&self.old) {
                    obj.insert(self.new.clone(), value);
                }
            }
        }
        doc
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
    let destination = cli.destination.as_deref().ok_or_else(|| {
        CliError::usage("What destination path? You must supply --destination option")
    })?;
    if !destination.is_dir() {
        return Err(CliError::usage(format!(
            "Destination path '{}' is not a directory",
            destination.display()
        )));
    }
    if is_inside(destination, &root) {
        return Err(CliError::usage(format!(
            "Can't override tranger: destination '{}' is inside '{}'",
            destination.display(),
            root.display()
        )));
    }

    let pkey_change = match (&cli.change_pkey, &cli.new_pkey) {
        (Some(old), Some(new)) if !new.is_empty() => Some(PkeyChange {
            old: old.clone(),
            new: new.clone(),
        }),
        (Some(_), _) => return Err(CliError::usage("What new pkey?")),
        (None, _) => None,
    };

    let condition = cli.matching.to_condition();
    let targets = resolve_targets(&root, &cli.location)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut printer = RecordPrinter::new(cli.verbose).with_form(true);
    let mut tally = Tally::default();

    for target in &targets {
        tally.begin_topic();
        let migrated = migrate_topic(
            target,
            destination,
            &condition,
            pkey_change.as_ref(),
            &mut printer,
            &mut out,
            &mut tally,
        )?;
        tally.migrated += migrated;
        writeln!(
            out,
            "\n====> {} {}: {} records",
            target.database, target.topic, migrated
        )?;
    }

    writeln!(
        out,
        "\n====> Migrate: {} records of {} records; {}\n",
        tally.migrated,
        tally.total,
        stopwatch.summary(tally.total)
    )?;
    Ok(())
}

fn migrate_topic<W: Write>(
    target: &TopicLocation,
    destination: &Path,
    condition: &tranger::MatchCondition,
    pkey_change: Option<&PkeyChange>,
    printer: &mut RecordPrinter,
    out: &mut W,
    tally: &mut Tally,
) -> Result<usize> {
    let source = TimeRanger::startup(&target.root, &target.database, false)?;
    let src_topic = source.open_topic(&target.topic)?;

    let dest = if is_database_dir(&destination.join(&target.database)) {
        TimeRanger::startup(destination, &target.database, true)?
    } else {
        TimeRanger::create_database(destination, &target.database, source.desc().clone())?
    };
    if dest.topic_exists(&target.topic) {
        return Err(CliError::usage(format!(
            "Destination topic ALREADY exists: {}",
            target.topic
        )));
    }

    let mut desc = src_topic.desc().clone();
    if let Some(change) = pkey_change {
        desc.pkey = change.new.clone();
    }
    let mut dst_topic = dest.create_topic(&target.topic, desc)?;

    let filter = condition.compile(src_topic.last_rowid())?;
    let mut migrated = 0;
    let summary = src_topic.scan(&filter, |md, body| {
        let mut doc = body.into_document()?;
        if let Some(change) = pkey_change {
            doc = change.apply(doc);
        }
        printer.print_document(out, md, src_topic.dir(), &doc)?;
        dst_topic.append(md.t, md.user_flag, &doc)?;
        migrated += 1;
        Ok(ControlFlow::Continue(()))
    })?;
    tally.add_scan(summary);
    Ok(migrated)
}

/// Whether `path` is `root` or lies below it, after resolving symlinks.
fn is_inside(path: &Path, root: &Path) -> bool {
    let resolve = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    resolve(path).starts_with(resolve(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_pkey_change_renames_field() {
        let change = PkeyChange {
            old: "id".into(),
            new: "device".into(),
        };
        assert_eq!(change.apply(json!({"id": "a", "v": 1})), json!({"device": "a", "v": 1}));
        assert_eq!(
            change.apply(json!({"id": "a", "device": "b"})),
            json!({"id": "a", "device": "b"})
        );
    }

    #[test]
    fn test_is_inside() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("store/backup");
        std::fs::create_dir_all(&nested).unwrap();
        assert!(is_inside(&nested, &tmp.path().join("store")));
        assert!(is_inside(tmp.path(), tmp.path()));
        assert!(!is_inside(tmp.path(), &tmp.path().join("store")));
    }
}
