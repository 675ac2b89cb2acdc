//! Resolve command-line locations into topic directories.

use std::path::Path;

use tranger::store::walk::is_topic_dir;
use tranger::store::{find_databases, find_topics};
use tranger::{ScanSummary, TimeRanger, Topic, TopicLocation};

use crate::args::LocationArgs;
use crate::error::{CliError, Result};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Records examined across all topics.
    pub total: usize,
    /// Records matched in the current topic.
    pub partial: usize,
    /// Records matched across all topics.
    pub found: usize,
    pub migrated: usize,
    pub deleted: usize,
}

impl Tally {
    pub fn begin_topic(&mut self) {
        self.partial = 0;
    }

    pub fn add_scan(&mut self, summary: ScanSummary) {
        self.total += summary.visited;
        self.found += summary.matched;
        self.partial += summary.matched;
    }
}

/// Topics selected by the location flags under `root`.
///
/// A `root` that is itself a topic directory wins. Otherwise a single
/// `<root>/<database>/<topic>` is required unless `recursive` is set.
pub fn resolve_targets(root: &Path, location: &LocationArgs) -> Result<Vec<TopicLocation>> {
    if is_topic_dir(root) {
        return Ok(vec![TopicLocation::from_topic_dir(root)?]);
    }
    if !root.is_dir() {
        return Err(CliError::usage(format!("Path not found: '{}'", root.display())));
    }

    let database = location.database.as_deref().filter(|d| !d.is_empty());
    let topic = location.topic.as_deref().filter(|t| !t.is_empty());

    if location.recursive {
        let mut targets = Vec::new();
        match database {
            Some(database) => targets.extend(find_topics(&root.join(database))?),
            None => {
                for db in find_databases(root)? {
                    targets.extend(find_topics(&db.path())?);
                }
            }
        }
        if let Some(topic) = topic {
            targets.retain(|t| t.topic == topic);
        }
        return Ok(targets);
    }

    let Some(database) = database else {
        return Err(CliError::usage(format!("What Database?{}", available_databases(root))));
    };
    let Some(topic) = topic else {
        return Err(CliError::usage(format!(
            "What Topic?{}",
            available_topics(&root.join(database))
        )));
    };
    let dir = root.join(database).join(topic);
    if !is_topic_dir(&dir) {
        return Err(CliError::usage(format!("Path not found: '{}'", dir.display())));
    }
    Ok(vec![TopicLocation::from_topic_dir(&dir)?])
}

fn available_databases(root: &Path) -> String {
    let names: Vec<String> = find_databases(root)
        .unwrap_or_default()
        .into_iter()
        .map(|db| db.database)
        .collect();
    found_list(&names)
}

fn available_topics(db_dir: &Path) -> String {
    let names: Vec<String> = find_topics(db_dir)
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.topic)
        .collect();
    found_list(&names)
}

fn found_list(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(" Found: {}", names.join(", "))
    }
}

/// Open the topic at `location`. Only a master handle may modify it.
pub fn open_topic(location: &TopicLocation, master: bool) -> Result<Topic> {
    let tranger = TimeRanger::startup(&location.root, &location.database, master)?;
    Ok(tranger.open_topic(&location.topic)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tranger::TopicDesc;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (db, topic) in [("gps", "tracks"), ("gps", "alarms"), ("queues", "tracks")] {
            let tranger = TimeRanger::startup(tmp.path(), db, true).unwrap();
            tranger.create_topic(topic, TopicDesc::new(topic, "id", "")).unwrap();
        }
        tmp
    }

    fn names(targets: &[TopicLocation]) -> Vec<String> {
        targets
            .iter()
            .map(|t| format!("{}/{}", t.database, t.topic))
            .collect()
    }

    #[test]
    fn test_topic_dir_path_wins() {
        let tmp = fixture();
        let location = LocationArgs::default();
        let targets = resolve_targets(&tmp.path().join("gps/alarms"), &location).unwrap();
        assert_eq!(names(&targets), vec!["gps/alarms"]);
    }

    #[test]
    fn test_single_topic_requires_database_and_topic() {
        let tmp = fixture();
        let err = resolve_targets(tmp.path(), &LocationArgs::default()).unwrap_err();
        assert_eq!(err.to_string(), "What Database? Found: gps, queues");

        let location = LocationArgs {
            database: Some("gps".into()),
            ..Default::default()
        };
        let err = resolve_targets(tmp.path(), &location).unwrap_err();
        assert_eq!(err.to_string(), "What Topic? Found: alarms, tracks");

        let location = LocationArgs {
            database: Some("gps".into()),
            topic: Some("tracks".into()),
            ..Default::default()
        };
        assert_eq!(names(&resolve_targets(tmp.path(), &location).unwrap()), vec!["gps/tracks"]);
    }

    #[test]
    fn test_recursive_targets() {
        let tmp = fixture();
        let location = LocationArgs {
            recursive: true,
            ..Default::default()
        };
        assert_eq!(
            names(&resolve_targets(tmp.path(), &location).unwrap()),
            vec!["gps/alarms", "gps/tracks", "queues/tracks"]
        );

        let location = LocationArgs {
            recursive: true,
            topic: Some("tracks".into()),
            ..Default::default()
        };
        assert_eq!(
            names(&resolve_targets(tmp.path(), &location).unwrap()),
            vec!["gps/tracks", "queues/tracks"]
        );
    }

    #[test]
    fn test_tally_accumulates() {
        let mut tally = Tally::default();
        tally.add_scan(ScanSummary { visited: 5, matched: 2 });
        tally.begin_topic();
        tally.add_scan(ScanSummary { visited: 3, matched: 1 });
        assert_eq!((tally.total, tally.found, tally.partial), (8, 3, 1));
    }
}
