//! Store - file-based TimeRanger databases.
//!
//! A database is a directory holding `__timeranger__.json` and one
//! subdirectory per topic. Only a master handle may create or modify.

mod atomic;
mod topic;
pub mod walk;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::schema::{TopicDesc, TrangerDesc, TRANGER_DESC_FILE};
use crate::{Error, Result};

pub use topic::{ScanSummary, Topic};
pub use walk::{find_databases, find_topics, DatabaseLocation, TopicLocation};

/// Handle on one database.
#[derive(Debug)]
pub struct TimeRanger {
    path: PathBuf,
    desc: TrangerDesc,
    master: bool,
}

impl TimeRanger {
    /// Open `<root>/<database>`.
    ///
    /// A master handle creates the database with default settings when it
    /// is missing; otherwise a missing database is `NotInitialized`.
    pub fn startup(root: &Path, database: &str, master: bool) -> Result<Self> {
        let path = root.join(database);
        let desc_path = path.join(TRANGER_DESC_FILE);
        if !desc_path.is_file() {
            if master {
                return Self::create_database(root, database, Config::default().database_desc(database));
            }
            return Err(Error::NotInitialized(path));
        }
        let desc: TrangerDesc = serde_json::from_str(&fs::read_to_string(&desc_path)?)?;
        tracing::debug!(database = %desc.database, path = %path.display(), master, "opened database");
        Ok(Self { path, desc, master })
    }

    /// Create `<root>/<database>` with `desc`, returning a master handle.
    pub fn create_database(root: &Path, database: &str, desc: TrangerDesc) -> Result<Self> {
        let path = root.join(database);
        let desc_path = path.join(TRANGER_DESC_FILE);
        if desc_path.exists() {
            return Err(Error::AlreadyExists(format!("database {}", path.display())));
        }
        fs::create_dir_all(&path)?;
        atomic::set_mode(&path, desc.xpermission)?;
        atomic::replace_file(&desc_path, serde_json::to_string_pretty(&desc)?.as_bytes())?;
        atomic::set_mode(&desc_path, desc.rpermission)?;

        tracing::info!(database = %database, path = %path.display(), "created database");
        Ok(Self {
            path,
            desc,
            master: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &TrangerDesc {
        &self.desc
    }

    pub fn topic_exists(&self, name: &str) -> bool {
        walk::is_topic_dir(&self.path.join(name))
    }

    pub fn open_topic(&self, name: &str) -> Result<Topic> {
        if !self.topic_exists(name) {
            return Err(Error::NotFound(format!(
                "topic {} in {}",
                name,
                self.path.display()
            )));
        }
        Topic::open(self.path.join(name), self.desc.rpermission, self.master)
    }

    /// Create a topic named `name`; the descriptor's name is set to match.
    pub fn create_topic(&self, name: &str, desc: TopicDesc) -> Result<Topic> {
        if !self.master {
            return Err(Error::ReadOnly(format!("cannot create topic {}", name)));
        }
        if self.topic_exists(name) {
            return Err(Error::AlreadyExists(format!(
                "topic {} in {}",
                name,
                self.path.display()
            )));
        }
        let desc = TopicDesc {
            topic_name: name.to_string(),
            ..desc
        };
        Topic::create(
            self.path.join(name),
            desc,
            self.desc.rpermission,
            self.desc.xpermission,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_startup_requires_database_unless_master() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            TimeRanger::startup(tmp.path(), "gps", false),
            Err(Error::NotInitialized(_))
        ));

        let tranger = TimeRanger::startup(tmp.path(), "gps", true).unwrap();
        assert_eq!(tranger.desc().database, "gps");
        assert!(tmp.path().join("gps").join(TRANGER_DESC_FILE).is_file());

        let reader = TimeRanger::startup(tmp.path(), "gps", false).unwrap();
        assert!(matches!(
            reader.create_topic("tracks", TopicDesc::new("tracks", "id", "")),
            Err(Error::ReadOnly(_))
        ));
    }

    #[test]
    fn test_create_database_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let desc = Config::default().database_desc("gps");
        TimeRanger::create_database(tmp.path(), "gps", desc.clone()).unwrap();
        assert!(matches!(
            TimeRanger::create_database(tmp.path(), "gps", desc),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_topic_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let tranger = TimeRanger::startup(tmp.path(), "gps", true).unwrap();

        assert!(matches!(tranger.open_topic("tracks"), Err(Error::NotFound(_))));

        let mut topic = tranger
            .create_topic("tracks", TopicDesc::new("ignored", "id", ""))
            .unwrap();
        assert_eq!(topic.name(), "tracks");
        topic.append(5, 0, &json!({"id": "x"})).unwrap();

        assert!(tranger.topic_exists("tracks"));
        assert!(matches!(
            tranger.create_topic("tracks", TopicDesc::new("tracks", "id", "")),
            Err(Error::AlreadyExists(_))
        ));

        let reader = TimeRanger::startup(tmp.path(), "gps", false).unwrap();
        let topic = reader.open_topic("tracks").unwrap();
        assert_eq!(topic.last_rowid(), 1);
        assert!(matches!(
            reader.create_topic("alarms", TopicDesc::new("alarms", "", "")),
            Err(Error::ReadOnly(_))
        ));
    }
}
