//! Discovery of databases and topics under a TimeRanger root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::schema::{TOPIC_DESC_FILE, TRANGER_DESC_FILE};
use crate::{Error, Result};

/// A database directory: `<root>/<database>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatabaseLocation {
    pub root: PathBuf,
    pub database: String,
}

impl DatabaseLocation {
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.database)
    }

    /// Split a database directory into root and name.
    pub fn from_database_dir(path: &Path) -> Result<Self> {
        if !is_database_dir(path) {
            return Err(Error::InvalidPath(format!(
                "{} is not a TimeRanger database",
                path.display()
            )));
        }
        let (root, database) = split_last(path)?;
        Ok(Self { root, database })
    }
}

/// A topic directory: `<root>/<database>/<topic>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TopicLocation {
    pub root: PathBuf,
    pub database: String,
    pub topic: String,
}

impl TopicLocation {
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.database).join(&self.topic)
    }

    /// Split a topic directory into root, database and topic names.
    pub fn from_topic_dir(path: &Path) -> Result<Self> {
        if !is_topic_dir(path) {
            return Err(Error::InvalidPath(format!(
                "{} is not a TimeRanger topic",
                path.display()
            )));
        }
        let (db_dir, topic) = split_last(path)?;
        let (root, database) = split_last(&db_dir)?;
        Ok(Self {
            root,
            database,
            topic,
        })
    }
}

pub fn is_database_dir(path: &Path) -> bool {
    path.join(TRANGER_DESC_FILE).is_file()
}

pub fn is_topic_dir(path: &Path) -> bool {
    path.join(TOPIC_DESC_FILE).is_file()
}

fn split_last(path: &Path) -> Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidPath(format!("{} has no usable name", path.display())))?;
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", path.display())))?;
    Ok((parent.to_path_buf(), name.to_string()))
}

/// Directories below `root` holding a file named `marker`, sorted.
fn dirs_with_marker(root: &Path, marker: &str, max_depth: usize) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!("{} is not a directory", root.display())));
    }
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_type().is_dir() || e.file_name() == marker);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == marker {
            if let Some(dir) = entry.path().parent() {
                found.push(dir.to_path_buf());
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Every database under `root`, the root itself included.
pub fn find_databases(root: &Path) -> Result<Vec<DatabaseLocation>> {
    dirs_with_marker(root, TRANGER_DESC_FILE, usize::MAX)?
        .iter()
        .map(|dir| DatabaseLocation::from_database_dir(dir))
        .collect()
}

/// Every topic directly inside the database directory `db_dir`.
pub fn find_topics(db_dir: &Path) -> Result<Vec<TopicLocation>> {
    dirs_with_marker(db_dir, TOPIC_DESC_FILE, 2)?
        .iter()
        .filter(|dir| dir.as_path() != db_dir)
        .map(|dir| TopicLocation::from_topic_dir(dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch_marker(dir: &Path, marker: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(marker), "{}").unwrap();
    }

    #[test]
    fn test_find_databases_and_topics() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch_marker(&root.join("gps"), TRANGER_DESC_FILE);
        touch_marker(&root.join("gps/tracks"), TOPIC_DESC_FILE);
        touch_marker(&root.join("gps/alarms"), TOPIC_DESC_FILE);
        touch_marker(&root.join("nested/queues"), TRANGER_DESC_FILE);
        fs::create_dir_all(root.join("gps/not-a-topic")).unwrap();

        let dbs = find_databases(root).unwrap();
        let names: Vec<&str> = dbs.iter().map(|d| d.database.as_str()).collect();
        assert_eq!(names, vec!["gps", "queues"]);
        assert_eq!(dbs[1].root, root.join("nested"));

        let topics = find_topics(&dbs[0].path()).unwrap();
        let names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(names, vec!["alarms", "tracks"]);
        assert_eq!(topics[1].path(), root.join("gps/tracks"));
    }

    #[test]
    fn test_topic_location_from_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gps/tracks");
        touch_marker(&dir, TOPIC_DESC_FILE);

        let loc = TopicLocation::from_topic_dir(&dir).unwrap();
        assert_eq!(loc.root, tmp.path());
        assert_eq!(loc.database, "gps");
        assert_eq!(loc.topic, "tracks");

        assert!(matches!(
            TopicLocation::from_topic_dir(tmp.path()),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let tmp = TempDir::new().unwrap();
        assert!(find_databases(&tmp.path().join("absent")).is_err());
    }
}
