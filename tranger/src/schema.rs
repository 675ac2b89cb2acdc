//! On-disk schema for TimeRanger databases, topics and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::document::Document;

/// Marker file identifying a database directory.
pub const TRANGER_DESC_FILE: &str = "__timeranger__.json";

/// Marker file identifying a topic directory.
pub const TOPIC_DESC_FILE: &str = "topic_desc.json";

/// Record file inside a topic directory.
pub const RECORDS_FILE: &str = "records.jsonl";

/// Highest rowid ever allocated in a topic, written when records are deleted.
pub const ROWID_MARK_FILE: &str = "last_rowid";

/// User flag bit marking a queue message as still pending.
pub const QUEUE_MSG_PENDING: u32 = 0x0001;

/// Database descriptor stored in `__timeranger__.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrangerDesc {
    /// Database name.
    pub database: String,

    /// Mask used to name time-partitioned files.
    #[serde(default)]
    pub filename_mask: String,

    /// Permission for record files.
    #[serde(default)]
    pub rpermission: u32,

    /// Permission for directories.
    #[serde(default)]
    pub xpermission: u32,
}

/// Topic descriptor stored in `topic_desc.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDesc {
    pub topic_name: String,

    /// Content field holding the record key.
    #[serde(default)]
    pub pkey: String,

    /// Content field holding the message time.
    #[serde(default)]
    pub tkey: String,

    /// System flag stamped on every appended record.
    #[serde(default)]
    pub system_flag: u64,

    /// Column descriptions, opaque to the store.
    #[serde(default)]
    pub cols: Document,
}

impl TopicDesc {
    /// Create a topic descriptor with no columns.
    pub fn new(topic_name: impl Into<String>, pkey: impl Into<String>, tkey: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.into(),
            pkey: pkey.into(),
            tkey: tkey.into(),
            system_flag: 0,
            cols: Document::Object(Default::default()),
        }
    }
}

/// Record metadata, everything the store knows without reading content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMd {
    /// Per-topic sequence number, starting at 1.
    pub rowid: u64,

    /// Append time (epoch seconds).
    pub t: u64,

    /// Message time (epoch seconds), from the topic's `tkey` field.
    pub tm: u64,

    #[serde(default)]
    pub user_flag: u32,

    #[serde(default)]
    pub system_flag: u64,

    /// Value of the topic's `pkey` field.
    #[serde(default)]
    pub key: String,
}

impl RecordMd {
    /// Append time as a UTC datetime, if representable.
    pub fn t_datetime(&self) -> Option<DateTime<Utc>> {
        epoch_to_datetime(self.t)
    }

    /// Message time as a UTC datetime, if representable.
    pub fn tm_datetime(&self) -> Option<DateTime<Utc>> {
        epoch_to_datetime(self.tm)
    }
}

fn epoch_to_datetime(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

/// One line of `records.jsonl`. Content stays unparsed until requested.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub md: RecordMd,
    pub content: Box<RawValue>,
}
