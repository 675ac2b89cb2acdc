//! Topic handles: record iteration, append and delete.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::value::{to_raw_value, RawValue};

use super::atomic;
use crate::document::{get_path, to_epoch, to_key_string, Document, LazyBody};
use crate::matching::{Decision, RecordFilter};
use crate::schema::{
    RecordMd, StoredRecord, TopicDesc, RECORDS_FILE, ROWID_MARK_FILE, TOPIC_DESC_FILE,
};
use crate::{Error, Result};

/// Counts from one filtered scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Records handed to the filter.
    pub visited: usize,
    /// Records the filter kept.
    pub matched: usize,
}

/// An open topic. Records are indexed in memory, bodies stay raw JSON.
#[derive(Debug)]
pub struct Topic {
    dir: PathBuf,
    desc: TopicDesc,
    records: Vec<StoredRecord>,
    /// High-water mark; deletes never lower it.
    last_rowid: u64,
    rpermission: u32,
    master: bool,
}

impl Topic {
    /// Create the topic directory and descriptor.
    pub(crate) fn create(
        dir: PathBuf,
        desc: TopicDesc,
        rpermission: u32,
        xpermission: u32,
    ) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        atomic::set_mode(&dir, xpermission)?;

        let desc_path = dir.join(TOPIC_DESC_FILE);
        atomic::replace_file(&desc_path, serde_json::to_string_pretty(&desc)?.as_bytes())?;
        atomic::set_mode(&desc_path, rpermission)?;

        tracing::info!(topic = %desc.topic_name, dir = %dir.display(), "created topic");
        Ok(Self {
            dir,
            desc,
            records: Vec::new(),
            last_rowid: 0,
            rpermission,
            master: true,
        })
    }

    /// Open an existing topic directory.
    pub(crate) fn open(dir: PathBuf, rpermission: u32, master: bool) -> Result<Self> {
        let desc_path = dir.join(TOPIC_DESC_FILE);
        if !desc_path.is_file() {
            return Err(Error::NotFound(format!("topic at {}", dir.display())));
        }
        let desc: TopicDesc = serde_json::from_str(&fs::read_to_string(&desc_path)?)?;
        let records = load_records(&dir.join(RECORDS_FILE))?;
        let stored_max = records.last().map_or(0, |r| r.md.rowid);
        let last_rowid = read_rowid_mark(&dir.join(ROWID_MARK_FILE))?.max(stored_max);

        tracing::debug!(topic = %desc.topic_name, records = records.len(), "opened topic");
        Ok(Self {
            dir,
            desc,
            records,
            last_rowid,
            rpermission,
            master,
        })
    }

    pub fn name(&self) -> &str {
        &self.desc.topic_name
    }

    pub fn desc(&self) -> &TopicDesc {
        &self.desc
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Highest rowid ever appended, 0 for a new topic.
    ///
    /// Deleted rowids are never handed out again, so this can exceed the
    /// rowid of the last record still present.
    pub fn last_rowid(&self) -> u64 {
        self.last_rowid
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in ascending rowid order.
    pub fn records(&self) -> impl Iterator<Item = (&RecordMd, LazyBody<'_>)> + '_ {
        self.records_in(None, None)
    }

    /// Records with rowid in the inclusive range, ascending.
    pub fn records_in(
        &self,
        from_rowid: Option<u64>,
        to_rowid: Option<u64>,
    ) -> impl Iterator<Item = (&RecordMd, LazyBody<'_>)> + '_ {
        let start = from_rowid.map_or(0, |from| self.records.partition_point(|r| r.md.rowid < from));
        let end = to_rowid.map_or(self.records.len(), |to| {
            self.records.partition_point(|r| r.md.rowid <= to)
        });
        self.records[start..end.max(start)]
            .iter()
            .map(|record| (&record.md, lazy_content(&record.content)))
    }

    /// Run `filter` over the topic and hand every kept record to `on_match`.
    ///
    /// The scan starts at the filter's lower rowid bound and ends on
    /// [`Decision::Stop`] or when `on_match` breaks. A filter compiled with
    /// `only_md` and no body criterion hands over `null` bodies.
    pub fn scan<F>(&self, filter: &RecordFilter, mut on_match: F) -> Result<ScanSummary>
    where
        F: FnMut(&RecordMd, LazyBody<'_>) -> Result<ControlFlow<()>>,
    {
        let mut summary = ScanSummary::default();
        for (md, mut body) in self.records_in(filter.from_rowid(), None) {
            summary.visited += 1;
            match filter.evaluate(md, &mut body)? {
                Decision::Stop => break,
                Decision::Skip => continue,
                Decision::Keep => {
                    summary.matched += 1;
                    let body = if filter.needs_body() {
                        body
                    } else {
                        LazyBody::loaded(Document::Null)
                    };
                    if on_match(md, body)?.is_break() {
                        break;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Parse the content of one record.
    pub fn read_content(&self, rowid: u64) -> Result<Document> {
        let record = self
            .find(rowid)
            .ok_or_else(|| Error::NotFound(format!("rowid {} in topic {}", rowid, self.name())))?;
        Ok(serde_json::from_str(record.content.get())?)
    }

    fn find(&self, rowid: u64) -> Option<&StoredRecord> {
        self.records
            .binary_search_by_key(&rowid, |r| r.md.rowid)
            .ok()
            .map(|i| &self.records[i])
    }

    fn ensure_master(&self, action: &str) -> Result<()> {
        if self.master {
            Ok(())
        } else {
            Err(Error::ReadOnly(format!("cannot {} in topic {}", action, self.name())))
        }
    }

    /// Append a record and return its metadata.
    ///
    /// `t == 0` stamps the current time. The key and message time come from
    /// the topic's `pkey` and `tkey` fields of `content`.
    pub fn append(&mut self, t: u64, user_flag: u32, content: &Document) -> Result<RecordMd> {
        self.ensure_master("append")?;

        let t = if t == 0 { now_epoch() } else { t };
        let key = non_empty(&self.desc.pkey)
            .and_then(|pkey| get_path(content, pkey))
            .map(to_key_string)
            .unwrap_or_default();
        let tm = non_empty(&self.desc.tkey)
            .and_then(|tkey| get_path(content, tkey))
            .and_then(to_epoch)
            .unwrap_or(t);

        let record = StoredRecord {
            md: RecordMd {
                rowid: self.last_rowid + 1,
                t,
                tm,
                user_flag,
                system_flag: self.desc.system_flag,
                key,
            },
            content: to_raw_value(content)?,
        };

        let path = self.dir.join(RECORDS_FILE);
        let is_new = !path.exists();
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        if is_new {
            atomic::set_mode(&path, self.rpermission)?;
        }

        let md = record.md.clone();
        self.last_rowid = md.rowid;
        self.records.push(record);
        Ok(md)
    }

    /// Delete the given rowids, returning how many were removed.
    ///
    /// Every rowid must exist; otherwise nothing is deleted.
    pub fn delete(&mut self, rowids: &[u64]) -> Result<usize> {
        self.ensure_master("delete")?;
        if rowids.is_empty() {
            return Ok(0);
        }
        if let Some(missing) = rowids.iter().find(|rowid| self.find(**rowid).is_none()) {
            return Err(Error::NotFound(format!(
                "rowid {} in topic {}",
                missing,
                self.name()
            )));
        }

        let mut doomed = rowids.to_vec();
        doomed.sort_unstable();
        doomed.dedup();

        let kept: Vec<&StoredRecord> = self
            .records
            .iter()
            .filter(|r| doomed.binary_search(&r.md.rowid).is_err())
            .collect();
        let removed = self.records.len() - kept.len();

        let mut contents = Vec::new();
        for record in &kept {
            serde_json::to_writer(&mut contents, record)?;
            contents.push(b'\n');
        }
        atomic::replace_file(
            &self.dir.join(ROWID_MARK_FILE),
            self.last_rowid.to_string().as_bytes(),
        )?;
        atomic::replace_file(&self.dir.join(RECORDS_FILE), &contents)?;

        self.records
            .retain(|r| doomed.binary_search(&r.md.rowid).is_err());

        tracing::info!(topic = %self.name(), removed, "deleted records");
        Ok(removed)
    }
}

fn lazy_content(content: &RawValue) -> LazyBody<'_> {
    LazyBody::new(move || Ok(serde_json::from_str(content.get())?))
}

/// Read the rowid high-water mark; a missing file means no mark.
fn read_rowid_mark(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let text = fs::read_to_string(path)?;
    text.trim()
        .parse()
        .map_err(|e| Error::Storage(format!("bad rowid mark in {}: {}", path.display(), e)))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn now_epoch() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Read `records.jsonl`, skipping malformed lines.
fn load_records(path: &Path) -> Result<Vec<StoredRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records: Vec<StoredRecord> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(file = %path.display(), line = index + 1, error = %e, "skipping malformed record");
            }
        }
    }
    if records.windows(2).any(|w| w[0].md.rowid >= w[1].md.rowid) {
        tracing::warn!(file = %path.display(), "records out of rowid order, sorting");
        records.sort_by_key(|r| r.md.rowid);
        records.dedup_by_key(|r| r.md.rowid);
    }
    Ok(records)
}
