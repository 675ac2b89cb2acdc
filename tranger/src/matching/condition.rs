//! Match conditions and the per-record filter compiled from them.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diff::{compare, CompareOptions};
use crate::document::{get_path, project_keys, to_compact_string, Document, LazyBody};
use crate::schema::RecordMd;
use crate::{Error, Result};

/// Declarative record filter. Every present criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCondition {
    /// Inclusive bounds on the append time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_t: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_t: Option<u64>,

    /// Inclusive bounds on the message time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_tm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tm: Option<u64>,

    /// Inclusive rowid bounds; negative values count back from the last rowid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_rowid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_rowid: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_flag_mask_set: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_flag_mask_notset: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_flag_mask_set: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_flag_mask_notset: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notkey: Option<String>,
    /// Regular expression the key must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rkey: Option<String>,

    /// Content field searched for `search_content_text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_content_key: Option<String>,
    #[serde(skip_serializing_if = "ContentFilter::is_clear")]
    pub search_content_filter: ContentFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_content_text: Option<String>,

    /// Object the record, reduced to the same keys, must equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,

    /// Scans hand kept records over with an empty (`null`) body unless a
    /// criterion needs to read it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub only_md: bool,
}

impl MatchCondition {
    /// True when no criterion is present (`only_md` aside).
    pub fn is_empty(&self) -> bool {
        let only_md = self.only_md;
        let empty = MatchCondition {
            only_md,
            ..MatchCondition::default()
        };
        *self == empty
    }

    /// Parse `json` as the structural filter. It must be a JSON object.
    pub fn with_filter_json(mut self, json: &str) -> Result<Self> {
        let filter: Document = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFilter(format!("filter is not valid JSON: {}", e)))?;
        if !filter.is_object() {
            return Err(Error::InvalidFilter("filter must be a JSON object".to_string()));
        }
        self.filter = Some(filter);
        Ok(self)
    }

    fn searches_content(&self) -> bool {
        self.search_content_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    /// Whether scans must hand record bodies to the caller.
    pub fn needs_body(&self) -> bool {
        !self.only_md || self.searches_content() || self.filter.is_some()
    }

    /// Validate the condition and resolve relative rowids against `last_rowid`.
    pub fn compile(&self, last_rowid: u64) -> Result<RecordFilter> {
        let rkey = self
            .rkey
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| Error::InvalidFilter(format!("bad rkey '{}': {}", pattern, e)))
            })
            .transpose()?;

        if let Some(filter) = &self.filter {
            if !filter.is_object() {
                return Err(Error::InvalidFilter("filter must be a JSON object".to_string()));
            }
        }

        let content = match &self.search_content_key {
            Some(key) if !key.is_empty() => Some(ContentSearch {
                key: key.clone(),
                filter: self.search_content_filter,
                text: self
                    .search_content_text
                    .as_deref()
                    .unwrap_or_default()
                    .as_bytes()
                    .to_vec(),
            }),
            _ => None,
        };

        Ok(RecordFilter {
            from_rowid: self.from_rowid.map(|b| resolve_rowid(b, last_rowid)),
            to_rowid: self.to_rowid.map(|b| resolve_rowid(b, last_rowid)),
            from_t: self.from_t,
            to_t: self.to_t,
            from_tm: self.from_tm,
            to_tm: self.to_tm,
            user_set: self.user_flag_mask_set.unwrap_or(0),
            user_notset: self.user_flag_mask_notset.unwrap_or(0),
            system_set: self.system_flag_mask_set.unwrap_or(0),
            system_notset: self.system_flag_mask_notset.unwrap_or(0),
            key: self.key.clone(),
            notkey: self.notkey.clone(),
            rkey,
            content,
            filter: self.filter.clone(),
            needs_body: self.needs_body(),
        })
    }
}

/// Resolve a rowid bound; negative bounds count back from `last_rowid`.
pub fn resolve_rowid(bound: i64, last_rowid: u64) -> u64 {
    if bound >= 0 {
        bound.unsigned_abs()
    } else {
        last_rowid.saturating_sub(bound.unsigned_abs())
    }
}

/// Decoding applied to a content field before the text search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentFilter {
    #[default]
    Clear,
    Base64,
}

impl ContentFilter {
    pub fn is_clear(&self) -> bool {
        *self == ContentFilter::Clear
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFilter::Clear => "clear",
            ContentFilter::Base64 => "base64",
        }
    }
}

impl FromStr for ContentFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "clear" => Ok(ContentFilter::Clear),
            "base64" => Ok(ContentFilter::Base64),
            other => Err(Error::InvalidFilter(format!(
                "unknown content filter '{}' (expected clear or base64)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ContentFilter {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ContentFilter> for String {
    fn from(filter: ContentFilter) -> Self {
        filter.as_str().to_string()
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Skip,
    /// Past the upper rowid bound of an ascending scan; nothing later can match.
    Stop,
}

#[derive(Debug, Clone)]
struct ContentSearch {
    key: String,
    filter: ContentFilter,
    text: Vec<u8>,
}

impl ContentSearch {
    fn matches(&self, body: &Document) -> bool {
        let Some(value) = get_path(body, &self.key) else {
            return false;
        };
        let raw = match value {
            Document::String(s) => s.as_bytes().to_vec(),
            other => to_compact_string(other).into_bytes(),
        };
        let content = match self.filter {
            ContentFilter::Clear => raw,
            ContentFilter::Base64 => {
                let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
                match base64::engine::general_purpose::STANDARD.decode(compact) {
                    Ok(decoded) => decoded,
                    Err(_) => return false,
                }
            }
        };
        contains(&content, &self.text)
    }
}

/// Byte-wise substring test; an empty needle always matches.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

fn within(value: u64, from: Option<u64>, to: Option<u64>) -> bool {
    from.map_or(true, |from| value >= from) && to.map_or(true, |to| value <= to)
}

fn mask_matches(flag: u64, set: u64, notset: u64) -> bool {
    (flag & set) == set && (flag & notset) == 0
}

/// A compiled [`MatchCondition`], ready to evaluate records.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    from_rowid: Option<u64>,
    to_rowid: Option<u64>,
    from_t: Option<u64>,
    to_t: Option<u64>,
    from_tm: Option<u64>,
    to_tm: Option<u64>,
    user_set: u32,
    user_notset: u32,
    system_set: u64,
    system_notset: u64,
    key: Option<String>,
    notkey: Option<String>,
    rkey: Option<Regex>,
    content: Option<ContentSearch>,
    filter: Option<Document>,
    needs_body: bool,
}

impl RecordFilter {
    /// Resolved lower rowid bound.
    pub fn from_rowid(&self) -> Option<u64> {
        self.from_rowid
    }

    /// Resolved upper rowid bound.
    pub fn to_rowid(&self) -> Option<u64> {
        self.to_rowid
    }

    /// Whether kept records are handed over with their body.
    pub fn needs_body(&self) -> bool {
        self.needs_body
    }

    /// Evaluate one record.
    ///
    /// Criteria run cheapest first and the first failure decides. The body
    /// is loaded only by the content search and the structural filter; an
    /// error is returned only when loading it fails.
    pub fn evaluate(&self, md: &RecordMd, body: &mut LazyBody<'_>) -> Result<Decision> {
        if self.to_rowid.is_some_and(|to| md.rowid > to) {
            return Ok(Decision::Stop);
        }
        if self.from_rowid.is_some_and(|from| md.rowid < from) {
            return Ok(Decision::Skip);
        }

        if !within(md.t, self.from_t, self.to_t) {
            return Ok(Decision::Skip);
        }

        if !mask_matches(u64::from(md.user_flag), u64::from(self.user_set), u64::from(self.user_notset)) {
            return Ok(Decision::Skip);
        }
        if !mask_matches(md.system_flag, self.system_set, self.system_notset) {
            return Ok(Decision::Skip);
        }

        if self.key.as_ref().is_some_and(|key| md.key != *key) {
            return Ok(Decision::Skip);
        }
        if self.notkey.as_ref().is_some_and(|notkey| md.key == *notkey) {
            return Ok(Decision::Skip);
        }
        if self.rkey.as_ref().is_some_and(|re| !re.is_match(&md.key)) {
            return Ok(Decision::Skip);
        }

        if !within(md.tm, self.from_tm, self.to_tm) {
            return Ok(Decision::Skip);
        }

        if let Some(search) = &self.content {
            if !search.matches(body.get()?) {
                return Ok(Decision::Skip);
            }
        }

        if let Some(filter) = &self.filter {
            let projected = project_keys(body.get()?, filter);
            if !compare(&projected, filter, CompareOptions::default()) {
                return Ok(Decision::Skip);
            }
        }

        Ok(Decision::Keep)
    }
}
