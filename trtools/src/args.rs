//! Command-line argument groups shared by the tools.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::Args;
use tranger::{Config, ContentFilter, MatchCondition};

use crate::error::{CliError, Result};

/// Where to find the records.
#[derive(Debug, Clone, Default, Args)]
pub struct LocationArgs {
    /// TimeRanger root, or a topic directory
    #[arg(short = 'a', long = "path", value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Database name
    #[arg(short = 'b', long = "database", value_name = "DATABASE")]
    pub database: Option<String>,

    /// Topic name
    #[arg(short = 'c', long = "topic", value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Walk every database and topic below the path
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,
}

impl LocationArgs {
    /// Root path from `--path`, TRANGER_PATH or the config file.
    pub fn root(&self, config: &Config) -> Result<PathBuf> {
        config.resolve_path(self.path.as_deref()).ok_or_else(|| {
            CliError::usage("What TimeRanger path? You must supply --path option")
        })
    }
}

/// How to print matching records.
#[derive(Debug, Clone, Default, Args)]
pub struct PresentationArgs {
    /// Verbose level (0=total, 1=metadata, 2=metadata+path, 3=metadata+record)
    #[arg(short = 'l', long = "verbose", value_name = "LEVEL", default_value_t = 0)]
    pub verbose: u8,

    /// Mode: form or table
    #[arg(short = 'm', long = "mode", value_name = "MODE")]
    pub mode: Option<String>,

    /// Print only these fields (comma or space separated)
    #[arg(short = 'f', long = "fields", value_name = "FIELDS")]
    pub fields: Option<String>,
}

impl PresentationArgs {
    pub fn table_mode(&self) -> bool {
        self.mode.as_deref().is_some_and(|m| !m.is_empty())
            || self.fields.as_deref().is_some_and(|f| !f.is_empty())
    }

    pub fn form_mode(&self) -> bool {
        self.mode.as_deref() == Some("form")
    }

    pub fn field_list(&self) -> Vec<String> {
        split_fields(self.fields.as_deref().unwrap_or_default())
    }
}

/// Split a field list on commas and spaces.
pub fn split_fields(fields: &str) -> Vec<String> {
    fields
        .split([',', ' '])
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Record criteria common to every tool.
#[derive(Debug, Clone, Default, Args)]
pub struct MatchArgs {
    /// From time (epoch or date)
    #[arg(long = "from-t", value_name = "TIME", value_parser = parse_time)]
    pub from_t: Option<u64>,

    /// To time (epoch or date)
    #[arg(long = "to-t", value_name = "TIME", value_parser = parse_time)]
    pub to_t: Option<u64>,

    /// From message time
    #[arg(long = "from-tm", value_name = "TIME", value_parser = parse_time)]
    pub from_tm: Option<u64>,

    /// To message time
    #[arg(long = "to-tm", value_name = "TIME", value_parser = parse_time)]
    pub to_tm: Option<u64>,

    /// From rowid; negative counts back from the last record
    #[arg(long = "from-rowid", value_name = "ROWID", allow_hyphen_values = true)]
    pub from_rowid: Option<i64>,

    /// To rowid; negative counts back from the last record
    #[arg(long = "to-rowid", value_name = "ROWID", allow_hyphen_values = true)]
    pub to_rowid: Option<i64>,

    /// Mask of user flag bits that must be set
    #[arg(long = "user-flag-set", value_name = "MASK", value_parser = parse_mask32)]
    pub user_flag_set: Option<u32>,

    /// Mask of user flag bits that must not be set
    #[arg(long = "user-flag-not-set", value_name = "MASK", value_parser = parse_mask32)]
    pub user_flag_not_set: Option<u32>,

    /// Mask of system flag bits that must be set
    #[arg(long = "system-flag-set", value_name = "MASK", value_parser = parse_mask64)]
    pub system_flag_set: Option<u64>,

    /// Mask of system flag bits that must not be set
    #[arg(long = "system-flag-not-set", value_name = "MASK", value_parser = parse_mask64)]
    pub system_flag_not_set: Option<u64>,

    /// Key
    #[arg(long = "key", value_name = "KEY")]
    pub key: Option<String>,

    /// Not key
    #[arg(long = "not-key", value_name = "KEY")]
    pub not_key: Option<String>,
}

impl MatchArgs {
    pub fn to_condition(&self) -> MatchCondition {
        MatchCondition {
            from_t: self.from_t,
            to_t: self.to_t,
            from_tm: self.from_tm,
            to_tm: self.to_tm,
            from_rowid: self.from_rowid,
            to_rowid: self.to_rowid,
            user_flag_mask_set: self.user_flag_set,
            user_flag_mask_notset: self.user_flag_not_set,
            system_flag_mask_set: self.system_flag_set,
            system_flag_mask_notset: self.system_flag_not_set,
            key: self.key.clone(),
            notkey: self.not_key.clone(),
            ..MatchCondition::default()
        }
    }
}

/// Content search criteria.
#[derive(Debug, Clone, Default, Args)]
pub struct ContentSearchArgs {
    /// Content key where to search
    #[arg(long = "search-content-key", value_name = "CONTENT-KEY")]
    pub search_content_key: Option<String>,

    /// Filter to apply to content (clear, base64)
    #[arg(long = "search-content-filter", value_name = "CONTENT-FILTER")]
    pub search_content_filter: Option<ContentFilter>,

    /// Text to search in content
    #[arg(long = "search-content-text", value_name = "CONTENT-TEXT")]
    pub search_content_text: Option<String>,
}

impl ContentSearchArgs {
    pub fn apply(&self, condition: &mut MatchCondition) {
        condition.search_content_key = self.search_content_key.clone();
        condition.search_content_filter = self.search_content_filter.unwrap_or_default();
        condition.search_content_text = self.search_content_text.clone();
    }
}

/// Parse an epoch integer, an RFC 3339 timestamp, or a UTC date or datetime.
pub fn parse_time(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().map_err(|e| format!("invalid epoch '{}': {}", s, e));
    }

    let secs = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.timestamp()
    } else if let Some(dt) = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        dt.and_utc().timestamp()
    } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date '{}'", s))?
            .and_utc()
            .timestamp()
    } else {
        return Err(format!(
            "invalid time '{}' (expected epoch seconds, RFC 3339 or YYYY-MM-DD)",
            s
        ));
    };

    u64::try_from(secs).map_err(|_| format!("time '{}' is before 1970", s))
}

/// Parse a decimal or `0x` hexadecimal mask.
pub fn parse_mask64(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid mask '{}': {}", s, e))
}

pub fn parse_mask32(s: &str) -> std::result::Result<u32, String> {
    let mask = parse_mask64(s)?;
    u32::try_from(mask).map_err(|_| format!("mask '{}' does not fit in 32 bits", s))
}
