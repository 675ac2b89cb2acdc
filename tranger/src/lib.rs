//! TimeRanger: append-only record topics with match conditions and
//! order-insensitive JSON comparison.

pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod matching;
pub mod schema;
pub mod store;

pub use config::Config;
pub use diff::{compare, compare_verbose, CompareOptions, Comparison, Divergence, DivergenceKind};
pub use document::{Document, LazyBody};
pub use error::{Error, Result};
pub use matching::{ContentFilter, Decision, MatchCondition, RecordFilter};
pub use schema::{RecordMd, TopicDesc, TrangerDesc};
pub use store::{DatabaseLocation, ScanSummary, TimeRanger, Topic, TopicLocation};
