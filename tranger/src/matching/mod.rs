//! Record match conditions.
//!
//! A [`MatchCondition`] is the declarative form read from the command line
//! or JSON. [`MatchCondition::compile`] validates it against a topic and
//! yields a [`RecordFilter`] that decides record by record.
//!
//! Evaluation order, cheapest first:
//!
//! - **Rowid range**: past `to_rowid` stops the scan
//! - **Append time** `t`
//! - **Flag masks**: user then system, `set` bits required, `notset` bits absent
//! - **Keys**: `key`, `notkey`, then the `rkey` regex
//! - **Message time** `tm`
//! - **Content search**: reads the body
//! - **Structural filter**: reads the body

mod condition;

pub use condition::{resolve_rowid, ContentFilter, Decision, MatchCondition, RecordFilter};

#[cfg(test)]
mod tests;
