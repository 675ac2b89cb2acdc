//! Record printing: metadata lines, JSON forms and column tables.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use tranger::document::{select_paths, to_compact_string};
use tranger::store::{find_databases, find_topics};
use tranger::{Document, LazyBody, RecordMd, Result};

/// Key under which record metadata is embedded in listed documents.
pub const MD_FIELD: &str = "__md_tranger__";

const UNDERLINE: &str = "=======================================";

/// One-line summary of a record's metadata.
pub fn md_title(md: &RecordMd) -> String {
    format!(
        "rowid: {}, uflag: 0x{:X}, sflag: 0x{:X}, t: {}, tm: {}, key: {}",
        md.rowid, md.user_flag, md.system_flag, md.t, md.tm, md.key
    )
}

/// Metadata with readable times and the topic directory.
pub fn md_detail(md: &RecordMd, topic_dir: &Path) -> String {
    let when = |dt: Option<chrono::DateTime<chrono::Utc>>| {
        dt.map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{}, t: {}, tm: {}, path: {}",
        md_title(md),
        when(md.t_datetime()),
        when(md.tm_datetime()),
        topic_dir.display()
    )
}

/// Record document with its metadata under [`MD_FIELD`].
pub fn with_metadata(md: &RecordMd, mut doc: Document) -> Result<Document> {
    let md = serde_json::to_value(md)?;
    match doc.as_object_mut() {
        Some(obj) => {
            obj.insert(MD_FIELD.to_string(), md);
            Ok(doc)
        }
        None => {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(MD_FIELD.to_string(), md);
            wrapped.insert("content".to_string(), doc);
            Ok(Document::Object(wrapped))
        }
    }
}

/// Print a titled, pretty-printed document.
pub fn print_json<W: Write>(out: &mut W, title: &str, doc: &Document) -> Result<()> {
    let pretty = serde_json::to_string_pretty(doc)?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", pretty)?;
    Ok(())
}

/// Column output: a header with underlines once, then one line per record.
#[derive(Debug, Default)]
pub struct TableWriter {
    header_written: bool,
}

impl TableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `doc` as a row. Non-objects and empty objects print nothing.
    pub fn write_row<W: Write>(&mut self, out: &mut W, doc: &Document) -> io::Result<()> {
        self.write_cells(out, None, doc)
    }

    /// Write `doc` as a row led by `title`; the header is not shifted.
    pub fn write_titled_row<W: Write>(
        &mut self,
        out: &mut W,
        title: &str,
        doc: &Document,
    ) -> io::Result<()> {
        self.write_cells(out, Some(title), doc)
    }

    fn write_cells<W: Write>(
        &mut self,
        out: &mut W,
        title: Option<&str>,
        doc: &Document,
    ) -> io::Result<()> {
        let Some(obj) = doc.as_object().filter(|obj| !obj.is_empty()) else {
            return Ok(());
        };
        if !self.header_written {
            self.header_written = true;
            let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            writeln!(out, "{}", keys.join(" "))?;
            let lines: Vec<String> = keys
                .iter()
                .map(|k| underline(k.chars().count()))
                .collect();
            writeln!(out, "{}", lines.join(" "))?;
        }
        let values: Vec<String> = obj.values().map(to_compact_string).collect();
        if let Some(title) = title {
            write!(out, "{} ", title)?;
        }
        writeln!(out, "{}", values.join(" "))
    }
}

fn underline(len: usize) -> String {
    if len <= UNDERLINE.len() {
        UNDERLINE[..len].to_string()
    } else {
        "=".repeat(len)
    }
}

/// Prints matching records at a verbosity level.
///
/// Level 0 prints nothing, 1 the metadata line, 2 the detailed metadata,
/// 3 and above the record itself, as a table row or a JSON form.
#[derive(Debug)]
pub struct RecordPrinter {
    level: u8,
    form: bool,
    row_titles: bool,
    fields: Vec<String>,
    table: TableWriter,
}

impl RecordPrinter {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            form: false,
            row_titles: false,
            fields: Vec::new(),
            table: TableWriter::new(),
        }
    }

    /// Print records as titled JSON instead of table rows.
    pub fn with_form(mut self, form: bool) -> Self {
        self.form = form;
        self
    }

    /// Lead each table row with the record's metadata line.
    pub fn with_row_titles(mut self, row_titles: bool) -> Self {
        self.row_titles = row_titles;
        self
    }

    /// Project records down to these fields before printing.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn shows_content(&self) -> bool {
        self.level >= 3
    }

    /// Print a record, loading the body only when it is shown.
    pub fn print<W: Write>(
        &mut self,
        out: &mut W,
        md: &RecordMd,
        topic_dir: &Path,
        body: LazyBody<'_>,
    ) -> Result<()> {
        if self.shows_content() {
            let doc = body.into_document()?;
            self.print_document(out, md, topic_dir, &doc)
        } else {
            self.print_document(out, md, topic_dir, &Document::Null)
        }
    }

    pub fn print_document<W: Write>(
        &mut self,
        out: &mut W,
        md: &RecordMd,
        topic_dir: &Path,
        doc: &Document,
    ) -> Result<()> {
        match self.level {
            0 => {}
            1 => writeln!(out, "{}", md_title(md))?,
            2 => writeln!(out, "{}", md_detail(md, topic_dir))?,
            _ => {
                let shown = if self.fields.is_empty() {
                    doc.clone()
                } else {
                    select_paths(doc, &self.fields)
                };
                if self.form {
                    print_json(out, &md_title(md), &shown)?;
                } else if self.row_titles {
                    self.table.write_titled_row(out, &md_title(md), &shown)?;
                } else {
                    self.table.write_row(out, &shown)?;
                }
            }
        }
        Ok(())
    }
}

/// Wall-clock time of a run, reported in the closing summary line.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// `"<seconds> seconds; <rate> op/sec"` for `ops` records processed.
    pub fn summary(&self, ops: usize) -> String {
        rate_summary(self.start.elapsed().as_secs_f64(), ops)
    }
}

fn rate_summary(secs: f64, ops: usize) -> String {
    let rate = if secs > 0.0 {
        (ops as f64 / secs) as u64
    } else {
        0
    };
    format!("{:.6} seconds; {} op/sec", secs, rate)
}

/// Print every database under `root` with its topics.
pub fn print_databases<W: Write>(out: &mut W, root: &Path) -> Result<()> {
    for db in find_databases(root)? {
        let db_path = db.path();
        writeln!(out, "TimeRanger ==> '{}'", db_path.display())?;
        writeln!(out, "  TimeRanger database: '{}'", db.database)?;
        writeln!(out, "  Path: '{}'", db.root.display())?;
        writeln!(out, "    Topics:")?;
        for topic in find_topics(&db_path)? {
            writeln!(out, "        {}", topic.topic)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Ask a yes/no question; only an exact `yes` confirms.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<bool> {
    write!(out, "{} (yes/no) ", question)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}
