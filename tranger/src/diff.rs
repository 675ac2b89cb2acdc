//! Structural comparison of JSON documents.
//!
//! Arrays are compared as multisets: two arrays are equal when every item
//! on the left can be paired with a distinct equal item on the right.
//! Objects are compared by key regardless of insertion order. Metadata keys
//! (`__*`) and private keys (`_*`) can be ignored at every nesting level.

use std::fmt;

use serde_json::{Map, Number};

use crate::document::Document;

/// Which keys to ignore while comparing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    /// Ignore `__*` keys.
    pub without_metadata: bool,
    /// Ignore `_*` keys that are not `__*`.
    pub without_private: bool,
}

impl CompareOptions {
    pub fn new(without_metadata: bool, without_private: bool) -> Self {
        Self {
            without_metadata,
            without_private,
        }
    }

    fn ignores(&self, key: &str) -> bool {
        if key.starts_with("__") {
            self.without_metadata
        } else if key.starts_with('_') {
            self.without_private
        } else {
            false
        }
    }
}

/// Why two fragments differ.
#[derive(Debug, Clone, PartialEq)]
pub enum DivergenceKind {
    /// Different JSON kinds (object vs array, string vs number, ...).
    KindMismatch,
    /// Same kind, different scalar value.
    ValueMismatch,
    /// Key present on the left only.
    MissingRight,
    /// Key present on the right only.
    MissingLeft,
    /// Arrays of different lengths.
    LengthMismatch { left: usize, right: usize },
    /// An array item with no equal, unused item on the other side. Only the
    /// left fragment is reported.
    Unmatched,
}

/// The first difference found between two documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    /// Location, e.g. `$.gps[2].lat`.
    pub path: String,
    pub kind: DivergenceKind,
    pub left: Option<Document>,
    pub right: Option<Document>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match &self.kind {
            DivergenceKind::KindMismatch => "different types".to_string(),
            DivergenceKind::ValueMismatch => "different values".to_string(),
            DivergenceKind::MissingRight => "key only in the first document".to_string(),
            DivergenceKind::MissingLeft => "key only in the second document".to_string(),
            DivergenceKind::LengthMismatch { left, right } => {
                format!("array lengths differ ({} vs {})", left, right)
            }
            DivergenceKind::Unmatched => "no equal item in the second document".to_string(),
        };
        write!(f, "{}: {}", self.path, reason)?;
        if let Some(left) = &self.left {
            write!(f, "\n  first:  {}", left)?;
        }
        if let Some(right) = &self.right {
            write!(f, "\n  second: {}", right)?;
        }
        Ok(())
    }
}

/// Result of a verbose comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub equal: bool,
    pub divergence: Option<Divergence>,
}

/// Compare two documents for structural equality.
pub fn compare(a: &Document, b: &Document, options: CompareOptions) -> bool {
    let comparer = Comparer { options };
    comparer.values(a, b, &mut Vec::new(), false).is_ok()
}

/// Compare two documents and report the first divergence.
pub fn compare_verbose(a: &Document, b: &Document, options: CompareOptions) -> Comparison {
    let comparer = Comparer { options };
    match comparer.values(a, b, &mut Vec::new(), true) {
        Ok(()) => Comparison {
            equal: true,
            divergence: None,
        },
        Err(divergence) => Comparison {
            equal: false,
            divergence,
        },
    }
}

enum Segment {
    Key(String),
    Index(usize),
}

fn render_path(path: &[Segment]) -> String {
    let mut rendered = String::from("$");
    for segment in path {
        match segment {
            Segment::Key(key) => {
                rendered.push('.');
                rendered.push_str(key);
            }
            Segment::Index(i) => rendered.push_str(&format!("[{}]", i)),
        }
    }
    rendered
}

/// `Err(None)` is a mismatch without details (report disabled).
type Outcome = Result<(), Option<Divergence>>;

struct Comparer {
    options: CompareOptions,
}

impl Comparer {
    fn values(&self, a: &Document, b: &Document, path: &mut Vec<Segment>, report: bool) -> Outcome {
        match (a, b) {
            (Document::Object(left), Document::Object(right)) => {
                self.objects(left, right, path, report)
            }
            (Document::Array(left), Document::Array(right)) => {
                self.arrays(left, right, path, report)
            }
            (Document::Number(x), Document::Number(y)) => {
                scalar(numbers_equal(x, y), a, b, path, report)
            }
            (Document::String(x), Document::String(y)) => scalar(x == y, a, b, path, report),
            (Document::Bool(x), Document::Bool(y)) => scalar(x == y, a, b, path, report),
            (Document::Null, Document::Null) => Ok(()),
            _ => Err(report.then(|| Divergence {
                path: render_path(path),
                kind: DivergenceKind::KindMismatch,
                left: Some(a.clone()),
                right: Some(b.clone()),
            })),
        }
    }

    fn objects(
        &self,
        left: &Map<String, Document>,
        right: &Map<String, Document>,
        path: &mut Vec<Segment>,
        report: bool,
    ) -> Outcome {
        for (key, value) in left.iter().filter(|(k, _)| !self.options.ignores(k)) {
            let Some(other) = right.get(key) else {
                path.push(Segment::Key(key.clone()));
                let divergence = report.then(|| Divergence {
                    path: render_path(path),
                    kind: DivergenceKind::MissingRight,
                    left: Some(value.clone()),
                    right: None,
                });
                path.pop();
                return Err(divergence);
            };
            path.push(Segment::Key(key.clone()));
            let outcome = self.values(value, other, path, report);
            path.pop();
            outcome?;
        }

        for (key, value) in right.iter().filter(|(k, _)| !self.options.ignores(k)) {
            if !left.contains_key(key) {
                path.push(Segment::Key(key.clone()));
                let divergence = report.then(|| Divergence {
                    path: render_path(path),
                    kind: DivergenceKind::MissingLeft,
                    left: None,
                    right: Some(value.clone()),
                });
                path.pop();
                return Err(divergence);
            }
        }
        Ok(())
    }

    fn arrays(
        &self,
        left: &[Document],
        right: &[Document],
        path: &mut Vec<Segment>,
        report: bool,
    ) -> Outcome {
        if left.len() != right.len() {
            return Err(report.then(|| Divergence {
                path: render_path(path),
                kind: DivergenceKind::LengthMismatch {
                    left: left.len(),
                    right: right.len(),
                },
                left: None,
                right: None,
            }));
        }

        // First-match greedy pairing.
        let mut used = vec![false; right.len()];
        for (i, item) in left.iter().enumerate() {
            path.push(Segment::Index(i));
            let found = (0..right.len())
                .find(|&j| !used[j] && self.values(item, &right[j], path, false).is_ok());
            match found {
                Some(j) => {
                    used[j] = true;
                    path.pop();
                }
                None => {
                    let divergence = report.then(|| Divergence {
                        path: render_path(path),
                        kind: DivergenceKind::Unmatched,
                        left: Some(item.clone()),
                        right: None,
                    });
                    path.pop();
                    return Err(divergence);
                }
            }
        }
        Ok(())
    }
}

fn scalar(equal: bool, a: &Document, b: &Document, path: &[Segment], report: bool) -> Outcome {
    if equal {
        return Ok(());
    }
    Err(report.then(|| Divergence {
        path: render_path(path),
        kind: DivergenceKind::ValueMismatch,
        left: Some(a.clone()),
        right: Some(b.clone()),
    }))
}

/// Numeric equality; an integer equals a float only when the float is
/// integral and converts back without loss.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.is_f64(), b.is_f64()) {
        (true, true) => a.as_f64() == b.as_f64(),
        // Both integers but one negative and the other beyond i64.
        (false, false) => false,
        _ => {
            let (int, float) = if a.is_f64() { (b, a) } else { (a, b) };
            let Some(f) = float.as_f64() else {
                return false;
            };
            let Some(i) = int
                .as_i64()
                .map(i128::from)
                .or_else(|| int.as_u64().map(i128::from))
            else {
                return false;
            };
            f.fract() == 0.0 && (i as f64) == f && (f as i128) == i
        }
    }
}
