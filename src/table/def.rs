//! Data-only decision-table definitions and their text format.
//!
//! A [`TableDef`] is the parsed form of one `[Section]` in a table file:
//! named condition rows of tri-state cells and named action rows of step
//! numbers, all spanning the same rule columns. Definitions carry no
//! behavior — binding names to live tests and handlers happens in
//! [`crate::table::DecisionTable::from_def`] — so they can be parsed once
//! and reused across merge sessions.
//!
//! # Text format
//!
//! Whitespace-delimited words, newline-significant rows. `//` starts a
//! comment (rest of line). `[name]` opens a table section. The first row of
//! a section must be the rule-column header: the word `rules` followed by
//! one label per column. Every following row is `name cell...`:
//!
//! ```text
//! // same-side precedence policy
//! [same-side-before]
//! rules            r1 r2
//! a-is-add         Y  N     // condition row: Y / N / - cells
//! b-inside-a       Y  -
//! before           1  -     // action row: step numbers, - means "does not fire"
//! ```
//!
//! A row whose non-dash cells are all `Y`/`N` is a condition; a row whose
//! non-dash cells are all step numbers is an action. An all-dash row is a
//! (vacuous) condition. Mixing cell kinds in one row is an error.

use crate::error::ReconcileError;
use crate::logic::Truth;

// ---------------------------------------------------------------------------
// TableDef
// ---------------------------------------------------------------------------

/// One parsed decision-table definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDef {
    /// Section name.
    pub name: String,
    /// Where this definition came from (file path or `<builtin>`).
    pub source: String,
    /// Rule-column count.
    pub columns: usize,
    /// Named condition rows: `Undefined` cells are "don't care".
    pub conditions: Vec<(String, Vec<Truth>)>,
    /// Named action rows: step `0` means "does not fire in this rule".
    pub actions: Vec<(String, Vec<u32>)>,
}

impl TableDef {
    /// Find a parsed definition by section name.
    #[must_use]
    pub fn find<'a>(defs: &'a [Self], name: &str) -> Option<&'a Self> {
        defs.iter().find(|def| def.name == name)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cell {
    Truth(Truth),
    Step(u32),
    Dash,
}

fn parse_cell(token: &str) -> Option<Cell> {
    match token {
        "Y" | "y" => Some(Cell::Truth(Truth::True)),
        "N" | "n" => Some(Cell::Truth(Truth::False)),
        "-" => Some(Cell::Dash),
        _ => token.parse::<u32>().ok().filter(|&s| s > 0).map(Cell::Step),
    }
}

/// Parse every table section in `text`.
///
/// `source` labels the origin for error messages and for the
/// [`ReconcileError::RuleViolation`]s later raised by actions bound from
/// these definitions.
pub fn parse(text: &str, source: &str) -> Result<Vec<TableDef>, ReconcileError> {
    let mut defs: Vec<TableDef> = Vec::new();
    let mut current: Option<TableDef> = None;
    let mut header_seen = false;

    let parse_err = |line: usize, detail: String| ReconcileError::TableParse {
        source: source.to_owned(),
        line,
        detail,
    };

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        // Section header.
        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                return Err(parse_err(lineno, format!("unterminated section header '{line}'")));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(parse_err(lineno, "empty section name".to_owned()));
            }
            if defs.iter().any(|d| d.name == name) || current.as_ref().is_some_and(|d| d.name == name) {
                return Err(parse_err(lineno, format!("duplicate section '{name}'")));
            }
            if let Some(done) = current.take() {
                defs.push(done);
            }
            current = Some(TableDef {
                name: name.to_owned(),
                source: source.to_owned(),
                columns: 0,
                conditions: Vec::new(),
                actions: Vec::new(),
            });
            header_seen = false;
            continue;
        }

        let Some(def) = current.as_mut() else {
            return Err(parse_err(lineno, format!("row '{line}' outside any [section]")));
        };

        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let rest: Vec<&str> = tokens.collect();

        // Rule-column header must come first in each section.
        if !header_seen {
            if name != "rules" {
                return Err(parse_err(
                    lineno,
                    format!("expected 'rules' column header, found '{name}'"),
                ));
            }
            if rest.is_empty() {
                return Err(parse_err(lineno, "rule-column header has no columns".to_owned()));
            }
            def.columns = rest.len();
            header_seen = true;
            continue;
        }

        if def.conditions.iter().any(|(n, _)| n == name)
            || def.actions.iter().any(|(n, _)| n == name)
        {
            return Err(parse_err(lineno, format!("duplicate row name '{name}'")));
        }
        if rest.len() != def.columns {
            return Err(ReconcileError::ColumnMismatch {
                table: def.name.clone(),
                row: name.to_owned(),
                expected: def.columns,
                found: rest.len(),
            });
        }

        let mut cells = Vec::with_capacity(rest.len());
        for token in &rest {
            match parse_cell(token) {
                Some(cell) => cells.push(cell),
                None => {
                    return Err(parse_err(
                        lineno,
                        format!("cell '{token}' is not Y, N, -, or a step number"),
                    ));
                }
            }
        }

        let has_truth = cells.iter().any(|c| matches!(c, Cell::Truth(_)));
        let has_step = cells.iter().any(|c| matches!(c, Cell::Step(_)));
        if has_truth && has_step {
            return Err(parse_err(
                lineno,
                format!("row '{name}' mixes condition cells with action steps"),
            ));
        }

        if has_step {
            let steps = cells
                .iter()
                .map(|c| if let Cell::Step(s) = c { *s } else { 0 })
                .collect();
            def.actions.push((name.to_owned(), steps));
        } else {
            // All-dash rows fall through here as vacuous conditions.
            let row = cells
                .iter()
                .map(|c| {
                    if let Cell::Truth(t) = c {
                        *t
                    } else {
                        Truth::Undefined
                    }
                })
                .collect();
            def.conditions.push((name.to_owned(), row));
        }
    }

    if let Some(done) = current.take() {
        defs.push(done);
    }
    Ok(defs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
