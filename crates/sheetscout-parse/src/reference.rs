//! Splitting of reference operands into workbook, sheet and body parts.
//!
//! Handles the shapes Excel writes into cell formulas:
//!
//! * `A1`, `$B$2:C10`, `A:A`, `3:3`
//! * `Sheet1!A1`, `'Q1 Sales'!B2`, `'It''s'!A1`
//! * `Jan:Dec!B2` and `'Jan 24:Dec 24'!B2` (3-D references)
//! * `[Budget.xlsx]Plan!C4`, `'C:\dir\[Budget.xlsx]Plan'!C4`, `[1]Plan!C4`, `[1]!Rate`
//! * `Table1[Amount]`, `A2#`, and bare defined names

use sheetscout_common::{is_a1_cell, letters_to_column};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the body of a reference points at.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Cell,
    Range,
    Table,
    Name,
    Spill,
    Unknown,
}

/// Parsed reference operand.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Workbook inside `[...]`, either a file name or a link index like `1`.
    pub workbook: Option<String>,
    pub first_sheet: Option<String>,
    /// Set only for 3-D references (`Jan:Dec!A1`).
    pub last_sheet: Option<String>,
    pub body: String,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn parse(operand: &str) -> Reference {
        let operand = operand.trim();
        let (prefix, body) = match split_sheet_prefix(operand) {
            Some((prefix, body)) => (Some(prefix), body),
            None => (None, operand),
        };

        let (workbook, first_sheet, last_sheet) = match prefix {
            Some(prefix) => split_prefix(&prefix),
            None => {
                // `[Book.xlsx]Name` without a sheet part
                match split_workbook(body) {
                    (Some(book), rest) if !rest.is_empty() && !rest.contains('[') => {
                        return Reference {
                            workbook: Some(book),
                            first_sheet: None,
                            last_sheet: None,
                            body: rest.to_string(),
                            kind: classify_body(rest),
                        };
                    }
                    _ => (None, None, None),
                }
            }
        };

        Reference {
            workbook,
            first_sheet,
            last_sheet,
            body: body.to_string(),
            kind: classify_body(body),
        }
    }

    pub fn is_external(&self) -> bool {
        self.workbook.is_some()
    }

    /// A sheet-qualified reference into the same workbook.
    pub fn is_cross_sheet(&self) -> bool {
        self.workbook.is_none() && self.first_sheet.is_some()
    }

    pub fn is_3d(&self) -> bool {
        self.last_sheet.is_some()
    }

    /// Sheets named by the reference, first and last for 3-D ranges.
    pub fn sheets(&self) -> impl Iterator<Item = &str> {
        self.first_sheet
            .iter()
            .chain(self.last_sheet.iter())
            .map(String::as_str)
    }
}

/// Split `prefix!body` at the first `!` that is not inside quotes or brackets.
fn split_sheet_prefix(operand: &str) -> Option<(String, &str)> {
    let bytes = operand.as_bytes();
    let mut in_quote = false;
    let mut depth = 0usize;
    let mut split_at = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if in_quote && bytes.get(i + 1) == Some(&b'\'') => i += 1,
            b'\'' => in_quote = !in_quote,
            b'[' if !in_quote => depth += 1,
            b']' if !in_quote => depth = depth.saturating_sub(1),
            b'!' if !in_quote && depth == 0 => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let at = split_at?;
    Some((operand[..at].to_string(), &operand[at + 1..]))
}

fn unquote(part: &str) -> String {
    let trimmed = part.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].replace("''", "'")
    } else {
        trimmed.to_string()
    }
}

/// Peel `path\[Book.xlsx]` off the front of `text`.
fn split_workbook(text: &str) -> (Option<String>, &str) {
    let Some(open) = text.find('[') else {
        return (None, text);
    };
    let Some(close_rel) = text[open..].find(']') else {
        return (None, text);
    };
    let close = open + close_rel;
    if open > 0 && !text[..open].ends_with(['\\', '/']) {
        // `Table1[Col]` style; not a workbook prefix.
        return (None, text);
    }
    let book = &text[open + 1..close];
    if book.is_empty() {
        return (None, text);
    }
    (Some(book.to_string()), &text[close + 1..])
}

fn split_prefix(prefix: &str) -> (Option<String>, Option<String>, Option<String>) {
    let unquoted = unquote(prefix);
    let (workbook, sheets) = split_workbook(&unquoted);
    if sheets.is_empty() {
        return (workbook, None, None);
    }
    match sheets.split_once(':') {
        Some((first, last)) if !first.is_empty() && !last.is_empty() => (
            workbook,
            Some(first.to_string()),
            Some(last.to_string()),
        ),
        _ => (workbook, Some(sheets.to_string()), None),
    }
}

fn is_column_ref(s: &str) -> bool {
    let s = s.trim_start_matches('$');
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_alphabetic())
        && letters_to_column(&s.to_ascii_uppercase()).is_some_and(|c| c <= sheetscout_common::MAX_COLS)
}

fn is_row_ref(s: &str) -> bool {
    let s = s.trim_start_matches('$');
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn classify_body(body: &str) -> ReferenceKind {
    if body.is_empty() {
        return ReferenceKind::Unknown;
    }
    if let Some(base) = body.strip_suffix('#') {
        return if is_a1_cell(base) {
            ReferenceKind::Spill
        } else {
            ReferenceKind::Unknown
        };
    }
    if body.contains('[') {
        return ReferenceKind::Table;
    }
    if is_a1_cell(body) {
        return ReferenceKind::Cell;
    }
    if let Some((start, end)) = body.split_once(':') {
        let cells = is_a1_cell(start) && is_a1_cell(end);
        let cols = is_column_ref(start) && is_column_ref(end);
        let rows = is_row_ref(start) && is_row_ref(end);
        return if cells || cols || rows {
            ReferenceKind::Range
        } else {
            ReferenceKind::Unknown
        };
    }
    let first = body.chars().next().unwrap_or('0');
    if (first.is_alphabetic() || first == '_' || first == '\\')
        && body
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\\' | '?'))
    {
        ReferenceKind::Name
    } else {
        ReferenceKind::Unknown
    }
}
