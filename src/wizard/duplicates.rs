//! Navigation over detected duplicates and the side-by-side comparison.

use serde::Serialize;

use crate::api::types::{DuplicateMatch, ExistingRecord, IncomingRow};

/// One row of the side-by-side comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldComparison {
    pub label: &'static str,
    pub existing: String,
    pub incoming: String,
    /// True when the values differ after trimming and case folding.
    pub differs: bool,
}

/// Read-only cursor over a non-empty list of duplicates.
///
/// Movement clamps at both ends; there is no wraparound.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateNavigator<'a> {
    matches: &'a [DuplicateMatch],
    index: usize,
}

impl<'a> DuplicateNavigator<'a> {
    /// Returns `None` for an empty list. An out-of-range `index` is clamped.
    pub fn new(matches: &'a [DuplicateMatch], index: usize) -> Option<Self> {
        if matches.is_empty() {
            return None;
        }
        Some(Self {
            matches,
            index: index.min(matches.len() - 1),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.matches.len()
    }

    pub fn current(&self) -> &'a DuplicateMatch {
        &self.matches[self.index]
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.matches.len()
    }

    /// Index after "Next". Unchanged at the last match.
    pub fn next_index(&self) -> usize {
        if self.is_last() {
            self.index
        } else {
            self.index + 1
        }
    }

    /// Index after "Previous". Unchanged at the first match.
    pub fn previous_index(&self) -> usize {
        self.index.saturating_sub(1)
    }

    /// "Duplicate 1 of 2"
    pub fn position_label(&self) -> String {
        format!("Duplicate {} of {}", self.index + 1, self.matches.len())
    }

    pub fn comparison(&self) -> Vec<FieldComparison> {
        compare_fields(&self.current().existing_record, &self.current().incoming_row)
    }
}

/// Builds the comparison rows shown for one match.
pub fn compare_fields(existing: &ExistingRecord, incoming: &IncomingRow) -> Vec<FieldComparison> {
    vec![
        field(
            "Name",
            full_name(existing.first_name.as_deref(), existing.last_name.as_deref()),
            full_name(incoming.first_name.as_deref(), incoming.last_name.as_deref()),
        ),
        field(
            "Email",
            existing.email.clone().unwrap_or_default(),
            incoming.email.clone().unwrap_or_default(),
        ),
        field(
            "Phone",
            existing.phone.clone().unwrap_or_default(),
            incoming.phone.clone().unwrap_or_default(),
        ),
    ]
}

fn field(label: &'static str, existing: String, incoming: String) -> FieldComparison {
    let differs = normalize(&existing) != normalize(&incoming);
    FieldComparison {
        label,
        existing,
        incoming,
        differs,
    }
}

fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
