//! Answer values collected by the wizard.
//!
//! A `DataRecord` is the single in-progress document owned by a session. It is
//! deliberately loose: keys the questionnaire does not know are kept (and
//! ignored by validation), and values are only checked for presence and
//! numeric bounds.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One answer. Unit-like `Unset` round-trips as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
    Unset,
}

impl FieldValue {
    /// Blank text, lists without a non-blank entry, and `Unset` are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Number(_) => false,
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
            FieldValue::Unset => true,
        }
    }

    /// Non-blank lines of text or non-blank list items; a number counts once.
    pub fn entry_count(&self) -> usize {
        match self {
            FieldValue::Number(_) => 1,
            FieldValue::Text(text) => text.lines().filter(|line| !line.trim().is_empty()).count(),
            FieldValue::List(items) => items.iter().filter(|item| !item.trim().is_empty()).count(),
            FieldValue::Unset => 0,
        }
    }

    /// Numeric view used by bounds and growth checks.
    ///
    /// Form inputs often arrive as text, so numeric strings (with optional
    /// thousands separators) are accepted.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(text) => {
                let cleaned = text.trim().replace(',', "");
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
            }
            FieldValue::List(_) | FieldValue::Unset => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Human-readable rendering for prompts, exports, and terminal output.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Number(value) => format_number(*value),
            FieldValue::Text(text) => text.clone(),
            FieldValue::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            FieldValue::Unset => String::new(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// One field whose value differs between two records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

/// Field id -> answer. Ordered so serialized drafts and payloads are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRecord(BTreeMap<String, FieldValue>);

impl DataRecord {
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.0.get(id)
    }

    pub fn set(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(id.into(), value.into());
    }

    /// True when the field holds a non-empty value.
    pub fn is_filled(&self, id: &str) -> bool {
        self.get(id).is_some_and(|value| !value.is_empty())
    }

    pub fn number(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(FieldValue::as_number)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(FieldValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields whose values differ from `newer`, in key order.
    ///
    /// An absent key and an explicit `null` compare equal.
    pub fn changed_fields(&self, newer: &DataRecord) -> Vec<FieldChange> {
        let keys: BTreeSet<&String> = self.0.keys().chain(newer.0.keys()).collect();
        keys.into_iter()
            .filter_map(|key| {
                let old = self.get(key).filter(|v| **v != FieldValue::Unset);
                let new = newer.get(key).filter(|v| **v != FieldValue::Unset);
                (old != new).then(|| FieldChange {
                    field: key.clone(),
                    old: old.cloned(),
                    new: new.cloned(),
                })
            })
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for DataRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render integral floats without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
