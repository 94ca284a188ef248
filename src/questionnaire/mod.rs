//! Declarative questionnaire: phases, fields, and document-level rules.
//!
//! The questionnaire is plain data. It is assembled once at startup (built-in
//! phases plus configured custom questions), checked with
//! [`QuestionnaireSpec::validate`], and then shared read-only for the life of
//! the process.
use crate::record::{DataRecord, FieldValue};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

mod builtin;
mod custom;

pub use custom::CustomQuestion;

/// Input kinds the wizard knows how to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ShortText,
    LongText,
    SingleChoice,
    MultipleChoice,
    Date,
    Number,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::ShortText => "short_text",
            FieldKind::LongText => "long_text",
            FieldKind::SingleChoice => "single_choice",
            FieldKind::MultipleChoice => "multiple_choice",
            FieldKind::Date => "date",
            FieldKind::Number => "number",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, FieldKind::SingleChoice | FieldKind::MultipleChoice)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Condition under which an optional field becomes required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    /// The referenced field holds any non-empty value.
    Filled { field: String },
    /// The referenced text field equals `value` (case-insensitive).
    Equals { field: String, value: String },
    /// The referenced list contains `value`, or a text answer equals it.
    Contains { field: String, value: String },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Filled { field }
            | Condition::Equals { field, .. }
            | Condition::Contains { field, .. } => field,
        }
    }

    pub fn holds(&self, record: &DataRecord) -> bool {
        match self {
            Condition::Filled { field } => record.is_filled(field),
            Condition::Equals { field, value } => record
                .text(field)
                .is_some_and(|text| text.trim().eq_ignore_ascii_case(value)),
            Condition::Contains { field, value } => match record.get(field) {
                Some(FieldValue::List(items)) => items.iter().any(|item| item.trim() == value),
                Some(FieldValue::Text(text)) => text.trim() == value,
                _ => false,
            },
        }
    }
}

/// One input. Immutable once the questionnaire is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_when: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Fewest non-blank lines or items accepted while the field is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_entries: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub rank: u32,
}

impl FieldSpec {
    pub fn new(id: &str, label: &str, kind: FieldKind, rank: u32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            required_when: None,
            min: None,
            max: None,
            min_entries: None,
            default: None,
            help: None,
            options: Vec::new(),
            rank,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn required_when(mut self, condition: Condition) -> Self {
        self.required_when = Some(condition);
        self
    }

    pub fn bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn min_entries(mut self, count: usize) -> Self {
        self.min_entries = Some(count);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, label)| ChoiceOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect();
        self
    }

    /// Required either unconditionally or because its condition holds.
    pub fn is_required_for(&self, record: &DataRecord) -> bool {
        self.required
            || self
                .required_when
                .as_ref()
                .is_some_and(|condition| condition.holds(record))
    }
}

/// A named group of fields shown together in one wizard step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSpec {
    pub id: String,
    pub name: String,
    fields: Vec<FieldSpec>,
}

impl PhaseSpec {
    /// Fields are sorted by rank; ties keep declaration order.
    pub fn new(id: &str, name: &str, mut fields: Vec<FieldSpec>) -> Self {
        fields.sort_by_key(|field| field.rank);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fields,
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }
}

#[derive(Deserialize)]
struct RawPhaseSpec {
    id: String,
    name: String,
    fields: Vec<FieldSpec>,
}

impl<'de> Deserialize<'de> for PhaseSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPhaseSpec::deserialize(deserializer)?;
        Ok(PhaseSpec::new(&raw.id, &raw.name, raw.fields))
    }
}

/// Cross-field growth check between two revenue fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRule {
    pub current: String,
    pub projected: String,
    /// Growth percentage that must be exceeded before warning.
    pub max_growth_pct: f64,
}

/// Line-count recommendation for a newline-delimited free-text field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightsRule {
    pub field: String,
    pub min_lines: usize,
    pub max_lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<HighlightsRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireSpec {
    phases: Vec<PhaseSpec>,
    #[serde(default)]
    rules: DocumentRules,
}

impl QuestionnaireSpec {
    pub fn new(phases: Vec<PhaseSpec>, rules: DocumentRules) -> Self {
        Self { phases, rules }
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    pub fn rules(&self) -> &DocumentRules {
        &self.rules
    }

    /// Locate a field together with the phase that owns it.
    pub fn field(&self, id: &str) -> Option<(&PhaseSpec, &FieldSpec)> {
        self.phases
            .iter()
            .find_map(|phase| phase.field(id).map(|field| (phase, field)))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&PhaseSpec, &FieldSpec)> {
        self.phases
            .iter()
            .flat_map(|phase| phase.fields().iter().map(move |field| (phase, field)))
    }

    /// Record holding every declared default, used to seed a new form.
    pub fn defaults(&self) -> DataRecord {
        self.fields()
            .filter_map(|(_, field)| {
                field
                    .default
                    .clone()
                    .map(|value| (field.id.clone(), value))
            })
            .collect()
    }

    /// Append custom questions to their phases. Must run before the questionnaire is shared.
    pub fn extend_with_custom(&mut self, questions: &[CustomQuestion]) -> Result<()> {
        for (index, question) in questions.iter().enumerate() {
            let field = question.to_field(index);
            let phase = self
                .phases
                .iter_mut()
                .find(|phase| phase.id == question.phase)
                .ok_or_else(|| {
                    anyhow!(
                        "custom question {:?} targets unknown phase {:?}",
                        field.id,
                        question.phase
                    )
                })?;
            phase.fields.push(field);
            phase.fields.sort_by_key(|field| field.rank);
        }
        self.validate()
    }

    /// Check internal consistency of the schema itself.
    pub fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            return Err(anyhow!("questionnaire has no phases"));
        }
        let mut phase_ids = BTreeSet::new();
        let mut field_ids = BTreeSet::new();
        for phase in &self.phases {
            if !phase_ids.insert(phase.id.as_str()) {
                return Err(anyhow!("duplicate phase id {:?}", phase.id));
            }
            for field in phase.fields() {
                if field.id.trim().is_empty() {
                    return Err(anyhow!("phase {:?} has a field with an empty id", phase.id));
                }
                if !field_ids.insert(field.id.as_str()) {
                    return Err(anyhow!("duplicate field id {:?}", field.id));
                }
                validate_field(field)?;
            }
        }
        for (_, field) in self.fields() {
            if let Some(condition) = &field.required_when {
                if !field_ids.contains(condition.field()) {
                    return Err(anyhow!(
                        "field {:?} depends on unknown field {:?}",
                        field.id,
                        condition.field()
                    ));
                }
            }
        }
        if let Some(rule) = &self.rules.growth {
            for id in [&rule.current, &rule.projected] {
                self.expect_kind(id, FieldKind::Number, "growth rule")?;
            }
        }
        if let Some(rule) = &self.rules.highlights {
            self.expect_kind(&rule.field, FieldKind::LongText, "highlights rule")?;
            if rule.min_lines > rule.max_lines {
                return Err(anyhow!(
                    "highlights rule range {}-{} is inverted",
                    rule.min_lines,
                    rule.max_lines
                ));
            }
        }
        Ok(())
    }

    fn expect_kind(&self, id: &str, kind: FieldKind, context: &str) -> Result<()> {
        let (_, field) = self
            .field(id)
            .ok_or_else(|| anyhow!("{context} references unknown field {id:?}"))?;
        if field.kind != kind {
            return Err(anyhow!(
                "{context} field {id:?} must be {kind}, found {}",
                field.kind
            ));
        }
        Ok(())
    }
}

fn validate_field(field: &FieldSpec) -> Result<()> {
    let has_bounds = field.min.is_some() || field.max.is_some();
    if has_bounds && field.kind != FieldKind::Number {
        return Err(anyhow!(
            "field {:?} declares numeric bounds but is {}",
            field.id,
            field.kind
        ));
    }
    if let (Some(min), Some(max)) = (field.min, field.max) {
        if min > max {
            return Err(anyhow!("field {:?} has min {min} above max {max}", field.id));
        }
    }
    if let Some(count) = field.min_entries {
        if !matches!(field.kind, FieldKind::LongText | FieldKind::MultipleChoice) {
            return Err(anyhow!(
                "field {:?} declares an entry minimum but is {}",
                field.id,
                field.kind
            ));
        }
        if count == 0 {
            return Err(anyhow!("field {:?} has an entry minimum of 0", field.id));
        }
    }
    if field.kind.is_choice() && field.options.is_empty() {
        return Err(anyhow!("choice field {:?} has no options", field.id));
    }
    Ok(())
}

/// The built-in questionnaire, assembled on first use.
pub fn builtin() -> &'static QuestionnaireSpec {
    static SPEC: OnceLock<QuestionnaireSpec> = OnceLock::new();
    SPEC.get_or_init(builtin::questionnaire)
}
