//! User-defined questions appended to built-in phases.
use super::{ChoiceOption, FieldKind, FieldSpec};
use serde::{Deserialize, Serialize};

/// Rank assigned to custom questions so they trail the built-in fields.
pub const CUSTOM_QUESTION_RANK: u32 = 999;

/// Config entry describing one extra question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomQuestion {
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Required for `single_choice` and `multiple_choice` questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
}

fn default_kind() -> FieldKind {
    FieldKind::LongText
}

impl CustomQuestion {
    pub(crate) fn to_field(&self, index: usize) -> FieldSpec {
        let id = self
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("custom_{}", index + 1));
        let mut field = FieldSpec::new(&id, &self.label, self.kind, CUSTOM_QUESTION_RANK);
        field.required = self.required;
        field.help = self.help.clone();
        field.options = self.options.clone();
        field
    }
}
