//! Markdown questions-and-answers export.
use crate::questionnaire::{FieldSpec, QuestionnaireSpec};
use crate::record::{DataRecord, FieldValue};

const TITLE: &str = "Information Memorandum - Questions & Answers";

/// Render every answered field, grouped by phase. Unanswered fields and
/// phases without answers are left out.
pub fn render_qa_markdown(spec: &QuestionnaireSpec, record: &DataRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {TITLE}\n\n"));
    append_metadata(&mut out, record);
    for phase in spec.phases() {
        let answered: Vec<(&FieldSpec, String)> = phase
            .fields()
            .iter()
            .filter_map(|field| {
                let value = record.get(&field.id).filter(|value| !value.is_empty())?;
                Some((field, answer_text(field, value)))
            })
            .collect();
        if answered.is_empty() {
            continue;
        }
        out.push_str(&format!("## {}\n\n", phase.name));
        for (field, answer) in answered {
            append_pair(&mut out, &field.label, &answer);
        }
    }
    out
}

fn append_metadata(out: &mut String, record: &DataRecord) {
    let company = record
        .text("companyName")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Company");
    let project = record
        .text("projectCodename")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Project");
    out.push_str(&format!("- Company: {company}\n- Project: {project}\n\n"));
}

fn append_pair(out: &mut String, question: &str, answer: &str) {
    out.push_str(&format!("**Q: {question}**\n\n"));
    let mut lines = answer.trim().lines();
    if let Some(first) = lines.next() {
        out.push_str(&format!("A: {}\n", first.trim_end()));
    }
    for line in lines {
        // Continuation lines indent under the answer.
        out.push_str(&format!("   {}\n", line.trim_end()));
    }
    out.push('\n');
}

/// Choice values render as their option labels.
fn answer_text(field: &FieldSpec, value: &FieldValue) -> String {
    if !field.kind.is_choice() {
        return value.display();
    }
    let label_for = |raw: &str| {
        field
            .options
            .iter()
            .find(|option| option.value.eq_ignore_ascii_case(raw.trim()))
            .map(|option| option.label.clone())
            .unwrap_or_else(|| raw.trim().to_string())
    };
    match value {
        FieldValue::Text(text) => label_for(text),
        FieldValue::List(items) => items
            .iter()
            .filter(|item| !item.trim().is_empty())
            .map(|item| label_for(item))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::builtin;
    use crate::testing::complete_record;

    #[test]
    fn renders_answered_fields_by_phase() {
        let markdown = render_qa_markdown(builtin(), &complete_record());

        assert!(markdown.starts_with("# Information Memorandum - Questions & Answers\n"));
        assert!(markdown.contains("- Company: Acme Analytics\n- Project: Project Phoenix\n"));
        assert!(markdown.contains("## Project Setup\n"));
        assert!(markdown.contains("**Q: Company Name**\n\nA: Acme Analytics\n"));
        assert!(markdown.contains("A: 100\n"));
        assert!(!markdown.contains("Advisor"));
        // The growth phase has no answers in the fixture.
        assert!(!markdown.contains("## Growth Strategy"));
    }

    #[test]
    fn choice_values_use_labels_and_lists_join() {
        let mut record = DataRecord::default();
        record.set(
            "targetBuyerType",
            vec!["strategic".to_string(), " ".to_string(), "financial".to_string()],
        );
        let markdown = render_qa_markdown(builtin(), &record);
        let (_, buyer) = builtin().field("targetBuyerType").expect("field");
        let expected: Vec<&str> = buyer
            .options
            .iter()
            .filter(|option| option.value != "international")
            .map(|option| option.label.as_str())
            .collect();
        assert!(markdown.contains(&format!("A: {}\n", expected.join(", "))));
        assert!(markdown.contains("- Company: Company\n- Project: Project\n"));
    }

    #[test]
    fn multi_line_answers_stay_in_one_block() {
        let mut record = DataRecord::default();
        record.set("investmentHighlights", "First point\nSecond point");
        let markdown = render_qa_markdown(builtin(), &record);
        assert!(markdown.contains("A: First point\n   Second point\n\n"));
    }
}
