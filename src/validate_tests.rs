use super::*;
use crate::questionnaire::{builtin, DocumentRules, FieldKind, FieldSpec, PhaseSpec};
use crate::testing::complete_record;

fn phase(spec: &QuestionnaireSpec, id: &str) -> PhaseSpec {
    spec.phases()
        .iter()
        .find(|phase| phase.id == id)
        .cloned()
        .expect("phase exists")
}

#[test]
fn complete_record_passes_every_phase() {
    let spec = builtin();
    let record = complete_record();
    for phase in spec.phases() {
        let errors = check_phase(phase, &record);
        assert!(errors.is_empty(), "phase {} errors: {errors:?}", phase.id);
    }
}

#[test]
fn phase_check_reports_required_then_bounds() {
    let phase = PhaseSpec::new(
        "numbers",
        "Numbers",
        vec![
            FieldSpec::new("needed", "Needed", FieldKind::ShortText, 1).required(),
            FieldSpec::new("pct", "Percent", FieldKind::Number, 2)
                .required()
                .bounds(Some(0.0), Some(100.0)),
            FieldSpec::new("low", "Low", FieldKind::Number, 3).bounds(Some(10.0), None),
            FieldSpec::new("free", "Free", FieldKind::Number, 4),
        ],
    );
    let mut record = DataRecord::default();
    record.set("pct", 150.0);
    record.set("low", "3");
    record.set("free", -5.0);

    let errors = check_phase(&phase, &record);
    assert_eq!(errors.get("needed").map(String::as_str), Some("Required"));
    assert_eq!(errors.get("pct").map(String::as_str), Some("Max: 100"));
    assert_eq!(errors.get("low").map(String::as_str), Some("Min: 10"));
    assert!(!errors.contains_key("free"));
    assert_eq!(errors.len(), 3);
}

#[test]
fn phase_check_ignores_non_numeric_text_in_number_fields() {
    let phase = PhaseSpec::new(
        "numbers",
        "Numbers",
        vec![FieldSpec::new("pct", "Percent", FieldKind::Number, 1).bounds(Some(0.0), Some(1.0))],
    );
    let mut record = DataRecord::default();
    record.set("pct", "about half");
    assert!(check_phase(&phase, &record).is_empty());
}

#[test]
fn phase_check_applies_conditional_requirements() {
    let spec = builtin();
    let growth = phase(spec, "growth");
    let mut record = complete_record();
    assert!(check_phase(&growth, &record).is_empty());

    record.set(
        "targetBuyerType",
        vec!["strategic".to_string(), "financial".to_string()],
    );
    let errors = check_phase(&growth, &record);
    assert_eq!(
        errors.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["synergiesFinancial", "synergiesStrategic"]
    );
}

#[test]
fn document_check_emits_one_error_per_missing_required_field() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("companyName", "   ");
    record.set("serviceLines", crate::record::FieldValue::Unset);

    let report = check_document(spec, &record);
    assert_eq!(
        report.errors,
        vec![
            ReportError {
                phase: "Project Setup".to_string(),
                field: "Company Name".to_string(),
                message: MISSING_MESSAGE.to_string(),
            },
            ReportError {
                phase: "Services & Products".to_string(),
                field: "Service Lines".to_string(),
                message: MISSING_MESSAGE.to_string(),
            },
        ]
    );
}

#[test]
fn empty_record_lists_every_unconditional_requirement() {
    let spec = builtin();
    let report = check_document(spec, &DataRecord::default());
    let required = spec.fields().filter(|(_, field)| field.required).count();
    assert_eq!(report.errors.len(), required);
    assert!(!report.is_clean());
}

#[test]
fn cim_documents_require_extra_sections() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("documentType", "cim");
    let report = check_document(spec, &record);
    let fields: Vec<&str> = report.errors.iter().map(|error| error.field.as_str()).collect();
    assert_eq!(
        fields,
        vec!["Leadership Team", "Growth Drivers", "Competitive Advantages"]
    );
}

#[test]
fn growth_above_threshold_warns_once_with_rounded_percentage() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("revenueFY25", 100.0);
    record.set("revenueFY26P", 250.0);

    let report = check_document(spec, &record);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].phase, "Financials");
    assert!(report.warnings[0].message.contains("150%"));
    assert!(report.is_clean());
}

#[test]
fn growth_at_or_below_threshold_does_not_warn() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("revenueFY25", 100.0);
    record.set("revenueFY26P", 150.0);
    assert!(check_document(spec, &record).warnings.is_empty());

    record.set("revenueFY26P", 200.0);
    assert!(check_document(spec, &record).warnings.is_empty());
}

#[test]
fn growth_check_skips_zero_or_missing_base() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("revenueFY25", 0.0);
    record.set("revenueFY26P", 500.0);
    assert!(check_document(spec, &record).warnings.is_empty());

    record.set("revenueFY25", "not a number");
    assert!(check_document(spec, &record).warnings.is_empty());
    assert_eq!(growth_pct(0.0, 10.0), None);
}

#[test]
fn growth_accepts_numeric_text() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("revenueFY25", "1,000");
    record.set("revenueFY26P", "2,500");
    let report = check_document(spec, &record);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("150%"));
}

#[test]
fn highlights_below_five_lines_suggest_more() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("investmentHighlights", "one\n\ntwo\n   \nthree\nfour\n");

    let report = check_document(spec, &record);
    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].phase, "Company Overview");
    assert!(report.suggestions[0].message.contains("has 4 point(s)"));
    assert!(report.suggestions[0].message.contains("5-7"));
}

#[test]
fn five_highlight_lines_need_no_suggestion() {
    let spec = builtin();
    let record = complete_record();
    assert!(check_document(spec, &record).suggestions.is_empty());
}

#[test]
fn document_check_is_idempotent_and_ordered() {
    let spec = builtin();
    let mut record = DataRecord::default();
    record.set("revenueFY25", 10.0);
    record.set("revenueFY26P", 100.0);
    record.set("investmentHighlights", "only one");

    let first = check_document(spec, &record);
    let second = check_document(spec, &record);
    assert_eq!(first, second);
    assert!(!first.errors.is_empty());
    assert_eq!(first.warnings.len(), 1);
    assert_eq!(first.suggestions.len(), 1);
}

#[test]
fn unknown_keys_are_ignored() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("someLegacyField", "whatever");
    assert_eq!(check_document(spec, &record), ValidationReport::default());
}

#[test]
fn specs_without_rules_only_check_requirements() {
    let spec = QuestionnaireSpec::new(
        vec![PhaseSpec::new(
            "one",
            "One",
            vec![FieldSpec::new("a", "A", FieldKind::ShortText, 1)],
        )],
        DocumentRules::default(),
    );
    assert!(!check_document(&spec, &DataRecord::default()).has_findings());
}

#[test]
fn additional_case_studies_need_at_least_three_entries() {
    let spec = builtin();
    let case_studies = phase(spec, "caseStudies");
    let mut record = complete_record();
    record.set("caseStudies", "Bank A|BFSI|Legacy core|Lakehouse|-30% cost");
    assert!(check_phase(&case_studies, &record).is_empty());

    record.set("includeAdditionalCaseStudies", "yes");
    let errors = check_phase(&case_studies, &record);
    assert_eq!(
        errors.get("caseStudies").map(String::as_str),
        Some("At least 3 entries required")
    );
    let report = check_document(spec, &record);
    assert_eq!(
        report.errors,
        vec![ReportError {
            phase: "Case Studies".to_string(),
            field: "Additional Case Studies".to_string(),
            message: "At least 3 entries required, found 1".to_string(),
        }]
    );

    record.set(
        "caseStudies",
        "Bank A|BFSI|a|b|c\n\nInsurer B|BFSI|a|b|c\nRetailer C|Retail|a|b|c\n",
    );
    assert!(check_phase(&case_studies, &record).is_empty());
    assert!(check_document(spec, &record).is_clean());
}

#[test]
fn missing_case_studies_report_required_once() {
    let spec = builtin();
    let mut record = complete_record();
    record.set("includeAdditionalCaseStudies", "yes");
    let report = check_document(spec, &record);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].message, MISSING_MESSAGE);
}
