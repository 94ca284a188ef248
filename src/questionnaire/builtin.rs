//! Built-in phases for information memorandum intake.
use super::{
    Condition, DocumentRules, FieldKind, FieldSpec, GrowthRule, HighlightsRule, PhaseSpec,
    QuestionnaireSpec,
};

pub(super) const CURRENT_REVENUE: &str = "revenueFY25";
pub(super) const PROJECTED_REVENUE: &str = "revenueFY26P";
pub(super) const HIGHLIGHTS: &str = "investmentHighlights";
const CASE_STUDIES: &str = "caseStudies";

const DOCUMENT_TYPES: &[(&str, &str)] = &[
    ("management-presentation", "Management Presentation"),
    ("cim", "Confidential Information Memorandum"),
    ("teaser", "Teaser Document"),
];

const VERTICALS: &[(&str, &str)] = &[
    ("bfsi", "Banking, Financial Services & Insurance"),
    ("healthcare", "Healthcare & Life Sciences"),
    ("retail", "Retail & Consumer"),
    ("manufacturing", "Manufacturing & Industrial"),
    ("technology", "Technology & Software"),
    ("media", "Media, Entertainment & Digital"),
];

const CURRENCIES: &[(&str, &str)] = &[
    ("INR", "Indian Rupee"),
    ("USD", "US Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
];

const YES_NO: &[(&str, &str)] = &[("yes", "Yes"), ("no", "No")];

/// Featured case studies, asked one field at a time.
const CASE_STUDY_PARTS: &[(&str, &str)] = &[
    ("Client", "Client"),
    ("Industry", "Industry"),
    ("Challenge", "Challenge"),
    ("Solution", "Solution"),
    ("Results", "Results"),
];

const BUYER_TYPES: &[(&str, &str)] = &[
    ("strategic", "Strategic Buyer"),
    ("financial", "Financial Investor"),
    ("international", "International Acquirer"),
];

fn is_cim() -> Condition {
    Condition::Equals {
        field: "documentType".to_string(),
        value: "cim".to_string(),
    }
}

fn targets_buyer(kind: &str) -> Condition {
    Condition::Contains {
        field: "targetBuyerType".to_string(),
        value: kind.to_string(),
    }
}

fn featured_case_study(number: u32) -> Vec<FieldSpec> {
    CASE_STUDY_PARTS
        .iter()
        .zip(0..)
        .map(|((suffix, label), offset)| {
            let kind = if offset < 2 {
                FieldKind::ShortText
            } else {
                FieldKind::LongText
            };
            FieldSpec::new(
                &format!("cs{number}{suffix}"),
                &format!("Case Study {number}: {label}"),
                kind,
                number * 10 + offset,
            )
        })
        .collect()
}

pub(super) fn questionnaire() -> QuestionnaireSpec {
    use FieldKind::*;

    let setup = PhaseSpec::new(
        "setup",
        "Project Setup",
        vec![
            FieldSpec::new("projectCodename", "Project Codename", ShortText, 1)
                .required()
                .help("Code name used on every page instead of the company name"),
            FieldSpec::new("companyName", "Company Name", ShortText, 2).required(),
            FieldSpec::new("documentType", "Document Type", SingleChoice, 3)
                .required()
                .options(DOCUMENT_TYPES)
                .default_value("management-presentation"),
            FieldSpec::new("advisor", "Advisor", ShortText, 4),
            FieldSpec::new("presentationDate", "Presentation Date", Date, 5),
        ],
    );

    let overview = PhaseSpec::new(
        "overview",
        "Company Overview",
        vec![
            FieldSpec::new("foundedYear", "Founded Year", Number, 1)
                .bounds(Some(1800.0), Some(2100.0)),
            FieldSpec::new("headquarters", "Headquarters", ShortText, 2),
            FieldSpec::new("companyDescription", "Company Description", LongText, 3).required(),
            FieldSpec::new("employeeCountFT", "Full-Time Employees", Number, 4)
                .bounds(Some(0.0), None),
            FieldSpec::new(HIGHLIGHTS, "Investment Highlights", LongText, 5)
                .required()
                .help("One highlight per line; 5-7 highlights work best"),
        ],
    );

    let leadership = PhaseSpec::new(
        "leadership",
        "Leadership",
        vec![
            FieldSpec::new("founderName", "Founder Name", ShortText, 1).required(),
            FieldSpec::new("founderTitle", "Founder Title", ShortText, 2),
            FieldSpec::new("founderExperience", "Years of Experience", Number, 3)
                .bounds(Some(0.0), Some(70.0)),
            FieldSpec::new("founderEducation", "Education", ShortText, 4),
            FieldSpec::new("leadershipTeam", "Leadership Team", LongText, 5)
                .required_when(is_cim())
                .help("Name|Title|Background, one person per line"),
            FieldSpec::new("contactEmail", "Contact Email", ShortText, 6),
            FieldSpec::new("contactPhone", "Contact Phone", ShortText, 7),
        ],
    );

    let services = PhaseSpec::new(
        "services",
        "Services & Products",
        vec![
            FieldSpec::new("serviceLines", "Service Lines", LongText, 1)
                .required()
                .help("Service|Revenue share|Description, one per line"),
            FieldSpec::new("products", "Products", LongText, 2),
            FieldSpec::new("techPartnerships", "Tech Partnerships", LongText, 3),
        ],
    );

    let clients = PhaseSpec::new(
        "clients",
        "Clients",
        vec![
            FieldSpec::new("primaryVertical", "Primary Vertical", SingleChoice, 1)
                .required()
                .options(VERTICALS)
                .default_value("technology"),
            FieldSpec::new("topClients", "Top Clients", LongText, 2),
            FieldSpec::new("top10Concentration", "Top 10 Concentration (%)", Number, 3)
                .bounds(Some(0.0), Some(100.0)),
            FieldSpec::new("netRetention", "Net Revenue Retention (%)", Number, 4)
                .bounds(Some(0.0), Some(300.0)),
        ],
    );

    let mut case_study_fields = featured_case_study(1);
    case_study_fields.extend(featured_case_study(2));
    case_study_fields.push(
        FieldSpec::new(
            "includeAdditionalCaseStudies",
            "Include Additional Case Studies",
            SingleChoice,
            30,
        )
        .options(YES_NO)
        .default_value("no"),
    );
    case_study_fields.push(
        FieldSpec::new(CASE_STUDIES, "Additional Case Studies", LongText, 31)
            .required_when(Condition::Equals {
                field: "includeAdditionalCaseStudies".to_string(),
                value: "yes".to_string(),
            })
            .min_entries(3)
            .help("Client|Industry|Challenge|Solution|Results, one per line"),
    );
    let case_studies = PhaseSpec::new("caseStudies", "Case Studies", case_study_fields);

    let market = PhaseSpec::new(
        "market",
        "Market & Risks",
        vec![
            FieldSpec::new("marketSize", "Market Size", ShortText, 1),
            FieldSpec::new("marketGrowthRate", "Market Growth Rate (%)", Number, 2)
                .bounds(Some(-100.0), None),
            FieldSpec::new("competitivePositioning", "Competitive Positioning", LongText, 3),
            FieldSpec::new("riskFactors", "Risk Factors", LongText, 4)
                .help("One risk and its mitigation per line"),
        ],
    );

    let financials = PhaseSpec::new(
        "financials",
        "Financials",
        vec![
            FieldSpec::new("currency", "Currency", SingleChoice, 1)
                .required()
                .options(CURRENCIES)
                .default_value("INR"),
            FieldSpec::new("revenueFY24", "Revenue FY24", Number, 2).bounds(Some(0.0), None),
            FieldSpec::new(CURRENT_REVENUE, "Revenue FY25", Number, 3)
                .required()
                .bounds(Some(0.0), None),
            FieldSpec::new(PROJECTED_REVENUE, "Revenue FY26P", Number, 4)
                .bounds(Some(0.0), None),
            FieldSpec::new("revenueFY27P", "Revenue FY27P", Number, 5).bounds(Some(0.0), None),
            FieldSpec::new("ebitdaMarginFY25", "EBITDA Margin FY25 (%)", Number, 6)
                .bounds(Some(-100.0), Some(100.0))
                .required_when(Condition::Filled {
                    field: CURRENT_REVENUE.to_string(),
                }),
            FieldSpec::new("grossMargin", "Gross Margin (%)", Number, 7)
                .bounds(Some(0.0), Some(100.0)),
        ],
    );

    let growth = PhaseSpec::new(
        "growth",
        "Growth Strategy",
        vec![
            FieldSpec::new("targetBuyerType", "Target Buyer Types", MultipleChoice, 1)
                .options(BUYER_TYPES),
            FieldSpec::new("growthDrivers", "Growth Drivers", LongText, 2)
                .required_when(is_cim()),
            FieldSpec::new("competitiveAdvantages", "Competitive Advantages", LongText, 3)
                .required_when(is_cim()),
            FieldSpec::new("synergiesStrategic", "Strategic Synergies", LongText, 4)
                .required_when(targets_buyer("strategic")),
            FieldSpec::new("synergiesFinancial", "Financial Synergies", LongText, 5)
                .required_when(targets_buyer("financial")),
            FieldSpec::new("shortTermGoals", "Short-Term Goals", LongText, 6),
            FieldSpec::new("mediumTermGoals", "Medium-Term Goals", LongText, 7),
        ],
    );

    QuestionnaireSpec::new(
        vec![
            setup,
            overview,
            leadership,
            services,
            clients,
            case_studies,
            market,
            financials,
            growth,
        ],
        DocumentRules {
            growth: Some(GrowthRule {
                current: CURRENT_REVENUE.to_string(),
                projected: PROJECTED_REVENUE.to_string(),
                max_growth_pct: 100.0,
            }),
            highlights: Some(HighlightsRule {
                field: HIGHLIGHTS.to_string(),
                min_lines: 5,
                max_lines: 7,
            }),
        },
    )
}
