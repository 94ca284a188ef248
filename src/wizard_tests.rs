use super::*;
use crate::questionnaire::builtin;
use crate::testing::complete_record;
use std::io::Cursor;
use std::sync::Arc;

fn run(session: &mut Session, input: &str) -> (WizardExit, String, usize) {
    let mut saves = 0;
    let mut output = Vec::new();
    let exit = {
        let mut wizard = Wizard::new(Cursor::new(input.to_string()), &mut output, |_record| {
            saves += 1;
            Ok("k1".to_string())
        });
        wizard.run(session).expect("wizard run")
    };
    (exit, String::from_utf8(output).expect("utf8 output"), saves)
}

fn blank_session() -> Session {
    Session::new("phoenix", Arc::new(builtin().clone())).expect("session")
}

fn complete_session() -> Session {
    Session::resume("phoenix", Arc::new(builtin().clone()), complete_record()).expect("session")
}

#[test]
fn keeping_every_answer_finishes_a_complete_record() {
    let mut session = complete_session();
    let fields = builtin().fields().count();
    let (exit, output, _) = run(&mut session, &"\n".repeat(fields));

    assert_eq!(exit, WizardExit::Finished);
    assert_eq!(session.form.progress(), (9, 9));
    assert_eq!(session.record(), &{
        let spec = builtin();
        let mut expected = spec.defaults();
        for (id, value) in complete_record().iter() {
            expected.set(id.clone(), value.clone());
        }
        expected
    });
    assert!(output.contains("== Phase 9/9: Growth Strategy"));
    assert!(output.contains("All phases complete."));
}

#[test]
fn blocked_phase_reprompts_only_failing_fields() {
    let mut session = blank_session();
    let input = "\n\n\n\n\nProject Phoenix\nAcme Analytics\n:quit\n";
    let (exit, output, _) = run(&mut session, input);

    assert_eq!(exit, WizardExit::Quit);
    assert!(output.contains("Please fix the following:"));
    assert!(output.contains("  - Project Codename: Required"));
    assert!(output.contains("  - Company Name: Required"));
    assert_eq!(output.matches("\nAdvisor").count(), 1);
    assert_eq!(session.record().text("companyName"), Some("Acme Analytics"));
    assert_eq!(session.form.current_index(), 1);
}

#[test]
fn back_returns_to_previous_phase() {
    let mut session = complete_session();
    let (exit, output, _) = run(&mut session, "\n\n\n\n\n:back\n:quit\n");

    assert_eq!(exit, WizardExit::Quit);
    assert_eq!(session.form.current_index(), 0);
    assert_eq!(output.matches("== Phase 1/9: Project Setup").count(), 2);
    assert!(session.form.completed_phases().contains(&0));
}

#[test]
fn save_calls_the_draft_sink_and_repeats_the_question() {
    let mut session = blank_session();
    let (exit, output, saves) = run(&mut session, ":save\n:quit\n");

    assert_eq!(exit, WizardExit::Quit);
    assert_eq!(saves, 1);
    assert!(output.contains("Draft saved as k1."));
    assert_eq!(output.matches("\nProject Codename *").count(), 2);
}

#[test]
fn end_of_input_quits() {
    let mut session = blank_session();
    let (exit, _, _) = run(&mut session, "Project Phoenix\n");
    assert_eq!(exit, WizardExit::Quit);
    assert_eq!(session.record().text("projectCodename"), Some("Project Phoenix"));
}

#[test]
fn choices_accept_numbers_and_values() {
    let mut session = blank_session();
    // Codename, company, document type by number, advisor cleared, date.
    let input = "P\nAcme\n2\n:clear\n2025-11-01\n:quit\n";
    let (_, _, _) = run(&mut session, input);

    assert_eq!(session.record().text("documentType"), Some("cim"));
    assert_eq!(session.record().get("advisor"), Some(&FieldValue::Unset));
    assert_eq!(session.record().text("presentationDate"), Some("2025-11-01"));
}

#[test]
fn invalid_answers_are_asked_again() {
    let mut session = blank_session();
    let input = "P\nAcme\nbrochure\nteaser\n:quit\n";
    let (_, output, _) = run(&mut session, input);

    assert!(output.contains("\"brochure\" is not one of the listed options"));
    assert_eq!(session.record().text("documentType"), Some("teaser"));
}

#[test]
fn long_text_reads_until_blank_line() {
    let mut session = complete_session();
    session.form.go_to_phase(1).expect("overview");
    // foundedYear, headquarters, description (two lines), then quit.
    let input = "abc\n1999\n\nFirst line\nSecond line\n\n:quit\n";
    let (_, output, _) = run(&mut session, input);

    assert!(output.contains("\"abc\" is not a number"));
    assert_eq!(session.record().number("foundedYear"), Some(1999.0));
    assert_eq!(
        session.record().text("companyDescription"),
        Some("First line\nSecond line")
    );
}

#[test]
fn multiple_choice_dedupes_and_maps_numbers() {
    let (_, buyer) = builtin().field("targetBuyerType").expect("field");
    assert_eq!(
        parse_choices(buyer, "1, financial, 1").expect("parse"),
        vec!["strategic".to_string(), "financial".to_string()]
    );
    assert!(parse_choices(buyer, "4").is_err());
    assert_eq!(parse_choices(buyer, " , ").expect("parse"), Vec::<String>::new());
}

#[test]
fn goto_lists_phases_and_jumps() {
    let mut session = complete_session();
    // Pass setup, list phases from overview, then jump to the last phase.
    let input = "\n\n\n\n\n:goto\n:goto 99\n:goto 9\n:quit\n";
    let (exit, output, _) = run(&mut session, input);

    assert_eq!(exit, WizardExit::Quit);
    assert!(output.contains("  [x] 1. Project Setup\n"));
    assert!(output.contains("  [ ] 2. Company Overview  <- current\n"));
    assert!(output.contains("  ! phase 99 out of range"));
    assert!(output.contains("== Phase 9/9: Growth Strategy"));
    assert_eq!(session.form.current_index(), 8);
    assert!(session.form.completed_phases().contains(&0));
}

#[test]
fn malformed_goto_is_asked_again() {
    let mut session = blank_session();
    let (_, output, _) = run(&mut session, ":goto two\n:goto 0\nP\n:quit\n");

    assert_eq!(output.matches("  ! usage: :goto or :goto N").count(), 2);
    assert_eq!(session.record().text("projectCodename"), Some("P"));
}
