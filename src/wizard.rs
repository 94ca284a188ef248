//! Terminal front end that walks a session through its phases.
//!
//! Every field of a phase is prompted once; when the phase check fails only
//! the failing fields are prompted again. An empty answer keeps the current
//! value. Commands typed at any prompt:
//!
//! - `:back` returns to the previous phase
//! - `:goto` lists the phases; `:goto N` jumps to phase N
//! - `:save` saves a draft and re-asks the same field
//! - `:clear` unsets the field
//! - `:quit` stops (so does end of input)
use crate::form::{Advance, Session};
use crate::questionnaire::{FieldKind, FieldSpec};
use crate::record::{DataRecord, FieldValue};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardExit {
    /// The last phase passed its check.
    Finished,
    Quit,
}

enum Answer {
    Keep,
    Set(FieldValue),
    Clear,
    Back,
    GoTo(usize),
    ListPhases,
    Save,
    Quit,
}

enum FieldOutcome {
    Next,
    Back,
    Jumped,
    Quit,
}

pub struct Wizard<'a, R, W> {
    input: R,
    output: W,
    save_draft: Box<dyn FnMut(&DataRecord) -> Result<String> + 'a>,
}

impl<'a, R: BufRead, W: Write> Wizard<'a, R, W> {
    pub fn new(
        input: R,
        output: W,
        save_draft: impl FnMut(&DataRecord) -> Result<String> + 'a,
    ) -> Self {
        Self {
            input,
            output,
            save_draft: Box::new(save_draft),
        }
    }

    pub fn run(&mut self, session: &mut Session) -> Result<WizardExit> {
        let mut retry: Option<Vec<String>> = None;
        loop {
            let index = session.form.current_index();
            let phase = session.form.current_phase().clone();
            let (done, total) = session.form.progress();
            if retry.is_none() {
                writeln!(
                    self.output,
                    "\n== Phase {}/{}: {} ({} of {} complete) ==",
                    index + 1,
                    total,
                    phase.name,
                    done,
                    total
                )?;
            }

            let mut moved = false;
            for field in phase.fields() {
                if let Some(ids) = &retry {
                    if !ids.contains(&field.id) {
                        continue;
                    }
                }
                match self.ask_field(session, field)? {
                    FieldOutcome::Next => {}
                    FieldOutcome::Back => {
                        session.form.previous_phase();
                        moved = true;
                        break;
                    }
                    FieldOutcome::Jumped => {
                        moved = true;
                        break;
                    }
                    FieldOutcome::Quit => return Ok(WizardExit::Quit),
                }
            }
            if moved {
                retry = None;
                continue;
            }

            match session.form.advance_phase() {
                Advance::Blocked(errors) => {
                    writeln!(self.output, "\nPlease fix the following:")?;
                    for (id, message) in &errors {
                        let label = phase.field(id).map_or(id.as_str(), |f| f.label.as_str());
                        writeln!(self.output, "  - {label}: {message}")?;
                    }
                    retry = Some(errors.into_keys().collect());
                }
                Advance::Moved { from, to } if from == to => {
                    writeln!(self.output, "\nAll phases complete.")?;
                    return Ok(WizardExit::Finished);
                }
                Advance::Moved { .. } => retry = None,
            }
        }
    }

    fn ask_field(&mut self, session: &mut Session, field: &FieldSpec) -> Result<FieldOutcome> {
        loop {
            self.print_prompt(session, field)?;
            match self.read_answer(field)? {
                Answer::Keep => return Ok(FieldOutcome::Next),
                Answer::Set(value) => {
                    session.form.set_field(&field.id, value);
                    return Ok(FieldOutcome::Next);
                }
                Answer::Clear => {
                    session.form.set_field(&field.id, FieldValue::Unset);
                    return Ok(FieldOutcome::Next);
                }
                Answer::Back => return Ok(FieldOutcome::Back),
                Answer::GoTo(index) => match session.form.go_to_phase(index) {
                    Ok(()) => return Ok(FieldOutcome::Jumped),
                    Err(err) => writeln!(self.output, "  ! {err:#}")?,
                },
                Answer::ListPhases => self.print_phases(session)?,
                Answer::Quit => return Ok(FieldOutcome::Quit),
                Answer::Save => match (self.save_draft)(session.record()) {
                    Ok(key) => writeln!(self.output, "Draft saved as {key}.")?,
                    Err(err) => writeln!(self.output, "Could not save draft: {err:#}")?,
                },
            }
        }
    }

    fn print_phases(&mut self, session: &Session) -> Result<()> {
        let completed = session.form.completed_phases();
        for (index, phase) in session.form.spec().phases().iter().enumerate() {
            let mark = if completed.contains(&index) { "x" } else { " " };
            let here = if index == session.form.current_index() {
                "  <- current"
            } else {
                ""
            };
            writeln!(self.output, "  [{mark}] {}. {}{here}", index + 1, phase.name)?;
        }
        Ok(())
    }

    fn print_prompt(&mut self, session: &Session, field: &FieldSpec) -> Result<()> {
        let marker = if field.is_required_for(session.record()) {
            " *"
        } else {
            ""
        };
        write!(self.output, "\n{}{marker}", field.label)?;
        if let Some(current) = session.record().get(&field.id).filter(|v| !v.is_empty()) {
            write!(self.output, " [{}]", current.display().replace('\n', " / "))?;
        }
        writeln!(self.output)?;
        if let Some(error) = session.form.error(&field.id) {
            writeln!(self.output, "  ! {error}")?;
        }
        if let Some(help) = &field.help {
            writeln!(self.output, "  {help}")?;
        }
        for (number, option) in field.options.iter().enumerate() {
            writeln!(self.output, "  {}) {} ({})", number + 1, option.label, option.value)?;
        }
        match field.kind {
            FieldKind::LongText => writeln!(self.output, "  (finish with an empty line)")?,
            FieldKind::MultipleChoice => {
                writeln!(self.output, "  (comma-separated values or numbers)")?
            }
            _ => {}
        }
        write!(self.output, "> ")?;
        self.output.flush().context("flush prompt")?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_answer(&mut self, field: &FieldSpec) -> Result<Answer> {
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(Answer::Quit);
            };
            match line.trim() {
                ":back" => return Ok(Answer::Back),
                ":save" => return Ok(Answer::Save),
                ":quit" => return Ok(Answer::Quit),
                ":clear" => return Ok(Answer::Clear),
                "" => return Ok(Answer::Keep),
                _ => {}
            }
            if let Some(target) = line.trim().strip_prefix(":goto") {
                match parse_goto(target) {
                    Some(answer) => return Ok(answer),
                    None => {
                        writeln!(self.output, "  ! usage: :goto or :goto N")?;
                        write!(self.output, "> ")?;
                        self.output.flush().context("flush prompt")?;
                        continue;
                    }
                }
            }
            let parsed = match field.kind {
                FieldKind::LongText => Ok(FieldValue::Text(self.read_long_text(line)?)),
                FieldKind::ShortText | FieldKind::Date => Ok(FieldValue::Text(line.trim().to_string())),
                FieldKind::Number => parse_number(&line),
                FieldKind::SingleChoice => parse_choice(field, line.trim()).map(FieldValue::Text),
                FieldKind::MultipleChoice => parse_choices(field, &line).map(FieldValue::List),
            };
            match parsed {
                Ok(value) => return Ok(Answer::Set(value)),
                Err(message) => {
                    writeln!(self.output, "  ! {message}")?;
                    write!(self.output, "> ")?;
                    self.output.flush().context("flush prompt")?;
                }
            }
        }
    }

    fn read_long_text(&mut self, first: String) -> Result<String> {
        let mut lines = vec![first];
        while let Some(line) = self.read_line()? {
            if line.trim().is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}

/// `:goto` alone lists phases; `:goto N` targets 1-based phase N.
fn parse_goto(target: &str) -> Option<Answer> {
    let target = target.trim();
    if target.is_empty() {
        return Some(Answer::ListPhases);
    }
    let number = target.parse::<usize>().ok()?;
    number.checked_sub(1).map(Answer::GoTo)
}

fn parse_number(raw: &str) -> std::result::Result<FieldValue, String> {
    FieldValue::Text(raw.to_string())
        .as_number()
        .map(FieldValue::Number)
        .ok_or_else(|| format!("{:?} is not a number", raw.trim()))
}

fn parse_choice(field: &FieldSpec, raw: &str) -> std::result::Result<String, String> {
    if let Ok(number) = raw.parse::<usize>() {
        if let Some(option) = number.checked_sub(1).and_then(|i| field.options.get(i)) {
            return Ok(option.value.clone());
        }
    }
    field
        .options
        .iter()
        .find(|option| {
            option.value.eq_ignore_ascii_case(raw) || option.label.eq_ignore_ascii_case(raw)
        })
        .map(|option| option.value.clone())
        .ok_or_else(|| format!("{raw:?} is not one of the listed options"))
}

fn parse_choices(field: &FieldSpec, raw: &str) -> std::result::Result<Vec<String>, String> {
    let mut values = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let value = parse_choice(field, token)?;
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values)
}

#[cfg(test)]
#[path = "wizard_tests.rs"]
mod tests;
