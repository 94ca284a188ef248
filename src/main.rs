use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod drafts;
mod export;
mod form;
mod generate;
mod generation_log;
mod questionnaire;
mod record;
mod submit;
#[cfg(test)]
mod testing;
mod util;
mod validate;
mod wizard;
mod workspace;

use cli::{
    CheckArgs, Command, DiffArgs, DraftCommand, ExportArgs, InitArgs, RecordSource, RootArgs, SchemaArgs,
    SubmitArgs, UsageArgs, WizardArgs,
};
use config::WizardConfig;
use drafts::{DraftStore, FileDraftStore, MemoryDraftStore};
use form::Session;
use generation_log::{
    entry_cost, recent, render_usage_csv, summarize, GenerationLog, GenerationLogEntry,
    UsageSummary,
};
use record::{DataRecord, FieldValue};
use submit::{SubmitError, Submitter, UNPARSED_KEY};
use validate::{check_document, check_phase, ValidationReport};
use wizard::{Wizard, WizardExit};
use workspace::WorkspacePaths;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);
    let paths = WorkspacePaths::resolve(args.root)?;

    match args.command {
        Command::Init(args) => cmd_init(&paths, args),
        Command::Schema(args) => cmd_schema(&paths, args),
        Command::Check(args) => cmd_check(&paths, args).await,
        Command::Submit(args) => cmd_submit(&paths, args).await,
        Command::Wizard(args) => cmd_wizard(&paths, args).await,
        Command::Draft(command) => cmd_draft(&paths, command).await,
        Command::Export(args) => cmd_export(&paths, args).await,
        Command::Usage(args) => cmd_usage(&paths, args),
        Command::Diff(args) => cmd_diff(&paths, args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_init(paths: &WorkspacePaths, args: InitArgs) -> Result<ExitCode> {
    let path = paths.config_path();
    if path.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    config::write_config(paths, &WizardConfig::default())?;
    std::fs::create_dir_all(paths.drafts_dir())
        .with_context(|| format!("create {}", paths.drafts_dir().display()))?;
    println!("initialized workspace {}", paths.root().display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_schema(paths: &WorkspacePaths, args: SchemaArgs) -> Result<ExitCode> {
    let spec = config::load_config(paths)?.questionnaire()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(spec.as_ref())?);
        return Ok(ExitCode::SUCCESS);
    }
    for (index, phase) in spec.phases().iter().enumerate() {
        println!("{}. {} ({})", index + 1, phase.name, phase.id);
        for field in phase.fields() {
            let required = if field.required { " *" } else { "" };
            let conditional = if field.required_when.is_some() {
                " (conditional)"
            } else {
                ""
            };
            println!(
                "   {}{required}{conditional}  [{}] {}",
                field.id, field.kind, field.label
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn load_record(paths: &WorkspacePaths, source: &RecordSource) -> Result<DataRecord> {
    let record: DataRecord = match (&source.data, &source.draft) {
        (Some(path), _) => util::read_json(path)?,
        (None, Some(key)) => {
            let store = FileDraftStore::new(paths.drafts_dir());
            store
                .load(key)
                .await?
                .ok_or_else(|| anyhow!("no draft named {key:?}"))?
                .record
        }
        (None, None) => return Err(anyhow!("pass --data FILE or --draft KEY")),
    };
    if record.is_empty() {
        tracing::warn!("record has no answers");
    }
    Ok(record)
}

async fn cmd_check(paths: &WorkspacePaths, args: CheckArgs) -> Result<ExitCode> {
    let spec = config::load_config(paths)?.questionnaire()?;
    let record = load_record(paths, &args.source).await?;

    if let Some(number) = args.phase {
        let phase = number
            .checked_sub(1)
            .and_then(|index| spec.phase(index))
            .ok_or_else(|| {
                anyhow!(
                    "phase {number} out of range (1-{})",
                    spec.phases().len()
                )
            })?;
        let errors = check_phase(phase, &record);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&errors)?);
        } else if errors.is_empty() {
            println!("{}: ok", phase.name);
        } else {
            for (id, message) in &errors {
                let label = phase.field(id).map_or(id.as_str(), |f| f.label.as_str());
                println!("{}: {label}: {message}", phase.name);
            }
        }
        return Ok(exit_for(errors.is_empty()));
    }

    let report = check_document(&spec, &record);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(exit_for(report.is_clean()))
}

fn exit_for(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    if !report.errors.is_empty() {
        out.push_str("Errors:\n");
        for error in &report.errors {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                error.phase, error.field, error.message
            ));
        }
    }
    for (title, notes) in [
        ("Warnings", &report.warnings),
        ("Suggestions", &report.suggestions),
    ] {
        if notes.is_empty() {
            continue;
        }
        out.push_str(&format!("{title}:\n"));
        for note in notes {
            out.push_str(&format!("  [{}] {}\n", note.phase, note.message));
        }
    }
    if report.is_clean() && report.has_findings() {
        out.push_str("No blocking errors.\n");
    } else if report.is_clean() {
        out.push_str("No blocking errors or findings.\n");
    }
    out
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            token.cancel();
        }
    });
}

async fn cmd_submit(paths: &WorkspacePaths, args: SubmitArgs) -> Result<ExitCode> {
    let config = config::load_config(paths)?;
    let spec = config.questionnaire()?;
    let record = load_record(paths, &args.source).await?;
    let collaborators = config::build_collaborators(&config)?;
    let submitter = Submitter::new(collaborators.generator, collaborators.probe)
        .with_timeout(config.timeout())
        .with_log(GenerationLog::new(paths.generation_log_path()));
    let session = Session::resume(args.project, spec, record)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    match submitter.submit(&session, args.kind, &cancel).await {
        Ok(submission) => {
            for note in submission.warnings.iter().chain(&submission.suggestions) {
                eprintln!("note: [{}] {}", note.phase, note.message);
            }
            if !submission.structured {
                eprintln!(
                    "note: generator output was not a JSON object; raw text kept under {UNPARSED_KEY:?}"
                );
            }
            let json = serde_json::to_string_pretty(&submission)?;
            write_output(args.out.as_deref(), &json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::Invalid(report)) => {
            eprint!("{}", render_report(&report));
            eprintln!("submission blocked: fix the errors above and retry");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

async fn cmd_wizard(paths: &WorkspacePaths, args: WizardArgs) -> Result<ExitCode> {
    let spec = config::load_config(paths)?.questionnaire()?;
    let store: Arc<dyn DraftStore> = if args.ephemeral {
        Arc::new(MemoryDraftStore::new())
    } else {
        Arc::new(FileDraftStore::new(paths.drafts_dir()))
    };
    let project = args.project;
    let saved = match &args.data {
        Some(path) => Some(util::read_json(path)?),
        None => store.load(&project).await?.map(|draft| draft.record),
    };
    let session = match saved {
        Some(record) => Session::resume(project.clone(), spec, record)?,
        None => {
            tracing::info!(project = %project, "no saved draft; starting a blank form");
            Session::new(project.clone(), spec)?
        }
    };

    let handle = tokio::runtime::Handle::current();
    let sink_store = store.clone();
    let sink_key = project.clone();
    let (exit, session) = tokio::task::spawn_blocking(move || -> Result<(WizardExit, Session)> {
        let mut session = session;
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let exit = Wizard::new(stdin.lock(), stdout.lock(), |record: &DataRecord| {
            handle.block_on(sink_store.save(&sink_key, record))
        })
        .run(&mut session)?;
        Ok((exit, session))
    })
    .await
    .context("join wizard")??;

    if !args.ephemeral {
        store.save(&project, session.record()).await?;
        eprintln!("draft saved as {project}");
    }
    if exit == WizardExit::Finished {
        let report = check_document(session.form.spec(), session.record());
        print!("{}", render_report(&report));
        return Ok(exit_for(report.is_clean()));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_draft(paths: &WorkspacePaths, command: DraftCommand) -> Result<ExitCode> {
    let store = FileDraftStore::new(paths.drafts_dir());
    match command {
        DraftCommand::Save { project, data } => {
            let record: DataRecord = util::read_json(&data)?;
            let key = store.save(&project, &record).await?;
            println!("saved draft {key}");
        }
        DraftCommand::Load { project, out } => {
            let Some(draft) = store.load(&project).await? else {
                eprintln!("no draft named {project:?}");
                return Ok(ExitCode::FAILURE);
            };
            let json = serde_json::to_string_pretty(&draft.record)?;
            write_output(out.as_deref(), &json)?;
        }
        DraftCommand::List { json } => {
            let drafts = store.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&drafts)?);
            } else if drafts.is_empty() {
                println!("no drafts in {}", util::display_path(&paths.drafts_dir(), None));
            } else {
                for draft in drafts {
                    println!(
                        "{}\t{} fields\tsaved_at={}",
                        draft.key, draft.fields, draft.saved_at
                    );
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_export(paths: &WorkspacePaths, args: ExportArgs) -> Result<ExitCode> {
    let spec = config::load_config(paths)?.questionnaire()?;
    let record = load_record(paths, &args.source).await?;
    let markdown = export::render_qa_markdown(&spec, &record);
    write_output(args.out.as_deref(), &markdown)?;
    Ok(ExitCode::SUCCESS)
}

/// JSON shape of `imw usage --json`.
#[derive(serde::Serialize)]
struct UsageReport<'a> {
    #[serde(flatten)]
    summary: UsageSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recent: Vec<&'a GenerationLogEntry>,
}

fn cmd_usage(paths: &WorkspacePaths, args: UsageArgs) -> Result<ExitCode> {
    let log = GenerationLog::new(paths.generation_log_path());
    if args.reset {
        let discarded = log.reset()?;
        println!(
            "discarded {discarded} log entries from {}",
            util::display_path(log.path(), Some(paths.root()))
        );
        return Ok(ExitCode::SUCCESS);
    }
    let entries = log.load()?;
    if args.csv {
        write_output(args.out.as_deref(), &render_usage_csv(&entries))?;
        return Ok(ExitCode::SUCCESS);
    }
    let latest = recent(&entries, args.recent.unwrap_or(0));
    let summary = summarize(&entries);
    if args.json {
        let report = UsageReport {
            summary,
            recent: latest,
        };
        write_output(args.out.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        return Ok(ExitCode::SUCCESS);
    }
    let mut out = format!(
        "calls: {} ({} failed)\ntokens: {} in / {} out\nestimated cost: ${:.6} (avg ${:.6}/call)\n",
        summary.total.calls,
        summary.total.failed,
        summary.total.input_tokens,
        summary.total.output_tokens,
        summary.total.cost_usd,
        summary.average_cost_per_call
    );
    for (title, buckets) in [("by model", &summary.by_model), ("by kind", &summary.by_kind)] {
        if buckets.is_empty() {
            continue;
        }
        out.push_str(&format!("{title}:\n"));
        for (name, bucket) in buckets {
            out.push_str(&format!(
                "  {name}: {} calls, {} tokens, ${:.6}\n",
                bucket.calls,
                bucket.total_tokens(),
                bucket.cost_usd
            ));
        }
    }
    if !latest.is_empty() {
        out.push_str(&format!("recent calls ({}):\n", latest.len()));
        for entry in &latest {
            out.push_str(&format!(
                "  ts={} {} {} via {} {} {}ms ${:.6}\n",
                entry.ts,
                entry.kind,
                entry.project,
                entry.generator,
                entry.outcome.as_str(),
                entry.duration_ms,
                entry_cost(entry)
            ));
        }
    }
    write_output(args.out.as_deref(), &out)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_diff(paths: &WorkspacePaths, args: DiffArgs) -> Result<ExitCode> {
    let spec = config::load_config(paths)?.questionnaire()?;
    let old: DataRecord = util::read_json(&args.old)?;
    let new: DataRecord = util::read_json(&args.new)?;
    let changes = old.changed_fields(&new);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(ExitCode::SUCCESS);
    }
    if changes.is_empty() {
        println!("no changes");
        return Ok(ExitCode::SUCCESS);
    }
    let show = |value: &Option<FieldValue>| {
        value
            .as_ref()
            .map_or_else(|| "(unset)".to_string(), |v| v.display().replace('\n', " / "))
    };
    for change in &changes {
        let name = match spec.field(&change.field) {
            Some((_, field)) => format!("{} ({})", field.label, change.field),
            None => change.field.clone(),
        };
        let marker = match (&change.old, &change.new) {
            (None, _) => '+',
            (_, None) => '-',
            _ => '~',
        };
        println!("{marker} {name}: {} -> {}", show(&change.old), show(&change.new));
    }
    println!("{} field(s) changed", changes.len());
    Ok(ExitCode::SUCCESS)
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            let mut body = text.to_string();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{}", text.trim_end_matches('\n')),
    }
    Ok(())
}
