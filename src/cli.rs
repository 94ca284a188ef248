//! CLI argument parsing.
use crate::generate::SubmissionKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default project key for commands that save drafts.
pub const DEFAULT_PROJECT: &str = "default";

#[derive(Parser, Debug)]
#[command(
    name = "imw",
    version,
    about = "Questionnaire wizard for information memorandum content",
    after_help = "Examples:\n  imw init\n  imw wizard --project phoenix\n  imw check --data answers.json\n  imw submit --data answers.json --kind deck --out deck.json\n  imw draft list\n  imw export --data answers.json --out qa.md\n  imw usage --csv --out usage.csv\n  imw diff --old before.json --new after.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Workspace holding config.json, drafts/ and generation_log.jsonl
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Raise the default log level to debug
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config.json into the workspace
    Init(InitArgs),
    /// Print the questionnaire
    Schema(SchemaArgs),
    /// Validate a record without submitting it
    Check(CheckArgs),
    /// Validate a record and send it to the generator
    Submit(SubmitArgs),
    /// Fill in the questionnaire interactively
    Wizard(WizardArgs),
    /// Save, load, and list drafts
    #[command(subcommand)]
    Draft(DraftCommand),
    /// Render answers as a Markdown Q&A document
    Export(ExportArgs),
    /// Summarize generation calls and estimated cost
    Usage(UsageArgs),
    /// List fields whose answers differ between two records
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.json
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Where a command reads its record from.
#[derive(Args, Debug)]
pub struct RecordSource {
    /// Record JSON file (field id -> value)
    #[arg(long, value_name = "FILE", conflicts_with = "draft")]
    pub data: Option<PathBuf>,

    /// Read the record from a saved draft instead
    #[arg(long, value_name = "KEY")]
    pub draft: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: RecordSource,

    /// Check a single phase (1-based) instead of the whole document
    #[arg(long, value_name = "N")]
    pub phase: Option<usize>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub source: RecordSource,

    /// What to generate
    #[arg(long, value_name = "KIND")]
    pub kind: SubmissionKind,

    /// Project key recorded in the generation log
    #[arg(long, value_name = "KEY", default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// Write the submission JSON here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WizardArgs {
    /// Draft key to resume from and save to
    #[arg(long, value_name = "KEY", default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// Start from this record instead of the saved draft
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Keep drafts in memory for this run only
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// Save a record file as a draft
    Save {
        #[arg(long, value_name = "KEY")]
        project: String,
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
    },
    /// Print or write a saved draft's record
    Load {
        #[arg(long, value_name = "KEY")]
        project: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List saved drafts
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: RecordSource,

    /// Write Markdown here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Emit machine-readable JSON output
    #[arg(long, conflicts_with = "csv")]
    pub json: bool,

    /// Export the summary and recent calls as CSV
    #[arg(long)]
    pub csv: bool,

    /// Also list the N most recent calls
    #[arg(long, value_name = "N")]
    pub recent: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Truncate the generation log
    #[arg(long, conflicts_with_all = ["json", "csv", "recent", "out"])]
    pub reset: bool,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Earlier record JSON file
    #[arg(long, value_name = "FILE")]
    pub old: PathBuf,

    /// Later record JSON file
    #[arg(long, value_name = "FILE")]
    pub new: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
