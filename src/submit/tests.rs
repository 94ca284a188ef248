use super::*;
use crate::generate::{GenerationOutput, RawOutput};
use crate::generation_log::GenerationOutcome;
use crate::questionnaire::builtin;
use crate::testing::complete_record;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

enum Reply {
    Output(RawOutput),
    Fail(&'static str),
    /// Wait for a gate permit before answering with the output.
    Gated(Arc<Semaphore>, RawOutput),
    Hang,
}

struct FakeGenerator {
    calls: AtomicUsize,
    reply: Reply,
}

impl FakeGenerator {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> String {
        "fake".to_string()
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Output(raw) => Ok(GenerationOutput {
                raw: raw.clone(),
                model: Some("claude-sonnet-4-5".to_string()),
                usage: Some(TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                }),
            }),
            Reply::Fail(message) => Err(anyhow!(*message)),
            Reply::Gated(gate, raw) => {
                let _permit = gate.acquire().await.map_err(|_| anyhow!("gate closed"))?;
                Ok(GenerationOutput {
                    raw: raw.clone(),
                    model: None,
                    usage: None,
                })
            }
            Reply::Hang => std::future::pending().await,
        }
    }
}

struct FakeProbe {
    calls: AtomicUsize,
    healthy: bool,
}

impl FakeProbe {
    fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            healthy,
        })
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(anyhow!("connection refused"))
        }
    }
}

fn session() -> Session {
    Session::resume("phoenix", Arc::new(builtin().clone()), complete_record()).expect("session")
}

fn in_flight(submitter: &Submitter, kind: SubmissionKind) -> bool {
    submitter
        .in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&kind)
}

fn text(raw: &str) -> Reply {
    Reply::Output(RawOutput::Text(raw.to_string()))
}

#[tokio::test]
async fn invalid_record_never_reaches_collaborators() {
    let generator = FakeGenerator::new(text("{}"));
    let probe = FakeProbe::new(true);
    let submitter = Submitter::new(generator.clone(), probe.clone());
    let mut session = session();
    session.form.set_field("companyName", "");
    session.form.set_field("founderName", "  ");

    let err = submitter
        .submit(&session, SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect_err("blocked");

    let report = match err {
        SubmitError::Invalid(report) => report,
        other => panic!("expected validation failure, got {other:?}"),
    };
    assert_eq!(report.errors.len(), 2);
    assert_eq!(generator.calls(), 0);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert!(!in_flight(&submitter, SubmissionKind::Content));
}

#[tokio::test]
async fn unhealthy_probe_refuses_locally() {
    let generator = FakeGenerator::new(text("{}"));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(false));

    let err = submitter
        .submit(&session(), SubmissionKind::Deck, &CancellationToken::new())
        .await
        .expect_err("unavailable");

    assert!(matches!(err, SubmitError::Unavailable(ref msg) if msg.contains("connection refused")));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn fenced_json_is_returned_structured() {
    let generator = FakeGenerator::new(text(
        "```json\n{\"executive_summary\": \"Acme builds lakehouses.\"}\n```",
    ));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(true));

    let submission = submitter
        .submit(&session(), SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect("submit");

    assert!(submission.structured);
    assert_eq!(
        submission.content,
        json!({"executive_summary": "Acme builds lakehouses."})
    );
    assert_eq!(submission.project, "phoenix");
    assert_eq!(submission.model.as_deref(), Some("claude-sonnet-4-5"));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn plain_text_is_wrapped_unparsed() {
    let raw = "Acme is a data engineering firm.";
    let submitter = Submitter::new(FakeGenerator::new(text(raw)), FakeProbe::new(true));

    let submission = submitter
        .submit(&session(), SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect("submit");

    assert!(!submission.structured);
    assert_eq!(submission.content, json!({"unparsed": raw}));
}

#[tokio::test]
async fn warnings_pass_through_without_blocking() {
    let submitter = Submitter::new(FakeGenerator::new(text("{}")), FakeProbe::new(true));
    let mut session = session();
    session.form.set_field("revenueFY26P", 250.0);

    let submission = submitter
        .submit(&session, SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect("warnings do not block");

    assert_eq!(submission.warnings.len(), 1);
    assert!(submission.warnings[0].message.contains("150%"));
}

#[tokio::test]
async fn generator_failure_leaves_record_untouched() {
    let submitter = Submitter::new(FakeGenerator::new(Reply::Fail("HTTP 529 overloaded")), FakeProbe::new(true));
    let session = session();
    let before = session.record().clone();

    let err = submitter
        .submit(&session, SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect_err("failure");

    assert!(matches!(err, SubmitError::Generation(_)));
    assert!(err.to_string().contains("HTTP 529 overloaded"));
    assert_eq!(session.record(), &before);
    assert!(!in_flight(&submitter, SubmissionKind::Content));
}

#[tokio::test]
async fn same_kind_is_rejected_while_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let generator = FakeGenerator::new(Reply::Gated(gate.clone(), RawOutput::Text("{}".into())));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(true));
    let session = session();
    let token = CancellationToken::new();

    let (first, second) = tokio::join!(
        submitter.submit(&session, SubmissionKind::Content, &token),
        async {
            let result = submitter
                .submit(&session, SubmissionKind::Content, &token)
                .await;
            gate.add_permits(1);
            result
        }
    );

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(SubmitError::InFlight(SubmissionKind::Content))
    ));
    assert_eq!(generator.calls(), 1);
    assert!(!in_flight(&submitter, SubmissionKind::Content));
}

#[tokio::test]
async fn other_kind_may_run_concurrently() {
    let gate = Arc::new(Semaphore::new(0));
    let generator = FakeGenerator::new(Reply::Gated(gate.clone(), RawOutput::Text("{}".into())));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(true));
    let session = session();
    let token = CancellationToken::new();

    let (content, deck, ()) = tokio::join!(
        submitter.submit(&session, SubmissionKind::Content, &token),
        submitter.submit(&session, SubmissionKind::Deck, &token),
        async {
            tokio::task::yield_now().await;
            assert!(in_flight(&submitter, SubmissionKind::Content));
            assert!(in_flight(&submitter, SubmissionKind::Deck));
            gate.add_permits(2);
        }
    );

    assert!(content.is_ok());
    assert!(deck.is_ok());
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn cancellation_aborts_a_pending_call() {
    let generator = FakeGenerator::new(Reply::Hang);
    let dir = tempfile::tempdir().expect("tempdir");
    let log = GenerationLog::new(dir.path().join("generation_log.jsonl"));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(true)).with_log(log.clone());
    let session = session();
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(
        submitter.submit(&session, SubmissionKind::Deck, &token),
        async {
            tokio::task::yield_now().await;
            token.cancel();
        }
    );

    assert!(matches!(result, Err(SubmitError::Cancelled)));
    assert_eq!(generator.calls(), 1);
    assert!(!in_flight(&submitter, SubmissionKind::Deck));
    let entries = log.load().expect("load log");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, GenerationOutcome::Cancelled);
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let generator = FakeGenerator::new(text("{}"));
    let submitter = Submitter::new(generator.clone(), FakeProbe::new(true));
    let token = CancellationToken::new();
    token.cancel();

    let err = submitter
        .submit(&session(), SubmissionKind::Content, &token)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, SubmitError::Cancelled));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn timeout_yields_timed_out() {
    let submitter = Submitter::new(FakeGenerator::new(Reply::Hang), FakeProbe::new(true))
        .with_timeout(Some(Duration::from_millis(20)));

    let err = submitter
        .submit(&session(), SubmissionKind::Content, &CancellationToken::new())
        .await
        .expect_err("timeout");
    assert!(matches!(err, SubmitError::TimedOut(limit) if limit == Duration::from_millis(20)));
}

#[tokio::test]
async fn successful_calls_are_logged_with_usage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = GenerationLog::new(dir.path().join("generation_log.jsonl"));
    let submitter =
        Submitter::new(FakeGenerator::new(text("{\"slides\": []}")), FakeProbe::new(true))
            .with_log(log.clone());

    submitter
        .submit(&session(), SubmissionKind::Deck, &CancellationToken::new())
        .await
        .expect("submit");

    let entries = log.load().expect("load");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, SubmissionKind::Deck);
    assert_eq!(entries[0].outcome, GenerationOutcome::Structured);
    assert_eq!(entries[0].input_tokens, 100);
    assert_eq!(entries[0].project, "phoenix");
}
