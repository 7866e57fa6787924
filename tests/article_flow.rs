mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use regex::Regex;

use common::{click_at, eventually, harness, ScriptedBackend};
use docuflow::article::{ArticleAuthor, DescriptionSource};
use docuflow::enrichment::prompts::{ARTICLE_SYSTEM_PROMPT, STEP_SYSTEM_PROMPT};
use docuflow::enrichment::{ApiShape, Availability, InferenceCapabilities, InferenceChain};
use docuflow::models::IssueType;
use docuflow::service::{Request, Response};
use docuflow::settings::SettingsStore;
use docuflow::Recorder;

const PLAN: &str = r#"Here is the draft:
```json
{
  "title": "Invite a teammate",
  "introduction": "Add a colleague to your workspace.",
  "steps": [
    {"stepNumber": 1, "description": "Open the Members page.", "status": "keep"},
    {"stepNumber": 2, "description": "Press Invite.", "status": "Review"},
    {"stepNumber": 7, "description": "Out of range.", "status": "keep"}
  ],
  "issues": [
    {"type": "missing_context", "message": "The confirmation email is never shown.", "steps": [2]},
    "Screenshots look cropped"
  ]
}
```"#;

fn author_backend(describe: Arc<AtomicBool>) -> ScriptedBackend {
    ScriptedBackend::new(ApiShape::Primary, Availability::Available, move |options, prompt| {
        if options.system_prompt == STEP_SYSTEM_PROMPT {
            describe
                .load(Ordering::SeqCst)
                .then(|| "Click the Invite button.".to_string())
        } else if options.system_prompt == ARTICLE_SYSTEM_PROMPT {
            Some(PLAN.to_string())
        } else {
            let body = prompt.split_once("\n\n").map(|(_, md)| md).unwrap_or(prompt);
            let quoted = Regex::new(r"\]\((IMAGE_PLACEHOLDER_[^)]+)\)")
                .unwrap()
                .replace_all(body, "](\"$1\")")
                .into_owned();
            Some(
                quoted
                    .replace("# Guide", "# Guía")
                    .replace("Click save.", "Haz clic en guardar."),
            )
        }
    })
}

async fn record_two_steps(recorder: &Recorder) {
    let reply = recorder
        .request(Request::StartRecording { context: Some("Team admin guide".into()) })
        .await;
    assert!(reply.is_ok(), "{reply:?}");
    for _ in 0..2 {
        let reply = recorder
            .request(Request::CaptureStep { meta: click_at(12.0, 9.0, "#invite"), origin: None })
            .await;
        assert!(matches!(reply, Response::Captured { .. }), "{reply:?}");
    }
}

#[tokio::test]
async fn background_service_fills_missing_descriptions() {
    let describe = Arc::new(AtomicBool::new(false));
    let backend = Arc::new(author_backend(describe.clone()));
    let h = harness(InferenceCapabilities::none().with_primary(backend.clone()));
    record_two_steps(&h.recorder).await;
    let attempted = eventually(|| {
        let backend = backend.clone();
        async move { backend.prompts.lock().unwrap().len() >= 2 }
    })
    .await;
    assert!(attempted);

    describe.store(true, Ordering::SeqCst);
    let summary = h.recorder.author().ensure_step_descriptions().await.unwrap();
    assert_eq!(summary.source, DescriptionSource::Background);
    assert_eq!((summary.described, summary.pending), (2, 2));

    let again = h.recorder.author().ensure_step_descriptions().await.unwrap();
    assert_eq!(again.source, DescriptionSource::Nothing);
}

#[tokio::test]
async fn author_describes_locally_when_the_service_cannot() {
    let h = harness(InferenceCapabilities::none());
    record_two_steps(&h.recorder).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
    let backend = Arc::new(author_backend(Arc::new(AtomicBool::new(true))));
    let chain = Arc::new(InferenceChain::new(
        InferenceCapabilities::none().with_primary(backend),
        settings.clone(),
    ));
    let author = ArticleAuthor::new(
        h.recorder.service().clone(),
        h.recorder.storage().clone(),
        chain,
        settings,
    );

    let summary = author.ensure_step_descriptions().await.unwrap();
    assert_eq!(summary.source, DescriptionSource::Local);
    assert_eq!(summary.described, 2);
    assert_eq!(summary.status, None);

    let state = h.recorder.storage().load_state().await.unwrap();
    assert!(state.current().unwrap().steps.iter().all(|step| step.has_description()));
}

#[tokio::test]
async fn enhancer_applies_the_plan_and_regenerates_markdown() {
    let backend = Arc::new(author_backend(Arc::new(AtomicBool::new(true))));
    let h = harness(InferenceCapabilities::none().with_primary(backend));
    record_two_steps(&h.recorder).await;
    let storage = h.recorder.storage().clone();
    let enriched = eventually(|| {
        let storage = storage.clone();
        async move {
            let state = storage.load_state().await.unwrap();
            state.current().unwrap().steps.iter().all(|step| step.has_description())
        }
    })
    .await;
    assert!(enriched);

    let summary = h.recorder.author().run_article_enhancer().await.unwrap();
    assert!(summary.message.starts_with("Article draft ready: “Invite a teammate”"));
    assert!(summary
        .issues
        .iter()
        .any(|issue| issue == "Steps 1 and 2 appear to repeat the same action (click)."));
    assert!(summary.issues.iter().any(|issue| issue == "Screenshots look cropped"));

    let state = h.recorder.storage().load_state().await.unwrap();
    let session = state.current().unwrap();
    assert_eq!(session.article_introduction.as_deref(), Some("Add a colleague to your workspace."));
    assert_eq!(session.steps[1].ai_description.as_deref(), Some("Press Invite."));
    assert_eq!(session.steps[1].ai_status.as_deref(), Some("review"));
    let issues = session.article_issues.as_ref().unwrap();
    assert!(issues.iter().any(|issue| issue.kind == IssueType::MissingContext && issue.steps == vec![2]));

    let markdown = summary.markdown.unwrap();
    assert!(markdown.starts_with("# Invite a teammate\n"));
    assert!(markdown.contains("## Quality Review\n"));
    assert!(markdown.contains("## Step 2: Settings\nPress Invite.\n> Status: review"));
    assert!(markdown.contains("![Step 1](data:image/"));
}

#[tokio::test]
async fn enhancer_reports_missing_steps_and_missing_models() {
    let h = harness(InferenceCapabilities::none());
    let err = h.recorder.author().run_article_enhancer().await.unwrap_err();
    assert_eq!(err.to_string(), "Capture steps before using AI.");

    record_two_steps(&h.recorder).await;
    let err = h.recorder.author().run_article_enhancer().await.unwrap_err();
    assert!(err.to_string().starts_with("On-device AI is unavailable"));
}

#[tokio::test]
async fn context_is_persisted_only_when_it_changes() {
    let h = harness(InferenceCapabilities::none());
    assert!(!h.recorder.author().persist_context("anything").await.unwrap());

    record_two_steps(&h.recorder).await;
    assert!(!h.recorder.author().persist_context("Team admin guide").await.unwrap());
    assert!(h.recorder.author().persist_context("For workspace owners").await.unwrap());

    let state = h.recorder.storage().load_state().await.unwrap();
    assert_eq!(state.current().unwrap().article_context, "For workspace owners");
}

#[tokio::test]
async fn translation_keeps_images_out_of_the_prompt() {
    let backend = Arc::new(author_backend(Arc::new(AtomicBool::new(true))));
    let h = harness(InferenceCapabilities::none().with_primary(backend.clone()));
    let markdown = "# Guide\n\n![Step 1](data:image/png;base64,AAAA)\n\nClick save.";

    let reply = h
        .recorder
        .request(Request::TranslateMarkdown {
            markdown: markdown.into(),
            target_language: "es".into(),
            language_name: Some("Spanish".into()),
        })
        .await;
    assert_eq!(
        reply,
        Response::Translated {
            translated: "# Guía\n\n![Step 1](data:image/png;base64,AAAA)\n\nHaz clic en guardar.".into()
        }
    );
    let prompts = backend.prompts.lock().unwrap();
    assert!(prompts.iter().all(|prompt| !prompt.contains("base64")));
    assert!(prompts.iter().any(|prompt| prompt.contains("Spanish")));
}

#[tokio::test]
async fn translation_failures_are_readable() {
    let h = harness(InferenceCapabilities::none());

    let empty = h
        .recorder
        .request(Request::TranslateMarkdown {
            markdown: "   ".into(),
            target_language: "fr".into(),
            language_name: None,
        })
        .await;
    assert_eq!(empty, Response::failed("no content to translate"));

    let unavailable = h
        .recorder
        .request(Request::TranslateMarkdown {
            markdown: "# Guide".into(),
            target_language: "fr".into(),
            language_name: None,
        })
        .await;
    let Response::Failed { error } = unavailable else {
        panic!("translation without a model succeeded");
    };
    assert!(error.contains("On-device AI is unavailable"));
    assert!(error.contains("translation"));
}
