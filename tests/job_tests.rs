//! End-to-end tests for the code-agent job
//!
//! The job runs against scripted models, an in-memory sandbox provider and
//! the in-memory message store and journal.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use codeagent::job::{submit, ERROR_MESSAGE};
use codeagent::llm::ChatModel;
use codeagent::sandbox::SandboxId;
use codeagent::step::MemoryJournal;
use codeagent::store::{
    MemoryMessageStore, Message, MessageRole, MessageStore, MessageType, NewMessage, StoreError,
};
use codeagent::{CodeAgentJob, JobConfig, JobError, JobTrigger};

use common::{summary_reply, tool_reply, FakeSandboxProvider, GeneratorModel, ScriptedModel};

struct Harness {
    sandboxes: Arc<FakeSandboxProvider>,
    store: Arc<MemoryMessageStore>,
    journal: Arc<MemoryJournal>,
}

impl Harness {
    fn new() -> Self {
        Self::with_sandboxes(FakeSandboxProvider::new())
    }

    fn with_sandboxes(sandboxes: Arc<FakeSandboxProvider>) -> Self {
        Self {
            sandboxes,
            store: Arc::new(MemoryMessageStore::new()),
            journal: Arc::new(MemoryJournal::new()),
        }
    }

    fn job(&self, coder: Arc<dyn ChatModel>, generator: Arc<dyn ChatModel>) -> CodeAgentJob {
        CodeAgentJob::new(
            JobConfig::default(),
            self.sandboxes.clone(),
            self.store.clone(),
            self.journal.clone(),
            coder,
        )
        .with_generator_client(generator)
    }
}

fn footer_script() -> Vec<codeagent::llm::ChatResponse> {
    vec![
        tool_reply(
            "createOrUpdateFiles",
            json!({"files": [{"path": "app/footer.tsx", "content": "export const Footer = () => <footer />;"}]}),
        ),
        codeagent::llm::ChatResponse::text("The footer component is in place."),
        tool_reply("terminal", json!({"command": "npm install clsx --yes"})),
        summary_reply("Added a footer component to the landing page."),
    ]
}

#[tokio::test]
async fn test_footer_request_end_to_end() {
    let harness = Harness::new();
    let coder = ScriptedModel::new(footer_script());
    let generator = GeneratorModel::new("Footer Component", "I added a footer to your page.");
    let job = harness.job(coder.clone(), generator.clone());

    let trigger = submit(harness.store.as_ref(), "proj-1", "Add a footer").await.unwrap();
    let output = job.run(&trigger, "run-1").await.unwrap();

    // first turn writes the file, second turn runs a command and finishes
    assert_eq!(coder.calls(), 4);
    assert_eq!(output.title, "Fragment");
    assert_eq!(output.summary, "Added a footer component to the landing page.");
    assert!(output.files.contains_key("app/footer.tsx"));
    assert_eq!(output.url, "https://3000-fake-0.sandbox.test");

    let sandbox = harness.sandboxes.sandbox(&SandboxId("fake-0".to_string())).unwrap();
    assert!(sandbox.files().contains_key("app/footer.tsx"));
    assert_eq!(sandbox.commands(), vec!["npm install clsx --yes".to_string()]);

    let messages = harness.store.messages("proj-1").await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    let result = &messages[1];
    assert_eq!(result.role, MessageRole::Assistant);
    assert_eq!(result.message_type, MessageType::Result);
    assert_eq!(result.content, "I added a footer to your page.");
    let fragment = result.fragment.as_ref().unwrap();
    assert_eq!(fragment.title, "Footer Component");
    assert_eq!(fragment.sandbox_url, output.url);
    assert_eq!(fragment.files, output.files);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_history_is_replayed_before_the_request() {
    let harness = Harness::new();
    let coder = ScriptedModel::new(vec![summary_reply("Nothing to change.")]);
    let job = harness.job(coder.clone(), GeneratorModel::new("Title", "Done"));

    submit(harness.store.as_ref(), "proj-1", "Build a landing page").await.unwrap();
    let trigger = submit(harness.store.as_ref(), "proj-1", "Now add a footer").await.unwrap();
    job.run(&trigger, "run-1").await.unwrap();

    let request = &coder.requests()[0];
    let contents: Vec<&str> = request.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(request[0].role, "system");
    assert_eq!(
        &contents[1..],
        &["Build a landing page", "Now add a footer", "Now add a footer"]
    );
}

#[tokio::test]
async fn test_iteration_cap_saves_error_then_result() {
    let harness = Harness::new();
    let coder = ScriptedModel::new(vec![tool_reply(
        "createOrUpdateFiles",
        json!({"files": [{"path": "app/page.tsx", "content": "draft"}]}),
    )]);
    let job = harness.job(coder.clone(), GeneratorModel::new("", ""));

    let trigger = JobTrigger {
        project_id: "proj-2".to_string(),
        value: "Build a dashboard".to_string(),
    };
    let output = job.run(&trigger, "run-2").await.unwrap();

    // five turns, the first of which needed two model calls
    assert_eq!(coder.calls(), 6);
    assert!(output.summary.is_empty());
    assert!(output.files.contains_key("app/page.tsx"));

    let messages = harness.store.messages("proj-2").await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message_type, MessageType::Error);
    assert_eq!(messages[0].content, ERROR_MESSAGE);
    assert_eq!(messages[1].message_type, MessageType::Result);
    // empty generator output falls back to fixed copy
    let fragment = messages[1].fragment.as_ref().unwrap();
    assert_eq!(fragment.title, "Fragment");
    assert!(!messages[1].content.is_empty());
}

#[tokio::test]
async fn test_summary_without_files_is_an_error() {
    let harness = Harness::new();
    let coder = ScriptedModel::new(vec![
        summary_reply("Explained the approach."),
        tool_reply("terminal", json!({"command": "rm -rf app"})),
    ]);
    let job = harness.job(coder.clone(), GeneratorModel::new("Plan", "Here is the plan."));

    let trigger = JobTrigger {
        project_id: "proj-3".to_string(),
        value: "Explain".to_string(),
    };
    let output = job.run(&trigger, "run-3").await.unwrap();

    // nothing runs after the marker
    assert_eq!(coder.calls(), 1);
    let sandbox = harness.sandboxes.sandbox(&SandboxId("fake-0".to_string())).unwrap();
    assert!(sandbox.commands().is_empty());

    assert_eq!(output.summary, "Explained the approach.");
    assert!(output.files.is_empty());
    let types: Vec<MessageType> = harness
        .store
        .messages("proj-3")
        .await
        .iter()
        .map(|m| m.message_type)
        .collect();
    assert_eq!(types, vec![MessageType::Error, MessageType::Result]);
}

#[tokio::test]
async fn test_failed_write_commits_nothing() {
    let harness = Harness::with_sandboxes(FakeSandboxProvider::failing_writes_to("app/broken.tsx"));
    let coder = ScriptedModel::new(vec![
        tool_reply(
            "createOrUpdateFiles",
            json!({"files": [
                {"path": "app/ok.tsx", "content": "ok"},
                {"path": "app/broken.tsx", "content": "broken"}
            ]}),
        ),
        tool_reply(
            "createOrUpdateFiles",
            json!({"files": [{"path": "app/page.tsx", "content": "page"}]}),
        ),
        summary_reply("Built the page."),
    ]);
    let job = harness.job(coder.clone(), GeneratorModel::new("Page", "Built it."));

    let trigger = JobTrigger {
        project_id: "proj-4".to_string(),
        value: "Build a page".to_string(),
    };
    let output = job.run(&trigger, "run-4").await.unwrap();

    assert_eq!(output.files.keys().collect::<Vec<_>>(), vec!["app/page.tsx"]);

    let tool_message = coder.requests()[1]
        .iter()
        .rev()
        .find(|m| m.role == "tool")
        .unwrap()
        .content
        .clone();
    assert!(tool_message.starts_with("Error: "), "{}", tool_message);
}

#[tokio::test]
async fn test_rerun_with_same_run_id_resumes() {
    let harness = Harness::new();
    let trigger = JobTrigger {
        project_id: "proj-5".to_string(),
        value: "Add a footer".to_string(),
    };

    // the generator is down on the first attempt
    let first_coder = ScriptedModel::new(footer_script());
    let first = harness.job(first_coder.clone(), GeneratorModel::failing());
    assert!(first.run(&trigger, "run-5").await.is_err());
    assert_eq!(first_coder.calls(), 4);
    assert!(harness.store.messages("proj-5").await.is_empty());

    let second_coder = ScriptedModel::new(Vec::new());
    let generator = GeneratorModel::new("Footer", "Added a footer.");
    let second = harness.job(second_coder.clone(), generator.clone());
    let output = second.run(&trigger, "run-5").await.unwrap();

    assert_eq!(second_coder.calls(), 0);
    assert_eq!(harness.sandboxes.acquired(), 1);
    assert_eq!(output.summary, "Added a footer component to the landing page.");
    assert!(output.files.contains_key("app/footer.tsx"));
    let sandbox = harness.sandboxes.sandbox(&SandboxId("fake-0".to_string())).unwrap();
    assert_eq!(sandbox.commands().len(), 1);

    // a completed run replays entirely from the journal
    let third = harness.job(ScriptedModel::new(Vec::new()), GeneratorModel::failing());
    let replayed = third.run(&trigger, "run-5").await.unwrap();
    assert_eq!(replayed, output);
    assert_eq!(generator.calls(), 2);
    assert_eq!(harness.store.messages("proj-5").await.len(), 1);
}

/// Store that rejects the first `failures` RESULT messages
struct FlakyResultStore {
    inner: MemoryMessageStore,
    failures: AtomicUsize,
}

#[async_trait]
impl MessageStore for FlakyResultStore {
    async fn recent_messages(&self, project_id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.inner.recent_messages(project_id, limit).await
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        if message.message_type == MessageType::Result
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "database unavailable",
            )));
        }
        self.inner.create_message(message).await
    }
}

#[tokio::test]
async fn test_retry_after_failed_result_write_keeps_one_error() {
    let sandboxes = FakeSandboxProvider::new();
    let journal = Arc::new(MemoryJournal::new());
    let store = Arc::new(FlakyResultStore {
        inner: MemoryMessageStore::new(),
        failures: AtomicUsize::new(1),
    });
    let trigger = JobTrigger {
        project_id: "proj-6".to_string(),
        value: "Build a dashboard".to_string(),
    };
    let job = || {
        CodeAgentJob::new(
            JobConfig::default(),
            sandboxes.clone(),
            store.clone(),
            journal.clone(),
            ScriptedModel::new(Vec::new()),
        )
        .with_generator_client(GeneratorModel::new("Dashboard", "Could not finish."))
    };

    let err = job().run(&trigger, "run-6").await.unwrap_err();
    assert!(matches!(err, JobError::Persist(_)), "{}", err);
    let types: Vec<MessageType> = store.inner.messages("proj-6").await.iter().map(|m| m.message_type).collect();
    assert_eq!(types, vec![MessageType::Error]);

    job().run(&trigger, "run-6").await.unwrap();

    let types: Vec<MessageType> = store.inner.messages("proj-6").await.iter().map(|m| m.message_type).collect();
    assert_eq!(types, vec![MessageType::Error, MessageType::Result]);
}
