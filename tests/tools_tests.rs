//! Tool tests against the local, directory-backed sandbox

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use codeagent::llm::{FunctionCall, ToolCall};
use codeagent::sandbox::{LocalSandboxProvider, SandboxProvider};
use codeagent::step::{MemoryJournal, StepExecutor};
use codeagent::tools::{SandboxAccess, ToolRegistry};
use codeagent::AgentState;

struct Fixture {
    _dir: tempfile::TempDir,
    journal: Arc<MemoryJournal>,
    access: SandboxAccess,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(LocalSandboxProvider::new(dir.path(), Duration::from_secs(10)).unwrap());
    let id = provider.acquire("nextjs", Duration::from_secs(300)).await.unwrap();
    let journal = Arc::new(MemoryJournal::new());
    let steps = Arc::new(StepExecutor::open(journal.clone(), "run").await.unwrap());
    Fixture {
        _dir: dir,
        journal,
        access: SandboxAccess::new(provider, id, steps),
    }
}

fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    }
}

#[tokio::test]
async fn test_terminal_returns_stdout() {
    let fixture = fixture().await;
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let mut state = AgentState::new();

    let output = tools
        .dispatch(&call("terminal", json!({"command": "echo hello"})), &mut state)
        .await
        .unwrap();

    assert!(!output.is_error);
    assert_eq!(output.content.trim(), "hello");
}

#[tokio::test]
async fn test_terminal_failure_never_raises() {
    let fixture = fixture().await;
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let mut state = AgentState::new();

    let output = tools
        .dispatch(
            &call("terminal", json!({"command": "echo before; echo oops >&2; exit 3"})),
            &mut state,
        )
        .await
        .unwrap();

    assert!(output.is_error);
    assert!(output.content.starts_with("Command failed: Command exited with code 3"));
    assert!(output.content.contains("stdout: before"));
    assert!(output.content.contains("stderr: oops"));
}

#[tokio::test]
async fn test_write_then_read_files() {
    let fixture = fixture().await;
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let mut state = AgentState::new();

    let written = tools
        .dispatch(
            &call(
                "createOrUpdateFiles",
                json!({"files": [{"path": "app/footer.tsx", "content": "export const Footer = 1;"}]}),
            ),
            &mut state,
        )
        .await
        .unwrap();
    assert!(!written.is_error);
    assert_eq!(state.files["app/footer.tsx"], "export const Footer = 1;");

    // absolute paths under the sandbox home resolve to the same file
    let read = tools
        .dispatch(
            &call("readFiles", json!({"files": ["/home/user/app/footer.tsx"]})),
            &mut state,
        )
        .await
        .unwrap();
    let files: serde_json::Value = serde_json::from_str(&read.content).unwrap();
    assert_eq!(
        files,
        json!([{"path": "/home/user/app/footer.tsx", "content": "export const Footer = 1;"}])
    );
}

#[tokio::test]
async fn test_write_outside_sandbox_is_rejected() {
    let fixture = fixture().await;
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let mut state = AgentState::new();
    state.commit_files([("app/page.tsx".to_string(), "page".to_string())].into());

    let output = tools
        .dispatch(
            &call(
                "createOrUpdateFiles",
                json!({"files": [
                    {"path": "app/new.tsx", "content": "new"},
                    {"path": "../escape.txt", "content": "nope"}
                ]}),
            ),
            &mut state,
        )
        .await
        .unwrap();

    assert!(output.is_error);
    assert!(output.content.starts_with("Error: "));
    assert_eq!(state.files.len(), 1);
    assert!(state.files.contains_key("app/page.tsx"));
}

#[tokio::test]
async fn test_missing_file_read_is_an_error_message() {
    let fixture = fixture().await;
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let mut state = AgentState::new();

    let output = tools
        .dispatch(&call("readFiles", json!({"files": ["app/missing.tsx"]})), &mut state)
        .await
        .unwrap();

    assert!(output.is_error);
    assert!(output.content.starts_with("Error: "));
}

#[tokio::test]
async fn test_tool_steps_replay_from_the_journal() {
    let fixture = fixture().await;
    let mut state = AgentState::new();
    let tools = ToolRegistry::for_sandbox(fixture.access.clone());
    let first = tools
        .dispatch(&call("terminal", json!({"command": "echo $$"})), &mut state)
        .await
        .unwrap();

    // a replayed run hands out the same step names and gets the recorded output
    let steps = Arc::new(StepExecutor::open(fixture.journal.clone(), "run").await.unwrap());
    let replay_access = SandboxAccess::new(
        fixture.access.provider.clone(),
        fixture.access.sandbox_id.clone(),
        steps,
    );
    let replayed = ToolRegistry::for_sandbox(replay_access)
        .dispatch(&call("terminal", json!({"command": "echo $$"})), &mut state)
        .await
        .unwrap();

    assert_eq!(first, replayed);
}
