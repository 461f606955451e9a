//! Fakes shared by the integration tests: scripted models and an in-memory
//! sandbox provider

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use codeagent::llm::{ChatError, ChatMessage, ChatModel, ChatResponse, FunctionCall, Tool, ToolCall};
use codeagent::sandbox::{CommandOutput, CommandResult, Sandbox, SandboxError, SandboxId, SandboxProvider};

/// Text the scripted model answers with once its script is used up
pub const IDLE_REPLY: &str = "Still working on it.";

/// Model that replays a fixed list of responses, then idles
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every conversation the model was sent, in order
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        _model: &str,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages);
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| ChatResponse::text(IDLE_REPLY)))
    }
}

/// Generator model: a fixed title for the title agent, a fixed response for
/// everything else
pub struct GeneratorModel {
    pub title: String,
    pub response: String,
    pub fail: bool,
    calls: AtomicUsize,
}

impl GeneratorModel {
    pub fn new(title: &str, response: &str) -> Arc<Self> {
        Arc::new(Self {
            title: title.to_string(),
            response: response.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// A generator whose server is down
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            title: String::new(),
            response: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for GeneratorModel {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        _model: &str,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ChatError::EmptyResponse);
        }
        let is_title = messages
            .first()
            .map(|m| m.content.contains("title"))
            .unwrap_or(false);
        let text = if is_title { &self.title } else { &self.response };
        Ok(ChatResponse::text(text.clone()))
    }
}

/// Assistant reply carrying a single native tool call
pub fn tool_reply(name: &str, arguments: Value) -> ChatResponse {
    let mut response = ChatResponse::text("");
    response.message.tool_calls = Some(vec![ToolCall {
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    }]);
    response
}

/// Assistant reply ending the task
pub fn summary_reply(summary: &str) -> ChatResponse {
    ChatResponse::text(format!("<task_summary>\n{}\n</task_summary>", summary))
}

/// In-memory sandbox
///
/// Commands starting with `fail` print a line to each stream and exit 1;
/// writes to `failing_path` are rejected.
pub struct FakeSandbox {
    id: SandboxId,
    failing_path: Option<String>,
    files: Mutex<BTreeMap<String, String>>,
    commands: Mutex<Vec<String>>,
}

impl FakeSandbox {
    pub fn files(&self) -> BTreeMap<String, String> {
        self.files.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    fn id(&self) -> &SandboxId {
        &self.id
    }

    async fn execute(&self, command: &str, output: &mut CommandOutput) -> Result<CommandResult, SandboxError> {
        self.commands.lock().unwrap().push(command.to_string());
        if command.starts_with("fail") {
            output.stdout.push_str("partial\n");
            output.stderr.push_str("boom\n");
            return Err(SandboxError::CommandFailed { exit_code: 1 });
        }
        output.stdout.push_str(&format!("ran: {}\n", command));
        Ok(CommandResult {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code: 0,
            duration_ms: 1.0,
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        if self.failing_path.as_deref() == Some(path) {
            return Err(SandboxError::InvalidPath(path.to_string()));
        }
        self.files.lock().unwrap().insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SandboxError::NotFound(path.to_string()))
    }

    fn exposed_endpoint(&self, port: u16) -> Result<String, SandboxError> {
        Ok(format!("https://{}-{}.sandbox.test", port, self.id))
    }
}

#[derive(Default)]
pub struct FakeSandboxProvider {
    failing_path: Option<String>,
    sandboxes: Mutex<HashMap<SandboxId, Arc<FakeSandbox>>>,
    acquired: AtomicUsize,
}

impl FakeSandboxProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provider whose sandboxes refuse writes to `path`
    pub fn failing_writes_to(path: &str) -> Arc<Self> {
        Arc::new(Self {
            failing_path: Some(path.to_string()),
            ..Default::default()
        })
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn sandbox(&self, id: &SandboxId) -> Option<Arc<FakeSandbox>> {
        self.sandboxes.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SandboxProvider for FakeSandboxProvider {
    async fn acquire(&self, _template: &str, _timeout: Duration) -> Result<SandboxId, SandboxError> {
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        let id = SandboxId(format!("fake-{}", n));
        let sandbox = Arc::new(FakeSandbox {
            id: id.clone(),
            failing_path: self.failing_path.clone(),
            files: Mutex::new(BTreeMap::new()),
            commands: Mutex::new(Vec::new()),
        });
        self.sandboxes.lock().unwrap().insert(id.clone(), sandbox);
        Ok(id)
    }

    async fn resolve(&self, id: &SandboxId) -> Result<Arc<dyn Sandbox>, SandboxError> {
        let sandbox = self
            .sandboxes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SandboxError::NotFound(id.to_string()))?;
        Ok(sandbox)
    }
}
