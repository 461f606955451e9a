//! Local sandboxes - a directory per sandbox, commands run through `/bin/sh`
//!
//! ```text
//! {base_dir}/
//! ├── templates/{template}/   copied into every new sandbox of that template
//! ├── sbx-0192....json        id, template, deadline
//! └── sbx-0192.../            sandbox root, working directory of every command
//! ```
//!
//! Sandbox metadata lives on disk, so a resumed job in a fresh process can
//! still resolve the sandbox its first attempt acquired.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handle::{CommandOutput, CommandResult, Sandbox, SandboxId, SandboxProvider};
use super::SandboxError;
use crate::metrics::{SANDBOXES_ACTIVE, SANDBOX_ACQUIRE_DURATION, SANDBOX_COMMANDS};

/// Home directory agents are told about; absolute paths below it map onto
/// the sandbox root
pub const SANDBOX_HOME: &str = "/home/user";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SandboxMeta {
    id: SandboxId,
    template: String,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

/// One directory-backed sandbox
pub struct LocalSandbox {
    meta: SandboxMeta,
    root: PathBuf,
    command_timeout: Duration,
    host: String,
}

impl LocalSandbox {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template(&self) -> &str {
        &self.meta.template
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.meta.deadline
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.meta.deadline
    }

    fn ensure_alive(&self) -> Result<(), SandboxError> {
        if self.is_expired() {
            return Err(SandboxError::Expired(self.meta.id.to_string()));
        }
        Ok(())
    }

    /// Map an agent-supplied path onto the sandbox root
    ///
    /// Relative paths and absolute paths under [`SANDBOX_HOME`] are accepted;
    /// anything else, or any `..` component, is rejected.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let requested = Path::new(path.trim());
        let relative = match requested.strip_prefix(SANDBOX_HOME) {
            Ok(rest) => rest.to_path_buf(),
            Err(_) if requested.is_absolute() => {
                return Err(SandboxError::InvalidPath(path.to_string()))
            }
            Err(_) => requested.to_path_buf(),
        };

        if relative.as_os_str().is_empty() {
            return Err(SandboxError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(SandboxError::InvalidPath(path.to_string())),
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn id(&self) -> &SandboxId {
        &self.meta.id
    }

    async fn execute(
        &self,
        command: &str,
        output: &mut CommandOutput,
    ) -> Result<CommandResult, SandboxError> {
        self.ensure_alive()?;
        let start = Instant::now();

        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .env("HOME", &self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let status = {
            let CommandOutput { stdout, stderr } = &mut *output;
            let run = async {
                let (status, _, _) = tokio::join!(
                    child.wait(),
                    drain(stdout_pipe, stdout),
                    drain(stderr_pipe, stderr)
                );
                status
            };
            tokio::time::timeout(self.command_timeout, run).await
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = match status {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(sandbox_id = %self.meta.id, error = %e, "Failed to kill timed out command");
                }
                SANDBOX_COMMANDS.with_label_values(&["timeout"]).inc();
                return Err(SandboxError::Timeout(self.command_timeout));
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        debug!(sandbox_id = %self.meta.id, exit_code, duration_ms, "Command finished");

        if !status.success() {
            SANDBOX_COMMANDS.with_label_values(&["error"]).inc();
            return Err(SandboxError::CommandFailed { exit_code });
        }

        SANDBOX_COMMANDS.with_label_values(&["success"]).inc();
        Ok(CommandResult {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code,
            duration_ms,
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        self.ensure_alive()?;
        let target = self.resolve_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        self.ensure_alive()?;
        let target = self.resolve_path(path)?;
        tokio::fs::read_to_string(&target).await.map_err(|e| {
            SandboxError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path, e)))
        })
    }

    fn exposed_endpoint(&self, port: u16) -> Result<String, SandboxError> {
        self.ensure_alive()?;
        Ok(format!("http://{}:{}", self.host, port))
    }
}

impl std::fmt::Debug for LocalSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSandbox")
            .field("id", &self.meta.id)
            .field("template", &self.meta.template)
            .field("root", &self.root)
            .field("deadline", &self.meta.deadline)
            .finish()
    }
}

/// Copy a pipe into `sink` until EOF
///
/// Invalid UTF-8 is replaced; `\r` and a missing final newline are kept as
/// written.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, sink: &mut String) {
    let Some(pipe) = pipe else { return };
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => sink.push_str(&String::from_utf8_lossy(&line)),
            Err(e) => {
                warn!(error = %e, "Failed to read command output");
                break;
            }
        }
    }
}

/// Provider of directory-backed sandboxes
pub struct LocalSandboxProvider {
    base_dir: PathBuf,
    command_timeout: Duration,
    host: String,
    sandboxes: Mutex<HashMap<SandboxId, Arc<LocalSandbox>>>,
}

impl LocalSandboxProvider {
    /// Create a provider rooted at `base_dir`, creating it if needed
    pub fn new(base_dir: impl Into<PathBuf>, command_timeout: Duration) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            command_timeout,
            host: "127.0.0.1".to_string(),
            sandboxes: Mutex::new(HashMap::new()),
        })
    }

    /// Host name used in exposed endpoints
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.base_dir.join("templates")
    }

    fn root_for(&self, id: &SandboxId) -> PathBuf {
        self.base_dir.join(id.as_str())
    }

    fn meta_path(&self, id: &SandboxId) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }

    fn sandbox_from_meta(&self, meta: SandboxMeta) -> LocalSandbox {
        LocalSandbox {
            root: self.root_for(&meta.id),
            meta,
            command_timeout: self.command_timeout,
            host: self.host.clone(),
        }
    }

    async fn load_from_disk(&self, id: &SandboxId) -> Result<Option<LocalSandbox>, SandboxError> {
        let json = match tokio::fs::read_to_string(self.meta_path(id)).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: SandboxMeta = serde_json::from_str(&json)
            .map_err(|e| SandboxError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(Some(self.sandbox_from_meta(meta)))
    }

    /// Remove expired sandboxes from the registry and delete their files
    ///
    /// Returns how many sandboxes were reaped.
    pub async fn reap_expired(&self) -> usize {
        let expired: Vec<Arc<LocalSandbox>> = {
            let mut sandboxes = self.sandboxes.lock().await;
            let ids: Vec<SandboxId> = sandboxes
                .iter()
                .filter(|(_, sandbox)| sandbox.is_expired())
                .map(|(id, _)| id.clone())
                .collect();
            let removed = ids.iter().filter_map(|id| sandboxes.remove(id)).collect();
            SANDBOXES_ACTIVE.set(sandboxes.len() as f64);
            removed
        };

        for sandbox in &expired {
            if let Err(e) = tokio::fs::remove_dir_all(sandbox.root()).await {
                warn!(sandbox_id = %sandbox.meta.id, error = %e, "Failed to remove sandbox root");
            }
            if let Err(e) = tokio::fs::remove_file(self.meta_path(&sandbox.meta.id)).await {
                warn!(sandbox_id = %sandbox.meta.id, error = %e, "Failed to remove sandbox metadata");
            }
            info!(sandbox_id = %sandbox.meta.id, "Sandbox expired and reaped");
        }

        expired.len()
    }

    /// Start the background task that reaps expired sandboxes
    pub fn start_reaper(provider: Arc<LocalSandboxProvider>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                provider.reap_expired().await;
            }
        })
    }
}

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    async fn acquire(&self, template: &str, timeout: Duration) -> Result<SandboxId, SandboxError> {
        let start = Instant::now();

        if !is_plain_name(template) {
            return Err(SandboxError::Provision(format!("invalid template name '{}'", template)));
        }

        let id = SandboxId(format!("sbx-{}", Uuid::now_v7()));
        let root = self.root_for(&id);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| SandboxError::Provision(format!("failed to create {}: {}", root.display(), e)))?;

        let template_dir = self.templates_dir().join(template);
        if template_dir.is_dir() {
            copy_dir(&template_dir, &root)
                .await
                .map_err(|e| SandboxError::Provision(format!("failed to copy template '{}': {}", template, e)))?;
        } else {
            debug!(template, "No template directory, starting from an empty sandbox");
        }

        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(timeout)
            .map_err(|e| SandboxError::Provision(format!("invalid timeout: {}", e)))?;
        let meta = SandboxMeta {
            id: id.clone(),
            template: template.to_string(),
            created_at,
            deadline: created_at + ttl,
        };

        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| SandboxError::Provision(e.to_string()))?;
        tokio::fs::write(self.meta_path(&id), json)
            .await
            .map_err(|e| SandboxError::Provision(format!("failed to write metadata: {}", e)))?;

        let sandbox = Arc::new(self.sandbox_from_meta(meta));
        {
            let mut sandboxes = self.sandboxes.lock().await;
            sandboxes.insert(id.clone(), sandbox);
            SANDBOXES_ACTIVE.set(sandboxes.len() as f64);
        }

        let elapsed = start.elapsed();
        SANDBOX_ACQUIRE_DURATION.observe(elapsed.as_secs_f64());
        info!(
            sandbox_id = %id,
            template,
            timeout_secs = timeout.as_secs(),
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Sandbox acquired"
        );

        Ok(id)
    }

    async fn resolve(&self, id: &SandboxId) -> Result<Arc<dyn Sandbox>, SandboxError> {
        if !is_plain_name(id.as_str()) {
            return Err(SandboxError::NotFound(id.to_string()));
        }

        let mut sandboxes = self.sandboxes.lock().await;
        let sandbox = match sandboxes.get(id) {
            Some(sandbox) => sandbox.clone(),
            None => {
                // provisioned by an earlier process; adopt it
                let sandbox = self
                    .load_from_disk(id)
                    .await?
                    .ok_or_else(|| SandboxError::NotFound(id.to_string()))?;
                let sandbox = Arc::new(sandbox);
                sandboxes.insert(id.clone(), sandbox.clone());
                SANDBOXES_ACTIVE.set(sandboxes.len() as f64);
                sandbox
            }
        };

        if sandbox.is_expired() {
            return Err(SandboxError::Expired(id.to_string()));
        }
        Ok(sandbox)
    }
}

impl std::fmt::Debug for LocalSandboxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSandboxProvider")
            .field("base_dir", &self.base_dir)
            .field("command_timeout", &self.command_timeout)
            .field("host", &self.host)
            .finish()
    }
}

/// Names used as single path segments: ids and template names
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

async fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn provider(dir: &Path) -> LocalSandboxProvider {
        LocalSandboxProvider::new(dir, Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        let mut output = CommandOutput::default();
        let result = sandbox.execute("echo hello", &mut output).await.unwrap();
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_failed_command_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        let mut output = CommandOutput::default();
        let err = sandbox
            .execute("echo partial; echo broken >&2; exit 3", &mut output)
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::CommandFailed { exit_code: 3 }));
        assert_eq!(output.stdout, "partial\n");
        assert_eq!(output.stderr, "broken\n");
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        let mut output = CommandOutput::default();
        let result = sandbox
            .execute(r"printf 'ok\n\377\376\nafter\r\nlast'", &mut output)
            .await
            .unwrap();
        assert_eq!(result.stdout, "ok\n\u{FFFD}\u{FFFD}\nafter\r\nlast");
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalSandboxProvider::new(dir.path(), Duration::from_millis(100)).unwrap();
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        let mut output = CommandOutput::default();
        let err = sandbox.execute("sleep 5", &mut output).await.unwrap_err();
        assert!(matches!(err, SandboxError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_files_round_trip_and_home_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        sandbox.write_file("app/page.tsx", "export default 1").await.unwrap();
        let content = sandbox.read_file("/home/user/app/page.tsx").await.unwrap();
        assert_eq!(content, "export default 1");

        let mut output = CommandOutput::default();
        let listed = sandbox.execute("ls app", &mut output).await.unwrap();
        assert_eq!(listed.stdout, "page.tsx\n");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();

        for path in ["../outside.txt", "/etc/passwd", "app/../../x", ""] {
            let err = sandbox.write_file(path, "x").await.unwrap_err();
            assert!(matches!(err, SandboxError::InvalidPath(_)), "accepted {:?}", path);
        }
        assert!(sandbox.read_file("missing.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_template_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let template = provider.templates_dir().join("nextjs").join("app");
        std::fs::create_dir_all(&template).unwrap();
        std::fs::write(template.join("layout.tsx"), "layout").unwrap();

        let id = provider.acquire("nextjs", HOUR).await.unwrap();
        let sandbox = provider.resolve(&id).await.unwrap();
        assert_eq!(sandbox.read_file("app/layout.tsx").await.unwrap(), "layout");

        assert!(matches!(
            provider.acquire("../etc", HOUR).await,
            Err(SandboxError::Provision(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_sandbox_cannot_be_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let id = provider.acquire("base", Duration::ZERO).await.unwrap();

        assert!(matches!(provider.resolve(&id).await, Err(SandboxError::Expired(_))));
        assert_eq!(provider.reap_expired().await, 1);
        assert!(!dir.path().join(id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_resolve_from_another_provider_instance() {
        let dir = tempfile::tempdir().unwrap();
        let id = provider(dir.path()).acquire("base", HOUR).await.unwrap();

        // a resumed job in a new process sees the same directory
        let later = provider(dir.path());
        let sandbox = later.resolve(&id).await.unwrap();
        assert_eq!(sandbox.id(), &id);
        assert_eq!(
            sandbox.exposed_endpoint(3000).unwrap(),
            "http://127.0.0.1:3000"
        );

        let unknown = SandboxId("sbx-unknown".to_string());
        assert!(matches!(later.resolve(&unknown).await, Err(SandboxError::NotFound(_))));
    }
}
