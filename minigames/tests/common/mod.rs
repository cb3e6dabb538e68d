//! Shared integration-test harness for spawning a `minigames` host as a
//! child process and talking NDJSON over its stdio.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for reading a single message from the host.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `minigames host run` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
#[allow(clippy::missing_panics_doc)]
pub struct HostProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl HostProcess {
    /// Spawns a host with the given YAML config.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(config_path: &Path) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_minigames"))
            .args([
                "--quiet",
                "host",
                "run",
                "--config",
                config_path.to_str().expect("non-UTF-8 config path"),
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn minigames");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    /// Writes one inbound message.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send(&mut self, message: &Value) {
        let mut buf = serde_json::to_string(message).expect("failed to serialize message");
        buf.push('\n');
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(buf.as_bytes())
            .await
            .expect("failed to write to stdin");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Sends a moderator command from `mod`.
    pub async fn command(&mut self, channel: &str, command: Value) {
        self.send(&json!({
            "type": "command",
            "channel": channel,
            "issuer": "mod",
            "command": command,
        }))
        .await;
    }

    /// Sends a chat message.
    pub async fn message(&mut self, channel: &str, participant: &str, text: &str) {
        self.send(&json!({
            "type": "message",
            "channel": channel,
            "participant": participant,
            "text": text,
        }))
        .await;
    }

    /// Sends a panel interaction.
    pub async fn interaction(&mut self, channel: &str, participant: &str, token: &str) {
        self.send(&json!({
            "type": "interaction",
            "channel": channel,
            "participant": participant,
            "token": token,
        }))
        .await;
    }

    /// Reads one NDJSON message from the host's stdout.
    ///
    /// Panics on EOF, I/O error, or if no message arrives within `timeout`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_message(&mut self, timeout: Duration) -> Value {
        let mut line = String::new();
        let result = tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from host");
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return serde_json::from_str::<Value>(trimmed)
                        .unwrap_or_else(|e| panic!("invalid JSON from host: {e}\nline: {line}"));
                }
            }
        })
        .await;
        result.expect("timed out waiting for message from host")
    }

    /// Reads messages until one has the given `type`.
    pub async fn expect_type(&mut self, kind: &str) -> Value {
        loop {
            let msg = self.read_message(DEFAULT_TIMEOUT).await;
            if msg["type"] == kind {
                return msg;
            }
        }
    }

    /// Reads messages until an update whose change has the given `kind`.
    pub async fn expect_change(&mut self, kind: &str) -> Value {
        loop {
            let msg = self.expect_type("update").await;
            if msg["change"]["kind"] == kind {
                return msg;
            }
        }
    }

    /// Closes stdin and returns everything written until exit.
    #[allow(clippy::missing_panics_doc)]
    pub async fn finish(mut self) -> (Vec<Value>, std::process::ExitStatus) {
        drop(self.stdin.take());

        let mut rest = Vec::new();
        let mut line = String::new();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                line.clear();
                let n = self.reader.read_line(&mut line).await.expect("read_line");
                if n == 0 {
                    break;
                }
                if let Ok(value) = serde_json::from_str::<Value>(line.trim()) {
                    rest.push(value);
                }
            }
        })
        .await;
        assert!(drained.is_ok(), "host did not close stdout after EOF");

        let status = tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .expect("host did not exit after EOF")
            .expect("wait failed");
        (rest, status)
    }

    /// Runs the binary to completion with `args`.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_minigames"))
            .args(args)
            .output()
            .expect("failed to run minigames")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }
}
