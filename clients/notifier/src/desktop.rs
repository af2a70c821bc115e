use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::Notifier;

/// How a desktop notification is delivered on the current OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopBackend {
    /// `notify-send` (libnotify)
    NotifySend,
    /// `osascript -e 'display notification ...'`
    AppleScript,
    /// Print to stdout.
    Console,
}

impl DesktopBackend {
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "linux" => Self::NotifySend,
            "macos" => Self::AppleScript,
            _ => Self::Console,
        }
    }
}

/// Native desktop notifications.
pub struct DesktopNotifier {
    backend: DesktopBackend,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::with_backend(DesktopBackend::detect())
    }

    pub fn with_backend(backend: DesktopBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> DesktopBackend {
        self.backend
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes a value for embedding in an AppleScript string literal.
fn applescript_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn applescript(title: &str, message: &str) -> String {
    format!(
        "display notification {} with title {}",
        applescript_quote(message),
        applescript_quote(title)
    )
}

async fn run(mut cmd: Command, program: &str) -> Result<()> {
    let status = cmd.status().await?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

#[async_trait]
impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        match self.backend {
            DesktopBackend::NotifySend => {
                let mut cmd = Command::new("notify-send");
                cmd.arg(title).arg(message);
                run(cmd, "notify-send").await
            }
            DesktopBackend::AppleScript => {
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(applescript(title, message));
                run(cmd, "osascript").await
            }
            DesktopBackend::Console => {
                println!("\n{title}\n{message}\n");
                Ok(())
            }
        }
    }
}
