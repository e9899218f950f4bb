//! Terminal rendering of bridge events

use crossterm::style::Stylize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gattpipe_core::{BridgeEvent, Severity};

use crate::config::CliConfig;

/// Formats events for the terminal
#[derive(Debug, Clone)]
pub struct ConsoleRenderer {
    show_logs: bool,
    colored: bool,
}

impl ConsoleRenderer {
    pub fn new(config: &CliConfig) -> Self {
        Self {
            show_logs: config.show_logs,
            colored: config.colored_output,
        }
    }

    /// The line to print for `event`, if any
    pub fn render(&self, event: &BridgeEvent) -> Option<String> {
        match event {
            BridgeEvent::Log { text } => self.show_logs.then(|| format!("  {}", text)),
            BridgeEvent::Alert { text, severity } => Some(self.alert(text, *severity)),
            BridgeEvent::Status { text, .. } => Some(format!("status: {}", text)),
            BridgeEvent::SendProgress { percent } => Some(format!("progress: {:>3}%", percent)),
            BridgeEvent::ConnectSucceeded
            | BridgeEvent::ConnectFailed
            | BridgeEvent::SendComplete
            | BridgeEvent::SendFailed => None,
        }
    }

    fn alert(&self, text: &str, severity: Severity) -> String {
        let marker = match severity {
            Severity::Success => "[ok]",
            Severity::Error => "[error]",
            Severity::Info => "[info]",
        };

        match severity {
            Severity::Success if self.colored => format!("{} {}", marker.green(), text),
            Severity::Error if self.colored => format!("{} {}", marker.red(), text),
            _ => format!("{} {}", marker, text),
        }
    }

    /// Print events until every sender is dropped
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<BridgeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(line) = self.render(&event) {
                    println!("{}", line);
                }
            }
        })
    }
}
