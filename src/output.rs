// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress lines for a person watching the terminal
    Normal,
    /// Only the final result
    Quiet,
    /// One JSON object per line
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    started: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: None,
        }
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> Option<f64> {
        self.started.map(|t| t.elapsed().as_secs_f64())
    }

    /// Print a progress line (normal mode only).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print the outcome of a command, with its duration when timed.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed_secs() {
                Some(secs) => println!("{message} ({secs:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit("success", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.emit("error", message),
        }
    }

    fn emit(&self, event: &str, message: &str) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.elapsed_secs(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            println!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_event_omits_missing_duration() {
        let event = JsonEvent {
            event: "success",
            message: "Mode dev deployed",
            duration_secs: None,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"success","message":"Mode dev deployed"}"#
        );
    }

    #[test]
    fn timer_is_optional() {
        let mut output = Output::new(OutputMode::Quiet);
        assert!(output.elapsed_secs().is_none());
        output.start_timer();
        assert!(output.elapsed_secs().is_some());
    }
}
