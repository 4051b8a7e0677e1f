//! CLI presenter for output formatting
//!
//! Doubles as the terminal view of a recording session: every region change
//! prints once, the recording timer and the processing step live on a
//! spinner line.

use std::io::{self, Write};

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::ports::{StatusKind, ViewSink};
use crate::domain::view::{ViewModel, ViewRegion};

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    region: Option<ViewRegion>,
    requesting_permissions: bool,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            region: None,
            requesting_permissions: false,
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        self.stop_spinner();
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        self.println(format!("{} {}", "ℹ".cyan(), message));
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        self.println(format!("{} {}", "✓".green(), message));
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        self.println(format!("{} {}", "⚠".yellow(), message));
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        self.println(format!("{} {}", "✗".red(), message));
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Output text to stdout without newline
    pub fn output_inline(&self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Commands available in a region
    pub fn hint(&self, region: ViewRegion) -> &'static str {
        match region {
            ViewRegion::Idle => "Type `start` to record, `submit` to send without audio, `quit` to exit.",
            ViewRegion::Recording => "Type `stop` to finish or `cancel` to discard.",
            ViewRegion::Processing => "",
            ViewRegion::Finished => "Type `submit` to send, `again` to record again.",
            ViewRegion::Error => "Type `retry` to try again.",
        }
    }

    // Status lines must not tear the spinner line.
    fn println(&self, line: String) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    fn enter(&mut self, view: &ViewModel) {
        match view.region {
            ViewRegion::Idle => {
                self.stop_spinner();
                self.info(self.hint(ViewRegion::Idle));
            }
            ViewRegion::Recording => {
                self.start_spinner(&recording_message(view));
                self.info(self.hint(ViewRegion::Recording));
            }
            ViewRegion::Processing => {
                let text = view
                    .processing_text
                    .clone()
                    .unwrap_or_else(|| "Finalizing your recording.".to_string());
                self.start_spinner(&text);
            }
            ViewRegion::Finished => {
                let name = view.artifact_name.as_deref().unwrap_or("recording");
                let label = view.download_label.as_deref().unwrap_or("audio");
                self.spinner_success(&format!("Recorded {} ({}, {})", name, label, view.timer_text));
                self.info(self.hint(ViewRegion::Finished));
            }
            ViewRegion::Error => {
                self.stop_spinner();
                if let Some(message) = &view.error_message {
                    self.error(message);
                }
                self.info(self.hint(ViewRegion::Error));
            }
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSink for Presenter {
    fn show(&mut self, view: &ViewModel) {
        let region_changed = self.region != Some(view.region);
        if region_changed {
            self.region = Some(view.region);
            self.enter(view);
        } else if view.region == ViewRegion::Recording {
            self.update_spinner(&recording_message(view));
        }

        if view.requesting_permissions != self.requesting_permissions {
            if view.requesting_permissions {
                self.start_spinner("Requesting access to audio sources...");
            } else if !region_changed {
                self.stop_spinner();
            }
            self.requesting_permissions = view.requesting_permissions;
        }
    }

    fn status(&mut self, message: &str, kind: StatusKind) {
        match kind {
            StatusKind::Info => self.info(message),
            StatusKind::Success => self.success(message),
            StatusKind::Warning => self.warn(message),
            StatusKind::Error => self.error(message),
        }
    }

    fn navigate(&mut self, url: &str) {
        self.stop_spinner();
        self.info(&format!("Continue at {}", url));
        self.output(url);
    }

    fn replace_document(&mut self, html: &str) {
        self.stop_spinner();
        self.output(html);
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

fn recording_message(view: &ViewModel) -> String {
    format!("{} Recording {}", "●".red(), view.timer_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionState;
    use crate::domain::view::{render, SessionSnapshot};

    fn view(state: SessionState) -> ViewModel {
        render(&SessionSnapshot {
            state,
            source_selected: true,
            ..SessionSnapshot::default()
        })
    }

    #[test]
    fn tracks_current_region() {
        let mut presenter = Presenter::new();
        presenter.show(&view(SessionState::Idle));
        assert_eq!(presenter.region, Some(ViewRegion::Idle));

        presenter.show(&view(SessionState::Recording));
        assert_eq!(presenter.region, Some(ViewRegion::Recording));
        assert!(presenter.spinner.is_some());

        presenter.show(&view(SessionState::Error));
        assert!(presenter.spinner.is_none());
    }

    #[test]
    fn permission_prompt_spinner_clears() {
        let mut presenter = Presenter::new();
        presenter.show(&view(SessionState::AcquiringPermissions));
        assert!(presenter.spinner.is_some());

        presenter.show(&view(SessionState::Idle));
        assert!(presenter.spinner.is_none());
    }

    #[test]
    fn every_region_has_hint_but_processing() {
        let presenter = Presenter::new();
        assert!(presenter.hint(ViewRegion::Processing).is_empty());
        assert!(presenter.hint(ViewRegion::Finished).contains("submit"));
        assert!(presenter.hint(ViewRegion::Error).contains("retry"));
    }
}
