//! Terminal rendering: status panel, menu entries and remediation progress.

use bridge_core::readiness::{ReadinessEvent, ReadinessObserver};
use bridge_core::{BackendMode, FailureReason, StatusSnapshot};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// One entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Mode(BackendMode),
    Settings,
    Quit,
}

pub const MENU_CHOICES: [MenuChoice; 4] = [
    MenuChoice::Mode(BackendMode::Cloud),
    MenuChoice::Mode(BackendMode::Local),
    MenuChoice::Settings,
    MenuChoice::Quit,
];

/// Print the banner with internet and service state.
pub fn print_status(status: &StatusSnapshot) {
    let title = format!("BRIDGE v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("{}", title.magenta().bold());
    println!("{}", "─".repeat(50));

    let internet = if status.internet_up {
        "Online ✓".green()
    } else {
        "Offline ✗".red()
    };
    let service = if status.local_service_up {
        "Running ✓".green()
    } else {
        "Stopped ✗".red()
    };
    println!("  Internet: {}  |  Ollama: {}", internet, service);
    println!();
}

/// Menu labels, in [`MENU_CHOICES`] order.
pub fn menu_items(status: &StatusSnapshot) -> Vec<String> {
    MENU_CHOICES
        .iter()
        .map(|choice| menu_label(*choice, status))
        .collect()
}

/// Label for one entry, annotated with its availability.
pub fn menu_label(choice: MenuChoice, status: &StatusSnapshot) -> String {
    let availability = &status.availability;
    match choice {
        MenuChoice::Mode(BackendMode::Cloud) => {
            if availability.cloud_available {
                format!("1) {} ✓", BackendMode::Cloud.label())
            } else {
                format!("1) {} ✗ (Check Internet/Key)", BackendMode::Cloud.label())
            }
        }
        MenuChoice::Mode(BackendMode::Local) => {
            if availability.local_needs_auto_start {
                format!("2) {} (auto-start)", BackendMode::Local.label())
            } else {
                format!("2) {} ✓", BackendMode::Local.label())
            }
        }
        MenuChoice::Settings => "3) Settings".to_string(),
        MenuChoice::Quit => "q) Quit".to_string(),
    }
}

/// Index of the highlighted entry: Cloud when available, else Local.
pub fn default_index(status: &StatusSnapshot) -> usize {
    let default = MenuChoice::Mode(status.availability.default_mode());
    MENU_CHOICES
        .iter()
        .position(|c| *c == default)
        .unwrap_or(0)
}

/// Print a remediation failure and what to do about it.
pub fn print_failure(reason: FailureReason) {
    println!("{}", format!("✗ Local backend not ready: {}", reason).red().bold());
    println!("  {}", reason.hint().dimmed());
}

/// Renders remediation progress, with a spinner while polling the service.
#[derive(Default)]
pub struct ConsoleObserver {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    fn start_spinner(&self, message: String) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(spinner);
        }
    }

    fn update_spinner(&self, message: String) {
        if let Ok(slot) = self.spinner.lock() {
            if let Some(spinner) = slot.as_ref() {
                spinner.set_message(message);
            }
        }
    }

    fn clear_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

impl ReadinessObserver for ConsoleObserver {
    fn on_event(&self, event: &ReadinessEvent) {
        match event {
            ReadinessEvent::ServiceRunning { .. } => {}
            ReadinessEvent::ServiceStarting { command } => {
                println!(
                    "  {} Ollama is not running, starting `{}`",
                    "→".cyan(),
                    command
                );
                self.start_spinner("Waiting for Ollama".to_string());
            }
            ReadinessEvent::ServicePolling {
                attempt,
                max_attempts,
            } => {
                self.update_spinner(format!("Waiting for Ollama ({}/{})", attempt, max_attempts));
            }
            ReadinessEvent::ServiceReady { .. } => {
                self.clear_spinner();
                println!("  {}", "✓ Ollama is ready".green());
            }
            ReadinessEvent::ArtifactPresent { identifier } => {
                println!("  {} {}", "✓ Model available:".green(), identifier);
            }
            ReadinessEvent::ArtifactPulling { identifier } => {
                println!(
                    "  {} Model {} not found locally, pulling (this may take a while)...",
                    "→".cyan(),
                    identifier
                );
            }
            ReadinessEvent::ArtifactPulled { identifier } => {
                println!("  {} {}", "✓ Pulled".green(), identifier);
            }
            ReadinessEvent::Failed { .. } => self.clear_spinner(),
        }
    }
}
