//! In-memory fakes for the probe, command runner, launcher and observer seams.

use async_trait::async_trait;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::dispatch::{ExitOutcome, LaunchSpec, Launcher};
use crate::error::Result;
use crate::probe::{Endpoint, Probe};
use crate::readiness::{CommandRunner, CommandSpec, ReadinessEvent, ReadinessObserver};

/// Probe that fails a fixed number of times, then succeeds.
pub struct ScriptedProbe {
    failures: Option<u32>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn up_after(failures: u32) -> Self {
        Self {
            failures: Some(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_up() -> Self {
        Self::up_after(0)
    }

    pub fn always_down() -> Self {
        Self {
            failures: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn reachable(&self, _endpoint: &Endpoint, _timeout: Duration) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures {
            Some(failures) => call > failures,
            None => false,
        }
    }
}

/// Probe answering per endpoint: internet and loopback can differ.
pub struct SplitProbe {
    pub internet_up: bool,
    pub local_up: bool,
}

#[async_trait]
impl Probe for SplitProbe {
    async fn reachable(&self, endpoint: &Endpoint, _timeout: Duration) -> bool {
        if endpoint.host == crate::probe::LOOPBACK_HOST {
            self.local_up
        } else {
            self.internet_up
        }
    }
}

/// Command runner that records calls instead of executing them.
pub struct FakeRunner {
    listing: String,
    pull_exit: Option<i32>,
    /// Verbs ("spawn", "capture", "run") that fail as if the binary were absent.
    missing_for: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            listing: String::new(),
            pull_exit: Some(0),
            missing_for: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRunner {
    pub fn with_listing(listing: &str) -> Self {
        Self {
            listing: listing.to_string(),
            ..Self::default()
        }
    }

    pub fn missing_tool() -> Self {
        Self {
            missing_for: vec!["spawn", "capture", "run"],
            ..Self::default()
        }
    }

    /// Only `verb` fails with `NotFound`; the other calls succeed.
    pub fn missing_tool_for(verb: &'static str) -> Self {
        Self {
            missing_for: vec![verb],
            ..Self::default()
        }
    }

    pub fn pull_exit(mut self, code: Option<i32>) -> Self {
        self.pull_exit = code;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, verb: &str, command: &CommandSpec) -> io::Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("{} {}", verb, command));
        if self.missing_for.iter().any(|missing| *missing == verb) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn spawn_detached(&self, command: &CommandSpec) -> io::Result<u32> {
        self.record("spawn", command)?;
        Ok(4242)
    }

    async fn capture_stdout(&self, command: &CommandSpec) -> io::Result<String> {
        self.record("capture", command)?;
        Ok(self.listing.clone())
    }

    async fn run(&self, command: &CommandSpec) -> io::Result<Option<i32>> {
        self.record("run", command)?;
        Ok(self.pull_exit)
    }
}

/// Launcher that records specs and reports a clean exit.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<LaunchSpec>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<LaunchSpec> {
        self.launched.lock().expect("launch lock").clone()
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ExitOutcome> {
        self.launched.lock().expect("launch lock").push(spec.clone());
        Ok(ExitOutcome::Exited(0))
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ReadinessEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ReadinessEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl ReadinessObserver for RecordingObserver {
    fn on_event(&self, event: &ReadinessEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}
