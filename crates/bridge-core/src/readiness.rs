//! Readiness remediation for the local backend.
//!
//! Local mode depends on two things, always checked in this order:
//!
//! 1. **Service**: the inference server accepts TCP connections on its
//!    loopback port. If not, the server is spawned detached and the port is
//!    polled at a fixed interval up to an attempt ceiling.
//! 2. **Artifact**: the configured model shows up in the server's `list`
//!    output. If not, a blocking `pull` fetches it.
//!
//! Each dependency ends in a terminal [`ReadinessState`]: `Ready` or
//! `Failed(reason)`.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FailureReason;
use crate::probe::{Endpoint, Probe};

/// Default port of the local inference server.
pub const DEFAULT_SERVICE_PORT: u16 = 11434;

/// Default inference server binary.
pub const DEFAULT_SERVICE_BINARY: &str = "ollama";

/// Prefix the agent uses for local model ids; the server lists them without it.
pub const LOCAL_MODEL_PREFIX: &str = "ollama/";

/// Delay between service liveness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Liveness checks before giving up on a freshly started service.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20;

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Observed state of one dependency during a remediation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadinessState {
    #[default]
    Unknown,
    Unreachable,
    Starting,
    Ready,
    Failed(FailureReason),
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed(_))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }
}

/// Interval and attempt ceiling for polling a starting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Upper bound on time spent polling.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_ATTEMPTS)
    }
}

/// Lifecycle of the Service dependency during one remediation attempt.
///
/// `Unknown -> Unreachable -> Starting -> Ready | Failed`, or straight to
/// `Ready` when the first check succeeds. It knows nothing about clocks: the
/// driver sleeps `policy.interval`, probes, and feeds the result to
/// [`ServicePoll::observe`].
#[derive(Debug, Clone)]
pub struct ServicePoll {
    policy: PollPolicy,
    attempts: u32,
    state: ReadinessState,
}

impl ServicePoll {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            state: ReadinessState::Unknown,
        }
    }

    /// Record the initial check, before any remediation.
    pub fn check(&mut self, reachable: bool) -> ReadinessState {
        if self.state == ReadinessState::Unknown {
            self.state = if reachable {
                ReadinessState::Ready
            } else {
                ReadinessState::Unreachable
            };
        }
        self.state.clone()
    }

    /// The start command was issued; polling may begin.
    pub fn started(&mut self) -> ReadinessState {
        if self.state == ReadinessState::Unreachable {
            self.state = ReadinessState::Starting;
        }
        self.state.clone()
    }

    /// The service could not be started at all.
    pub fn fail(&mut self, reason: FailureReason) -> ReadinessState {
        if !self.state.is_terminal() {
            self.state = ReadinessState::Failed(reason);
        }
        self.state.clone()
    }

    /// Record one poll result and return the resulting state.
    ///
    /// Only counts while `Starting`; terminal states are sticky.
    pub fn observe(&mut self, reachable: bool) -> ReadinessState {
        if self.state != ReadinessState::Starting {
            return self.state.clone();
        }

        self.attempts += 1;
        self.state = if reachable {
            ReadinessState::Ready
        } else if self.attempts >= self.policy.max_attempts {
            ReadinessState::Failed(FailureReason::RemediationTimeout)
        } else {
            ReadinessState::Starting
        };
        self.state.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dependencies
// ─────────────────────────────────────────────────────────────────────────────

/// An external command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Service,
    Artifact,
}

/// How a dependency's current readiness is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessCheck {
    /// Ready when the endpoint accepts a connection.
    Reachable(Endpoint),
    /// Ready when the command's stdout contains the dependency identifier.
    ListContains(CommandSpec),
}

/// A declared requirement of a launch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub identifier: String,
    pub check: ReadinessCheck,
    pub remediation: CommandSpec,
}

/// Where the local inference server lives and how to drive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBackend {
    pub binary: String,
    pub port: u16,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self {
            binary: DEFAULT_SERVICE_BINARY.to_string(),
            port: DEFAULT_SERVICE_PORT,
        }
    }
}

impl LocalBackend {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::loopback(self.port)
    }

    /// Dependencies of Local mode for `model`, Service first.
    pub fn dependencies(&self, model: &str) -> [Dependency; 2] {
        let artifact = strip_model_prefix(model).to_string();
        [
            Dependency {
                kind: DependencyKind::Service,
                identifier: self.binary.clone(),
                check: ReadinessCheck::Reachable(self.endpoint()),
                remediation: CommandSpec::new(&self.binary, ["serve"]),
            },
            Dependency {
                kind: DependencyKind::Artifact,
                check: ReadinessCheck::ListContains(CommandSpec::new(&self.binary, ["list"])),
                remediation: CommandSpec::new(&self.binary, ["pull", artifact.as_str()]),
                identifier: artifact,
            },
        ]
    }
}

/// `ollama/qwen2.5-coder:32b` -> `qwen2.5-coder:32b`
pub fn strip_model_prefix(model: &str) -> &str {
    model.strip_prefix(LOCAL_MODEL_PREFIX).unwrap_or(model)
}

// ─────────────────────────────────────────────────────────────────────────────
// Command execution
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the remediation and inspection commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Start a long-running process and return its PID without waiting for it.
    fn spawn_detached(&self, command: &CommandSpec) -> io::Result<u32>;

    /// Run to completion and return stdout.
    async fn capture_stdout(&self, command: &CommandSpec) -> io::Result<String>;

    /// Run to completion with the terminal attached; `None` if killed by a signal.
    async fn run(&self, command: &CommandSpec) -> io::Result<Option<i32>>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    fn spawn_detached(&self, command: &CommandSpec) -> io::Result<u32> {
        let mut cmd = std::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group, so a Ctrl-C aimed at the agent leaves the server alone.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        debug!("Spawned `{}` with PID: {}", command, pid);

        // Not supervised, only reaped, so an early exit leaves no zombie.
        let name = command.to_string();
        std::thread::spawn(move || match child.wait() {
            Ok(status) => debug!("`{}` (PID {}) exited: {}", name, pid, status),
            Err(e) => warn!("Failed to wait for `{}` (PID {}): {}", name, pid, e),
        });
        Ok(pid)
    }

    async fn capture_stdout(&self, command: &CommandSpec) -> io::Result<String> {
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                "`{}` exited with {}: {}",
                command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run(&self, command: &CommandSpec) -> io::Result<Option<i32>> {
        let status = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .status()
            .await?;
        Ok(status.code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress reporting
// ─────────────────────────────────────────────────────────────────────────────

/// Progress of a remediation attempt, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessEvent {
    ServiceRunning { endpoint: Endpoint },
    ServiceStarting { command: String },
    ServicePolling { attempt: u32, max_attempts: u32 },
    ServiceReady { attempts: u32 },
    ArtifactPresent { identifier: String },
    ArtifactPulling { identifier: String },
    ArtifactPulled { identifier: String },
    Failed { kind: DependencyKind, reason: FailureReason },
}

pub trait ReadinessObserver: Send + Sync {
    fn on_event(&self, event: &ReadinessEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl ReadinessObserver for SilentObserver {
    fn on_event(&self, _event: &ReadinessEvent) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Remediator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives dependencies to `Ready`, remediating where possible.
pub struct Remediator<'a> {
    probe: &'a dyn Probe,
    runner: &'a dyn CommandRunner,
    observer: &'a dyn ReadinessObserver,
    policy: PollPolicy,
    probe_timeout: Duration,
}

impl<'a> Remediator<'a> {
    pub fn new(probe: &'a dyn Probe, runner: &'a dyn CommandRunner) -> Self {
        Self {
            probe,
            runner,
            observer: &SilentObserver,
            policy: PollPolicy::default(),
            probe_timeout: crate::probe::DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ReadinessObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Ensure every dependency in order; stops at the first failure.
    pub async fn ensure_all(&self, dependencies: &[Dependency]) -> ReadinessState {
        for dependency in dependencies {
            let state = self.ensure(dependency).await;
            if !state.is_ready() {
                return state;
            }
        }
        ReadinessState::Ready
    }

    /// Run one dependency through CHECK -> REMEDIATE -> POLL.
    pub async fn ensure(&self, dependency: &Dependency) -> ReadinessState {
        let state = match &dependency.check {
            ReadinessCheck::Reachable(endpoint) => {
                self.ensure_service(endpoint, &dependency.remediation).await
            }
            ReadinessCheck::ListContains(inspect) => {
                self.ensure_artifact(&dependency.identifier, inspect, &dependency.remediation)
                    .await
            }
        };

        if let ReadinessState::Failed(reason) = &state {
            warn!("{:?} `{}` failed: {}", dependency.kind, dependency.identifier, reason);
            self.observer.on_event(&ReadinessEvent::Failed {
                kind: dependency.kind,
                reason: *reason,
            });
        }
        state
    }

    async fn ensure_service(&self, endpoint: &Endpoint, start: &CommandSpec) -> ReadinessState {
        let mut poll = ServicePoll::new(self.policy);
        debug!("Checking service at {}", endpoint);

        let reachable = self.probe.reachable(endpoint, self.probe_timeout).await;
        if poll.check(reachable).is_ready() {
            self.observer.on_event(&ReadinessEvent::ServiceRunning {
                endpoint: endpoint.clone(),
            });
            return ReadinessState::Ready;
        }
        debug!("Service at {} is {:?}", endpoint, poll.state());

        info!("Starting `{}`", start);
        self.observer.on_event(&ReadinessEvent::ServiceStarting {
            command: start.to_string(),
        });
        if let Err(e) = self.runner.spawn_detached(start) {
            warn!("Failed to spawn `{}`: {}", start, e);
            return poll.fail(FailureReason::ToolNotInstalled);
        }
        poll.started();

        loop {
            tokio::time::sleep(self.policy.interval).await;
            self.observer.on_event(&ReadinessEvent::ServicePolling {
                attempt: poll.attempts() + 1,
                max_attempts: self.policy.max_attempts,
            });

            let reachable = self.probe.reachable(endpoint, self.probe_timeout).await;
            let state = poll.observe(reachable);
            match state {
                ReadinessState::Ready => {
                    info!("Service at {} ready after {} attempt(s)", endpoint, poll.attempts());
                    self.observer.on_event(&ReadinessEvent::ServiceReady {
                        attempts: poll.attempts(),
                    });
                    return state;
                }
                ReadinessState::Failed(_) => return state,
                _ => debug!("Service not ready yet (attempt {})", poll.attempts()),
            }
        }
    }

    async fn ensure_artifact(
        &self,
        identifier: &str,
        inspect: &CommandSpec,
        pull: &CommandSpec,
    ) -> ReadinessState {
        match self.runner.capture_stdout(inspect).await {
            Ok(listing) if listing.contains(identifier) => {
                debug!("Artifact `{}` present", identifier);
                self.observer.on_event(&ReadinessEvent::ArtifactPresent {
                    identifier: identifier.to_string(),
                });
                return ReadinessState::Ready;
            }
            Ok(_) => debug!("Artifact `{}` missing from `{}`", identifier, inspect),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return ReadinessState::Failed(FailureReason::ToolNotInstalled);
            }
            // Unknown inventory; the pull decides.
            Err(e) => warn!("`{}` failed: {}", inspect, e),
        }

        info!("Pulling `{}`", identifier);
        self.observer.on_event(&ReadinessEvent::ArtifactPulling {
            identifier: identifier.to_string(),
        });

        match self.runner.run(pull).await {
            Ok(Some(0)) => {
                self.observer.on_event(&ReadinessEvent::ArtifactPulled {
                    identifier: identifier.to_string(),
                });
                ReadinessState::Ready
            }
            Ok(code) => {
                debug!("`{}` exited with {:?}", pull, code);
                ReadinessState::Failed(FailureReason::FetchFailed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ReadinessState::Failed(FailureReason::ToolNotInstalled)
            }
            Err(e) => {
                warn!("Failed to run `{}`: {}", pull, e);
                ReadinessState::Failed(FailureReason::FetchFailed)
            }
        }
    }
}
