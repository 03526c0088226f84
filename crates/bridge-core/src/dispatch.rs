//! Handoff to the coding agent.
//!
//! Provides:
//! - Executable resolution (next to the running binary, then `PATH`)
//! - Environment overlay on top of the inherited environment
//! - Launch spec construction per mode
//! - Foreground child launch that survives Ctrl-C while the agent runs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::mode::BackendMode;
use crate::store::{ConfigSnapshot, KEY_API_KEY};

/// Default coding agent binary.
pub const DEFAULT_AGENT_BINARY: &str = "aider";

/// Planning mode, file watching, no automatic commits.
pub const AGENT_FLAGS: [&str; 3] = ["--architect", "--watch-files", "--no-auto-commits"];

/// Full process environment.
pub type Environment = BTreeMap<OsString, OsString>;

/// The current process environment.
pub fn inherited_environment() -> Environment {
    std::env::vars_os().collect()
}

/// Copy `base` and layer `overlay` on top; overlay wins on conflict.
pub fn build_environment(base: &Environment, overlay: &BTreeMap<String, String>) -> Environment {
    let mut env = base.clone();
    for (key, value) in overlay {
        env.insert(OsString::from(key), OsString::from(value));
    }
    env
}

// ─────────────────────────────────────────────────────────────────────────────
// Executable resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Finds the agent binary.
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    colocated_dir: Option<PathBuf>,
    search_path: Option<OsString>,
    cwd: PathBuf,
}

impl ExecutableResolver {
    pub fn new(colocated_dir: Option<PathBuf>, search_path: Option<OsString>) -> Self {
        Self {
            colocated_dir,
            search_path,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Directory of the running binary plus the process `PATH`.
    pub fn from_env() -> Self {
        let colocated_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::new(colocated_dir, std::env::var_os("PATH"))
    }

    /// Every directory searched, in order.
    pub fn locations(&self) -> Vec<PathBuf> {
        let mut locations: Vec<PathBuf> = self.colocated_dir.iter().cloned().collect();
        if let Some(path) = &self.search_path {
            locations.extend(std::env::split_paths(path));
        }
        locations
    }

    /// First match for `name`, colocated directory before `PATH`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(dir) = &self.colocated_dir {
            if let Ok(path) = which::which_in(name, Some(dir), &self.cwd) {
                debug!("Found {} next to bridge: {:?}", name, path);
                return Ok(path);
            }
        }

        match which::which_in(name, self.search_path.as_ref(), &self.cwd) {
            Ok(path) => {
                debug!("Found {} on PATH: {:?}", name, path);
                Ok(path)
            }
            Err(_) => Err(Error::executable_not_found(name, self.locations())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Launch spec
// ─────────────────────────────────────────────────────────────────────────────

/// Executable, arguments and environment overlay for one handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub env_overlay: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Build the agent invocation for `mode`.
    ///
    /// Only Cloud carries the credential in its overlay.
    pub fn for_mode(
        executable: PathBuf,
        mode: BackendMode,
        config: &ConfigSnapshot,
        extra_args: &[String],
    ) -> Self {
        let mut args = vec![
            "--model".to_string(),
            mode.model_identifier(config).to_string(),
        ];
        args.extend(AGENT_FLAGS.iter().map(|flag| flag.to_string()));
        args.extend(extra_args.iter().cloned());

        let mut env_overlay = BTreeMap::new();
        if mode.requires_remote_credential() {
            env_overlay.insert(KEY_API_KEY.to_string(), config.api_key.clone());
        }

        Self {
            executable,
            args,
            env_overlay,
        }
    }

    /// Model passed via `--model`.
    pub fn model(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "--model")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Launch
// ─────────────────────────────────────────────────────────────────────────────

/// How the agent process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    /// Terminated by a signal without an exit code.
    Signaled,
    /// The user pressed Ctrl-C while the agent ran; treated as a normal return.
    Interrupted,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0) | ExitOutcome::Interrupted)
    }
}

/// Runs a launch spec in the foreground.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ExitOutcome>;
}

/// Launches real child processes with the terminal attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ExitOutcome> {
        let env = build_environment(&inherited_environment(), &spec.env_overlay);

        info!("Launching {:?} {}", spec.executable, spec.args.join(" "));
        let mut command = tokio::process::Command::new(&spec.executable);
        command.args(&spec.args).env_clear().envs(&env);

        // The child is in our foreground group and gets the same interrupt;
        // bridge only has to outlive it. Restored when the guard drops.
        #[cfg(unix)]
        let guard = interrupt::InterruptGuard::install()?;

        let mut child = command.spawn()?;
        let status = child.wait().await?;

        #[cfg(unix)]
        let interrupted = guard.interrupted();
        #[cfg(not(unix))]
        let interrupted = false;

        let outcome = if interrupted {
            debug!("Interrupt while agent running");
            ExitOutcome::Interrupted
        } else {
            match status.code() {
                Some(code) => ExitOutcome::Exited(code),
                None => ExitOutcome::Signaled,
            }
        };
        debug!("Agent finished: {:?}", outcome);
        Ok(outcome)
    }
}

#[cfg(unix)]
mod interrupt {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);

    extern "C" fn record_interrupt(_signal: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    /// Routes SIGINT to a flag while alive, then puts the previous action back.
    pub(super) struct InterruptGuard {
        previous: libc::sigaction,
    }

    impl InterruptGuard {
        pub(super) fn install() -> io::Result<Self> {
            INTERRUPTED.store(false, Ordering::SeqCst);

            // SAFETY: both structs are fully initialized before the call, and
            // the handler only touches an atomic.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction =
                    record_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);

                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(libc::SIGINT, &action, &mut previous) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(Self { previous })
            }
        }

        pub(super) fn interrupted(&self) -> bool {
            INTERRUPTED.load(Ordering::SeqCst)
        }
    }

    impl Drop for InterruptGuard {
        fn drop(&mut self) {
            // SAFETY: `previous` was filled in by the kernel in `install`.
            unsafe {
                libc::sigaction(libc::SIGINT, &self.previous, std::ptr::null_mut());
            }
        }
    }
}
