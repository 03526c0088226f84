//! Backend readiness orchestration.
//!
//! Ties the probe, configuration store, remediator and dispatcher into the
//! two operations the menu needs: `survey` the current state, and `select`
//! a mode.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐   ┌─────────────┐
//! │ Probe        │   │ Mode         │   │ Remediator      │   │ Dispatcher  │
//! │ (internet,   │→→│ availability │→→│ (Local only:    │→→│ (resolve,   │
//! │  service)    │   │ + default    │   │  service, model)│   │  env, run)  │
//! └──────────────┘   └──────────────┘   └─────────────────┘   └─────────────┘
//!        ↑                  ↑
//!        └── ConfigStore ───┘
//! ```
//!
//! Every failure below `select` is reported as a [`SelectOutcome`] and the
//! caller goes back to the menu. Only a missing agent binary is an `Err`.

use std::time::Duration;
use tracing::{debug, info};

use crate::dispatch::{
    DEFAULT_AGENT_BINARY, ExecutableResolver, ExitOutcome, LaunchSpec, Launcher, ProcessLauncher,
};
use crate::error::{FailureReason, Result};
use crate::mode::{BackendMode, StatusSnapshot};
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Endpoint, Probe, TcpProbe};
use crate::readiness::{
    CommandRunner, LocalBackend, PollPolicy, ReadinessObserver, ReadinessState, Remediator,
    SystemRunner,
};
use crate::store::{ConfigSnapshot, ConfigStore};

/// Tunables for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Target used to decide whether the internet is reachable.
    pub internet: Endpoint,
    pub probe_timeout: Duration,
    pub backend: LocalBackend,
    pub poll: PollPolicy,
    pub agent_binary: String,
    /// Appended after the fixed agent flags.
    pub agent_args: Vec<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            internet: Endpoint::internet(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            backend: LocalBackend::default(),
            poll: PollPolicy::default(),
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
            agent_args: Vec::new(),
        }
    }
}

/// Result of selecting a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The mode cannot launch right now; nothing happened.
    Unavailable(BackendMode),
    /// Local readiness could not be established; nothing was launched.
    RemediationFailed(FailureReason),
    /// The agent ran and has exited.
    Finished(ExitOutcome),
}

/// Session-scoped orchestrator.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    store: Box<dyn ConfigStore>,
    probe: Box<dyn Probe>,
    runner: Box<dyn CommandRunner>,
    launcher: Box<dyn Launcher>,
    resolver: ExecutableResolver,
    /// Local model confirmed ready during this session.
    confirmed_local: Option<String>,
}

impl Orchestrator {
    /// Orchestrator wired to real sockets and processes.
    pub fn new(settings: OrchestratorSettings, store: Box<dyn ConfigStore>) -> Self {
        Self {
            settings,
            store,
            probe: Box::new(TcpProbe),
            runner: Box::new(SystemRunner),
            launcher: Box::new(ProcessLauncher),
            resolver: ExecutableResolver::from_env(),
            confirmed_local: None,
        }
    }

    pub fn with_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn with_resolver(mut self, resolver: ExecutableResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ConfigStore {
        self.store.as_mut()
    }

    pub fn resolver(&self) -> &ExecutableResolver {
        &self.resolver
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Probe both dependencies and read the configuration snapshot.
    pub async fn survey(&self) -> Result<StatusSnapshot> {
        let timeout = self.settings.probe_timeout;
        let internet_up = self.probe.reachable(&self.settings.internet, timeout).await;
        let local_service_up = self
            .probe
            .reachable(&self.settings.backend.endpoint(), timeout)
            .await;
        let config = self.store.snapshot()?;

        debug!(
            "Survey: internet={} service={} credential={}",
            internet_up,
            local_service_up,
            config.has_credential()
        );
        Ok(StatusSnapshot::new(internet_up, local_service_up, config))
    }

    /// Bring the local service and `model` to `Ready`.
    ///
    /// Skipped when `model` was already confirmed this session.
    pub async fn prepare_local(
        &mut self,
        model: &str,
        observer: &dyn ReadinessObserver,
    ) -> ReadinessState {
        if self.confirmed_local.as_deref() == Some(model) {
            debug!("Local model {} already confirmed this session", model);
            return ReadinessState::Ready;
        }

        let dependencies = self.settings.backend.dependencies(model);
        let state = Remediator::new(self.probe.as_ref(), self.runner.as_ref())
            .with_policy(self.settings.poll)
            .with_probe_timeout(self.settings.probe_timeout)
            .with_observer(observer)
            .ensure_all(&dependencies)
            .await;

        if state.is_ready() {
            self.confirmed_local = Some(model.to_string());
        }
        state
    }

    /// Resolve the agent and build its invocation for `mode`.
    pub fn launch_spec(&self, mode: BackendMode, config: &ConfigSnapshot) -> Result<LaunchSpec> {
        let executable = self.resolver.resolve(&self.settings.agent_binary)?;
        Ok(LaunchSpec::for_mode(
            executable,
            mode,
            config,
            &self.settings.agent_args,
        ))
    }

    /// Attempt one launch in `mode` against the state in `status`.
    ///
    /// Returns `Err` only for failures that no mode can recover from.
    pub async fn select(
        &mut self,
        mode: BackendMode,
        status: &StatusSnapshot,
        observer: &dyn ReadinessObserver,
    ) -> Result<SelectOutcome> {
        if !status.availability.is_selectable(mode) {
            debug!("{} selected but unavailable", mode);
            return Ok(SelectOutcome::Unavailable(mode));
        }

        if mode == BackendMode::Local {
            let model = status.config.local_model.clone();
            if let ReadinessState::Failed(reason) = self.prepare_local(&model, observer).await {
                return Ok(SelectOutcome::RemediationFailed(reason));
            }
        }

        let spec = self.launch_spec(mode, &status.config)?;
        info!("Handing off to {:?} in {} mode", spec.executable, mode);
        let outcome = self.launcher.launch(&spec).await?;
        Ok(SelectOutcome::Finished(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{KEY_API_KEY, KEY_LOCAL_MODEL, MemoryStore};
    use crate::readiness::CommandSpec;
    use crate::testing::{
        FakeRunner, RecordingLauncher, RecordingObserver, ScriptedProbe, SplitProbe,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Launcher handle shared between the test and the orchestrator.
    #[derive(Default, Clone)]
    struct SharedLauncher(Arc<RecordingLauncher>);

    #[async_trait::async_trait]
    impl Launcher for SharedLauncher {
        async fn launch(&self, spec: &LaunchSpec) -> Result<ExitOutcome> {
            self.0.launch(spec).await
        }
    }

    /// Runner handle shared between the test and the orchestrator.
    #[derive(Clone)]
    struct SharedRunner(Arc<FakeRunner>);

    #[async_trait::async_trait]
    impl CommandRunner for SharedRunner {
        fn spawn_detached(&self, command: &CommandSpec) -> std::io::Result<u32> {
            self.0.spawn_detached(command)
        }

        async fn capture_stdout(&self, command: &CommandSpec) -> std::io::Result<String> {
            self.0.capture_stdout(command).await
        }

        async fn run(&self, command: &CommandSpec) -> std::io::Result<Option<i32>> {
            self.0.run(command).await
        }
    }

    #[cfg(unix)]
    fn agent_dir() -> TempDir {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_AGENT_BINARY);
        std::fs::write(&path, "#!/bin/sh\n").expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("perms");
        dir
    }

    #[cfg(unix)]
    fn resolver_for(dir: &TempDir) -> ExecutableResolver {
        ExecutableResolver::new(Some(dir.path().to_path_buf()), None)
    }

    fn store_with_key() -> MemoryStore {
        MemoryStore::with_values(&[(KEY_API_KEY, "secret"), (KEY_LOCAL_MODEL, "ollama/x")])
    }

    #[tokio::test]
    async fn test_survey_reflects_probes_and_store() {
        let orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(SplitProbe {
                    internet_up: true,
                    local_up: false,
                });

        let status = orchestrator.survey().await.expect("survey");
        assert!(status.internet_up);
        assert!(!status.local_service_up);
        assert!(status.availability.cloud_available);
        assert!(status.availability.local_needs_auto_start);
        assert_eq!(status.availability.default_mode(), BackendMode::Cloud);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cloud_unavailable_offline_is_noop() {
        let dir = agent_dir();
        let launcher = SharedLauncher::default();
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(SplitProbe {
                    internet_up: false,
                    local_up: true,
                })
                .with_launcher(launcher.clone())
                .with_resolver(resolver_for(&dir));

        let status = orchestrator.survey().await.expect("survey");
        let outcome = orchestrator
            .select(BackendMode::Cloud, &status, &RecordingObserver::default())
            .await
            .expect("select");

        assert_eq!(outcome, SelectOutcome::Unavailable(BackendMode::Cloud));
        assert!(launcher.0.launched().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cloud_launch_injects_credential() {
        let dir = agent_dir();
        let launcher = SharedLauncher::default();
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(SplitProbe {
                    internet_up: true,
                    local_up: false,
                })
                .with_launcher(launcher.clone())
                .with_resolver(resolver_for(&dir));

        let status = orchestrator.survey().await.expect("survey");
        let outcome = orchestrator
            .select(BackendMode::Cloud, &status, &RecordingObserver::default())
            .await
            .expect("select");

        assert_eq!(outcome, SelectOutcome::Finished(ExitOutcome::Exited(0)));
        let launched = launcher.0.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].executable, dir.path().join(DEFAULT_AGENT_BINARY));
        assert_eq!(
            launched[0].env_overlay.get(KEY_API_KEY).map(String::as_str),
            Some("secret")
        );
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_local_remediated_on_third_poll_then_launches() {
        let dir = agent_dir();
        let launcher = SharedLauncher::default();
        let runner = SharedRunner(Arc::new(FakeRunner::with_listing("x:latest  abc  1 GB\n")));
        // Survey probes internet and service (2 calls), then the remediator's
        // CHECK and two polls fail before the third poll succeeds.
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(ScriptedProbe::up_after(5))
                .with_runner(runner.clone())
                .with_launcher(launcher.clone())
                .with_resolver(resolver_for(&dir));

        let status = orchestrator.survey().await.expect("survey");
        assert!(status.availability.local_needs_auto_start);

        let start = tokio::time::Instant::now();
        let outcome = orchestrator
            .select(BackendMode::Local, &status, &RecordingObserver::default())
            .await
            .expect("select");

        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert_eq!(outcome, SelectOutcome::Finished(ExitOutcome::Exited(0)));
        assert_eq!(
            runner.0.calls(),
            vec!["spawn ollama serve".to_string(), "capture ollama list".to_string()]
        );
        let launched = launcher.0.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].model(), Some("ollama/x"));
        assert!(launched[0].env_overlay.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_fetch_returns_to_menu_without_launch() {
        let dir = agent_dir();
        let launcher = SharedLauncher::default();
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(ScriptedProbe::always_up())
                .with_runner(
                    FakeRunner::with_listing("other-model  def  2 GB\n").pull_exit(Some(1)),
                )
                .with_launcher(launcher.clone())
                .with_resolver(resolver_for(&dir));

        let status = orchestrator.survey().await.expect("survey");
        let outcome = orchestrator
            .select(BackendMode::Local, &status, &RecordingObserver::default())
            .await
            .expect("select");

        assert_eq!(
            outcome,
            SelectOutcome::RemediationFailed(FailureReason::FetchFailed)
        );
        assert!(launcher.0.launched().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_readiness_confirmed_once_per_session() {
        let dir = agent_dir();
        let runner = SharedRunner(Arc::new(FakeRunner::with_listing("x  abc  1 GB\n")));
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(ScriptedProbe::always_up())
                .with_runner(runner.clone())
                .with_launcher(SharedLauncher::default())
                .with_resolver(resolver_for(&dir));

        let status = orchestrator.survey().await.expect("survey");
        let observer = RecordingObserver::default();
        orchestrator
            .select(BackendMode::Local, &status, &observer)
            .await
            .expect("first select");
        orchestrator
            .select(BackendMode::Local, &status, &observer)
            .await
            .expect("second select");

        assert_eq!(runner.0.calls(), vec!["capture ollama list".to_string()]);

        // A different model is checked again.
        orchestrator
            .store_mut()
            .set(KEY_LOCAL_MODEL, "ollama/y")
            .expect("set");
        let status = orchestrator.survey().await.expect("survey");
        orchestrator
            .select(BackendMode::Local, &status, &observer)
            .await
            .expect("third select");
        assert_eq!(runner.0.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_agent_is_fatal() {
        let empty_colocated = tempfile::tempdir().expect("tempdir");
        let empty_path = tempfile::tempdir().expect("tempdir");
        let launcher = SharedLauncher::default();
        let mut orchestrator =
            Orchestrator::new(OrchestratorSettings::default(), Box::new(store_with_key()))
                .with_probe(SplitProbe {
                    internet_up: true,
                    local_up: true,
                })
                .with_launcher(launcher.clone())
                .with_resolver(ExecutableResolver::new(
                    Some(empty_colocated.path().to_path_buf()),
                    Some(empty_path.path().as_os_str().to_os_string()),
                ));

        let status = orchestrator.survey().await.expect("survey");
        let err = orchestrator
            .select(BackendMode::Cloud, &status, &RecordingObserver::default())
            .await
            .expect_err("agent is missing");

        assert!(err.is_fatal());
        assert!(matches!(
            err,
            Error::ExecutableNotFound { ref searched, .. } if searched.len() == 2
        ));
        assert!(launcher.0.launched().is_empty());
    }
}
