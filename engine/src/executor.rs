//! Where fire-and-forget chains run, and the engine-wide configuration that
//! carries it.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use stateful_config::{ChainSettings, ConfigError};

/// Spawns detached tasks.
pub trait Executor: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawns onto the ambient tokio runtime.
///
/// Panics like [`tokio::spawn`] when called outside a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        drop(tokio::spawn(task));
    }
}

/// Construction-time configuration shared by every chain built from it.
#[derive(Clone)]
pub struct EngineConfig {
    executor: Arc<dyn Executor>,
    settings: ChainSettings,
}

impl EngineConfig {
    #[must_use]
    pub fn new(settings: ChainSettings) -> Self {
        Self {
            executor: Arc::new(TokioExecutor),
            settings,
        }
    }

    /// Defaults overlaid with the user's config file, when there is one.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = ChainSettings::load()?.unwrap_or_default();
        Ok(Self::new(settings))
    }

    #[must_use]
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ChainSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub(crate) fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(ChainSettings::default())
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
