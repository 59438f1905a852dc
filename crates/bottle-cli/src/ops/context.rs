//! Shared command context.

use bottle_core::{CommandRunner, ResolverRegistry, Settings, SystemRunner};
use std::fmt;
use std::sync::Arc;

/// State shared by the operations of one command.
#[derive(Clone)]
pub struct Context {
    pub settings: Settings,
    pub client: reqwest::Client,
    pub runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context running real processes and a discovery client identifying as bottle.
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(bottle_core::USER_AGENT)
            .build()?;
        Ok(Self::with_runner(settings, client, Arc::new(SystemRunner)))
    }

    pub fn with_runner(
        settings: Settings,
        client: reqwest::Client,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            settings,
            client,
            runner,
        }
    }

    /// A fresh resolver registry; its git locks live for one build.
    pub fn registry(&self) -> ResolverRegistry {
        ResolverRegistry::builtin(Arc::clone(&self.runner), self.client.clone(), &self.settings)
    }
}
