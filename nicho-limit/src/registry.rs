use std::sync::Arc;

use tracing::info;

use crate::FixedWindow;
use crate::LimitsConfig;
use crate::Strategy;

/// The named limiters of the site, each with its own independent store.
///
/// Built once by the application's composition root and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Limiters {
    login: Arc<FixedWindow>,
    contact: Arc<FixedWindow>,
    api: Arc<FixedWindow>,
    content: Arc<FixedWindow>,
}

impl Limiters {
    pub fn from_config(config: &LimitsConfig) -> Self {
        let limiters = Self {
            login: Arc::new(config.login.build("login")),
            contact: Arc::new(config.contact.build("contact")),
            api: Arc::new(config.api.build("api")),
            content: Arc::new(config.content.build("content")),
        };
        for limiter in limiters.iter() {
            info!(
                limiter = limiter.name(),
                max_requests = limiter.limit(),
                window_ms = limiter.window().as_millis() as u64,
                "Rate limiter configured"
            );
        }
        limiters
    }

    pub fn login(&self) -> Arc<FixedWindow> {
        Arc::clone(&self.login)
    }

    pub fn contact(&self) -> Arc<FixedWindow> {
        Arc::clone(&self.contact)
    }

    pub fn api(&self) -> Arc<FixedWindow> {
        Arc::clone(&self.api)
    }

    pub fn content(&self) -> Arc<FixedWindow> {
        Arc::clone(&self.content)
    }

    /// Looks a limiter up by its name.
    pub fn get(&self, name: &str) -> Option<Arc<FixedWindow>> {
        self.iter()
            .find(|limiter| limiter.name() == name)
            .map(Arc::clone)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FixedWindow>> {
        [&self.login, &self.contact, &self.api, &self.content].into_iter()
    }

    /// Sweeps every limiter, returning the total number of evicted keys.
    pub fn cleanup_all(&self, now: u64) -> usize {
        self.iter().map(|limiter| limiter.cleanup(now)).sum()
    }
}

impl Default for Limiters {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}
