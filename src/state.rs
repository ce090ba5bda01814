use std::sync::Arc;
use std::time::Instant;

use crate::config::ForgeConfig;
use crate::generator::MediaGenerator;
use crate::pipelines::ModelRegistry;
use crate::session::SessionStore;
use crate::translation::{Translate, Translator};

pub struct ForgeState {
    pub generator: MediaGenerator,
    pub started: Instant,
}

impl ForgeState {
    /// Production wiring: HTTP translator and lazily loaded pipelines.
    pub fn new(config: Arc<ForgeConfig>) -> Self {
        let translator: Arc<dyn Translate> = Arc::new(Translator::new(&config.translate_url));
        let registry = Arc::new(ModelRegistry::new(config.clone()));
        Self::with_parts(config, translator, registry)
    }

    pub fn with_parts(
        config: Arc<ForgeConfig>,
        translator: Arc<dyn Translate>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        Self {
            generator: MediaGenerator::new(config, translator, registry, sessions),
            started: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        self.generator.sessions()
    }
}
