use crate::config::AppConfig;
use crate::llm::{ChatBackend, OpenAiBackend};
use crate::nutrition::estimator::MealEstimator;
use crate::nutrition::orchestrator::ToolDispatchOrchestrator;
use crate::nutrition::repo::{NutritionRepo, PlaceholderRepo};
use crate::nutrition::tools::ToolRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Arc<dyn NutritionRepo>,
    pub orchestrator: Arc<ToolDispatchOrchestrator>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        // One HTTP client for the whole process
        let backend = Arc::new(OpenAiBackend::new(config.llm.clone())?) as Arc<dyn ChatBackend>;
        let repo = Arc::new(PlaceholderRepo) as Arc<dyn NutritionRepo>;

        Ok(Self::from_parts(config, backend, repo))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        backend: Arc<dyn ChatBackend>,
        repo: Arc<dyn NutritionRepo>,
    ) -> Self {
        let model = config.llm.model.clone();
        let tools = ToolRegistry::new(MealEstimator::new(backend.clone(), model.clone()));
        let orchestrator = Arc::new(ToolDispatchOrchestrator::new(backend, model, tools));
        Self {
            config,
            repo,
            orchestrator,
        }
    }

    #[cfg(test)]
    pub fn fake(backend: Arc<dyn ChatBackend>) -> Self {
        use crate::config::LlmConfig;

        let config = Arc::new(AppConfig {
            llm: LlmConfig {
                api_key: "test".into(),
                organization: None,
                base_url: "http://fake.local/v1".into(),
                model: "gpt-test".into(),
                timeout_secs: 5,
                max_retries: 0,
            },
        });
        Self::from_parts(config, backend, Arc::new(PlaceholderRepo))
    }
}
