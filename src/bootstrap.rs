//! # Analyzer Bootstrap Module
//!
//! Wires the catalog, store, Discord collector and LLM client together,
//! starts the harvest worker and serves the HTTP API until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::application::{AnalysisService, HarvestWorker, LlmService};
use crate::core::catalog::Catalog;
use crate::core::collector::Collector;
use crate::core::config::AppConfig;
use crate::core::store::Store;
use crate::core::tokens::TokenEstimator;
use crate::infrastructure::discord::DiscordClient;
use crate::infrastructure::llm::ChatCompletionClient;
use crate::infrastructure::logger::Sanitizer;
use crate::infrastructure::store::SqliteStore;
use crate::infrastructure::tokenizer::HubTokenizers;
use crate::infrastructure::web::{start_web_server, AppState};

/// Service launcher
pub struct Launcher {
    config: AppConfig,
}

impl Launcher {
    pub fn with_config(config: AppConfig) -> Self {
        Self { config }
    }

    /// Build shared state from configuration
    ///
    /// Blocks while tokenizers are downloaded
    pub fn build_state(&self) -> Result<Arc<AppState>> {
        let cfg = &self.config;

        info!(
            models = %cfg.llm_models_path,
            prompts = %cfg.prompt_models_path,
            "📋 Loading model catalog"
        );
        let catalog = Arc::new(Catalog::load(&cfg.llm_models_path, &cfg.prompt_models_path)?);

        info!(db = %cfg.db_path, "💾 Opening document store");
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&cfg.db_path)?);

        info!(
            api = %cfg.discord_api_base,
            token = %Sanitizer::bot_token(&cfg.discord_bot_token),
            "🔌 Discord collector configured"
        );
        let collector: Arc<dyn Collector> = Arc::new(DiscordClient::new(
            cfg.discord_api_base.clone(),
            cfg.discord_bot_token.clone(),
        ));

        let backend = Arc::new(ChatCompletionClient::new(
            cfg.llm_endpoint.clone(),
            cfg.llm_access_token.clone(),
            Duration::from_secs(cfg.llm_timeout_secs),
        )?);
        let tokens = TokenEstimator::with_source(Arc::new(HubTokenizers));
        let loaded = tokens.preload(catalog.model_names());
        info!(tokenizers = loaded, "🔤 Tokenizers ready");
        let llm = LlmService::new(catalog, Arc::new(tokens), backend);

        Ok(Arc::new(AppState {
            analysis: AnalysisService::new(store.clone(), llm),
            store,
            collector,
        }))
    }

    /// Start the worker and web server; returns after Ctrl+C
    pub async fn launch(&self) -> Result<()> {
        info!("🚀 Launching analyzer...");
        let state = tokio::task::block_in_place(|| self.build_state())?;

        let worker = if self.config.run_harvest_worker {
            let worker = HarvestWorker::new(
                state.store.clone(),
                state.collector.clone(),
                Duration::from_secs(self.config.harvest_poll_secs),
            );
            Some(tokio::spawn(worker.run()))
        } else {
            info!("⏸️  Harvest worker disabled by configuration");
            None
        };

        info!("🌐 Starting web server on {}", self.config.bind_addr);
        let served = start_web_server(&self.config.bind_addr, state, shutdown_signal()).await;

        if let Some(handle) = worker {
            handle.abort();
        }
        served
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Received shutdown signal"),
        Err(e) => {
            error!("Failed to listen for ctrl+c: {}", e);
            warn!("Server will run until the process is killed");
            std::future::pending::<()>().await;
        }
    }
}
