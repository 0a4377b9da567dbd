// 全局状态：配置、存储句柄与共享 HTTP 客户端。
use crate::config::Config;
use crate::llm::{build_llm_client, LlmClient};
use crate::storage::{build_storage, StorageBackend};
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let storage = build_storage(&config.storage)?;
        // 启动时完成建表，首个请求不再承担初始化开销。
        storage.ensure_initialized()?;
        Ok(Self {
            config,
            storage,
            http: reqwest::Client::new(),
        })
    }

    pub fn llm_client(&self) -> LlmClient {
        build_llm_client(&self.config.llm, self.http.clone())
    }
}
