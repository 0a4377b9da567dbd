// LLM 适配：OpenAI 兼容的 Chat Completions 调用，未配置密钥时走确定性 Mock 回复。
use crate::config::LlmConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_S: u64 = 30;
// Mock 回复只截取用户输入前 100 个字符，保证可复现。
const MOCK_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(http: Client, config: LlmConfig) -> Self {
        Self { http, config }
    }

    pub async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        if !is_llm_configured(&self.config) {
            return Ok(mock_reply(messages));
        }
        let timeout = self.config.timeout_s.unwrap_or(DEFAULT_TIMEOUT_S);
        let response = self
            .http
            .post(self.endpoint())
            .headers(self.headers())
            .timeout(Duration::from_secs(timeout))
            .json(&self.build_payload(messages, temperature))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(anyhow!("模型请求失败: {status} {body}"));
        }
        let content = body
            .get("choices")
            .and_then(|value| value.get(0))
            .and_then(|value| value.get("message"))
            .and_then(|value| value.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Ok(content)
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base = base.trim_end_matches('/').to_string();
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                let value = format!("Bearer {api_key}");
                if let Ok(header_value) = value.parse() {
                    headers.insert(reqwest::header::AUTHORIZATION, header_value);
                }
            }
        }
        headers
    }

    fn build_payload(&self, messages: &[ChatMessage], temperature: f32) -> Value {
        json!({
            "model": self.config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            "messages": messages,
            "temperature": temperature,
        })
    }
}

pub fn build_llm_client(config: &LlmConfig, http: Client) -> LlmClient {
    LlmClient::new(http, config.clone())
}

// 仅以凭据判定：base_url 和 model 都有默认值，密钥缺失即进入 Mock 模式。
pub fn is_llm_configured(config: &LlmConfig) -> bool {
    config
        .api_key
        .as_ref()
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

fn mock_reply(messages: &[ChatMessage]) -> String {
    let prompt = messages
        .iter()
        .filter(|message| message.role == "user")
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let prefix: String = prompt.chars().take(MOCK_PREFIX_CHARS).collect();
    format!("[MOCK AI] Based on your input: {prefix}...")
}
