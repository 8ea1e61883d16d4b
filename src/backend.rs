//! 生成バックエンド連携モジュール
//!
//! 読み候補を生成する外部バックエンドの抽象と、
//! レート制限向けの指数バックオフ付きリトライを提供する。

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// バックエンド呼び出しの失敗分類
///
/// `RateLimited` と `Transient` はリトライ対象。
/// `Malformed` はそのレスポンスを候補0件として扱う（リトライしない）。
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("レート制限: {0}")]
    RateLimited(String),

    #[error("一時的なエラー: {0}")]
    Transient(String),

    #[error("不正なレスポンス: {0}")]
    Malformed(String),

    #[error("APIキーが設定されていません")]
    MissingApiKey,
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::RateLimited(_) | BackendError::Transient(_))
    }
}

/// 読み候補を生成する外部バックエンド
///
/// `complete` は同期呼び出し。並列実行時は `spawn_blocking` 経由で呼ぶ。
pub trait GenerativeBackend: Send + Sync {
    /// プロンプトに対して `n` 件の補完テキストを返す
    fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        n: usize,
    ) -> Result<Vec<String>, BackendError>;
}

/// 指数バックオフのリトライ方針
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// バックオフ付きで試行する回数（この後に最終試行が1回ある）
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

/// バックオフ付きでバックエンドを呼び出す
///
/// リトライ対象のエラーは `max_attempts` 回まで待って再試行し、
/// 使い切ったら最後にもう一度だけ呼んでその結果をそのまま返す。
/// `Malformed` 等の非リトライエラーは即座に返す。
pub async fn call_with_backoff(
    backend: Arc<dyn GenerativeBackend>,
    policy: &RetryPolicy,
    prompt: &str,
    temperature: f64,
    n: usize,
) -> Result<Vec<String>, BackendError> {
    let mut delay = policy.base_delay;

    for attempt in 0..policy.max_attempts {
        match invoke(backend.clone(), prompt, temperature, n).await {
            Ok(texts) => return Ok(texts),
            Err(e) if e.is_retryable() => {
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "リトライ待機");
                tokio::time::sleep(delay).await;
                delay *= policy.multiplier;
            }
            Err(e) => return Err(e),
        }
    }

    // 最終試行。ここで失敗したら呼び出し側が「候補なし」に降格する
    invoke(backend, prompt, temperature, n).await
}

async fn invoke(
    backend: Arc<dyn GenerativeBackend>,
    prompt: &str,
    temperature: f64,
    n: usize,
) -> Result<Vec<String>, BackendError> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || backend.complete(&prompt, temperature, n))
        .await
        .map_err(|e| BackendError::Transient(format!("生成タスクの実行に失敗: {e}")))?
}

/// OpenAI互換のChat Completions APIバックエンド
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
}

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_url: OPENAI_API_URL.to_string(),
            api_key,
            model,
        }
    }

    /// 環境変数 `OPENAI_API_KEY` からバックエンドを構築する
    pub fn from_env(model: String) -> Result<Self, BackendError> {
        let key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(BackendError::MissingApiKey)?;
        Ok(Self::new(key, model))
    }

    /// テスト・セルフホスト向けにAPIのURLを差し替える
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }
}

impl GenerativeBackend for OpenAiBackend {
    fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        n: usize,
    ) -> Result<Vec<String>, BackendError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "n": n,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| BackendError::Transient(format!("接続エラー: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(BackendError::RateLimited(format!("status {status}")));
        }
        if status.is_server_error() {
            return Err(BackendError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(BackendError::Malformed(format!("status {status}: {text}")));
        }

        let payload: ChatResponse = response
            .json()
            .map_err(|e| BackendError::Malformed(format!("JSONデコード失敗: {e}")))?;

        let texts: Vec<String> = payload
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        debug!(count = texts.len(), temperature, "補完テキスト受信");
        Ok(texts)
    }
}
