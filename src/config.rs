use crate::error::{FuriganaError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// キャッシュファイルの場所を指定する環境変数
pub const CACHE_ENV_VAR: &str = "FURIGANA_CACHE";

/// キャッシュファイルのデフォルトパス
pub const DEFAULT_CACHE_PATH: &str = "furigana-cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// 生成候補の上限（辞書候補を含む）
    pub max_candidates: usize,
    /// 名前の文字数上限（超過行は判定対象外）
    pub name_len_limit: usize,
    /// 一度に生成へ回すユニーク名の数
    pub chunk_size: usize,
    /// 同時に実行する生成リクエスト数の上限
    pub parallelism: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".into(),
            max_candidates: 9,
            name_len_limit: 50,
            chunk_size: 10,
            parallelism: 4,
        }
    }
}

impl CheckerConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: CheckerConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| FuriganaError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home
            .join(".config")
            .join("furigana-checker")
            .join("config.json"))
    }

    /// 環境変数を優先してAPIキーを返す
    pub fn get_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(FuriganaError::MissingApiKey)
    }

    /// キャッシュファイルのパス（環境変数 → デフォルト）
    pub fn cache_path() -> PathBuf {
        match std::env::var(CACHE_ENV_VAR) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}
