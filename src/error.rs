use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuriganaError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。環境変数 OPENAI_API_KEY を設定してください")]
    MissingApiKey,

    #[error("列が見つかりません: {0}")]
    MissingColumn(String),

    #[error("バックエンド呼び出しエラー: {0}")]
    Backend(#[from] crate::backend::BackendError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("タスク実行エラー: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, FuriganaError>;
