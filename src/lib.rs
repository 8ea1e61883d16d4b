//! フリガナ信頼度チェッカー
//!
//! 名前に付くカタカナ読み（フリガナ）の妥当性を
//! 辞書引きと生成バックエンドで推定し、信頼度（0–100）と
//! 理由を返すライブラリ。名簿の打鍵ミス洗い出しに使う。
//!
//! ## 処理フロー
//! 1. キャッシュ照合（(名前, フリガナ) の生ペアがキー）
//! 2. 辞書読みとの厳密正規化一致 → 信頼度100
//! 3. 生成バックエンドによる候補リスト化と順位別スコアリング

pub mod backend;
pub mod batch;
pub mod cache;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod generator;
pub mod normalizer;
pub mod scorer;

pub use backend::{BackendError, GenerativeBackend, OpenAiBackend, RetryPolicy};
pub use batch::{BatchOptions, BatchProcessor, ProcessingMode, RowStatus, Table};
pub use cache::{CacheEntry, ReadingCache};
pub use config::CheckerConfig;
pub use dictionary::{DictionaryAdapter, DictionaryBackend, SudachiCli};
pub use error::{FuriganaError, Result};
pub use generator::{Candidate, CandidateGenerator, CandidateSet, GenPhase, GeneratorConfig};
pub use normalizer::{normalize, normalize_strict, strip_voicing};
pub use scorer::score;
