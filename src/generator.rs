//! 読み候補生成モジュール
//!
//! 辞書読み（あれば1位）と生成バックエンドのサンプルを組み合わせ、
//! 重複除去済みの順位付き候補リストを作る。
//!
//! 温度は低→高の2段階で問い合わせる。低温の少数サンプルが
//! 合議的な読みを先頭付近に寄せ、高温の多数サンプルが揺れを拾う。

use crate::backend::{call_with_backoff, GenerativeBackend, RetryPolicy};
use crate::dictionary::DictionaryAdapter;
use crate::normalizer::{normalize, normalize_strict};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 1温度あたりの生成設定
#[derive(Debug, Clone, Copy)]
pub struct GenPhase {
    pub temperature: f64,
    pub samples: usize,
}

/// 候補生成の設定
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// 低温→高温の順に問い合わせる
    pub phases: Vec<GenPhase>,
    /// 候補リストの上限（辞書候補を含む）
    pub max_candidates: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            phases: vec![
                GenPhase {
                    temperature: 0.0,
                    samples: 3,
                },
                GenPhase {
                    temperature: 0.7,
                    samples: 5,
                },
            ],
            max_candidates: 9,
        }
    }
}

/// 候補リストの1エントリ
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 正規化済みの読み（表示用）
    pub reading: String,
    /// 厳密正規化キー（同値判定・重複除去用）
    pub key: String,
    /// 辞書由来かどうか
    pub from_dictionary: bool,
}

/// 1つの名前に対する候補生成の結果
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// 順位付き候補（辞書候補があれば常に先頭）
    pub candidates: Vec<Candidate>,
    /// 辞書が返した読み（そのまま）
    pub dictionary_reading: Option<String>,
}

/// 名前→候補リストの生成器
///
/// 結果は名前単位でメモ化される（上限なし、プロセス生存期間）。
pub struct CandidateGenerator {
    dictionary: Arc<DictionaryAdapter>,
    backend: Arc<dyn GenerativeBackend>,
    config: GeneratorConfig,
    retry: RetryPolicy,
    memo: Mutex<HashMap<String, CandidateSet>>,
}

impl CandidateGenerator {
    pub fn new(
        dictionary: Arc<DictionaryAdapter>,
        backend: Arc<dyn GenerativeBackend>,
        config: GeneratorConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            dictionary,
            backend,
            config,
            retry,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// 名前の候補リストを生成する
    ///
    /// バックエンドがリトライ後も失敗した場合は、その時点までに
    /// 集まった候補（辞書のみ、あるいは空）を返す。失敗はしない。
    pub async fn generate(&self, name: &str) -> CandidateSet {
        if let Some(cached) = self.memo.lock().unwrap().get(name) {
            return cached.clone();
        }

        let set = self.generate_uncached(name).await;
        self.memo
            .lock()
            .unwrap()
            .insert(name.to_string(), set.clone());
        set
    }

    async fn generate_uncached(&self, name: &str) -> CandidateSet {
        let mut set = CandidateSet::default();

        // 辞書読みがあれば常に1位
        if let Some(reading) = self.dictionary.reading_for(name) {
            let normalized = normalize(&reading);
            set.candidates.push(Candidate {
                key: normalize_strict(&normalized),
                reading: normalized,
                from_dictionary: true,
            });
            set.dictionary_reading = Some(reading);
        }

        let prompt = build_prompt(name);

        for phase in &self.config.phases {
            if set.candidates.len() >= self.config.max_candidates {
                break;
            }

            let texts = match call_with_backoff(
                self.backend.clone(),
                &self.retry,
                &prompt,
                phase.temperature,
                phase.samples,
            )
            .await
            {
                Ok(texts) => texts,
                Err(e) => {
                    // 集まった分だけで続行する
                    warn!(name, error = %e, "生成失敗、収集済み候補のみで続行");
                    break;
                }
            };

            for text in texts {
                if set.candidates.len() >= self.config.max_candidates {
                    break;
                }
                let reading = normalize(&extract_reading(&text));
                if reading.is_empty() {
                    continue;
                }
                let key = normalize_strict(&reading);
                if set.candidates.iter().any(|c| c.key == key) {
                    continue;
                }
                set.candidates.push(Candidate {
                    reading,
                    key,
                    from_dictionary: false,
                });
            }
        }

        debug!(name, count = set.candidates.len(), "候補生成完了");
        set
    }
}

/// 生成プロンプトを組み立てる
pub fn build_prompt(name: &str) -> String {
    format!("{name} の読みをカタカナで答えて")
}

/// バックエンドの応答テキストから読み部分を取り出す
///
/// 最長のかな・かな数字連続区間を採用し、前後の説明文を捨てる。
/// 区間が見つからない場合は空白を除いた原文をそのまま返す。
pub fn extract_reading(text: &str) -> String {
    lazy_static! {
        // カタカナ（全角・半角）とかな数字のみ。ひらがなを含めると
        // 「〜の読みはタロウです」の説明文が最長区間になってしまう
        static ref KANA_RUN: Regex =
            Regex::new(r"[ァ-ヺヽヾーｦ-ﾟ0-9０-９]+").unwrap();
    }

    KANA_RUN
        .find_iter(text)
        .max_by_key(|m| m.as_str().chars().count())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| text.split_whitespace().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::dictionary::DictionaryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDictionary {
        reading: Option<&'static str>,
    }

    impl DictionaryBackend for StubDictionary {
        fn reading_for(&self, _name: &str) -> Option<String> {
            self.reading.map(|r| r.to_string())
        }
    }

    struct StubBackend {
        calls: AtomicUsize,
        responses: Vec<Vec<&'static str>>,
    }

    impl GenerativeBackend for StubBackend {
        fn complete(
            &self,
            _prompt: &str,
            _temperature: f64,
            _n: usize,
        ) -> Result<Vec<String>, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(call) {
                Some(texts) => Ok(texts.iter().map(|t| t.to_string()).collect()),
                None => Err(BackendError::Transient("応答なし".into())),
            }
        }
    }

    fn make_generator(
        dict: Option<&'static str>,
        responses: Vec<Vec<&'static str>>,
        max_candidates: usize,
    ) -> CandidateGenerator {
        let dictionary = Arc::new(DictionaryAdapter::new(Arc::new(StubDictionary {
            reading: dict,
        })));
        let backend = Arc::new(StubBackend {
            calls: AtomicUsize::new(0),
            responses,
        });
        CandidateGenerator::new(
            dictionary,
            backend,
            GeneratorConfig {
                max_candidates,
                ..Default::default()
            },
            RetryPolicy {
                max_attempts: 0,
                base_delay: std::time::Duration::from_millis(1),
                multiplier: 2,
            },
        )
    }

    #[test]
    fn test_extract_reading_plain() {
        assert_eq!(extract_reading("タロウ"), "タロウ");
    }

    #[test]
    fn test_extract_reading_with_prose() {
        assert_eq!(
            extract_reading("「太郎」の読みはタロウです"),
            "タロウ"
        );
    }

    #[test]
    fn test_extract_reading_longest_run_wins() {
        assert_eq!(extract_reading("読み: ミチ または ミチコ"), "ミチコ");
    }

    #[test]
    fn test_extract_reading_digits_mixed() {
        assert_eq!(extract_reading("ジョン3セイ と読みます"), "ジョン3セイ");
    }

    #[test]
    fn test_extract_reading_no_kana_falls_back() {
        assert_eq!(extract_reading("I don't know"), "Idon'tknow");
    }

    #[tokio::test]
    async fn test_dictionary_candidate_first() {
        let gen = make_generator(
            Some("タロウ"),
            vec![vec!["ジロウ"], vec!["サブロウ"]],
            9,
        );
        let set = gen.generate("太郎").await;

        assert_eq!(set.dictionary_reading.as_deref(), Some("タロウ"));
        assert!(set.candidates[0].from_dictionary);
        assert_eq!(set.candidates[0].reading, "タロウ");
        assert_eq!(set.candidates[1].reading, "ジロウ");
        assert_eq!(set.candidates[2].reading, "サブロウ");
    }

    #[tokio::test]
    async fn test_dedup_by_strict_key() {
        // 半角・拗音違いは同一候補として畳まれる
        let gen = make_generator(
            None,
            vec![vec!["キョウコ", "ｷﾖｳｺ", "キヨウコ"], vec!["キョウコ"]],
            9,
        );
        let set = gen.generate("京子").await;

        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].reading, "キョウコ");
    }

    #[tokio::test]
    async fn test_cap_respected() {
        let gen = make_generator(
            Some("ア"),
            vec![vec!["イ", "ウ", "エ"], vec!["オ", "カ", "キ", "ク", "ケ", "コ"]],
            5,
        );
        let set = gen.generate("某").await;

        assert_eq!(set.candidates.len(), 5);
        assert!(set.candidates[0].from_dictionary);
    }

    #[tokio::test]
    async fn test_backend_failure_returns_partial() {
        // 1段階目は成功、2段階目で失敗 → 集まった分を返す
        let gen = make_generator(Some("タロウ"), vec![vec!["ジロウ"]], 9);
        let set = gen.generate("太郎").await;

        assert_eq!(set.candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_dictionary_only() {
        let gen = make_generator(Some("タロウ"), vec![], 9);
        let set = gen.generate("太郎").await;

        assert_eq!(set.candidates.len(), 1);
        assert!(set.candidates[0].from_dictionary);
    }

    #[tokio::test]
    async fn test_memoized_per_name() {
        let dictionary = Arc::new(DictionaryAdapter::new(Arc::new(StubDictionary {
            reading: None,
        })));
        let backend = Arc::new(StubBackend {
            calls: AtomicUsize::new(0),
            responses: vec![vec!["ミチ"], vec!["ミチョ"]],
        });
        let gen = CandidateGenerator::new(
            dictionary,
            backend.clone(),
            GeneratorConfig::default(),
            RetryPolicy {
                max_attempts: 0,
                base_delay: std::time::Duration::from_millis(1),
                multiplier: 2,
            },
        );

        let first = gen.generate("未知").await;
        let second = gen.generate("未知").await;

        assert_eq!(first.candidates.len(), second.candidates.len());
        // 2温度×1回のみ。2回目の generate は呼ばない
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }
}
