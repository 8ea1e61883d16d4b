//! バッチ判定モジュール
//!
//! (名前, フリガナ) の行テーブルを
//! キャッシュ → 辞書一致 → 生成＋スコアリング の順で処理し、
//! confidence / reason の2列を付けて返す。
//!
//! 同じ名前の行はまとめて扱い、生成はユニーク名ごとに1回だけ行う。
//! ユニーク名は固定サイズのチャンクに分け、チャンク内は
//! セマフォで上限を掛けた並列実行（または逐次実行）で生成する。

use crate::cache::{CacheEntry, ReadingCache};
use crate::dictionary::DictionaryAdapter;
use crate::error::{FuriganaError, Result};
use crate::generator::{CandidateGenerator, CandidateSet};
use crate::normalizer::normalize_strict;
use crate::scorer::{score, REASON_TOO_LONG};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// 行指向のテーブル
///
/// 表計算レイヤーとの受け渡し形式。セルはすべて文字列。
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// 行の処理状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Pending,
    CacheHit,
    TooLong,
    DictionaryHit,
    NeedsGeneration,
}

/// 生成フェーズの実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// 名前を1件ずつ順に生成する
    Sequential,
    /// チャンク内の名前を並列に生成する（セマフォで上限あり）
    Concurrent,
}

/// バッチ処理のオプション
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: ProcessingMode,
    /// 一度に生成へ回すユニーク名の数
    pub chunk_size: usize,
    /// 同時に実行する生成リクエスト数の上限
    pub parallelism: usize,
    /// 名前の文字数上限（超過行は判定せず too long）
    pub name_len_limit: usize,
    /// 判定結果をキャッシュへ書き戻すか
    pub write_cache: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Concurrent,
            chunk_size: 10,
            parallelism: 4,
            name_len_limit: 50,
            write_cache: true,
        }
    }
}

/// 行ごとの進捗通知 (完了行数, 全行数)
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// バッチ判定の実行主体
pub struct BatchProcessor {
    dictionary: Arc<DictionaryAdapter>,
    generator: Arc<CandidateGenerator>,
    options: BatchOptions,
}

struct RowOutcome {
    confidence: u32,
    reason: String,
    status: RowStatus,
}

impl BatchProcessor {
    pub fn new(
        dictionary: Arc<DictionaryAdapter>,
        generator: Arc<CandidateGenerator>,
        options: BatchOptions,
    ) -> Self {
        Self {
            dictionary,
            generator,
            options,
        }
    }

    /// テーブルを処理して confidence / reason 列を付けて返す
    ///
    /// 指定列が存在しない場合は処理開始前にエラーを返す。
    /// 行単位の失敗は理由付きの結果に畳まれ、バッチを止めない。
    pub async fn process_table(
        &self,
        table: &Table,
        name_col: &str,
        reading_col: &str,
        mut cache: Option<&mut ReadingCache>,
        mut on_progress: Option<ProgressFn<'_>>,
    ) -> Result<Table> {
        let name_idx = table
            .column_index(name_col)
            .ok_or_else(|| FuriganaError::MissingColumn(name_col.to_string()))?;
        let reading_idx = table
            .column_index(reading_col)
            .ok_or_else(|| FuriganaError::MissingColumn(reading_col.to_string()))?;

        let total = table.rows.len();
        let mut outcomes: Vec<Option<RowOutcome>> = Vec::with_capacity(total);
        outcomes.resize_with(total, || None);
        let mut done = 0usize;

        // 名前 → その名前を持つ行番号（初出順を保持）
        let mut queued_names: Vec<String> = Vec::new();
        let mut rows_by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut dict_writes: Vec<CacheEntry> = Vec::new();

        // 1パス目: キャッシュ・辞書で確定できる行を処理する
        for (i, row) in table.rows.iter().enumerate() {
            let name = Table::cell(row, name_idx);
            let reading = Table::cell(row, reading_idx);

            if name.is_empty() || name.chars().count() > self.options.name_len_limit {
                finish(
                    &mut outcomes,
                    &mut done,
                    total,
                    &mut on_progress,
                    i,
                    RowOutcome {
                        confidence: 0,
                        reason: REASON_TOO_LONG.to_string(),
                        status: RowStatus::TooLong,
                    },
                );
                continue;
            }

            if let Some((confidence, reason)) = cache.as_ref().and_then(|c| c.get(name, reading))
            {
                finish(
                    &mut outcomes,
                    &mut done,
                    total,
                    &mut on_progress,
                    i,
                    RowOutcome {
                        confidence,
                        reason,
                        status: RowStatus::CacheHit,
                    },
                );
                continue;
            }

            let dict_reading = self.dictionary.reading_for(name);
            if let Some(dict) = dict_reading.as_deref() {
                let target_key = normalize_strict(reading);
                if !target_key.is_empty() && normalize_strict(dict) == target_key {
                    let (confidence, reason) = score(reading, &[], Some(dict));
                    if self.options.write_cache {
                        dict_writes.push(CacheEntry {
                            name: name.to_string(),
                            reading: reading.to_string(),
                            confidence,
                            reason: reason.clone(),
                        });
                    }
                    finish(
                        &mut outcomes,
                        &mut done,
                        total,
                        &mut on_progress,
                        i,
                        RowOutcome {
                            confidence,
                            reason,
                            status: RowStatus::DictionaryHit,
                        },
                    );
                    continue;
                }
            }

            // 生成待ちに積む。同名の行は1回の生成を共有する
            let rows = rows_by_name.entry(name.to_string()).or_default();
            if rows.is_empty() {
                queued_names.push(name.to_string());
            }
            rows.push(i);
        }

        write_cache_entries(&mut cache, std::mem::take(&mut dict_writes));

        debug!(
            total,
            resolved = done,
            queued = queued_names.len(),
            "1パス目完了"
        );

        // 2パス目: ユニーク名をチャンク単位で生成・スコアリング
        for chunk in queued_names.chunks(self.options.chunk_size.max(1)) {
            let mut chunk_writes: Vec<CacheEntry> = Vec::new();

            match self.options.mode {
                ProcessingMode::Sequential => {
                    for name in chunk {
                        let set = self.generator.generate(name).await;
                        self.finish_name_rows(
                            table,
                            reading_idx,
                            &rows_by_name,
                            name,
                            &set,
                            &mut outcomes,
                            &mut done,
                            total,
                            &mut on_progress,
                            &mut chunk_writes,
                        );
                    }
                }
                ProcessingMode::Concurrent => {
                    let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
                    let mut tasks: JoinSet<(String, CandidateSet)> = JoinSet::new();

                    for name in chunk {
                        let name = name.clone();
                        let generator = self.generator.clone();
                        let semaphore = semaphore.clone();
                        tasks.spawn(async move {
                            let _permit = semaphore.acquire_owned().await;
                            let set = generator.generate(&name).await;
                            (name, set)
                        });
                    }

                    while let Some(joined) = tasks.join_next().await {
                        let (name, set) =
                            joined.map_err(|e| FuriganaError::Task(e.to_string()))?;
                        self.finish_name_rows(
                            table,
                            reading_idx,
                            &rows_by_name,
                            &name,
                            &set,
                            &mut outcomes,
                            &mut done,
                            total,
                            &mut on_progress,
                            &mut chunk_writes,
                        );
                    }
                }
            }

            write_cache_entries(&mut cache, chunk_writes);
        }

        debug_assert_eq!(done, total);

        let tally = |s: RowStatus| {
            outcomes
                .iter()
                .flatten()
                .filter(|o| o.status == s)
                .count()
        };
        debug!(
            cache_hits = tally(RowStatus::CacheHit),
            too_long = tally(RowStatus::TooLong),
            dictionary_hits = tally(RowStatus::DictionaryHit),
            generated = tally(RowStatus::NeedsGeneration),
            "バッチ完了"
        );

        // 出力テーブルを組み立てる
        let mut out = Table::new(table.headers.clone());
        out.headers.push("confidence".to_string());
        out.headers.push("reason".to_string());
        for (row, outcome) in table.rows.iter().zip(outcomes) {
            let outcome = outcome.ok_or_else(|| {
                FuriganaError::Task("未処理の行が残っています".to_string())
            })?;
            let mut row = row.clone();
            row.push(outcome.confidence.to_string());
            row.push(outcome.reason);
            out.push_row(row);
        }
        Ok(out)
    }

    /// 名前の候補が確定したら、その名前を持つ全行を一括でスコアリングする
    #[allow(clippy::too_many_arguments)]
    fn finish_name_rows(
        &self,
        table: &Table,
        reading_idx: usize,
        rows_by_name: &HashMap<String, Vec<usize>>,
        name: &str,
        set: &CandidateSet,
        outcomes: &mut [Option<RowOutcome>],
        done: &mut usize,
        total: usize,
        on_progress: &mut Option<ProgressFn<'_>>,
        chunk_writes: &mut Vec<CacheEntry>,
    ) {
        let Some(row_indices) = rows_by_name.get(name) else {
            return;
        };

        for &i in row_indices {
            let reading = Table::cell(&table.rows[i], reading_idx);
            let (confidence, reason) =
                score(reading, &set.candidates, set.dictionary_reading.as_deref());

            if self.options.write_cache {
                chunk_writes.push(CacheEntry {
                    name: name.to_string(),
                    reading: reading.to_string(),
                    confidence,
                    reason: reason.clone(),
                });
            }

            finish(
                outcomes,
                done,
                total,
                on_progress,
                i,
                RowOutcome {
                    confidence,
                    reason,
                    status: RowStatus::NeedsGeneration,
                },
            );
        }
    }
}

/// 行を終端状態にして進捗を1進める
fn finish(
    outcomes: &mut [Option<RowOutcome>],
    done: &mut usize,
    total: usize,
    on_progress: &mut Option<ProgressFn<'_>>,
    index: usize,
    outcome: RowOutcome,
) {
    debug_assert!(outcomes[index].is_none());
    outcomes[index] = Some(outcome);
    *done += 1;
    if let Some(cb) = on_progress.as_mut() {
        cb(*done, total);
    }
}

/// キャッシュへの書き戻し。失敗してもバッチは止めない
fn write_cache_entries(cache: &mut Option<&mut ReadingCache>, entries: Vec<CacheEntry>) {
    if entries.is_empty() {
        return;
    }
    if let Some(c) = cache.as_deref_mut() {
        if let Err(e) = c.put_many(&entries) {
            warn!(error = %e, count = entries.len(), "キャッシュ書き込み失敗");
        }
    }
}
