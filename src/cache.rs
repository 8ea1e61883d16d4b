//! 判定結果キャッシュモジュール
//!
//! (名前, フリガナ) の文字列ペアをキーに判定結果を永続化し、
//! 同じ行の再判定をスキップする。キーは正規化しない生の組。
//! 同じ名前でも綴りの違うフリガナは別エントリになる。
//! エントリは失効しない。上書き（upsert）のみ。

use crate::config::CheckerConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// 複合キーの区切り文字（名前・フリガナに現れない制御文字）
const KEY_SEP: char = '\u{1F}';

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// "名前␟フリガナ" → 判定結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub reading: String,
    pub confidence: u32,
    pub reason: String,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CacheFile::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 判定結果のキー・バリューストア
pub struct ReadingCache {
    path: PathBuf,
    file: CacheFile,
}

impl ReadingCache {
    /// 指定パスのキャッシュを開く
    ///
    /// ファイルがない・壊れている・バージョン不一致の場合は
    /// 空のキャッシュとして開く。
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = Self::load_file(&path);
        Self { path, file }
    }

    /// 環境変数 `FURIGANA_CACHE`（なければデフォルトパス）で開く
    pub fn open_default() -> Self {
        Self::open(CheckerConfig::cache_path())
    }

    fn load_file(path: &Path) -> CacheFile {
        if !path.exists() {
            return CacheFile::default();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return CacheFile::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(cache) if cache.version == CacheFile::CURRENT_VERSION => cache,
            Ok(_) => {
                warn!(path = %path.display(), "キャッシュバージョン不一致、空で開く");
                CacheFile::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "キャッシュ読込失敗、空で開く");
                CacheFile::default()
            }
        }
    }

    fn key(name: &str, reading: &str) -> String {
        format!("{name}{KEY_SEP}{reading}")
    }

    /// キャッシュをルックアップ
    pub fn get(&self, name: &str, reading: &str) -> Option<(u32, String)> {
        self.file
            .entries
            .get(&Self::key(name, reading))
            .map(|e| (e.confidence, e.reason.clone()))
    }

    /// 1件書き込み（即時永続化、既存エントリは上書き）
    pub fn put(&mut self, name: &str, reading: &str, confidence: u32, reason: &str) -> Result<()> {
        self.insert(name, reading, confidence, reason);
        self.save()
    }

    /// 複数件をまとめて書き込み（1回のアトミックな保存）
    pub fn put_many(&mut self, rows: &[CacheEntry]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            self.insert(&row.name, &row.reading, row.confidence, &row.reason);
        }
        self.save()
    }

    fn insert(&mut self, name: &str, reading: &str, confidence: u32, reason: &str) {
        self.file.entries.insert(
            Self::key(name, reading),
            CacheEntry {
                name: name.to_string(),
                reading: reading.to_string(),
                confidence,
                reason: reason.to_string(),
            },
        );
    }

    /// 一時ファイル経由でアトミックに保存する
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(&tmp);
            serde_json::to_writer_pretty(&mut writer, &self.file)?;
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .map_err(|e| std::io::Error::from(e.error))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
