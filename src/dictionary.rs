//! 辞書引きモジュール
//!
//! 形態素解析器による決定的なカタカナ読み引きと、
//! 名前単位のメモ化を提供する。同じ名前は一回のバッチ中に
//! 何度も現れるため、バックエンド呼び出しは名前ごとに1回で済ませる。

use std::collections::HashMap;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 形態素解析バックエンド
///
/// 同一設定なら同一入力に対して決定的であること。
/// 空・空白のみの入力には `None` を返す。
pub trait DictionaryBackend: Send + Sync {
    fn reading_for(&self, name: &str) -> Option<String>;
}

/// バックエンドを名前単位でメモ化するアダプタ
///
/// メモはプロセス生存期間中は増えるのみ（上限なし）。
pub struct DictionaryAdapter {
    backend: Arc<dyn DictionaryBackend>,
    memo: Mutex<HashMap<String, Option<String>>>,
}

impl DictionaryAdapter {
    pub fn new(backend: Arc<dyn DictionaryBackend>) -> Self {
        Self {
            backend,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// 名前のカタカナ読みを返す（メモ化あり）
    pub fn reading_for(&self, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }

        if let Some(cached) = self.memo.lock().unwrap().get(name) {
            return cached.clone();
        }

        let reading = self.backend.reading_for(name);
        debug!(name, reading = reading.as_deref().unwrap_or("-"), "辞書引き");
        self.memo
            .lock()
            .unwrap()
            .insert(name.to_string(), reading.clone());
        reading
    }
}

/// Sudachi CLIを呼び出す辞書バックエンド
///
/// `sudachi -m C -a` のタブ区切り出力から読みフィールドを連結する。
/// 空白・記号トークンは読みに寄与させない（「名字␣名前」の
/// 区切りが読み断片として混入しないように）。
pub struct SudachiCli {
    command: String,
}

impl SudachiCli {
    pub fn new() -> Self {
        Self {
            command: "sudachi".to_string(),
        }
    }

    pub fn with_command(command: String) -> Self {
        Self { command }
    }

    fn tokenize(&self, name: &str) -> Option<String> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = Command::new(&self.command)
            .args(["-m", "C", "-a"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        child
            .stdin
            .as_mut()?
            .write_all(name.as_bytes())
            .ok()?;

        let output = child.wait_with_output().ok()?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reading = parse_sudachi_output(&stdout);
        if reading.is_empty() {
            None
        } else {
            Some(reading)
        }
    }
}

impl Default for SudachiCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryBackend for SudachiCli {
    fn reading_for(&self, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        self.tokenize(name)
    }
}

/// Sudachiのタブ区切り出力（-a付き）から読みを連結する
///
/// 各行: 表層形\t品詞\t正規化形\t辞書形\t読み
/// 空白・補助記号トークンと読み未定義（`*`）はスキップ。
fn parse_sudachi_output(output: &str) -> String {
    let mut reading = String::new();

    for line in output.lines() {
        if line == "EOS" || line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let surface = fields.first().copied().unwrap_or("");
        if surface.trim().is_empty() {
            continue;
        }
        if fields.get(1).is_some_and(|pos| pos.starts_with("補助記号") || pos.starts_with("空白")) {
            continue;
        }
        match fields.get(4) {
            Some(&r) if !r.is_empty() && r != "*" => reading.push_str(r),
            _ => {}
        }
    }

    reading
}
