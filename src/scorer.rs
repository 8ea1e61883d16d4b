//! 信頼度スコアリングモジュール
//!
//! 対象フリガナを候補リストと照合し、信頼度（0–100）と理由を返す。
//! 同値判定はすべて厳密正規化キー（`normalize_strict`）で行い、
//! 生文字列の比較は使わない。

use crate::generator::Candidate;
use crate::normalizer::normalize_strict;

/// 辞書読みと厳密一致した場合の理由
pub const REASON_DICTIONARY: &str = "dictionary match";

/// どの候補とも一致しなかった場合の理由
pub const REASON_NO_MATCH: &str = "not in candidate set — needs review";

/// 名前が空または長すぎる場合の理由
pub const REASON_TOO_LONG: &str = "too long";

/// 対象フリガナの信頼度と理由を返す
///
/// 判定は上から順に評価し、最初に一致した規則で確定する:
/// 1. 辞書読みと厳密一致 → 100
/// 2. 候補リスト（辞書由来を除く）の順位による段階評価
///    1位85 / 2位80 / 3位70 / 4–5位60、6位以下は不一致扱い
/// 3. 不一致 → 0
///
/// 低順位ほど低温サンプルの合議から遠く、証拠として弱いため
/// 信頼度を下げる。
pub fn score(
    target: &str,
    candidates: &[Candidate],
    dictionary_reading: Option<&str>,
) -> (u32, String) {
    let target_key = normalize_strict(target);

    if let Some(dict) = dictionary_reading {
        if !target_key.is_empty() && normalize_strict(dict) == target_key {
            return (100, REASON_DICTIONARY.to_string());
        }
    }

    let mut rank = 0usize;
    for candidate in candidates {
        if candidate.from_dictionary {
            // 辞書候補は規則1で処理済み
            continue;
        }
        rank += 1;
        if rank > 5 {
            break;
        }
        if !target_key.is_empty() && candidate.key == target_key {
            let confidence = match rank {
                1 => 85,
                2 => 80,
                3 => 70,
                _ => 60,
            };
            return (confidence, format!("rank {rank} match"));
        }
    }

    (0, REASON_NO_MATCH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(reading: &str, from_dictionary: bool) -> Candidate {
        Candidate {
            reading: reading.to_string(),
            key: normalize_strict(reading),
            from_dictionary,
        }
    }

    fn generative(readings: &[&str]) -> Vec<Candidate> {
        readings.iter().map(|r| candidate(r, false)).collect()
    }

    #[test]
    fn test_dictionary_match() {
        let candidates = generative(&["ジロウ"]);
        let (conf, reason) = score("タロウ", &candidates, Some("タロウ"));
        assert_eq!(conf, 100);
        assert_eq!(reason, REASON_DICTIONARY);
    }

    #[test]
    fn test_dictionary_match_wins_over_candidates() {
        // 候補1位に同じ読みがあっても辞書一致が優先
        let mut candidates = vec![candidate("タロウ", true)];
        candidates.extend(generative(&["タロウ"]));
        let (conf, reason) = score("タロウ", &candidates, Some("タロウ"));
        assert_eq!(conf, 100);
        assert_eq!(reason, REASON_DICTIONARY);
    }

    #[test]
    fn test_dictionary_match_normalized() {
        // 半角・拗音の揺れも厳密キーで一致する
        let (conf, _) = score("ｷﾖｳｺ", &[], Some("キョウコ"));
        assert_eq!(conf, 100);
    }

    #[test]
    fn test_rank_table() {
        let candidates = generative(&["ア", "イ", "ウ", "エ", "オ", "カ"]);
        let expected = [(85, 1), (80, 2), (70, 3), (60, 4), (60, 5)];
        for (i, (conf, rank)) in expected.iter().enumerate() {
            let target = candidates[i].reading.clone();
            let (c, reason) = score(&target, &candidates, None);
            assert_eq!(c, *conf, "rank {rank}");
            assert_eq!(reason, format!("rank {rank} match"));
        }

        // 6位以下は不一致扱い
        let (c, reason) = score("カ", &candidates, None);
        assert_eq!(c, 0);
        assert_eq!(reason, REASON_NO_MATCH);
    }

    #[test]
    fn test_dictionary_entry_skipped_in_ranking() {
        // 辞書候補が先頭にあっても、生成候補は1位から数え直す
        let mut candidates = vec![candidate("タロウ", true)];
        candidates.extend(generative(&["ミチ", "ミチョ"]));
        let (conf, reason) = score("ミチ", &candidates, Some("タロウ"));
        assert_eq!(conf, 85);
        assert_eq!(reason, "rank 1 match");
    }

    #[test]
    fn test_no_match() {
        let candidates = generative(&["ミチ", "ミチョ"]);
        let (conf, reason) = score("ミサト", &candidates, None);
        assert_eq!(conf, 0);
        assert_eq!(reason, REASON_NO_MATCH);
    }

    #[test]
    fn test_empty_target_never_matches() {
        let candidates = generative(&["ミチ"]);
        let (conf, reason) = score("", &candidates, Some("ミチ"));
        assert_eq!(conf, 0);
        assert_eq!(reason, REASON_NO_MATCH);

        let (conf, _) = score("　 ", &candidates, None);
        assert_eq!(conf, 0);
    }
}
