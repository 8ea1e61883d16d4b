//! かな正規化モジュール
//!
//! フリガナ比較用の正規化キーを生成する。
//!
//! ## 正規化の段階
//! 1. `normalize`: 半角→全角統一・濁点合成・空白除去（NFKC相当）
//! 2. `normalize_strict`: キーパンチャー検査用の厳密キー
//!    （ひらがな→カタカナ、拗音展開、半角化＋濁点分離）
//! 3. `strip_voicing`: 濁点・半濁点を落とした緩い比較用

/// 比較用の正規化キーを返す
///
/// 半角カタカナを全角に統一し（濁点・半濁点は合成）、
/// 全角英数を半角に畳み、半角・全角スペースを除去する。
/// 空入力は空文字列を返す。入力全域で定義され、失敗しない。
pub fn normalize(text: &str) -> String {
    let mut out: Vec<char> = Vec::with_capacity(text.chars().count());

    for c in text.chars() {
        match c {
            ' ' | '\u{3000}' => continue,
            // 全角英数・記号 → 半角
            '\u{FF01}'..='\u{FF5E}' => {
                let folded = char::from_u32(c as u32 - 0xFEE0).unwrap_or(c);
                out.push(folded);
            }
            // 濁点（半角・全角・結合文字）は直前の文字と合成
            '\u{FF9E}' | '\u{309B}' | '\u{3099}' => match out.last().and_then(|&b| voiced(b)) {
                Some(v) => {
                    out.pop();
                    out.push(v);
                }
                None => out.push('\u{309B}'),
            },
            // 半濁点も同様
            '\u{FF9F}' | '\u{309C}' | '\u{309A}' => {
                match out.last().and_then(|&b| semi_voiced(b)) {
                    Some(v) => {
                        out.pop();
                        out.push(v);
                    }
                    None => out.push('\u{309C}'),
                }
            }
            _ => out.push(half_to_full(c).unwrap_or(c)),
        }
    }

    out.into_iter().collect()
}

/// キーパンチャー検査用の厳密キーを返す
///
/// `normalize` の結果に対して
/// (a) ひらがな→カタカナ変換
/// (b) 拗音展開（キョ→キヨ など、12基底×ャュョ）
/// (c) 全角カタカナ→半角変換（濁点・半濁点は後置の独立マーク）
/// を適用する。スコアリングの同値判定はこのキーで行う。
/// 自身の出力に適用しても結果は変わらない（冪等）。
pub fn normalize_strict(text: &str) -> String {
    let folded: String = normalize(text).chars().map(hira_to_kata).collect();
    let expanded = expand_yoon(&folded);

    let mut out = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        match full_to_half(c) {
            Some(s) => out.push_str(s),
            None => out.push(c),
        }
    }
    out
}

/// 濁点・半濁点を落とした読みを返す
///
/// 厳密一致が外れた場合の緩い二次比較にのみ使う。
pub fn strip_voicing(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| !matches!(c, '\u{309B}' | '\u{309C}' | '\u{3099}' | '\u{309A}'))
        .map(devoice)
        .collect()
}

/// ひらがな→カタカナ（対応しない文字はそのまま）
fn hira_to_kata(c: char) -> char {
    match c {
        '\u{3041}'..='\u{3096}' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
        'ゝ' => 'ヽ',
        'ゞ' => 'ヾ',
        _ => c,
    }
}

/// 拗音を直音2文字に展開する（キョウコ→キヨウコ）
///
/// 基底はキシチニヒミリとその濁音・半濁音の12文字のみ。
/// それ以外に続く小書き文字（ファ等）は展開しない。
fn expand_yoon(text: &str) -> String {
    const YOON_BASES: &str = "キシチニヒミリギジヂビピ";

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if YOON_BASES.contains(c) {
            if let Some(full) = chars.get(i + 1).and_then(|&s| small_yoon_to_full(s)) {
                out.push(c);
                out.push(full);
                i += 2;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

fn small_yoon_to_full(c: char) -> Option<char> {
    match c {
        'ャ' => Some('ヤ'),
        'ュ' => Some('ユ'),
        'ョ' => Some('ヨ'),
        _ => None,
    }
}

/// 半角カタカナ・記号→全角（清音のみ、濁点は呼び出し側で合成）
fn half_to_full(c: char) -> Option<char> {
    let full = match c {
        '｡' => '。',
        '｢' => '「',
        '｣' => '」',
        '､' => '、',
        '･' => '・',
        'ｰ' => 'ー',
        'ｦ' => 'ヲ',
        'ｧ' => 'ァ',
        'ｨ' => 'ィ',
        'ｩ' => 'ゥ',
        'ｪ' => 'ェ',
        'ｫ' => 'ォ',
        'ｬ' => 'ャ',
        'ｭ' => 'ュ',
        'ｮ' => 'ョ',
        'ｯ' => 'ッ',
        'ｱ' => 'ア',
        'ｲ' => 'イ',
        'ｳ' => 'ウ',
        'ｴ' => 'エ',
        'ｵ' => 'オ',
        'ｶ' => 'カ',
        'ｷ' => 'キ',
        'ｸ' => 'ク',
        'ｹ' => 'ケ',
        'ｺ' => 'コ',
        'ｻ' => 'サ',
        'ｼ' => 'シ',
        'ｽ' => 'ス',
        'ｾ' => 'セ',
        'ｿ' => 'ソ',
        'ﾀ' => 'タ',
        'ﾁ' => 'チ',
        'ﾂ' => 'ツ',
        'ﾃ' => 'テ',
        'ﾄ' => 'ト',
        'ﾅ' => 'ナ',
        'ﾆ' => 'ニ',
        'ﾇ' => 'ヌ',
        'ﾈ' => 'ネ',
        'ﾉ' => 'ノ',
        'ﾊ' => 'ハ',
        'ﾋ' => 'ヒ',
        'ﾌ' => 'フ',
        'ﾍ' => 'ヘ',
        'ﾎ' => 'ホ',
        'ﾏ' => 'マ',
        'ﾐ' => 'ミ',
        'ﾑ' => 'ム',
        'ﾒ' => 'メ',
        'ﾓ' => 'モ',
        'ﾔ' => 'ヤ',
        'ﾕ' => 'ユ',
        'ﾖ' => 'ヨ',
        'ﾗ' => 'ラ',
        'ﾘ' => 'リ',
        'ﾙ' => 'ル',
        'ﾚ' => 'レ',
        'ﾛ' => 'ロ',
        'ﾜ' => 'ワ',
        'ﾝ' => 'ン',
        _ => return None,
    };
    Some(full)
}

/// 清音→濁音（合成できない文字はNone）
fn voiced(c: char) -> Option<char> {
    let v = match c {
        'カ' => 'ガ',
        'キ' => 'ギ',
        'ク' => 'グ',
        'ケ' => 'ゲ',
        'コ' => 'ゴ',
        'サ' => 'ザ',
        'シ' => 'ジ',
        'ス' => 'ズ',
        'セ' => 'ゼ',
        'ソ' => 'ゾ',
        'タ' => 'ダ',
        'チ' => 'ヂ',
        'ツ' => 'ヅ',
        'テ' => 'デ',
        'ト' => 'ド',
        'ハ' => 'バ',
        'ヒ' => 'ビ',
        'フ' => 'ブ',
        'ヘ' => 'ベ',
        'ホ' => 'ボ',
        'ウ' => 'ヴ',
        _ => return None,
    };
    Some(v)
}

/// 清音→半濁音
fn semi_voiced(c: char) -> Option<char> {
    let v = match c {
        'ハ' => 'パ',
        'ヒ' => 'ピ',
        'フ' => 'プ',
        'ヘ' => 'ペ',
        'ホ' => 'ポ',
        _ => return None,
    };
    Some(v)
}

/// 濁音・半濁音→清音（ひらがな含む）
fn devoice(c: char) -> char {
    match c {
        'ガ' => 'カ',
        'ギ' => 'キ',
        'グ' => 'ク',
        'ゲ' => 'ケ',
        'ゴ' => 'コ',
        'ザ' => 'サ',
        'ジ' => 'シ',
        'ズ' => 'ス',
        'ゼ' => 'セ',
        'ゾ' => 'ソ',
        'ダ' => 'タ',
        'ヂ' => 'チ',
        'ヅ' => 'ツ',
        'デ' => 'テ',
        'ド' => 'ト',
        'バ' | 'パ' => 'ハ',
        'ビ' | 'ピ' => 'ヒ',
        'ブ' | 'プ' => 'フ',
        'ベ' | 'ペ' => 'ヘ',
        'ボ' | 'ポ' => 'ホ',
        'ヴ' => 'ウ',
        'が' => 'か',
        'ぎ' => 'き',
        'ぐ' => 'く',
        'げ' => 'け',
        'ご' => 'こ',
        'ざ' => 'さ',
        'じ' => 'し',
        'ず' => 'す',
        'ぜ' => 'せ',
        'ぞ' => 'そ',
        'だ' => 'た',
        'ぢ' => 'ち',
        'づ' => 'つ',
        'で' => 'て',
        'ど' => 'と',
        'ば' | 'ぱ' => 'は',
        'び' | 'ぴ' => 'ひ',
        'ぶ' | 'ぷ' => 'ふ',
        'べ' | 'ぺ' => 'へ',
        'ぼ' | 'ぽ' => 'ほ',
        'ゔ' => 'う',
        _ => c,
    }
}

/// 全角カタカナ→半角（濁点・半濁点は後置マークに分離）
fn full_to_half(c: char) -> Option<&'static str> {
    let half = match c {
        '。' => "｡",
        '「' => "｢",
        '」' => "｣",
        '、' => "､",
        '・' => "･",
        'ー' => "ｰ",
        '\u{309B}' => "ﾞ",
        '\u{309C}' => "ﾟ",
        'ヲ' => "ｦ",
        'ァ' => "ｧ",
        'ィ' => "ｨ",
        'ゥ' => "ｩ",
        'ェ' => "ｪ",
        'ォ' => "ｫ",
        'ャ' => "ｬ",
        'ュ' => "ｭ",
        'ョ' => "ｮ",
        'ッ' => "ｯ",
        'ア' => "ｱ",
        'イ' => "ｲ",
        'ウ' => "ｳ",
        'エ' => "ｴ",
        'オ' => "ｵ",
        'カ' => "ｶ",
        'キ' => "ｷ",
        'ク' => "ｸ",
        'ケ' => "ｹ",
        'コ' => "ｺ",
        'サ' => "ｻ",
        'シ' => "ｼ",
        'ス' => "ｽ",
        'セ' => "ｾ",
        'ソ' => "ｿ",
        'タ' => "ﾀ",
        'チ' => "ﾁ",
        'ツ' => "ﾂ",
        'テ' => "ﾃ",
        'ト' => "ﾄ",
        'ナ' => "ﾅ",
        'ニ' => "ﾆ",
        'ヌ' => "ﾇ",
        'ネ' => "ﾈ",
        'ノ' => "ﾉ",
        'ハ' => "ﾊ",
        'ヒ' => "ﾋ",
        'フ' => "ﾌ",
        'ヘ' => "ﾍ",
        'ホ' => "ﾎ",
        'マ' => "ﾏ",
        'ミ' => "ﾐ",
        'ム' => "ﾑ",
        'メ' => "ﾒ",
        'モ' => "ﾓ",
        'ヤ' => "ﾔ",
        'ユ' => "ﾕ",
        'ヨ' => "ﾖ",
        'ラ' => "ﾗ",
        'リ' => "ﾘ",
        'ル' => "ﾙ",
        'レ' => "ﾚ",
        'ロ' => "ﾛ",
        'ワ' => "ﾜ",
        'ン' => "ﾝ",
        'ガ' => "ｶﾞ",
        'ギ' => "ｷﾞ",
        'グ' => "ｸﾞ",
        'ゲ' => "ｹﾞ",
        'ゴ' => "ｺﾞ",
        'ザ' => "ｻﾞ",
        'ジ' => "ｼﾞ",
        'ズ' => "ｽﾞ",
        'ゼ' => "ｾﾞ",
        'ゾ' => "ｿﾞ",
        'ダ' => "ﾀﾞ",
        'ヂ' => "ﾁﾞ",
        'ヅ' => "ﾂﾞ",
        'デ' => "ﾃﾞ",
        'ド' => "ﾄﾞ",
        'バ' => "ﾊﾞ",
        'ビ' => "ﾋﾞ",
        'ブ' => "ﾌﾞ",
        'ベ' => "ﾍﾞ",
        'ボ' => "ﾎﾞ",
        'パ' => "ﾊﾟ",
        'ピ' => "ﾋﾟ",
        'プ' => "ﾌﾟ",
        'ペ' => "ﾍﾟ",
        'ポ' => "ﾎﾟ",
        'ヴ' => "ｳﾞ",
        _ => return None,
    };
    Some(half)
}
