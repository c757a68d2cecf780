//! Rule-based text normalization.
//!
//! The default post-processor: filler-word removal, repetition collapsing,
//! inverse text normalization (spoken numbers to written form) and trailing
//! punctuation cleanup. ITN covers the common spoken-Chinese cases:
//! percentages, four-digit years, decimals and magnitude/counter units.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::PostProcessor;

const FILLER_CLASS: &str = "[呃嗯啊哎额噢哦呀诶唉]";

static LEADING_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^{FILLER_CLASS}[，、,]?\s*")).expect("static regex"));
static MID_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"[，、,]\s*{FILLER_CLASS}[，、,]")).expect("static regex"));
static FILLER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"{FILLER_CLASS}{{2,}}")).expect("static regex"));

static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"百分之([零一二三四五六七八九十百千两〇点0-9.]+)").expect("static regex"));
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([零一二三四五六七八九〇]{4})年").expect("static regex"));
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([一二三四五六七八九十百千两]+)点([一二三四五六七八九零〇0-9]+)").expect("static regex"));
static MAGNITUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([一二三四五六七八九十百千两零〇]+)(亿|万|家|个|人)").expect("static regex"));

static DUP_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[，、]{2,}").expect("static regex"));

/// Rule-based [`PostProcessor`] implementation.
pub struct RulePostProcessor {
    model_id: String,
}

impl RulePostProcessor {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
        }
    }

    /// The full normalization pass, synchronous and deterministic.
    pub fn normalize(text: &str, use_itn: bool) -> String {
        let mut text = clean_filler_words(text);
        text = collapse_repeats(&text);
        if use_itn {
            text = apply_itn(&text);
        }
        cleanup_punctuation(&text)
    }
}

#[async_trait]
impl PostProcessor for RulePostProcessor {
    async fn process(&self, text: &str, use_itn: bool) -> Result<String> {
        Ok(Self::normalize(text, use_itn))
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

/// Remove filler words at the sentence head, between commas, and in runs.
fn clean_filler_words(text: &str) -> String {
    let mut text = text.to_string();

    loop {
        let stripped = LEADING_FILLER.replace(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }

    loop {
        let replaced = MID_FILLER.replace(&text, "，").into_owned();
        if replaced == text {
            break;
        }
        text = replaced;
    }

    FILLER_RUN.replace_all(&text, "").trim().to_string()
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Collapse stutter repetitions: a CJK char repeated 3+ times becomes one,
/// a two-char CJK pattern repeated 3+ times becomes one occurrence.
fn collapse_repeats(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        let mut run_end = i + 1;
        while run_end < chars.len() && chars[run_end] == c {
            run_end += 1;
        }
        if is_cjk(c) && run_end - i >= 3 {
            out.push(c);
            i = run_end;
            continue;
        }

        if i + 1 < chars.len() {
            let (a, b) = (chars[i], chars[i + 1]);
            if is_cjk(a) && is_cjk(b) && a != b {
                let mut reps = 1;
                let mut k = i + 2;
                while k + 2 <= chars.len() && chars[k] == a && chars[k + 1] == b {
                    reps += 1;
                    k += 2;
                }
                if reps >= 3 {
                    out.push(a);
                    out.push(b);
                    i = k;
                    continue;
                }
            }
        }

        out.push(c);
        i += 1;
    }

    out
}

fn cn_digit(c: char) -> Option<u64> {
    match c {
        '零' | '〇' => Some(0),
        '一' => Some(1),
        '二' | '两' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        _ => c.to_digit(10).map(u64::from),
    }
}

/// Parse a spoken integer with 十/百/千 place markers ("三千五百" -> 3500).
fn parse_cn_int(s: &str) -> u64 {
    let mut num = 0u64;
    let mut pending = 0u64;

    for c in s.chars() {
        if let Some(d) = cn_digit(c) {
            pending = d;
            continue;
        }
        match c {
            '十' => {
                num += pending.max(1) * 10;
                pending = 0;
            }
            '百' => {
                num += pending * 100;
                pending = 0;
            }
            '千' => {
                num += pending * 1000;
                pending = 0;
            }
            _ => {}
        }
    }

    num + pending
}

fn cn_digits_verbatim(s: &str) -> String {
    s.chars()
        .filter_map(|c| cn_digit(c).map(|d| char::from(b'0' + d as u8)))
        .collect()
}

fn apply_itn(text: &str) -> String {
    // 百分之X -> X%
    let text = PERCENT.replace_all(text, |caps: &regex::Captures| {
        let body = &caps[1];
        match body.split_once('点') {
            Some((int_part, dec_part)) => {
                format!("{}.{}%", parse_cn_int(int_part), cn_digits_verbatim(dec_part))
            }
            None => format!("{}%", parse_cn_int(body)),
        }
    });

    // 二零二五年 -> 2025年
    let text = YEAR.replace_all(&text, |caps: &regex::Captures| {
        format!("{}年", cn_digits_verbatim(&caps[1]))
    });

    // 二十五点六 -> 25.6
    let text = DECIMAL.replace_all(&text, |caps: &regex::Captures| {
        format!("{}.{}", parse_cn_int(&caps[1]), cn_digits_verbatim(&caps[2]))
    });

    // 五十万 -> 50万
    let text = MAGNITUDE.replace_all(&text, |caps: &regex::Captures| {
        format!("{}{}", parse_cn_int(&caps[1]), &caps[2])
    });

    text.into_owned()
}

fn cleanup_punctuation(text: &str) -> String {
    let text = DUP_COMMAS.replace_all(text, "，");
    let text = text.trim();
    match text.strip_suffix('，') {
        Some(body) => format!("{body}。"),
        None => text.to_string(),
    }
}
