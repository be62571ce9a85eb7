// ==========================================
// 物业数据迁移引擎 - 数据清洗器
// ==========================================
// 职责: 文本标准化（小写/去重音/空白折叠）与按来源区域约定的值解析
// 说明: 校验器与转换器共用同一套解析规则，保证两者结论一致
// ==========================================

use crate::domain::schema::FieldSpec;
use crate::importer::source_profile::SourceProfile;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// 固定的“否”词表（与来源无关）
const FALSE_TOKENS: &[&str] = &["no", "n", "false", "f", "0"];

/// 货币符号与单位（解析数值前剔除）
const CURRENCY_MARKERS: &[&str] = &["€", "$", "£", "eur", "usd", "m²", "m2"];

// ==========================================
// 文本标准化
// ==========================================

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'ª' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'º' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// 小写 + 去重音 + 分隔符转空格 + 空白折叠
pub fn normalize_text(value: &str) -> String {
    let folded: String = value
        .to_lowercase()
        .chars()
        .map(fold_char)
        .map(|c| match c {
            '_' | '-' | '.' | '/' | '(' | ')' | ':' | '#' | ',' | ';' | '\\' => ' ',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 地址标准化：在 normalize_text 基础上展开常见街道缩写
pub fn normalize_address(value: &str) -> String {
    normalize_text(value)
        .split(' ')
        .map(|token| match token {
            "c" | "cl" | "cll" => "calle",
            "av" | "avd" | "avda" => "avenida",
            "pza" | "pl" | "plz" => "plaza",
            "po" | "pso" => "paseo",
            "ctra" => "carretera",
            "n" | "no" | "num" => "",
            other => other,
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 将文本切分为去重后的词集合（模糊匹配用）
pub fn tokens(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in normalize_text(value).split(' ') {
        if !token.is_empty() && !out.iter().any(|t| t == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// 词重叠度: |A ∩ B| / max(|A|, |B|)
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    let longest = ta.len().max(tb.len());
    if longest == 0 {
        return 0.0;
    }
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    shared as f64 / longest as f64
}

// ==========================================
// DataCleaner - 按来源约定解析值
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct DataCleaner<'a> {
    profile: &'a SourceProfile,
}

impl<'a> DataCleaner<'a> {
    pub fn new(profile: &'a SourceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &'a SourceProfile {
        self.profile
    }

    /// 区域感知的数值解析
    ///
    /// 规则:
    /// - 同时出现 '.' 与 ',' 时，最后出现者为小数点
    /// - 仅出现来源小数点时按小数点处理
    /// - 仅出现另一种分隔符时，若符合千分位分组（每组 3 位）视为千分位，否则视为小数点
    pub fn parse_number(&self, raw: &str) -> Result<Decimal, String> {
        let mut text = raw.trim().to_lowercase();
        for marker in CURRENCY_MARKERS {
            text = text.replace(marker, "");
        }
        let compact: String = text.chars().filter(|c| !c.is_whitespace() && *c != '\'').collect();
        if compact.is_empty() {
            return Err(format!("无法解析为数值: '{}'", raw));
        }

        let canonical = self.canonical_number(&compact);
        Decimal::from_str(&canonical).map_err(|_| format!("无法解析为数值: '{}'", raw))
    }

    fn canonical_number(&self, compact: &str) -> String {
        let last_dot = compact.rfind('.');
        let last_comma = compact.rfind(',');

        let decimal_mark = match (last_dot, last_comma) {
            (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
            (Some(_), None) => Some(self.single_separator_role(compact, '.')),
            (None, Some(_)) => Some(self.single_separator_role(compact, ',')),
            (None, None) => None,
        };

        compact
            .chars()
            .filter_map(|c| match c {
                '.' | ',' if Some(c) == decimal_mark => Some('.'),
                '.' | ',' => None,
                other => Some(other),
            })
            .collect()
    }

    /// 单一分隔符的角色判定：返回作为小数点的字符；判定为千分位时返回一个不出现的占位符
    fn single_separator_role(&self, compact: &str, sep: char) -> char {
        if sep == self.profile.decimal_separator {
            return sep;
        }
        let groups: Vec<&str> = compact.split(sep).collect();
        let looks_grouped = groups.len() > 1
            && groups[1..].iter().all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
        if looks_grouped {
            '\0'
        } else {
            sep
        }
    }

    /// 整数解析（带小数部分视为失败）
    pub fn parse_integer(&self, raw: &str) -> Result<i64, String> {
        let value = self.parse_number(raw)?;
        if !value.fract().is_zero() {
            return Err(format!("应为整数: '{}'", raw));
        }
        value
            .trunc()
            .to_i64()
            .ok_or_else(|| format!("整数超出范围: '{}'", raw))
    }

    /// 日期解析：来源格式 → ISO-8601 日期 → RFC 3339 时间戳（转 UTC 日期）
    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, String> {
        let text = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(text, self.profile.date_format) {
            return Ok(date);
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Ok(date);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Ok(ts.with_timezone(&Utc).date_naive());
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
            return Ok(ts.date());
        }
        Err(format!(
            "无法解析为日期: '{}'（期望 {} 或 YYYY-MM-DD）",
            raw, self.profile.date_format
        ))
    }

    pub fn parse_boolean(&self, raw: &str) -> Result<bool, String> {
        let token = normalize_text(raw);
        if self.profile.boolean_true_tokens.iter().any(|t| *t == token) {
            Ok(true)
        } else if FALSE_TOKENS.contains(&token.as_str()) {
            Ok(false)
        } else {
            Err(format!("无法解析为布尔值: '{}'", raw))
        }
    }
}

/// 枚举归一：大小写/重音不敏感匹配标准值，其次匹配同义词
pub fn fold_enum(field: &FieldSpec, raw: &str) -> Option<&'static str> {
    let wanted = normalize_text(raw);
    if wanted.is_empty() {
        return None;
    }
    field
        .enum_values
        .iter()
        .copied()
        .find(|v| normalize_text(v) == wanted)
        .or_else(|| {
            field
                .enum_synonyms
                .iter()
                .find(|(synonym, _)| normalize_text(synonym) == wanted)
                .map(|(_, canonical)| *canonical)
        })
}
