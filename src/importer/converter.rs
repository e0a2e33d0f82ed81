// ==========================================
// 批量导入引擎 - 值转换工具
// ==========================================
// 职责: 原始单元格文本 → 目标类型，全部类型转换集中于此
// 口径: 数字按 Culture 的小数点/千分位解析；日期兼容多种常见格式
// ==========================================

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// 值转换错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("无法将 '{value}' 转换为 {target}")]
    InvalidValue { value: String, target: &'static str },
}

impl ConversionError {
    fn invalid(value: &str, target: &'static str) -> Self {
        ConversionError::InvalidValue {
            value: value.to_string(),
            target,
        }
    }
}

/// 使用逗号作为小数点的语言前缀
const COMMA_DECIMAL_LANGUAGES: [&str; 14] = [
    "de", "fr", "it", "es", "pt", "nl", "ru", "pl", "tr", "da", "fi", "sv", "nb", "cs",
];

// ==========================================
// Culture - 数字/日期解析文化
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    name: String,
    decimal_separator: char,
    group_separator: char,
}

impl Culture {
    /// 不变文化（小数点 '.'，千分位 ','）
    pub fn invariant() -> Self {
        Self {
            name: String::new(),
            decimal_separator: '.',
            group_separator: ',',
        }
    }

    /// 按语言代码构造，例如 "de-DE"、"en-US"、"zh-CN"
    pub fn from_name(name: &str) -> Self {
        let language = name
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if COMMA_DECIMAL_LANGUAGES.contains(&language.as_str()) {
            Self {
                name: name.to_string(),
                decimal_separator: ',',
                group_separator: '.',
            }
        } else {
            Self {
                name: name.to_string(),
                ..Self::invariant()
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    /// 规范化数字文本：去掉空白与千分位，小数点统一为 '.'
    fn normalize_number(&self, raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\'' && *c != self.group_separator)
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect()
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

// ==========================================
// Trait: FromCell - 单元格值的目标类型
// ==========================================
pub trait FromCell: Sized {
    /// 用于错误信息的类型名
    const TYPE_NAME: &'static str;

    /// 从非空原始文本转换
    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError>;

    /// 显式置空（[NULL]）时写入的零值
    fn zero() -> Self;

    /// 按最大长度截断（仅字符串生效）
    fn truncate_to(self, _max_len: usize) -> Self {
        self
    }
}

/// 统一转换入口
pub fn convert<V: FromCell>(raw: &str, culture: &Culture) -> Result<V, ConversionError> {
    V::from_cell(raw, culture)
}

/// 解析布尔文本
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" | "是" => Some(true),
        "0" | "false" | "no" | "n" | "off" | "否" => Some(false),
        _ => None,
    }
}

impl FromCell for String {
    const TYPE_NAME: &'static str = "String";

    fn from_cell(raw: &str, _culture: &Culture) -> Result<Self, ConversionError> {
        Ok(raw.to_string())
    }

    fn zero() -> Self {
        String::new()
    }

    fn truncate_to(self, max_len: usize) -> Self {
        if self.chars().count() <= max_len {
            self
        } else {
            self.chars().take(max_len).collect()
        }
    }
}

impl FromCell for bool {
    const TYPE_NAME: &'static str = "Boolean";

    fn from_cell(raw: &str, _culture: &Culture) -> Result<Self, ConversionError> {
        parse_bool(raw).ok_or_else(|| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        false
    }
}

impl FromCell for f64 {
    const TYPE_NAME: &'static str = "Double";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        let normalized = culture.normalize_number(raw);
        normalized
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        0.0
    }
}

impl FromCell for f32 {
    const TYPE_NAME: &'static str = "Single";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        f64::from_cell(raw, culture)
            .map(|v| v as f32)
            .map_err(|_| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        0.0
    }
}

/// 整数解析：允许 "12.0" 这类整值小数（Excel 数字单元格常见）
fn parse_integer(raw: &str, culture: &Culture, target: &'static str) -> Result<i64, ConversionError> {
    let normalized = culture.normalize_number(raw);
    if let Ok(v) = normalized.parse::<i64>() {
        return Ok(v);
    }
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(ConversionError::invalid(raw, target)),
    }
}

impl FromCell for i64 {
    const TYPE_NAME: &'static str = "Int64";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        parse_integer(raw, culture, Self::TYPE_NAME)
    }

    fn zero() -> Self {
        0
    }
}

impl FromCell for i32 {
    const TYPE_NAME: &'static str = "Int32";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        let value = parse_integer(raw, culture, Self::TYPE_NAME)?;
        i32::try_from(value).map_err(|_| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        0
    }
}

impl FromCell for u32 {
    const TYPE_NAME: &'static str = "UInt32";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        let value = parse_integer(raw, culture, Self::TYPE_NAME)?;
        u32::try_from(value).map_err(|_| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        0
    }
}

/// Excel 日期序列号起点（1900 日期系统）
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn parse_excel_serial(raw: &str) -> Option<NaiveDateTime> {
    let serial = raw.trim().parse::<f64>().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    Some(excel_epoch() + Duration::milliseconds(millis))
}

impl FromCell for NaiveDateTime {
    const TYPE_NAME: &'static str = "DateTime";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        let value = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.naive_utc());
        }

        const FORMATS: [&str; 6] = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y%m%d%H%M%S",
            "%d.%m.%Y %H:%M:%S",
            "%m/%d/%Y %H:%M:%S",
            "%Y/%m/%d %H:%M:%S",
        ];
        for format in FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(dt);
            }
        }

        if let Ok(date) = NaiveDate::from_cell(value, culture) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }

        parse_excel_serial(value).ok_or_else(|| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        NaiveDateTime::default()
    }
}

impl FromCell for NaiveDate {
    const TYPE_NAME: &'static str = "Date";

    fn from_cell(raw: &str, _culture: &Culture) -> Result<Self, ConversionError> {
        let value = raw.trim();

        const FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y%m%d", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d"];
        for format in FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Ok(date);
            }
        }

        parse_excel_serial(value)
            .map(|dt| dt.date())
            .ok_or_else(|| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        NaiveDate::default()
    }
}

impl FromCell for DateTime<Utc> {
    const TYPE_NAME: &'static str = "DateTime";

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::from_cell(raw, culture).map(|naive| naive.and_utc())
    }

    fn zero() -> Self {
        DateTime::<Utc>::default()
    }
}

impl FromCell for Uuid {
    const TYPE_NAME: &'static str = "Guid";

    fn from_cell(raw: &str, _culture: &Culture) -> Result<Self, ConversionError> {
        Uuid::parse_str(raw.trim()).map_err(|_| ConversionError::invalid(raw, Self::TYPE_NAME))
    }

    fn zero() -> Self {
        Uuid::nil()
    }
}

impl<V: FromCell> FromCell for Option<V> {
    const TYPE_NAME: &'static str = V::TYPE_NAME;

    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        V::from_cell(raw, culture).map(Some)
    }

    fn zero() -> Self {
        None
    }

    fn truncate_to(self, max_len: usize) -> Self {
        self.map(|v| v.truncate_to(max_len))
    }
}

impl<V: FromCell> FromCell for Vec<V> {
    const TYPE_NAME: &'static str = V::TYPE_NAME;

    /// 列表值：含 ';' 时按 ';' 分隔，否则按 ','
    fn from_cell(raw: &str, culture: &Culture) -> Result<Self, ConversionError> {
        let separator = if raw.contains(';') { ';' } else { ',' };
        raw.split(separator)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| V::from_cell(part, culture))
            .collect()
    }

    fn zero() -> Self {
        Vec::new()
    }
}
