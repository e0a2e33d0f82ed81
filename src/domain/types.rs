// ==========================================
// 批量导入引擎 - 领域类型定义
// ==========================================
// 职责: 导入实体类型、关联文件类型、中止级别、消息级别
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入实体类型 (Import Entity Type)
// ==========================================
// 用途: 导入配置的目标实体，用于解析实体导入器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportEntityType {
    Product,
    Category,
    Customer,
    NewsletterSubscription,
}

impl ImportEntityType {
    /// 转换为字符串标识（与数据库一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportEntityType::Product => "PRODUCT",
            ImportEntityType::Category => "CATEGORY",
            ImportEntityType::Customer => "CUSTOMER",
            ImportEntityType::NewsletterSubscription => "NEWSLETTER_SUBSCRIPTION",
        }
    }

    /// 从数据库字符串解析（大小写不敏感）
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRODUCT" => Some(ImportEntityType::Product),
            "CATEGORY" => Some(ImportEntityType::Category),
            "CUSTOMER" => Some(ImportEntityType::Customer),
            "NEWSLETTER_SUBSCRIPTION" | "NEWSLETTERSUBSCRIPTION" => {
                Some(ImportEntityType::NewsletterSubscription)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ImportEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 关联实体类型 (Related Entity Type)
// ==========================================
// 用途: 由文件名后缀推断，例如 products-TierPrice.csv
// 顺序: 枚举声明顺序即文件组处理顺序（主文件组最先）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelatedEntityType {
    TierPrice,
    ProductVariantAttributeValue,
    ProductVariantAttributeCombination,
}

impl RelatedEntityType {
    pub const ALL: [RelatedEntityType; 3] = [
        RelatedEntityType::TierPrice,
        RelatedEntityType::ProductVariantAttributeValue,
        RelatedEntityType::ProductVariantAttributeCombination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedEntityType::TierPrice => "TierPrice",
            RelatedEntityType::ProductVariantAttributeValue => "ProductVariantAttributeValue",
            RelatedEntityType::ProductVariantAttributeCombination => {
                "ProductVariantAttributeCombination"
            }
        }
    }

    /// 根据文件名（不含扩展名）后缀推断关联类型
    ///
    /// 较长的名称优先匹配，避免前缀相同的类型互相吞并。
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let lower = stem.to_lowercase();
        let mut candidates = Self::ALL.to_vec();
        candidates.sort_by_key(|t| std::cmp::Reverse(t.as_str().len()));

        candidates
            .into_iter()
            .find(|t| lower.ends_with(&t.as_str().to_lowercase()))
    }
}

impl fmt::Display for RelatedEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 中止级别 (Abort Level)
// ==========================================
// None: 继续; Soft: 不再开始新批次; Hard: 不再打开新文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AbortLevel {
    #[default]
    None,
    Soft,
    Hard,
}

impl fmt::Display for AbortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortLevel::None => write!(f, "NONE"),
            AbortLevel::Soft => write!(f, "SOFT"),
            AbortLevel::Hard => write!(f, "HARD"),
        }
    }
}

// ==========================================
// 导入消息级别 (Import Message Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMessageType {
    Info,    // 提示（仅记录）
    Warning, // 警告（行继续处理）
    Error,   // 错误（计入失败阈值）
}

impl fmt::Display for ImportMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMessageType::Info => write!(f, "INFO"),
            ImportMessageType::Warning => write!(f, "WARN"),
            ImportMessageType::Error => write!(f, "ERROR"),
        }
    }
}
