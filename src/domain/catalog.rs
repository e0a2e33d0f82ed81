// ==========================================
// 批量导入引擎 - 目录辅助实体
// ==========================================
// 职责: 批量提交辅助读写的关联记录
// - LocalizedProperty: 多语言字段值
// - StoreMapping: 店铺限制映射
// - UrlRecord: SEO slug 记录
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ImportLanguage / ImportStore - 运行上下文中的语言与店铺
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLanguage {
    pub id: i64,
    pub culture: String, // 列索引使用的语言代码，例如 Name[de]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStore {
    pub id: i64,
    pub name: String,
}

// ==========================================
// LocalizedProperty - 本地化字段值
// ==========================================
// 对齐: db.rs localized_property 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedProperty {
    pub id: i64, // 0 = 尚未持久化
    pub entity_id: i64,
    pub language_id: i64,
    pub locale_key_group: String, // 实体名称
    pub locale_key: String,       // 字段名
    pub locale_value: String,
}

// ==========================================
// StoreMapping - 店铺映射
// ==========================================
// 对齐: db.rs store_mapping 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMapping {
    pub id: i64,
    pub entity_id: i64,
    pub entity_name: String,
    pub store_id: i64,
}

// ==========================================
// UrlRecord - SEO slug 记录
// ==========================================
// 对齐: db.rs url_record 表
// 说明: language_id = 0 表示标准（非本地化）slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: i64,
    pub entity_id: i64,
    pub entity_name: String,
    pub slug: String,
    pub language_id: i64,
    pub is_active: bool,
}

// ==========================================
// 批次变更集（工作单元一次提交）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedPropertyChange {
    Insert(LocalizedProperty),
    Update(LocalizedProperty),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMappingChange {
    Insert(StoreMapping),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlRecordChange {
    Insert(UrlRecord),
    Deactivate(i64),
    Activate(i64),
}
