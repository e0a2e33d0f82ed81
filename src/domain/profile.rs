// ==========================================
// 批量导入引擎 - 导入配置（Import Profile）
// ==========================================
// 职责: 一次导入运行的持久化配置
// 对齐: db.rs import_profile 表
// ==========================================

use crate::domain::import_result::SerializableImportResult;
use crate::domain::types::ImportEntityType;
use serde::{Deserialize, Serialize};

// ==========================================
// CsvConfiguration - CSV 格式配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvConfiguration {
    pub delimiter: char,
    pub quote: char,
    pub has_headers: bool,
}

impl CsvConfiguration {
    /// Excel 友好的默认配置（逗号分隔、双引号、带表头）
    pub fn excel_friendly() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            has_headers: true,
        }
    }
}

impl Default for CsvConfiguration {
    fn default() -> Self {
        Self::excel_friendly()
    }
}

// ==========================================
// ImportProfile - 导入配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProfile {
    pub id: i64,
    pub name: String,
    pub entity_type: ImportEntityType,
    pub folder_name: String,                  // 配置目录名（相对数据根目录）
    pub skip: usize,                          // 跳过的数据行数
    pub take: usize,                          // 读取的最大行数（0 = 不限）
    pub key_field_names: Vec<String>,         // 用于识别已有实体的键字段
    pub column_map_json: Option<String>,      // 列映射（JSON）
    pub csv_config: Option<CsvConfiguration>, // CSV 配置（None = Excel 友好默认值）
    pub culture: String,                      // 数字/日期解析文化（空 = 不变文化）
    pub enabled: bool,
    pub result_info: Option<SerializableImportResult>, // 最近一次运行汇总
}

impl ImportProfile {
    pub fn new(id: i64, name: impl Into<String>, entity_type: ImportEntityType) -> Self {
        let name = name.into();
        Self {
            id,
            folder_name: format!("profile-{}", id),
            name,
            entity_type,
            skip: 0,
            take: 0,
            key_field_names: vec!["Id".to_string()],
            column_map_json: None,
            csv_config: None,
            culture: String::new(),
            enabled: true,
            result_info: None,
        }
    }

    /// 读取行数上限（0 表示不限制）
    pub fn effective_take(&self) -> usize {
        if self.take > 0 {
            self.take
        } else {
            usize::MAX
        }
    }
}
