// ==========================================
// 批量导入引擎 - 导入结果模型
// ==========================================
// 职责: 记录计数（总数/跳过/新增/修改）与消息日志
// 红线: errors / warnings / has_errors 始终由 messages 派生，不缓存
// ==========================================

use crate::domain::types::ImportMessageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ImportRowInfo - 消息关联的行信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowInfo {
    pub position: usize,             // 源文件中的行位置（从 1 开始）
    pub entity_name: Option<String>, // 实体显示名称（如果已知）
}

impl ImportRowInfo {
    pub fn new(position: usize, entity_name: Option<String>) -> Self {
        Self {
            position,
            entity_name,
        }
    }
}

impl fmt::Display for ImportRowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_name {
            Some(name) if !name.is_empty() => write!(f, "Pos: {}, Entity: {}", self.position, name),
            _ => write!(f, "Pos: {}", self.position),
        }
    }
}

// ==========================================
// ImportMessage - 导入消息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMessage {
    pub content: String,
    pub message_type: ImportMessageType,
    pub row_info: Option<ImportRowInfo>,
    pub field_name: Option<String>,
}

impl ImportMessage {
    pub fn new(content: impl Into<String>, message_type: ImportMessageType) -> Self {
        Self {
            content: content.into(),
            message_type,
            row_info: None,
            field_name: None,
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(content, ImportMessageType::Info)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(content, ImportMessageType::Warning)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(content, ImportMessageType::Error)
    }

    pub fn with_row(mut self, row_info: ImportRowInfo) -> Self {
        self.row_info = Some(row_info);
        self
    }

    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }
}

impl fmt::Display for ImportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.message_type, self.content)?;
        if let Some(row) = &self.row_info {
            write!(f, " ({})", row)?;
        }
        if let Some(field) = &self.field_name {
            write!(f, " [{}]", field)?;
        }
        Ok(())
    }
}

// ==========================================
// ImportResult - 单个文件组的导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub skipped_records: usize,
    pub new_records: usize,
    pub modified_records: usize,
    pub messages: Vec<ImportMessage>,
}

impl Default for ImportResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportResult {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            total_records: 0,
            skipped_records: 0,
            new_records: 0,
            modified_records: 0,
            messages: Vec::new(),
        }
    }

    /// 重置计数与消息，开始时间重新计时
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn affected_records(&self) -> usize {
        self.new_records + self.modified_records
    }

    pub fn errors(&self) -> usize {
        self.count_of(ImportMessageType::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count_of(ImportMessageType::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.message_type == ImportMessageType::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.message_type == ImportMessageType::Warning)
    }

    /// 最后一条错误消息
    pub fn last_error(&self) -> Option<&ImportMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.message_type == ImportMessageType::Error)
    }

    fn count_of(&self, message_type: ImportMessageType) -> usize {
        self.messages
            .iter()
            .filter(|m| m.message_type == message_type)
            .count()
    }

    pub fn add_message(&mut self, message: ImportMessage) -> &mut ImportMessage {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn add_info(&mut self, content: impl Into<String>) -> &mut ImportMessage {
        self.add_message(ImportMessage::info(content))
    }

    pub fn add_warning(&mut self, content: impl Into<String>) -> &mut ImportMessage {
        self.add_message(ImportMessage::warning(content))
    }

    pub fn add_error(&mut self, content: impl Into<String>) -> &mut ImportMessage {
        self.add_message(ImportMessage::error(content))
    }

    /// 带行信息与字段名的警告（行级错误口径）
    pub fn add_row_warning(
        &mut self,
        content: impl Into<String>,
        row_info: ImportRowInfo,
        field_name: impl Into<String>,
    ) {
        self.add_message(
            ImportMessage::warning(content)
                .with_row(row_info)
                .with_field(field_name),
        );
    }

    /// 生成可持久化的汇总快照
    pub fn to_serializable(&self) -> SerializableImportResult {
        SerializableImportResult {
            start_time: self.start_time,
            end_time: self.end_time,
            total_records: self.total_records,
            skipped_records: self.skipped_records,
            new_records: self.new_records,
            modified_records: self.modified_records,
            affected_records: self.affected_records(),
            errors: self.errors(),
            warnings: self.warnings(),
            last_error: self.last_error().map(|m| m.content.clone()),
        }
    }
}

// ==========================================
// SerializableImportResult - 写回导入配置的汇总
// ==========================================
// 用途: 仅持久化汇总，完整消息写入运行日志
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableImportResult {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub skipped_records: usize,
    pub new_records: usize,
    pub modified_records: usize,
    pub affected_records: usize,
    pub errors: usize,
    pub warnings: usize,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_derived_from_messages() {
        let mut result = ImportResult::new();
        assert!(!result.has_errors());

        result.add_info("start");
        result.add_warning("careful");
        result.add_error("boom");
        result.add_error("boom again");

        assert_eq!(result.errors(), 2);
        assert_eq!(result.warnings(), 1);
        assert!(result.has_errors());
        assert_eq!(result.last_error().unwrap().content, "boom again");

        result.messages.clear();
        assert_eq!(result.errors(), 0);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_affected_records() {
        let mut result = ImportResult::new();
        result.new_records = 3;
        result.modified_records = 4;
        assert_eq!(result.affected_records(), 7);
    }

    #[test]
    fn test_serializable_snapshot() {
        let mut result = ImportResult::new();
        result.total_records = 10;
        result.new_records = 6;
        result.modified_records = 2;
        result.add_row_warning("bad price", ImportRowInfo::new(4, None), "Price");
        result.add_error("failed");

        let snapshot = result.to_serializable();
        assert_eq!(snapshot.affected_records, 8);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.warnings, 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("failed"));

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SerializableImportResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_message_display() {
        let msg = ImportMessage::warning("Conversion failed")
            .with_row(ImportRowInfo::new(12, Some("Shirt".to_string())))
            .with_field("Price");
        assert_eq!(
            msg.to_string(),
            "[WARN] Conversion failed (Pos: 12, Entity: Shirt) [Price]"
        );
    }
}
