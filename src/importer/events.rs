// ==========================================
// 批量导入引擎 - 运行通知
// ==========================================
// 职责: 运行开始/结束事件发布、缓存失效钩子
// 说明: 下游订阅者（缓存失效、完成邮件）通过 trait 接入，导入核心只负责调用点
// ==========================================

use crate::domain::import_result::SerializableImportResult;
use crate::domain::types::ImportEntityType;
use crate::importer::context::BoxError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// 导入事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportEventType {
    /// 运行开始（首个文件打开前）
    ImportStarted,
    /// 运行结束（收尾阶段）
    ImportCompleted,
}

impl ImportEventType {
    pub fn as_str(&self) -> &str {
        match self {
            ImportEventType::ImportStarted => "ImportStarted",
            ImportEventType::ImportCompleted => "ImportCompleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    pub run_id: Uuid,
    pub profile_id: i64,
    /// 配置加载失败时为 None
    pub entity_type: Option<ImportEntityType>,
    pub event_type: ImportEventType,
    pub occurred_at: DateTime<Utc>,
    /// 主结果汇总（仅 ImportCompleted 携带）
    pub summary: Option<SerializableImportResult>,
}

impl ImportEvent {
    pub fn started(run_id: Uuid, profile_id: i64, entity_type: ImportEntityType) -> Self {
        Self {
            run_id,
            profile_id,
            entity_type: Some(entity_type),
            event_type: ImportEventType::ImportStarted,
            occurred_at: Utc::now(),
            summary: None,
        }
    }

    pub fn completed(
        run_id: Uuid,
        profile_id: i64,
        entity_type: Option<ImportEntityType>,
        summary: SerializableImportResult,
    ) -> Self {
        Self {
            run_id,
            profile_id,
            entity_type,
            event_type: ImportEventType::ImportCompleted,
            occurred_at: Utc::now(),
            summary: Some(summary),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================
pub trait ImportEventPublisher: Send + Sync {
    fn publish(&self, event: ImportEvent) -> Result<(), BoxError>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpImportEventPublisher;

impl ImportEventPublisher for NoOpImportEventPublisher {
    fn publish(&self, event: ImportEvent) -> Result<(), BoxError> {
        tracing::debug!(
            "NoOpImportEventPublisher: 跳过事件发布 - run_id={}, event_type={}",
            event.run_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

// ==========================================
// 缓存失效 Trait
// ==========================================
// 调用时机: 收尾阶段，且上下文 clear_cache = true
pub trait CacheInvalidator: Send + Sync {
    fn clear_caches(&self, entity_type: ImportEntityType) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Default)]
pub struct NoOpCacheInvalidator;

impl CacheInvalidator for NoOpCacheInvalidator {
    fn clear_caches(&self, entity_type: ImportEntityType) -> Result<(), BoxError> {
        tracing::debug!("NoOpCacheInvalidator: 跳过缓存清理 - entity_type={}", entity_type);
        Ok(())
    }
}
