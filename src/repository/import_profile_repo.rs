// ==========================================
// 批量导入引擎 - 导入配置仓储
// ==========================================
// 对齐: db.rs import_profile 表
// 职责: 读取导入配置、写回最近一次运行汇总（result_info JSON）
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::import_result::SerializableImportResult;
use crate::domain::profile::{CsvConfiguration, ImportProfile};
use crate::domain::types::ImportEntityType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportProfileRepository Trait
// ==========================================
// 实现者: SqliteImportProfileRepository
#[async_trait]
pub trait ImportProfileRepository: Send + Sync {
    /// 按 ID 读取导入配置（不存在返回 None）
    async fn find_by_id(&self, profile_id: i64) -> RepositoryResult<Option<ImportProfile>>;

    /// 新增或覆盖导入配置
    async fn save(&self, profile: &ImportProfile) -> RepositoryResult<()>;

    /// 写回运行汇总
    ///
    /// # 返回
    /// - Err(NotFound): 配置不存在
    async fn update_result_info(
        &self,
        profile_id: i64,
        summary: &SerializableImportResult,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SqliteImportProfileRepository
// ==========================================
pub struct SqliteImportProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportProfileRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawProfile> {
        Ok(RawProfile {
            id: row.get(0)?,
            name: row.get(1)?,
            entity_type: row.get(2)?,
            folder_name: row.get(3)?,
            skip: row.get(4)?,
            take: row.get(5)?,
            key_field_names: row.get(6)?,
            column_map_json: row.get(7)?,
            csv_config_json: row.get(8)?,
            culture: row.get(9)?,
            enabled: row.get(10)?,
            result_info: row.get(11)?,
        })
    }
}

/// 数据库原始行（JSON 字段尚未解析）
struct RawProfile {
    id: i64,
    name: String,
    entity_type: String,
    folder_name: String,
    skip: i64,
    take: i64,
    key_field_names: String,
    column_map_json: Option<String>,
    csv_config_json: Option<String>,
    culture: String,
    enabled: bool,
    result_info: Option<String>,
}

impl RawProfile {
    fn into_profile(self) -> RepositoryResult<ImportProfile> {
        let entity_type = ImportEntityType::parse(&self.entity_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "entity_type".to_string(),
                message: format!("未知实体类型: {}", self.entity_type),
            }
        })?;

        let csv_config = match self.csv_config_json.as_deref() {
            Some(json) if !json.trim().is_empty() => {
                Some(serde_json::from_str::<CsvConfiguration>(json)?)
            }
            _ => None,
        };

        let result_info = match self.result_info.as_deref() {
            Some(json) if !json.trim().is_empty() => {
                Some(serde_json::from_str::<SerializableImportResult>(json)?)
            }
            _ => None,
        };

        Ok(ImportProfile {
            id: self.id,
            name: self.name,
            entity_type,
            folder_name: self.folder_name,
            skip: usize::try_from(self.skip).unwrap_or(0),
            take: usize::try_from(self.take).unwrap_or(0),
            key_field_names: self
                .key_field_names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            column_map_json: self.column_map_json,
            csv_config,
            culture: self.culture,
            enabled: self.enabled,
            result_info,
        })
    }
}

#[async_trait]
impl ImportProfileRepository for SqliteImportProfileRepository {
    async fn find_by_id(&self, profile_id: i64) -> RepositoryResult<Option<ImportProfile>> {
        let raw = {
            let conn = self.get_conn()?;
            conn.query_row(
                r#"
                SELECT id, name, entity_type, folder_name, skip_rows, take_rows,
                       key_field_names, column_map_json, csv_config_json, culture, enabled, result_info
                FROM import_profile
                WHERE id = ?1
                "#,
                params![profile_id],
                Self::map_row,
            )
            .optional()?
        };

        raw.map(RawProfile::into_profile).transpose()
    }

    async fn save(&self, profile: &ImportProfile) -> RepositoryResult<()> {
        let csv_config_json = profile
            .csv_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result_info = profile
            .result_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_profile (
                id, name, entity_type, folder_name, skip_rows, take_rows,
                key_field_names, column_map_json, csv_config_json, culture, enabled, result_info,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                entity_type = excluded.entity_type,
                folder_name = excluded.folder_name,
                skip_rows = excluded.skip_rows,
                take_rows = excluded.take_rows,
                key_field_names = excluded.key_field_names,
                column_map_json = excluded.column_map_json,
                csv_config_json = excluded.csv_config_json,
                culture = excluded.culture,
                enabled = excluded.enabled,
                result_info = excluded.result_info,
                updated_at = excluded.updated_at
            "#,
            params![
                profile.id,
                profile.name,
                profile.entity_type.as_str(),
                profile.folder_name,
                profile.skip as i64,
                profile.take as i64,
                profile.key_field_names.join(","),
                profile.column_map_json,
                csv_config_json,
                profile.culture,
                profile.enabled,
                result_info,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn update_result_info(
        &self,
        profile_id: i64,
        summary: &SerializableImportResult,
    ) -> RepositoryResult<()> {
        let json = serde_json::to_string(summary)?;

        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE import_profile SET result_info = ?1, updated_at = ?2 WHERE id = ?3",
            params![json, Utc::now().to_rfc3339(), profile_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportProfile".to_string(),
                id: profile_id.to_string(),
            });
        }
        Ok(())
    }
}
