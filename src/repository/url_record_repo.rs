// ==========================================
// 批量导入引擎 - URL 记录仓储
// ==========================================
// 对齐: db.rs url_record 表
// 口径: 旧 slug 只停用不删除（保留历史，用于重定向）
// ==========================================

use crate::domain::catalog::{UrlRecord, UrlRecordChange};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{build_in_placeholders, distinct_ids, entity_id_params};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

#[async_trait]
pub trait UrlRecordStore: Send + Sync {
    /// 预取一批实体的全部 URL 记录（含已停用）
    async fn load_for_entities(
        &self,
        entity_name: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<UrlRecord>>;

    /// 按 slug 批量查询（大小写不敏感，任意实体）
    async fn find_by_slugs(&self, slugs: &[String]) -> RepositoryResult<Vec<UrlRecord>>;

    async fn apply_changes(&self, changes: Vec<UrlRecordChange>) -> RepositoryResult<usize>;
}

pub struct SqliteUrlRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUrlRecordStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
        Ok(UrlRecord {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            entity_name: row.get(2)?,
            slug: row.get(3)?,
            language_id: row.get(4)?,
            is_active: row.get(5)?,
        })
    }

    fn query(&self, sql: &str, values: Vec<Value>) -> RepositoryResult<Vec<UrlRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values), Self::map_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

const SELECT_COLUMNS: &str = "SELECT id, entity_id, entity_name, slug, language_id, is_active FROM url_record";

#[async_trait]
impl UrlRecordStore for SqliteUrlRecordStore {
    async fn load_for_entities(
        &self,
        entity_name: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<UrlRecord>> {
        let ids = distinct_ids(entity_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE entity_name = ?1 AND entity_id IN ({}) ORDER BY entity_id, language_id, id",
            SELECT_COLUMNS,
            build_in_placeholders(2, ids.len())
        );
        self.query(&sql, entity_id_params(entity_name, &ids))
    }

    async fn find_by_slugs(&self, slugs: &[String]) -> RepositoryResult<Vec<UrlRecord>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE lower(slug) IN ({}) ORDER BY id",
            SELECT_COLUMNS,
            build_in_placeholders(1, slugs.len())
        );
        let values = slugs.iter().map(|s| Value::Text(s.to_lowercase())).collect();
        self.query(&sql, values)
    }

    async fn apply_changes(&self, changes: Vec<UrlRecordChange>) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for change in changes {
            count += match change {
                UrlRecordChange::Insert(r) => tx.execute(
                    "INSERT INTO url_record (entity_id, entity_name, slug, language_id, is_active) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![r.entity_id, r.entity_name, r.slug, r.language_id, r.is_active],
                )?,
                UrlRecordChange::Deactivate(id) => tx.execute(
                    "UPDATE url_record SET is_active = 0 WHERE id = ?1",
                    params![id],
                )?,
                UrlRecordChange::Activate(id) => tx.execute(
                    "UPDATE url_record SET is_active = 1 WHERE id = ?1",
                    params![id],
                )?,
            };
        }

        tx.commit()?;
        Ok(count)
    }
}
