// ==========================================
// 批量导入引擎 - 本地化属性仓储
// ==========================================
// 对齐: db.rs localized_property 表
// 职责: 按实体批量预取、按批次事务化提交变更
// ==========================================

use crate::domain::catalog::{LocalizedProperty, LocalizedPropertyChange};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{build_in_placeholders, distinct_ids, entity_id_params};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// LocalizedPropertyStore Trait
// ==========================================
#[async_trait]
pub trait LocalizedPropertyStore: Send + Sync {
    /// 预取一批实体的全部本地化属性
    async fn load_for_entities(
        &self,
        key_group: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<LocalizedProperty>>;

    /// 单事务提交变更，返回受影响记录数
    async fn apply_changes(&self, changes: Vec<LocalizedPropertyChange>) -> RepositoryResult<usize>;
}

// ==========================================
// SqliteLocalizedPropertyStore
// ==========================================
pub struct SqliteLocalizedPropertyStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLocalizedPropertyStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl LocalizedPropertyStore for SqliteLocalizedPropertyStore {
    async fn load_for_entities(
        &self,
        key_group: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<LocalizedProperty>> {
        let ids = distinct_ids(entity_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id, entity_id, language_id, locale_key_group, locale_key, locale_value
            FROM localized_property
            WHERE locale_key_group = ?1 AND entity_id IN ({})
            ORDER BY entity_id, language_id, locale_key
            "#,
            build_in_placeholders(2, ids.len())
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(entity_id_params(key_group, &ids)), |row| {
            Ok(LocalizedProperty {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                language_id: row.get(2)?,
                locale_key_group: row.get(3)?,
                locale_key: row.get(4)?,
                locale_value: row.get(5)?,
            })
        })?;

        let mut properties = Vec::new();
        for row in rows {
            properties.push(row?);
        }
        Ok(properties)
    }

    async fn apply_changes(&self, changes: Vec<LocalizedPropertyChange>) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for change in changes {
            count += match change {
                LocalizedPropertyChange::Insert(p) => tx.execute(
                    r#"
                    INSERT INTO localized_property (
                        entity_id, language_id, locale_key_group, locale_key, locale_value
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        p.entity_id,
                        p.language_id,
                        p.locale_key_group,
                        p.locale_key,
                        p.locale_value
                    ],
                )?,
                LocalizedPropertyChange::Update(p) => tx.execute(
                    "UPDATE localized_property SET locale_value = ?1 WHERE id = ?2",
                    params![p.locale_value, p.id],
                )?,
                LocalizedPropertyChange::Delete(id) => {
                    tx.execute("DELETE FROM localized_property WHERE id = ?1", params![id])?
                }
            };
        }

        tx.commit()?;
        Ok(count)
    }
}
