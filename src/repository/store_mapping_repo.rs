// ==========================================
// 批量导入引擎 - 店铺映射仓储
// ==========================================
// 对齐: db.rs store_mapping 表
// ==========================================

use crate::domain::catalog::{StoreMapping, StoreMappingChange};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{build_in_placeholders, distinct_ids, entity_id_params};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

#[async_trait]
pub trait StoreMappingStore: Send + Sync {
    async fn load_for_entities(
        &self,
        entity_name: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<StoreMapping>>;

    async fn apply_changes(&self, changes: Vec<StoreMappingChange>) -> RepositoryResult<usize>;
}

pub struct SqliteStoreMappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStoreMappingStore {
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
impl StoreMappingStore for SqliteStoreMappingStore {
    async fn load_for_entities(
        &self,
        entity_name: &str,
        entity_ids: &[i64],
    ) -> RepositoryResult<Vec<StoreMapping>> {
        let ids = distinct_ids(entity_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, entity_id, entity_name, store_id FROM store_mapping \
             WHERE entity_name = ?1 AND entity_id IN ({}) ORDER BY entity_id, store_id",
            build_in_placeholders(2, ids.len())
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(entity_id_params(entity_name, &ids)), |row| {
            Ok(StoreMapping {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                entity_name: row.get(2)?,
                store_id: row.get(3)?,
            })
        })?;

        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row?);
        }
        Ok(mappings)
    }

    async fn apply_changes(&self, changes: Vec<StoreMappingChange>) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for change in changes {
            count += match change {
                StoreMappingChange::Insert(m) => tx.execute(
                    "INSERT OR IGNORE INTO store_mapping (entity_id, entity_name, store_id) \
                     VALUES (?1, ?2, ?3)",
                    params![m.entity_id, m.entity_name, m.store_id],
                )?,
                StoreMappingChange::Delete(id) => {
                    tx.execute("DELETE FROM store_mapping WHERE id = ?1", params![id])?
                }
            };
        }

        tx.commit()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn mapping(entity_id: i64, store_id: i64) -> StoreMapping {
        StoreMapping {
            id: 0,
            entity_id,
            entity_name: "Product".to_string(),
            store_id,
        }
    }

    #[tokio::test]
    async fn test_insert_delete() {
        let store = SqliteStoreMappingStore::new(setup_test_db());
        let count = store
            .apply_changes(vec![
                StoreMappingChange::Insert(mapping(1, 1)),
                StoreMappingChange::Insert(mapping(1, 2)),
                // 重复映射忽略
                StoreMappingChange::Insert(mapping(1, 2)),
            ])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let loaded = store.load_for_entities("Product", &[1]).await.unwrap();
        assert_eq!(loaded.iter().map(|m| m.store_id).collect::<Vec<_>>(), vec![1, 2]);

        store
            .apply_changes(vec![StoreMappingChange::Delete(loaded[0].id)])
            .await
            .unwrap();
        assert_eq!(store.load_for_entities("Product", &[1]).await.unwrap().len(), 1);
    }
}
