// ==========================================
// 批量导入引擎 - 媒体文件仓储
// ==========================================
// 对齐: db.rs media_file / media_assignment 表
// 职责: 已分配文件预取、相册内按内容摘要查找、新文件批量保存、实体分配
// 存储: 文件复制到 <storage_root>/<album>/，重名时追加 -1、-2 后缀
// ==========================================

use crate::domain::entity::EntityRef;
use crate::domain::media::{MediaAssignment, MediaFileInfo, NewMediaFile};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{build_in_placeholders, distinct_ids, entity_id_params};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// 预取实体已分配的媒体文件
    async fn files_for_entities(
        &self,
        entities: &[EntityRef],
    ) -> RepositoryResult<HashMap<EntityRef, Vec<MediaFileInfo>>>;

    /// 相册内按内容摘要查找
    async fn find_in_album(
        &self,
        album: &str,
        content_hashes: &[String],
    ) -> RepositoryResult<Vec<MediaFileInfo>>;

    /// 单事务保存一批新文件，返回顺序与输入一致
    async fn save_batch(
        &self,
        album: &str,
        files: Vec<NewMediaFile>,
    ) -> RepositoryResult<Vec<MediaFileInfo>>;

    /// 单事务写入分配关系（已存在的忽略），返回新增数
    async fn assign(&self, assignments: Vec<MediaAssignment>) -> RepositoryResult<usize>;
}

// ==========================================
// SqliteMediaStore
// ==========================================
pub struct SqliteMediaStore {
    conn: Arc<Mutex<Connection>>,
    storage_root: PathBuf,
}

const FILE_COLUMNS: &str =
    "f.id, f.album, f.file_name, f.mime_type, f.size, f.content_hash, f.storage_path";

impl SqliteMediaStore {
    pub fn new(conn: Arc<Mutex<Connection>>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            conn,
            storage_root: storage_root.into(),
        }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从第 offset 列开始映射 media_file 列
    fn map_file(row: &Row<'_>, offset: usize) -> rusqlite::Result<MediaFileInfo> {
        Ok(MediaFileInfo {
            id: row.get(offset)?,
            album: row.get(offset + 1)?,
            file_name: row.get(offset + 2)?,
            mime_type: row.get(offset + 3)?,
            size: row.get::<_, i64>(offset + 4)?.max(0) as u64,
            content_hash: row.get(offset + 5)?,
            storage_path: row.get(offset + 6)?,
        })
    }

    /// 相册内不重名的文件名
    fn unique_file_name(
        tx: &Transaction<'_>,
        album: &str,
        file_name: &str,
        taken: &HashSet<String>,
    ) -> RepositoryResult<String> {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = file_name.to_string();
        let mut counter = 0;
        loop {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM media_file WHERE album = ?1 AND lower(file_name) = lower(?2)",
                    params![album, candidate],
                    |row| row.get(0),
                )
                .optional()?;

            if exists.is_none() && !taken.contains(&candidate.to_lowercase()) {
                return Ok(candidate);
            }

            counter += 1;
            candidate = format!("{}-{}{}", stem, counter, extension);
        }
    }

    fn save_batch_sync(
        &self,
        album: &str,
        files: Vec<NewMediaFile>,
        copied: &mut Vec<PathBuf>,
    ) -> RepositoryResult<Vec<MediaFileInfo>> {
        let album_dir = self.storage_root.join(album);
        std::fs::create_dir_all(&album_dir).map_err(|e| RepositoryError::StorageError {
            path: album_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut taken = HashSet::new();
        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            let file_name = Self::unique_file_name(&tx, album, &file.file_name, &taken)?;
            taken.insert(file_name.to_lowercase());

            let dest = album_dir.join(&file_name);
            std::fs::copy(&file.source_path, &dest).map_err(|e| RepositoryError::StorageError {
                path: file.source_path.display().to_string(),
                message: e.to_string(),
            })?;
            copied.push(dest.clone());

            let storage_path = dest.display().to_string();
            tx.execute(
                r#"
                INSERT INTO media_file (
                    album, file_name, mime_type, size, content_hash, storage_path, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    album,
                    file_name,
                    file.mime_type,
                    file.size as i64,
                    file.content_hash,
                    storage_path,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            saved.push(MediaFileInfo {
                id: tx.last_insert_rowid(),
                album: album.to_string(),
                file_name,
                mime_type: file.mime_type,
                size: file.size,
                content_hash: file.content_hash,
                storage_path,
            });
        }

        tx.commit()?;
        Ok(saved)
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn files_for_entities(
        &self,
        entities: &[EntityRef],
    ) -> RepositoryResult<HashMap<EntityRef, Vec<MediaFileInfo>>> {
        // 按实体名分组，每组一次查询
        let mut groups: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        for entity in entities {
            groups
                .entry(entity.entity_name.as_str())
                .or_default()
                .push(entity.entity_id);
        }

        let conn = self.get_conn()?;
        let mut result: HashMap<EntityRef, Vec<MediaFileInfo>> = HashMap::new();
        for (entity_name, ids) in groups {
            let ids = distinct_ids(&ids);
            if ids.is_empty() {
                continue;
            }

            let sql = format!(
                "SELECT a.entity_name, a.entity_id, {} FROM media_assignment a \
                 JOIN media_file f ON f.id = a.media_file_id \
                 WHERE a.entity_name = ?1 AND a.entity_id IN ({}) \
                 ORDER BY a.entity_id, a.display_order, f.id",
                FILE_COLUMNS,
                build_in_placeholders(2, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(entity_id_params(entity_name, &ids)), |row| {
                let entity = EntityRef::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
                Ok((entity, Self::map_file(row, 2)?))
            })?;

            for row in rows {
                let (entity, file) = row?;
                result.entry(entity).or_default().push(file);
            }
        }

        Ok(result)
    }

    async fn find_in_album(
        &self,
        album: &str,
        content_hashes: &[String],
    ) -> RepositoryResult<Vec<MediaFileInfo>> {
        if content_hashes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM media_file f WHERE f.album = ?1 AND f.content_hash IN ({}) ORDER BY f.id",
            FILE_COLUMNS,
            build_in_placeholders(2, content_hashes.len())
        );
        let values: Vec<Value> = std::iter::once(Value::Text(album.to_string()))
            .chain(content_hashes.iter().map(|h| Value::Text(h.clone())))
            .collect();

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| Self::map_file(row, 0))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    async fn save_batch(
        &self,
        album: &str,
        files: Vec<NewMediaFile>,
    ) -> RepositoryResult<Vec<MediaFileInfo>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut copied = Vec::new();
        let result = self.save_batch_sync(album, files, &mut copied);
        if result.is_err() {
            // 事务已回滚，清理已复制的文件
            for path in copied {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "清理媒体文件失败");
                }
            }
        }
        result
    }

    async fn assign(&self, assignments: Vec<MediaAssignment>) -> RepositoryResult<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for a in assignments {
            count += tx.execute(
                "INSERT OR IGNORE INTO media_assignment (entity_name, entity_id, media_file_id, display_order) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![a.entity.entity_name, a.entity.entity_id, a.media_file_id, a.display_order],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn new_file(dir: &Path, name: &str, content: &[u8]) -> NewMediaFile {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        NewMediaFile {
            source_path: path,
            file_name: name.to_string(),
            mime_type: Some("image/png".to_string()),
            size: content.len() as u64,
            content_hash: blake3::hash(content).to_hex().to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_batch_renames_duplicates() {
        let source = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let store = SqliteMediaStore::new(setup_test_db(), storage.path());

        let saved = store
            .save_batch(
                "catalog",
                vec![
                    new_file(source.path(), "a.png", b"one"),
                    new_file(source.path(), "a.png", b"two"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].file_name, "a.png");
        assert_eq!(saved[1].file_name, "a-1.png");
        assert!(storage.path().join("catalog").join("a-1.png").is_file());

        let found = store
            .find_in_album("catalog", &[saved[1].content_hash.clone()])
            .await
            .unwrap();
        assert_eq!(found, vec![saved[1].clone()]);
    }

    #[tokio::test]
    async fn test_assign_and_load() {
        let source = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let store = SqliteMediaStore::new(setup_test_db(), storage.path());

        let saved = store
            .save_batch("catalog", vec![new_file(source.path(), "b.png", b"bytes")])
            .await
            .unwrap();

        let entity = EntityRef::new("Product", 7);
        let assignment = MediaAssignment {
            entity: entity.clone(),
            media_file_id: saved[0].id,
            display_order: 1,
        };
        assert_eq!(store.assign(vec![assignment.clone()]).await.unwrap(), 1);
        assert_eq!(store.assign(vec![assignment]).await.unwrap(), 0);

        let files = store.files_for_entities(&[entity.clone()]).await.unwrap();
        assert_eq!(files[&entity].len(), 1);
        assert_eq!(files[&entity][0].file_name, "b.png");
    }

    #[tokio::test]
    async fn test_failed_copy_rolls_back() {
        let storage = TempDir::new().unwrap();
        let store = SqliteMediaStore::new(setup_test_db(), storage.path());

        let missing = NewMediaFile {
            source_path: storage.path().join("missing.png"),
            file_name: "missing.png".to_string(),
            mime_type: None,
            size: 0,
            content_hash: "00".to_string(),
        };
        let result = store.save_batch("catalog", vec![missing]).await;
        assert!(matches!(result, Err(RepositoryError::StorageError { .. })));
        assert!(store
            .find_in_album("catalog", &["00".to_string()])
            .await
            .unwrap()
            .is_empty());
    }
}
