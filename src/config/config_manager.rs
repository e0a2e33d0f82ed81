// ==========================================
// 批量导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    default_data_root, ConfigResult, ImportConfigReader, DEFAULT_DOWNLOAD_CACHE_CAPACITY,
    DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_LOCALE,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取正整数配置；格式错误或为 0 时回退默认值
    fn get_positive_or_default(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.trim().parse::<usize>() {
            Ok(v) if v > 0 => Ok(v),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_download_cache_capacity(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(
            config_keys::DOWNLOAD_CACHE_CAPACITY,
            DEFAULT_DOWNLOAD_CACHE_CAPACITY,
        )
    }

    async fn get_download_concurrency(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::DOWNLOAD_CONCURRENCY, DEFAULT_DOWNLOAD_CONCURRENCY)
    }

    async fn get_locale(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::LOCALE, DEFAULT_LOCALE)?;
        match value.trim() {
            "en" | "en-US" => Ok("en".to_string()),
            "zh-CN" | "zh" => Ok("zh-CN".to_string()),
            other => {
                tracing::warn!(config_key = config_keys::LOCALE, raw_value = %other, "不支持的语言，使用默认值");
                Ok(DEFAULT_LOCALE.to_string())
            }
        }
    }

    async fn get_data_root(&self) -> ConfigResult<PathBuf> {
        Ok(self
            .get_config_value(config_keys::DATA_ROOT)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_root))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 媒体下载
    pub const DOWNLOAD_CACHE_CAPACITY: &str = "import.download_cache_capacity";
    pub const DOWNLOAD_CONCURRENCY: &str = "import.download_concurrency";

    // 消息语言
    pub const LOCALE: &str = "import.locale";

    // 导入目录
    pub const DATA_ROOT: &str = "import.data_root";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let manager = setup_manager();
        let settings = manager.load_settings().await.unwrap();

        assert_eq!(settings.download_cache_capacity, 1000);
        assert_eq!(settings.download_concurrency, 4);
        assert_eq!(settings.locale, "zh-CN");
        assert!(settings.data_root.ends_with("catalog-import"));
    }

    #[tokio::test]
    async fn test_overrides() {
        let manager = setup_manager();
        manager
            .set_global_config_value(config_keys::DOWNLOAD_CACHE_CAPACITY, "2")
            .unwrap();
        manager.set_global_config_value(config_keys::LOCALE, "en").unwrap();
        manager
            .set_global_config_value(config_keys::DATA_ROOT, "/srv/import")
            .unwrap();

        let settings = manager.load_settings().await.unwrap();
        assert_eq!(settings.download_cache_capacity, 2);
        assert_eq!(settings.locale, "en");
        assert_eq!(settings.data_root, PathBuf::from("/srv/import"));
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back() {
        let manager = setup_manager();
        manager
            .set_global_config_value(config_keys::DOWNLOAD_CONCURRENCY, "zero")
            .unwrap();
        manager.set_global_config_value(config_keys::LOCALE, "xx").unwrap();

        assert_eq!(manager.get_download_concurrency().await.unwrap(), 4);
        assert_eq!(manager.get_locale().await.unwrap(), "zh-CN");
    }
}
