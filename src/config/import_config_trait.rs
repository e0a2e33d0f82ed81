// ==========================================
// 批量导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入运行所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含导入流程逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ===== 默认值 =====
pub const DEFAULT_DOWNLOAD_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;
pub const DEFAULT_LOCALE: &str = "zh-CN";

/// 默认数据根目录: <系统数据目录>/catalog-import
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("catalog-import")
}

// ==========================================
// ImportSettings - 单次运行的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub download_cache_capacity: usize, // URL 去重缓存上限（条）
    pub download_concurrency: usize,    // 单个子批次的并发下载数
    pub locale: String,                 // 用户可见消息的语言
    pub data_root: PathBuf,             // 导入配置目录的根
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            download_cache_capacity: DEFAULT_DOWNLOAD_CACHE_CAPACITY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            locale: DEFAULT_LOCALE.to_string(),
            data_root: default_data_root(),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// URL 去重缓存上限
    ///
    /// # 默认值
    /// - 1000
    async fn get_download_cache_capacity(&self) -> ConfigResult<usize>;

    /// 并发下载数
    ///
    /// # 默认值
    /// - 4
    async fn get_download_concurrency(&self) -> ConfigResult<usize>;

    /// 消息语言（"zh-CN" 或 "en"）
    async fn get_locale(&self) -> ConfigResult<String>;

    /// 数据根目录
    async fn get_data_root(&self) -> ConfigResult<PathBuf>;

    /// 一次性读取运行配置快照
    async fn load_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            download_cache_capacity: self.get_download_cache_capacity().await?,
            download_concurrency: self.get_download_concurrency().await?,
            locale: self.get_locale().await?,
            data_root: self.get_data_root().await?,
        })
    }
}
