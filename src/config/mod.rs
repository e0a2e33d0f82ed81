// ==========================================
// 批量导入引擎 - 配置层
// ==========================================
// 职责: 导入运行配置读取（缓存上限、并发、语言、数据目录）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportConfigReader, ImportSettings};
