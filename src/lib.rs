// ==========================================
// 批量导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 商品目录批量导入（分段批次、行视图、批次提交辅助、媒体去重）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 文件、批次、辅助、媒体
pub mod importer;

// 配置层 - 运行配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AbortLevel, ImportEntityType, ImportMessageType, RelatedEntityType};

// 领域实体
pub use domain::{
    EntityRef, ImportEntity, ImportFile, ImportProfile, ImportResult, Sluggable, StoreRestricted,
};

// 导入
pub use importer::{
    DataImportRequest, DataImporter, DataImporterServices, ImportError, ImportExecuteContext,
    ImportRow, ImportRunReport, ImporterResult, MediaImporter,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "批量导入引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
