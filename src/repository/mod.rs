// ==========================================
// 批量导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供导入所需的数据访问接口（批次级预取、批次级事务提交）
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_profile_repo;
pub mod localized_property_repo;
pub mod media_repo;
pub mod sql_utils;
pub mod store_mapping_repo;
pub mod url_record_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_profile_repo::{ImportProfileRepository, SqliteImportProfileRepository};
pub use localized_property_repo::{LocalizedPropertyStore, SqliteLocalizedPropertyStore};
pub use media_repo::{MediaStore, SqliteMediaStore};
pub use store_mapping_repo::{SqliteStoreMappingStore, StoreMappingStore};
pub use url_record_repo::{SqliteUrlRecordStore, UrlRecordStore};
