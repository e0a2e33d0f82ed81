// ==========================================
// 批量导入引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、实体能力接口
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod catalog;
pub mod entity;
pub mod import_file;
pub mod import_result;
pub mod media;
pub mod profile;
pub mod types;

// 重导出核心类型
pub use catalog::{
    ImportLanguage, ImportStore, LocalizedProperty, LocalizedPropertyChange, StoreMapping,
    StoreMappingChange, UrlRecord, UrlRecordChange,
};
pub use entity::{EntityRef, ImportEntity, Sluggable, StoreRestricted};
pub use import_file::ImportFile;
pub use import_result::{ImportMessage, ImportResult, ImportRowInfo, SerializableImportResult};
pub use media::{MediaAssignment, MediaFileInfo, NewMediaFile, CATALOG_ALBUM};
pub use profile::{CsvConfiguration, ImportProfile};
pub use types::{AbortLevel, ImportEntityType, ImportMessageType, RelatedEntityType};
