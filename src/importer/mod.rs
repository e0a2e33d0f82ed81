// ==========================================
// 批量导入引擎 - 导入层
// ==========================================
// 职责: 表格文件 → 分段批次 → 实体导入器；批次提交辅助；媒体导入
// 支持: Excel (.xlsx/.xls), CSV (.csv/.txt/.tab)
// ==========================================

// 模块声明
pub mod column_map;
pub mod context;
pub mod converter;
pub mod data_importer;
pub mod download_manager;
pub mod entity_importer_trait;
pub mod environment;
pub mod error;
pub mod events;
pub mod file_parser;
pub mod import_row;
pub mod localization_helper;
pub mod media_importer;
pub mod segmenter;
pub mod seo;
pub mod slug_helper;
pub mod store_mapping_helper;

// 重导出核心类型
pub use column_map::{ColumnMap, ColumnMappingEntry};
pub use context::{
    BoxError, DownloadCache, ImportDirectories, ImportExecuteContext, ProgressCallback, MAX_ERRORS,
};
pub use converter::{ConversionError, Culture, FromCell};
pub use data_importer::{
    DataImportRequest, DataImporter, DataImporterServices, ImportRunReport, MAIN_GROUP,
};
pub use download_manager::{create_download_item, DownloadItem, DownloadManager, HttpDownloadManager};
pub use error::{ImportError, ImporterResult};
pub use events::{
    CacheInvalidator, ImportEvent, ImportEventPublisher, ImportEventType, NoOpCacheInvalidator,
    NoOpImportEventPublisher,
};
pub use file_parser::{DataRow, DataTable, FileTableReader, InMemoryTable, TableReader};
pub use import_row::{ImportRow, EXPLICIT_IGNORE, EXPLICIT_NULL};
pub use localization_helper::process_localizations;
pub use media_importer::{
    ImportResultMediaHandler, MediaImporter, MediaMessage, MediaMessageHandler,
    TracingMediaHandler,
};
pub use segmenter::{DataSegmenter, BATCH_SIZE};
pub use slug_helper::process_slugs;
pub use store_mapping_helper::process_store_mappings;

// 重导出 Trait 接口
pub use entity_importer_trait::{EntityImporter, EntityImporterFactory};
pub use environment::{
    ImportDirectoryProvider, ImportEnvironment, LocalDirectoryProvider, StaticImportEnvironment,
};
