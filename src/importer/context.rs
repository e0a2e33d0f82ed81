// ==========================================
// 批量导入引擎 - 运行上下文
// ==========================================
// 职责: 单次导入运行的可变状态（当前文件、分段器、结果、中止标记、目录、语言/店铺）
// 红线: abort() 为计算值：已取消或失败数超限 → Hard，否则为显式设置的值
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import_file::ImportFile;
use crate::domain::import_result::ImportResult;
use crate::domain::catalog::{ImportLanguage, ImportStore};
use crate::domain::types::{AbortLevel, ImportEntityType};
use crate::i18n::Labels;
use crate::importer::column_map::ColumnMap;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::segmenter::DataSegmenter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 失败阈值：错误数超过该值即强制中止
pub const MAX_ERRORS: usize = 11;

/// 回调错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 进度回调: (当前值, 最大值, 消息)
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) -> Result<(), BoxError> + Send + Sync>;

// ==========================================
// DownloadCache - 运行级 URL 去重缓存
// ==========================================
// 口径: 达到上限时整体清空后继续填充（不做 LRU）
#[derive(Debug, Clone)]
pub struct DownloadCache {
    capacity: usize,
    entries: HashMap<String, String>, // url → 本地文件名
}

impl DownloadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn insert(&mut self, url: impl Into<String>, file_name: impl Into<String>) {
        let url = url.into();
        if !self.entries.contains_key(&url) && self.entries.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "下载缓存已满，清空后重新填充");
            self.entries.clear();
        }
        self.entries.insert(url, file_name.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ==========================================
// ImportDirectories - 运行级目录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirectories {
    pub profile_dir: PathBuf,        // 导入配置目录（运行日志所在）
    pub import_dir: PathBuf,         // 待导入文件目录
    pub image_dir: PathBuf,          // 本地图片目录（相对路径以此为基准）
    pub image_download_dir: PathBuf, // 图片下载目录
}

impl ImportDirectories {
    /// 按约定布局: <profile>/Content、<profile>/Content/Images、<profile>/Content/Downloads
    pub fn for_profile(profile_dir: impl Into<PathBuf>) -> Self {
        let profile_dir = profile_dir.into();
        let import_dir = profile_dir.join("Content");
        Self {
            image_dir: import_dir.join("Images"),
            image_download_dir: import_dir.join("Downloads"),
            import_dir,
            profile_dir,
        }
    }
}

// ==========================================
// ImportExecuteContext
// ==========================================
pub struct ImportExecuteContext {
    run_id: Uuid,
    entity_type: ImportEntityType,
    settings: ImportSettings,
    labels: Labels,
    cancel: CancellationToken,
    abort: AbortLevel,
    file: Option<ImportFile>,
    segmenter: Option<DataSegmenter>,
    progress: Option<ProgressCallback>,
    progress_message: String,

    pub column_map: Arc<ColumnMap>,
    pub key_field_names: Vec<String>,
    pub entities_to_import: Vec<i64>, // 为空 = 导入全部
    pub languages: Vec<ImportLanguage>,
    pub stores: Vec<ImportStore>,
    pub directories: ImportDirectories,
    pub result: ImportResult,
    pub download_cache: DownloadCache,
    pub custom_data: HashMap<String, serde_json::Value>,
    pub clear_cache: bool, // 运行结束时是否清理缓存
}

impl ImportExecuteContext {
    pub fn new(
        run_id: Uuid,
        entity_type: ImportEntityType,
        settings: ImportSettings,
        cancel: CancellationToken,
    ) -> Self {
        let labels = Labels::new(settings.locale.clone());
        let download_cache = DownloadCache::new(settings.download_cache_capacity);
        let directories = ImportDirectories::for_profile(settings.data_root.clone());

        Self {
            run_id,
            entity_type,
            labels,
            cancel,
            abort: AbortLevel::None,
            file: None,
            segmenter: None,
            progress: None,
            progress_message: String::new(),
            column_map: Arc::new(ColumnMap::new()),
            key_field_names: vec!["Id".to_string()],
            entities_to_import: Vec::new(),
            languages: Vec::new(),
            stores: Vec::new(),
            directories,
            result: ImportResult::new(),
            download_cache,
            custom_data: HashMap::new(),
            clear_cache: false,
            settings,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn entity_type(&self) -> ImportEntityType {
        self.entity_type
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // ===== 中止控制 =====

    /// 当前中止级别（计算值）
    pub fn abort(&self) -> AbortLevel {
        if self.is_cancelled() || self.is_max_failures() {
            AbortLevel::Hard
        } else {
            self.abort
        }
    }

    pub fn set_abort(&mut self, level: AbortLevel) {
        self.abort = level;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 错误数是否超过阈值
    pub fn is_max_failures(&self) -> bool {
        self.result.errors() > MAX_ERRORS
    }

    // ===== 当前文件与分段器 =====

    pub fn file(&self) -> Option<&ImportFile> {
        self.file.as_ref()
    }

    pub fn segmenter(&self) -> ImporterResult<&DataSegmenter> {
        self.segmenter
            .as_ref()
            .ok_or(ImportError::MissingContext("数据分段器"))
    }

    pub fn segmenter_mut(&mut self) -> ImporterResult<&mut DataSegmenter> {
        self.segmenter
            .as_mut()
            .ok_or(ImportError::MissingContext("数据分段器"))
    }

    /// 切换当前文件
    pub fn set_current_file(&mut self, file: ImportFile, segmenter: DataSegmenter) {
        self.file = Some(file);
        self.segmenter = Some(segmenter);
    }

    /// 释放当前文件（分段器随之销毁）
    pub fn clear_current_file(&mut self) {
        self.file = None;
        self.segmenter = None;
    }

    // ===== 语言 / 店铺 =====

    pub fn language_by_culture(&self, culture: &str) -> Option<&ImportLanguage> {
        self.languages
            .iter()
            .find(|l| l.culture.eq_ignore_ascii_case(culture))
    }

    pub fn has_store(&self, store_id: i64) -> bool {
        self.stores.iter().any(|s| s.id == store_id)
    }

    // ===== 进度 =====

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress = callback;
    }

    /// 上报进度；回调失败只记 debug 日志
    pub fn set_progress(&self, value: usize, max: usize) {
        self.report_progress(value, max, &self.progress_message);
    }

    pub fn set_progress_message(&mut self, message: impl Into<String>) {
        self.progress_message = message.into();
        self.report_progress(0, 0, &self.progress_message);
    }

    fn report_progress(&self, value: usize, max: usize, message: &str) {
        if let Some(callback) = &self.progress {
            if let Err(e) = callback(value, max, message) {
                tracing::debug!(run_id = %self.run_id, error = %e, "进度回调失败，已忽略");
            }
        }
    }
}
