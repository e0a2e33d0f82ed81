// ==========================================
// 批量导入引擎 - 导入编排器
// ==========================================
// 职责: 单次导入运行的完整流程
// 流程: 准备 → 发布开始事件 → 按文件组处理（分段 → 批次导入器）→ 收尾
// 红线:
// - 收尾阶段总是执行，每一步单独兜底，失败只记日志
// - 批次严格串行，每个批次由工厂创建新的导入器
// - 运行中观察到取消时，收尾后返回 Err(Cancelled)
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::import_file::ImportFile;
use crate::domain::import_result::ImportResult;
use crate::domain::profile::ImportProfile;
use crate::domain::types::{AbortLevel, ImportEntityType, RelatedEntityType};
use crate::i18n::Labels;
use crate::importer::column_map::ColumnMap;
use crate::importer::context::{ImportExecuteContext, ProgressCallback, MAX_ERRORS};
use crate::importer::converter::Culture;
use crate::importer::entity_importer_trait::EntityImporterFactory;
use crate::importer::environment::{ImportDirectoryProvider, ImportEnvironment};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::events::{CacheInvalidator, ImportEvent, ImportEventPublisher};
use crate::importer::file_parser::TableReader;
use crate::importer::segmenter::DataSegmenter;
use crate::repository::ImportProfileRepository;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 主文件组名称
pub const MAIN_GROUP: &str = "main";

/// 运行日志文件名（位于导入配置目录）
pub const RUN_LOG_FILE_NAME: &str = "log.txt";

// ==========================================
// DataImportRequest - 运行请求
// ==========================================
pub struct DataImportRequest {
    pub profile_id: i64,
    pub has_permission: bool,
    pub entities_to_import: Vec<i64>, // 为空 = 导入全部
    pub progress: Option<ProgressCallback>,
    pub custom_data: HashMap<String, serde_json::Value>,
}

impl DataImportRequest {
    pub fn new(profile_id: i64) -> Self {
        Self {
            profile_id,
            has_permission: true,
            entities_to_import: Vec::new(),
            progress: None,
            custom_data: HashMap::new(),
        }
    }
}

// ==========================================
// ImportRunReport - 运行报告
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportRunReport {
    pub run_id: Uuid,
    pub results: Vec<(String, ImportResult)>, // (文件组, 结果)，主文件组在前
}

impl ImportRunReport {
    /// 主文件组结果
    pub fn main(&self) -> Option<&ImportResult> {
        self.get(MAIN_GROUP)
    }

    pub fn get(&self, group: &str) -> Option<&ImportResult> {
        self.results
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, result)| result)
    }
}

// ==========================================
// DataImporterServices - 编排器依赖
// ==========================================
#[derive(Clone)]
pub struct DataImporterServices {
    pub profiles: Arc<dyn ImportProfileRepository>,
    pub directories: Arc<dyn ImportDirectoryProvider>,
    pub table_reader: Arc<dyn TableReader>,
    pub importers: Arc<dyn EntityImporterFactory>,
    pub environment: Arc<dyn ImportEnvironment>,
    pub config: Arc<dyn ImportConfigReader>,
    pub events: Arc<dyn ImportEventPublisher>,
    pub cache: Arc<dyn CacheInvalidator>,
}

/// 准备阶段产物
struct PreparedRun {
    profile: ImportProfile,
    ctx: ImportExecuteContext,
    files: Vec<ImportFile>,
}

// ==========================================
// DataImporter
// ==========================================
pub struct DataImporter {
    services: DataImporterServices,
}

impl DataImporter {
    pub fn new(services: DataImporterServices) -> Self {
        Self { services }
    }

    /// 执行一次导入运行
    ///
    /// # 返回
    /// - Ok(report): 运行结束（含文件级错误，详见各组结果）
    /// - Err(Cancelled): 运行期间收到取消（收尾已完成，汇总已写回）
    #[instrument(skip_all, fields(profile_id = request.profile_id))]
    pub async fn run_import(
        &self,
        request: DataImportRequest,
        cancel: CancellationToken,
    ) -> ImporterResult<ImportRunReport> {
        let run_id = Uuid::new_v4();
        let profile_id = request.profile_id;
        let settings = self.load_settings().await;
        let labels = Labels::new(settings.locale.clone());

        info!(run_id = %run_id, "导入运行开始");

        let mut report = ImportRunReport {
            run_id,
            results: Vec::new(),
        };

        match self.prepare(run_id, request, settings, cancel.clone()).await {
            Ok(mut prepared) => {
                self.process_files(&mut prepared, &mut report.results).await;

                let ctx = &mut prepared.ctx;
                self.finalize(
                    run_id,
                    &prepared.profile,
                    Some(ctx.directories.profile_dir.as_path()),
                    &report.results,
                )
                .await;

                if ctx.clear_cache {
                    if let Err(e) = self.services.cache.clear_caches(ctx.entity_type()) {
                        warn!(run_id = %run_id, error = %e, "缓存清理失败");
                    }
                }
                ctx.custom_data.clear();
                ctx.download_cache.clear();
                let finished = ctx.labels().get("import.finished");
                ctx.set_progress_message(finished);
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "导入准备失败");

                let content = match &e {
                    ImportError::PermissionDenied => labels.get("import.permission_denied"),
                    other => labels.format("import.setup_failed", &[("error", &other.to_string())]),
                };
                let mut result = ImportResult::new();
                result.add_error(content);
                result.end_time = Some(Utc::now());
                report.results.push((MAIN_GROUP.to_string(), result));

                self.finalize_without_profile(run_id, profile_id, &report.results)
                    .await;
            }
        }

        if cancel.is_cancelled() {
            warn!(run_id = %run_id, "导入运行已取消");
            return Err(ImportError::Cancelled);
        }

        info!(run_id = %run_id, groups = report.results.len(), "导入运行结束");
        Ok(report)
    }

    /// 读取运行配置；失败时使用默认值
    async fn load_settings(&self) -> ImportSettings {
        match self.services.config.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "运行配置读取失败，使用默认值");
                ImportSettings::default()
            }
        }
    }

    // ==========================================
    // 准备阶段
    // ==========================================

    async fn prepare(
        &self,
        run_id: Uuid,
        request: DataImportRequest,
        settings: ImportSettings,
        cancel: CancellationToken,
    ) -> ImporterResult<PreparedRun> {
        if !request.has_permission {
            return Err(ImportError::PermissionDenied);
        }

        let profile = self
            .services
            .profiles
            .find_by_id(request.profile_id)
            .await?
            .ok_or(ImportError::ProfileNotFound(request.profile_id))?;

        if !profile.enabled {
            return Err(ImportError::ProfileDisabled(profile.id));
        }

        let directories = self
            .services
            .directories
            .resolve(&profile, &settings.data_root)?;
        let files = self.services.directories.list_import_files(&directories)?;

        let column_map = match profile.column_map_json.as_deref() {
            Some(json) => ColumnMap::from_json(json)?,
            None => ColumnMap::new(),
        };

        let languages = self.services.environment.languages().await?;
        let stores = self.services.environment.stores().await?;

        debug!(
            run_id = %run_id,
            files = files.len(),
            mappings = column_map.len(),
            languages = languages.len(),
            stores = stores.len(),
            "导入准备完成"
        );

        let mut ctx = ImportExecuteContext::new(run_id, profile.entity_type, settings, cancel);
        ctx.directories = directories;
        ctx.column_map = Arc::new(column_map);
        ctx.key_field_names = profile.key_field_names.clone();
        ctx.entities_to_import = request.entities_to_import;
        ctx.languages = languages;
        ctx.stores = stores;
        ctx.custom_data = request.custom_data;
        ctx.set_progress_callback(request.progress);

        Ok(PreparedRun {
            profile,
            ctx,
            files,
        })
    }

    // ==========================================
    // 文件处理
    // ==========================================

    async fn process_files(
        &self,
        prepared: &mut PreparedRun,
        results: &mut Vec<(String, ImportResult)>,
    ) {
        let PreparedRun {
            profile,
            ctx,
            files,
        } = prepared;

        let started = ctx.labels().format("import.started", &[("profile", &profile.name)]);
        ctx.set_progress_message(started);

        if let Err(e) = self.services.events.publish(ImportEvent::started(
            ctx.run_id(),
            profile.id,
            profile.entity_type,
        )) {
            warn!(run_id = %ctx.run_id(), error = %e, "开始事件发布失败");
        }

        if files.is_empty() {
            let message = ctx.labels().get("import.no_files");
            ctx.result.add_warning(message);
            ctx.result.end_time = Some(Utc::now());
            results.push((MAIN_GROUP.to_string(), std::mem::take(&mut ctx.result)));
            return;
        }

        let mut groups: BTreeMap<Option<RelatedEntityType>, Vec<ImportFile>> = BTreeMap::new();
        for file in files.drain(..) {
            groups.entry(file.related_type()).or_default().push(file);
        }

        'groups: for (related_type, mut group_files) in groups {
            if ctx.abort() == AbortLevel::Hard {
                break;
            }

            let group_name = related_type
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| MAIN_GROUP.to_string());
            ctx.result = ImportResult::new();
            group_files.sort_by(ImportFile::processing_order);

            // 关联文件组仅适用于商品导入
            if related_type.is_some() && profile.entity_type != ImportEntityType::Product {
                for file in &group_files {
                    let message = ctx.labels().format(
                        "import.unsupported_group",
                        &[("group", &group_name), ("file", &file.file_name())],
                    );
                    ctx.result.add_warning(message);
                }
                ctx.result.end_time = Some(Utc::now());
                results.push((group_name, std::mem::take(&mut ctx.result)));
                continue;
            }

            for file in group_files {
                if ctx.abort() == AbortLevel::Hard {
                    break;
                }

                let fatal = !file.exists();
                if fatal {
                    error!(run_id = %ctx.run_id(), file = %file.path().display(), "导入文件不存在");
                    let path = file.path().display().to_string();
                    let message = ctx.labels().format("import.file_not_found", &[("path", &path)]);
                    ctx.result.add_error(message);
                    ctx.set_abort(AbortLevel::Hard);
                } else if let Err(e) = self.process_file(profile, ctx, file.clone()).await {
                    error!(
                        run_id = %ctx.run_id(),
                        file = %file.file_name(),
                        error = %e,
                        "文件导入失败"
                    );
                    let message = ctx.labels().format(
                        "import.file_failed",
                        &[("file", &file.file_name()), ("error", &e.to_string())],
                    );
                    ctx.result.add_error(message);
                    ctx.set_abort(AbortLevel::Hard);
                }
                ctx.clear_current_file();

                self.after_file(ctx);

                if fatal {
                    results.push((group_name, std::mem::take(&mut ctx.result)));
                    break 'groups;
                }
            }

            results.push((group_name, std::mem::take(&mut ctx.result)));
        }
    }

    /// 处理单个文件：打开 → 分段 → 逐批次调用实体导入器
    async fn process_file(
        &self,
        profile: &ImportProfile,
        ctx: &mut ImportExecuteContext,
        file: ImportFile,
    ) -> ImporterResult<()> {
        info!(run_id = %ctx.run_id(), file = %file.file_name(), "开始导入文件");

        let csv_config = profile.csv_config.clone().unwrap_or_default();
        let table = self.services.table_reader.open_table(
            &file,
            &csv_config,
            profile.skip,
            profile.effective_take(),
        )?;

        let culture = if profile.culture.trim().is_empty() {
            Culture::invariant()
        } else {
            Culture::from_name(&profile.culture)
        };
        let segmenter = DataSegmenter::new(table, Arc::clone(&ctx.column_map), culture);
        ctx.result.total_records += segmenter.total_rows();

        let message = ctx
            .labels()
            .format("import.file_started", &[("file", &file.file_name())]);
        ctx.set_current_file(file, segmenter);
        ctx.set_progress_message(message);

        while ctx.abort() == AbortLevel::None && ctx.segmenter_mut()?.read_next_batch() {
            let mut importer = self.services.importers.create(ctx.entity_type())?;
            importer.execute(ctx).await?;

            let segmenter = ctx.segmenter()?;
            let (current, total) = (segmenter.current_segment(), segmenter.total_segments());
            debug!(
                run_id = %ctx.run_id(),
                segment = current,
                total_segments = total,
                errors = ctx.result.errors(),
                "批次处理完成"
            );
            ctx.set_progress(current, total);
        }

        Ok(())
    }

    /// 单个文件结束后的结果标记
    fn after_file(&self, ctx: &mut ImportExecuteContext) {
        ctx.result.end_time = Some(Utc::now());

        if ctx.is_max_failures() {
            let message = ctx
                .labels()
                .format("import.max_failures", &[("count", &MAX_ERRORS.to_string())]);
            ctx.result.add_warning(message);
        }
        if ctx.is_cancelled() {
            let message = ctx.labels().get("import.cancelled");
            ctx.result.add_warning(message);
        }
    }

    // ==========================================
    // 收尾阶段
    // ==========================================

    async fn finalize(
        &self,
        run_id: Uuid,
        profile: &ImportProfile,
        profile_dir: Option<&Path>,
        results: &[(String, ImportResult)],
    ) {
        let summary = main_result(results).map(ImportResult::to_serializable);

        if let Some(summary) = &summary {
            let event = ImportEvent::completed(
                run_id,
                profile.id,
                Some(profile.entity_type),
                summary.clone(),
            );
            if let Err(e) = self.services.events.publish(event) {
                warn!(run_id = %run_id, error = %e, "完成事件发布失败");
            }

            if let Err(e) = self
                .services
                .profiles
                .update_result_info(profile.id, summary)
                .await
            {
                warn!(run_id = %run_id, error = %e, "运行汇总写回失败");
            }
        }

        if let Some(dir) = profile_dir {
            let log = render_run_log(run_id, Some(profile), results);
            if let Err(e) = std::fs::write(dir.join(RUN_LOG_FILE_NAME), log) {
                warn!(run_id = %run_id, error = %e, "运行日志写入失败");
            }
        }
    }

    /// 准备失败时的收尾：配置可能不存在，只做事件与汇总写回
    async fn finalize_without_profile(
        &self,
        run_id: Uuid,
        profile_id: i64,
        results: &[(String, ImportResult)],
    ) {
        let Some(main) = main_result(results) else {
            return;
        };
        let summary = main.to_serializable();

        let event = ImportEvent::completed(run_id, profile_id, None, summary.clone());
        if let Err(e) = self.services.events.publish(event) {
            warn!(run_id = %run_id, error = %e, "完成事件发布失败");
        }

        if let Err(e) = self
            .services
            .profiles
            .update_result_info(profile_id, &summary)
            .await
        {
            debug!(run_id = %run_id, error = %e, "运行汇总未写回");
        }
    }
}

fn main_result(results: &[(String, ImportResult)]) -> Option<&ImportResult> {
    results
        .iter()
        .find(|(name, _)| name == MAIN_GROUP)
        .or_else(|| results.first())
        .map(|(_, result)| result)
}

/// 运行日志：每个文件组的计数与完整消息
fn render_run_log(
    run_id: Uuid,
    profile: Option<&ImportProfile>,
    results: &[(String, ImportResult)],
) -> String {
    let mut log = String::new();
    let _ = writeln!(log, "Run: {}", run_id);
    if let Some(profile) = profile {
        let _ = writeln!(
            log,
            "Profile: {} ({}, {})",
            profile.name, profile.id, profile.entity_type
        );
    }

    for (group, result) in results {
        let _ = writeln!(log);
        let _ = writeln!(log, "== {} ==", group);
        let _ = writeln!(log, "Started: {}", result.start_time.to_rfc3339());
        if let Some(end) = result.end_time {
            let _ = writeln!(log, "Finished: {}", end.to_rfc3339());
        }
        let _ = writeln!(
            log,
            "Total: {}, New: {}, Modified: {}, Skipped: {}, Errors: {}, Warnings: {}",
            result.total_records,
            result.new_records,
            result.modified_records,
            result.skipped_records,
            result.errors(),
            result.warnings()
        );
        for message in &result.messages {
            let _ = writeln!(log, "{}", message);
        }
    }

    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lookup() {
        let mut tier = ImportResult::new();
        tier.total_records = 2;
        let report = ImportRunReport {
            run_id: Uuid::new_v4(),
            results: vec![
                (MAIN_GROUP.to_string(), ImportResult::new()),
                ("TierPrice".to_string(), tier),
            ],
        };

        assert!(report.main().is_some());
        assert_eq!(report.get("TierPrice").unwrap().total_records, 2);
        assert!(report.get("missing").is_none());
    }

    #[test]
    fn test_main_result_falls_back_to_first_group() {
        let results = vec![("TierPrice".to_string(), ImportResult::new())];
        assert!(main_result(&results).is_some());
        assert!(main_result(&[]).is_none());
    }

    #[test]
    fn test_run_log_contains_messages() {
        let profile = ImportProfile::new(1, "Products", ImportEntityType::Product);
        let mut result = ImportResult::new();
        result.total_records = 3;
        result.add_warning("bad price");

        let log = render_run_log(
            Uuid::new_v4(),
            Some(&profile),
            &[(MAIN_GROUP.to_string(), result)],
        );
        assert!(log.contains("== main =="));
        assert!(log.contains("Total: 3"));
        assert!(log.contains("[WARN] bad price"));
    }
}
