// ==========================================
// 批量导入引擎 - 媒体导入
// ==========================================
// 流程:
// 1. 下载: 需要下载的 URL 去重后交给下载管理器（同一 URL 每次运行只下载一次）
// 2. 比对: 内容摘要 + 大小，先比对实体已分配文件，再比对相册
// 3. 保存: 剩余新文件一次批量保存（本次调用内相同内容只存一份）
// 4. 分配: 写入实体与文件的关联
// 口径: 单项问题交给 MediaMessageHandler，不使批次失败
// ==========================================

use crate::domain::entity::EntityRef;
use crate::domain::import_result::ImportResult;
use crate::domain::media::{MediaAssignment, MediaFileInfo, NewMediaFile};
use crate::i18n::Labels;
use crate::importer::context::DownloadCache;
use crate::importer::download_manager::{DownloadItem, DownloadManager};
use crate::importer::error::ImporterResult;
use crate::repository::MediaStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ==========================================
// MediaMessage - 媒体导入过程中的值得记录的结果
// ==========================================
#[derive(Debug, Clone, Copy)]
pub enum MediaMessage<'a> {
    DownloadFailed { item: &'a DownloadItem },
    FileMissing { item: &'a DownloadItem },
    ReadFailed { item: &'a DownloadItem, error: &'a str },
    /// 实体已分配了相同内容的文件
    SkippedAssigned { item: &'a DownloadItem },
    /// 相册中已有相同内容的文件，直接分配
    ReusedAlbum { item: &'a DownloadItem, file: &'a MediaFileInfo },
    /// 本次调用中已有相同内容的新文件
    DuplicateNew { item: &'a DownloadItem },
    Saved { count: usize },
}

pub trait MediaMessageHandler: Send {
    fn handle(&mut self, message: MediaMessage<'_>);
}

/// 写入导入结果：失败为警告，跳过/复用为提示
pub struct ImportResultMediaHandler<'a> {
    result: &'a mut ImportResult,
    labels: &'a Labels,
}

impl<'a> ImportResultMediaHandler<'a> {
    pub fn new(result: &'a mut ImportResult, labels: &'a Labels) -> Self {
        Self { result, labels }
    }
}

impl MediaMessageHandler for ImportResultMediaHandler<'_> {
    fn handle(&mut self, message: MediaMessage<'_>) {
        let labels = self.labels;
        match message {
            MediaMessage::DownloadFailed { item } => {
                let url = item.url.as_deref().unwrap_or_default();
                let error = item.error_message.as_deref().unwrap_or_default();
                self.result.add_warning(
                    labels.format("media.download_failed", &[("url", url), ("error", error)]),
                );
            }
            MediaMessage::FileMissing { item } => {
                let path = item.path.display().to_string();
                self.result
                    .add_warning(labels.format("media.file_missing", &[("path", &path)]));
            }
            MediaMessage::ReadFailed { item, error } => {
                let path = item.path.display().to_string();
                self.result.add_warning(
                    labels.format("media.read_failed", &[("path", &path), ("error", error)]),
                );
            }
            MediaMessage::SkippedAssigned { item } => {
                let entity = item.entity.to_string();
                self.result.add_info(labels.format(
                    "media.skipped_assigned",
                    &[("file", &item.file_name), ("entity", &entity)],
                ));
            }
            MediaMessage::ReusedAlbum { item, file } => {
                let entity = item.entity.to_string();
                self.result.add_info(labels.format(
                    "media.reused_album",
                    &[("file", &file.file_name), ("entity", &entity)],
                ));
            }
            MediaMessage::DuplicateNew { item } => {
                self.result.add_info(
                    labels.format("media.duplicate_new", &[("file", &item.file_name)]),
                );
            }
            MediaMessage::Saved { count } => {
                self.result
                    .add_info(labels.format("media.saved", &[("count", &count.to_string())]));
            }
        }
    }
}

/// 只写 tracing 日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMediaHandler;

impl MediaMessageHandler for TracingMediaHandler {
    fn handle(&mut self, message: MediaMessage<'_>) {
        match message {
            MediaMessage::DownloadFailed { item } => {
                warn!(url = ?item.url, error = ?item.error_message, "媒体下载失败")
            }
            MediaMessage::FileMissing { item } => {
                warn!(path = %item.path.display(), "媒体文件不存在")
            }
            MediaMessage::ReadFailed { item, error } => {
                warn!(path = %item.path.display(), error = %error, "媒体文件读取失败")
            }
            other => debug!(message = ?other, "媒体导入"),
        }
    }
}

/// 待处理的本地文件
struct Candidate {
    index: usize, // items 下标
    content_hash: String,
    size: u64,
}

/// 分配目标：已存在文件或本次新建文件
enum AssignTarget {
    Existing(i64),
    New(usize), // new_files 下标
}

// ==========================================
// MediaImporter
// ==========================================
pub struct MediaImporter {
    store: Arc<dyn MediaStore>,
    downloader: Arc<dyn DownloadManager>,
}

impl MediaImporter {
    pub fn new(store: Arc<dyn MediaStore>, downloader: Arc<dyn DownloadManager>) -> Self {
        Self { store, downloader }
    }

    /// 导入一批媒体项并分配给实体
    ///
    /// # 参数
    /// - items: 由 create_download_item 构造的下载项（下载状态会被回写）
    /// - album: 目标相册
    /// - cache: 运行级下载缓存，成功下载的 URL 会被记录
    ///
    /// # 返回
    /// 新写入的分配关系数
    pub async fn import_media(
        &self,
        items: &mut [DownloadItem],
        album: &str,
        cache: &mut DownloadCache,
        handler: &mut dyn MediaMessageHandler,
        cancel: &CancellationToken,
    ) -> ImporterResult<usize> {
        if items.is_empty() || cancel.is_cancelled() {
            return Ok(0);
        }

        self.download(items, cache, handler, cancel).await?;

        let candidates = self.read_candidates(items, handler).await;
        if candidates.is_empty() {
            return Ok(0);
        }

        // 一次预取: 实体已分配文件 + 相册内同摘要文件
        let entities: Vec<EntityRef> = candidates
            .iter()
            .map(|c| items[c.index].entity.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let assigned = self.store.files_for_entities(&entities).await?;

        let hashes: Vec<String> = candidates
            .iter()
            .map(|c| c.content_hash.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let album_files = self.store.find_in_album(album, &hashes).await?;

        let mut new_files: Vec<NewMediaFile> = Vec::new();
        let mut pending_new: HashMap<String, usize> = HashMap::new(); // 摘要 → new_files 下标
        let mut targets: Vec<(EntityRef, AssignTarget, i32)> = Vec::new();
        let mut seen: HashSet<(EntityRef, String)> = HashSet::new();

        for candidate in &candidates {
            let item = &items[candidate.index];

            // 同一实体在本次调用中已处理过相同内容
            if !seen.insert((item.entity.clone(), candidate.content_hash.clone())) {
                continue;
            }

            let already_assigned = assigned.get(&item.entity).is_some_and(|files| {
                files
                    .iter()
                    .any(|f| f.content_hash == candidate.content_hash && f.size == candidate.size)
            });
            if already_assigned {
                handler.handle(MediaMessage::SkippedAssigned { item });
                continue;
            }

            let in_album = album_files
                .iter()
                .find(|f| f.content_hash == candidate.content_hash && f.size == candidate.size);
            if let Some(file) = in_album {
                handler.handle(MediaMessage::ReusedAlbum { item, file });
                targets.push((
                    item.entity.clone(),
                    AssignTarget::Existing(file.id),
                    item.display_order,
                ));
                continue;
            }

            let new_index = match pending_new.get(&candidate.content_hash) {
                Some(index) => {
                    handler.handle(MediaMessage::DuplicateNew { item });
                    *index
                }
                None => {
                    new_files.push(NewMediaFile {
                        source_path: item.path.clone(),
                        file_name: item.file_name.clone(),
                        mime_type: item.mime_type.clone(),
                        size: candidate.size,
                        content_hash: candidate.content_hash.clone(),
                    });
                    let index = new_files.len() - 1;
                    pending_new.insert(candidate.content_hash.clone(), index);
                    index
                }
            };
            targets.push((
                item.entity.clone(),
                AssignTarget::New(new_index),
                item.display_order,
            ));
        }

        let saved = if new_files.is_empty() {
            Vec::new()
        } else {
            let saved = self.store.save_batch(album, new_files).await?;
            handler.handle(MediaMessage::Saved { count: saved.len() });
            saved
        };

        let assignments: Vec<MediaAssignment> = targets
            .into_iter()
            .filter_map(|(entity, target, display_order)| {
                let media_file_id = match target {
                    AssignTarget::Existing(id) => id,
                    AssignTarget::New(index) => saved.get(index)?.id,
                };
                Some(MediaAssignment {
                    entity,
                    media_file_id,
                    display_order,
                })
            })
            .collect();

        let count = if assignments.is_empty() {
            0
        } else {
            self.store.assign(assignments).await?
        };

        info!(
            album = album,
            items = items.len(),
            saved = saved.len(),
            assigned = count,
            "媒体导入完成"
        );
        Ok(count)
    }

    /// 下载阶段: 相同 URL 只交给下载管理器一次，结果回写到所有同 URL 项
    async fn download(
        &self,
        items: &mut [DownloadItem],
        cache: &mut DownloadCache,
        handler: &mut dyn MediaMessageHandler,
        cancel: &CancellationToken,
    ) -> ImporterResult<()> {
        // 运行级缓存命中
        for item in items.iter_mut().filter(|i| i.needs_download()) {
            let cached = item
                .url
                .as_deref()
                .and_then(|url| cache.get(url))
                .map(str::to_string);
            if let Some(file_name) = cached {
                if let Some(dir) = item.path.parent() {
                    item.path = dir.join(&file_name);
                }
                item.file_name = file_name;
                item.success = Some(true);
            }
        }

        let mut unique: Vec<DownloadItem> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        for item in items.iter().filter(|i| i.needs_download()) {
            if let Some(url) = &item.url {
                if seen_urls.insert(url.clone()) {
                    unique.push(item.clone());
                }
            }
        }
        if unique.is_empty() {
            return Ok(());
        }

        self.downloader.download_batch(&mut unique, cancel).await?;

        let outcomes: HashMap<String, DownloadItem> = unique
            .into_iter()
            .filter_map(|item| item.url.clone().map(|url| (url, item)))
            .collect();

        for item in items.iter_mut() {
            let Some(outcome) = item.url.as_ref().and_then(|url| outcomes.get(url)) else {
                continue;
            };
            if !item.needs_download() {
                continue;
            }
            item.success = outcome.success;
            item.error_message = outcome.error_message.clone();
            item.path = outcome.path.clone();
            item.file_name = outcome.file_name.clone();
            if outcome.mime_type.is_some() {
                item.mime_type = outcome.mime_type.clone();
            }
        }

        for (url, outcome) in &outcomes {
            if outcome.success == Some(true) {
                cache.insert(url.clone(), outcome.file_name.clone());
            } else {
                handler.handle(MediaMessage::DownloadFailed { item: outcome });
            }
        }

        Ok(())
    }

    /// 读取可用的本地文件并计算摘要
    async fn read_candidates(
        &self,
        items: &[DownloadItem],
        handler: &mut dyn MediaMessageHandler,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if !item.is_available() {
                continue;
            }
            if !item.path.is_file() {
                handler.handle(MediaMessage::FileMissing { item });
                continue;
            }

            match tokio::fs::read(&item.path).await {
                Ok(bytes) => candidates.push(Candidate {
                    index,
                    content_hash: blake3::hash(&bytes).to_hex().to_string(),
                    size: bytes.len() as u64,
                }),
                Err(e) => {
                    let error = e.to_string();
                    handler.handle(MediaMessage::ReadFailed { item, error: &error });
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str) -> DownloadItem {
        DownloadItem {
            entity: EntityRef::new("Product", 1),
            url: Some(url.to_string()),
            path: "/tmp/x.jpg".into(),
            file_name: "x.jpg".to_string(),
            display_order: 1,
            mime_type: None,
            success: Some(false),
            error_message: Some("404".to_string()),
        }
    }

    #[test]
    fn test_result_handler_levels() {
        let labels = Labels::new("en");
        let mut result = ImportResult::new();
        let failed = item("https://example.com/x.jpg");
        {
            let mut handler = ImportResultMediaHandler::new(&mut result, &labels);
            handler.handle(MediaMessage::DownloadFailed { item: &failed });
            handler.handle(MediaMessage::DuplicateNew { item: &failed });
            handler.handle(MediaMessage::Saved { count: 2 });
        }

        assert_eq!(result.warnings(), 1);
        assert_eq!(result.errors(), 0);
        assert_eq!(result.messages.len(), 3);
        assert!(result.messages[0].content.contains("https://example.com/x.jpg"));
    }
}
