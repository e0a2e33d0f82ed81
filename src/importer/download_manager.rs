// ==========================================
// 批量导入引擎 - 下载项与下载管理器
// ==========================================
// 职责:
// - 由单元格值（URL 或本地路径）构造下载项
// - 并发下载一个子批次，整批完成后返回
// 口径: 同一 URL 在一次运行中只下载一次（运行级缓存记录本地文件名）
// ==========================================

use crate::domain::entity::EntityRef;
use crate::importer::context::ImportExecuteContext;
use crate::importer::error::{ImportError, ImporterResult};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// 单个请求超时
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

// ==========================================
// DownloadItem - 一个待处理的媒体来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub entity: EntityRef,
    pub url: Option<String>, // None = 本地文件
    pub path: PathBuf,       // 本地文件路径（下载目标）
    pub file_name: String,
    pub display_order: i32,
    pub mime_type: Option<String>,
    pub success: Option<bool>, // None = 尚未下载
    pub error_message: Option<String>,
}

impl DownloadItem {
    /// 是否需要下载
    pub fn needs_download(&self) -> bool {
        self.url.is_some() && self.success != Some(true)
    }

    /// 本地文件是否可用于后续处理
    pub fn is_available(&self) -> bool {
        match self.url {
            Some(_) => self.success == Some(true),
            None => true,
        }
    }
}

/// 由单元格值构造下载项
///
/// - http/https URL: 目标为下载目录，命中运行级缓存时直接标记为已下载
/// - 其他值按本地路径处理，相对路径以图片目录为基准
/// - 空值返回 None
pub fn create_download_item(
    ctx: &ImportExecuteContext,
    entity: EntityRef,
    url_or_path: &str,
    display_order: i32,
) -> Option<DownloadItem> {
    let value = url_or_path.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(url) = parse_http_url(value) {
        let (file_name, success) = match ctx.download_cache.get(url.as_str()) {
            Some(cached) => (cached.to_string(), Some(true)),
            None => (download_file_name(&url), None),
        };
        let path = ctx.directories.image_download_dir.join(&file_name);
        return Some(DownloadItem {
            entity,
            url: Some(url.to_string()),
            mime_type: guess_mime(&file_name),
            path,
            file_name,
            display_order,
            success,
            error_message: None,
        });
    }

    let raw = Path::new(value);
    let path = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        ctx.directories.image_dir.join(raw)
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Some(DownloadItem {
        entity,
        url: None,
        mime_type: guess_mime(&file_name),
        path,
        file_name,
        display_order,
        success: None,
        error_message: None,
    })
}

fn parse_http_url(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// 下载文件名: <URL 摘要前缀>-<路径末段>，不同 URL 不会落到同一文件
fn download_file_name(url: &Url) -> String {
    let digest = blake3::hash(url.as_str().as_bytes()).to_hex();
    let prefix = &digest.as_str()[..12];

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_file_name)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());

    format!("{}-{}", prefix, segment)
}

fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn guess_mime(file_name: &str) -> Option<String> {
    mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str().to_string())
}

// ==========================================
// DownloadManager Trait
// ==========================================
#[async_trait]
pub trait DownloadManager: Send + Sync {
    /// 下载一个子批次（仅处理 needs_download 的项）
    ///
    /// 单项失败写入 success = Some(false) 与 error_message，不返回 Err。
    async fn download_batch(
        &self,
        items: &mut [DownloadItem],
        cancel: &CancellationToken,
    ) -> ImporterResult<()>;
}

// ==========================================
// HttpDownloadManager - reqwest 实现
// ==========================================
pub struct HttpDownloadManager {
    client: Client,
    concurrency: usize,
}

impl HttpDownloadManager {
    pub fn new(concurrency: usize) -> ImporterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| ImportError::InternalError(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self {
            client,
            concurrency: concurrency.max(1),
        })
    }
}

#[async_trait]
impl DownloadManager for HttpDownloadManager {
    async fn download_batch(
        &self,
        items: &mut [DownloadItem],
        cancel: &CancellationToken,
    ) -> ImporterResult<()> {
        let jobs: Vec<(usize, String, PathBuf)> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.needs_download())
            .filter_map(|(idx, item)| item.url.clone().map(|url| (idx, url, item.path.clone())))
            .collect();
        if jobs.is_empty() {
            return Ok(());
        }

        debug!(count = jobs.len(), concurrency = self.concurrency, "开始下载子批次");

        let client = &self.client;
        let outcomes: Vec<(usize, Result<Option<String>, String>)> = stream::iter(jobs)
            .map(|(idx, url, path)| async move {
                (idx, download_one(client, &url, &path, cancel).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (idx, outcome) in outcomes {
            let item = &mut items[idx];
            match outcome {
                Ok(mime_type) => {
                    item.success = Some(true);
                    item.error_message = None;
                    if mime_type.is_some() {
                        item.mime_type = mime_type;
                    }
                }
                Err(message) => {
                    warn!(url = ?item.url, error = %message, "下载失败");
                    item.success = Some(false);
                    item.error_message = Some(message);
                }
            }
        }

        Ok(())
    }
}

/// 下载单个 URL 到目标路径，返回响应的 MIME 类型
async fn download_one(
    client: &Client,
    url: &str,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Option<String>, String> {
    if cancel.is_cancelled() {
        return Err("cancelled".to_string());
    }

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let bytes = response.bytes().await.map_err(|e| e.to_string())?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }
    tokio::fs::write(path, &bytes)
        .await
        .map_err(|e| e.to_string())?;

    Ok(mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use crate::domain::types::ImportEntityType;
    use crate::importer::context::ImportDirectories;
    use uuid::Uuid;

    fn context() -> ImportExecuteContext {
        let mut ctx = ImportExecuteContext::new(
            Uuid::new_v4(),
            ImportEntityType::Product,
            ImportSettings::default(),
            CancellationToken::new(),
        );
        ctx.directories = ImportDirectories::for_profile("/data/profile-1");
        ctx
    }

    #[test]
    fn test_url_item() {
        let ctx = context();
        let item = create_download_item(
            &ctx,
            EntityRef::new("Product", 1),
            "https://cdn.example.com/img/shirt.jpg?v=2",
            1,
        )
        .unwrap();

        assert!(item.needs_download());
        assert!(item.file_name.ends_with("-shirt.jpg"));
        assert!(item.path.starts_with("/data/profile-1/Content/Downloads"));
        assert_eq!(item.mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_cached_url_is_not_downloaded_again() {
        let mut ctx = context();
        ctx.download_cache
            .insert("https://cdn.example.com/a.png", "cached-a.png");

        let item = create_download_item(
            &ctx,
            EntityRef::new("Product", 1),
            "https://cdn.example.com/a.png",
            1,
        )
        .unwrap();
        assert_eq!(item.success, Some(true));
        assert_eq!(item.file_name, "cached-a.png");
        assert!(!item.needs_download());
    }

    #[test]
    fn test_local_path_item() {
        let ctx = context();
        let item =
            create_download_item(&ctx, EntityRef::new("Product", 2), "shirts/blue.png", 3).unwrap();
        assert!(item.url.is_none());
        assert_eq!(
            item.path,
            PathBuf::from("/data/profile-1/Content/Images/shirts/blue.png")
        );
        assert_eq!(item.file_name, "blue.png");
        assert!(item.is_available());

        assert!(create_download_item(&ctx, EntityRef::new("Product", 2), "  ", 1).is_none());
    }

    #[test]
    fn test_distinct_urls_get_distinct_file_names() {
        let a = Url::parse("https://a.example.com/x/photo.jpg").unwrap();
        let b = Url::parse("https://b.example.com/y/photo.jpg").unwrap();
        assert_ne!(download_file_name(&a), download_file_name(&b));
    }
}
