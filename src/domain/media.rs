// ==========================================
// 批量导入引擎 - 媒体文件模型
// ==========================================
// 对齐: db.rs media_file / media_assignment 表
// ==========================================

use crate::domain::entity::EntityRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 商品图片所在的系统相册
pub const CATALOG_ALBUM: &str = "catalog";

// ==========================================
// MediaFileInfo - 已存储的媒体文件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFileInfo {
    pub id: i64,
    pub album: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: u64,
    pub content_hash: String, // blake3 十六进制摘要
    pub storage_path: String,
}

// ==========================================
// NewMediaFile - 待批量保存的新文件
// ==========================================
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub source_path: PathBuf,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: u64,
    pub content_hash: String,
}

// ==========================================
// MediaAssignment - 实体与媒体文件的关联
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAssignment {
    pub entity: EntityRef,
    pub media_file_id: i64,
    pub display_order: i32,
}
