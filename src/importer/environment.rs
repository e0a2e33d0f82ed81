// ==========================================
// 批量导入引擎 - 运行环境接口
// ==========================================
// 职责: 目录解析与文件枚举、语言/店铺列表
// ==========================================

use crate::domain::catalog::{ImportLanguage, ImportStore};
use crate::domain::import_file::ImportFile;
use crate::domain::profile::ImportProfile;
use crate::importer::context::ImportDirectories;
use crate::importer::error::{ImportError, ImporterResult};
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// ImportDirectoryProvider Trait
// ==========================================
pub trait ImportDirectoryProvider: Send + Sync {
    /// 解析导入配置的运行目录
    fn resolve(&self, profile: &ImportProfile, data_root: &Path) -> ImporterResult<ImportDirectories>;

    /// 枚举导入目录中的可处理文件
    fn list_import_files(&self, directories: &ImportDirectories) -> ImporterResult<Vec<ImportFile>>;
}

/// 本地文件系统实现
#[derive(Debug, Clone, Default)]
pub struct LocalDirectoryProvider;

impl ImportDirectoryProvider for LocalDirectoryProvider {
    fn resolve(&self, profile: &ImportProfile, data_root: &Path) -> ImporterResult<ImportDirectories> {
        let directories = ImportDirectories::for_profile(data_root.join(&profile.folder_name));

        if !directories.import_dir.is_dir() {
            return Err(ImportError::FileNotFound(
                directories.import_dir.display().to_string(),
            ));
        }
        std::fs::create_dir_all(&directories.image_download_dir)?;

        Ok(directories)
    }

    fn list_import_files(&self, directories: &ImportDirectories) -> ImporterResult<Vec<ImportFile>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&directories.import_dir)? {
            let path = entry?.path();
            if path.is_file() && ImportFile::is_supported(&path) {
                files.push(ImportFile::new(path));
            }
        }
        Ok(files)
    }
}

// ==========================================
// ImportEnvironment Trait
// ==========================================
// 用途: 运行开始时加载一次语言与店铺列表
#[async_trait]
pub trait ImportEnvironment: Send + Sync {
    async fn languages(&self) -> ImporterResult<Vec<ImportLanguage>>;

    async fn stores(&self) -> ImporterResult<Vec<ImportStore>>;
}

/// 固定列表实现
#[derive(Debug, Clone, Default)]
pub struct StaticImportEnvironment {
    pub languages: Vec<ImportLanguage>,
    pub stores: Vec<ImportStore>,
}

#[async_trait]
impl ImportEnvironment for StaticImportEnvironment {
    async fn languages(&self) -> ImporterResult<Vec<ImportLanguage>> {
        Ok(self.languages.clone())
    }

    async fn stores(&self) -> ImporterResult<Vec<ImportStore>> {
        Ok(self.stores.clone())
    }
}
