// ==========================================
// 批量导入引擎 - 导入文件
// ==========================================
// 职责: 描述一次运行中发现的源文件
// 生命周期: 运行开始时创建，之后不可变，不持久化
// ==========================================

use crate::domain::types::RelatedEntityType;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// 文本类表格文件扩展名
const TABULAR_TEXT_EXTENSIONS: [&str; 3] = ["csv", "txt", "tab"];

/// 支持的全部表格扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["csv", "txt", "tab", "xlsx", "xls"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    path: PathBuf,
    related_type: Option<RelatedEntityType>,
    is_tabular_text: bool,
}

impl ImportFile {
    /// 创建导入文件，构造时一次性推断关联类型
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let related_type = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(RelatedEntityType::from_file_stem);

        let is_tabular_text = extension_of(&path)
            .map(|ext| TABULAR_TEXT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);

        Self {
            path,
            related_type,
            is_tabular_text,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn related_type(&self) -> Option<RelatedEntityType> {
        self.related_type
    }

    pub fn is_tabular_text(&self) -> bool {
        self.is_tabular_text
    }

    /// 是否为本次运行配置实体的主文件
    pub fn is_main_file(&self) -> bool {
        self.related_type.is_none()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// 是否为支持的表格格式
    pub fn is_supported(path: &Path) -> bool {
        extension_of(path)
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// 文件组内的稳定处理顺序：先关联类型（主文件在前），再文件名
    pub fn processing_order(a: &ImportFile, b: &ImportFile) -> Ordering {
        a.related_type
            .cmp(&b.related_type)
            .then_with(|| a.file_name().to_lowercase().cmp(&b.file_name().to_lowercase()))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_file() {
        let file = ImportFile::new("/data/import/products.csv");
        assert!(file.is_main_file());
        assert!(file.is_tabular_text());
        assert_eq!(file.file_name(), "products.csv");
    }

    #[test]
    fn test_related_file() {
        let file = ImportFile::new("/data/import/products-TierPrice.xlsx");
        assert_eq!(file.related_type(), Some(RelatedEntityType::TierPrice));
        assert!(!file.is_tabular_text());
    }

    #[test]
    fn test_processing_order() {
        let mut files = vec![
            ImportFile::new("b-tierprice.csv"),
            ImportFile::new("b.csv"),
            ImportFile::new("a.csv"),
        ];
        files.sort_by(ImportFile::processing_order);

        let names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "b-tierprice.csv"]);
    }

    #[test]
    fn test_supported_extensions() {
        assert!(ImportFile::is_supported(Path::new("x.XLSX")));
        assert!(!ImportFile::is_supported(Path::new("x.pdf")));
    }
}
