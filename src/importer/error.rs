// ==========================================
// 批量导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 口径: 行级错误不走此类型（记为警告），文件级/运行级错误在编排器边界转为消息
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv/.txt/.tab）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("列映射无效: {0}")]
    ColumnMapError(String),

    // ===== 运行准备错误 =====
    #[error("导入配置不存在: id={0}")]
    ProfileNotFound(i64),

    #[error("导入配置已停用: id={0}")]
    ProfileDisabled(i64),

    #[error("无导入权限")]
    PermissionDenied,

    #[error("未注册实体导入器: {0}")]
    ImporterNotFound(String),

    #[error("导入上下文缺少{0}")]
    MissingContext(&'static str),

    // ===== 执行错误 =====
    #[error("实体导入器执行失败: {0}")]
    ImporterFailed(String),

    #[error("导入已取消")]
    Cancelled,

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::ColumnMapError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;
