// ==========================================
// 批量导入引擎 - 实体导入器 Trait
// ==========================================
// 职责: 定义按实体类型解析的批次导入器接口（不包含实现）
// 约定: 每个批次由工厂创建新的导入器实例，批次之间不共享导入器状态
// ==========================================

use crate::domain::types::ImportEntityType;
use crate::importer::context::ImportExecuteContext;
use crate::importer::error::ImporterResult;
use async_trait::async_trait;

// ==========================================
// EntityImporter Trait
// ==========================================
// 用途: 处理分段器的当前批次
// 实现者: 各实体类型的导入器（商品/分类/客户/订阅）
#[async_trait]
pub trait EntityImporter: Send {
    /// 处理当前批次
    ///
    /// # 参数
    /// - ctx: 运行上下文（当前文件、分段器、结果）
    ///
    /// # 约定
    /// - 行级问题记为 ctx.result 警告，不返回 Err
    /// - 返回 Err 表示批次失败，编排器将中止当前文件与整个运行
    /// - ctx.file().related_type() 为 Some 时处理的是关联文件
    async fn execute(&mut self, ctx: &mut ImportExecuteContext) -> ImporterResult<()>;
}

// ==========================================
// EntityImporterFactory Trait
// ==========================================
pub trait EntityImporterFactory: Send + Sync {
    /// 为一个批次创建导入器
    ///
    /// # 返回
    /// - Err(ImporterNotFound): 未注册该实体类型
    fn create(&self, entity_type: ImportEntityType) -> ImporterResult<Box<dyn EntityImporter>>;
}
