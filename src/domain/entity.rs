// ==========================================
// 批量导入引擎 - 导入目标实体接口
// ==========================================
// 职责: 定义行视图与批量提交辅助所需的最小实体能力
// 说明: 具体实体（商品/分类/客户）由实体导入器提供
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Trait: ImportEntity
// ==========================================
// 用途: 行视图绑定的目标实体
// 约定: id() == 0 表示尚未持久化的新实体
pub trait ImportEntity: Default + Send {
    /// 实体名称（用于本地化分组、店铺映射、URL 记录）
    const ENTITY_NAME: &'static str;

    /// 实体主键（0 = 新实体）
    fn id(&self) -> i64;

    /// 目标字段的最大长度约束（None = 不限制）
    ///
    /// 用于 set_property 的字符串截断。
    fn max_length(_field: &str) -> Option<usize> {
        None
    }
}

// ==========================================
// Trait: StoreRestricted
// ==========================================
// 用途: 支持按店铺限制可见性的实体
pub trait StoreRestricted: ImportEntity {
    fn limited_to_stores(&self) -> bool;

    fn set_limited_to_stores(&mut self, limited: bool);
}

// ==========================================
// Trait: Sluggable
// ==========================================
// 用途: 需要生成 SEO 友好 URL 的实体
pub trait Sluggable: ImportEntity {
    /// 用于派生 slug 的显示名称
    fn display_name(&self) -> &str;
}

// ==========================================
// EntityRef - 实体引用（媒体导入等跨模块场景）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_name: String,
    pub entity_id: i64,
}

impl EntityRef {
    pub fn new(entity_name: impl Into<String>, entity_id: i64) -> Self {
        Self {
            entity_name: entity_name.into(),
            entity_id,
        }
    }

    pub fn of<T: ImportEntity>(entity: &T) -> Self {
        Self::new(T::ENTITY_NAME, entity.id())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_name, self.entity_id)
    }
}
