// ==========================================
// 批量导入引擎 - 行视图
// ==========================================
// 职责: 一行源数据 ↔ 一个目标实体；按列映射做类型化读取
// 三态语义: 有值 / 显式置空 [NULL] / 显式忽略 [IGNORE]
// 默认值: 仅对新实体、且源值缺失时生效
// ==========================================

use crate::domain::entity::ImportEntity;
use crate::domain::import_result::{ImportResult, ImportRowInfo};
use crate::importer::column_map::ColumnMap;
use crate::importer::converter::{convert, ConversionError, Culture, FromCell};
use crate::importer::file_parser::DataRow;
use std::sync::Arc;

/// 显式置空标记：写入字段的零值
pub const EXPLICIT_NULL: &str = "[NULL]";

/// 显式忽略标记：跳过字段，不取默认值
pub const EXPLICIT_IGNORE: &str = "[IGNORE]";

pub struct ImportRow<T: ImportEntity> {
    position: usize,
    data: DataRow,
    column_map: Arc<ColumnMap>,
    culture: Arc<Culture>,
    entity: T,
    entity_display_name: Option<String>,
    is_new: bool,
    is_dirty: bool,
    name_changed: bool,
}

impl<T: ImportEntity> ImportRow<T> {
    pub(crate) fn new(
        position: usize,
        data: DataRow,
        column_map: Arc<ColumnMap>,
        culture: Arc<Culture>,
    ) -> Self {
        Self {
            position,
            data,
            column_map,
            culture,
            entity: T::default(),
            entity_display_name: None,
            is_new: true,
            is_dirty: false,
            name_changed: false,
        }
    }

    /// 绑定目标实体（已有实体或新建实体）
    pub fn initialize(&mut self, entity: T, display_name: impl Into<String>) {
        self.is_new = entity.id() == 0;
        self.entity = entity;
        self.entity_display_name = Some(display_name.into()).filter(|n| !n.is_empty());
    }

    /// 行位置（从 1 开始）
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut T {
        &mut self.entity
    }

    pub fn into_entity(self) -> T {
        self.entity
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn name_changed(&self) -> bool {
        self.name_changed
    }

    pub fn set_name_changed(&mut self, changed: bool) {
        self.name_changed = changed;
    }

    pub fn data(&self) -> &DataRow {
        &self.data
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn row_info(&self) -> ImportRowInfo {
        ImportRowInfo::new(self.position, self.entity_display_name.clone())
    }

    /// 映射后的原始值（不处理标记）
    pub fn raw_value(&self, column: &str, index: Option<&str>) -> Option<&str> {
        let mapping = self.column_map.get_mapping(column, index);
        self.data.get(&mapping.mapped_name)
    }

    /// 源数据是否为该字段提供了可用值（含 [NULL]）
    pub fn has_data_value(&self, column: &str, index: Option<&str>) -> bool {
        if self.column_map.get_mapping(column, index).ignore_property {
            return false;
        }
        self.raw_value(column, index)
            .map(|raw| !raw.eq_ignore_ascii_case(EXPLICIT_IGNORE))
            .unwrap_or(false)
    }

    pub fn try_get_data_value<V: FromCell>(
        &self,
        column: &str,
    ) -> Result<Option<V>, ConversionError> {
        self.read_value(column, None, false)
    }

    pub fn try_get_localized_value<V: FromCell>(
        &self,
        column: &str,
        index: &str,
    ) -> Result<Option<V>, ConversionError> {
        self.read_value(column, Some(index), false)
    }

    /// 忽略映射上的 ignore 标记强制读取
    pub fn try_get_data_value_forced<V: FromCell>(
        &self,
        column: &str,
        index: Option<&str>,
    ) -> Result<Option<V>, ConversionError> {
        self.read_value(column, index, true)
    }

    fn read_value<V: FromCell>(
        &self,
        column: &str,
        index: Option<&str>,
        force: bool,
    ) -> Result<Option<V>, ConversionError> {
        let mapping = self.column_map.get_mapping(column, index);
        if mapping.ignore_property && !force {
            return Ok(None);
        }

        match self.data.get(&mapping.mapped_name) {
            Some(raw) if raw.eq_ignore_ascii_case(EXPLICIT_IGNORE) => Ok(None),
            Some(raw) if raw.eq_ignore_ascii_case(EXPLICIT_NULL) => Ok(Some(V::zero())),
            Some(raw) => convert::<V>(raw, &self.culture).map(Some),
            None => match mapping.default.as_deref() {
                Some(default) if self.is_new => convert::<V>(default, &self.culture).map(Some),
                _ => Ok(None),
            },
        }
    }

    /// 读取值；转换失败时记录行级警告并返回 None
    pub fn get_data_value<V: FromCell>(
        &self,
        result: &mut ImportResult,
        column: &str,
    ) -> Option<V> {
        match self.try_get_data_value::<V>(column) {
            Ok(value) => value,
            Err(err) => {
                result.add_row_warning(err.to_string(), self.row_info(), column);
                None
            }
        }
    }

    /// 读取并写入实体字段
    ///
    /// 字符串按 `T::max_length` 截断；转换失败记为警告，字段保持原值。
    /// 返回是否写入。
    pub fn set_property<V, F>(&mut self, result: &mut ImportResult, column: &str, apply: F) -> bool
    where
        V: FromCell,
        F: FnOnce(&mut T, V),
    {
        self.set_value(result, column, None, apply)
    }

    /// 带索引的 set_property，例如 Name[de]
    pub fn set_localized_property<V, F>(
        &mut self,
        result: &mut ImportResult,
        column: &str,
        index: &str,
        apply: F,
    ) -> bool
    where
        V: FromCell,
        F: FnOnce(&mut T, V),
    {
        self.set_value(result, column, Some(index), apply)
    }

    fn set_value<V, F>(
        &mut self,
        result: &mut ImportResult,
        column: &str,
        index: Option<&str>,
        apply: F,
    ) -> bool
    where
        V: FromCell,
        F: FnOnce(&mut T, V),
    {
        match self.read_value::<V>(column, index, false) {
            Ok(Some(value)) => {
                let value = match T::max_length(column) {
                    Some(max_len) => value.truncate_to(max_len),
                    None => value,
                };
                apply(&mut self.entity, value);
                self.is_dirty = true;
                true
            }
            Ok(None) => false,
            Err(err) => {
                let field = ColumnMap::indexed_name(column, index);
                tracing::debug!(position = self.position, field = %field, error = %err, "字段转换失败");
                result.add_row_warning(err.to_string(), self.row_info(), field);
                false
            }
        }
    }
}
