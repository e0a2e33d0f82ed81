// ==========================================
// 批量导入引擎 - 数据分段器
// ==========================================
// 职责: 将数据表按固定窗口（100 行）切分为批次，产出行视图
// 红线: 同一时刻只缓存一个批次的原始行
// 状态: current_segment = 0 表示未开始；读完最后一段后再次读取会复位
// ==========================================

use crate::domain::entity::ImportEntity;
use crate::importer::column_map::ColumnMap;
use crate::importer::converter::Culture;
use crate::importer::file_parser::{DataRow, DataTable};
use crate::importer::import_row::ImportRow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 固定批次大小
pub const BATCH_SIZE: usize = 100;

pub struct DataSegmenter {
    table: Box<dyn DataTable>,
    column_map: Arc<ColumnMap>,
    culture: Arc<Culture>,
    total_rows: usize,
    total_segments: usize,
    current_segment: usize,
    batch: Vec<DataRow>,
    column_indexes: Mutex<HashMap<String, Vec<String>>>, // key: 小写字段名
}

impl DataSegmenter {
    pub fn new(table: Box<dyn DataTable>, column_map: Arc<ColumnMap>, culture: Culture) -> Self {
        let total_rows = table.row_count();
        Self {
            total_segments: total_rows.div_ceil(BATCH_SIZE),
            total_rows,
            table,
            column_map,
            culture: Arc::new(culture),
            current_segment: 0,
            batch: Vec::new(),
            column_indexes: Mutex::new(HashMap::new()),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn total_columns(&self) -> usize {
        self.table.columns().len()
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    pub fn current_segment(&self) -> usize {
        self.current_segment
    }

    /// 当前批次首行的下标（从 0 开始；未开始时为 0）
    pub fn current_segment_first_row_index(&self) -> usize {
        self.current_segment.saturating_sub(1) * BATCH_SIZE
    }

    pub fn is_last_segment(&self) -> bool {
        self.current_segment > 0 && self.current_segment == self.total_segments
    }

    pub fn column_map(&self) -> &Arc<ColumnMap> {
        &self.column_map
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    /// 读取下一批次；数据读完时复位并返回 false
    pub fn read_next_batch(&mut self) -> bool {
        self.batch.clear();

        if self.current_segment >= self.total_segments {
            self.current_segment = 0;
            return false;
        }

        self.current_segment += 1;
        let start = self.current_segment_first_row_index();
        let end = (start + BATCH_SIZE).min(self.total_rows);
        self.batch
            .extend((start..end).filter_map(|idx| self.table.row(idx)));

        true
    }

    /// 当前批次的行视图（惰性，只能遍历一次）
    pub fn get_current_batch<T: ImportEntity>(&self) -> impl Iterator<Item = ImportRow<T>> {
        let first = self.current_segment_first_row_index();
        let column_map = Arc::clone(&self.column_map);
        let culture = Arc::clone(&self.culture);

        self.batch
            .clone()
            .into_iter()
            .enumerate()
            .map(move |(offset, data)| {
                ImportRow::new(
                    first + offset + 1,
                    data,
                    Arc::clone(&column_map),
                    Arc::clone(&culture),
                )
            })
    }

    /// 当前批次的行数
    pub fn current_batch_len(&self) -> usize {
        self.batch.len()
    }

    /// 字段是否有源列
    ///
    /// `with_any_index = true` 时，精确名未命中也接受任一索引变体（如 Name[de]）。
    pub fn has_column(&self, name: &str, with_any_index: bool) -> bool {
        let mapping = self.column_map.get_mapping(name, None);
        if !mapping.ignore_property && self.table.has_column(&mapping.mapped_name) {
            return true;
        }

        with_any_index
            && self.get_column_indexes(name).iter().any(|index| {
                let mapping = self.column_map.get_mapping(name, Some(index));
                !mapping.ignore_property && self.table.has_column(&mapping.mapped_name)
            })
    }

    /// 带索引的字段是否有源列
    pub fn has_indexed_column(&self, name: &str, index: &str) -> bool {
        let mapping = self.column_map.get_mapping(name, Some(index));
        !mapping.ignore_property && self.table.has_column(&mapping.mapped_name)
    }

    pub fn is_ignored(&self, name: &str, index: Option<&str>) -> bool {
        self.column_map.get_mapping(name, index).ignore_property
    }

    /// 枚举字段的全部索引（扫描列映射与物理列，大小写不敏感，结果缓存）
    pub fn get_column_indexes(&self, name: &str) -> Vec<String> {
        let key = name.to_lowercase();
        let mut cache = self
            .column_indexes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        cache
            .entry(key)
            .or_insert_with(|| {
                let mapped = self.column_map.entries().map(|e| e.source_name.as_str());
                let physical = self.table.columns().iter().map(String::as_str);

                let mut indexes: Vec<String> = Vec::new();
                for column in mapped.chain(physical) {
                    if let (base, Some(index)) = ColumnMap::parse_indexed_name(column) {
                        if base.eq_ignore_ascii_case(name)
                            && !indexes.iter().any(|i| i.eq_ignore_ascii_case(index))
                        {
                            indexes.push(index.to_string());
                        }
                    }
                }
                indexes
            })
            .clone()
    }
}
