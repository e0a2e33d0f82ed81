// ==========================================
// 批量导入引擎 - 表格数据源适配
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv/.txt/.tab)
// 职责: 打开导入文件 → 内存表（行数、列存在性、按下标取行）
// 口径: 单元格去首尾空白；完全空白的行跳过；空字符串视为 null
// ==========================================

use crate::domain::import_file::ImportFile;
use crate::domain::profile::CsvConfiguration;
use crate::importer::error::{ImportError, ImporterResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

// ==========================================
// Trait: DataTable
// ==========================================
// 用途: 分段器读取的表格抽象
pub trait DataTable: Send + Sync {
    /// 数据行数（不含表头）
    fn row_count(&self) -> usize;

    /// 物理列名（保持源文件顺序）
    fn columns(&self) -> &[String];

    /// 列是否存在（大小写不敏感）
    fn has_column(&self, name: &str) -> bool;

    /// 按下标取行（越界返回 None）
    fn row(&self, index: usize) -> Option<DataRow>;
}

// ==========================================
// Trait: TableReader
// ==========================================
// 用途: 导入文件 → DataTable
pub trait TableReader: Send + Sync {
    fn open_table(
        &self,
        file: &ImportFile,
        csv_config: &CsvConfiguration,
        skip: usize,
        take: usize,
    ) -> ImporterResult<Box<dyn DataTable>>;
}

// ==========================================
// ColumnIndex - 列名索引（所有行共享）
// ==========================================
#[derive(Debug, Default)]
struct ColumnIndex {
    names: Vec<String>,
    lookup: HashMap<String, usize>, // key: 小写列名
}

impl ColumnIndex {
    fn new(names: Vec<String>) -> Self {
        let mut lookup = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            // 重名列取第一列
            lookup.entry(name.to_lowercase()).or_insert(idx);
        }
        Self { names, lookup }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.lookup.get(&name.to_lowercase()).copied()
    }
}

// ==========================================
// DataRow - 单行原始值视图
// ==========================================
#[derive(Debug, Clone)]
pub struct DataRow {
    columns: Arc<ColumnIndex>,
    values: Arc<Vec<String>>,
}

impl DataRow {
    /// 原始值；列不存在或单元格为空时返回 None
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .position(column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.position(column).is_some()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }
}

// ==========================================
// InMemoryTable - 内存表实现
// ==========================================
#[derive(Debug)]
pub struct InMemoryTable {
    columns: Arc<ColumnIndex>,
    rows: Vec<Arc<Vec<String>>>,
}

impl InMemoryTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut values| {
                values.resize(width, String::new());
                Arc::new(values)
            })
            .collect();

        Self {
            columns: Arc::new(ColumnIndex::new(headers)),
            rows,
        }
    }
}

impl DataTable for InMemoryTable {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn columns(&self) -> &[String] {
        &self.columns.names
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.position(name).is_some()
    }

    fn row(&self, index: usize) -> Option<DataRow> {
        self.rows.get(index).map(|values| DataRow {
            columns: Arc::clone(&self.columns),
            values: Arc::clone(values),
        })
    }
}

// ==========================================
// FileTableReader - 根据扩展名自动选择解析方式
// ==========================================
pub struct FileTableReader;

impl TableReader for FileTableReader {
    fn open_table(
        &self,
        file: &ImportFile,
        csv_config: &CsvConfiguration,
        skip: usize,
        take: usize,
    ) -> ImporterResult<Box<dyn DataTable>> {
        let path = file.path();

        // 检查文件存在
        if !file.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let (headers, rows) = if file.is_tabular_text() {
            read_csv(file, csv_config)?
        } else if ImportFile::is_supported(path) {
            read_excel(file)?
        } else {
            return Err(ImportError::UnsupportedFormat(file.file_name()));
        };

        let take = if take == 0 { usize::MAX } else { take };
        let rows: Vec<Vec<String>> = rows.into_iter().skip(skip).take(take).collect();

        tracing::debug!(
            file = %file.file_name(),
            columns = headers.len(),
            rows = rows.len(),
            "导入文件已读取"
        );

        Ok(Box::new(InMemoryTable::new(headers, rows)))
    }
}

fn ascii_byte(c: char, what: &str) -> ImporterResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ImportError::CsvParseError(format!("{}必须是 ASCII 字符: '{}'", what, c)))
}

/// 生成无表头文件的列名: Column1, Column2, ...
fn generated_headers(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("Column{}", i)).collect()
}

fn is_blank(values: &[String]) -> bool {
    values.iter().all(|v| v.is_empty())
}

fn read_csv(
    file: &ImportFile,
    config: &CsvConfiguration,
) -> ImporterResult<(Vec<String>, Vec<Vec<String>>)> {
    // .tab 文件在默认配置下按制表符分隔
    let delimiter = match config.delimiter {
        ',' if file.file_name().to_lowercase().ends_with(".tab") => '\t',
        other => other,
    };

    let handle = File::open(file.path())?;
    let mut reader = ReaderBuilder::new()
        .delimiter(ascii_byte(delimiter, "分隔符")?)
        .quote(ascii_byte(config.quote, "引号")?)
        .has_headers(config.has_headers)
        .flexible(true) // 允许行长度不一致
        .from_reader(handle);

    let mut headers: Vec<String> = if config.has_headers {
        reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let values: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();

        // 跳过完全空白的行
        if is_blank(&values) {
            continue;
        }
        rows.push(values);
    }

    if !config.has_headers {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        headers = generated_headers(width);
    }

    Ok((headers, rows))
}

fn read_excel(file: &ImportFile) -> ImporterResult<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = open_workbook_auto(file.path())?;

    // 读取第一个 sheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    // 提取表头（第一行）
    let mut cells = range.rows();
    let headers: Vec<String> = match cells.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => return Ok((Vec::new(), Vec::new())),
    };

    let mut rows = Vec::new();
    for data_row in cells {
        let values: Vec<String> = data_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        // 跳过完全空白的行
        if is_blank(&values) {
            continue;
        }
        rows.push(values);
    }

    Ok((headers, rows))
}
