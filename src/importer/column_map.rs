// ==========================================
// 批量导入引擎 - 列映射
// ==========================================
// 职责: 逻辑字段名（可带索引，如 SeName[de]）→ 物理列名、默认值、忽略标记
// 红线: 非索引名查找不回退到索引条目；查找大小写不敏感
// ==========================================

use crate::importer::error::{ImportError, ImporterResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ColumnMappingEntry - 单条映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMappingEntry {
    pub source_name: String, // 逻辑字段名（含索引）
    pub mapped_name: String, // 物理列名
    #[serde(default)]
    pub default: Option<String>, // 新实体缺值时的默认值
    #[serde(default)]
    pub ignore_property: bool, // true = 既不读也不写
}

impl ColumnMappingEntry {
    /// 透传映射：物理列名与逻辑名相同
    pub fn pass_through(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            mapped_name: name.clone(),
            source_name: name,
            default: None,
            ignore_property: false,
        }
    }
}

// ==========================================
// ColumnMap
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    entries: BTreeMap<String, ColumnMappingEntry>, // key: 小写的 source_name
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拼接带索引的字段名: ("Name", Some("de")) → "Name[de]"
    pub fn indexed_name(name: &str, index: Option<&str>) -> String {
        match index {
            Some(idx) if !idx.is_empty() => format!("{}[{}]", name, idx),
            _ => name.to_string(),
        }
    }

    /// 拆分带索引的字段名: "Name[de]" → ("Name", Some("de"))
    pub fn parse_indexed_name(raw: &str) -> (&str, Option<&str>) {
        let trimmed = raw.trim();
        if let Some(open) = trimmed.find('[') {
            if trimmed.ends_with(']') && open > 0 {
                let name = &trimmed[..open];
                let index = &trimmed[open + 1..trimmed.len() - 1];
                if !index.is_empty() && !index.contains(['[', ']']) {
                    return (name, Some(index));
                }
            }
        }
        (trimmed, None)
    }

    /// 添加或覆盖映射
    pub fn add_mapping(
        &mut self,
        name: &str,
        index: Option<&str>,
        mapped_name: &str,
        default: Option<&str>,
    ) {
        let source_name = Self::indexed_name(name, index);
        let mapped_name = if mapped_name.trim().is_empty() {
            source_name.clone()
        } else {
            mapped_name.trim().to_string()
        };

        self.insert(ColumnMappingEntry {
            source_name,
            mapped_name,
            default: default.map(str::to_string),
            ignore_property: false,
        });
    }

    /// 标记字段为忽略
    pub fn ignore(&mut self, name: &str, index: Option<&str>) {
        let source_name = Self::indexed_name(name, index);
        let mut entry = self
            .entries
            .get(&source_name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| ColumnMappingEntry::pass_through(source_name));
        entry.ignore_property = true;
        self.insert(entry);
    }

    fn insert(&mut self, entry: ColumnMappingEntry) {
        self.entries
            .insert(entry.source_name.to_lowercase(), entry);
    }

    /// 查找映射，无显式条目时生成透传条目
    pub fn get_mapping(&self, name: &str, index: Option<&str>) -> ColumnMappingEntry {
        let source_name = Self::indexed_name(name, index);
        self.entries
            .get(&source_name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| ColumnMappingEntry::pass_through(source_name))
    }

    /// 是否存在显式条目（不含透传）
    pub fn has_mapping(&self, name: &str, index: Option<&str>) -> bool {
        self.entries
            .contains_key(&Self::indexed_name(name, index).to_lowercase())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ColumnMappingEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn from_json(json: &str) -> ImporterResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }

        let list: Vec<ColumnMappingEntry> = serde_json::from_str(json)?;
        let mut map = Self::new();
        for entry in list {
            if entry.source_name.trim().is_empty() {
                return Err(ImportError::ColumnMapError(
                    "映射条目缺少 sourceName".to_string(),
                ));
            }
            map.insert(entry);
        }
        Ok(map)
    }

    pub fn to_json(&self) -> ImporterResult<String> {
        let list: Vec<&ColumnMappingEntry> = self.entries.values().collect();
        Ok(serde_json::to_string(&list)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_mapping() {
        let map = ColumnMap::new();
        let entry = map.get_mapping("Price", None);
        assert_eq!(entry.mapped_name, "Price");
        assert_eq!(entry.default, None);
        assert!(!entry.ignore_property);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut map = ColumnMap::new();
        map.add_mapping("Price", None, "Preis", Some("5"));

        let entry = map.get_mapping("PRICE", None);
        assert_eq!(entry.mapped_name, "Preis");
        assert_eq!(entry.default.as_deref(), Some("5"));
    }

    #[test]
    fn test_no_fallback_to_indexed_entry() {
        let mut map = ColumnMap::new();
        map.add_mapping("SeName", Some("de"), "Slug-DE", None);

        assert_eq!(map.get_mapping("SeName", Some("de")).mapped_name, "Slug-DE");
        // 非索引查找只得到透传条目
        assert_eq!(map.get_mapping("SeName", None).mapped_name, "SeName");
        assert!(!map.has_mapping("SeName", None));
    }

    #[test]
    fn test_ignore_keeps_mapping() {
        let mut map = ColumnMap::new();
        map.add_mapping("Sku", None, "ArticleNo", None);
        map.ignore("sku", None);

        let entry = map.get_mapping("Sku", None);
        assert!(entry.ignore_property);
        assert_eq!(entry.mapped_name, "ArticleNo");
    }

    #[test]
    fn test_parse_indexed_name() {
        assert_eq!(ColumnMap::parse_indexed_name("Name[de]"), ("Name", Some("de")));
        assert_eq!(ColumnMap::parse_indexed_name("Name"), ("Name", None));
        assert_eq!(ColumnMap::parse_indexed_name("Name[]"), ("Name[]", None));
        assert_eq!(ColumnMap::parse_indexed_name("[de]"), ("[de]", None));
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"[
            {"sourceName": "Price", "mappedName": "Preis", "default": "5"},
            {"sourceName": "Name[de]", "mappedName": "Bezeichnung", "ignoreProperty": true}
        ]"#;
        let map = ColumnMap::from_json(json).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.get_mapping("name", Some("DE")).ignore_property);

        let back = ColumnMap::from_json(&map.to_json().unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_json_invalid() {
        assert!(ColumnMap::from_json("{not json").is_err());
        assert!(ColumnMap::from_json(r#"[{"sourceName": " ", "mappedName": "x"}]"#).is_err());
        assert!(ColumnMap::from_json("").unwrap().is_empty());
    }
}
