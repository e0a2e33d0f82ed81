// ==========================================
// 批量导入引擎 - SQL 构建工具
// ==========================================
// 职责: 批量预取查询的 IN 子句与参数构建
// ==========================================

use rusqlite::types::Value;

/// 构建 IN 子句占位符
///
/// # 参数
/// - `first_index`: 第一个占位符的序号（从 1 开始）
/// - `count`: 占位符数量
///
/// # 示例
/// ```
/// use catalog_import::repository::sql_utils::build_in_placeholders;
/// assert_eq!(build_in_placeholders(2, 3), "?2, ?3, ?4");
/// ```
pub fn build_in_placeholders(first_index: usize, count: usize) -> String {
    (first_index..first_index + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 实体名 + 实体 ID 列表 → 查询参数
pub fn entity_id_params(entity_name: &str, entity_ids: &[i64]) -> Vec<Value> {
    std::iter::once(Value::Text(entity_name.to_string()))
        .chain(entity_ids.iter().map(|id| Value::Integer(*id)))
        .collect()
}

/// 去重并排序实体 ID
pub fn distinct_ids(entity_ids: &[i64]) -> Vec<i64> {
    let mut ids: Vec<i64> = entity_ids.iter().copied().filter(|id| *id > 0).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(build_in_placeholders(1, 1), "?1");
        assert_eq!(build_in_placeholders(1, 0), "");
    }

    #[test]
    fn test_distinct_ids_drops_unsaved() {
        assert_eq!(distinct_ids(&[3, 0, 1, 3]), vec![1, 3]);
    }

    #[test]
    fn test_entity_id_params() {
        let params = entity_id_params("Product", &[4]);
        assert_eq!(params, vec![Value::Text("Product".into()), Value::Integer(4)]);
    }
}
