// ==========================================
// 批量导入引擎 - 批次本地化属性提交
// ==========================================
// 流程: 过滤有源列的字段 → 一次预取 → 内存比对 → 单事务提交
// 口径: 列索引即语言代码（Name[de]）；[NULL] 删除已有本地化值
// ==========================================

use crate::domain::catalog::{LocalizedProperty, LocalizedPropertyChange};
use crate::domain::entity::ImportEntity;
use crate::importer::column_map::ColumnMap;
use crate::importer::context::ImportExecuteContext;
use crate::importer::error::ImporterResult;
use crate::importer::import_row::ImportRow;
use crate::repository::LocalizedPropertyStore;
use std::collections::HashMap;
use tracing::debug;

/// 写入当前批次的本地化字段
///
/// # 参数
/// - batch: 已持久化的行（id > 0 的实体才会处理）
/// - localizable_fields: 可本地化的字段名，例如 ["Name", "ShortDescription"]
///
/// # 返回
/// 受影响的本地化记录数
pub async fn process_localizations<T: ImportEntity>(
    ctx: &mut ImportExecuteContext,
    batch: &[ImportRow<T>],
    localizable_fields: &[&str],
    store: &dyn LocalizedPropertyStore,
) -> ImporterResult<usize> {
    let fields: Vec<&str> = {
        let segmenter = ctx.segmenter()?;
        localizable_fields
            .iter()
            .copied()
            .filter(|field| segmenter.has_column(field, true))
            .collect()
    };
    if fields.is_empty() || ctx.languages.is_empty() {
        return Ok(0);
    }

    let entity_ids: Vec<i64> = batch
        .iter()
        .map(|row| row.entity().id())
        .filter(|id| *id > 0)
        .collect();
    if entity_ids.is_empty() {
        return Ok(0);
    }

    let mut existing: HashMap<(i64, i64, String), LocalizedProperty> = store
        .load_for_entities(T::ENTITY_NAME, &entity_ids)
        .await?
        .into_iter()
        .map(|p| ((p.entity_id, p.language_id, p.locale_key.to_lowercase()), p))
        .collect();

    let languages = ctx.languages.clone();

    // 每个 (实体, 语言, 字段) 只保留一个目标值，同批次后出现的行覆盖先出现的
    let mut targets: Vec<(i64, i64, &str, String)> = Vec::new();
    let mut slots: HashMap<(i64, i64, String), usize> = HashMap::new();

    for row in batch.iter().filter(|row| row.entity().id() > 0) {
        let entity_id = row.entity().id();

        for language in &languages {
            for field in &fields {
                if !row.has_data_value(field, Some(&language.culture)) {
                    continue;
                }

                let value = match row.try_get_localized_value::<String>(field, &language.culture) {
                    Ok(Some(value)) => value,
                    Ok(None) => continue,
                    Err(err) => {
                        ctx.result.add_row_warning(
                            err.to_string(),
                            row.row_info(),
                            ColumnMap::indexed_name(field, Some(&language.culture)),
                        );
                        continue;
                    }
                };

                let key = (entity_id, language.id, field.to_lowercase());
                match slots.get(&key) {
                    Some(&slot) => targets[slot].3 = value,
                    None => {
                        slots.insert(key, targets.len());
                        targets.push((entity_id, language.id, *field, value));
                    }
                }
            }
        }
    }

    let mut changes = Vec::new();
    for (entity_id, language_id, field, value) in targets {
        let key = (entity_id, language_id, field.to_lowercase());
        match existing.remove(&key) {
            Some(current) if value.is_empty() => {
                changes.push(LocalizedPropertyChange::Delete(current.id));
            }
            Some(current) if current.locale_value != value => {
                changes.push(LocalizedPropertyChange::Update(LocalizedProperty {
                    locale_value: value,
                    ..current
                }));
            }
            Some(_) => {}
            None if value.is_empty() => {}
            None => {
                changes.push(LocalizedPropertyChange::Insert(LocalizedProperty {
                    id: 0,
                    entity_id,
                    language_id,
                    locale_key_group: T::ENTITY_NAME.to_string(),
                    locale_key: field.to_string(),
                    locale_value: value,
                }));
            }
        }
    }

    if changes.is_empty() {
        return Ok(0);
    }

    let change_count = changes.len();
    let affected = store.apply_changes(changes).await?;
    debug!(
        run_id = %ctx.run_id(),
        entity = T::ENTITY_NAME,
        changes = change_count,
        affected = affected,
        "本地化属性已提交"
    );
    Ok(affected)
}
