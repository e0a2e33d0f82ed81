// ==========================================
// 批量导入引擎 - 批次店铺映射提交
// ==========================================
// 列: StoreIds（分号或逗号分隔的店铺 ID）
// 口径:
// - 非空集合 → limited_to_stores = true，映射同步为该集合
// - [NULL] → 取消限制并删除全部映射
// - 未知店铺 ID 忽略并记警告；全部未知时不改动该行
// ==========================================

use crate::domain::catalog::{StoreMapping, StoreMappingChange};
use crate::domain::entity::StoreRestricted;
use crate::importer::context::ImportExecuteContext;
use crate::importer::error::ImporterResult;
use crate::importer::import_row::ImportRow;
use crate::repository::StoreMappingStore;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// 店铺 ID 列名
pub const STORE_IDS_COLUMN: &str = "StoreIds";

/// 同步当前批次的店铺映射
///
/// limited_to_stores 变化的行会被标记为 dirty，由实体导入器负责回写实体。
///
/// # 返回
/// 受影响的映射记录数
pub async fn process_store_mappings<T: StoreRestricted>(
    ctx: &mut ImportExecuteContext,
    batch: &mut [ImportRow<T>],
    store: &dyn StoreMappingStore,
) -> ImporterResult<usize> {
    if !ctx.segmenter()?.has_column(STORE_IDS_COLUMN, false) {
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

    let mut existing: HashMap<i64, Vec<StoreMapping>> = HashMap::new();
    for mapping in store.load_for_entities(T::ENTITY_NAME, &entity_ids).await? {
        existing.entry(mapping.entity_id).or_default().push(mapping);
    }

    // 每个实体一个目标店铺集合（同批次后出现的行覆盖先出现的）
    let mut targets: Vec<(i64, BTreeSet<i64>)> = Vec::new();
    let mut slots: HashMap<i64, usize> = HashMap::new();

    for row in batch.iter_mut().filter(|row| row.entity().id() > 0) {
        let store_ids = match row.try_get_data_value::<Vec<i64>>(STORE_IDS_COLUMN) {
            Ok(Some(ids)) => ids,
            Ok(None) => continue,
            Err(err) => {
                ctx.result
                    .add_row_warning(err.to_string(), row.row_info(), STORE_IDS_COLUMN);
                continue;
            }
        };
        let clear_requested = store_ids.is_empty(); // [NULL]

        let mut wanted = BTreeSet::new();
        for store_id in store_ids {
            if ctx.has_store(store_id) {
                wanted.insert(store_id);
            } else {
                let message = ctx
                    .labels()
                    .format("store.unknown_store", &[("id", &store_id.to_string())]);
                ctx.result
                    .add_row_warning(message, row.row_info(), STORE_IDS_COLUMN);
            }
        }

        // 只有未知店铺时保持现状，不解除限制
        if wanted.is_empty() && !clear_requested {
            continue;
        }

        let limited = !wanted.is_empty();
        if row.entity().limited_to_stores() != limited {
            row.entity_mut().set_limited_to_stores(limited);
            row.mark_dirty();
        }

        let entity_id = row.entity().id();
        match slots.get(&entity_id) {
            Some(&slot) => targets[slot].1 = wanted,
            None => {
                slots.insert(entity_id, targets.len());
                targets.push((entity_id, wanted));
            }
        }
    }

    let mut changes = Vec::new();
    for (entity_id, wanted) in targets {
        let current = existing.remove(&entity_id).unwrap_or_default();

        for mapping in &current {
            if !wanted.contains(&mapping.store_id) {
                changes.push(StoreMappingChange::Delete(mapping.id));
            }
        }
        for store_id in wanted {
            if !current.iter().any(|m| m.store_id == store_id) {
                changes.push(StoreMappingChange::Insert(StoreMapping {
                    id: 0,
                    entity_id,
                    entity_name: T::ENTITY_NAME.to_string(),
                    store_id,
                }));
            }
        }
    }

    if changes.is_empty() {
        return Ok(0);
    }

    let affected = store.apply_changes(changes).await?;
    debug!(run_id = %ctx.run_id(), entity = T::ENTITY_NAME, affected = affected, "店铺映射已提交");
    Ok(affected)
}
