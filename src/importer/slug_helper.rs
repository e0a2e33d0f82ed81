// ==========================================
// 批量导入引擎 - 批次 SEO slug 提交
// ==========================================
// 口径:
// - SeName 列显式给出时优先，否则由显示名称派生
// - 标准 slug 仅对: 给出 SeName 的行、新实体、名称已变化的行生成
// - 本地化 slug 来自 SeName[语言] / Name[语言]
// - 唯一性: 库中其他实体 + 本批次已分配的 slug，冲突时追加 -2、-3 ...
// - 旧的活动 slug 停用保留（历史），已存在的同名停用 slug 重新启用
// ==========================================

use crate::domain::catalog::{UrlRecord, UrlRecordChange};
use crate::domain::entity::Sluggable;
use crate::domain::import_result::ImportRowInfo;
use crate::importer::context::ImportExecuteContext;
use crate::importer::error::ImporterResult;
use crate::importer::import_row::ImportRow;
use crate::importer::seo;
use crate::repository::UrlRecordStore;
use std::collections::HashMap;
use tracing::debug;

/// SEO 名称列
pub const SE_NAME_COLUMN: &str = "SeName";

/// 名称列（本地化 slug 的回退来源）
pub const NAME_COLUMN: &str = "Name";

/// 单个去重 slug 的最大尝试次数
const MAX_SUFFIX_ATTEMPTS: usize = 1000;

/// 单个实体在单个语言下的 slug 需求
struct SlugRequest {
    entity_id: i64,
    language_id: i64,
    candidate: String,
    explicit: Option<String>, // 显式 SeName 原值（用于警告）
    row_info: ImportRowInfo,
}

/// 生成并提交当前批次的 slug
///
/// # 返回
/// 受影响的 URL 记录数
pub async fn process_slugs<T: Sluggable>(
    ctx: &mut ImportExecuteContext,
    batch: &[ImportRow<T>],
    store: &dyn UrlRecordStore,
) -> ImporterResult<usize> {
    let requests = collect_requests(ctx, batch);
    if requests.is_empty() {
        return Ok(0);
    }

    let entity_ids: Vec<i64> = requests.iter().map(|r| r.entity_id).collect();
    let own_records = store.load_for_entities(T::ENTITY_NAME, &entity_ids).await?;

    // slug(小写) → 占用该 slug 的记录
    let candidates: Vec<String> = requests.iter().map(|r| r.candidate.clone()).collect();
    let mut known: HashMap<String, Vec<UrlRecord>> = HashMap::new();
    for candidate in &candidates {
        known.entry(candidate.to_lowercase()).or_default();
    }
    for record in store.find_by_slugs(&candidates).await? {
        known
            .entry(record.slug.to_lowercase())
            .or_default()
            .push(record);
    }

    // 本批次已分配: slug(小写) → 实体 ID
    let mut assigned: HashMap<String, i64> = HashMap::new();
    let mut changes = Vec::new();

    for request in requests {
        let current_active = own_records.iter().find(|r| {
            r.entity_id == request.entity_id && r.language_id == request.language_id && r.is_active
        });
        if let Some(active) = current_active {
            if active.slug.eq_ignore_ascii_case(&request.candidate) {
                assigned.insert(request.candidate.to_lowercase(), request.entity_id);
                continue;
            }
        }

        let Some(slug) = find_unique_slug::<T>(&request, &mut known, &assigned, store).await?
        else {
            let message = ctx
                .labels()
                .format("slug.invalid", &[("value", &request.candidate)]);
            ctx.result
                .add_row_warning(message, request.row_info.clone(), SE_NAME_COLUMN);
            continue;
        };

        if slug != request.candidate {
            if let Some(value) = &request.explicit {
                let message = ctx
                    .labels()
                    .format("slug.renamed", &[("value", value), ("slug", &slug)]);
                ctx.result
                    .add_row_warning(message, request.row_info.clone(), SE_NAME_COLUMN);
            }
        }

        if let Some(active) = current_active {
            if !active.slug.eq_ignore_ascii_case(&slug) {
                changes.push(UrlRecordChange::Deactivate(active.id));
            }
        }

        let history = own_records.iter().find(|r| {
            r.entity_id == request.entity_id
                && r.language_id == request.language_id
                && r.slug.eq_ignore_ascii_case(&slug)
        });
        match history {
            Some(record) if record.is_active => {}
            Some(record) => changes.push(UrlRecordChange::Activate(record.id)),
            None => changes.push(UrlRecordChange::Insert(UrlRecord {
                id: 0,
                entity_id: request.entity_id,
                entity_name: T::ENTITY_NAME.to_string(),
                slug: slug.clone(),
                language_id: request.language_id,
                is_active: true,
            })),
        }

        assigned.insert(slug.to_lowercase(), request.entity_id);
    }

    if changes.is_empty() {
        return Ok(0);
    }

    let affected = store.apply_changes(changes).await?;
    debug!(run_id = %ctx.run_id(), entity = T::ENTITY_NAME, affected = affected, "URL 记录已提交");
    Ok(affected)
}

/// 按行收集标准与本地化 slug 需求
fn collect_requests<T: Sluggable>(
    ctx: &mut ImportExecuteContext,
    batch: &[ImportRow<T>],
) -> Vec<SlugRequest> {
    let languages = ctx.languages.clone();
    let mut requests = Vec::new();

    for row in batch.iter().filter(|row| row.entity().id() > 0) {
        let se_name = match row.try_get_data_value::<String>(SE_NAME_COLUMN) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(err) => {
                ctx.result
                    .add_row_warning(err.to_string(), row.row_info(), SE_NAME_COLUMN);
                None
            }
        };

        if se_name.is_some() || row.is_new() || row.name_changed() {
            push_request(
                ctx,
                &mut requests,
                row,
                0,
                se_name,
                row.entity().display_name(),
            );
        }

        for language in &languages {
            let se_name = row
                .try_get_localized_value::<String>(SE_NAME_COLUMN, &language.culture)
                .ok()
                .flatten()
                .filter(|v| !v.trim().is_empty());
            let name = row
                .try_get_localized_value::<String>(NAME_COLUMN, &language.culture)
                .ok()
                .flatten()
                .unwrap_or_default();

            if se_name.is_none() && name.trim().is_empty() {
                continue;
            }
            push_request(ctx, &mut requests, row, language.id, se_name, &name);
        }
    }

    // 同一实体同一语言只保留一个需求（同批次后出现的行覆盖先出现的）
    let mut slots: HashMap<(i64, i64), usize> = HashMap::new();
    let mut unique: Vec<SlugRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        let key = (request.entity_id, request.language_id);
        match slots.get(&key) {
            Some(&slot) => unique[slot] = request,
            None => {
                slots.insert(key, unique.len());
                unique.push(request);
            }
        }
    }

    unique
}

fn push_request<T: Sluggable>(
    ctx: &mut ImportExecuteContext,
    requests: &mut Vec<SlugRequest>,
    row: &ImportRow<T>,
    language_id: i64,
    se_name: Option<String>,
    display_name: &str,
) {
    match seo::validate_se_name(se_name.as_deref(), display_name) {
        Some(candidate) => requests.push(SlugRequest {
            entity_id: row.entity().id(),
            language_id,
            candidate,
            explicit: se_name,
            row_info: row.row_info(),
        }),
        None => {
            let value = se_name.unwrap_or_else(|| display_name.to_string());
            let message = ctx.labels().format("slug.invalid", &[("value", &value)]);
            ctx.result
                .add_row_warning(message, row.row_info(), SE_NAME_COLUMN);
        }
    }
}

/// 在库与本批次范围内寻找可用 slug
async fn find_unique_slug<T: Sluggable>(
    request: &SlugRequest,
    known: &mut HashMap<String, Vec<UrlRecord>>,
    assigned: &HashMap<String, i64>,
    store: &dyn UrlRecordStore,
) -> ImporterResult<Option<String>> {
    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let slug = if attempt == 1 {
            request.candidate.clone()
        } else {
            seo::with_suffix(&request.candidate, attempt)
        };
        let key = slug.to_lowercase();

        if !known.contains_key(&key) {
            let found = store.find_by_slugs(std::slice::from_ref(&slug)).await?;
            known.insert(key.clone(), found);
        }

        let taken_in_store = known.get(&key).is_some_and(|records| {
            records
                .iter()
                .any(|r| r.entity_name != T::ENTITY_NAME || r.entity_id != request.entity_id)
        });
        let taken_in_batch = assigned
            .get(&key)
            .is_some_and(|entity_id| *entity_id != request.entity_id);

        if !taken_in_store && !taken_in_batch {
            return Ok(Some(slug));
        }
    }

    Ok(None)
}
