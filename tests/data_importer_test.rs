// ==========================================
// 导入编排器集成测试
// ==========================================
// 覆盖: 分段批次、取消、失败阈值、准备失败、文件缺失、行级转换失败、关联文件组
// ==========================================

mod test_helpers;

use catalog_import::domain::{ImportEntityType, ImportFile, ImportMessageType, ImportProfile};
use catalog_import::importer::events::ImportEventType;
use catalog_import::importer::{
    BoxError, DataImportRequest, ImportDirectories, ImportDirectoryProvider, ImportError, ImporterResult,
    LocalDirectoryProvider, ProgressCallback, MAIN_GROUP,
};
use catalog_import::logging;
use catalog_import::repository::ImportProfileRepository;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use test_helpers::{
    build_harness, create_import_dir, create_test_db, local_directories, product_rows,
    write_products_csv, ImporterBehavior, TestImporterFactory,
};
use tokio_util::sync::CancellationToken;

const PROFILE_ID: i64 = 1;

fn product_profile() -> ImportProfile {
    ImportProfile::new(PROFILE_ID, "Products", ImportEntityType::Product)
}

#[tokio::test]
async fn test_clean_product_batch() {
    logging::init_test();
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(250));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let progress = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&progress);
    let callback: ProgressCallback = Arc::new(move |value: usize, max: usize, _msg: &str| {
        recorder.lock().unwrap().push((value, max));
        Ok::<(), BoxError>(())
    });
    let mut request = DataImportRequest::new(PROFILE_ID);
    request.progress = Some(callback);

    let report = harness
        .importer
        .run_import(request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 3);
    assert_eq!(factory.sink.len(), 250);

    let main = report.main().unwrap();
    assert_eq!(main.total_records, 250);
    assert_eq!(main.new_records, 250);
    assert_eq!(main.affected_records(), 250);
    assert_eq!(main.errors(), 0);
    assert!(main.end_time.is_some());

    let progress = progress.lock().unwrap();
    assert!(progress.contains(&(1, 3)));
    assert!(progress.contains(&(3, 3)));

    // 汇总写回导入配置
    let profile = harness.profiles.find_by_id(PROFILE_ID).await.unwrap().unwrap();
    let summary = profile.result_info.unwrap();
    assert_eq!(summary.total_records, 250);
    assert_eq!(summary.new_records, 250);

    // 运行日志
    let log = std::fs::read_to_string(root.path().join("profile-1").join("log.txt")).unwrap();
    assert!(log.contains("Total: 250"));

    let events = harness.events.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, ImportEventType::ImportStarted);
    assert_eq!(events[1].event_type, ImportEventType::ImportCompleted);
}

#[tokio::test]
async fn test_second_run_updates_existing_entities() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(5));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();
    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    let main = report.main().unwrap();
    assert_eq!(main.new_records, 0);
    assert_eq!(main.modified_records, 5);
    assert_eq!(factory.sink.len(), 5);
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(250));

    let cancel = CancellationToken::new();
    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior {
        cancel_after_batches: Some((1, cancel.clone())),
        ..ImporterBehavior::default()
    }));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let outcome = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), cancel)
        .await;

    assert!(matches!(outcome, Err(ImportError::Cancelled)));
    assert_eq!(factory.batch_count(), 1);
    assert_eq!(factory.sink.len(), 100);

    // 收尾照常执行：汇总已写回，且包含取消警告
    let profile = harness.profiles.find_by_id(PROFILE_ID).await.unwrap().unwrap();
    let summary = profile.result_info.unwrap();
    assert_eq!(summary.new_records, 100);
    assert_eq!(summary.warnings, 1);

    let log = std::fs::read_to_string(root.path().join("profile-1").join("log.txt")).unwrap();
    assert!(log.contains("Import was cancelled"));
}

#[tokio::test]
async fn test_failure_threshold_stops_run() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "a.csv", &product_rows(250));
    write_products_csv(&content, "b.csv", &product_rows(10));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior {
        errors_per_batch: 12,
        ..ImporterBehavior::default()
    }));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    // 第一个批次后错误数 12 > 11，不再开始新批次，也不再打开 b.csv
    assert_eq!(factory.batch_count(), 1);
    let main = report.main().unwrap();
    assert_eq!(main.total_records, 250);
    assert_eq!(main.errors(), 12);
    assert!(main
        .messages
        .iter()
        .any(|m| m.message_type == ImportMessageType::Warning
            && m.content.contains("Maximum failures reached (11)")));
}

#[tokio::test]
async fn test_errors_below_threshold_do_not_abort() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(150));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior {
        errors_per_batch: 5,
        ..ImporterBehavior::default()
    }));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 2);
    assert_eq!(report.main().unwrap().errors(), 10);
}

#[tokio::test]
async fn test_batch_failure_aborts_file() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(250));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior {
        fail_on_batch: Some(2),
        ..ImporterBehavior::default()
    }));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 2);
    let main = report.main().unwrap();
    assert_eq!(main.new_records, 100);
    assert_eq!(main.errors(), 1);
    assert!(main
        .last_error()
        .unwrap()
        .content
        .contains("Import of file products.csv failed"));
}

#[tokio::test]
async fn test_conversion_failure_is_row_warning() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    let rows = vec![
        ("SKU-1".to_string(), "Shirt".to_string(), "10.00".to_string()),
        ("SKU-2".to_string(), "Pants".to_string(), "abc".to_string()),
        ("SKU-3".to_string(), "Socks".to_string(), "3.25".to_string()),
    ];
    write_products_csv(&content, "products.csv", &rows);

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    let main = report.main().unwrap();
    assert_eq!(main.new_records, 3);
    assert_eq!(main.errors(), 0);
    assert_eq!(main.warnings(), 1);

    let warning = &main.messages[0];
    assert_eq!(warning.row_info.as_ref().unwrap().position, 2);
    assert_eq!(warning.field_name.as_deref(), Some("Price"));

    assert_eq!(factory.sink.find_by_sku("SKU-2").unwrap().price, 0.0);
    assert_eq!(factory.sink.find_by_sku("SKU-3").unwrap().price, 3.25);
}

#[tokio::test]
async fn test_setup_failure_still_produces_result() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    // 不创建 Content 目录

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 0);
    let main = report.main().unwrap();
    assert_eq!(main.errors(), 1);
    assert!(main.last_error().unwrap().content.starts_with("Import setup failed"));

    let profile = harness.profiles.find_by_id(PROFILE_ID).await.unwrap().unwrap();
    assert_eq!(profile.result_info.unwrap().errors, 1);
}

#[tokio::test]
async fn test_permission_denied() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(3));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let mut request = DataImportRequest::new(PROFILE_ID);
    request.has_permission = false;
    let report = harness
        .importer
        .run_import(request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 0);
    assert_eq!(
        report.main().unwrap().last_error().unwrap().content,
        "No permission to import"
    );
}

#[tokio::test]
async fn test_disabled_profile_is_not_imported() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(3));

    let mut profile = product_profile();
    profile.enabled = false;
    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        profile,
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.batch_count(), 0);
    assert!(report.main().unwrap().has_errors());
}

/// 在真实文件列表前插入一个不存在的文件
struct GhostFileProvider;

impl ImportDirectoryProvider for GhostFileProvider {
    fn resolve(&self, profile: &ImportProfile, data_root: &Path) -> ImporterResult<ImportDirectories> {
        LocalDirectoryProvider.resolve(profile, data_root)
    }

    fn list_import_files(&self, directories: &ImportDirectories) -> ImporterResult<Vec<ImportFile>> {
        let mut files = LocalDirectoryProvider.list_import_files(directories)?;
        files.push(ImportFile::new(directories.import_dir.join("a-vanished.csv")));
        Ok(files)
    }
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(3));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        Arc::new(GhostFileProvider),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    // a-vanished.csv 排在 products.csv 之前，缺失即终止整个运行
    assert_eq!(factory.batch_count(), 0);
    let main = report.main().unwrap();
    assert_eq!(main.errors(), 1);
    assert!(main.last_error().unwrap().content.contains("a-vanished.csv"));
}

#[tokio::test]
async fn test_related_files_get_their_own_result() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    let content = create_import_dir(root.path(), PROFILE_ID);
    write_products_csv(&content, "products.csv", &product_rows(4));
    write_products_csv(&content, "products-TierPrice.csv", &product_rows(2));

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].0, MAIN_GROUP);
    assert_eq!(report.main().unwrap().new_records, 4);

    let tier = report.get("TierPrice").unwrap();
    assert_eq!(tier.total_records, 2);
    assert_eq!(tier.skipped_records, 2);
    assert_eq!(tier.new_records, 0);
}

#[tokio::test]
async fn test_no_files_warning() {
    let (_db_file, conn) = create_test_db().unwrap();
    let root = TempDir::new().unwrap();
    create_import_dir(root.path(), PROFILE_ID);

    let factory = Arc::new(TestImporterFactory::new(ImporterBehavior::default()));
    let harness = build_harness(
        conn,
        root.path(),
        product_profile(),
        Arc::clone(&factory),
        local_directories(),
    )
    .await;

    let report = harness
        .importer
        .run_import(DataImportRequest::new(PROFILE_ID), CancellationToken::new())
        .await
        .unwrap();

    let main = report.main().unwrap();
    assert_eq!(main.warnings(), 1);
    assert_eq!(main.errors(), 0);
}
