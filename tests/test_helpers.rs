// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试实体与导入器、源文件生成、编排器装配
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use catalog_import::config::{config_keys, ConfigManager};
use catalog_import::db::{init_schema, open_sqlite_connection};
use catalog_import::domain::catalog::{ImportLanguage, ImportStore};
use catalog_import::domain::{ImportEntity, ImportEntityType, ImportProfile, Sluggable, StoreRestricted};
use catalog_import::importer::events::{ImportEvent, ImportEventPublisher};
use catalog_import::importer::{
    BoxError, DataImporter, DataImporterServices, EntityImporter, EntityImporterFactory,
    FileTableReader, ImportDirectoryProvider, ImportExecuteContext, ImportRow, ImporterResult,
    LocalDirectoryProvider, NoOpCacheInvalidator, StaticImportEnvironment,
};
use catalog_import::repository::{ImportProfileRepository, SqliteImportProfileRepository};
use rusqlite::Connection;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - Arc<Mutex<Connection>>: 共享连接
pub fn create_test_db() -> Result<(NamedTempFile, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, Arc::new(Mutex::new(conn))))
}

// ==========================================
// 测试实体
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestProduct {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub limited_to_stores: bool,
}

impl ImportEntity for TestProduct {
    const ENTITY_NAME: &'static str = "Product";

    fn id(&self) -> i64 {
        self.id
    }

    fn max_length(field: &str) -> Option<usize> {
        match field {
            "Name" => Some(40),
            "Sku" => Some(20),
            _ => None,
        }
    }
}

impl StoreRestricted for TestProduct {
    fn limited_to_stores(&self) -> bool {
        self.limited_to_stores
    }

    fn set_limited_to_stores(&mut self, limited: bool) {
        self.limited_to_stores = limited;
    }
}

impl Sluggable for TestProduct {
    fn display_name(&self) -> &str {
        &self.name
    }
}

/// 已绑定实体的行（用于批次辅助测试）
pub fn bind_row(row: &mut ImportRow<TestProduct>, id: i64, name: &str) {
    row.initialize(
        TestProduct {
            id: 0,
            name: name.to_string(),
            ..TestProduct::default()
        },
        name,
    );
    row.entity_mut().id = id;
}

// ==========================================
// 测试导入器
// ==========================================

/// 内存商品表（按 SKU 查找）
#[derive(Debug, Default)]
pub struct ProductSink {
    products: Mutex<Vec<TestProduct>>,
}

impl ProductSink {
    pub fn len(&self) -> usize {
        self.products.lock().unwrap().len()
    }

    pub fn find_by_sku(&self, sku: &str) -> Option<TestProduct> {
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.sku == sku)
            .cloned()
    }

    fn save(&self, mut product: TestProduct) -> TestProduct {
        let mut products = self.products.lock().unwrap();
        if product.id == 0 {
            product.id = products.len() as i64 + 1;
            products.push(product.clone());
        } else if let Some(existing) = products.iter_mut().find(|p| p.id == product.id) {
            *existing = product.clone();
        }
        product
    }
}

/// 导入器行为配置
#[derive(Clone, Default)]
pub struct ImporterBehavior {
    pub errors_per_batch: usize,
    pub cancel_after_batches: Option<(usize, CancellationToken)>,
    pub fail_on_batch: Option<usize>,
}

pub struct TestProductImporter {
    sink: Arc<ProductSink>,
    batches: Arc<AtomicUsize>,
    behavior: ImporterBehavior,
}

#[async_trait]
impl EntityImporter for TestProductImporter {
    async fn execute(&mut self, ctx: &mut ImportExecuteContext) -> ImporterResult<()> {
        let batch_no = self.batches.fetch_add(1, Ordering::SeqCst) + 1;

        if self.behavior.fail_on_batch == Some(batch_no) {
            return Err(catalog_import::ImportError::ImporterFailed(format!(
                "batch {} failed",
                batch_no
            )));
        }

        let is_related = ctx
            .file()
            .map(|f| f.related_type().is_some())
            .unwrap_or(false);
        let rows: Vec<ImportRow<TestProduct>> = ctx.segmenter()?.get_current_batch().collect();

        for mut row in rows {
            if is_related {
                ctx.result.skipped_records += 1;
                continue;
            }

            let sku = row.get_data_value::<String>(&mut ctx.result, "Sku");
            let Some(sku) = sku else {
                ctx.result.skipped_records += 1;
                continue;
            };

            let existing = self.sink.find_by_sku(&sku).unwrap_or_default();
            let display_name = existing.name.clone();
            row.initialize(existing, display_name);

            row.set_property(&mut ctx.result, "Sku", |p: &mut TestProduct, v: String| p.sku = v);
            row.set_property(&mut ctx.result, "Name", |p: &mut TestProduct, v: String| p.name = v);
            row.set_property(&mut ctx.result, "Price", |p: &mut TestProduct, v: f64| p.price = v);

            if row.is_new() {
                ctx.result.new_records += 1;
            } else {
                ctx.result.modified_records += 1;
            }
            self.sink.save(row.into_entity());
        }

        for i in 0..self.behavior.errors_per_batch {
            ctx.result.add_error(format!("batch {} error {}", batch_no, i));
        }

        if let Some((after, token)) = &self.behavior.cancel_after_batches {
            if batch_no >= *after {
                token.cancel();
            }
        }

        Ok(())
    }
}

pub struct TestImporterFactory {
    pub sink: Arc<ProductSink>,
    pub batches: Arc<AtomicUsize>,
    pub behavior: ImporterBehavior,
}

impl TestImporterFactory {
    pub fn new(behavior: ImporterBehavior) -> Self {
        Self {
            sink: Arc::new(ProductSink::default()),
            batches: Arc::new(AtomicUsize::new(0)),
            behavior,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl EntityImporterFactory for TestImporterFactory {
    fn create(&self, entity_type: ImportEntityType) -> ImporterResult<Box<dyn EntityImporter>> {
        match entity_type {
            ImportEntityType::Product => Ok(Box::new(TestProductImporter {
                sink: Arc::clone(&self.sink),
                batches: Arc::clone(&self.batches),
                behavior: self.behavior.clone(),
            })),
            other => Err(catalog_import::ImportError::ImporterNotFound(
                other.as_str().to_string(),
            )),
        }
    }
}

// ==========================================
// 事件记录
// ==========================================

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<ImportEvent>>,
}

impl ImportEventPublisher for RecordingPublisher {
    fn publish(&self, event: ImportEvent) -> Result<(), BoxError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ==========================================
// 源文件与目录
// ==========================================

/// 创建 <root>/profile-<id>/Content 并返回 Content 目录
pub fn create_import_dir(root: &Path, profile_id: i64) -> PathBuf {
    let content = root.join(format!("profile-{}", profile_id)).join("Content");
    std::fs::create_dir_all(&content).unwrap();
    content
}

/// 写入商品 CSV（Sku,Name,Price）
pub fn write_products_csv(dir: &Path, file_name: &str, rows: &[(String, String, String)]) -> PathBuf {
    let mut content = String::from("Sku,Name,Price\n");
    for (sku, name, price) in rows {
        content.push_str(&format!("{},{},{}\n", sku, name, price));
    }
    let path = dir.join(file_name);
    std::fs::write(&path, content).unwrap();
    path
}

/// 生成 n 行合法商品数据
pub fn product_rows(n: usize) -> Vec<(String, String, String)> {
    (1..=n)
        .map(|i| {
            (
                format!("SKU-{:04}", i),
                format!("Product {}", i),
                format!("{}.50", i),
            )
        })
        .collect()
}

// ==========================================
// 编排器装配
// ==========================================

pub struct TestHarness {
    pub importer: DataImporter,
    pub profiles: Arc<SqliteImportProfileRepository>,
    pub events: Arc<RecordingPublisher>,
}

/// 保存导入配置并装配编排器
pub async fn build_harness(
    conn: Arc<Mutex<Connection>>,
    data_root: &Path,
    profile: ImportProfile,
    factory: Arc<TestImporterFactory>,
    directories: Arc<dyn ImportDirectoryProvider>,
) -> TestHarness {
    let config = ConfigManager::from_connection(Arc::clone(&conn)).unwrap();
    config
        .set_global_config_value(config_keys::DATA_ROOT, data_root.to_str().unwrap())
        .unwrap();
    config.set_global_config_value(config_keys::LOCALE, "en").unwrap();

    let profiles = Arc::new(SqliteImportProfileRepository::new(Arc::clone(&conn)));
    profiles.save(&profile).await.unwrap();

    let events = Arc::new(RecordingPublisher::default());
    let environment = StaticImportEnvironment {
        languages: vec![ImportLanguage {
            id: 2,
            culture: "de".to_string(),
            name: "Deutsch".to_string(),
        }],
        stores: vec![
            ImportStore {
                id: 1,
                name: "Main".to_string(),
            },
            ImportStore {
                id: 2,
                name: "Outlet".to_string(),
            },
        ],
    };

    let services = DataImporterServices {
        profiles: profiles.clone(),
        directories,
        table_reader: Arc::new(FileTableReader),
        importers: factory,
        environment: Arc::new(environment),
        config: Arc::new(config),
        events: events.clone(),
        cache: Arc::new(NoOpCacheInvalidator),
    };

    TestHarness {
        importer: DataImporter::new(services),
        profiles,
        events,
    }
}

/// 默认本地目录提供者
pub fn local_directories() -> Arc<dyn ImportDirectoryProvider> {
    Arc::new(LocalDirectoryProvider)
}
