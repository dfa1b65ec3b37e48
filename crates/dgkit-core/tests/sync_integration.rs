//! Integration tests for catalog synchronization.

use dgkit_core::catalog::{CatalogEngine, EngineCall, SnapshotStore};
use dgkit_core::{
    assign_id, Attribute, CatalogConfig, DataCatalog, DataCatalogRow, DataUnitType, Entity,
    EntityIdentifier, Error, LocalSnapshot, LogicalModel, MemoryCatalogEngine, Relation,
    SyncEngine, SyncOptions, SyncPhase,
};

struct TestContext {
    catalog: DataCatalog<MemoryCatalogEngine>,
    config: CatalogConfig,
    _checkpoint_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_engine(MemoryCatalogEngine::new())
    }

    fn with_engine(engine: MemoryCatalogEngine) -> Self {
        let checkpoint_dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::new(checkpoint_dir.path()).with_catalog_name("test");
        let catalog = DataCatalog::open(engine, Some(Box::new(LocalSnapshot::from_config(&config))))
            .unwrap();

        Self {
            catalog,
            config,
            _checkpoint_dir: checkpoint_dir,
        }
    }

    fn sync(&mut self, lm: &LogicalModel) -> dgkit_core::SyncReport {
        SyncEngine::new(lm, SyncOptions::from_config(&self.config))
            .run(&mut self.catalog)
    }

    fn calls(&self) -> &[EngineCall] {
        self.catalog.engine().calls()
    }

    fn reset_calls(&mut self) {
        self.catalog.engine_mut().reset_calls();
    }
}

/// Orders and customers with a relation, attributes and a primary key.
fn sales_model(version: &str) -> LogicalModel {
    let mut lm = LogicalModel::new(version);

    let orders = Entity::new("orders", "Orders").with_domain("sales");
    let customer = Entity::new("customer", "Customer");
    let order_id = Attribute::new("orders.id", orders.id.clone(), "id").with_data_type("bigint");
    let customer_id =
        Attribute::new("customer.id", customer.id.clone(), "id").with_data_type("bigint");
    let placed_by = Relation::new(
        "orders.placed_by",
        orders.id.clone(),
        customer.id.clone(),
        "placed by",
    )
    .with_optionality(false, true)
    .with_cardinality("*", "1");
    let orders_pk = EntityIdentifier::new("orders.pk", orders.id.clone(), true)
        .with_attribute(order_id.id.clone());

    lm.register_entity(orders).unwrap();
    lm.register_entity(customer).unwrap();
    lm.register_attribute(order_id).unwrap();
    lm.register_attribute(customer_id).unwrap();
    lm.register_relation(placed_by).unwrap();
    lm.register_identifier(orders_pk).unwrap();
    lm
}

#[test]
fn test_first_sync_of_single_entity() {
    let mut ctx = TestContext::new();
    let mut lm = LogicalModel::new("v1");
    lm.register_entity(Entity::new("orders", "Orders")).unwrap();
    ctx.reset_calls();

    let report = ctx.sync(&lm);
    let orders = assign_id("orders");

    assert!(report.is_success());
    assert_eq!(report.rows_added, vec![orders.clone()]);
    assert_eq!(report.pages_added, vec![orders.clone()]);
    assert!(report.deleted.is_empty());
    assert!(report.pages_updated.is_empty());
    // the new row is rewritten once by the update-rows phase
    assert_eq!(report.rows_updated, vec![orders.clone()]);
    assert_eq!(
        ctx.calls(),
        &[
            EngineCall::AddRow(orders.clone()),
            EngineCall::AddPage(orders.clone()),
            EngineCall::UpdateRow(orders),
        ]
    );
}

#[test]
fn test_removed_unit_is_deleted_once() {
    let mut ctx = TestContext::new();
    let mut v1 = LogicalModel::new("v1");
    v1.register_entity(Entity::new("orders", "Orders")).unwrap();
    v1.register_entity(Entity::new("legacy", "Legacy")).unwrap();
    ctx.sync(&v1);

    let mut v2 = LogicalModel::new("v2");
    v2.register_entity(Entity::new("orders", "Orders")).unwrap();
    ctx.reset_calls();
    let report = ctx.sync(&v2);

    let legacy = assign_id("legacy");
    assert_eq!(report.deleted, vec![legacy.clone()]);
    assert_eq!(
        ctx.catalog.engine().calls_for(&legacy),
        vec![&EngineCall::Delete(legacy.clone())]
    );
    assert!(ctx.catalog.get_row_by_id(&legacy).unwrap_err().is_not_found());
    assert!(ctx.catalog.get_reference_by_id(&legacy).is_err());
}

#[test]
fn test_failed_delete_keeps_unit_mirrored() {
    let mut ctx = TestContext::new();
    let mut v1 = LogicalModel::new("v1");
    v1.register_entity(Entity::new("orders", "Orders")).unwrap();
    v1.register_entity(Entity::new("legacy", "Legacy")).unwrap();
    ctx.sync(&v1);

    let legacy = assign_id("legacy");
    ctx.catalog.engine_mut().fail_on(legacy.clone());
    let mut v2 = LogicalModel::new("v2");
    v2.register_entity(Entity::new("orders", "Orders")).unwrap();
    let report = ctx.sync(&v2);

    assert!(report.deleted.is_empty());
    let failure = report.failures_in(SyncPhase::Delete).next().unwrap();
    assert_eq!(failure.unit_id, legacy);
    assert!(matches!(failure.error, Error::Engine(_)));
    assert!(ctx.catalog.get_row_by_id(&legacy).is_ok());
    assert!(ctx.catalog.get_reference_by_id(&legacy).is_ok());
    assert!(ctx.catalog.engine().store().contains(&legacy));

    // the next run retries the delete
    ctx.catalog.engine_mut().clear_failures();
    let report = ctx.sync(&v2);
    assert!(report.is_success());
    assert_eq!(report.deleted, vec![legacy.clone()]);
    assert!(ctx.catalog.get_row_by_id(&legacy).is_err());
}

#[test]
fn test_attribute_of_missing_entity_fails_alone() {
    let mut ctx = TestContext::new();
    let mut lm = LogicalModel::new("v1");
    lm.register_entity(Entity::new("orders", "Orders")).unwrap();
    lm.register_attribute(Attribute::new("ghost.id", assign_id("ghost"), "id"))
        .unwrap();

    let report = ctx.sync(&lm);
    let ghost_id = assign_id("ghost.id");

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.unit_id, ghost_id);
    assert_eq!(failure.phase, SyncPhase::AddPages);
    assert!(matches!(
        &failure.error,
        Error::UnresolvedReference { missing_id, .. } if *missing_id == assign_id("ghost")
    ));

    assert!(ctx.catalog.get_page_by_id(&assign_id("orders")).is_ok());
    assert!(ctx.catalog.get_row_by_id(&ghost_id).is_ok());
    assert!(ctx.catalog.get_page_by_id(&ghost_id).is_err());
}

#[test]
fn test_same_natural_key_last_registration_wins() {
    let mut ctx = TestContext::new();
    let mut lm = LogicalModel::new("v1");
    lm.register_entity(Entity::new("customer", "Customer")).unwrap();
    lm.register_entity(Entity::new("customer", "Client")).unwrap();

    let report = ctx.sync(&lm);

    assert_eq!(report.rows_added.len(), 1);
    assert_eq!(ctx.catalog.row_ids().len(), 1);
    let row = ctx.catalog.get_row_by_id(&assign_id("customer")).unwrap();
    assert_eq!(row.data_unit_name, "Client");
}

#[test]
fn test_catalog_matches_model_after_each_version() {
    let mut ctx = TestContext::new();
    let v1 = sales_model("v1");
    ctx.sync(&v1);
    assert_eq!(ctx.catalog.row_ids(), v1.unit_ids());

    let mut v2 = sales_model("v2");
    v2.register_entity(Entity::new("invoice", "Invoice")).unwrap();
    let report = ctx.sync(&v2);
    assert!(report.is_success());
    assert_eq!(report.rows_added, vec![assign_id("invoice")]);
    assert_eq!(ctx.catalog.row_ids(), v2.unit_ids());

    let mut v3 = LogicalModel::new("v3");
    v3.register_entity(Entity::new("invoice", "Invoice")).unwrap();
    let report = ctx.sync(&v3);
    assert!(report.is_success());
    assert_eq!(report.deleted.len(), v1.len());
    assert_eq!(ctx.catalog.row_ids(), v3.unit_ids());
    assert_eq!(ctx.catalog.engine().store().row_ids(), v3.unit_ids());
}

#[test]
fn test_every_page_reference_resolves() {
    let mut ctx = TestContext::new();
    let lm = sales_model("v1");
    let report = ctx.sync(&lm);
    assert!(report.is_success());
    assert_eq!(report.pages_added.len(), lm.len());

    let catalog = ctx.catalog.catalog();
    for page in catalog.page_by_id.values() {
        assert_eq!(catalog.reference_by_id.get(page.id()), Some(page.reference()));
        for linked in page.linked_references() {
            assert_eq!(catalog.reference_by_id.get(&linked.id), Some(linked));
        }
    }

    let orders_page = ctx.catalog.get_page_by_id(&assign_id("orders")).unwrap();
    assert_eq!(orders_page.linked_references().len(), 3);
}

#[test]
fn test_resync_is_idempotent() {
    let mut ctx = TestContext::new();
    let lm = sales_model("v1");
    ctx.sync(&lm);
    let first = ctx.catalog.catalog().clone();

    let report = ctx.sync(&lm);
    assert!(report.is_success());
    assert!(report.rows_added.is_empty());
    assert!(report.deleted.is_empty());
    assert_eq!(ctx.catalog.catalog(), &first);
}

#[test]
fn test_snapshot_survives_reopen() {
    let mut ctx = TestContext::new();
    let lm = sales_model("v1");
    ctx.sync(&lm);

    let snapshot = LocalSnapshot::from_config(&ctx.config);
    let saved = snapshot.load().unwrap().unwrap();
    assert_eq!(&saved, ctx.catalog.catalog());

    let engine = MemoryCatalogEngine::with_store(ctx.catalog.engine().store().clone());
    let reopened = DataCatalog::open(engine, Some(Box::new(snapshot))).unwrap();
    assert!(reopened.engine().calls().is_empty());
    assert_eq!(reopened.catalog(), ctx.catalog.catalog());
}

#[test]
fn test_tampered_snapshot_refuses_to_open() {
    let mut ctx = TestContext::new();
    ctx.sync(&sales_model("v1"));

    let snapshot = LocalSnapshot::from_config(&ctx.config);
    let text = std::fs::read_to_string(snapshot.path()).unwrap();
    std::fs::write(snapshot.path(), text.replace("\"Orders\"", "\"Orderz\"")).unwrap();

    let result = DataCatalog::open(MemoryCatalogEngine::new(), Some(Box::new(snapshot)));
    assert!(matches!(result, Err(Error::Snapshot(_))));
}

#[test]
fn test_engine_failure_is_isolated_and_recoverable() {
    let mut engine = MemoryCatalogEngine::new();
    engine.fail_on(assign_id("orders"));
    let mut ctx = TestContext::with_engine(engine);
    let lm = sales_model("v1");

    let report = ctx.sync(&lm);

    let orders = assign_id("orders");
    assert!(report.has_failed(&orders));
    assert!(matches!(
        report.failures_in(SyncPhase::AddRows).next().map(|f| &f.error),
        Some(Error::Engine(_))
    ));
    // pages linking to orders cannot be built
    for dependent in ["orders.id", "orders.placed_by"] {
        assert!(report
            .failures_in(SyncPhase::AddPages)
            .any(|f| f.unit_id == assign_id(dependent)));
    }
    assert!(ctx.catalog.get_page_by_id(&assign_id("customer.id")).is_ok());
    // customer lists the relation, which has a row, so its page still builds
    assert!(ctx.catalog.get_page_by_id(&assign_id("customer")).is_ok());

    ctx.catalog.engine_mut().clear_failures();
    ctx.catalog.refresh().unwrap();
    let report = ctx.sync(&lm);

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.rows_added, vec![orders]);
    assert_eq!(ctx.catalog.catalog().page_by_id.len(), lm.len());
}

#[test]
fn test_stale_mirror_needs_refresh() {
    let mut ctx = TestContext::new();
    let lm = sales_model("v1");
    ctx.sync(&lm);

    // another writer created a row the mirror does not know about
    let invoice = Entity::new("invoice", "Invoice");
    let row = DataCatalogRow::new(invoice.id.clone(), DataUnitType::Entity, "Invoice", "General");
    ctx.catalog.engine_mut().add_row(&row).unwrap();

    let mut v2 = sales_model("v2");
    v2.register_entity(invoice).unwrap();
    let report = ctx.sync(&v2);
    assert!(report
        .failures_in(SyncPhase::AddRows)
        .any(|f| matches!(f.error, Error::AlreadyExists { .. })));
    // update-rows resolves the record the other writer made
    let invoice_id = assign_id("invoice");
    assert!(report.rows_updated.contains(&invoice_id));
    assert_eq!(
        ctx.catalog.get_reference_by_id(&invoice_id).unwrap(),
        ctx.catalog.engine().store().reference_by_id.get(&invoice_id).unwrap()
    );

    ctx.catalog.refresh().unwrap();
    let report = ctx.sync(&v2);
    assert!(report.is_success());
    assert!(report.rows_added.is_empty());
    assert!(ctx.catalog.get_page_by_id(&assign_id("invoice")).is_ok());
}
