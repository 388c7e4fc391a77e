use engineshed_core::db::open_db_in_memory;
use engineshed_core::{
    CollectionKind, IndexerError, OrderedCollectionIndexer, RecordId, SqliteCollectionRepository,
    SqliteInventoryRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn indexer(conn: &Connection) -> OrderedCollectionIndexer<SqliteCollectionRepository<'_>> {
    OrderedCollectionIndexer::new(
        SqliteCollectionRepository::try_new(conn, CollectionKind::PurchaseModels).unwrap(),
    )
}

/// Creates a purchase whose models carry `indexes` as imported from sync.
///
/// Model ids increase with their position in `indexes`, so duplicate
/// indexes resolve in slice order.
fn seed_purchase(conn: &Connection, indexes: &[i16]) -> (RecordId, Vec<RecordId>) {
    let inventory = SqliteInventoryRepository::try_new(conn).unwrap();
    let purchase = inventory.create_purchase("Bachmann", "32-100").unwrap();
    let models = indexes
        .iter()
        .enumerate()
        .map(|(offset, index)| {
            inventory
                .import_model(
                    Uuid::from_u128(0x1000 + offset as u128),
                    purchase.uuid,
                    *index,
                    "Class 08",
                    &format!("08{offset:03}"),
                )
                .unwrap()
                .uuid
        })
        .collect();
    (purchase.uuid, models)
}

fn index_of(conn: &Connection, model: RecordId) -> i16 {
    SqliteInventoryRepository::try_new(conn)
        .unwrap()
        .get_model(model, true)
        .unwrap()
        .expect("model should exist")
        .index
}

fn indexes_of(conn: &Connection, models: &[RecordId]) -> Vec<i16> {
    models.iter().map(|model| index_of(conn, *model)).collect()
}

fn needs_sync(conn: &Connection, model: RecordId) -> bool {
    SqliteInventoryRepository::try_new(conn)
        .unwrap()
        .get_model(model, true)
        .unwrap()
        .expect("model should exist")
        .needs_sync
}

fn add_model(conn: &Connection, purchase: RecordId) -> (RecordId, i16) {
    let model = SqliteInventoryRepository::try_new(conn)
        .unwrap()
        .create_model("Class 47", "47401")
        .unwrap();
    let index = indexer(conn).append(purchase, model.uuid).unwrap();
    (model.uuid, index)
}

// append

#[test]
fn add_first_model() {
    let conn = setup();
    let (purchase, _) = seed_purchase(&conn, &[]);

    let (model, index) = add_model(&conn, purchase);

    assert_eq!(index, 0);
    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();
    let loaded = inventory.get_model(model, false).unwrap().unwrap();
    assert_eq!(loaded.purchase_uuid, Some(purchase));
    assert_eq!(loaded.index, 0);
    let listed: Vec<RecordId> = inventory
        .list_models(purchase)
        .unwrap()
        .into_iter()
        .map(|model| model.uuid)
        .collect();
    assert_eq!(listed, vec![model]);
}

#[test]
fn add_second_model() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0]);

    let (_, index) = add_model(&conn, purchase);

    assert_eq!(index, 1);
    assert_eq!(indexes_of(&conn, &models), vec![0]);
}

#[test]
fn add_model_with_gap_repairs_existing_indexes() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2]);

    let (_, index) = add_model(&conn, purchase);

    assert_eq!(index, 2);
    assert_eq!(indexes_of(&conn, &models), vec![0, 1]);
}

#[test]
fn add_model_after_gap_in_middle() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2, 3]);

    let (_, index) = add_model(&conn, purchase);

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 2]);
    assert_eq!(index, 3);
}

#[test]
fn add_model_with_duplicate_repairs_existing_indexes() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 1]);

    let (_, index) = add_model(&conn, purchase);

    assert_eq!(index, 3);
    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 2]);
}

#[test]
fn add_minimizes_changes() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);

    let (model, _) = add_model(&conn, purchase);

    assert!(!needs_sync(&conn, models[0]));
    assert!(!needs_sync(&conn, models[1]));
    assert!(needs_sync(&conn, model));
}

#[test]
fn add_rejects_model_of_another_purchase() {
    let conn = setup();
    let (purchase, _) = seed_purchase(&conn, &[0]);
    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();
    let other = inventory.create_purchase("Dapol", "4D-022").unwrap();
    let foreign = inventory
        .import_model(Uuid::new_v4(), other.uuid, 0, "Class 22", "D6300")
        .unwrap();

    let err = indexer(&conn).append(purchase, foreign.uuid).unwrap_err();

    assert!(matches!(
        err,
        IndexerError::ChildAlreadyAttached { child, parent }
            if child == foreign.uuid && parent == other.uuid
    ));
    assert_eq!(index_of(&conn, foreign.uuid), 0);
}

#[test]
fn add_rejects_unknown_purchase() {
    let conn = setup();
    let model = SqliteInventoryRepository::try_new(&conn)
        .unwrap()
        .create_model("Class 08", "08001")
        .unwrap();
    let missing = Uuid::new_v4();

    let err = indexer(&conn).append(missing, model.uuid).unwrap_err();

    assert!(matches!(err, IndexerError::ParentNotFound(id) if id == missing));
}

// remove

#[test]
fn remove_only_model() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0]);

    indexer(&conn).remove(purchase, models[0]).unwrap();

    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();
    let removed = inventory.get_model(models[0], true).unwrap().unwrap();
    assert!(removed.is_deleted);
    assert_eq!(removed.purchase_uuid, None);
    assert!(inventory.get_model(models[0], false).unwrap().is_none());
    assert!(inventory.list_models(purchase).unwrap().is_empty());
}

#[test]
fn remove_second_model() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);

    indexer(&conn).remove(purchase, models[1]).unwrap();

    assert_eq!(index_of(&conn, models[0]), 0);
    let listed = SqliteInventoryRepository::try_new(&conn)
        .unwrap()
        .list_models(purchase)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].uuid, models[0]);
}

#[test]
fn remove_first_model_of_three_reindexes_tail() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2]);

    indexer(&conn).remove(purchase, models[0]).unwrap();

    assert_eq!(indexes_of(&conn, &models[1..]), vec![0, 1]);
}

#[test]
fn remove_model_after_gap() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2, 3]);

    indexer(&conn).remove(purchase, models[2]).unwrap();

    assert_eq!(indexes_of(&conn, &models[..2]), vec![0, 1]);
}

#[test]
fn remove_model_before_gap() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 3]);

    indexer(&conn).remove(purchase, models[0]).unwrap();

    assert_eq!(indexes_of(&conn, &models[1..]), vec![0, 1]);
}

#[test]
fn remove_model_after_duplicate() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 0, 1]);

    indexer(&conn).remove(purchase, models[2]).unwrap();

    assert_eq!(indexes_of(&conn, &models[..2]), vec![0, 1]);
}

#[test]
fn remove_model_from_duplicate() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 0, 1]);

    indexer(&conn).remove(purchase, models[0]).unwrap();

    assert_eq!(indexes_of(&conn, &models[1..]), vec![0, 1]);
}

#[test]
fn remove_minimizes_changes() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2]);

    indexer(&conn).remove(purchase, models[1]).unwrap();

    assert!(!needs_sync(&conn, models[0]));
    assert!(needs_sync(&conn, models[2]));
    assert_eq!(index_of(&conn, models[2]), 1);
}

#[test]
fn remove_rejects_model_of_another_purchase() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);
    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();
    let other = inventory.create_purchase("Dapol", "4D-022").unwrap();

    let err = indexer(&conn).remove(other.uuid, models[0]).unwrap_err();

    assert!(matches!(
        err,
        IndexerError::ChildNotInParent { child, parent }
            if child == models[0] && parent == other.uuid
    ));
    assert_eq!(indexes_of(&conn, &models), vec![0, 1]);
    assert_eq!(inventory.list_models(purchase).unwrap().len(), 2);
}

#[test]
fn remove_rejects_model_never_added_to_purchase() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);
    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();
    let detached = inventory.create_model("Class 20", "D8000").unwrap();

    let err = indexer(&conn).remove(purchase, detached.uuid).unwrap_err();

    assert!(matches!(
        err,
        IndexerError::ChildNotInParent { child, parent }
            if child == detached.uuid && parent == purchase
    ));
    let reloaded = inventory.get_model(detached.uuid, false).unwrap().unwrap();
    assert!(!reloaded.is_deleted);
    assert_eq!(reloaded.purchase_uuid, None);
    assert_eq!(indexes_of(&conn, &models), vec![0, 1]);
    assert!(models.iter().all(|model| !needs_sync(&conn, *model)));
}

#[test]
fn remove_rejects_already_deleted_model() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);
    let mut indexer = indexer(&conn);
    indexer.remove(purchase, models[0]).unwrap();

    let err = indexer.remove(purchase, models[0]).unwrap_err();

    assert!(matches!(err, IndexerError::ChildNotFound(id) if id == models[0]));
}

// move

#[test]
fn move_model_toward_front() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 4, 2).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 3, 4, 2, 5]);
}

#[test]
fn move_model_toward_back() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 1, 3).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 3, 1, 2, 4, 5]);
}

#[test]
fn move_model_to_same_position_does_nothing() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 4, 4).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 2, 3, 4, 5]);
    assert!(models.iter().all(|model| !needs_sync(&conn, *model)));
}

#[test]
fn move_model_swaps_forward_in_middle() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 2, 3).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 3, 2, 4, 5]);
}

#[test]
fn move_model_swaps_backward_in_middle() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 3, 2).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 3, 2, 4, 5]);
}

#[test]
fn move_model_swaps_pair() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1]);

    indexer(&conn).move_child(purchase, 1, 0).unwrap();
    assert_eq!(indexes_of(&conn, &models), vec![1, 0]);

    indexer(&conn).move_child(purchase, 1, 0).unwrap();
    assert_eq!(indexes_of(&conn, &models), vec![0, 1]);
}

#[test]
fn move_model_cleans_gap_before() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2, 3, 4, 5, 6]);

    indexer(&conn).move_child(purchase, 4, 2).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 1, 3, 4, 2, 5]);
}

#[test]
fn move_model_cleans_gap_after() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 6]);

    indexer(&conn).move_child(purchase, 1, 3).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 3, 1, 2, 4, 5]);
}

#[test]
fn move_model_cleans_duplicate_within() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 2, 3, 4]);

    indexer(&conn).move_child(purchase, 1, 3).unwrap();

    assert_eq!(indexes_of(&conn, &models), vec![0, 3, 1, 2, 4, 5]);
}

#[test]
fn move_minimizes_changes() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 1, 2, 3, 4, 5]);

    indexer(&conn).move_child(purchase, 1, 3).unwrap();

    let touched: Vec<bool> = models.iter().map(|model| needs_sync(&conn, *model)).collect();
    assert_eq!(touched, vec![false, true, true, true, false, false]);
}

#[test]
fn move_rejects_out_of_range_position() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2, 3]);

    let err = indexer(&conn).move_child(purchase, 1, 3).unwrap_err();

    assert!(matches!(
        err,
        IndexerError::PositionOutOfRange { position: 3, len: 3 }
    ));
    assert_eq!(indexes_of(&conn, &models), vec![0, 2, 3]);
}

// normalize

#[test]
fn normalize_repairs_sync_import() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[3, 3, 9, -1]);

    let rewrites = indexer(&conn).normalize(purchase).unwrap();

    assert_eq!(rewrites, 4);
    assert_eq!(indexes_of(&conn, &models), vec![1, 2, 3, 0]);
    assert_eq!(indexer(&conn).normalize(purchase).unwrap(), 0);
}

#[test]
fn mark_all_synced_clears_dirty_rows() {
    let conn = setup();
    let (purchase, models) = seed_purchase(&conn, &[0, 2]);
    indexer(&conn).normalize(purchase).unwrap();
    assert!(needs_sync(&conn, models[1]));

    let cleared = SqliteInventoryRepository::try_new(&conn)
        .unwrap()
        .mark_all_synced(CollectionKind::PurchaseModels)
        .unwrap();

    assert_eq!(cleared, 1);
    assert!(!needs_sync(&conn, models[1]));
}

#[test]
fn model_read_model_serializes_index_field() {
    let conn = setup();
    let (_, models) = seed_purchase(&conn, &[4]);
    let model = SqliteInventoryRepository::try_new(&conn)
        .unwrap()
        .get_model(models[0], false)
        .unwrap()
        .unwrap();

    let value = serde_json::to_value(&model).unwrap();

    assert_eq!(value["index"], 4);
    assert_eq!(value["needs_sync"], false);
}
