use gridstore_core::configuration::Configuration;
use gridstore_core::errors::GridError;
use gridstore_core::query::parse_list_request;
use gridstore_core::storage::{parse_csv_reader, Store};

fn test_store(dir: &tempfile::TempDir) -> Store {
    let config = Configuration {
        location: Some(dir.path().join("grids.db").to_string_lossy().into_owned()),
        pool_size: Some(2),
        ..Default::default()
    };
    Store::open(&config).unwrap()
}

fn list_request(pairs: &[(&str, &str)]) -> gridstore_core::query::ListRequest {
    parse_list_request(pairs.iter().copied())
}

#[tokio::test]
async fn upload_counts_add_up() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("Name,Salary\nAnn,50000\nBo,\n,\n,\nCy,700\n".as_bytes()).unwrap();
    // Two blank rows, three with data.
    assert_eq!(parsed.validation_errors.len(), 2);
    let total = parsed.rows.len();

    let (inserted, skipped) = store.bulk_insert("u1", None, parsed.rows).await.unwrap();
    assert_eq!(inserted + skipped, total);
    assert_eq!(inserted, 3);
}

#[tokio::test]
async fn cross_user_access_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("Name\nAnn\n".as_bytes()).unwrap();
    store.bulk_insert("owner", None, parsed.rows).await.unwrap();

    let page = store
        .list_records("owner", list_request(&[]))
        .await
        .unwrap();
    let id = &page.data[0].id;

    assert!(matches!(
        store.get_record("intruder", id).await,
        Err(GridError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_record("intruder", id).await,
        Err(GridError::NotFound(_))
    ));
    // The rightful owner still sees it.
    assert!(store.get_record("owner", id).await.is_ok());
}

#[tokio::test]
async fn filters_and_totals_agree_at_store_level() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let csv = "Brand,Range\nBMW,300\nBMW,420\nKia,250\nTesla,500\n";
    let parsed = parse_csv_reader(csv.as_bytes()).unwrap();
    store.bulk_insert("u1", None, parsed.rows).await.unwrap();

    let mut req = list_request(&[("Brand_contains", "bm")]);
    req.limit = 1;
    let page = store.list_records("u1", req).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total_pages, 2);

    let req = list_request(&[("Range_greaterThan", "400")]);
    let page = store.list_records("u1", req).await.unwrap();
    assert_eq!(page.total, 2);
    for record in &page.data {
        let range: f64 = record.data["Range"].as_str().unwrap().parse().unwrap();
        assert!(range > 400.0);
    }
}

#[tokio::test]
async fn grid_lifecycle_create_replace_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("Name,Salary\nAnn,50000\nBo,60000\n".as_bytes()).unwrap();
    let (grid_id, inserted) = store
        .create_grid("u1", "staff", None, false, parsed.column_order, parsed.rows)
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let grids = store.list_grids("u1").await.unwrap();
    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0].record_count, 2);
    assert_eq!(
        grids[0].column_order.as_deref(),
        Some(&["Name".to_string(), "Salary".to_string()][..])
    );

    // Replacement swaps the data and the column order under the same id.
    let parsed = parse_csv_reader("Who,Where\nCy,Berlin\n".as_bytes()).unwrap();
    let (replaced_id, inserted) = store
        .create_grid(
            "u1",
            "staff",
            Some(grid_id.clone()),
            true,
            parsed.column_order,
            parsed.rows,
        )
        .await
        .unwrap();
    assert_eq!(replaced_id, grid_id);
    assert_eq!(inserted, 1);

    let grid = store.get_grid("u1", &grid_id).await.unwrap();
    assert_eq!(grid.record_count, 1);
    assert_eq!(
        grid.column_order.as_deref(),
        Some(&["Who".to_string(), "Where".to_string()][..])
    );

    // Delete cascades to the records.
    store.delete_grid("u1", &grid_id).await.unwrap();
    let req = list_request(&[("gridId", grid_id.as_str())]);
    let page = store.list_records("u1", req).await.unwrap();
    assert_eq!(page.total, 0);
    assert!(matches!(
        store.get_grid("u1", &grid_id).await,
        Err(GridError::NotFound(_))
    ));
}

#[tokio::test]
async fn grid_scoped_listing_only_sees_its_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("N\n1\n2\n".as_bytes()).unwrap();
    let (grid_id, _) = store
        .create_grid("u1", "a", None, false, parsed.column_order, parsed.rows)
        .await
        .unwrap();
    let loose = parse_csv_reader("N\n3\n".as_bytes()).unwrap();
    store.bulk_insert("u1", None, loose.rows).await.unwrap();

    let page = store
        .list_records("u1", list_request(&[("gridId", grid_id.as_str())]))
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = store.list_records("u1", list_request(&[])).await.unwrap();
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn bulk_insert_rejects_foreign_grid() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("N\n1\n".as_bytes()).unwrap();
    let (grid_id, _) = store
        .create_grid("owner", "g", None, false, parsed.column_order, parsed.rows)
        .await
        .unwrap();

    let rows = parse_csv_reader("N\n2\n".as_bytes()).unwrap().rows;
    assert!(matches!(
        store.bulk_insert("intruder", Some(grid_id), rows).await,
        Err(GridError::NotFound(_))
    ));
}

#[tokio::test]
async fn rename_grid_checks_ownership_and_input() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let parsed = parse_csv_reader("N\n1\n".as_bytes()).unwrap();
    let (grid_id, _) = store
        .create_grid("u1", "old", None, false, parsed.column_order, parsed.rows)
        .await
        .unwrap();

    assert!(matches!(
        store.rename_grid("u1", &grid_id, "  ").await,
        Err(GridError::Validation(_))
    ));
    assert!(matches!(
        store.rename_grid("other", &grid_id, "new").await,
        Err(GridError::NotFound(_))
    ));

    store.rename_grid("u1", &grid_id, " new name ").await.unwrap();
    assert_eq!(store.get_grid("u1", &grid_id).await.unwrap().name, "new name");
}

#[tokio::test]
async fn users_register_once_per_email() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let user = store
        .create_user("Ann", "ann@example.com", "hash")
        .await
        .unwrap();
    assert!(matches!(
        store.create_user("Other", "ann@example.com", "hash2").await,
        Err(GridError::EmailTaken)
    ));

    let (found, hash) = store
        .user_by_email("ann@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, user);
    assert_eq!(hash, "hash");
    assert!(store.user_by_email("bo@example.com").await.unwrap().is_none());
}
