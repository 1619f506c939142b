// ==========================================
// 仓储层集成测试
// ==========================================
// 测试目标: voyage_event 读写 / 批次事务 / 参考表数据源
// ==========================================


use chrono::{NaiveDate, Utc};
use offshore_logistics_enrich::domain::{
    Allocation, EnrichedRecord, EnrichmentBatch, EnrichmentSummary, QualityScore, VoyageGroup,
    VoyageKey,
};
use offshore_logistics_enrich::repository::{
    CostCenterSource, RepositoryError, SqliteCostCenterSource, VoyageRecordStore,
    VoyageRecordStoreImpl,
};
use offshore_logistics_enrich::{
    ClassificationSource, Department, RawRecord, VoyagePattern, VoyagePurpose,
};
use test_helpers::{create_test_db, event, insert_events, open_test_connection, reference_entries};

fn enriched(raw: RawRecord, department: Department, percentage_split: &[f64]) -> EnrichedRecord {
    let allocations = percentage_split
        .iter()
        .enumerate()
        .map(|(idx, pct)| Allocation {
            cost_center_id: Some(format!("CC{}", idx)),
            department,
            percentage: *pct,
            allocated_hours: 0.0,
            mapped_location: "Fourchon".to_string(),
            is_reference_matched: true,
        })
        .collect();

    EnrichedRecord {
        raw,
        allocations,
        classification_source: ClassificationSource::CostCenter,
        unique_voyage_id: None,
        standardized_voyage_id: None,
        quality: QualityScore::default(),
        is_duplicate: false,
    }
}

fn batch(records: Vec<EnrichedRecord>, voyages: Vec<VoyageGroup>) -> EnrichmentBatch {
    EnrichmentBatch {
        batch_no: 1,
        records,
        voyages,
        enriched_at: Utc::now(),
    }
}

// ==========================================
// 读取
// ==========================================

#[tokio::test]
async fn test_insert_and_fetch_raw_records() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = insert_events(
        &db_path,
        &[
            event("HOS ACHIEVER", "12", 1, "Fourchon", "10027", 6.5),
            event("SEACOR POWER", "3", 2, "Mad Dog", "4100", 4.0),
        ],
    )
    .unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let records = store.fetch_records(true).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record_id, ids[0]);
    assert_eq!(records[0].vessel_name.as_deref(), Some("HOS ACHIEVER"));
    assert_eq!(records[0].effort_hours, Some(6.5));
    assert_eq!(
        records[0].event_date,
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(7, 0, 0))
    );
}

#[tokio::test]
async fn test_fetch_parses_date_only_and_tolerates_garbage() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO voyage_event (record_id, vessel_name, event_date) VALUES (1, 'A', '2024-03-05');
        INSERT INTO voyage_event (record_id, vessel_name, event_date) VALUES (2, 'B', 'not a date');
        INSERT INTO voyage_event (record_id, vessel_name, event_date) VALUES (3, 'C', NULL);
        "#,
    )
    .unwrap();

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let records = store.fetch_records(true).await.unwrap();

    assert_eq!(
        records[0].event_date,
        NaiveDate::from_ymd_opt(2024, 3, 5).and_then(|d| d.and_hms_opt(0, 0, 0))
    );
    assert_eq!(records[1].event_date, None);
    assert_eq!(records[2].event_date, None);
}

#[tokio::test]
async fn test_fetch_unforced_expands_to_whole_vessel() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = insert_events(
        &db_path,
        &[
            event("HOS ACHIEVER", "12", 1, "Fourchon", "", 1.0),
            event("SEACOR POWER", "3", 1, "Mad Dog", "", 1.0),
        ],
    )
    .unwrap();

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let all = store.fetch_records(true).await.unwrap();
    let records: Vec<EnrichedRecord> = all
        .into_iter()
        .map(|r| enriched(r, Department::Logistics, &[100.0]))
        .collect();
    store.update_many(&batch(records, Vec::new())).await.unwrap();

    assert!(store.fetch_records(false).await.unwrap().is_empty());

    // 大小写/空白不同的同一船舶
    let new_ids = insert_events(&db_path, &[event(" hos achiever", "12", 2, "Fourchon", "", 1.0)])
        .unwrap();
    let pending = store.fetch_records(false).await.unwrap();
    let pending_ids: Vec<i64> = pending.iter().map(|r| r.record_id).collect();
    assert_eq!(pending_ids, vec![ids[0], new_ids[0]]);
}

#[tokio::test]
async fn test_fetch_unforced_expands_across_punctuation_variants() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = insert_events(
        &db_path,
        &[
            event("HOS ACHIEVER", "12", 1, "Fourchon", "", 1.0),
            event("HOS ACHIEVER II", "4", 1, "Fourchon", "", 1.0),
        ],
    )
    .unwrap();

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let records: Vec<EnrichedRecord> = store
        .fetch_records(true)
        .await
        .unwrap()
        .into_iter()
        .map(|r| enriched(r, Department::Logistics, &[100.0]))
        .collect();
    store.update_many(&batch(records, Vec::new())).await.unwrap();

    // 与航次 ID 同一归一化: "HOS-ACHIEVER" 与 "HOS ACHIEVER" 为同一船舶
    let new_ids = insert_events(&db_path, &[event("HOS-ACHIEVER", "12", 2, "Thunder Horse", "", 1.0)])
        .unwrap();
    let pending_ids: Vec<i64> = store
        .fetch_records(false)
        .await
        .unwrap()
        .iter()
        .map(|r| r.record_id)
        .collect();
    assert_eq!(pending_ids, vec![ids[0], new_ids[0]]);
}

// ==========================================
// 批次事务
// ==========================================

#[tokio::test]
async fn test_update_many_replaces_allocations() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = insert_events(&db_path, &[event("HOS ACHIEVER", "12", 1, "Fourchon", "", 1.0)])
        .unwrap();

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let raw = store.fetch_records(true).await.unwrap().remove(0);

    let first = batch(
        vec![enriched(raw.clone(), Department::Production, &[50.0, 30.0, 20.0])],
        Vec::new(),
    );
    assert_eq!(store.update_many(&first).await.unwrap(), 1);
    assert_eq!(store.count_allocations().unwrap(), 3);

    let second = batch(vec![enriched(raw, Department::Drilling, &[100.0])], Vec::new());
    store.update_many(&second).await.unwrap();

    assert_eq!(store.count_allocations().unwrap(), 1);
    let row = store.find_enriched(ids[0]).unwrap().unwrap();
    assert_eq!(row.department.as_deref(), Some("Drilling"));
    assert_eq!(row.cost_center_id.as_deref(), Some("CC0"));
    assert_eq!(row.mapped_location.as_deref(), Some("Fourchon"));
}

#[tokio::test]
async fn test_update_many_rolls_back_on_missing_row() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = insert_events(&db_path, &[event("HOS ACHIEVER", "12", 1, "Fourchon", "", 1.0)])
        .unwrap();

    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();
    let raw = store.fetch_records(true).await.unwrap().remove(0);
    let ghost = RawRecord {
        record_id: 9_999,
        ..raw.clone()
    };

    let result = store
        .update_many(&batch(
            vec![
                enriched(raw, Department::Logistics, &[100.0]),
                enriched(ghost, Department::Logistics, &[100.0]),
            ],
            Vec::new(),
        ))
        .await;

    assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    let row = store.find_enriched(ids[0]).unwrap().unwrap();
    assert!(row.enriched_at.is_none());
    assert_eq!(store.count_allocations().unwrap(), 0);
}

#[tokio::test]
async fn test_voyage_group_upsert() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();

    let mut voyage = VoyageGroup {
        unique_voyage_id: "HOS_ACHIEVER_12_2024_03".to_string(),
        standardized_voyage_id: "202403-HOS_ACHIEVER-V12".to_string(),
        key: VoyageKey {
            vessel_name: "HOS ACHIEVER".to_string(),
            voyage_number: "12".to_string(),
            year: 2024,
            month: 3,
        },
        stop_list: vec!["Fourchon".to_string(), "Thunder Horse".to_string()],
        stop_count: 2,
        total_duration_hours: 12.5,
        pattern: VoyagePattern::Outbound,
        is_standard_pattern: true,
        purpose: VoyagePurpose::Production,
        member_record_ids: vec![1, 2],
    };
    store.update_many(&batch(Vec::new(), vec![voyage.clone()])).await.unwrap();

    voyage.stop_list.push("Fourchon".to_string());
    voyage.stop_count = 3;
    voyage.pattern = VoyagePattern::RoundTrip;
    store.update_many(&batch(Vec::new(), vec![voyage])).await.unwrap();

    let (stops, pattern, is_standard, purpose, hours) = store
        .find_voyage_group("HOS_ACHIEVER_12_2024_03")
        .unwrap()
        .unwrap();
    assert_eq!(stops.len(), 3);
    assert_eq!(pattern, "ROUND_TRIP");
    assert!(is_standard);
    assert_eq!(purpose, "PRODUCTION");
    assert_eq!(hours, 12.5);
}

#[tokio::test]
async fn test_insert_run_log() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = VoyageRecordStoreImpl::new(&db_path).unwrap();

    let summary = EnrichmentSummary {
        run_id: "run-1".to_string(),
        total_scanned: 10,
        total_updated: 8,
        batches_committed: 1,
        batches_failed: 1,
        ..Default::default()
    };
    store.insert_run_log(&summary).await.unwrap();
    assert_eq!(store.count_runs().unwrap(), 1);
}

// ==========================================
// 参考表数据源
// ==========================================

#[test]
fn test_sqlite_reference_source_roundtrip() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let source = SqliteCostCenterSource::new(&db_path).unwrap();

    assert!(source.load_entries().unwrap().is_empty());

    source.upsert_entries(&reference_entries()).unwrap();
    source.upsert_entries(&reference_entries()).unwrap();

    let entries = source.load_entries().unwrap();
    assert_eq!(entries.len(), 3);
    let thunder_horse = entries
        .iter()
        .find(|e| e.cost_center_id == "9999")
        .unwrap();
    assert_eq!(thunder_horse.department, Department::Production);
    assert_eq!(thunder_horse.rig_reference, "Thunder Horse");
}

#[test]
fn test_sqlite_reference_source_unknown_department() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    conn.execute(
        "INSERT INTO cost_center_reference (cost_center_id, department, rig_reference) VALUES ('7', 'Catering', 'Galley')",
        [],
    )
    .unwrap();

    let source = SqliteCostCenterSource::new(&db_path).unwrap();
    let entries = source.load_entries().unwrap();
    assert_eq!(entries[0].department, Department::Operations);
}
