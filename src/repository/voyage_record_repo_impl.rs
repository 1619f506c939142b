// ==========================================
// 海上物流报表 - 航次记录 Repository 实现
// ==========================================
// 职责: 实现富化管道数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::voyage::{
    vessel_key, Allocation, EnrichedRecord, EnrichmentBatch, EnrichmentSummary, RawRecord, VoyageGroup,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::voyage_record_repo::VoyageRecordStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// 事件时间落库格式
const EVENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_RAW_COLUMNS: &str = r#"
    record_id, location, event_text, parent_event_text, remarks_text, port_type,
    cost_center_field, vessel_name, voyage_number, event_date,
    effort_hours, cost_amount, daily_rate
"#;

/// 解析事件时间（兼容仅日期 / ISO 格式）
///
/// # 返回
/// - None: 空值或无法解析（由质量评分按“缺失日期”扣分）
pub fn parse_event_date(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in [EVENT_DATE_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn map_raw_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let record_id: i64 = row.get(0)?;
    let event_date_raw: Option<String> = row.get(9)?;
    let event_date = match event_date_raw.as_deref() {
        Some(raw) => {
            let parsed = parse_event_date(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                warn!(record_id, raw_value = %raw, "事件时间无法解析，按缺失处理");
            }
            parsed
        }
        None => None,
    };

    Ok(RawRecord {
        record_id,
        location: row.get(1)?,
        event_text: row.get(2)?,
        parent_event_text: row.get(3)?,
        remarks_text: row.get(4)?,
        port_type: row.get(5)?,
        cost_center_field: row.get(6)?,
        vessel_name: row.get(7)?,
        voyage_number: row.get(8)?,
        event_date,
        effort_hours: row.get(10)?,
        cost_amount: row.get(11)?,
        daily_rate: row.get(12)?,
    })
}

// ==========================================
// EnrichedRow - 富化回写列（查询视图）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub record_id: i64,
    pub department: Option<String>,
    pub mapped_location: Option<String>,
    pub cost_center_id: Option<String>,
    pub classification_source: Option<String>,
    pub unique_voyage_id: Option<String>,
    pub standardized_voyage_id: Option<String>,
    pub quality_score: Option<i64>,
    pub quality_issues: Vec<String>,
    pub is_duplicate: bool,
    pub enriched_at: Option<String>,
}

// ==========================================
// VoyageRecordStoreImpl
// ==========================================
pub struct VoyageRecordStoreImpl {
    conn: Arc<Mutex<Connection>>,
}

impl VoyageRecordStoreImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入上传行（供上传流程/测试使用）
    ///
    /// # 返回
    /// - Ok(Vec<i64>): 新行 record_id（record_id 为 0 时由 SQLite 分配）
    pub fn insert_raw_records(&self, records: &[RawRecord]) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO voyage_event (
                    record_id, location, event_text, parent_event_text, remarks_text, port_type,
                    cost_center_field, vessel_name, voyage_number, event_date,
                    effort_hours, cost_amount, daily_rate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )?;

            for record in records {
                let record_id = (record.record_id > 0).then_some(record.record_id);
                stmt.execute(params![
                    record_id,
                    record.location,
                    record.event_text,
                    record.parent_event_text,
                    record.remarks_text,
                    record.port_type,
                    record.cost_center_field,
                    record.vessel_name,
                    record.voyage_number,
                    record.event_date.map(|d| d.format(EVENT_DATE_FORMAT).to_string()),
                    record.effort_hours,
                    record.cost_amount,
                    record.daily_rate,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// 查询单行富化结果
    pub fn find_enriched(&self, record_id: i64) -> RepositoryResult<Option<EnrichedRow>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT record_id, department, mapped_location, cost_center_id,
                       classification_source, unique_voyage_id, standardized_voyage_id,
                       quality_score, quality_issues, is_duplicate, enriched_at
                FROM voyage_event
                WHERE record_id = ?1
                "#,
                params![record_id],
                |row| {
                    Ok((
                        EnrichedRow {
                            record_id: row.get(0)?,
                            department: row.get(1)?,
                            mapped_location: row.get(2)?,
                            cost_center_id: row.get(3)?,
                            classification_source: row.get(4)?,
                            unique_voyage_id: row.get(5)?,
                            standardized_voyage_id: row.get(6)?,
                            quality_score: row.get(7)?,
                            quality_issues: Vec::new(),
                            is_duplicate: row.get::<_, i64>(9)? != 0,
                            enriched_at: row.get(10)?,
                        },
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut enriched, issues_json)) => {
                if let Some(json) = issues_json {
                    enriched.quality_issues = serde_json::from_str(&json)?;
                }
                Ok(Some(enriched))
            }
            None => Ok(None),
        }
    }

    /// 查询单行分摊明细（按 seq 升序）
    pub fn list_allocations(&self, record_id: i64) -> RepositoryResult<Vec<(Option<String>, String, f64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT cost_center_id, department, percentage
            FROM voyage_event_allocation
            WHERE record_id = ?1
            ORDER BY seq
            "#,
        )?;

        let rows = stmt.query_map(params![record_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;

        let mut allocations = Vec::new();
        for row in rows {
            allocations.push(row?);
        }
        Ok(allocations)
    }

    /// 统计分摊明细总行数
    pub fn count_allocations(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM voyage_event_allocation", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 查询航次聚合 (stop_list, pattern, is_standard_pattern, purpose, total_duration_hours)
    pub fn find_voyage_group(
        &self,
        unique_voyage_id: &str,
    ) -> RepositoryResult<Option<(Vec<String>, String, bool, String, f64)>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT stop_list, pattern, is_standard_pattern, purpose, total_duration_hours
                FROM voyage_group
                WHERE unique_voyage_id = ?1
                "#,
                params![unique_voyage_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)? != 0,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((stops_json, pattern, is_standard, purpose, hours)) => {
                let stops: Vec<String> = serde_json::from_str(&stops_json)?;
                Ok(Some((stops, pattern, is_standard, purpose, hours)))
            }
            None => Ok(None),
        }
    }

    /// 统计运行日志条数
    pub fn count_runs(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM enrichment_run", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 在事务中回写单条富化记录（含分摊明细替换）
    fn update_record_tx(
        tx: &Transaction,
        record: &EnrichedRecord,
        enriched_at: &str,
    ) -> RepositoryResult<()> {
        let primary = record.primary_allocation();
        let issues_json = serde_json::to_string(&record.quality.issues)?;

        let affected = tx.execute(
            r#"
            UPDATE voyage_event SET
                department = ?1,
                mapped_location = ?2,
                cost_center_id = ?3,
                classification_source = ?4,
                unique_voyage_id = ?5,
                standardized_voyage_id = ?6,
                quality_score = ?7,
                quality_issues = ?8,
                is_duplicate = ?9,
                enriched_at = ?10
            WHERE record_id = ?11
            "#,
            params![
                record.department().as_str(),
                record.mapped_location(),
                primary.and_then(|a| a.cost_center_id.clone()),
                record.classification_source.to_string(),
                record.unique_voyage_id,
                record.standardized_voyage_id,
                record.quality.score as i64,
                issues_json,
                record.is_duplicate as i32,
                enriched_at,
                record.raw.record_id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "voyage_event".to_string(),
                id: record.raw.record_id.to_string(),
            });
        }

        // 分摊明细整体替换，保证重跑幂等
        tx.execute(
            "DELETE FROM voyage_event_allocation WHERE record_id = ?1",
            params![record.raw.record_id],
        )?;

        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO voyage_event_allocation (
                record_id, seq, cost_center_id, department, percentage,
                allocated_hours, mapped_location, is_reference_matched
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;

        for (seq, allocation) in record.allocations.iter().enumerate() {
            Self::insert_allocation(&mut stmt, record.raw.record_id, seq, allocation)?;
        }

        Ok(())
    }

    fn insert_allocation(
        stmt: &mut rusqlite::CachedStatement<'_>,
        record_id: i64,
        seq: usize,
        allocation: &Allocation,
    ) -> RepositoryResult<()> {
        stmt.execute(params![
            record_id,
            seq as i64,
            allocation.cost_center_id,
            allocation.department.as_str(),
            allocation.percentage,
            allocation.allocated_hours,
            allocation.mapped_location,
            allocation.is_reference_matched as i32,
        ])?;
        Ok(())
    }

    /// 在事务中写入航次聚合（UPSERT）
    fn upsert_voyage_tx(
        tx: &Transaction,
        voyage: &VoyageGroup,
        updated_at: &str,
    ) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO voyage_group (
                unique_voyage_id, standardized_voyage_id, vessel_name, voyage_number,
                year, month, stop_list, stop_count, total_duration_hours,
                pattern, is_standard_pattern, purpose, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(unique_voyage_id) DO UPDATE SET
                standardized_voyage_id = excluded.standardized_voyage_id,
                vessel_name = excluded.vessel_name,
                voyage_number = excluded.voyage_number,
                year = excluded.year,
                month = excluded.month,
                stop_list = excluded.stop_list,
                stop_count = excluded.stop_count,
                total_duration_hours = excluded.total_duration_hours,
                pattern = excluded.pattern,
                is_standard_pattern = excluded.is_standard_pattern,
                purpose = excluded.purpose,
                updated_at = excluded.updated_at
            "#,
            params![
                voyage.unique_voyage_id,
                voyage.standardized_voyage_id,
                voyage.key.vessel_name,
                voyage.key.voyage_number,
                voyage.key.year,
                voyage.key.month,
                serde_json::to_string(&voyage.stop_list)?,
                voyage.stop_count as i64,
                voyage.total_duration_hours,
                voyage.pattern.to_string(),
                voyage.is_standard_pattern as i32,
                voyage.purpose.to_string(),
                updated_at,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl VoyageRecordStore for VoyageRecordStoreImpl {
    async fn fetch_records(&self, force: bool) -> RepositoryResult<Vec<RawRecord>> {
        let conn = self.get_conn()?;

        if force {
            let sql = format!(
                "SELECT {} FROM voyage_event ORDER BY record_id",
                SELECT_RAW_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_raw_record)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }

            debug!(force, count = records.len(), "读取待富化记录");
            return Ok(records);
        }

        // 含未富化行的船舶（按航次 ID 同一归一化）
        let pending_vessels: HashSet<String> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT DISTINCT vessel_name FROM voyage_event
                WHERE enriched_at IS NULL AND vessel_name IS NOT NULL
                "#,
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut vessels = HashSet::new();
            for row in rows {
                let key = vessel_key(&row?);
                if !key.is_empty() {
                    vessels.insert(key);
                }
            }
            vessels
        };

        let sql = format!(
            "SELECT {}, enriched_at IS NULL FROM voyage_event ORDER BY record_id",
            SELECT_RAW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((map_raw_record(row)?, row.get::<_, bool>(13)?)))?;

        // 未富化行 + 所属船舶的全部行
        let mut records = Vec::new();
        for row in rows {
            let (record, pending) = row?;
            let same_vessel = record
                .vessel_name
                .as_deref()
                .map(|v| pending_vessels.contains(&vessel_key(v)))
                .unwrap_or(false);
            if pending || same_vessel {
                records.push(record);
            }
        }

        debug!(
            force,
            pending_vessels = pending_vessels.len(),
            count = records.len(),
            "读取待富化记录"
        );
        Ok(records)
    }

    async fn update_many(&self, batch: &EnrichmentBatch) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let enriched_at = batch.enriched_at.to_rfc3339();

        let mut count = 0;
        for record in &batch.records {
            Self::update_record_tx(&tx, record, &enriched_at)?;
            count += 1;
        }

        for voyage in &batch.voyages {
            Self::upsert_voyage_tx(&tx, voyage, &enriched_at)?;
        }

        // 任一步失败时 tx 被 drop，自动回滚
        tx.commit()?;
        Ok(count)
    }

    async fn insert_run_log(&self, summary: &EnrichmentSummary) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let summary_json = serde_json::to_string(summary)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO enrichment_run (
                run_id, forced, total_scanned, total_updated, needs_review, duplicates,
                batches_committed, batches_failed, started_at, finished_at, elapsed_ms,
                summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                summary.run_id,
                summary.forced as i32,
                summary.total_scanned as i64,
                summary.total_updated as i64,
                summary.needs_review_count as i64,
                summary.duplicate_count as i64,
                summary.batches_committed as i64,
                summary.batches_failed as i64,
                summary.started_at.map(|t: DateTime<Utc>| t.to_rfc3339()),
                summary.finished_at.map(|t: DateTime<Utc>| t.to_rfc3339()),
                summary.elapsed_ms as i64,
                summary_json,
            ],
        )?;
        Ok(())
    }
}
