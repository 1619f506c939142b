// ==========================================
// 海上物流报表 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建库脚本（CLI 与测试共用）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 表:
/// - voyage_event: 上传行 + 富化回写列（UPDATE 同一行）
/// - voyage_event_allocation: 分摊明细（按 record_id 整体替换，重跑不重复）
/// - voyage_group: 航次聚合（按 unique_voyage_id UPSERT）
/// - cost_center_reference: 成本中心参考表（运行期间只读）
/// - enrichment_run: 运行日志
/// - config_scope / config_kv: 配置
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS cost_center_reference (
            cost_center_id TEXT PRIMARY KEY,
            department TEXT NOT NULL,
            rig_reference TEXT NOT NULL,
            facility_type TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS voyage_event (
            record_id INTEGER PRIMARY KEY,
            location TEXT,
            event_text TEXT,
            parent_event_text TEXT,
            remarks_text TEXT,
            port_type TEXT,
            cost_center_field TEXT,
            vessel_name TEXT,
            voyage_number TEXT,
            event_date TEXT,
            effort_hours REAL,
            cost_amount REAL,
            daily_rate REAL,
            department TEXT,
            mapped_location TEXT,
            cost_center_id TEXT,
            classification_source TEXT,
            unique_voyage_id TEXT,
            standardized_voyage_id TEXT,
            quality_score INTEGER,
            quality_issues TEXT,
            is_duplicate INTEGER NOT NULL DEFAULT 0,
            enriched_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_voyage_event_vessel ON voyage_event(vessel_name);
        CREATE INDEX IF NOT EXISTS idx_voyage_event_enriched ON voyage_event(enriched_at);

        CREATE TABLE IF NOT EXISTS voyage_event_allocation (
            record_id INTEGER NOT NULL REFERENCES voyage_event(record_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            cost_center_id TEXT,
            department TEXT NOT NULL,
            percentage REAL NOT NULL,
            allocated_hours REAL NOT NULL DEFAULT 0,
            mapped_location TEXT NOT NULL,
            is_reference_matched INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (record_id, seq)
        );

        CREATE TABLE IF NOT EXISTS voyage_group (
            unique_voyage_id TEXT PRIMARY KEY,
            standardized_voyage_id TEXT NOT NULL,
            vessel_name TEXT NOT NULL,
            voyage_number TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            stop_list TEXT NOT NULL,
            stop_count INTEGER NOT NULL,
            total_duration_hours REAL NOT NULL,
            pattern TEXT NOT NULL,
            is_standard_pattern INTEGER NOT NULL,
            purpose TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS enrichment_run (
            run_id TEXT PRIMARY KEY,
            forced INTEGER NOT NULL,
            total_scanned INTEGER NOT NULL,
            total_updated INTEGER NOT NULL,
            needs_review INTEGER NOT NULL,
            duplicates INTEGER NOT NULL,
            batches_committed INTEGER NOT NULL,
            batches_failed INTEGER NOT NULL,
            started_at TEXT,
            finished_at TEXT,
            elapsed_ms INTEGER NOT NULL,
            summary_json TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
