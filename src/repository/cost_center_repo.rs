// ==========================================
// 海上物流报表 - 成本中心参考表数据源
// ==========================================
// 职责: 从 SQLite 表或 CSV 参考文件加载成本中心参考表
// 红线: 运行开始时加载一次，运行期间只读
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::Department;
use crate::domain::voyage::CostCenterEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use csv::ReaderBuilder;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// CostCenterSource Trait
// ==========================================
// 实现者: SqliteCostCenterSource, CsvCostCenterSource
pub trait CostCenterSource: Send + Sync {
    /// 数据源描述（日志用）
    fn describe(&self) -> String;

    /// 加载全部参考表行
    ///
    /// # 返回
    /// - Ok(Vec<CostCenterEntry>): 参考表行（可能为空，由调用方判定是否可用）
    /// - Err: 数据源不可读
    fn load_entries(&self) -> RepositoryResult<Vec<CostCenterEntry>>;
}

/// 解析参考表中的部门标签
///
/// # 说明
/// - 不在固定集合内的标签归为 Operations 并告警
fn parse_reference_department(cost_center_id: &str, label: &str) -> Department {
    Department::parse(label).unwrap_or_else(|| {
        warn!(
            cost_center_id = %cost_center_id,
            department = %label,
            "参考表部门不在固定集合内，归为 Operations"
        );
        Department::Operations
    })
}

// ==========================================
// SqliteCostCenterSource
// ==========================================
pub struct SqliteCostCenterSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCostCenterSource {
    /// 创建新的数据源实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建数据源实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 写入参考表行（UPSERT，供参考数据维护/测试使用）
    pub fn upsert_entries(&self, entries: &[CostCenterEntry]) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO cost_center_reference (
                    cost_center_id, department, rig_reference, facility_type
                ) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(cost_center_id) DO UPDATE SET
                    department = excluded.department,
                    rig_reference = excluded.rig_reference,
                    facility_type = excluded.facility_type
                "#,
                params![
                    entry.cost_center_id,
                    entry.department.as_str(),
                    entry.rig_reference,
                    entry.facility_type,
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }
}

impl CostCenterSource for SqliteCostCenterSource {
    fn describe(&self) -> String {
        "sqlite:cost_center_reference".to_string()
    }

    fn load_entries(&self) -> RepositoryResult<Vec<CostCenterEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT cost_center_id, department, rig_reference, facility_type
            FROM cost_center_reference
            ORDER BY cost_center_id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (cost_center_id, department, rig_reference, facility_type) = row?;
            let department = parse_reference_department(&cost_center_id, &department);
            entries.push(CostCenterEntry {
                cost_center_id: cost_center_id.trim().to_string(),
                department,
                rig_reference: rig_reference.trim().to_string(),
                facility_type: facility_type.unwrap_or_default().trim().to_string(),
            });
        }

        Ok(entries)
    }
}

// ==========================================
// CsvCostCenterSource
// ==========================================
// 表头（大小写不敏感）: cost_center_id | lc_number, department, rig_reference, facility_type
pub struct CsvCostCenterSource {
    path: PathBuf,
}

impl CsvCostCenterSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 表头归一化为标准列名
    fn canonical_header(header: &str) -> Option<&'static str> {
        match header.trim().to_lowercase().replace(' ', "_").as_str() {
            "cost_center_id" | "cost_center" | "lc_number" | "lc" => Some("cost_center_id"),
            "department" => Some("department"),
            "rig_reference" | "rig" | "facility" => Some("rig_reference"),
            "facility_type" => Some("facility_type"),
            _ => None,
        }
    }
}

impl CostCenterSource for CsvCostCenterSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load_entries(&self) -> RepositoryResult<Vec<CostCenterEntry>> {
        if !self.path.exists() {
            return Err(RepositoryError::SourceReadError {
                source_name: self.describe(),
                message: "文件不存在".to_string(),
            });
        }

        let file = File::open(&self.path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头: 列序号 → 标准列名
        let columns: HashMap<usize, &'static str> = reader
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| Self::canonical_header(h).map(|c| (idx, c)))
            .collect();

        if !columns.values().any(|c| *c == "cost_center_id") {
            return Err(RepositoryError::SourceReadError {
                source_name: self.describe(),
                message: "缺少 cost_center_id 列".to_string(),
            });
        }

        let mut entries = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut row_map: HashMap<&'static str, String> = HashMap::new();
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(column) = columns.get(&col_idx) {
                    row_map.insert(*column, value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            let cost_center_id = row_map.remove("cost_center_id").unwrap_or_default();
            if cost_center_id.is_empty() {
                warn!(row_number = row_idx + 2, "参考表行缺少成本中心号，已跳过");
                continue;
            }

            let department = parse_reference_department(
                &cost_center_id,
                row_map.get("department").map(String::as_str).unwrap_or(""),
            );

            entries.push(CostCenterEntry {
                cost_center_id,
                department,
                rig_reference: row_map.remove("rig_reference").unwrap_or_default(),
                facility_type: row_map.remove("facility_type").unwrap_or_default(),
            });
        }

        Ok(entries)
    }
}
