// ==========================================
// 海上物流报表 - 航次记录领域模型
// ==========================================
// 职责: 原始记录 / 成本中心参考 / 分摊 / 航次分组 / 质量评分 / 富化结果
// ==========================================

use crate::domain::types::{ClassificationSource, Department, VoyagePattern, VoyagePurpose};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 标识符归一化
// ==========================================

/// 标识符归一化: 大写，非字母数字连续段 → `_`，去掉首尾 `_`
pub fn slug_identifier(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_sep = false;
    for c in value.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_uppercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// 船舶归一键
///
/// # 说明
/// - 分批、增量读取扩展、航次 ID 共用同一归一化
/// - 空串表示无船名
pub fn vessel_key(vessel_name: &str) -> String {
    slug_identifier(vessel_name)
}

// ==========================================
// RawRecord - 上传原始行
// ==========================================
// 用途: 列名归一化后的上传行,管道运行期间只读
// 对齐: voyage_event 表源字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    // ===== 主键 =====
    pub record_id: i64, // 存储行 ID（富化结果回写同一行）

    // ===== 文本字段 =====
    pub location: Option<String>,          // 地点（自由文本）
    pub event_text: Option<String>,        // 事件
    pub parent_event_text: Option<String>, // 父事件
    pub remarks_text: Option<String>,      // 备注
    pub port_type: Option<String>,         // 港口类型提示
    pub cost_center_field: Option<String>, // 成本中心（可含多个，`,`/`/`/`;` 分隔）

    // ===== 航次信息 =====
    pub vessel_name: Option<String>,
    pub voyage_number: Option<String>,
    pub event_date: Option<NaiveDateTime>, // 仅日期的值取当日 00:00

    // ===== 数值 =====
    pub effort_hours: Option<f64>, // 工时
    pub cost_amount: Option<f64>,  // 成本金额
    pub daily_rate: Option<f64>,   // 日费率
}

// ==========================================
// CostCenterEntry - 成本中心参考表行
// ==========================================
// 红线: 运行期间只读,不可在运行中修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCenterEntry {
    pub cost_center_id: String,
    pub department: Department,
    pub rig_reference: String, // 设施显示名
    pub facility_type: String,
}

// ==========================================
// Classification - 部门分类结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub department: Department,
    pub source: ClassificationSource, // 决定部门的信息来源
}

// ==========================================
// Allocation - 成本分摊
// ==========================================
// 红线: 同一 RawRecord 的 percentage 合计恒为 100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub cost_center_id: Option<String>, // None = 未找到成本中心，部门来自文本推断
    pub department: Department,
    pub percentage: f64,
    pub allocated_hours: f64, // effort_hours * percentage / 100
    pub mapped_location: String,
    pub is_reference_matched: bool,
}

// ==========================================
// VoyageKey - 航次分组键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoyageKey {
    pub vessel_name: String,
    pub voyage_number: String,
    pub year: i32,
    pub month: u32,
}

// ==========================================
// VoyageGroup - 航次分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageGroup {
    pub unique_voyage_id: String,
    pub standardized_voyage_id: String,
    pub key: VoyageKey,
    pub stop_list: Vec<String>, // 首次出现顺序,相邻重复已折叠
    pub stop_count: usize,
    pub total_duration_hours: f64,
    pub pattern: VoyagePattern,
    pub is_standard_pattern: bool,
    pub purpose: VoyagePurpose,
    pub member_record_ids: Vec<i64>, // 按事件时间升序
}

// ==========================================
// QualityScore - 数据质量评分
// ==========================================
// 红线: score ∈ [0, 100]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: u8,
    pub issues: Vec<String>, // 按检查顺序,不去重
}

impl Default for QualityScore {
    fn default() -> Self {
        Self {
            score: 100,
            issues: Vec::new(),
        }
    }
}

// ==========================================
// EnrichedRecord - 富化结果
// ==========================================
// 用途: 回写到来源行（UPDATE，不 INSERT）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    pub allocations: Vec<Allocation>, // 非空
    pub classification_source: ClassificationSource,
    pub unique_voyage_id: Option<String>,
    pub standardized_voyage_id: Option<String>,
    pub quality: QualityScore,
    pub is_duplicate: bool,
}

impl EnrichedRecord {
    /// 主分摊（首个分摊），存储层需要单一部门时使用
    pub fn primary_allocation(&self) -> Option<&Allocation> {
        self.allocations.first()
    }

    /// 主部门
    pub fn department(&self) -> Department {
        self.primary_allocation()
            .map(|a| a.department)
            .unwrap_or(Department::Operations)
    }

    /// 主分摊映射地点（空串视为缺失）
    pub fn mapped_location(&self) -> Option<&str> {
        self.primary_allocation()
            .map(|a| a.mapped_location.as_str())
            .filter(|loc| !loc.is_empty())
    }
}

// ==========================================
// EnrichmentBatch - 单批次落库单元
// ==========================================
// 红线: 一个批次 = 一个事务
#[derive(Debug, Clone)]
pub struct EnrichmentBatch {
    pub batch_no: usize,
    pub records: Vec<EnrichedRecord>,
    pub voyages: Vec<VoyageGroup>,
    pub enriched_at: DateTime<Utc>,
}

// ==========================================
// BatchOutcome - 批次结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchOutcome {
    Committed {
        batch_no: usize,
        records: usize,
    },
    RolledBack {
        batch_no: usize,
        records: usize,
        reason: String,
    },
}

impl BatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, BatchOutcome::Committed { .. })
    }
}

// ===== 汇总明细 =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    pub record_id: i64,
    pub score: u8,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch_no: usize,
    pub records: usize,
    pub reason: String,
}

// ==========================================
// EnrichmentSummary - 运行汇总
// ==========================================
// 用途: 交给调用方记录日志；运营只需处理 flagged_records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    pub run_id: String,
    pub forced: bool,
    pub total_scanned: usize,
    pub total_updated: usize,
    pub department_counts: BTreeMap<Department, usize>,
    pub needs_review_count: usize,
    pub duplicate_count: usize,
    pub voyage_count: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub failed_batches: Vec<FailedBatch>,
    pub flagged_records: Vec<FlaggedRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    pub config_snapshot: serde_json::Value, // 本次运行生效的管道配置
}
