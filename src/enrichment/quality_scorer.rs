// ==========================================
// 海上物流报表 - 数据质量评分器实现
// ==========================================
// 职责: 满分 100，按固定顺序逐项扣分
// 红线: 评分 ∈ [0, 100]；问题列表按检查顺序，不去重、不按严重度重排
// ==========================================

use crate::config::QualityRules;
use crate::domain::voyage::{EnrichedRecord, QualityScore};
use crate::enrichment::enrichment_trait::QualityScorer;
use chrono::Datelike;

// ===== 问题描述 =====
pub const ISSUE_MISSING_DATE: &str = "Missing event date";
pub const ISSUE_MISSING_VESSEL: &str = "Missing vessel name";
pub const ISSUE_MISSING_LOCATION: &str = "Missing location";
pub const ISSUE_EXCESSIVE_HOURS: &str = "Excessive hours";
pub const ISSUE_NEGATIVE_COST: &str = "Negative cost value";
pub const ISSUE_DAILY_RATE_OUT_OF_RANGE: &str = "Daily rate out of range";
pub const ISSUE_YEAR_OUT_OF_RANGE: &str = "Event year out of range";

// ===== 扣分 =====
const PENALTY_MISSING_DATE: u8 = 20;
const PENALTY_MISSING_VESSEL: u8 = 15;
const PENALTY_MISSING_LOCATION: u8 = 10;
const PENALTY_EXCESSIVE_HOURS: u8 = 5;
const PENALTY_NEGATIVE_COST: u8 = 10;
const PENALTY_DAILY_RATE: u8 = 5;
const PENALTY_YEAR_OUT_OF_RANGE: u8 = 10;

pub struct QualityScorerImpl {
    rules: QualityRules,
}

impl Default for QualityScorerImpl {
    fn default() -> Self {
        Self::new(QualityRules::default())
    }
}

impl QualityScorerImpl {
    pub fn new(rules: QualityRules) -> Self {
        Self { rules }
    }
}

/// 按顺序累计扣分，低于 0 时封底为 0
fn apply_penalties<'a>(checks: impl IntoIterator<Item = (bool, u8, &'a str)>) -> QualityScore {
    let mut score: u8 = 100;
    let mut issues = Vec::new();
    for (triggered, penalty, issue) in checks {
        if triggered {
            score = score.saturating_sub(penalty);
            issues.push(issue.to_string());
        }
    }
    QualityScore { score, issues }
}

impl QualityScorer for QualityScorerImpl {
    fn score(&self, record: &EnrichedRecord) -> QualityScore {
        let raw = &record.raw;
        let rules = &self.rules;

        let is_blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let checks: [(bool, u8, &str); 7] = [
            (raw.event_date.is_none(), PENALTY_MISSING_DATE, ISSUE_MISSING_DATE),
            (is_blank(&raw.vessel_name), PENALTY_MISSING_VESSEL, ISSUE_MISSING_VESSEL),
            (is_blank(&raw.location), PENALTY_MISSING_LOCATION, ISSUE_MISSING_LOCATION),
            (
                raw.effort_hours.map_or(false, |h| h > rules.max_effort_hours),
                PENALTY_EXCESSIVE_HOURS,
                ISSUE_EXCESSIVE_HOURS,
            ),
            (
                raw.cost_amount.map_or(false, |c| c < 0.0),
                PENALTY_NEGATIVE_COST,
                ISSUE_NEGATIVE_COST,
            ),
            (
                raw.daily_rate
                    .map_or(false, |r| r < rules.daily_rate_min || r > rules.daily_rate_max),
                PENALTY_DAILY_RATE,
                ISSUE_DAILY_RATE_OUT_OF_RANGE,
            ),
            (
                raw.event_date.map_or(false, |d| {
                    d.year() < rules.valid_year_min || d.year() > rules.valid_year_max
                }),
                PENALTY_YEAR_OUT_OF_RANGE,
                ISSUE_YEAR_OUT_OF_RANGE,
            ),
        ];

        apply_penalties(checks)
    }
}
