// ==========================================
// 海上物流报表 - 管道运行参数
// ==========================================
// 职责: 一次运行所需的全部策略参数（运行开始时一次性读取）
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认批次大小
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// 默认“需复核”阈值（评分低于该值即标记）
pub const DEFAULT_NEEDS_REVIEW_THRESHOLD: u8 = 70;

/// 默认物流基地
pub const DEFAULT_LOGISTICS_BASE: &str = "Fourchon";

// ==========================================
// QualityRules - 质量评分阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRules {
    pub max_effort_hours: f64, // 超过即 "excessive hours"
    pub daily_rate_min: f64,   // 日费率合理区间下限（含）
    pub daily_rate_max: f64,   // 日费率合理区间上限（含）
    pub valid_year_min: i32,   // 事件年份下限（含）
    pub valid_year_max: i32,   // 事件年份上限（含）
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            max_effort_hours: 24.0,
            daily_rate_min: 500.0,
            daily_rate_max: 150_000.0,
            valid_year_min: 2000,
            valid_year_max: 2035,
        }
    }
}

// ==========================================
// PipelineConfig - 管道配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub needs_review_threshold: u8,
    pub quality_rules: QualityRules,
    pub logistics_bases: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            needs_review_threshold: DEFAULT_NEEDS_REVIEW_THRESHOLD,
            quality_rules: QualityRules::default(),
            logistics_bases: vec![DEFAULT_LOGISTICS_BASE.to_string()],
        }
    }
}
