// ==========================================
// 海上物流报表 - 成本分摊拆分器实现
// ==========================================
// 职责: 解析成本中心字段 → 按比例/均分生成分摊
// 红线: 每条记录至少一条分摊，percentage 合计恒为 100
// ==========================================
// 分隔符: `,` `/` `;` 同级，不区分优先级
// 比例写法: `9999:60` 或 `9999 (60%)`，全部 token 带正比例时才生效
// ==========================================

use crate::domain::types::ClassificationSource;
use crate::domain::voyage::{Allocation, RawRecord};
use crate::enrichment::enrichment_trait::{CostAllocationSplitter, DepartmentClassifier};
use crate::enrichment::reference_resolver::ReferenceResolver;
use once_cell::sync::Lazy;
use regex::Regex;

const SEPARATORS: &[char] = &[',', '/', ';'];

static RATIO_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<id>[^:()]+?)\s*(?::\s*(?P<colon>\d+(?:\.\d+)?)\s*%?|\(\s*(?P<paren>\d+(?:\.\d+)?)\s*%?\s*\))$",
    )
    .expect("比例 token 正则为字面量")
});

// ==========================================
// CostCenterToken - 成本中心 token
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CostCenterToken {
    pub id: String,
    pub ratio: Option<f64>, // 显式比例（未归一化）
}

/// 解析单个 token（`ID` / `ID:60` / `ID (60%)`）
fn parse_token(raw: &str) -> CostCenterToken {
    if let Some(caps) = RATIO_TOKEN.captures(raw) {
        let ratio = caps
            .name("colon")
            .or_else(|| caps.name("paren"))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(id) = caps.name("id") {
            return CostCenterToken {
                id: id.as_str().trim().to_string(),
                ratio,
            };
        }
    }
    CostCenterToken {
        id: raw.to_string(),
        ratio: None,
    }
}

/// 切分成本中心字段
///
/// # 规则
/// - 按 `,` `/` `;` 切分（同级），TRIM，丢弃空 token
/// - 重复 ID 不合并，每个 token 各占一份分摊
pub fn tokenize_cost_centers(field: Option<&str>) -> Vec<CostCenterToken> {
    let Some(field) = field else {
        return Vec::new();
    };

    field
        .split(SEPARATORS)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_token)
        .filter(|t| !t.id.is_empty())
        .collect()
}

/// 保留两位小数（四舍五入）
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 截断到两位小数
fn truncate2(value: f64) -> f64 {
    // 加微小偏移抵消二进制误差（如 0.29 * 100 = 28.999…）
    ((value * 100.0) + 1e-9).floor() / 100.0
}

/// 计算分摊比例
///
/// # 规则
/// - 全部 token 带正比例: 按比例缩放到 100
/// - 否则: 均分 100/N
/// - 非首项截断到两位小数，余数全部计入首项，合计恰为 100
pub fn compute_percentages(tokens: &[CostCenterToken]) -> Vec<f64> {
    let n = tokens.len();
    if n == 0 {
        return Vec::new();
    }

    let ratios: Option<Vec<f64>> = tokens
        .iter()
        .map(|t| t.ratio.filter(|r| *r > 0.0))
        .collect();

    let raw_shares: Vec<f64> = match ratios {
        Some(ratios) => {
            let total: f64 = ratios.iter().sum();
            ratios.iter().map(|r| r / total * 100.0).collect()
        }
        None => vec![100.0 / n as f64; n],
    };

    let mut shares: Vec<f64> = raw_shares.iter().map(|s| truncate2(*s)).collect();
    let tail: f64 = shares.iter().skip(1).sum();
    shares[0] = round2(100.0 - tail);
    shares
}

pub struct CostAllocationSplitterImpl;

impl CostAllocationSplitter for CostAllocationSplitterImpl {
    fn split(
        &self,
        record: &RawRecord,
        resolver: &ReferenceResolver,
        classifier: &dyn DepartmentClassifier,
    ) -> (Vec<Allocation>, ClassificationSource) {
        let standardized_location = record
            .location
            .as_deref()
            .map(|loc| resolver.standardize_location(loc))
            .unwrap_or_default();
        let effort_hours = record.effort_hours.unwrap_or(0.0);

        // 文本兜底分类（无参考行），未命中 token 共用
        let fallback = classifier.classify(record, None);

        let tokens = tokenize_cost_centers(record.cost_center_field.as_deref());
        if tokens.is_empty() {
            let allocation = Allocation {
                cost_center_id: None,
                department: fallback.department,
                percentage: 100.0,
                allocated_hours: round2(effort_hours),
                mapped_location: standardized_location,
                is_reference_matched: false,
            };
            return (vec![allocation], fallback.source);
        }

        let percentages = compute_percentages(&tokens);
        let allocations: Vec<Allocation> = tokens
            .iter()
            .zip(percentages)
            .map(|(token, percentage)| {
                let allocated_hours = round2(effort_hours * percentage / 100.0);
                match resolver.lookup(&token.id) {
                    Some(entry) => {
                        let department = classifier.classify(record, Some(entry)).department;
                        let mapped_location = if entry.rig_reference.is_empty() {
                            standardized_location.clone()
                        } else {
                            entry.rig_reference.clone()
                        };
                        Allocation {
                            cost_center_id: Some(entry.cost_center_id.clone()),
                            department,
                            percentage,
                            allocated_hours,
                            mapped_location,
                            is_reference_matched: true,
                        }
                    }
                    None => Allocation {
                        cost_center_id: Some(token.id.clone()),
                        department: fallback.department,
                        percentage,
                        allocated_hours,
                        mapped_location: standardized_location.clone(),
                        is_reference_matched: false,
                    },
                }
            })
            .collect();

        let source = if allocations[0].is_reference_matched {
            ClassificationSource::CostCenter
        } else {
            fallback.source
        };

        (allocations, source)
    }
}
