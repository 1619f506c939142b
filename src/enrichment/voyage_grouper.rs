// ==========================================
// 海上物流报表 - 航次聚合器实现
// ==========================================
// 职责: 航次分组键 / 航次 ID / 站点序列 / 航次模式 / 航次目的
// 红线: unique_voyage_id 为 (船名, 航次号, 年, 月) 的纯函数
// 红线: 调用方需保证同一船舶的全部记录在同一批次
// ==========================================

use crate::domain::types::{Department, VoyagePattern, VoyagePurpose};
use crate::domain::voyage::{
    slug_identifier, EnrichedRecord, RawRecord, VoyageGroup, VoyageKey,
};
use crate::enrichment::cost_allocation::round2;
use crate::enrichment::enrichment_trait::VoyageGrouper;
use crate::enrichment::reference_resolver::ReferenceResolver;
use chrono::Datelike;
use std::collections::BTreeMap;

/// 航次唯一 ID: `{VESSEL}_{VOYAGE}_{YYYY}_{MM}`
pub fn unique_voyage_id(vessel_name: &str, voyage_number: &str, year: i32, month: u32) -> String {
    format!(
        "{}_{}_{:04}_{:02}",
        slug_identifier(vessel_name),
        slug_identifier(voyage_number),
        year,
        month
    )
}

/// 航次标准 ID: `{YYYY}{MM}-{VESSEL}-V{voyage}`
pub fn standardized_voyage_id(
    vessel_name: &str,
    voyage_number: &str,
    year: i32,
    month: u32,
) -> String {
    format!(
        "{:04}{:02}-{}-V{}",
        year,
        month,
        slug_identifier(vessel_name),
        slug_identifier(voyage_number)
    )
}

/// 航次模式判定
///
/// # 规则（按顺序）
/// - 无站点 → Unknown
/// - 站点数 > 2 且首尾相同 → RoundTrip
/// - 站点数 == 2 且首站为物流基地 → Outbound
/// - 站点数 == 2 且末站为物流基地 → Return
/// - 全程不经物流基地 → OffshoreTransfer
/// - 其他 → Other
pub fn classify_pattern(stops: &[String], resolver: &ReferenceResolver) -> VoyagePattern {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return VoyagePattern::Unknown;
    };
    let count = stops.len();

    if count > 2 && first.eq_ignore_ascii_case(last) {
        VoyagePattern::RoundTrip
    } else if count == 2 && resolver.is_logistics_base(first) {
        VoyagePattern::Outbound
    } else if count == 2 && resolver.is_logistics_base(last) {
        VoyagePattern::Return
    } else if !stops.iter().any(|s| resolver.is_logistics_base(s)) {
        VoyagePattern::OffshoreTransfer
    } else {
        VoyagePattern::Other
    }
}

/// 是否为标准航次形态（严格: 两站 Outbound/Return 或三站 RoundTrip）
pub fn is_standard_pattern(pattern: VoyagePattern, stop_count: usize) -> bool {
    match pattern {
        VoyagePattern::Outbound | VoyagePattern::Return => stop_count == 2,
        VoyagePattern::RoundTrip => stop_count == 3,
        _ => false,
    }
}

/// 航次目的判定
pub fn classify_purpose(departments: &[Department]) -> VoyagePurpose {
    let production = departments.contains(&Department::Production);
    let drilling = departments.contains(&Department::Drilling);
    match (production, drilling) {
        (true, true) => VoyagePurpose::Mixed,
        (true, false) => VoyagePurpose::Production,
        (false, true) => VoyagePurpose::Drilling,
        (false, false) => VoyagePurpose::Other,
    }
}

pub struct VoyageGrouperImpl;

impl VoyageGrouperImpl {
    /// 记录站点: 标准化原始地点，缺失时取主分摊映射地点
    fn stop_of(record: &EnrichedRecord, resolver: &ReferenceResolver) -> Option<String> {
        record
            .raw
            .location
            .as_deref()
            .map(|loc| resolver.standardize_location(loc))
            .filter(|loc| !loc.is_empty())
            .or_else(|| record.mapped_location().map(str::to_string))
    }

    fn build_group(
        key: VoyageKey,
        mut members: Vec<&EnrichedRecord>,
        resolver: &ReferenceResolver,
    ) -> VoyageGroup {
        members.sort_by(|a, b| {
            a.raw
                .event_date
                .cmp(&b.raw.event_date)
                .then(a.raw.record_id.cmp(&b.raw.record_id))
        });

        let mut stop_list: Vec<String> = Vec::new();
        let mut stop_departments: Vec<Department> = Vec::new();
        for member in &members {
            let Some(stop) = Self::stop_of(member, resolver) else {
                continue;
            };
            stop_departments.push(
                resolver
                    .facility_department(&stop)
                    .unwrap_or_else(|| member.department()),
            );
            // 相邻重复站点折叠
            let repeated = stop_list
                .last()
                .map(|prev| prev.eq_ignore_ascii_case(&stop))
                .unwrap_or(false);
            if !repeated {
                stop_list.push(stop);
            }
        }

        let total_hours: f64 = members
            .iter()
            .map(|m| m.raw.effort_hours.unwrap_or(0.0))
            .sum();

        let pattern = classify_pattern(&stop_list, resolver);
        let stop_count = stop_list.len();

        VoyageGroup {
            unique_voyage_id: unique_voyage_id(
                &key.vessel_name,
                &key.voyage_number,
                key.year,
                key.month,
            ),
            standardized_voyage_id: standardized_voyage_id(
                &key.vessel_name,
                &key.voyage_number,
                key.year,
                key.month,
            ),
            key,
            stop_count,
            total_duration_hours: round2(total_hours),
            is_standard_pattern: is_standard_pattern(pattern, stop_count),
            pattern,
            purpose: classify_purpose(&stop_departments),
            stop_list,
            member_record_ids: members.iter().map(|m| m.raw.record_id).collect(),
        }
    }
}

impl VoyageGrouper for VoyageGrouperImpl {
    fn voyage_key(&self, record: &RawRecord) -> Option<VoyageKey> {
        let vessel = record.vessel_name.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let voyage = record
            .voyage_number
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())?;
        let date = record.event_date?;

        Some(VoyageKey {
            vessel_name: vessel.to_uppercase(),
            voyage_number: voyage.to_string(),
            year: date.year(),
            month: date.month(),
        })
    }

    fn group(&self, records: &[EnrichedRecord], resolver: &ReferenceResolver) -> Vec<VoyageGroup> {
        let mut buckets: BTreeMap<String, (VoyageKey, Vec<&EnrichedRecord>)> = BTreeMap::new();

        for record in records {
            let Some(key) = self.voyage_key(&record.raw) else {
                continue;
            };
            let id = unique_voyage_id(&key.vessel_name, &key.voyage_number, key.year, key.month);
            buckets
                .entry(id)
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(record);
        }

        buckets
            .into_values()
            .map(|(key, members)| Self::build_group(key, members, resolver))
            .collect()
    }
}
