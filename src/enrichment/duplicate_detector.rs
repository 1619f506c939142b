// ==========================================
// 海上物流报表 - 重复事件检测器实现
// ==========================================
// 职责: 检测同一运行内描述同一事件的记录
// 判定键: 船名 + 航次号 + 事件时间 + 事件文本 + 地点（大小写不敏感）
// 说明: 重复记录仍富化落库，仅标记并计数
// ==========================================

use crate::domain::voyage::RawRecord;
use crate::enrichment::enrichment_trait::DuplicateDetector;
use chrono::NaiveDateTime;
use std::collections::HashMap;

type EventKey = (String, String, NaiveDateTime, String, String);

pub struct DuplicateDetectorImpl;

impl DuplicateDetectorImpl {
    fn normalize(value: Option<&str>) -> String {
        value
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default()
    }

    /// 事件键（缺船名或事件时间的记录无法判定，返回 None）
    fn event_key(record: &RawRecord) -> Option<EventKey> {
        let vessel = Self::normalize(record.vessel_name.as_deref());
        if vessel.is_empty() {
            return None;
        }
        let event_date = record.event_date?;

        Some((
            vessel,
            Self::normalize(record.voyage_number.as_deref()),
            event_date,
            Self::normalize(record.event_text.as_deref()),
            Self::normalize(record.location.as_deref()),
        ))
    }
}

impl DuplicateDetector for DuplicateDetectorImpl {
    fn detect_duplicates(&self, records: &[RawRecord]) -> Vec<(i64, i64)> {
        let mut first_occurrence: HashMap<EventKey, i64> = HashMap::new();
        let mut duplicates = Vec::new();

        for record in records {
            let Some(key) = Self::event_key(record) else {
                continue;
            };
            match first_occurrence.get(&key) {
                Some(first_id) => duplicates.push((record.record_id, *first_id)),
                None => {
                    first_occurrence.insert(key, record.record_id);
                }
            }
        }

        duplicates
    }
}
