// ==========================================
// 海上物流报表 - 记录清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 数值合法性
// ==========================================

use crate::domain::voyage::RawRecord;
use crate::enrichment::enrichment_trait::RecordCleaner;

pub struct RecordCleanerImpl;

impl RecordCleanerImpl {
    /// 非有限数值（NaN / 无穷）按缺失处理
    fn normalize_number(value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite())
    }

    /// 合并连续空白（船名/航次号用作分组键）
    fn collapse_whitespace(value: Option<String>) -> Option<String> {
        value.map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl RecordCleaner for RecordCleanerImpl {
    fn normalize_text(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn clean_record(&self, record: RawRecord) -> RawRecord {
        RawRecord {
            record_id: record.record_id,
            location: self.normalize_text(record.location),
            event_text: self.normalize_text(record.event_text),
            parent_event_text: self.normalize_text(record.parent_event_text),
            remarks_text: self.normalize_text(record.remarks_text),
            port_type: self.normalize_text(record.port_type),
            cost_center_field: self.normalize_text(record.cost_center_field),
            vessel_name: Self::collapse_whitespace(self.normalize_text(record.vessel_name)),
            voyage_number: Self::collapse_whitespace(self.normalize_text(record.voyage_number)),
            event_date: record.event_date,
            effort_hours: Self::normalize_number(record.effort_hours),
            cost_amount: Self::normalize_number(record.cost_amount),
            daily_rate: Self::normalize_number(record.daily_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let cleaner = RecordCleanerImpl;
        assert_eq!(cleaner.normalize_text(Some("  abc ".to_string())), Some("abc".to_string()));
        assert_eq!(cleaner.normalize_text(Some("   ".to_string())), None);
        assert_eq!(cleaner.normalize_text(None), None);
    }

    #[test]
    fn test_clean_record() {
        let cleaner = RecordCleanerImpl;
        let record = RawRecord {
            record_id: 7,
            location: Some("  Port Fourchon ".to_string()),
            cost_center_field: Some("".to_string()),
            vessel_name: Some(" HOS   ACHIEVER ".to_string()),
            voyage_number: Some(" 12 ".to_string()),
            effort_hours: Some(f64::NAN),
            daily_rate: Some(12000.0),
            ..Default::default()
        };

        let cleaned = cleaner.clean_record(record);

        assert_eq!(cleaned.record_id, 7);
        assert_eq!(cleaned.location.as_deref(), Some("Port Fourchon"));
        assert_eq!(cleaned.cost_center_field, None);
        assert_eq!(cleaned.vessel_name.as_deref(), Some("HOS ACHIEVER"));
        assert_eq!(cleaned.voyage_number.as_deref(), Some("12"));
        assert_eq!(cleaned.effort_hours, None);
        assert_eq!(cleaned.daily_rate, Some(12000.0));
    }
}
