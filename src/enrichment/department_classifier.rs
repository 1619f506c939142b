// ==========================================
// 海上物流报表 - 部门分类器实现
// ==========================================
// 职责: 成本中心优先，关键字规则表兜底
// 红线: 优先级顺序固定，分类永不失败（兜底 Operations）
// ==========================================

use crate::domain::types::{ClassificationSource, Department};
use crate::domain::voyage::{Classification, CostCenterEntry, RawRecord};
use crate::enrichment::enrichment_trait::DepartmentClassifier;

// ==========================================
// 关键字规则表
// ==========================================
// 顺序即优先级: 同一文本命中多组时取第一组
// 匹配方式: 整词/整短语（大小写不敏感）
const DEPARTMENT_RULES: &[(Department, &[&str])] = &[
    (
        Department::Drilling,
        &[
            "drilling", "drill", "rig", "spud", "bop", "casing", "wellbore", "drillship",
            "jack up", "jackup", "semisub", "mud",
        ],
    ),
    (
        Department::Production,
        &[
            "production", "platform", "fpso", "tlp", "spar", "flowline", "processing",
            "produced water", "hub",
        ],
    ),
    (
        Department::Logistics,
        &[
            "logistics", "shorebase", "shore base", "fourchon", "dock", "port", "supply",
            "cargo", "backload", "transit", "warehouse", "mooring",
        ],
    ),
    (
        Department::Completions,
        &[
            "completion", "completions", "frac", "fracturing", "stimulation", "perforation",
            "gravel pack", "wireline", "coiled tubing",
        ],
    ),
    (
        Department::Maintenance,
        &[
            "maintenance", "repair", "inspection", "overhaul", "drydock", "shipyard",
        ],
    ),
    (
        Department::Personnel,
        &["personnel", "crew change", "crew", "passenger", "pob", "medevac"],
    ),
];

// ==========================================
// KeywordRule - 单条规则
// ==========================================
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub department: Department,
    pub keywords: Vec<String>, // 已小写
}

// ==========================================
// KeywordDepartmentClassifier
// ==========================================
pub struct KeywordDepartmentClassifier {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordDepartmentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordDepartmentClassifier {
    /// 使用默认规则表创建分类器
    pub fn new() -> Self {
        let rules = DEPARTMENT_RULES
            .iter()
            .map(|(department, keywords)| KeywordRule {
                department: *department,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { rules }
    }

    /// 使用自定义规则表创建分类器
    pub fn with_rules(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule {
                department: rule.department,
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// 文本归一化: 小写，非字母数字替换为空格，两端补空格
    fn normalize(text: &str) -> String {
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        format!(" {} ", words.join(" "))
    }

    fn contains_keyword(normalized: &str, keyword: &str) -> bool {
        normalized.contains(&format!(" {} ", keyword))
    }
}

impl DepartmentClassifier for KeywordDepartmentClassifier {
    fn classify_text(&self, text: &str) -> Option<Department> {
        if text.trim().is_empty() {
            return None;
        }
        let normalized = Self::normalize(text);
        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|keyword| Self::contains_keyword(&normalized, keyword))
            })
            .map(|rule| rule.department)
    }

    fn classify(&self, record: &RawRecord, entry: Option<&CostCenterEntry>) -> Classification {
        // 1. 成本中心参考行（权威来源）
        if let Some(entry) = entry {
            return Classification {
                department: entry.department,
                source: ClassificationSource::CostCenter,
            };
        }

        // 2-5. 文本来源（按置信度降序）
        let text_sources: [(ClassificationSource, [Option<&str>; 2]); 4] = [
            (ClassificationSource::Location, [record.location.as_deref(), None]),
            (
                ClassificationSource::EventText,
                [
                    record.event_text.as_deref(),
                    record.parent_event_text.as_deref(),
                ],
            ),
            (ClassificationSource::PortType, [record.port_type.as_deref(), None]),
            (ClassificationSource::Remarks, [record.remarks_text.as_deref(), None]),
        ];

        for (source, texts) in text_sources.iter() {
            for text in texts.iter().flatten() {
                if let Some(department) = self.classify_text(text) {
                    return Classification {
                        department,
                        source: *source,
                    };
                }
            }
        }

        // 6. 兜底
        Classification {
            department: Department::Operations,
            source: ClassificationSource::Default,
        }
    }
}
