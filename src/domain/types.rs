// ==========================================
// 海上物流报表 - 领域类型定义
// ==========================================
// 职责: 部门/航次模式/航次目的/分类来源等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 部门 (Department)
// ==========================================
// 红线: 固定集合,每条富化记录必有一个部门
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Department {
    Drilling,    // 钻井
    Production,  // 生产
    Logistics,   // 物流
    Completions, // 完井
    Maintenance, // 维修
    Personnel,   // 人员
    Operations,  // 运营（兜底）
}

impl Department {
    /// 全部部门（按声明顺序）
    pub const ALL: [Department; 7] = [
        Department::Drilling,
        Department::Production,
        Department::Logistics,
        Department::Completions,
        Department::Maintenance,
        Department::Personnel,
        Department::Operations,
    ];

    /// 从标签解析部门（大小写不敏感）
    ///
    /// # 返回
    /// - Some(Department): 可识别的标签
    /// - None: 不在固定集合内
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "drilling" => Some(Department::Drilling),
            "production" => Some(Department::Production),
            "logistics" => Some(Department::Logistics),
            "completions" | "completion" => Some(Department::Completions),
            "maintenance" => Some(Department::Maintenance),
            "personnel" => Some(Department::Personnel),
            "operations" => Some(Department::Operations),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Drilling => "Drilling",
            Department::Production => "Production",
            Department::Logistics => "Logistics",
            Department::Completions => "Completions",
            Department::Maintenance => "Maintenance",
            Department::Personnel => "Personnel",
            Department::Operations => "Operations",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分类来源 (Classification Source)
// ==========================================
// 顺序即置信度: 成本中心 > 地点 > 事件 > 港口类型 > 备注 > 默认
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationSource {
    CostCenter, // 成本中心参考表命中
    Location,   // 地点文本关键字
    EventText,  // 事件/父事件文本关键字
    PortType,   // 港口类型提示
    Remarks,    // 备注关键字
    Default,    // 兜底
}

impl fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationSource::CostCenter => write!(f, "COST_CENTER"),
            ClassificationSource::Location => write!(f, "LOCATION"),
            ClassificationSource::EventText => write!(f, "EVENT_TEXT"),
            ClassificationSource::PortType => write!(f, "PORT_TYPE"),
            ClassificationSource::Remarks => write!(f, "REMARKS"),
            ClassificationSource::Default => write!(f, "DEFAULT"),
        }
    }
}

// ==========================================
// 航次模式 (Voyage Pattern)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoyagePattern {
    Outbound,         // 基地 → 设施
    Return,           // 设施 → 基地
    RoundTrip,        // 首尾同站
    OffshoreTransfer, // 全程不经基地
    Unknown,          // 无站点
    Other,            // 其他
}

impl fmt::Display for VoyagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoyagePattern::Outbound => write!(f, "OUTBOUND"),
            VoyagePattern::Return => write!(f, "RETURN"),
            VoyagePattern::RoundTrip => write!(f, "ROUND_TRIP"),
            VoyagePattern::OffshoreTransfer => write!(f, "OFFSHORE_TRANSFER"),
            VoyagePattern::Unknown => write!(f, "UNKNOWN"),
            VoyagePattern::Other => write!(f, "OTHER"),
        }
    }
}

// ==========================================
// 航次目的 (Voyage Purpose)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoyagePurpose {
    Production, // 仅生产设施
    Drilling,   // 仅钻井设施
    Mixed,      // 生产 + 钻井
    Other,      // 其他
}

impl fmt::Display for VoyagePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoyagePurpose::Production => write!(f, "PRODUCTION"),
            VoyagePurpose::Drilling => write!(f, "DRILLING"),
            VoyagePurpose::Mixed => write!(f, "MIXED"),
            VoyagePurpose::Other => write!(f, "OTHER"),
        }
    }
}
