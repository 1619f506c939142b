// ==========================================
// 海上物流报表 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod types;
pub mod voyage;

// 重导出核心类型
pub use types::{ClassificationSource, Department, VoyagePattern, VoyagePurpose};
pub use voyage::{
    Allocation, BatchOutcome, Classification, CostCenterEntry, EnrichedRecord, EnrichmentBatch,
    EnrichmentSummary, FailedBatch, FlaggedRecord, QualityScore, RawRecord, VoyageGroup,
    VoyageKey, slug_identifier, vessel_key,
};
