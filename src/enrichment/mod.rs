// ==========================================
// 海上物流报表 - 富化管道层
// ==========================================
// 职责: 原始航次记录 → 富化记录（部门/分摊/航次/质量）
// 流程: 清洗 → 分类 → 分摊 → 航次聚合 → 质量评分 → 落库
// ==========================================

pub mod cost_allocation;
pub mod department_classifier;
pub mod duplicate_detector;
pub mod enrichment_trait;
pub mod error;
pub mod pipeline_orchestrator;
pub mod quality_scorer;
pub mod record_cleaner;
pub mod reference_resolver;
pub mod voyage_grouper;

// 重导出核心组件
pub use cost_allocation::{
    compute_percentages, tokenize_cost_centers, CostAllocationSplitterImpl, CostCenterToken,
};
pub use department_classifier::{KeywordDepartmentClassifier, KeywordRule};
pub use duplicate_detector::DuplicateDetectorImpl;
pub use enrichment_trait::{
    CostAllocationSplitter, DepartmentClassifier, DuplicateDetector, QualityScorer,
    RecordCleaner, VoyageGrouper,
};
pub use error::{EnrichmentError, EnrichmentResult};
pub use pipeline_orchestrator::{partition_by_vessel, PipelineOrchestrator};
pub use quality_scorer::QualityScorerImpl;
pub use record_cleaner::RecordCleanerImpl;
pub use reference_resolver::ReferenceResolver;
pub use voyage_grouper::{standardized_voyage_id, unique_voyage_id, VoyageGrouperImpl};
