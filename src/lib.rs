// ==========================================
// 海上物流报表 - 核心库
// ==========================================
// 范围: 记录富化与成本分摊管道
// 技术栈: Rust + SQLite
// 系统定位: 上传数据 → 可查询分析数据 的批处理环节
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 富化管道层 - 分类/分摊/航次/质量
pub mod enrichment;

// 配置层 - 管道参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ClassificationSource, Department, VoyagePattern, VoyagePurpose};

// 领域实体
pub use domain::{
    Allocation, BatchOutcome, CostCenterEntry, EnrichedRecord, EnrichmentSummary, QualityScore,
    RawRecord, VoyageGroup,
};

// 管道
pub use enrichment::{EnrichmentError, PipelineOrchestrator, ReferenceResolver};

// 仓储
pub use repository::{
    CostCenterSource, CsvCostCenterSource, SqliteCostCenterSource, VoyageRecordStore,
    VoyageRecordStoreImpl,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "海上物流报表 - 记录富化管道";
