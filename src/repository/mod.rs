// ==========================================
// 海上物流报表 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod cost_center_repo;
pub mod error;
pub mod voyage_record_repo;
pub mod voyage_record_repo_impl;

// 重导出核心仓储
pub use cost_center_repo::{CostCenterSource, CsvCostCenterSource, SqliteCostCenterSource};
pub use error::{RepositoryError, RepositoryResult};
pub use voyage_record_repo::VoyageRecordStore;
pub use voyage_record_repo_impl::{parse_event_date, EnrichedRow, VoyageRecordStoreImpl};
