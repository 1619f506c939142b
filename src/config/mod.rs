// ==========================================
// 海上物流报表 - 配置层
// ==========================================
// 职责: 管道运行参数管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pipeline_config;
pub mod pipeline_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use pipeline_config::{PipelineConfig, QualityRules};
pub use pipeline_config_trait::{load_pipeline_config, PipelineConfigReader};
