// ==========================================
// 海上物流报表 - 管道配置读取 Trait
// ==========================================
// 职责: 定义富化管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::pipeline_config::{PipelineConfig, QualityRules};
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 用途: 富化管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    // ===== 批处理配置 =====

    /// 获取批次大小（每个事务的记录数上限）
    ///
    /// # 默认值
    /// - 500
    ///
    /// # 说明
    /// - 同一船舶的记录不拆批，单船记录超过该值时独占一个批次
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取“需复核”阈值
    ///
    /// # 默认值
    /// - 70（评分 < 70 计入 needs_review）
    async fn get_needs_review_threshold(&self) -> Result<u8, Box<dyn Error>>;

    // ===== 数据质量配置 =====

    /// 获取工时上限（超过即扣分）
    ///
    /// # 默认值
    /// - 24.0
    async fn get_max_effort_hours(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取日费率合理区间 (min, max)
    ///
    /// # 默认值
    /// - (500.0, 150000.0)
    async fn get_daily_rate_band(&self) -> Result<(f64, f64), Box<dyn Error>>;

    /// 获取事件年份有效区间 (min, max)
    ///
    /// # 默认值
    /// - (2000, 2035)
    async fn get_valid_year_range(&self) -> Result<(i32, i32), Box<dyn Error>>;

    // ===== 航次配置 =====

    /// 获取物流基地列表（标准化地点名）
    ///
    /// # 默认值
    /// - ["Fourchon"]
    async fn get_logistics_bases(&self) -> Result<Vec<String>, Box<dyn Error>>;
}

/// 读取完整的管道配置快照
///
/// # 说明
/// - 运行开始时调用一次，运行期间配置不变
pub async fn load_pipeline_config<C>(reader: &C) -> Result<PipelineConfig, Box<dyn Error>>
where
    C: PipelineConfigReader + ?Sized,
{
    let (daily_rate_min, daily_rate_max) = reader.get_daily_rate_band().await?;
    let (valid_year_min, valid_year_max) = reader.get_valid_year_range().await?;

    Ok(PipelineConfig {
        batch_size: reader.get_batch_size().await?,
        needs_review_threshold: reader.get_needs_review_threshold().await?,
        quality_rules: QualityRules {
            max_effort_hours: reader.get_max_effort_hours().await?,
            daily_rate_min,
            daily_rate_max,
            valid_year_min,
            valid_year_max,
        },
        logistics_bases: reader.get_logistics_bases().await?,
    })
}
