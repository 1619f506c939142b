// ==========================================
// 海上物流报表 - 航次记录 Repository Trait
// ==========================================
// 职责: 定义富化管道所需的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::domain::voyage::{EnrichmentBatch, EnrichmentSummary, RawRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// VoyageRecordStore Trait
// ==========================================
// 用途: 富化管道的存储适配器
// 实现者: VoyageRecordStoreImpl（使用 rusqlite）
#[async_trait]
pub trait VoyageRecordStore: Send + Sync {
    /// 读取待富化记录
    ///
    /// # 参数
    /// - force: true = 全量重跑；false = 仅未富化记录
    ///
    /// # 返回
    /// - Ok(Vec<RawRecord>): 按 record_id 升序
    ///
    /// # 说明
    /// - 非强制模式下，凡有未富化记录的船舶，其全部记录一并返回，
    ///   保证航次聚合基于完整航次重算
    async fn fetch_records(&self, force: bool) -> RepositoryResult<Vec<RawRecord>>;

    /// 批量回写富化结果（单事务）
    ///
    /// # 参数
    /// - batch: 一个批次的富化记录与航次聚合
    ///
    /// # 返回
    /// - Ok(usize): 更新的记录数
    /// - Err: 数据库错误（本批次整体回滚，已提交批次不受影响）
    ///
    /// # 说明
    /// - 更新来源行（UPDATE，不 INSERT）
    /// - 分摊明细按 record_id 整体替换，重跑不产生重复
    async fn update_many(&self, batch: &EnrichmentBatch) -> RepositoryResult<usize>;

    /// 写入运行日志
    async fn insert_run_log(&self, summary: &EnrichmentSummary) -> RepositoryResult<()>;
}
