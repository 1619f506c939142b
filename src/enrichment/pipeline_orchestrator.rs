// ==========================================
// 海上物流报表 - 富化管道编排器
// ==========================================
// 职责: 整合富化流程，从待富化记录到批次落库
// 流程: 参考表 → 配置 → 读取 → 清洗 → 重复检测 → 按船分批
//       → (分类/分摊 → 航次聚合 → 质量评分 → 落库) × N 批
// ==========================================
// 红线: 参考表不可用时运行不启动
// 红线: 批次顺序执行，一个批次一个事务；失败批次回滚，不影响已提交批次
// ==========================================

use crate::config::{load_pipeline_config, PipelineConfigReader};
use crate::domain::voyage::{
    vessel_key, BatchOutcome, CostCenterEntry, EnrichedRecord, EnrichmentBatch,
    EnrichmentSummary, FailedBatch, FlaggedRecord, QualityScore, RawRecord,
};
use crate::enrichment::cost_allocation::CostAllocationSplitterImpl;
use crate::enrichment::department_classifier::KeywordDepartmentClassifier;
use crate::enrichment::duplicate_detector::DuplicateDetectorImpl;
use crate::enrichment::enrichment_trait::{
    CostAllocationSplitter, DepartmentClassifier, DuplicateDetector, QualityScorer,
    RecordCleaner, VoyageGrouper,
};
use crate::enrichment::error::{EnrichmentError, EnrichmentResult};
use crate::enrichment::quality_scorer::QualityScorerImpl;
use crate::enrichment::record_cleaner::RecordCleanerImpl;
use crate::enrichment::reference_resolver::ReferenceResolver;
use crate::enrichment::voyage_grouper::VoyageGrouperImpl;
use crate::repository::{CostCenterSource, VoyageRecordStore};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 船舶分批键（与航次 ID / 存储层增量扩展同一归一化）
fn vessel_partition_key(record: &RawRecord) -> Option<String> {
    record
        .vessel_name
        .as_deref()
        .map(vessel_key)
        .filter(|v| !v.is_empty())
}

/// 按船舶分批
///
/// # 规则
/// - 同一船舶的记录不拆批（航次聚合需要整船数据）
/// - 船舶按首次出现顺序整体装入批次，装不下则另起一批
/// - 单船记录数超过 batch_size 时独占一个批次
/// - 无船名记录按原顺序逐条填充
pub fn partition_by_vessel(records: Vec<RawRecord>, batch_size: usize) -> Vec<Vec<RawRecord>> {
    let batch_size = batch_size.max(1);

    let mut vessel_order: Vec<String> = Vec::new();
    let mut by_vessel: HashMap<String, Vec<RawRecord>> = HashMap::new();
    let mut without_vessel: Vec<RawRecord> = Vec::new();

    for record in records {
        match vessel_partition_key(&record) {
            Some(key) => {
                if !by_vessel.contains_key(&key) {
                    vessel_order.push(key.clone());
                }
                by_vessel.entry(key).or_default().push(record);
            }
            None => without_vessel.push(record),
        }
    }

    let mut batches: Vec<Vec<RawRecord>> = Vec::new();
    let mut current: Vec<RawRecord> = Vec::new();

    for key in vessel_order {
        let Some(group) = by_vessel.remove(&key) else {
            continue;
        };
        if !current.is_empty() && current.len() + group.len() > batch_size {
            batches.push(std::mem::take(&mut current));
        }
        current.extend(group);
    }

    for record in without_vessel {
        if current.len() >= batch_size {
            batches.push(std::mem::take(&mut current));
        }
        current.push(record);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

// ==========================================
// PipelineOrchestrator - 富化管道编排器
// ==========================================
pub struct PipelineOrchestrator<S, C>
where
    S: VoyageRecordStore,
    C: PipelineConfigReader,
{
    // 存储适配器
    store: S,

    // 配置读取器
    config: C,

    // 成本中心参考表数据源
    reference_source: Box<dyn CostCenterSource>,

    // 管道组件
    record_cleaner: Box<dyn RecordCleaner>,
    classifier: Box<dyn DepartmentClassifier>,
    splitter: Box<dyn CostAllocationSplitter>,
    voyage_grouper: Box<dyn VoyageGrouper>,
    duplicate_detector: Box<dyn DuplicateDetector>,
}

impl<S, C> PipelineOrchestrator<S, C>
where
    S: VoyageRecordStore,
    C: PipelineConfigReader,
{
    /// 创建编排器实例
    ///
    /// # 参数
    /// - store: 航次记录存储
    /// - config: 配置读取器
    /// - reference_source: 成本中心参考表数据源
    /// - record_cleaner / classifier / splitter / voyage_grouper / duplicate_detector: 管道组件
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: S,
        config: C,
        reference_source: Box<dyn CostCenterSource>,
        record_cleaner: Box<dyn RecordCleaner>,
        classifier: Box<dyn DepartmentClassifier>,
        splitter: Box<dyn CostAllocationSplitter>,
        voyage_grouper: Box<dyn VoyageGrouper>,
        duplicate_detector: Box<dyn DuplicateDetector>,
    ) -> Self {
        Self {
            store,
            config,
            reference_source,
            record_cleaner,
            classifier,
            splitter,
            voyage_grouper,
            duplicate_detector,
        }
    }

    /// 使用默认组件创建编排器实例
    pub fn with_defaults(store: S, config: C, reference_source: Box<dyn CostCenterSource>) -> Self {
        Self::new(
            store,
            config,
            reference_source,
            Box::new(RecordCleanerImpl),
            Box::new(KeywordDepartmentClassifier::new()),
            Box::new(CostAllocationSplitterImpl),
            Box::new(VoyageGrouperImpl),
            Box::new(DuplicateDetectorImpl),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 执行一次富化运行
    ///
    /// # 参数
    /// - force: true = 全量重跑；false = 仅未富化记录（及其所属船舶）
    ///
    /// # 返回
    /// - Ok(EnrichmentSummary): 运行汇总（含失败批次与需复核记录）
    /// - Err(ReferenceTableUnavailable): 参考表不可用，运行未启动
    /// - Err: 配置读取 / 记录读取失败
    ///
    /// # 说明
    /// - 批次落库失败不返回 Err，记入 summary.failed_batches
    /// - 运行日志写入失败只告警
    #[instrument(skip(self), fields(run_id))]
    pub async fn run(&self, force: bool) -> EnrichmentResult<EnrichmentSummary> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        info!(run_id = %run_id, force, "开始富化运行");

        // === 步骤 1: 加载参考表 ===
        let resolver_entries = self.load_reference_table()?;

        // === 步骤 2: 读取配置 ===
        let pipeline_config = load_pipeline_config(&self.config)
            .await
            .map_err(|e| EnrichmentError::ConfigReadError(e.to_string()))?;
        debug!(
            batch_size = pipeline_config.batch_size,
            needs_review_threshold = pipeline_config.needs_review_threshold,
            logistics_bases = ?pipeline_config.logistics_bases,
            "管道配置已加载"
        );

        let resolver =
            ReferenceResolver::new(resolver_entries, pipeline_config.logistics_bases.clone());
        debug!(
            reference_entries = resolver.len(),
            logistics_bases = ?resolver.logistics_bases(),
            "参考解析器已构建"
        );
        let scorer = QualityScorerImpl::new(pipeline_config.quality_rules.clone());
        let config_snapshot = serde_json::to_value(&pipeline_config).unwrap_or_else(|e| {
            warn!(error = %e, "管道配置快照序列化失败");
            serde_json::Value::Null
        });

        // === 步骤 3: 读取待富化记录 ===
        let raw_records = self.store.fetch_records(force).await.map_err(|e| {
            error!(error = %e, "读取待富化记录失败");
            EnrichmentError::RecordFetchError(e.to_string())
        })?;
        let total_scanned = raw_records.len();
        info!(total_scanned, "待富化记录读取完成");

        // === 步骤 4: 清洗 ===
        let records: Vec<RawRecord> = raw_records
            .into_iter()
            .map(|r| self.record_cleaner.clean_record(r))
            .collect();

        // === 步骤 5: 重复检测（全量，跨批次） ===
        let duplicates = self.duplicate_detector.detect_duplicates(&records);
        for (record_id, first_id) in &duplicates {
            debug!(record_id, first_record_id = first_id, "检测到重复事件");
        }
        let duplicate_ids: HashSet<i64> = duplicates.iter().map(|(id, _)| *id).collect();
        if !duplicate_ids.is_empty() {
            warn!(count = duplicate_ids.len(), "存在重复事件记录，已标记");
        }

        // === 步骤 6: 按船分批 ===
        let batches = partition_by_vessel(records, pipeline_config.batch_size);
        info!(batches = batches.len(), "分批完成");

        let mut summary = EnrichmentSummary {
            run_id: run_id.clone(),
            forced: force,
            total_scanned,
            started_at: Some(started_at),
            config_snapshot,
            ..Default::default()
        };

        // === 步骤 7: 逐批富化 + 落库 ===
        for (idx, batch_records) in batches.into_iter().enumerate() {
            let batch_no = idx + 1;
            let batch =
                self.enrich_batch(batch_no, batch_records, &resolver, &scorer, &duplicate_ids);
            let outcome = self.persist_batch(&batch).await;
            Self::accumulate(
                &mut summary,
                &batch,
                &outcome,
                pipeline_config.needs_review_threshold,
            );
        }

        summary.finished_at = Some(Utc::now());
        summary.elapsed_ms = start_time.elapsed().as_millis() as u64;

        // === 步骤 8: 运行日志（尽力而为） ===
        if let Err(e) = self.store.insert_run_log(&summary).await {
            warn!(run_id = %run_id, error = %e, "运行日志写入失败");
        }

        info!(
            run_id = %run_id,
            total_scanned = summary.total_scanned,
            total_updated = summary.total_updated,
            needs_review = summary.needs_review_count,
            duplicates = summary.duplicate_count,
            voyages = summary.voyage_count,
            batches_committed = summary.batches_committed,
            batches_failed = summary.batches_failed,
            elapsed_ms = summary.elapsed_ms,
            "富化运行完成"
        );

        Ok(summary)
    }

    /// 富化单个批次（纯内存，不落库）
    ///
    /// # 说明
    /// - records 需包含相关船舶的全部记录
    pub fn enrich_batch(
        &self,
        batch_no: usize,
        records: Vec<RawRecord>,
        resolver: &ReferenceResolver,
        scorer: &dyn QualityScorer,
        duplicate_ids: &HashSet<i64>,
    ) -> EnrichmentBatch {
        // 分类 + 分摊
        let mut enriched: Vec<EnrichedRecord> = records
            .into_iter()
            .map(|raw| {
                let (allocations, classification_source) =
                    self.splitter.split(&raw, resolver, self.classifier.as_ref());
                let is_duplicate = duplicate_ids.contains(&raw.record_id);
                EnrichedRecord {
                    raw,
                    allocations,
                    classification_source,
                    unique_voyage_id: None,
                    standardized_voyage_id: None,
                    quality: QualityScore::default(),
                    is_duplicate,
                }
            })
            .collect();

        // 航次聚合（跨记录）
        let voyages = self.voyage_grouper.group(&enriched, resolver);
        let mut linkage: HashMap<i64, (&str, &str)> = HashMap::new();
        for voyage in &voyages {
            for record_id in &voyage.member_record_ids {
                linkage.insert(
                    *record_id,
                    (
                        voyage.unique_voyage_id.as_str(),
                        voyage.standardized_voyage_id.as_str(),
                    ),
                );
            }
        }

        // 航次关联 + 质量评分
        for record in &mut enriched {
            if let Some((unique_id, standardized_id)) = linkage.get(&record.raw.record_id) {
                record.unique_voyage_id = Some(unique_id.to_string());
                record.standardized_voyage_id = Some(standardized_id.to_string());
            }
            record.quality = scorer.score(record);
        }

        debug!(
            batch_no,
            records = enriched.len(),
            voyages = voyages.len(),
            "批次富化完成"
        );

        EnrichmentBatch {
            batch_no,
            records: enriched,
            voyages,
            enriched_at: Utc::now(),
        }
    }

    /// 加载参考表（失败或为空均为致命错误）
    fn load_reference_table(&self) -> EnrichmentResult<Vec<CostCenterEntry>> {
        let source_name = self.reference_source.describe();
        let entries = self.reference_source.load_entries().map_err(|e| {
            error!(source = %source_name, error = %e, "成本中心参考表加载失败");
            EnrichmentError::ReferenceTableUnavailable {
                source_name: source_name.clone(),
                message: e.to_string(),
            }
        })?;

        if entries.is_empty() {
            error!(source = %source_name, "成本中心参考表为空");
            return Err(EnrichmentError::ReferenceTableUnavailable {
                source_name,
                message: "参考表为空".to_string(),
            });
        }

        info!(source = %source_name, entries = entries.len(), "成本中心参考表加载完成");
        Ok(entries)
    }

    /// 落库单个批次
    async fn persist_batch(&self, batch: &EnrichmentBatch) -> BatchOutcome {
        match self.store.update_many(batch).await {
            Ok(records) => {
                info!(batch_no = batch.batch_no, records, "批次已提交");
                BatchOutcome::Committed {
                    batch_no: batch.batch_no,
                    records,
                }
            }
            Err(e) => {
                error!(
                    batch_no = batch.batch_no,
                    records = batch.records.len(),
                    error = %e,
                    "批次落库失败，已回滚"
                );
                BatchOutcome::RolledBack {
                    batch_no: batch.batch_no,
                    records: batch.records.len(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// 汇总批次结果（仅统计已提交批次的记录）
    fn accumulate(
        summary: &mut EnrichmentSummary,
        batch: &EnrichmentBatch,
        outcome: &BatchOutcome,
        needs_review_threshold: u8,
    ) {
        match outcome {
            BatchOutcome::Committed { records, .. } => {
                summary.batches_committed += 1;
                summary.total_updated += records;
                summary.voyage_count += batch.voyages.len();

                for record in &batch.records {
                    *summary
                        .department_counts
                        .entry(record.department())
                        .or_insert(0) += 1;

                    if record.is_duplicate {
                        summary.duplicate_count += 1;
                    }

                    if record.quality.score < needs_review_threshold {
                        summary.needs_review_count += 1;
                        summary.flagged_records.push(FlaggedRecord {
                            record_id: record.raw.record_id,
                            score: record.quality.score,
                            issues: record.quality.issues.clone(),
                        });
                    }
                }
            }
            BatchOutcome::RolledBack {
                batch_no,
                records,
                reason,
            } => {
                summary.batches_failed += 1;
                summary.failed_batches.push(FailedBatch {
                    batch_no: *batch_no,
                    records: *records,
                    reason: reason.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, QualityRules};
    use crate::domain::types::{Department, VoyagePattern};
    use crate::repository::{RepositoryError, RepositoryResult};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::error::Error;
    use std::sync::Mutex;

    // ==========================================
    // 测试替身
    // ==========================================

    struct MockStore {
        records: Vec<RawRecord>,
        fail_vessel: Option<String>,
        fail_run_log: bool,
        committed: Mutex<Vec<EnrichmentBatch>>,
        runs: Mutex<Vec<EnrichmentSummary>>,
    }

    impl MockStore {
        fn new(records: Vec<RawRecord>) -> Self {
            Self {
                records,
                fail_vessel: None,
                fail_run_log: false,
                committed: Mutex::new(Vec::new()),
                runs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VoyageRecordStore for MockStore {
        async fn fetch_records(&self, _force: bool) -> RepositoryResult<Vec<RawRecord>> {
            Ok(self.records.clone())
        }

        async fn update_many(&self, batch: &EnrichmentBatch) -> RepositoryResult<usize> {
            if let Some(vessel) = &self.fail_vessel {
                if batch
                    .records
                    .iter()
                    .any(|r| r.raw.vessel_name.as_deref() == Some(vessel.as_str()))
                {
                    return Err(RepositoryError::DatabaseTransactionError(
                        "disk I/O error".to_string(),
                    ));
                }
            }
            self.committed.lock().unwrap().push(batch.clone());
            Ok(batch.records.len())
        }

        async fn insert_run_log(&self, summary: &EnrichmentSummary) -> RepositoryResult<()> {
            if self.fail_run_log {
                return Err(RepositoryError::DatabaseQueryError("no such table".to_string()));
            }
            self.runs.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    struct FixedConfig(PipelineConfig);

    #[async_trait]
    impl PipelineConfigReader for FixedConfig {
        async fn get_batch_size(&self) -> Result<usize, Box<dyn Error>> {
            Ok(self.0.batch_size)
        }
        async fn get_needs_review_threshold(&self) -> Result<u8, Box<dyn Error>> {
            Ok(self.0.needs_review_threshold)
        }
        async fn get_max_effort_hours(&self) -> Result<f64, Box<dyn Error>> {
            Ok(self.0.quality_rules.max_effort_hours)
        }
        async fn get_daily_rate_band(&self) -> Result<(f64, f64), Box<dyn Error>> {
            Ok((self.0.quality_rules.daily_rate_min, self.0.quality_rules.daily_rate_max))
        }
        async fn get_valid_year_range(&self) -> Result<(i32, i32), Box<dyn Error>> {
            Ok((self.0.quality_rules.valid_year_min, self.0.quality_rules.valid_year_max))
        }
        async fn get_logistics_bases(&self) -> Result<Vec<String>, Box<dyn Error>> {
            Ok(self.0.logistics_bases.clone())
        }
    }

    struct StaticReference(Vec<CostCenterEntry>);

    impl CostCenterSource for StaticReference {
        fn describe(&self) -> String {
            "static".to_string()
        }
        fn load_entries(&self) -> RepositoryResult<Vec<CostCenterEntry>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenReference;

    impl CostCenterSource for BrokenReference {
        fn describe(&self) -> String {
            "broken".to_string()
        }
        fn load_entries(&self) -> RepositoryResult<Vec<CostCenterEntry>> {
            Err(RepositoryError::SourceReadError {
                source_name: "broken".to_string(),
                message: "permission denied".to_string(),
            })
        }
    }

    // ==========================================
    // 测试数据
    // ==========================================

    fn reference() -> Vec<CostCenterEntry> {
        vec![
            CostCenterEntry {
                cost_center_id: "9999".to_string(),
                department: Department::Production,
                rig_reference: "Thunder Horse".to_string(),
                facility_type: "Production Platform".to_string(),
            },
            CostCenterEntry {
                cost_center_id: "10027".to_string(),
                department: Department::Logistics,
                rig_reference: "Fourchon-Logistics".to_string(),
                facility_type: "Shorebase".to_string(),
            },
        ]
    }

    fn event(
        record_id: i64,
        vessel: &str,
        voyage: &str,
        day: u32,
        location: &str,
        cost_center: &str,
    ) -> RawRecord {
        RawRecord {
            record_id,
            location: Some(location.to_string()),
            event_text: Some("Vessel call".to_string()),
            cost_center_field: Some(cost_center.to_string()),
            vessel_name: Some(vessel.to_string()),
            voyage_number: Some(voyage.to_string()),
            event_date: NaiveDate::from_ymd_opt(2024, 3, day)
                .and_then(|d| d.and_hms_opt(7, 0, 0)),
            effort_hours: Some(6.0),
            ..Default::default()
        }
    }

    fn config(batch_size: usize) -> FixedConfig {
        FixedConfig(PipelineConfig {
            batch_size,
            quality_rules: QualityRules::default(),
            ..PipelineConfig::default()
        })
    }

    fn orchestrator(
        store: MockStore,
        batch_size: usize,
    ) -> PipelineOrchestrator<MockStore, FixedConfig> {
        PipelineOrchestrator::with_defaults(
            store,
            config(batch_size),
            Box::new(StaticReference(reference())),
        )
    }

    // ==========================================
    // 分批
    // ==========================================

    #[test]
    fn test_partition_keeps_vessel_together() {
        let records = vec![
            event(1, "ALPHA", "1", 1, "Fourchon", ""),
            event(2, "BRAVO", "1", 1, "Fourchon", ""),
            event(3, "alpha ", "1", 2, "Thunder Horse", ""),
            event(4, "CHARLIE", "1", 1, "Fourchon", ""),
            event(5, "BRAVO", "1", 2, "Thunder Horse", ""),
        ];

        let batches = partition_by_vessel(records, 3);
        let ids: Vec<Vec<i64>> = batches
            .iter()
            .map(|b| b.iter().map(|r| r.record_id).collect())
            .collect();

        assert_eq!(ids, vec![vec![1, 3], vec![2, 5, 4]]);
    }

    #[test]
    fn test_partition_oversized_vessel_gets_own_batch() {
        let mut records: Vec<RawRecord> =
            (1..=5).map(|i| event(i, "ALPHA", "1", 1, "Fourchon", "")).collect();
        records.push(event(6, "BRAVO", "1", 1, "Fourchon", ""));
        let mut orphan = event(7, "", "1", 1, "Fourchon", "");
        orphan.vessel_name = None;
        records.push(orphan);

        let batches = partition_by_vessel(records, 2);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();

        assert_eq!(sizes, vec![5, 2]);
    }

    #[test]
    fn test_partition_zero_batch_size_treated_as_one() {
        let records = vec![
            event(1, "ALPHA", "1", 1, "Fourchon", ""),
            event(2, "BRAVO", "1", 1, "Fourchon", ""),
        ];
        assert_eq!(partition_by_vessel(records, 0).len(), 2);
        assert!(partition_by_vessel(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_partition_groups_punctuation_variants_of_vessel() {
        let records = vec![
            event(1, "HOS ACHIEVER", "12", 1, "Port Fourchon", ""),
            event(2, "BRAVO", "1", 1, "Fourchon", ""),
            event(3, "HOS-ACHIEVER", "12", 2, "Thunder Horse", ""),
            event(4, "hos achiever", "12", 3, "Fourchon", ""),
        ];

        let batches = partition_by_vessel(records, 2);
        let ids: Vec<Vec<i64>> = batches
            .iter()
            .map(|b| b.iter().map(|r| r.record_id).collect())
            .collect();

        assert_eq!(ids, vec![vec![1, 3, 4], vec![2]]);
    }

    // ==========================================
    // 运行
    // ==========================================

    #[tokio::test]
    async fn test_run_enriches_round_trip_voyage() {
        let store = MockStore::new(vec![
            event(1, "HOS ACHIEVER", "12", 1, "Port Fourchon", "10027"),
            event(2, "HOS ACHIEVER", "12", 2, "Thunder Horse", "9999"),
            event(3, "HOS ACHIEVER", "12", 3, "Fourchon", "10027"),
        ]);
        let orchestrator = orchestrator(store, 500);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.total_scanned, 3);
        assert_eq!(summary.total_updated, 3);
        assert_eq!(summary.batches_committed, 1);
        assert_eq!(summary.voyage_count, 1);
        assert_eq!(summary.needs_review_count, 0);
        assert_eq!(summary.department_counts.get(&Department::Logistics), Some(&2));
        assert_eq!(summary.department_counts.get(&Department::Production), Some(&1));

        let committed = orchestrator.store().committed.lock().unwrap();
        let voyage = &committed[0].voyages[0];
        assert_eq!(voyage.pattern, VoyagePattern::RoundTrip);
        assert!(voyage.is_standard_pattern);
        assert!(committed[0]
            .records
            .iter()
            .all(|r| r.unique_voyage_id.as_deref() == Some("HOS_ACHIEVER_12_2024_03")));
        assert_eq!(orchestrator.store().runs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_punctuation_variant_stays_in_one_voyage() {
        let store = MockStore::new(vec![
            event(1, "HOS ACHIEVER", "12", 1, "Port Fourchon", "10027"),
            event(2, "HOS-ACHIEVER", "12", 2, "Thunder Horse", "9999"),
            event(3, "HOS ACHIEVER", "12", 3, "Fourchon", "10027"),
        ]);
        let orchestrator = orchestrator(store, 2);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.batches_committed, 1);
        assert_eq!(summary.voyage_count, 1);

        let committed = orchestrator.store().committed.lock().unwrap();
        assert_eq!(committed.len(), 1);
        let voyage = &committed[0].voyages[0];
        assert_eq!(voyage.unique_voyage_id, "HOS_ACHIEVER_12_2024_03");
        assert_eq!(voyage.stop_list, vec!["Fourchon", "Thunder Horse", "Fourchon"]);
        assert_eq!(voyage.pattern, VoyagePattern::RoundTrip);
        assert_eq!(voyage.member_record_ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_run_summary_carries_effective_config() {
        let store = MockStore::new(vec![event(1, "HOS ACHIEVER", "12", 1, "Fourchon", "10027")]);
        let orchestrator = orchestrator(store, 7);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.config_snapshot["batch_size"], 7);
        assert_eq!(summary.config_snapshot["needs_review_threshold"], 70);
        let runs = orchestrator.store().runs.lock().unwrap();
        assert_eq!(runs[0].config_snapshot, summary.config_snapshot);
    }

    #[tokio::test]
    async fn test_run_keyword_fallback_scenario() {
        let mut record = event(1, "HOS ACHIEVER", "12", 1, "Thunder Horse Drilling Rig", "");
        record.event_date = None;
        record.event_text = None;
        let orchestrator = orchestrator(MockStore::new(vec![record]), 500);

        let summary = orchestrator.run(false).await.unwrap();

        let committed = orchestrator.store().committed.lock().unwrap();
        let enriched = &committed[0].records[0];
        assert_eq!(enriched.department(), Department::Drilling);
        assert_eq!(enriched.allocations.len(), 1);
        assert_eq!(enriched.allocations[0].percentage, 100.0);
        assert_eq!(enriched.quality.score, 80);
        assert_eq!(enriched.mapped_location(), Some("Thunder Horse Drilling Rig"));
        assert_eq!(enriched.unique_voyage_id, None);
        assert_eq!(summary.voyage_count, 0);
    }

    #[tokio::test]
    async fn test_run_reports_flagged_records() {
        let mut poor = event(2, "HOS ACHIEVER", "12", 1, "Fourchon", "");
        poor.event_date = None;
        poor.location = None;
        poor.cost_amount = Some(-10.0);
        let store = MockStore::new(vec![event(1, "HOS ACHIEVER", "12", 1, "Fourchon", ""), poor]);
        let orchestrator = orchestrator(store, 500);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.needs_review_count, 1);
        assert_eq!(summary.flagged_records.len(), 1);
        assert_eq!(summary.flagged_records[0].record_id, 2);
        assert_eq!(summary.flagged_records[0].score, 60);
        assert_eq!(summary.flagged_records[0].issues.len(), 3);
    }

    #[tokio::test]
    async fn test_run_isolates_failed_batch() {
        let mut store = MockStore::new(vec![
            event(1, "ALPHA", "1", 1, "Fourchon", ""),
            event(2, "BRAVO", "1", 1, "Fourchon", ""),
            event(3, "CHARLIE", "1", 1, "Fourchon", ""),
        ]);
        store.fail_vessel = Some("BRAVO".to_string());
        let orchestrator = orchestrator(store, 1);

        let summary = orchestrator.run(true).await.unwrap();

        assert_eq!(summary.batches_committed, 2);
        assert_eq!(summary.batches_failed, 1);
        assert_eq!(summary.total_updated, 2);
        assert_eq!(summary.failed_batches[0].batch_no, 2);
        assert!(summary.failed_batches[0].reason.contains("disk I/O error"));
        assert!(summary.forced);
    }

    #[tokio::test]
    async fn test_run_flags_duplicates() {
        let store = MockStore::new(vec![
            event(1, "ALPHA", "1", 1, "Fourchon", ""),
            event(2, "ALPHA", "1", 1, "Fourchon", ""),
        ]);
        let orchestrator = orchestrator(store, 500);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.duplicate_count, 1);
        assert_eq!(summary.total_updated, 2);
        let committed = orchestrator.store().committed.lock().unwrap();
        assert!(!committed[0].records[0].is_duplicate);
        assert!(committed[0].records[1].is_duplicate);
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let records = vec![
            event(1, "HOS ACHIEVER", "12", 1, "Port Fourchon", "10027"),
            event(2, "HOS ACHIEVER", "12", 2, "Thunder Horse", "9999, 10027, 5555"),
        ];
        let orchestrator = orchestrator(MockStore::new(records), 500);

        orchestrator.run(true).await.unwrap();
        orchestrator.run(true).await.unwrap();

        let committed = orchestrator.store().committed.lock().unwrap();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].records, committed[1].records);
        assert_eq!(committed[0].voyages, committed[1].voyages);
    }

    #[tokio::test]
    async fn test_run_refuses_without_reference_table() {
        let broken = PipelineOrchestrator::with_defaults(
            MockStore::new(vec![event(1, "ALPHA", "1", 1, "Fourchon", "")]),
            config(500),
            Box::new(BrokenReference),
        );
        let empty = PipelineOrchestrator::with_defaults(
            MockStore::new(vec![event(1, "ALPHA", "1", 1, "Fourchon", "")]),
            config(500),
            Box::new(StaticReference(Vec::new())),
        );

        assert!(matches!(
            broken.run(false).await,
            Err(EnrichmentError::ReferenceTableUnavailable { .. })
        ));
        assert!(matches!(
            empty.run(false).await,
            Err(EnrichmentError::ReferenceTableUnavailable { .. })
        ));
        assert!(broken.store().committed.lock().unwrap().is_empty());
        assert!(empty.store().runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_log_failure_is_not_fatal() {
        let mut store = MockStore::new(vec![event(1, "ALPHA", "1", 1, "Fourchon", "")]);
        store.fail_run_log = true;
        let orchestrator = orchestrator(store, 500);

        let summary = orchestrator.run(false).await.unwrap();

        assert_eq!(summary.total_updated, 1);
    }
}
