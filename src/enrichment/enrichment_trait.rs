// ==========================================
// 海上物流报表 - 富化管道组件 Trait
// ==========================================
// 职责: 定义富化管道各阶段接口（不包含实现）
// 流程: 清洗 → 分类 → 分摊 → 航次聚合 → 质量评分 → 重复检测
// ==========================================

use crate::domain::types::{ClassificationSource, Department};
use crate::domain::voyage::{
    Allocation, Classification, CostCenterEntry, EnrichedRecord, QualityScore, RawRecord,
    VoyageGroup, VoyageKey,
};
use crate::enrichment::reference_resolver::ReferenceResolver;

// ==========================================
// RecordCleaner Trait
// ==========================================
// 用途: 记录清洗接口（阶段 1）
// 实现者: RecordCleanerImpl
pub trait RecordCleaner: Send + Sync {
    /// 标准化文本字段（TRIM，空白 → None）
    fn normalize_text(&self, value: Option<String>) -> Option<String>;

    /// 清洗整条记录
    ///
    /// # 说明
    /// - 只做 TRIM / NULL 标准化，不改写业务含义
    fn clean_record(&self, record: RawRecord) -> RawRecord;
}

// ==========================================
// DepartmentClassifier Trait
// ==========================================
// 用途: 部门分类接口（阶段 2）
// 实现者: KeywordDepartmentClassifier
pub trait DepartmentClassifier: Send + Sync {
    /// 按关键字规则表扫描一段文本
    ///
    /// # 返回
    /// - Some(Department): 第一个命中的关键字组
    /// - None: 无命中
    fn classify_text(&self, text: &str) -> Option<Department>;

    /// 分类单条记录
    ///
    /// # 参数
    /// - record: 已清洗记录
    /// - entry: 已解析的成本中心参考行（若有）
    ///
    /// # 优先级（首个命中即返回）
    /// 1. 成本中心参考行部门
    /// 2. location 关键字
    /// 3. event_text / parent_event_text 关键字
    /// 4. port_type 提示
    /// 5. remarks_text 关键字
    /// 6. Operations
    fn classify(&self, record: &RawRecord, entry: Option<&CostCenterEntry>) -> Classification;
}

// ==========================================
// CostAllocationSplitter Trait
// ==========================================
// 用途: 成本分摊接口（阶段 3）
// 实现者: CostAllocationSplitterImpl
pub trait CostAllocationSplitter: Send + Sync {
    /// 拆分单条记录的成本中心字段
    ///
    /// # 返回
    /// - 非空分摊列表，percentage 合计 100
    /// - 主分摊（首个）对应的分类来源
    fn split(
        &self,
        record: &RawRecord,
        resolver: &ReferenceResolver,
        classifier: &dyn DepartmentClassifier,
    ) -> (Vec<Allocation>, ClassificationSource);
}

// ==========================================
// VoyageGrouper Trait
// ==========================================
// 用途: 航次聚合接口（阶段 4，跨记录）
// 实现者: VoyageGrouperImpl
pub trait VoyageGrouper: Send + Sync {
    /// 计算记录的航次分组键
    ///
    /// # 返回
    /// - None: 缺少船名 / 航次号 / 事件时间
    fn voyage_key(&self, record: &RawRecord) -> Option<VoyageKey>;

    /// 聚合一个批次内的全部航次
    ///
    /// # 说明
    /// - 调用方需保证同一船舶的记录全部在 records 中
    /// - 返回结果按 unique_voyage_id 升序
    fn group(&self, records: &[EnrichedRecord], resolver: &ReferenceResolver) -> Vec<VoyageGroup>;
}

// ==========================================
// QualityScorer Trait
// ==========================================
// 用途: 数据质量评分接口（阶段 5）
// 实现者: QualityScorerImpl
pub trait QualityScorer: Send + Sync {
    /// 计算质量评分（纯函数）
    fn score(&self, record: &EnrichedRecord) -> QualityScore;
}

// ==========================================
// DuplicateDetector Trait
// ==========================================
// 用途: 重复事件检测接口
// 实现者: DuplicateDetectorImpl
pub trait DuplicateDetector: Send + Sync {
    /// 检测同一运行内描述同一事件的记录
    ///
    /// # 返回
    /// - Vec<(重复记录 ID, 首次出现记录 ID)>: 不包括首次出现
    fn detect_duplicates(&self, records: &[RawRecord]) -> Vec<(i64, i64)>;
}
