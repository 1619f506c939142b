// ==========================================
// 海上物流报表 - 参考解析器
// ==========================================
// 职责: 成本中心查找 / 地点名称标准化 / 物流基地判定
// 红线: 运行开始时显式构造，运行期间只读，无全局状态
// ==========================================

use crate::domain::types::Department;
use crate::domain::voyage::CostCenterEntry;
use std::collections::HashMap;

/// 已知地点别名（小写 → 标准名）
const LOCATION_ALIASES: &[(&str, &str)] = &[
    ("port fourchon", "Fourchon"),
    ("fourchon", "Fourchon"),
    ("fourchon base", "Fourchon"),
    ("port of fourchon", "Fourchon"),
    ("galliano", "Galliano"),
    ("port galliano", "Galliano"),
    ("venice", "Venice"),
    ("port of venice", "Venice"),
    ("houma", "Houma"),
];

pub struct ReferenceResolver {
    entries: HashMap<String, CostCenterEntry>,
    // 小写 ID → 原始 ID
    entries_ci: HashMap<String, String>,
    // 小写别名 → 标准地点名
    aliases: HashMap<String, String>,
    // 小写设施名 → 部门
    facility_departments: HashMap<String, Department>,
    logistics_bases: Vec<String>,
}

impl ReferenceResolver {
    /// 创建解析器
    ///
    /// # 参数
    /// - entries: 成本中心参考表
    /// - logistics_bases: 物流基地标准名列表
    ///
    /// # 说明
    /// - 参考表的 rig_reference 也作为地点别名（大小写归一到参考表写法）
    /// - 重复 ID 以后出现者为准
    pub fn new(entries: Vec<CostCenterEntry>, logistics_bases: Vec<String>) -> Self {
        let mut aliases: HashMap<String, String> = LOCATION_ALIASES
            .iter()
            .map(|(alias, name)| (alias.to_string(), name.to_string()))
            .collect();

        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_id_ci = HashMap::with_capacity(entries.len());
        let mut facility_departments = HashMap::new();

        for entry in entries {
            let id = entry.cost_center_id.trim().to_string();
            let rig = entry.rig_reference.trim();
            if !rig.is_empty() {
                let key = rig.to_lowercase();
                aliases.entry(key.clone()).or_insert_with(|| rig.to_string());
                facility_departments.insert(key, entry.department);
            }
            by_id_ci.insert(id.to_lowercase(), id.clone());
            by_id.insert(id, entry);
        }

        for base in &logistics_bases {
            let key = base.trim().to_lowercase();
            if !key.is_empty() {
                aliases.entry(key.clone()).or_insert_with(|| base.trim().to_string());
                facility_departments
                    .entry(key)
                    .or_insert(Department::Logistics);
            }
        }

        Self {
            entries: by_id,
            entries_ci: by_id_ci,
            aliases,
            facility_departments,
            logistics_bases,
        }
    }

    /// 按成本中心号查找参考行
    ///
    /// # 说明
    /// - 先精确匹配（TRIM 后），再大小写不敏感匹配
    pub fn lookup(&self, cost_center_id: &str) -> Option<&CostCenterEntry> {
        let id = cost_center_id.trim();
        if id.is_empty() {
            return None;
        }
        self.entries.get(id).or_else(|| {
            self.entries_ci
                .get(&id.to_lowercase())
                .and_then(|original| self.entries.get(original))
        })
    }

    /// 地点名称标准化
    ///
    /// # 规则
    /// - 小写 + TRIM 后精确匹配别名表
    /// - 无匹配: 返回 TRIM 后的原文（保留大小写）
    pub fn standardize_location(&self, raw_location: &str) -> String {
        let trimmed = raw_location.trim();
        match self.aliases.get(&trimmed.to_lowercase()) {
            Some(name) => name.clone(),
            None => trimmed.to_string(),
        }
    }

    /// 标准地点对应设施的部门
    pub fn facility_department(&self, location: &str) -> Option<Department> {
        self.facility_departments
            .get(&location.trim().to_lowercase())
            .copied()
    }

    /// 是否为物流基地
    pub fn is_logistics_base(&self, location: &str) -> bool {
        let standardized = self.standardize_location(location);
        self.logistics_bases
            .iter()
            .any(|base| base.trim().eq_ignore_ascii_case(&standardized))
    }

    pub fn logistics_bases(&self) -> &[String] {
        &self.logistics_bases
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
