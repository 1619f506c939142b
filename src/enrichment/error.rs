// ==========================================
// 海上物流报表 - 富化管道错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================
// 分级:
// - 未命中参考表 / 记录字段缺失: 不是错误（降级分摊 / 质量扣分）
// - 批次落库失败: BatchOutcome::RolledBack，运行继续
// - 参考表不可用: 致命，运行不启动
// ==========================================

use thiserror::Error;

/// 富化管道错误类型
#[derive(Error, Debug)]
pub enum EnrichmentError {
    // ===== 致命错误 =====
    #[error("成本中心参考表不可用 ({source_name}): {message}")]
    ReferenceTableUnavailable {
        source_name: String,
        message: String,
    },

    // ===== 配置错误 =====
    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ===== 数据访问错误 =====
    #[error("读取待富化记录失败: {0}")]
    RecordFetchError(String),
}

/// Result 类型别名
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_failing_source() {
        let err = EnrichmentError::ReferenceTableUnavailable {
            source_name: "csv:/tmp/ref.csv".to_string(),
            message: "参考表为空".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "成本中心参考表不可用 (csv:/tmp/ref.csv): 参考表为空"
        );

        let err = EnrichmentError::RecordFetchError("no such table".to_string());
        assert_eq!(err.to_string(), "读取待富化记录失败: no such table");
    }
}
