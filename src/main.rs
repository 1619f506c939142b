// ==========================================
// 海上物流报表 - 富化管道命令行入口
// ==========================================
// 用法:
//   offshore-enrich [db_path] [--force] [--reference <csv>]
//
// - db_path: SQLite 数据库路径（缺省: 环境变量 OFFSHORE_ENRICH_DB_PATH 或用户数据目录）
// - --force: 全量重跑（默认仅处理未富化记录）
// - --reference: 从 CSV 文件加载成本中心参考表（默认读 cost_center_reference 表）
// ==========================================

use anyhow::{bail, Context};
use offshore_logistics_enrich::config::ConfigManager;
use offshore_logistics_enrich::db::{init_schema, open_sqlite_connection};
use offshore_logistics_enrich::repository::{
    CostCenterSource, CsvCostCenterSource, SqliteCostCenterSource, VoyageRecordStoreImpl,
};
use offshore_logistics_enrich::{logging, PipelineOrchestrator};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, PartialEq)]
struct CliArgs {
    db_path: String,
    force: bool,
    reference_csv: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut db_path: Option<String> = None;
    let mut force = false;
    let mut reference_csv = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            "--reference" | "-r" => {
                let path = args.next().context("--reference 需要指定 CSV 文件路径")?;
                reference_csv = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => bail!("未知参数: {}", other),
            other => db_path = Some(other.to_string()),
        }
    }

    Ok(CliArgs {
        db_path: db_path.unwrap_or_else(get_default_db_path),
        force,
        reference_csv,
    })
}

/// 默认数据库路径
fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("OFFSHORE_ENRICH_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./offshore_logistics.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("offshore-logistics");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("offshore_logistics.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;

    tracing::info!("==================================================");
    tracing::info!("{}", offshore_logistics_enrich::APP_NAME);
    tracing::info!("系统版本: {}", offshore_logistics_enrich::VERSION);
    tracing::info!("==================================================");
    tracing::info!(db_path = %args.db_path, force = args.force, "使用数据库");

    let conn = open_sqlite_connection(&args.db_path)
        .with_context(|| format!("打开数据库失败: {}", args.db_path))?;
    init_schema(&conn).context("初始化数据库表结构失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let reference_source: Box<dyn CostCenterSource> = match args.reference_csv {
        Some(path) => Box::new(CsvCostCenterSource::new(path)),
        None => Box::new(SqliteCostCenterSource::from_connection(conn.clone())),
    };

    let config_manager = ConfigManager::from_connection(conn.clone())
        .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?;
    match config_manager.get_config_snapshot() {
        Ok(overrides) => tracing::debug!(overrides = %overrides, "配置覆写项"),
        Err(e) => tracing::warn!(error = %e, "配置覆写项读取失败"),
    }

    let orchestrator = PipelineOrchestrator::with_defaults(
        VoyageRecordStoreImpl::from_connection(conn),
        config_manager,
        reference_source,
    );

    let summary = orchestrator.run(args.force).await.context("富化运行失败")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.batches_failed > 0 {
        tracing::warn!(batches_failed = summary.batches_failed, "存在失败批次，可重跑收敛");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_full() {
        let parsed = parse_args(args(&["data.db", "--force", "-r", "ref.csv"])).unwrap();
        assert_eq!(
            parsed,
            CliArgs {
                db_path: "data.db".to_string(),
                force: true,
                reference_csv: Some(PathBuf::from("ref.csv")),
            }
        );
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        let err = parse_args(args(&["--verbose"])).unwrap_err();
        assert_eq!(err.to_string(), "未知参数: --verbose");

        let err = parse_args(args(&["data.db", "--reference"])).unwrap_err();
        assert_eq!(err.to_string(), "--reference 需要指定 CSV 文件路径");
    }
}
