// ==========================================
// 课程排课与选课核心 - 命令行入口
// ==========================================
// 命令: init / import / audit / recent-actions / config-show / config-set
// 数据库: ACADEMIC_SCHEDULER_DB_PATH 或用户数据目录
// ==========================================

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use academic_scheduler::app::{get_default_db_path, AppState};
use academic_scheduler::importer::CatalogKind;
use academic_scheduler::logging;

const USAGE: &str = "\
用法: academic-scheduler <命令> [参数]

命令:
  init                              初始化数据库结构
  import <rooms|time_slots|sections|term_calendar> <file.csv>
                                    导入学期准备数据
  audit                             核对全部班级的在读计数
  recent-actions [limit]            查看最近的操作日志
  config-show                       输出当前配置快照 (JSON)
  config-set <key> <value>          覆写全局配置项
";

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let db_path = get_default_db_path();
    tracing::info!("{} v{} 使用数据库: {}", academic_scheduler::APP_NAME, academic_scheduler::VERSION, db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match command {
        "init" => {
            println!("数据库已就绪: {}", state.db_path);
        }
        "import" => {
            let kind_arg = args.get(1).context("缺少导入类型")?;
            let file_arg = args.get(2).context("缺少导入文件")?;
            let kind = CatalogKind::parse(kind_arg).with_context(|| format!("未知导入类型: {}", kind_arg))?;
            let report = state
                .catalog_importer
                .import_file(kind, Path::new(file_arg))
                .with_context(|| format!("导入 {} 失败", file_arg))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "audit" => {
            let audits = state.section_repo.audit_all_counters()?;
            let mut mismatched = 0;
            for audit in &audits {
                if !audit.is_consistent() {
                    mismatched += 1;
                    println!("{}", serde_json::to_string(audit)?);
                }
            }
            println!("共核对 {} 个班级，{} 个计数不一致", audits.len(), mismatched);
            if mismatched > 0 {
                bail!("存在计数不一致的班级");
            }
        }
        "recent-actions" => {
            let limit = match args.get(1) {
                Some(raw) => raw.parse::<i32>().with_context(|| format!("limit 不是整数: {}", raw))?,
                None => 20,
            };
            for log in state.action_log_repo.find_recent(limit)? {
                println!("{}", serde_json::to_string(&log)?);
            }
        }
        "config-show" => {
            let snapshot = state
                .config_manager
                .get_config_snapshot()
                .map_err(|e| anyhow!("读取配置失败: {}", e))?;
            println!("{}", snapshot);
        }
        "config-set" => {
            let key = args.get(1).context("缺少配置键")?;
            let value = args.get(2).context("缺少配置值")?;
            state
                .config_manager
                .set_config_value(key, value)
                .map_err(|e| anyhow!("写入配置失败: {}", e))?;
            println!("{} = {}", key, value);
        }
        other => {
            eprintln!("未知命令: {}\n\n{}", other, USAGE);
            bail!("未知命令: {}", other);
        }
    }

    Ok(())
}
