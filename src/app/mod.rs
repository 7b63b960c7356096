// ==========================================
// 课程排课与选课核心 - 应用层
// ==========================================
// 职责: 装配共享连接、配置与各 API 实例
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
