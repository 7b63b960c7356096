// ==========================================
// 课程排课与选课核心 - 操作日志数据仓储
// ==========================================
// 对齐: v0.1_academic_core.sql action_log 表
// 红线: 写操作的日志与业务写入在同一事务内追加
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
