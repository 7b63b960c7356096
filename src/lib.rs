// ==========================================
// 课程排课与选课核心 - 核心库
// ==========================================
// 范围: 排课冲突检查 / 选课生命周期 / 成绩计算 / 考勤统计
// 技术栈: Rust + SQLite
// 红线: 所有写操作在单个 IMMEDIATE 事务内完成，提交后才发布事件
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 学期准备数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentKind, AttendanceStanding, AttendanceStatus, ConflictDimension, DayOfWeek,
    EnrollmentStatus, LetterGrade,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AttendanceRecord, CoursePrerequisite, DateRange, Enrollment, Room,
    ScheduleAssignment, ScheduleChange, ScheduleConflict, Section, TermDeadlines, TimeSlot,
};

// 引擎
pub use engine::{
    AttendanceTracker, Clock, EnrollmentLifecycle, FixedClock, GradeCalculator,
    PrerequisiteGraph, ScheduleConflictChecker, SystemClock,
};

// API
pub use api::{ApiError, ApiResult, AttendanceApi, CourseApi, EnrollmentApi, GradeApi, ScheduleApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "课程排课与选课核心";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
