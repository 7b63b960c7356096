// ==========================================
// 课程排课与选课核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_tx` 关联函数接收调用方事务 (&Connection)，不自行加锁
// ==========================================

pub mod action_log_repo;
pub mod attendance_repo;
pub mod catalog_repo;
pub mod course_repo;
pub mod enrollment_repo;
pub mod error;
pub mod schedule_repo;
pub mod section_repo;
pub mod sql_codec;
pub mod term_calendar_repo;
pub mod tx;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use attendance_repo::AttendanceRepository;
pub use catalog_repo::{RoomRepository, TimeSlotRepository};
pub use course_repo::PrerequisiteRepository;
pub use enrollment_repo::{EnrollmentRepository, GradedCredit, StatusChange};
pub use error::{RepositoryError, RepositoryResult};
pub use schedule_repo::ScheduleAssignmentRepository;
pub use section_repo::SectionRepository;
pub use term_calendar_repo::TermCalendarRepository;
pub use tx::{with_write_tx, RetryPolicy, TransientError};
