// ==========================================
// 课程排课与选课核心 - API 层
// ==========================================
// 职责: 对外操作契约；每个写操作一个 IMMEDIATE 事务，提交后发布事件
// ==========================================

pub mod attendance_api;
pub mod context;
pub mod course_api;
pub mod enrollment_api;
pub mod error;
pub mod grade_api;
pub mod schedule_api;

// 重导出核心类型
pub use attendance_api::{AttendanceApi, AttendanceOutcome};
pub use context::ApiContext;
pub use course_api::CourseApi;
pub use enrollment_api::{DropOutcome, EnrollOutcome, EnrollmentApi, TransitionOutcome};
pub use error::{ApiError, ApiResult};
pub use grade_api::{GradeApi, GradeRecordOutcome};
pub use schedule_api::ScheduleApi;
