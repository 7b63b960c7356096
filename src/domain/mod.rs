// ==========================================
// 课程排课与选课核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod attendance;
pub mod calendar;
pub mod catalog;
pub mod course;
pub mod enrollment;
pub mod schedule;
pub mod section;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use attendance::{AttendanceRecord, AttendanceSummary, AttendanceTally};
pub use calendar::TermDeadlines;
pub use catalog::{Room, TimeSlot};
pub use course::{CoursePrerequisite, MissingPrerequisite};
pub use enrollment::{ComponentScores, Enrollment, GradeOutcome, ScoreUpdate};
pub use schedule::{
    BookedAssignment, DateRange, ScheduleAssignment, ScheduleChange, ScheduleChangeOutcome,
    ScheduleConflict,
};
pub use section::{EnrollmentCounterAudit, Section, SectionOccupancy};
pub use types::{
    AssignmentKind, AttendanceStanding, AttendanceStatus, ConflictDimension, DayOfWeek,
    EnrollmentStatus, LetterGrade,
};
