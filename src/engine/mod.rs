// ==========================================
// 课程排课与选课核心 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 无副作用；读写由 API 在事务内完成
// ==========================================

pub mod attendance_tracker;
pub mod calendar;
pub mod clock;
pub mod conflict_checker;
pub mod enrollment_lifecycle;
pub mod events;
pub mod grade_calculator;
pub mod prerequisite_graph;

// 重导出核心引擎
pub use attendance_tracker::{attendance_percentage, AttendancePolicy, AttendanceTracker};
pub use calendar::{StaticTermCalendar, TermCalendarProvider};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict_checker::{
    ConflictCheckOptions, OverlayChange, OverlayRejection, ScheduleConflictChecker,
};
pub use enrollment_lifecycle::{
    EnrollmentLifecycle, LifecycleAction, SeatEffect, TransitionPlan, TransitionRejection,
};
pub use events::{
    AcademicEvent, AcademicEventPublisher, AcademicEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use grade_calculator::{letter_for, weighted_gpa, GradeCalculator, ScoreRangeViolation};
pub use prerequisite_graph::{missing_prerequisites, PrerequisiteGraph};
