// ==========================================
// 课程排课与选课核心 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 星期 (Day of Week)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }

    /// 从字符串解析（大小写不敏感，接受三字母缩写）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MONDAY" | "MON" => Some(DayOfWeek::Monday),
            "TUESDAY" | "TUE" => Some(DayOfWeek::Tuesday),
            "WEDNESDAY" | "WED" => Some(DayOfWeek::Wednesday),
            "THURSDAY" | "THU" => Some(DayOfWeek::Thursday),
            "FRIDAY" | "FRI" => Some(DayOfWeek::Friday),
            "SATURDAY" | "SAT" => Some(DayOfWeek::Saturday),
            "SUNDAY" | "SUN" => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 排课类型 (Assignment Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentKind {
    Lecture,  // 讲授
    Lab,      // 实验
    Tutorial, // 辅导
}

impl AssignmentKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentKind::Lecture => "LECTURE",
            AssignmentKind::Lab => "LAB",
            AssignmentKind::Tutorial => "TUTORIAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LECTURE" => Some(AssignmentKind::Lecture),
            "LAB" => Some(AssignmentKind::Lab),
            "TUTORIAL" => Some(AssignmentKind::Tutorial),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 选课状态 (Enrollment Status)
// ==========================================
// 终态: DROPPED / WITHDRAWN / COMPLETED（保留历史，不物理删除）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Enrolled,   // 已选上（含 APPLIED）
    Waitlisted, // 候补
    Dropped,    // 退课
    Withdrawn,  // 中途退出
    Completed,  // 已结课
}

impl EnrollmentStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Waitlisted => "WAITLISTED",
            EnrollmentStatus::Dropped => "DROPPED",
            EnrollmentStatus::Withdrawn => "WITHDRAWN",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENROLLED" | "APPLIED" => Some(EnrollmentStatus::Enrolled),
            "WAITLISTED" => Some(EnrollmentStatus::Waitlisted),
            "DROPPED" => Some(EnrollmentStatus::Dropped),
            "WITHDRAWN" => Some(EnrollmentStatus::Withdrawn),
            "COMPLETED" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    /// 是否占用座位（计入 current_enrollment）
    pub fn holds_seat(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled | EnrollmentStatus::Completed)
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Dropped | EnrollmentStatus::Withdrawn | EnrollmentStatus::Completed
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 考勤状态 (Attendance Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present, // 出勤
    Absent,  // 缺勤
    Late,    // 迟到
    Excused, // 请假
}

impl AttendanceStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRESENT" => Some(AttendanceStatus::Present),
            "ABSENT" => Some(AttendanceStatus::Absent),
            "LATE" => Some(AttendanceStatus::Late),
            "EXCUSED" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }

    /// 是否计为出勤（PRESENT / LATE）
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 考勤评级 (Attendance Standing)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStanding {
    Insufficient, // 课次不足，暂不评判
    Good,         // 正常
    Warning,      // 低于预警线
}

impl fmt::Display for AttendanceStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStanding::Insufficient => write!(f, "INSUFFICIENT"),
            AttendanceStanding::Good => write!(f, "GOOD"),
            AttendanceStanding::Warning => write!(f, "WARNING"),
        }
    }
}

// ==========================================
// 等级成绩 (Letter Grade)
// ==========================================
// 顺序: 自高到低
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
}

impl LetterGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim() {
            "A+" => Some(LetterGrade::APlus),
            "A" => Some(LetterGrade::A),
            "B+" => Some(LetterGrade::BPlus),
            "B" => Some(LetterGrade::B),
            "C+" => Some(LetterGrade::CPlus),
            "C" => Some(LetterGrade::C),
            "D+" => Some(LetterGrade::DPlus),
            "D" => Some(LetterGrade::D),
            "F" => Some(LetterGrade::F),
            _ => None,
        }
    }

    /// 绩点
    pub fn grade_points(&self) -> f64 {
        match self {
            LetterGrade::APlus => 4.0,
            LetterGrade::A => 3.7,
            LetterGrade::BPlus => 3.3,
            LetterGrade::B => 3.0,
            LetterGrade::CPlus => 2.7,
            LetterGrade::C => 2.3,
            LetterGrade::DPlus => 2.0,
            LetterGrade::D => 1.0,
            LetterGrade::F => 0.0,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 冲突维度 (Conflict Dimension)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictDimension {
    Room,       // 教室重复占用
    Instructor, // 教师重复排课
}

impl fmt::Display for ConflictDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDimension::Room => write!(f, "ROOM"),
            ConflictDimension::Instructor => write!(f, "INSTRUCTOR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_status_parsing() {
        assert_eq!(EnrollmentStatus::from_db_str("APPLIED"), Some(EnrollmentStatus::Enrolled));
        assert_eq!(EnrollmentStatus::from_db_str("waitlisted"), Some(EnrollmentStatus::Waitlisted));
        assert_eq!(EnrollmentStatus::from_db_str("FAILED"), None);
    }

    #[test]
    fn test_seat_holding_states() {
        assert!(EnrollmentStatus::Enrolled.holds_seat());
        assert!(EnrollmentStatus::Completed.holds_seat());
        assert!(!EnrollmentStatus::Waitlisted.holds_seat());
        assert!(!EnrollmentStatus::Withdrawn.holds_seat());
    }

    #[test]
    fn test_day_of_week_from_chrono() {
        // 2025-01-05 是周日
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(DayOfWeek::from(chrono::Datelike::weekday(&date)), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::from_db_str("sun"), Some(DayOfWeek::Sunday));
    }

    #[test]
    fn test_letter_grade_round_trip_text() {
        for grade in [LetterGrade::APlus, LetterGrade::DPlus, LetterGrade::F] {
            assert_eq!(LetterGrade::from_db_str(grade.as_str()), Some(grade));
        }
    }
}
