// ==========================================
// 演示学期数据生成
// ==========================================
// 用法: seed_demo_term [db_path] [student_count]
// 规则: 目标库已存在时先备份再重建；学期日期相对今天生成，保证选课窗口开放
// ==========================================

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use std::error::Error;
use std::fs;
use std::path::Path;

use academic_scheduler::api::ApiError;
use academic_scheduler::app::{get_default_db_path, AppState};
use academic_scheduler::domain::{AssignmentKind, AttendanceStatus, CoursePrerequisite, ScoreUpdate};
use academic_scheduler::importer::CatalogKind;
use academic_scheduler::logging;

const TERM_ID: &str = "DEMO-TERM";
const DEFAULT_STUDENT_COUNT: usize = 40;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let student_count = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_STUDENT_COUNT)
        .max(1);

    backup_and_reset_db(&db_path)?;
    let state = AppState::new(db_path.clone())?;

    let today = Local::now().date_naive();
    let term_start = today - Duration::days(7);

    seed_catalog(&state, today)?;
    seed_schedule(&state, term_start)?;
    seed_enrollments(&state, student_count, term_start)?;

    print_quick_counts(&state)?;
    eprintln!("Seeded demo term into {}", db_path);
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_catalog(state: &AppState, today: NaiveDate) -> Result<(), Box<dyn Error>> {
    let rooms = "room_id,building,capacity,bookable\n\
                 R101,Main,40,1\n\
                 R102,Main,30,1\n\
                 LAB1,Science,24,1\n\
                 R999,Annex,60,0\n";
    let slots = "time_slot_id,day_of_week,start_time,end_time\n\
                 MON-0800,MON,08:00,09:30\n\
                 MON-0900,MON,09:00,10:30\n\
                 WED-1000,WED,10:00,11:30\n\
                 THU-1400,THU,14:00,16:00\n";
    let sections = "section_id,course_id,term_id,instructor_id,credit_hours,max_enrollment,waitlist_enabled,waitlist_capacity,prerequisites_enforced\n\
                    CS101-01,CS101,DEMO-TERM,T-LIN,3,30,1,5,0\n\
                    CS201-01,CS201,DEMO-TERM,T-LIN,4,20,1,5,1\n\
                    MA101-01,MA101,DEMO-TERM,T-WANG,3,25,1,10,0\n\
                    PH101-L1,PH101,DEMO-TERM,T-ZHAO,1,12,0,0,0\n";
    let calendar = format!(
        "term_id,add_drop_deadline,withdrawal_deadline,term_end_date\n{},{},{},{}\n",
        TERM_ID,
        today + Duration::days(14),
        today + Duration::days(60),
        today + Duration::days(100)
    );

    for (kind, text) in [
        (CatalogKind::Rooms, rooms.to_string()),
        (CatalogKind::TimeSlots, slots.to_string()),
        (CatalogKind::Sections, sections.to_string()),
        (CatalogKind::TermCalendar, calendar),
    ] {
        let report = state
            .catalog_importer
            .import_reader(kind, text.as_bytes(), "seed_demo_term")?;
        eprintln!("{}: imported={} rejected={}", kind, report.imported, report.rejected.len());
    }

    state.course_api.define_prerequisites(
        "CS201",
        &[CoursePrerequisite {
            course_id: "CS201".to_string(),
            prerequisite_course_id: "CS101".to_string(),
            min_total_score: 60.0,
        }],
    )?;
    Ok(())
}

fn seed_schedule(state: &AppState, term_start: NaiveDate) -> Result<(), Box<dyn Error>> {
    let api = &state.schedule_api;
    api.create_assignment("CS101-01", "MON-0800", "R101", term_start, None, AssignmentKind::Lecture)?;
    api.create_assignment("MA101-01", "WED-1000", "R101", term_start, None, AssignmentKind::Lecture)?;
    api.create_assignment("CS201-01", "WED-1000", "R102", term_start, None, AssignmentKind::Lecture)?;
    api.create_assignment("PH101-L1", "THU-1400", "LAB1", term_start, None, AssignmentKind::Lab)?;

    // 同一教室时段重叠，预期被拒绝
    match api.create_assignment("MA101-01", "MON-0900", "R101", term_start, None, AssignmentKind::Tutorial) {
        Err(ApiError::ScheduleConflict(conflict)) => eprintln!("expected conflict: {}", conflict),
        Err(e) => return Err(e.into()),
        Ok(id) => eprintln!("unexpected success: {}", id),
    }
    Ok(())
}

fn seed_enrollments(state: &AppState, student_count: usize, term_start: NaiveDate) -> Result<(), Box<dyn Error>> {
    let cs101_lecture = state
        .schedule_api
        .list_assignments_for_section("CS101-01")?
        .into_iter()
        .find(|a| a.is_active)
        .ok_or("CS101-01 没有有效排课")?;
    let first_monday = first_weekday_on_or_after(term_start, Weekday::Mon);

    for i in 0..student_count {
        let student_id = format!("STU{:04}", i + 1);
        for section_id in ["CS101-01", "MA101-01"] {
            let outcome = match state.enrollment_api.enroll(&student_id, section_id) {
                Ok(outcome) => outcome,
                // 名额和候补都已满
                Err(ApiError::CapacityExceeded { .. }) => continue,
                Err(e) => return Err(e.into()),
            };
            if section_id != "CS101-01" {
                continue;
            }
            if outcome.status != academic_scheduler::EnrollmentStatus::Enrolled {
                continue;
            }

            let status = match i % 5 {
                0 => AttendanceStatus::Absent,
                1 => AttendanceStatus::Late,
                _ => AttendanceStatus::Present,
            };
            state.attendance_api.record_attendance(
                &outcome.enrollment_id,
                &cs101_lecture.assignment_id,
                first_monday,
                status,
            )?;

            let base = 55.0 + (i % 45) as f64;
            state.grade_api.record_scores(
                &outcome.enrollment_id,
                &ScoreUpdate {
                    midterm: Some(base),
                    final_exam: Some((base + 3.0).min(100.0)),
                    assignment: Some((base + 5.0).min(100.0)),
                    ..Default::default()
                },
            )?;
        }
    }
    Ok(())
}

fn first_weekday_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let offset = (7 + weekday.num_days_from_monday() as i64 - date.weekday().num_days_from_monday() as i64) % 7;
    date + Duration::days(offset)
}

fn print_quick_counts(state: &AppState) -> Result<(), Box<dyn Error>> {
    for section_id in ["CS101-01", "CS201-01", "MA101-01", "PH101-L1"] {
        let occupancy = state.enrollment_api.section_occupancy(section_id)?;
        eprintln!("{}", serde_json::to_string(&occupancy)?);
    }
    let audits = state.section_repo.audit_all_counters()?;
    let mismatched = audits.iter().filter(|a| !a.is_consistent()).count();
    eprintln!("counter audit: sections={} mismatched={}", audits.len(), mismatched);
    Ok(())
}
