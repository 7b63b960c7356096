// ==========================================
// 成绩与考勤测试
// ==========================================
// 职责: 验证成绩录入/重算、GPA，考勤记录唯一性、出勤率与预警
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod grade_attendance_test {
    use academic_scheduler::api::ApiError;
    use academic_scheduler::config::config_keys;
    use academic_scheduler::domain::{
        AssignmentKind, AttendanceStanding, AttendanceStatus, DayOfWeek, LetterGrade, ScoreUpdate,
        Section,
    };
    use academic_scheduler::engine::AcademicEventType;

    use crate::test_helpers::{d, setup_env, setup_env_with_config, t, TestEnv};

    /// 周一 08:00 的 CS101，学生 stu-1 已选上
    fn enrolled_env(env: TestEnv) -> (TestEnv, String, String) {
        env.seed_standard_term();
        env.seed_room("R101", 40);
        env.seed_slot("MON-0800", DayOfWeek::Monday, t(8, 0), t(9, 30));
        env.seed_section(Section::new("S1", "CS101", "2025S", 30).with_credit_hours(4));
        let assignment_id = env
            .state
            .schedule_api
            .create_assignment("S1", "MON-0800", "R101", d(2025, 1, 6), Some(d(2025, 5, 12)), AssignmentKind::Lecture)
            .unwrap();
        let enrollment_id = env.state.enrollment_api.enroll("stu-1", "S1").unwrap().enrollment_id;
        (env, enrollment_id, assignment_id)
    }

    fn mondays(count: usize) -> Vec<chrono::NaiveDate> {
        (0..count)
            .map(|i| d(2025, 1, 6) + chrono::Duration::weeks(i as i64))
            .collect()
    }

    // ==========================================
    // 成绩
    // ==========================================

    #[test]
    fn test_full_scores_produce_a_grade() {
        let (env, enrollment_id, _) = enrolled_env(setup_env(d(2025, 1, 10)));
        let outcome = env
            .state
            .grade_api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    midterm: Some(80.0),
                    final_exam: Some(90.0),
                    assignment: Some(100.0),
                    participation: Some(100.0),
                },
            )
            .unwrap();

        assert_eq!(outcome.total_score, Some(89.0));
        assert_eq!(outcome.letter_grade, Some(LetterGrade::A));
        assert_eq!(outcome.grade_points, Some(3.7));
        assert_eq!(env.events.count_of(AcademicEventType::GradeRecorded), 1);

        let stored = env.state.enrollment_api.get_enrollment(&enrollment_id).unwrap();
        let grade = stored.grade.unwrap();
        assert_eq!(grade.total_score, 89.0);
        assert_eq!(grade.letter_grade, LetterGrade::A);
    }

    #[test]
    fn test_partial_updates_merge_and_recompute() {
        let (env, enrollment_id, _) = enrolled_env(setup_env(d(2025, 1, 10)));
        let api = &env.state.grade_api;

        let first = api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    midterm: Some(80.0),
                    ..Default::default()
                },
            )
            .unwrap();
        // 期末未录入，不产生总评
        assert_eq!(first.total_score, None);
        assert_eq!(env.events.count_of(AcademicEventType::GradeRecorded), 0);

        let second = api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    final_exam: Some(90.0),
                    ..Default::default()
                },
            )
            .unwrap();
        // 作业、平时按 0 计
        assert_eq!(second.total_score, Some(69.0));
        assert_eq!(second.letter_grade, Some(LetterGrade::C));

        let third = api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    assignment: Some(100.0),
                    participation: Some(100.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(third.total_score, Some(89.0));

        let stored = env.state.enrollment_api.get_enrollment(&enrollment_id).unwrap();
        assert_eq!(stored.scores.midterm, Some(80.0));
        assert_eq!(stored.scores.final_exam, Some(90.0));
    }

    #[test]
    fn test_out_of_range_score_writes_nothing() {
        let (env, enrollment_id, _) = enrolled_env(setup_env(d(2025, 1, 10)));
        let err = env
            .state
            .grade_api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    midterm: Some(70.0),
                    final_exam: Some(101.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        match err {
            ApiError::InvalidGradeRange { component, value } => {
                assert_eq!(component, "final");
                assert_eq!(value, 101.0);
            }
            other => panic!("期望成绩越界，实际: {:?}", other),
        }
        let stored = env.state.enrollment_api.get_enrollment(&enrollment_id).unwrap();
        assert_eq!(stored.scores.midterm, None);
    }

    #[test]
    fn test_scores_rejected_for_dropped_enrollment() {
        let (env, enrollment_id, _) = enrolled_env(setup_env(d(2025, 1, 10)));
        env.state.enrollment_api.drop_enrollment(&enrollment_id).unwrap();
        let err = env
            .state
            .grade_api
            .record_scores(
                &enrollment_id,
                &ScoreUpdate {
                    midterm: Some(70.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::EnrollmentNotActive { .. }));
    }

    #[test]
    fn test_student_gpa_weighted_by_credits() {
        let (env, first, _) = enrolled_env(setup_env(d(2025, 1, 10)));
        env.seed_section(Section::new("S2", "MA101", "2025S", 30).with_credit_hours(2));
        let second = env.state.enrollment_api.enroll("stu-1", "S2").unwrap().enrollment_id;
        let api = &env.state.grade_api;

        assert_eq!(api.student_gpa("stu-1").unwrap(), None);

        // 4 学分 A (3.7)，2 学分 C+ (2.7)
        api.record_scores(
            &first,
            &ScoreUpdate {
                midterm: Some(80.0),
                final_exam: Some(90.0),
                assignment: Some(100.0),
                participation: Some(100.0),
            },
        )
        .unwrap();
        api.record_scores(
            &second,
            &ScoreUpdate {
                midterm: Some(70.0),
                final_exam: Some(70.0),
                assignment: Some(70.0),
                participation: Some(70.0),
            },
        )
        .unwrap();

        let gpa = api.student_gpa("stu-1").unwrap().unwrap();
        let expected = (3.7 * 4.0 + LetterGrade::CPlus.grade_points() * 2.0) / 6.0;
        assert!((gpa - expected).abs() < 0.01, "gpa={} expected={}", gpa, expected);
    }

    // ==========================================
    // 考勤
    // ==========================================

    #[test]
    fn test_attendance_percentage_and_counters() {
        let (env, enrollment_id, assignment_id) = enrolled_env(setup_env(d(2025, 1, 10)));
        let api = &env.state.attendance_api;
        let statuses = [
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::Absent,
            AttendanceStatus::Excused,
        ];

        let mut last = None;
        for (date, status) in mondays(4).into_iter().zip(statuses) {
            last = Some(api.record_attendance(&enrollment_id, &assignment_id, date, status).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.total_classes, 4);
        assert_eq!(last.attended_classes, 2);
        assert_eq!(last.attendance_percentage, 50.0);
        // 课次不足 5 次，不评判
        assert_eq!(last.standing, AttendanceStanding::Insufficient);

        let enrollment = env.state.enrollment_api.get_enrollment(&enrollment_id).unwrap();
        assert_eq!(enrollment.total_classes, 4);
        assert_eq!(enrollment.attended_classes, 2);
        assert_eq!(api.list_attendance(&enrollment_id).unwrap().len(), 4);
        assert_eq!(api.attendance_summary(&enrollment_id).unwrap().attendance_percentage, 50.0);
    }

    #[test]
    fn test_duplicate_attendance_rejected() {
        let (env, enrollment_id, assignment_id) = enrolled_env(setup_env(d(2025, 1, 10)));
        let api = &env.state.attendance_api;
        api.record_attendance(&enrollment_id, &assignment_id, d(2025, 1, 6), AttendanceStatus::Present)
            .unwrap();

        let err = api
            .record_attendance(&enrollment_id, &assignment_id, d(2025, 1, 6), AttendanceStatus::Absent)
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAttendanceRecord { .. }));

        let enrollment = env.state.enrollment_api.get_enrollment(&enrollment_id).unwrap();
        assert_eq!(enrollment.total_classes, 1);
        assert_eq!(enrollment.attended_classes, 1);
    }

    #[test]
    fn test_attendance_session_date_must_match_assignment() {
        let (env, enrollment_id, assignment_id) = enrolled_env(setup_env(d(2025, 1, 10)));
        let api = &env.state.attendance_api;

        // 周二
        assert!(matches!(
            api.record_attendance(&enrollment_id, &assignment_id, d(2025, 1, 7), AttendanceStatus::Present),
            Err(ApiError::InvalidInput(_))
        ));
        // 有效区间之外的周一
        assert!(matches!(
            api.record_attendance(&enrollment_id, &assignment_id, d(2025, 5, 19), AttendanceStatus::Present),
            Err(ApiError::InvalidInput(_))
        ));
        assert_eq!(env.count_rows("SELECT COUNT(*) FROM attendance_record"), 0);
    }

    #[test]
    fn test_attendance_warning_event_fires_once() {
        let env = setup_env_with_config(
            d(2025, 1, 10),
            &[
                (config_keys::ATTENDANCE_WARNING_THRESHOLD_PCT, "80"),
                (config_keys::ATTENDANCE_WARNING_MIN_SESSIONS, "3"),
            ],
        );
        let (env, enrollment_id, assignment_id) = enrolled_env(env);
        let api = &env.state.attendance_api;

        let statuses = [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
        ];
        let mut standings = Vec::new();
        for (date, status) in mondays(4).into_iter().zip(statuses) {
            standings.push(
                api.record_attendance(&enrollment_id, &assignment_id, date, status)
                    .unwrap()
                    .standing,
            );
        }
        assert_eq!(
            standings,
            vec![
                AttendanceStanding::Insufficient,
                AttendanceStanding::Insufficient,
                AttendanceStanding::Warning,
                AttendanceStanding::Warning,
            ]
        );
        assert_eq!(env.events.count_of(AcademicEventType::AttendanceWarning), 1);
    }

    #[test]
    fn test_attendance_requires_enrolled_status() {
        let (env, enrollment_id, assignment_id) = enrolled_env(setup_env(d(2025, 1, 10)));
        env.state.enrollment_api.drop_enrollment(&enrollment_id).unwrap();
        assert!(matches!(
            env.state.attendance_api.record_attendance(
                &enrollment_id,
                &assignment_id,
                d(2025, 1, 6),
                AttendanceStatus::Present
            ),
            Err(ApiError::EnrollmentNotActive { .. })
        ));
    }
}
