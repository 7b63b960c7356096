// ==========================================
// 选课生命周期测试
// ==========================================
// 职责: 验证选课/候补/退课/中途退出/结课的状态机、座位计数与候补转正
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod enrollment_lifecycle_test {
    use academic_scheduler::api::ApiError;
    use academic_scheduler::config::config_keys;
    use academic_scheduler::domain::{
        ActionType, AssignmentKind, CoursePrerequisite, DayOfWeek, EnrollmentStatus, ScoreUpdate,
        Section,
    };
    use academic_scheduler::engine::{AcademicEventType, LifecycleAction};

    use crate::test_helpers::{d, setup_env, setup_env_with_config, t, TestEnv};

    fn env_with_section(max_enrollment: i32, waitlist_capacity: i32) -> TestEnv {
        let env = setup_env(d(2025, 1, 10));
        env.seed_standard_term();
        env.seed_section(
            Section::new("S1", "CS101", "2025S", max_enrollment).with_waitlist(waitlist_capacity > 0, waitlist_capacity),
        );
        env
    }

    fn assert_counter_consistent(env: &TestEnv) {
        for audit in env.state.section_repo.audit_all_counters().unwrap() {
            assert!(audit.is_consistent(), "计数不一致: {:?}", audit);
        }
    }

    #[test]
    fn test_enroll_then_waitlist_then_capacity_exceeded() {
        let env = env_with_section(1, 1);
        let api = &env.state.enrollment_api;

        assert_eq!(api.enroll("stu-1", "S1").unwrap().status, EnrollmentStatus::Enrolled);
        assert_eq!(api.enroll("stu-2", "S1").unwrap().status, EnrollmentStatus::Waitlisted);
        let err = api.enroll("stu-3", "S1").unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded { max_enrollment: 1, .. }));

        let occupancy = api.section_occupancy("S1").unwrap();
        assert_eq!(occupancy.current_enrollment, 1);
        assert_eq!(occupancy.waitlisted, 1);
        assert_eq!(occupancy.available, 0);
        assert_counter_consistent(&env);
    }

    #[test]
    fn test_waitlist_disabled_rejects_when_full() {
        let env = env_with_section(1, 0);
        let api = &env.state.enrollment_api;
        api.enroll("stu-1", "S1").unwrap();
        assert!(matches!(api.enroll("stu-2", "S1"), Err(ApiError::CapacityExceeded { .. })));
        assert_eq!(env.count_rows("SELECT COUNT(*) FROM enrollment"), 1);
    }

    #[test]
    fn test_duplicate_enrollment_rejected() {
        let env = env_with_section(5, 5);
        let api = &env.state.enrollment_api;
        api.enroll("stu-1", "S1").unwrap();
        let err = api.enroll("stu-1", "S1").unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEnrollment { ref student_id, .. } if student_id == "stu-1"));
        assert_eq!(api.section_occupancy("S1").unwrap().current_enrollment, 1);
    }

    #[test]
    fn test_drop_promotes_oldest_waitlisted() {
        let env = env_with_section(1, 3);
        let api = &env.state.enrollment_api;

        let seated = api.enroll("stu-1", "S1").unwrap();
        let first = api.enroll("stu-2", "S1").unwrap();
        env.clock.advance(chrono::Duration::minutes(5));
        let second = api.enroll("stu-3", "S1").unwrap();

        let outcome = api.drop_enrollment(&seated.enrollment_id).unwrap();
        assert_eq!(outcome.status, EnrollmentStatus::Dropped);
        assert_eq!(outcome.promoted_enrollment_id.as_deref(), Some(first.enrollment_id.as_str()));

        let dropped = api.get_enrollment(&seated.enrollment_id).unwrap();
        assert_eq!(dropped.drop_date, Some(d(2025, 1, 10)));
        assert_eq!(
            api.get_enrollment(&first.enrollment_id).unwrap().status,
            EnrollmentStatus::Enrolled
        );
        let waitlist = api.list_waitlist("S1").unwrap();
        assert_eq!(waitlist.len(), 1);
        assert_eq!(waitlist[0].enrollment_id, second.enrollment_id);

        assert_eq!(api.section_occupancy("S1").unwrap().current_enrollment, 1);
        assert_eq!(env.events.count_of(AcademicEventType::WaitlistPromoted), 1);
        assert_eq!(
            env.state.action_log_repo.count_by_type(ActionType::WaitlistPromote).unwrap(),
            1
        );
        assert_counter_consistent(&env);
    }

    #[test]
    fn test_drop_waitlisted_does_not_touch_counter() {
        let env = env_with_section(1, 3);
        let api = &env.state.enrollment_api;
        api.enroll("stu-1", "S1").unwrap();
        let waiting = api.enroll("stu-2", "S1").unwrap();

        let outcome = api.drop_enrollment(&waiting.enrollment_id).unwrap();
        assert_eq!(outcome.promoted_enrollment_id, None);
        // 离开的不是 ENROLLED，不记退课日期
        assert_eq!(api.get_enrollment(&waiting.enrollment_id).unwrap().drop_date, None);
        assert_eq!(api.section_occupancy("S1").unwrap().current_enrollment, 1);
        assert_counter_consistent(&env);
    }

    #[test]
    fn test_drop_rolls_back_when_counter_already_zero() {
        let env = env_with_section(2, 1);
        let api = &env.state.enrollment_api;
        let enrollment_id = api.enroll("stu-1", "S1").unwrap().enrollment_id;

        // 人为制造计数漂移
        env.conn
            .lock()
            .unwrap()
            .execute("UPDATE section SET current_enrollment = 0 WHERE section_id = 'S1'", [])
            .unwrap();

        let err = api.drop_enrollment(&enrollment_id).unwrap_err();
        assert!(matches!(err, ApiError::InternalError(_)), "实际: {:?}", err);

        let stored = api.get_enrollment(&enrollment_id).unwrap();
        assert_eq!(stored.status, EnrollmentStatus::Enrolled);
        assert_eq!(stored.drop_date, None);
        assert_eq!(env.state.action_log_repo.count_by_type(ActionType::Drop).unwrap(), 0);
        assert_eq!(env.events.count_of(AcademicEventType::EnrollmentChanged), 1);
    }

    #[test]
    fn test_withdraw_releases_seat_without_promotion() {
        let env = env_with_section(1, 3);
        let api = &env.state.enrollment_api;
        let seated = api.enroll("stu-1", "S1").unwrap();
        let waiting = api.enroll("stu-2", "S1").unwrap();

        // 加退选期内不能中途退出
        assert!(matches!(
            api.withdraw(&seated.enrollment_id),
            Err(ApiError::InvalidTransition { action: LifecycleAction::Withdraw, .. })
        ));

        env.clock.set_date(d(2025, 2, 15));
        // 加退选期后不能退课
        assert!(matches!(
            api.drop_enrollment(&seated.enrollment_id),
            Err(ApiError::InvalidTransition { action: LifecycleAction::Drop, .. })
        ));

        let outcome = api.withdraw(&seated.enrollment_id).unwrap();
        assert_eq!(outcome.status, EnrollmentStatus::Withdrawn);
        assert_eq!(api.get_enrollment(&seated.enrollment_id).unwrap().drop_date, Some(d(2025, 2, 15)));
        assert_eq!(
            api.get_enrollment(&waiting.enrollment_id).unwrap().status,
            EnrollmentStatus::Waitlisted
        );
        assert_eq!(api.section_occupancy("S1").unwrap().current_enrollment, 0);
        assert_counter_consistent(&env);

        env.clock.set_date(d(2025, 4, 1));
        let another = env.state.enrollment_api.get_enrollment(&waiting.enrollment_id).unwrap();
        assert_eq!(another.status, EnrollmentStatus::Waitlisted);
    }

    #[test]
    fn test_complete_requires_term_end_and_grade() {
        let env = env_with_section(2, 0);
        let api = &env.state.enrollment_api;
        let seated = api.enroll("stu-1", "S1").unwrap();

        env.clock.set_date(d(2025, 5, 20));
        assert!(matches!(api.complete(&seated.enrollment_id), Err(ApiError::InvalidTransition { .. })));

        env.state
            .grade_api
            .record_scores(
                &seated.enrollment_id,
                &ScoreUpdate {
                    midterm: Some(70.0),
                    final_exam: Some(80.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let outcome = api.complete(&seated.enrollment_id).unwrap();
        assert_eq!(outcome.status, EnrollmentStatus::Completed);

        let completed = api.get_enrollment(&seated.enrollment_id).unwrap();
        assert_eq!(completed.completion_date, Some(d(2025, 5, 20)));
        assert_eq!(completed.drop_date, None);
        // 结课不释放座位
        assert_eq!(api.section_occupancy("S1").unwrap().current_enrollment, 1);
        assert_counter_consistent(&env);

        // 终态不可再转换
        for result in [
            api.drop_enrollment(&seated.enrollment_id).map(|o| o.status),
            api.withdraw(&seated.enrollment_id).map(|o| o.status),
            api.complete(&seated.enrollment_id).map(|o| o.status),
        ] {
            assert!(matches!(result, Err(ApiError::InvalidTransition { from: EnrollmentStatus::Completed, .. })));
        }
    }

    #[test]
    fn test_registration_closed_after_add_drop_deadline() {
        let env = env_with_section(5, 0);
        env.clock.set_date(d(2025, 2, 1));
        let err = env.state.enrollment_api.enroll("stu-1", "S1").unwrap_err();
        assert!(matches!(err, ApiError::RegistrationClosed { ref add_drop_deadline, .. } if add_drop_deadline == "2025-01-31"));
    }

    #[test]
    fn test_cancelled_section_and_unknown_section() {
        let env = env_with_section(5, 0);
        env.conn
            .lock()
            .unwrap()
            .execute("UPDATE section SET is_cancelled = 1 WHERE section_id = 'S1'", [])
            .unwrap();
        assert!(matches!(
            env.state.enrollment_api.enroll("stu-1", "S1"),
            Err(ApiError::SectionCancelled(_))
        ));
        assert!(matches!(
            env.state.enrollment_api.enroll("stu-1", "NOPE"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_enroll_drop_cycles_keep_counter_consistent() {
        let env = env_with_section(3, 5);
        let api = &env.state.enrollment_api;
        let mut active = Vec::new();
        for i in 0..12 {
            if let Ok(outcome) = api.enroll(&format!("stu-{}", i), "S1") {
                active.push(outcome.enrollment_id);
            }
            if i % 3 == 2 {
                let id = active.remove(0);
                api.drop_enrollment(&id).unwrap();
            }
            assert_counter_consistent(&env);
            let occupancy = api.section_occupancy("S1").unwrap();
            assert!(occupancy.current_enrollment <= occupancy.max_enrollment);
        }
    }

    #[test]
    fn test_prerequisites_enforced_on_enroll() {
        let env = setup_env(d(2024, 12, 1));
        env.seed_term("2024F", d(2024, 12, 5), d(2024, 12, 10), d(2024, 12, 20));
        env.seed_standard_term();
        env.seed_section(Section::new("INTRO", "CS101", "2024F", 10));
        env.seed_section(Section::new("ADV", "CS201", "2025S", 10).with_prerequisites_enforced(true));
        env.state
            .course_api
            .define_prerequisites(
                "CS201",
                &[CoursePrerequisite {
                    course_id: "CS201".to_string(),
                    prerequisite_course_id: "CS101".to_string(),
                    min_total_score: 60.0,
                }],
            )
            .unwrap();

        let err = env.state.enrollment_api.enroll("stu-1", "ADV").unwrap_err();
        match err {
            ApiError::PrerequisitesNotMet { missing } => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].prerequisite_course_id, "CS101");
            }
            other => panic!("期望先修未满足，实际: {:?}", other),
        }

        // 完成 CS101 后满足先修
        let intro = env.state.enrollment_api.enroll("stu-1", "INTRO").unwrap();
        env.state
            .grade_api
            .record_scores(
                &intro.enrollment_id,
                &ScoreUpdate {
                    midterm: Some(80.0),
                    final_exam: Some(80.0),
                    ..Default::default()
                },
            )
            .unwrap();
        env.clock.set_date(d(2024, 12, 20));
        env.state.enrollment_api.complete(&intro.enrollment_id).unwrap();

        env.clock.set_date(d(2025, 1, 10));
        let adv = env.state.enrollment_api.enroll("stu-1", "ADV").unwrap();
        assert_eq!(adv.status, EnrollmentStatus::Enrolled);
    }

    #[test]
    fn test_student_timetable_clash_when_enforced() {
        let env = setup_env_with_config(d(2025, 1, 10), &[(config_keys::ENFORCE_STUDENT_TIMETABLE, "true")]);
        env.seed_standard_term();
        env.seed_room("R1", 40);
        env.seed_room("R2", 40);
        env.seed_slot("MON-0800", DayOfWeek::Monday, t(8, 0), t(9, 30));
        env.seed_section(Section::new("A", "CS101", "2025S", 30));
        env.seed_section(Section::new("B", "MA101", "2025S", 30));
        let schedule = &env.state.schedule_api;
        schedule
            .create_assignment("A", "MON-0800", "R1", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
        schedule
            .create_assignment("B", "MON-0800", "R2", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();

        env.state.enrollment_api.enroll("stu-1", "A").unwrap();
        assert!(matches!(
            env.state.enrollment_api.enroll("stu-1", "B"),
            Err(ApiError::BusinessRuleViolation(_))
        ));
        // 其他学生不受影响
        env.state.enrollment_api.enroll("stu-2", "B").unwrap();
    }

    #[test]
    fn test_enrollment_events_published_after_commit() {
        let env = env_with_section(1, 1);
        let api = &env.state.enrollment_api;
        api.enroll("stu-1", "S1").unwrap();
        api.enroll("stu-2", "S1").unwrap();
        let _ = api.enroll("stu-3", "S1");

        // 被拒绝的选课不发事件
        assert_eq!(env.events.count_of(AcademicEventType::EnrollmentChanged), 2);
        let students: Vec<Option<String>> = env.events.events().into_iter().map(|e| e.student_id).collect();
        assert_eq!(students, vec![Some("stu-1".to_string()), Some("stu-2".to_string())]);
    }
}
