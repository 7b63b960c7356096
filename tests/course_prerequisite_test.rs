// ==========================================
// 课程先修测试
// ==========================================
// 职责: 验证先修规则定义、成环拒绝与清除
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod course_prerequisite_test {
    use academic_scheduler::api::ApiError;
    use academic_scheduler::domain::{ActionType, CoursePrerequisite};

    use crate::test_helpers::{d, setup_env};

    fn rule(course: &str, prerequisite: &str) -> CoursePrerequisite {
        CoursePrerequisite {
            course_id: course.to_string(),
            prerequisite_course_id: prerequisite.to_string(),
            min_total_score: 60.0,
        }
    }

    #[test]
    fn test_chain_defined_and_cycle_rejected() {
        let env = setup_env(d(2025, 1, 10));
        let api = &env.state.course_api;

        api.define_prerequisites("CS201", &[rule("CS201", "CS101")]).unwrap();
        api.define_prerequisites("CS301", &[rule("CS301", "CS201")]).unwrap();

        let err = api
            .define_prerequisites("CS101", &[rule("CS101", "CS301")])
            .unwrap_err();
        match err {
            ApiError::PrerequisiteCycle { cycle } => {
                for course in ["CS101", "CS201", "CS301"] {
                    assert!(cycle.iter().any(|c| c == course), "cycle={:?}", cycle);
                }
            }
            other => panic!("期望先修成环，实际: {:?}", other),
        }
        // 被拒绝的定义不落库
        assert!(api.list_prerequisites("CS101").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_rules_rejected_before_write() {
        let env = setup_env(d(2025, 1, 10));
        let api = &env.state.course_api;

        assert!(matches!(
            api.define_prerequisites("CS101", &[rule("CS101", "CS101")]),
            Err(ApiError::PrerequisiteCycle { .. })
        ));
        assert!(matches!(
            api.define_prerequisites("CS201", &[rule("CS999", "CS101")]),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.define_prerequisites("CS201", &[rule("CS201", "CS101"), rule("CS201", "CS101")]),
            Err(ApiError::InvalidInput(_))
        ));
        let mut too_high = rule("CS201", "CS101");
        too_high.min_total_score = 120.0;
        assert!(matches!(
            api.define_prerequisites("CS201", &[too_high]),
            Err(ApiError::InvalidGradeRange { .. })
        ));
        assert_eq!(env.count_rows("SELECT COUNT(*) FROM course_prerequisite"), 0);
    }

    #[test]
    fn test_redefine_replaces_and_empty_clears() {
        let env = setup_env(d(2025, 1, 10));
        let api = &env.state.course_api;

        api.define_prerequisites("CS301", &[rule("CS301", "CS101"), rule("CS301", "MA101")])
            .unwrap();
        assert_eq!(api.list_prerequisites("CS301").unwrap().len(), 2);

        api.define_prerequisites("CS301", &[rule("CS301", "CS201")]).unwrap();
        let rules = api.list_prerequisites("CS301").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].prerequisite_course_id, "CS201");

        api.define_prerequisites("CS301", &[]).unwrap();
        assert!(api.list_prerequisites("CS301").unwrap().is_empty());
        assert_eq!(
            env.state
                .action_log_repo
                .count_by_type(ActionType::RemovePrerequisite)
                .unwrap(),
            1
        );
    }
}
