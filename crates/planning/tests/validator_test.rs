#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};
    use fieldops_core::errors::ConflictKind;
    use fieldops_core::FieldOpsError;
    use fieldops_domain::repositories::{DispatchRepository, JobRepository};
    use fieldops_infrastructure::builders::{
        DispatchBuilder, LeaveBuilder, TechnicianBuilder, WorkingHoursBuilder,
    };
    use fieldops_infrastructure::{
        InMemoryDispatchRepository, InMemoryJobRepository, InMemoryTechnicianRepository,
    };
    use fieldops_planning::{AssignmentValidator, ValidateAssignmentRequest};
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    struct Fixture {
        job_id: Uuid,
        technician_id: Uuid,
        job_repo: Arc<InMemoryJobRepository>,
        technician_repo: Arc<InMemoryTechnicianRepository>,
        dispatch_repo: Arc<InMemoryDispatchRepository>,
        validator: AssignmentValidator,
    }

    async fn fixture(required_skills: Vec<&str>, technician_skills: Vec<&str>) -> Fixture {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let technician_repo = Arc::new(InMemoryTechnicianRepository::new());
        let dispatch_repo = Arc::new(InMemoryDispatchRepository::new());

        let job = fieldops_infrastructure::builders::JobBuilder::new()
            .with_required_skills(required_skills)
            .build();
        let job_id = job.id;
        job_repo.create(&job).await.unwrap();

        let technician = TechnicianBuilder::new()
            .with_skills(technician_skills)
            .build();
        let technician_id = technician.id;
        technician_repo.insert_technician(technician);
        for weekday in 0..5 {
            technician_repo.insert_working_hours(
                WorkingHoursBuilder::new(technician_id)
                    .weekday(weekday)
                    .window(t(9, 0), t(17, 0))
                    .build(),
            );
        }

        let validator = AssignmentValidator::new(
            job_repo.clone(),
            technician_repo.clone(),
            dispatch_repo.clone(),
        );
        Fixture {
            job_id,
            technician_id,
            job_repo,
            technician_repo,
            dispatch_repo,
            validator,
        }
    }

    fn request(f: &Fixture, start: NaiveTime, end: NaiveTime) -> ValidateAssignmentRequest {
        ValidateAssignmentRequest {
            job_id: f.job_id,
            technician_ids: vec![f.technician_id],
            date: monday(),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_free_window_passes() {
        let f = fixture(vec![], vec!["hvac"]).await;
        let check = f.validator.validate(&request(&f, t(10, 0), t(12, 0))).await.unwrap();

        assert!(check.is_valid);
        assert!(check.conflicts.is_empty());
        assert!(check.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_double_booking_detected() {
        let f = fixture(vec![], vec!["hvac"]).await;
        // 已有 10:00-12:00 的派工，请求 11:00-13:00
        let existing = DispatchBuilder::new(f.technician_id, monday())
            .with_window(t(10, 0), t(12, 0))
            .build();
        f.dispatch_repo.create(&existing).await.unwrap();

        let check = f.validator.validate(&request(&f, t(11, 0), t(13, 0))).await.unwrap();

        assert!(!check.is_valid);
        assert_eq!(check.conflicts.len(), 1);
        let conflict = &check.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::DoubleBooking);
        assert_eq!(conflict.technician_id, Some(f.technician_id));
        assert_eq!(conflict.source_id, Some(existing.id));
        assert!(!check.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_adjacent_window_is_not_conflict() {
        let f = fixture(vec![], vec!["hvac"]).await;
        f.dispatch_repo
            .create(
                &DispatchBuilder::new(f.technician_id, monday())
                    .with_window(t(10, 0), t(12, 0))
                    .build(),
            )
            .await
            .unwrap();

        let check = f.validator.validate(&request(&f, t(12, 0), t(14, 0))).await.unwrap();
        assert!(check.is_valid);
    }

    #[tokio::test]
    async fn test_leave_conflict_detected() {
        let f = fixture(vec![], vec!["hvac"]).await;
        let leave = LeaveBuilder::new(f.technician_id, monday(), monday())
            .time_bounded(t(11, 0), t(13, 0))
            .build();
        f.technician_repo.insert_leave(leave.clone());

        let check = f.validator.validate(&request(&f, t(12, 0), t(14, 0))).await.unwrap();

        assert!(!check.is_valid);
        assert_eq!(check.conflicts[0].kind, ConflictKind::LeaveConflict);
        assert_eq!(check.conflicts[0].source_id, Some(leave.id));
    }

    #[tokio::test]
    async fn test_skill_mismatch_is_warning_not_failure() {
        let f = fixture(vec!["plumbing", "hvac"], vec!["hvac"]).await;
        let check = f.validator.validate(&request(&f, t(10, 0), t(12, 0))).await.unwrap();

        // 缺技能只提示，不阻止分配
        assert!(check.is_valid);
        assert_eq!(check.warnings.len(), 1);
        assert_eq!(check.warnings[0].kind, ConflictKind::SkillMismatch);
        assert!(check.warnings[0].message.contains("plumbing"));
        assert!(!check.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_outside_working_hours_is_conflict() {
        let f = fixture(vec![], vec!["hvac"]).await;
        let check = f.validator.validate(&request(&f, t(16, 0), t(19, 0))).await.unwrap();

        assert!(!check.is_valid);
        assert_eq!(
            check.conflicts[0].kind,
            ConflictKind::TechnicianUnavailable
        );
    }

    #[tokio::test]
    async fn test_inactive_technician_is_conflict() {
        let f = fixture(vec![], vec![]).await;
        let inactive = TechnicianBuilder::new().inactive().build();
        let inactive_id = inactive.id;
        f.technician_repo.insert_technician(inactive);

        let check = f
            .validator
            .validate(&ValidateAssignmentRequest {
                job_id: f.job_id,
                technician_ids: vec![inactive_id],
                date: monday(),
                start: t(10, 0),
                end: t(12, 0),
            })
            .await
            .unwrap();

        assert!(!check.is_valid);
        assert_eq!(
            check.conflicts[0].kind,
            ConflictKind::TechnicianUnavailable
        );
    }

    #[tokio::test]
    async fn test_inverted_window_is_validation_error() {
        let f = fixture(vec![], vec![]).await;
        let result = f.validator.validate(&request(&f, t(12, 0), t(10, 0))).await;
        assert!(matches!(result, Err(FieldOpsError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_empty_technicians_is_validation_error() {
        let f = fixture(vec![], vec![]).await;
        let result = f
            .validator
            .validate(&ValidateAssignmentRequest {
                job_id: f.job_id,
                technician_ids: vec![],
                date: monday(),
                start: t(10, 0),
                end: t(12, 0),
            })
            .await;
        assert!(matches!(result, Err(FieldOpsError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let f = fixture(vec![], vec![]).await;
        let result = f
            .validator
            .validate(&ValidateAssignmentRequest {
                job_id: Uuid::new_v4(),
                technician_ids: vec![f.technician_id],
                date: monday(),
                start: t(10, 0),
                end: t(12, 0),
            })
            .await;
        assert!(matches!(result, Err(FieldOpsError::JobNotFound { .. })));
        // 校验器不写任何数据
        assert_eq!(f.job_repo.count(), 1);
    }
}
