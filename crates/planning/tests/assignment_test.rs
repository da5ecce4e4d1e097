#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};
    use fieldops_core::FieldOpsError;
    use fieldops_domain::entities::{DispatchStatus, JobStatus, Priority};
    use fieldops_domain::repositories::{DispatchRepository, JobRepository};
    use fieldops_domain::value_objects::ActorContext;
    use fieldops_infrastructure::builders::{
        DispatchBuilder, JobBuilder, TechnicianBuilder, WorkingHoursBuilder,
    };
    use fieldops_infrastructure::{
        InMemoryDispatchRepository, InMemoryJobRepository, InMemoryTechnicianRepository,
    };
    use fieldops_planning::{AssignJobCommand, AssignmentService};
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn actor() -> ActorContext {
        ActorContext::with_name(Uuid::new_v4(), "调度员")
    }

    struct Fixture {
        technician_id: Uuid,
        job_repo: Arc<InMemoryJobRepository>,
        technician_repo: Arc<InMemoryTechnicianRepository>,
        dispatch_repo: Arc<InMemoryDispatchRepository>,
        service: AssignmentService,
    }

    fn fixture() -> Fixture {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let technician_repo = Arc::new(InMemoryTechnicianRepository::new());
        let dispatch_repo = Arc::new(InMemoryDispatchRepository::new());

        let technician = TechnicianBuilder::new().with_skills(vec!["hvac"]).build();
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

        let service = AssignmentService::new(
            job_repo.clone(),
            technician_repo.clone(),
            dispatch_repo.clone(),
        );
        Fixture {
            technician_id,
            job_repo,
            technician_repo,
            dispatch_repo,
            service,
        }
    }

    fn command(f: &Fixture, job_id: Uuid, start: NaiveTime, end: NaiveTime) -> AssignJobCommand {
        AssignJobCommand {
            job_id,
            technician_ids: vec![f.technician_id],
            date: monday(),
            start,
            end,
            priority: None,
            notes: None,
            auto_create_dispatch: true,
        }
    }

    #[tokio::test]
    async fn test_assign_creates_dispatch_and_schedules_job() {
        let f = fixture();
        let job = JobBuilder::new().build();
        f.job_repo.create(&job).await.unwrap();

        let result = f
            .service
            .assign_job(&command(&f, job.id, t(10, 0), t(12, 0)), &actor())
            .await
            .unwrap();

        assert_eq!(result.job_id, job.id);
        let dispatch_id = result.dispatch_id.expect("应当自动生成派工单");

        let updated_job = f.job_repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(updated_job.status, JobStatus::Scheduled);
        assert_eq!(updated_job.assigned_technicians, vec![f.technician_id]);

        let dispatch = f
            .dispatch_repo
            .get_by_id(dispatch_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dispatch.status, DispatchStatus::Pending);
        assert_eq!(dispatch.job_id, job.id);
        assert_eq!(dispatch.scheduled_date, monday());
    }

    #[tokio::test]
    async fn test_assign_without_auto_dispatch() {
        let f = fixture();
        let job = JobBuilder::new().build();
        f.job_repo.create(&job).await.unwrap();

        let mut cmd = command(&f, job.id, t(10, 0), t(12, 0));
        cmd.auto_create_dispatch = false;
        let result = f.service.assign_job(&cmd, &actor()).await.unwrap();

        assert!(result.dispatch_id.is_none());
        assert_eq!(f.dispatch_repo.stored_count(), 0);
        let updated_job = f.job_repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(updated_job.status, JobStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_second_overlapping_assignment_rejected() {
        let f = fixture();
        let first = JobBuilder::new().build();
        let second = JobBuilder::new().build();
        f.job_repo.create(&first).await.unwrap();
        f.job_repo.create(&second).await.unwrap();

        f.service
            .assign_job(&command(&f, first.id, t(10, 0), t(12, 0)), &actor())
            .await
            .unwrap();

        let result = f
            .service
            .assign_job(&command(&f, second.id, t(11, 0), t(13, 0)), &actor())
            .await;

        match result {
            Err(FieldOpsError::AssignmentRejected { conflicts }) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(
                    conflicts[0].kind,
                    fieldops_core::errors::ConflictKind::DoubleBooking
                );
            }
            other => panic!("expected AssignmentRejected, got {other:?}"),
        }

        // 第二个工单保持未排班
        let untouched = f.job_repo.get_by_id(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Unscheduled);
        assert_eq!(f.dispatch_repo.stored_count(), 1);
    }

    #[tokio::test]
    async fn test_priority_override_applied() {
        let f = fixture();
        let job = JobBuilder::new().with_priority(Priority::Normal).build();
        f.job_repo.create(&job).await.unwrap();

        let mut cmd = command(&f, job.id, t(10, 0), t(12, 0));
        cmd.priority = Some(Priority::Urgent);
        let result = f.service.assign_job(&cmd, &actor()).await.unwrap();

        let updated = f.job_repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(updated.priority, Priority::Urgent);
        let dispatch = f
            .dispatch_repo
            .get_by_id(result.dispatch_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dispatch.priority, Priority::Urgent);
    }

    #[tokio::test]
    async fn test_batch_assign_isolates_failures() {
        let f = fixture();
        let good1 = JobBuilder::new().build();
        let good2 = JobBuilder::new().build();
        f.job_repo.create(&good1).await.unwrap();
        f.job_repo.create(&good2).await.unwrap();
        let missing_id = Uuid::new_v4();

        let commands = vec![
            command(&f, good1.id, t(9, 0), t(10, 0)),
            // 不存在的工单：单项失败
            command(&f, missing_id, t(10, 0), t(11, 0)),
            command(&f, good2.id, t(11, 0), t(12, 0)),
        ];
        let result = f.service.batch_assign(&commands, &actor()).await;

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert!(result.items[0].success);
        assert!(!result.items[1].success);
        assert!(result.items[1].error.is_some());
        assert!(result.items[2].success);

        // 失败项不影响其它项的落库
        assert_eq!(f.dispatch_repo.stored_count(), 2);
    }

    #[tokio::test]
    async fn test_assign_completed_job_rejected() {
        let f = fixture();
        let job = JobBuilder::new().with_status(JobStatus::Completed).build();
        f.job_repo.create(&job).await.unwrap();

        let result = f
            .service
            .assign_job(&command(&f, job.id, t(10, 0), t(12, 0)), &actor())
            .await;
        assert!(matches!(
            result,
            Err(FieldOpsError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_available_excludes_busy_and_unskilled() {
        let f = fixture();

        // 另一名空闲但不具备技能的技术员
        let unskilled = TechnicianBuilder::new()
            .with_name("学徒")
            .with_skills(vec![])
            .build();
        let unskilled_id = unskilled.id;
        f.technician_repo.insert_technician(unskilled);
        for weekday in 0..5 {
            f.technician_repo.insert_working_hours(
                WorkingHoursBuilder::new(unskilled_id)
                    .weekday(weekday)
                    .window(t(9, 0), t(17, 0))
                    .build(),
            );
        }

        let available = f
            .service
            .find_available(monday(), t(10, 0), t(12, 0), &["hvac".to_string()])
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].technician_id, f.technician_id);

        // 无技能要求时两人都可用
        let all = f
            .service
            .find_available(monday(), t(10, 0), t(12, 0), &[])
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        // 占用时间窗后被排除
        f.dispatch_repo
            .create(
                &DispatchBuilder::new(f.technician_id, monday())
                    .with_window(t(11, 0), t(13, 0))
                    .build(),
            )
            .await
            .unwrap();
        let available = f
            .service
            .find_available(monday(), t(10, 0), t(12, 0), &["hvac".to_string()])
            .await
            .unwrap();
        assert!(available.is_empty());
    }

    #[tokio::test]
    async fn test_create_dispatch_for_job_requires_schedule() {
        let f = fixture();
        let job = JobBuilder::new().build();
        f.job_repo.create(&job).await.unwrap();

        // 未排班的工单不能直接生成派工单
        let result = f
            .service
            .create_dispatch_for_job(job.id, None, &actor())
            .await;
        assert!(matches!(result, Err(FieldOpsError::ValidationError(_))));

        let mut cmd = command(&f, job.id, t(14, 0), t(16, 0));
        cmd.auto_create_dispatch = false;
        f.service.assign_job(&cmd, &actor()).await.unwrap();

        let dispatch = f
            .service
            .create_dispatch_for_job(job.id, Some("补建".to_string()), &actor())
            .await
            .unwrap();
        assert_eq!(dispatch.job_id, job.id);
        assert_eq!(dispatch.notes.as_deref(), Some("补建"));
    }

    #[tokio::test]
    async fn test_list_unassigned_with_pagination() {
        let f = fixture();
        for _ in 0..5 {
            f.job_repo.create(&JobBuilder::new().build()).await.unwrap();
        }

        let (jobs, total) = f
            .service
            .list_unassigned(&fieldops_domain::entities::JobFilter {
                limit: Some(2),
                offset: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(total, 5);
    }
}
