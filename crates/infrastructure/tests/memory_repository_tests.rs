use chrono::NaiveDate;
use fieldops_core::FieldOpsError;
use fieldops_domain::entities::{DispatchFilter, DispatchStatus, JobFilter, Priority};
use fieldops_domain::repositories::{DispatchRepository, JobRepository};
use fieldops_domain::value_objects::ActorContext;
use fieldops_infrastructure::builders::{DispatchBuilder, JobBuilder};
use fieldops_infrastructure::{InMemoryDispatchRepository, InMemoryJobRepository};
use uuid::Uuid;

fn t(h: u32, m: u32) -> chrono::NaiveTime {
    chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

#[tokio::test]
async fn test_dispatch_create_rejects_overlap() {
    let repo = InMemoryDispatchRepository::new();
    let technician = Uuid::new_v4();

    let first = DispatchBuilder::new(technician, monday())
        .with_window(t(10, 0), t(12, 0))
        .build();
    repo.create(&first).await.unwrap();

    // 同一技术员、同一天、时间窗相交：提交被拒绝
    let second = DispatchBuilder::new(technician, monday())
        .with_window(t(11, 0), t(13, 0))
        .build();
    let result = repo.create(&second).await;
    assert!(matches!(result, Err(FieldOpsError::Conflict(_))));

    // 紧邻不相交的时间窗可以创建
    let adjacent = DispatchBuilder::new(technician, monday())
        .with_window(t(12, 0), t(14, 0))
        .build();
    repo.create(&adjacent).await.unwrap();
    assert_eq!(repo.stored_count(), 2);
}

#[tokio::test]
async fn test_dispatch_overlap_ignores_other_technician_and_cancelled() {
    let repo = InMemoryDispatchRepository::new();
    let technician = Uuid::new_v4();

    let cancelled = DispatchBuilder::new(technician, monday())
        .with_window(t(10, 0), t(12, 0))
        .with_status(DispatchStatus::Cancelled)
        .build();
    repo.create(&cancelled).await.unwrap();

    // 已取消的派工单不再占用时间窗
    let replacing = DispatchBuilder::new(technician, monday())
        .with_window(t(10, 0), t(12, 0))
        .build();
    repo.create(&replacing).await.unwrap();

    // 其他技术员同时间窗互不影响
    let other = DispatchBuilder::new(Uuid::new_v4(), monday())
        .with_window(t(10, 0), t(12, 0))
        .build();
    repo.create(&other).await.unwrap();
}

#[tokio::test]
async fn test_soft_delete_hides_dispatch() {
    let repo = InMemoryDispatchRepository::new();
    let technician = Uuid::new_v4();
    let actor = ActorContext::new(Uuid::new_v4());

    let dispatch = DispatchBuilder::new(technician, monday()).build();
    repo.create(&dispatch).await.unwrap();

    assert!(repo.soft_delete(dispatch.id, &actor).await.unwrap());
    assert!(repo.get_by_id(dispatch.id).await.unwrap().is_none());
    assert_eq!(repo.count(&DispatchFilter::default()).await.unwrap(), 0);
    // 第二次删除返回 false
    assert!(!repo.soft_delete(dispatch.id, &actor).await.unwrap());

    // 删除后时间窗被释放
    let replacing = DispatchBuilder::new(technician, monday()).build();
    repo.create(&replacing).await.unwrap();
}

#[tokio::test]
async fn test_dispatch_list_filters() {
    let repo = InMemoryDispatchRepository::new();
    let technician = Uuid::new_v4();

    let d1 = DispatchBuilder::new(technician, monday())
        .with_window(t(9, 0), t(10, 0))
        .with_priority(Priority::High)
        .build();
    let d2 = DispatchBuilder::new(technician, monday().succ_opt().unwrap())
        .with_window(t(9, 0), t(10, 0))
        .build();
    let d3 = DispatchBuilder::new(Uuid::new_v4(), monday())
        .with_window(t(14, 0), t(15, 0))
        .build();
    repo.create(&d1).await.unwrap();
    repo.create(&d2).await.unwrap();
    repo.create(&d3).await.unwrap();

    let by_technician = repo
        .list(&DispatchFilter {
            technician_id: Some(technician),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_technician.len(), 2);
    // 按日期、开始时间排序
    assert_eq!(by_technician[0].id, d1.id);

    let by_priority = repo
        .list(&DispatchFilter {
            priority: Some(Priority::High),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_priority.len(), 1);

    let by_date = repo
        .list(&DispatchFilter {
            from_date: Some(monday().succ_opt().unwrap()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_date.len(), 1);
    assert_eq!(by_date[0].id, d2.id);
}

#[tokio::test]
async fn test_unassigned_jobs_ordering_and_filter() {
    let repo = InMemoryJobRepository::new();

    let low = JobBuilder::new().with_priority(Priority::Low).build();
    let urgent = JobBuilder::new()
        .with_priority(Priority::Urgent)
        .with_required_skills(vec!["hvac"])
        .build();
    let normal = JobBuilder::new().build();
    for job in [&low, &urgent, &normal] {
        repo.create(job).await.unwrap();
    }

    let all = repo.list_unassigned(&JobFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, urgent.id);
    assert_eq!(all[2].id, low.id);

    let hvac_only = repo
        .list_unassigned(&JobFilter {
            skill: Some("HVAC".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(hvac_only.len(), 1);
    assert_eq!(hvac_only[0].id, urgent.id);

    assert_eq!(repo.count_unassigned(&JobFilter::default()).await.unwrap(), 3);
}
