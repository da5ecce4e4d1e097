#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::{NaiveDate, NaiveTime};
    use fieldops_api::{create_routes, AppState};
    use fieldops_dispatch::{DispatchItemService, DispatchService, StatisticsService};
    use fieldops_domain::repositories::JobRepository;
    use fieldops_infrastructure::builders::{JobBuilder, TechnicianBuilder, WorkingHoursBuilder};
    use fieldops_infrastructure::{
        InMemoryDispatchItemRepository, InMemoryDispatchRepository, InMemoryFileStorage,
        InMemoryJobRepository, InMemoryTechnicianRepository,
    };
    use fieldops_planning::AssignmentService;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    struct TestApp {
        router: Router,
        job_repo: Arc<InMemoryJobRepository>,
        technician_id: Uuid,
    }

    async fn test_app() -> TestApp {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let technician_repo = Arc::new(InMemoryTechnicianRepository::new());
        let dispatch_repo = Arc::new(InMemoryDispatchRepository::new());
        let item_repo = Arc::new(InMemoryDispatchItemRepository::new());
        let storage = Arc::new(InMemoryFileStorage::new());

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

        let state = AppState {
            assignment: Arc::new(AssignmentService::new(
                job_repo.clone(),
                technician_repo.clone(),
                dispatch_repo.clone(),
            )),
            dispatches: Arc::new(DispatchService::new(dispatch_repo.clone())),
            items: Arc::new(DispatchItemService::new(
                dispatch_repo.clone(),
                item_repo.clone(),
                storage,
            )),
            statistics: Arc::new(StatisticsService::new(dispatch_repo, item_repo)),
        };

        TestApp {
            router: create_routes(state),
            job_repo,
            technician_id,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value, actor: Option<Uuid>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(actor) = actor {
            builder = builder.header("x-actor-id", actor.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app().await;
        let (status, body) = send(&app.router, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn test_assign_flow_end_to_end() {
        let app = test_app().await;
        let job = JobBuilder::new().build();
        app.job_repo.create(&job).await.unwrap();
        let actor = Uuid::new_v4();

        let (status, body) = send(
            &app.router,
            post_json(
                &format!("/api/jobs/{}/assign", job.id),
                json!({
                    "technician_ids": [app.technician_id],
                    "date": "2025-06-02",
                    "start": "10:00:00",
                    "end": "12:00:00",
                }),
                Some(actor),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        let dispatch_id = body["data"]["dispatch_id"].as_str().unwrap().to_string();

        // 列表能看到新建的派工单
        let (status, body) = send(&app.router, get("/api/dispatches")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], json!(1));

        // 开始执行 → 完成
        let (status, _) = send(
            &app.router,
            post_json(
                &format!("/api/dispatches/{dispatch_id}/start"),
                json!({"notes": "到场"}),
                Some(actor),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app.router,
            post_json(
                &format!("/api/dispatches/{dispatch_id}/complete"),
                json!({"completion_percentage": 100}),
                Some(actor),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("COMPLETED"));

        // 统计看到一张已完成
        let (status, body) = send(&app.router, get("/api/statistics/dispatches")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["by_status"]["COMPLETED"], json!(1));
    }

    #[tokio::test]
    async fn test_missing_actor_header_is_401() {
        let app = test_app().await;
        let job = JobBuilder::new().build();
        app.job_repo.create(&job).await.unwrap();

        let (status, body) = send(
            &app.router,
            post_json(
                &format!("/api/jobs/{}/assign", job.id),
                json!({
                    "technician_ids": [app.technician_id],
                    "date": "2025-06-02",
                    "start": "10:00:00",
                    "end": "12:00:00",
                }),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("AUTH_REQUIRED"));
    }

    #[tokio::test]
    async fn test_double_booking_returns_conflict_payload() {
        let app = test_app().await;
        let first = JobBuilder::new().build();
        let second = JobBuilder::new().build();
        app.job_repo.create(&first).await.unwrap();
        app.job_repo.create(&second).await.unwrap();
        let actor = Uuid::new_v4();

        let assign = |job_id: Uuid, start: &str, end: &str| {
            post_json(
                &format!("/api/jobs/{job_id}/assign"),
                json!({
                    "technician_ids": [app.technician_id],
                    "date": "2025-06-02",
                    "start": start,
                    "end": end,
                }),
                Some(actor),
            )
        };

        let (status, _) = send(&app.router, assign(first.id, "10:00:00", "12:00:00")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app.router, assign(second.id, "11:00:00", "13:00:00")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("ASSIGNMENT_CONFLICT"));
        assert_eq!(
            body["error"]["details"]["conflicts"][0]["kind"],
            json!("double_booking")
        );
    }

    #[tokio::test]
    async fn test_validate_endpoint_reports_without_writing() {
        let app = test_app().await;
        let job = JobBuilder::new().with_required_skills(vec!["plumbing"]).build();
        app.job_repo.create(&job).await.unwrap();

        let (status, body) = send(
            &app.router,
            post_json(
                "/api/assignments/validate",
                json!({
                    "job_id": job.id,
                    "technician_ids": [app.technician_id],
                    "date": "2025-06-02",
                    "start": "10:00:00",
                    "end": "12:00:00",
                }),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_valid"], json!(true));
        // 缺技能是提示不是失败
        assert_eq!(body["data"]["warnings"][0]["kind"], json!("skill_mismatch"));
    }

    #[tokio::test]
    async fn test_complete_percentage_validation() {
        let app = test_app().await;
        let actor = Uuid::new_v4();

        let (status, body) = send(
            &app.router,
            post_json(
                &format!("/api/dispatches/{}/complete", Uuid::new_v4()),
                json!({"completion_percentage": 150}),
                Some(actor),
            ),
        )
        .await;

        // 参数校验先于存在性检查
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_unknown_dispatch_is_404() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            get(&format!("/api/dispatches/{}", Uuid::new_v4())),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("DISPATCH_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_technician_schedule_endpoint() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            get(&format!(
                "/api/technicians/{}/schedule?from=2025-06-02&to=2025-06-03",
                app.technician_id
            )),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["days"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["total_available_minutes"], json!(960));
    }

    #[tokio::test]
    async fn test_available_technicians_endpoint() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            get("/api/technicians/available?date=2025-06-02&start=10:00:00&end=12:00:00&skills=hvac"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app.router,
            get("/api/technicians/available?date=2025-06-02&start=10:00:00&end=12:00:00&skills=plumbing"),
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_attachment_upload_roundtrip() {
        let app = test_app().await;
        let job = JobBuilder::new().build();
        app.job_repo.create(&job).await.unwrap();
        let actor = Uuid::new_v4();

        let (_, body) = send(
            &app.router,
            post_json(
                &format!("/api/jobs/{}/assign", job.id),
                json!({
                    "technician_ids": [app.technician_id],
                    "date": "2025-06-02",
                    "start": "14:00:00",
                    "end": "16:00:00",
                }),
                Some(actor),
            ),
        )
        .await;
        let dispatch_id = body["data"]["dispatch_id"].as_str().unwrap().to_string();

        let upload = Request::builder()
            .method("POST")
            .uri(format!(
                "/api/dispatches/{dispatch_id}/attachments?file_name=photo.jpg&content_type=image/jpeg"
            ))
            .header("x-actor-id", actor.to_string())
            .body(Body::from(&b"jpegbytes"[..]))
            .unwrap();
        let (status, body) = send(&app.router, upload).await;
        assert_eq!(status, StatusCode::CREATED);
        let attachment_id = body["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/api/attachments/{attachment_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "image/jpeg"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"jpegbytes");
    }
}
