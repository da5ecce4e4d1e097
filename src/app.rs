use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use fieldops_api::{create_routes, AppState};
use fieldops_core::AppConfig;
use fieldops_dispatch::{DispatchItemService, DispatchService, StatisticsService};
use fieldops_infrastructure::database::postgres::{
    PostgresDispatchItemRepository, PostgresDispatchRepository, PostgresJobRepository,
    PostgresTechnicianRepository,
};
use fieldops_infrastructure::{DatabaseManager, LocalFileStorage};
use fieldops_planning::AssignmentService;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// 主应用程序：装配仓储、服务与HTTP路由
pub struct Application {
    config: AppConfig,
    state: AppState,
}

impl Application {
    pub async fn new(config: AppConfig, run_migrations: bool) -> Result<Self> {
        info!("初始化应用程序");

        let database = DatabaseManager::connect(&config.database)
            .await
            .context("连接数据库失败")?;
        if run_migrations {
            database.migrate().await.context("执行数据库迁移失败")?;
        }
        let pool = database.pool();

        let job_repo = Arc::new(PostgresJobRepository::new(pool.clone()));
        let technician_repo = Arc::new(PostgresTechnicianRepository::new(pool.clone()));
        let dispatch_repo = Arc::new(PostgresDispatchRepository::new(pool.clone()));
        let item_repo = Arc::new(PostgresDispatchItemRepository::new(pool.clone()));
        let file_storage = Arc::new(LocalFileStorage::new(&config.storage.attachment_dir));

        let assignment = Arc::new(AssignmentService::new(
            job_repo,
            technician_repo,
            dispatch_repo.clone(),
        ));
        let dispatches = Arc::new(DispatchService::new(dispatch_repo.clone()));
        let items = Arc::new(DispatchItemService::new(
            dispatch_repo.clone(),
            item_repo.clone(),
            file_storage,
        ));
        let statistics = Arc::new(StatisticsService::new(dispatch_repo, item_repo));

        let state = AppState {
            assignment,
            dispatches,
            items,
            statistics,
        };

        Ok(Self { config, state })
    }

    /// 启动HTTP服务并阻塞到收到关闭信号
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let mut router = create_routes(self.state).layer(TraceLayer::new_for_http());

        if self.config.api.cors_enabled {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("监听地址绑定失败: {}", self.config.api.bind_address))?;
        info!("API服务监听于 {}", self.config.api.bind_address);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP服务异常退出")?;

        info!("HTTP服务已停止");
        Ok(())
    }
}
