use tokio::signal;
use tracing::info;

/// 等待 Ctrl+C 或 SIGTERM，返回后触发优雅关闭
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("注册Ctrl+C信号失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("注册SIGTERM信号失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C，开始优雅关闭"),
        _ = terminate => info!("收到SIGTERM，开始优雅关闭"),
    }
}
