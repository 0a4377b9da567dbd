// 优雅停机：收到退出信号后停止接收新请求，等待在途请求完成。
use tracing::info;

pub async fn shutdown_signal() {
    // Ctrl+C 与 SIGTERM 都要响应，容器环境下通常只会发 SIGTERM。
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            eprintln!("监听退出信号失败: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut stream = signal(SignalKind::terminate()).expect("无法注册 SIGTERM 监听器");
        stream.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("收到退出信号，medichat 服务准备关闭。");
}
