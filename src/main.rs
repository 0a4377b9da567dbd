// 服务入口：加载配置、初始化存储并挂载 API 路由。
use medichat_server::api;
use medichat_server::config::{self, Config};
use medichat_server::shutdown::shutdown_signal;
use medichat_server::state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config();
    init_tracing(&config);
    let state = Arc::new(AppState::new(config.clone())?);

    let app = api::build_router()
        .layer(build_cors(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = bind_address(&config);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("medichat API 服务已启动: http://{addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        warn!("服务退出异常: {err}");
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn bind_address(config: &Config) -> String {
    // 保留环境变量覆盖，便于容器化部署。
    let host = std::env::var("MEDICHAT_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port = std::env::var("MEDICHAT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    format!("{host}:{port}")
}

fn build_cors(config: &Config) -> CorsLayer {
    // 来源取配置，未配置或包含 * 时放开全部来源。
    let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins = config.cors.allow_origins.as_deref().unwrap_or(&[]);
    let wildcard = origins.is_empty() || origins.iter().any(|value| value.trim() == "*");
    if wildcard {
        cors = cors.allow_origin(Any);
    } else {
        let values = origins
            .iter()
            .filter_map(|value| value.parse().ok())
            .collect::<Vec<_>>();
        cors = cors.allow_origin(AllowOrigin::list(values));
        // 通配来源不能附带凭据，仅显式列表时允许开启。
        if config.cors.allow_credentials.unwrap_or(false) {
            cors = cors.allow_credentials(true);
        }
    }
    cors
}
