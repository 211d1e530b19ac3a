use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::body::Body;
use axum::response::IntoResponse;
use axum::Router;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arte_review::config::Config;
use arte_review::error::AppError;
use arte_review::services::init;
use arte_review::{middleware, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting arte-review service");

    let pool = init::init_db(&config).await?;
    let speech = init::init_speech(&config)?;
    let storage = init::init_storage(&config);

    if config.server.public_app_url.is_none() {
        tracing::warn!("PUBLIC_APP_URL not set; /l/{{token}} redirects will answer 503");
    }

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        speech,
        storage,
    });

    // Rate limiter storage is pruned by std threads that watch this flag.
    let thread_shutdown = Arc::new(AtomicBool::new(false));

    let (auth_router, auth_cleaner) = rate_limited(
        routes::auth::router(),
        "auth",
        config.rate_limit.auth_per_second,
        config.rate_limit.auth_burst,
        thread_shutdown.clone(),
    )?;
    let (public_router, public_cleaner) = rate_limited(
        routes::links::router(),
        "public",
        config.rate_limit.public_per_second,
        config.rate_limit.public_burst,
        thread_shutdown.clone(),
    )?;

    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = routes::compose(auth_router, public_router)
        .with_state(app_state.clone())
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                    http::Method::PATCH,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(thread_shutdown.clone()))
    .await?;

    thread_shutdown.store(true, Ordering::SeqCst);
    for (name, cleaner) in [("auth", auth_cleaner), ("public", public_cleaner)] {
        if let Err(e) = cleaner.join() {
            tracing::warn!("{} rate limiter cleanup thread join failed: {:?}", name, e);
        }
    }

    app_state.db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arte_review=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Wrap `router` in a per-IP rate limiter and start the thread that prunes
/// its storage.
fn rate_limited(
    router: Router<Arc<AppState>>,
    name: &'static str,
    per_second: u32,
    burst: u32,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<(Router<Arc<AppState>>, std::thread::JoinHandle<()>)> {
    let mut builder = GovernorConfigBuilder::default().key_extractor(SmartIpKeyExtractor);
    builder.per_second(per_second.into());
    builder.burst_size(burst);
    builder.error_handler(rate_limit_error);

    let gov_conf = Arc::new(
        builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build {} governor config", name))?,
    );

    let cleaner = {
        let limiter = gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        std::thread::spawn(move || {
            // Short sleeps so shutdown is noticed quickly.
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if shutdown.load(Ordering::SeqCst) {
                        tracing::info!("{} rate limiter cleanup thread exiting", name);
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("{} rate limiter size: {}", name, limiter.len());
                limiter.retain_recent();
            }
        })
    };

    Ok((router.layer(GovernorLayer { config: gov_conf }), cleaner))
}

/// Governor rejections in the regular `AppError` body shape.
fn rate_limit_error(error: GovernorError) -> http::Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut resp = AppError::RateLimited
                .with_details(serde_json::json!({ "retry_after_seconds": wait_time }));
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            if let Ok(value) = HeaderValue::from_str(&wait_time.to_string()) {
                resp.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
            resp
        }
        GovernorError::UnableToExtractKey => AppError::BadRequest(
            "Unable to determine client IP for rate limiting".to_string(),
        )
        .into_response(),
        GovernorError::Other { code, msg, headers } => {
            let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() =
                StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            resp
        }
    }
}

async fn shutdown_signal(flag: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
    flag.store(true, Ordering::SeqCst);
}
