use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use boxing::BoxingError;
use boxing::config::{Report, SolveConfig, solve};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

fn status_for(error: &BoxingError) -> StatusCode {
    match error {
        BoxingError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
        BoxingError::ConstraintViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BoxingError::InvariantBroken(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn solve_handler(
    Json(config): Json<SolveConfig>,
) -> Result<Json<Report>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&config).unwrap_or_default(),
        "POST /solve"
    );

    let result = tokio::task::spawn_blocking(move || solve(&config))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "solver task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "solver task failed".to_string())
        })?;

    match result {
        Ok(report) => {
            tracing::info!(
                boxes = report.box_count(),
                status = %report.status,
                elapsed_secs = report.elapsed_secs,
                "solved"
            );
            Ok(Json(report))
        }
        Err(e) => {
            let status = status_for(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(error = %e, "solve failed");
            } else {
                tracing::warn!(error = %e, "rejected request");
            }
            Err((status, e.to_string()))
        }
    }
}

fn main() {
    let _sentry = sentry::init((
        std::env::var("SENTRY_DSN").ok(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/solve", post(solve_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.expect("server error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let invalid = BoxingError::InvalidConfiguration("box size".to_string());
        assert_eq!(status_for(&invalid), StatusCode::BAD_REQUEST);
        let too_big = BoxingError::ConstraintViolation {
            item: 0,
            width: 11,
            height: 1,
            box_size: 10,
        };
        assert_eq!(status_for(&too_big), StatusCode::UNPROCESSABLE_ENTITY);
        let broken = BoxingError::InvariantBroken("overlap".to_string());
        assert_eq!(status_for(&broken), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
