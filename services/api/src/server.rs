use crate::cli::ServeArgs;
use crate::infra::{build_intake_service, AppState, LoggingNotifier};
use crate::routes::with_lead_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lead_guard::config::AppConfig;
use lead_guard::error::AppError;
use lead_guard::telemetry;
use lead_guard::workflows::intake::WizardType;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let notifier = Arc::new(LoggingNotifier::default());
    let intake_service = build_intake_service(&config.protection, notifier)?;
    for wizard in [WizardType::CustomBuild, WizardType::Remodeling] {
        let preset = intake_service.config_for(wizard);
        info!(
            wizard = wizard.label(),
            min_completion_secs = preset.min_completion_time,
            max_per_hour = preset.max_submissions_per_hour,
            max_per_day = preset.max_submissions_per_day,
            trust_threshold = preset.trust_score_threshold,
            "submission gate configured"
        );
    }

    let app = with_lead_routes(Arc::new(intake_service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
