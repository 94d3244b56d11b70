use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use delivery_orders_api as api;
use api::{
    gateway::{HttpIdentityProvider, HttpPaymentGateway, IdentityProvider, PaymentGateway},
    notifications::{BroadcastHub, NotificationDispatcher, OrderEventSink},
    repositories::Repositories,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);
    let cfg = Arc::new(cfg);

    // Outbound clients
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        HttpPaymentGateway::from_config(&cfg).context("failed to build payment gateway client")?,
    );
    let identity: Arc<dyn IdentityProvider> = Arc::new(
        HttpIdentityProvider::from_config(&cfg)
            .context("failed to build identity provider client")?,
    );

    // Real-time notifications
    let (dispatcher, event_rx) =
        NotificationDispatcher::channel(cfg.notification_channel_capacity);
    let hub = BroadcastHub::new(cfg.notification_channel_capacity);
    let sink: Arc<dyn OrderEventSink> = Arc::new(hub.clone());
    tokio::spawn(api::notifications::process_events(event_rx, sink));

    let repos = Repositories::sea_orm(db_arc.clone());
    let services = api::handlers::AppServices::new(
        repos.clone(),
        gateway,
        identity,
        dispatcher,
        cfg.clone(),
    );
    let app_state = api::AppState::new(cfg.clone(), Some(db_arc), repos, services, hub);
    let app = api::create_router(app_state);

    // Bind and serve
    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address '{}'", cfg.host))?;
    let addr = SocketAddr::from((host, cfg.port));
    info!(environment = %cfg.environment, "delivery-orders-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
