//! SaaS Starter server binary.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use saas_starter::adapters::auth::FirebaseSessionValidator;
use saas_starter::adapters::events::{
    AccountChangeBus, FanoutNotifier, RedisAccountChangeListener, RedisAccountChangePublisher,
};
use saas_starter::adapters::http::middleware::AuthState;
use saas_starter::adapters::http::{api_router, BillingAppState};
use saas_starter::adapters::postgres::{run_migrations, PostgresAccountStore};
use saas_starter::adapters::storage::InMemoryAccountStore;
use saas_starter::adapters::stripe::StripePaymentAdapter;
use saas_starter::config::AppConfig;
use saas_starter::ports::{AccountRepository, SubscriptionRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Starting saas-starter"
    );

    let (accounts, subscriptions) = build_store(&config).await?;

    let bus = Arc::new(AccountChangeBus::default());
    let mut change_listener = None;
    let notifier = match &config.redis {
        // Every instance, this one included, hears changes back through
        // Redis, so the local bus is fed by the listener only.
        Some(redis) => {
            let publisher = RedisAccountChangePublisher::connect(&redis.url)
                .await?
                .with_channel_prefix(redis.channel_prefix.clone());
            let subscriber = RedisAccountChangeListener::new(&redis.url, &redis.channel_prefix)?;
            tracing::info!(pattern = %subscriber.pattern(), "Sharing account changes through Redis");
            change_listener = Some(subscriber.spawn(bus.as_ref().clone()));
            FanoutNotifier::new().with(Arc::new(publisher))
        }
        None => FanoutNotifier::new().with(bus.clone()),
    };

    let state = BillingAppState {
        accounts,
        subscriptions,
        payment_provider: Arc::new(StripePaymentAdapter::new(config.payment.stripe_config())),
        notifier: Arc::new(notifier),
        changes: bus,
        webhook_verifier: Arc::new(config.payment.webhook_verifier()),
        catalogue: Arc::new(config.payment.catalogue()),
        app_base_url: config.payment.app_base_url.clone(),
    };
    let auth: AuthState = Arc::new(FirebaseSessionValidator::new(config.auth.firebase_config()));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let app = api_router(state, auth)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = change_listener {
        task.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_store(
    config: &AppConfig,
) -> Result<(Arc<dyn AccountRepository>, Arc<dyn SubscriptionRepository>), BoxError> {
    match &config.database {
        Some(database) => {
            let pool = database.pool_options().connect(&database.url).await?;
            if database.run_migrations {
                run_migrations(&pool).await?;
                tracing::info!("Database migrations applied");
            }
            let store = Arc::new(PostgresAccountStore::new(pool));
            let accounts: Arc<dyn AccountRepository> = store.clone();
            let subscriptions: Arc<dyn SubscriptionRepository> = store;
            Ok((accounts, subscriptions))
        }
        None => {
            tracing::warn!("No database configured, accounts are kept in memory");
            let store = Arc::new(InMemoryAccountStore::new());
            let accounts: Arc<dyn AccountRepository> = store.clone();
            let subscriptions: Arc<dyn SubscriptionRepository> = store;
            Ok((accounts, subscriptions))
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
