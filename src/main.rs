//! TableLink Auth Server
//! Mission: Authenticate and authorize every call into the TableLink RPC backend

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tablelink_auth::{
    api::{rpc_router, AppState},
    auth::{
        clock::{Clock, SystemClock},
        password::{BcryptHasher, PasswordHasher},
        session_cache::{InMemorySessionCache, SessionCache, SessionCacheGate},
        AuthService, ClaimCodec, Interceptor, RbacDecider, SqliteUserStore, TokenIssuer,
        TokenValidator, UserService,
    },
    config::Config,
};
use tokio::{net::TcpListener, time::interval};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ADMIN_SECTION: &str = "admin";
const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();

    info!("🚀 TableLink auth gate starting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lifetimes = config.token_lifetimes()?;
    let codec = Arc::new(ClaimCodec::new(
        &config.signing_secret(),
        config.token_issuer.clone(),
        clock.clone(),
    ));
    let issuer = TokenIssuer::new(codec.clone(), lifetimes);
    let validator = TokenValidator::new(codec);

    let routes = Arc::new(config.route_map()?);
    info!("🗺️  {} RPC methods mapped", routes.len());

    let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::default());
    let store = Arc::new(SqliteUserStore::new(&config.auth_db_path)?);
    let admin_hash = hasher.hash(&config.admin_password())?;
    store.ensure_default_admin(&config.admin_email, &admin_hash, ADMIN_SECTION, &routes.paths())?;
    info!("🔐 Authentication store initialized at: {}", config.auth_db_path);

    let cache: Option<Arc<dyn SessionCache>> = if config.session_cache_enabled {
        let cache = Arc::new(InMemorySessionCache::new());
        tokio::spawn(session_cache_cleanup(cache.clone()));
        info!("🗄️  Session cache enabled");
        Some(cache as Arc<dyn SessionCache>)
    } else {
        info!("🗄️  Session cache disabled");
        None
    };

    let sessions = SessionCacheGate::new(
        cache,
        validator.clone(),
        clock.clone(),
        config.session_cache_ttl(),
        lifetimes.access,
        config.gate_timeout(),
    );

    let interceptor = Interceptor::new(
        validator.clone(),
        routes,
        RbacDecider::new(store.clone()),
        config.gate_timeout(),
    );

    let state = AppState {
        auth: Arc::new(AuthService::new(
            store.clone(),
            hasher.clone(),
            issuer,
            validator,
            sessions,
            clock,
        )),
        users: Arc::new(UserService::new(store, hasher)),
        interceptor: Arc::new(interceptor),
    };

    let app = rpc_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 RPC server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Periodically drop expired session cache entries
async fn session_cache_cleanup(cache: Arc<InMemorySessionCache>) {
    let mut ticker = interval(CACHE_CLEANUP_INTERVAL);
    loop {
        ticker.tick().await;
        cache.cleanup();
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablelink_auth=debug,tablelink=debug,security=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate root
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
