//! Tyre Portal - ERP sync daemon and storefront API
//!
//! Syncs DEAR/Cin7 inventory and customers into SQLite on a fixed interval and,
//! when a port is given, serves the storefront JSON API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tyre_portal::cart::CartStore;
use tyre_portal::dear::{DearClient, DearConfig, DEFAULT_BASE_URL, MAX_PAGE_SIZE};
use tyre_portal::web::{self, AppState};
use tyre_portal::{auth, database, Scheduler};

/// Tyre portal - mirrors ERP stock to SQLite and serves the wholesale storefront
#[derive(Parser, Debug)]
#[command(name = "tyre_portal")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, env = "PORTAL_DATABASE", default_value_t = default_db_path())]
    database: String,

    /// ERP API root
    #[arg(long, env = "DEAR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    erp_base_url: String,

    /// ERP account id (api-auth-accountid)
    #[arg(long, env = "DEAR_ACCOUNT_ID")]
    erp_account_id: String,

    /// ERP application key (api-auth-applicationkey)
    #[arg(long, env = "DEAR_APPLICATION_KEY", hide_env_values = true)]
    erp_application_key: String,

    /// Rows per ERP page (1-1000)
    #[arg(long, env = "DEAR_PAGE_SIZE", default_value_t = MAX_PAGE_SIZE)]
    page_size: u32,

    /// ERP request timeout in seconds
    #[arg(long, env = "DEAR_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Minutes between sync passes when running continuously
    #[arg(long, env = "SYNC_INTERVAL_MINUTES", default_value_t = 30)]
    sync_interval_minutes: u64,

    /// Run one sync pass and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Serve the storefront API on this port (default: disabled)
    #[arg(long, env = "PORTAL_WEB_PORT")]
    web_port: Option<u16>,

    /// Directory of static UI files served for non-API paths
    #[arg(long, env = "PORTAL_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Admin login created at startup if missing
    #[arg(long, env = "PORTAL_ADMIN_EMAIL", requires = "admin_password")]
    admin_email: Option<String>,

    #[arg(long, env = "PORTAL_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

/// Returns the default database path: ~/.local/share/tyre_portal/portal.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tyre_portal")
        .join("portal.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Ok(path) = dotenv {
        log::info!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting tyre_portal...");
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let conn = match database::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let (Some(email), Some(password)) = (&args.admin_email, &args.admin_password) {
        if let Err(e) = auth::ensure_admin(&conn, email, password) {
            log::error!("Failed to create admin user: {}", e);
            std::process::exit(1);
        }
    }

    match database::purge_expired_sessions(&conn, &database::now_timestamp()) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} expired sessions", n),
        Err(e) => log::warn!("Failed to purge expired sessions: {}", e),
    }

    // Wrap connection in Arc<Mutex> for sharing between sync and web
    let db = Arc::new(Mutex::new(conn));

    let config = DearConfig {
        base_url: args.erp_base_url.clone(),
        account_id: args.erp_account_id.clone(),
        application_key: args.erp_application_key.clone(),
        page_size: args.page_size,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let dear = match DearClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Failed to create ERP client: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(Scheduler::new(Arc::clone(&dear), Arc::clone(&db)));

    if args.once {
        let report = scheduler.run_pass().await;
        if report.values().all(|ok| *ok) {
            return;
        }
        std::process::exit(1);
    }

    // Spawn web server if --web-port specified
    if let Some(port) = args.web_port {
        let state = AppState {
            db: Arc::clone(&db),
            dear: Arc::clone(&dear),
            carts: Arc::new(CartStore::new()),
            scheduler: Arc::clone(&scheduler),
        };
        let static_dir = args.static_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = web::serve(state, port, static_dir).await {
                log::error!("Web server error: {}", e);
            }
        });
    }

    let every = Duration::from_secs(args.sync_interval_minutes.max(1) * 60);
    log::info!(
        "Running in daemon mode, syncing every {} minute(s)",
        args.sync_interval_minutes.max(1)
    );

    tokio::select! {
        _ = scheduler.run_daemon(every) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        }
    }
}
