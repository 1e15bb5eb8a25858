use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::auth::{self, Authenticator};
use crate::config;
use crate::data::{self, PeopleService};
use crate::logging;
use crate::session::Session;
use crate::storage::{self, KeyValueStore};
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Browse the built-in sample catalogue without touching the network.
    pub offline: bool,
    /// Screen to open first, e.g. `/person/{id}`.
    pub start_path: Option<String>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    logging::init(&cfg.log).context("start logging")?;

    let start_route = match opts.start_path.as_deref() {
        Some(path) => ui::Route::parse(path)
            .with_context(|| format!("unknown screen {path:?}; expected / or /person/{{id}}"))?,
        None => ui::Route::Catalogue,
    };

    let options = if opts.offline {
        offline_options(start_route)?
    } else {
        online_options(&cfg, start_route)?
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    tracing::info!("shutting down");
    result
}

fn online_options(cfg: &config::Config, start_route: ui::Route) -> Result<ui::Options> {
    let display_path = friendly_path(config::default_path().as_ref());
    let base_url = cfg
        .api
        .base_url()
        .with_context(|| format!("set api.base_url in {display_path} or SWCAT_API__BASE_URL"))?;

    let store: Arc<dyn KeyValueStore> = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );
    let session = Session::new(store);

    let flow = auth::Flow::new(auth::Config {
        base_url: base_url.clone(),
        key: cfg.api.key.clone(),
        secret: cfg.api.secret.clone(),
        user_agent: cfg.api.user_agent.clone(),
        timeout: cfg.api.timeout,
    })
    .with_context(|| format!("set api.key in {display_path} or SWCAT_API__KEY"))?;
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(auth::Manager::new(flow, session.clone()));

    let client = api::Client::new(
        session.clone(),
        api::ClientConfig {
            base_url,
            user_agent: cfg.api.user_agent.clone(),
            timeout: cfg.api.timeout,
            http_client: None,
        },
    )?;
    let people_service: Arc<dyn PeopleService> =
        Arc::new(data::HttpPeopleService::new(Arc::new(client)));

    let status_message = if session.has_access_token() {
        "Loading the catalogue…".to_string()
    } else {
        "Signing in…".to_string()
    };
    tracing::info!(base_url = %cfg.api.base_url, "starting online session");

    Ok(ui::Options {
        status_message,
        session,
        authenticator: Some(authenticator),
        people_service,
        start_route,
    })
}

fn offline_options(start_route: ui::Route) -> Result<ui::Options> {
    let session = Session::new(Arc::new(storage::MemoryStore::new()));
    session
        .set_access_token("offline")
        .context("seed offline session")?;
    tracing::info!("starting offline session with sample data");
    Ok(ui::Options {
        status_message: "Offline: browsing sample data.".to_string(),
        session,
        authenticator: None,
        people_service: Arc::new(data::MockPeopleService::default()),
        start_route,
    })
}

/// Forgets the stored token pair so the next start signs in afresh.
pub fn logout() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let store = storage::Store::open(storage::Options {
        path: cfg.storage.path.clone(),
    })
    .context("open storage")?;
    Session::new(Arc::new(store.clone()))
        .clear_credentials()
        .context("clear credentials")?;
    store.close()
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/sw-catalogue/config.yaml".to_string()
    }
}
