use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws, Wss};
use surrealdb::opt::auth::Root;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

pub async fn connect(db_config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    let (transport, endpoint) = split_endpoint(&db_config.endpoint);
    let db = Surreal::<Client>::init();
    match transport {
        Transport::Plain => db.connect::<Ws>(endpoint).await?,
        Transport::Tls => db.connect::<Wss>(endpoint).await?,
    }
    db.signin(Root {
        username: &db_config.username,
        password: &db_config.password,
    })
    .await?;
    db.use_ns(&db_config.namespace)
        .use_db(&db_config.database)
        .await?;
    tracing::info!(
        endpoint,
        tls = transport == Transport::Tls,
        namespace = %db_config.namespace,
        database = %db_config.database,
        "connected to surrealdb"
    );
    Ok(Arc::new(db))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Plain,
    Tls,
}

/// The ws engines take `host:port`; the scheme in config picks the engine.
fn split_endpoint(endpoint: &str) -> (Transport, &str) {
    if let Some(rest) = endpoint.strip_prefix("wss://") {
        (Transport::Tls, rest)
    } else {
        (
            Transport::Plain,
            endpoint.strip_prefix("ws://").unwrap_or(endpoint),
        )
    }
}
