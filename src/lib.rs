//! Runtime substrate for a site-partitioned persistent text world: the
//! entity object graph, the storage backend contract, the two-tier
//! database access façade, the security evaluator, and the client-message
//! protocol with its channel dispatch.
//!
//! Everything a higher-level command parser or scripting engine needs to
//! read, mutate, and authorize against the world lives here. Session
//! handling, wire transport, and the scripting language itself are
//! external collaborators this crate does not implement.

pub mod cache;
pub mod channel;
pub mod config;
pub mod dbaccess;
pub mod entity;
pub mod error;
pub mod id;
pub mod protocol;
pub mod security;
pub mod storage;
pub mod time;
pub mod update_manager;

pub use config::Config;
pub use dbaccess::DatabaseAccess;
pub use error::{DbError, DbSuccess};
pub use id::{EntityId, Id, SiteId};

/// Installs a `tracing` subscriber from [`Config::log`]. Call once at
/// process start; safe to call more than once (later calls are ignored).
pub fn init_tracing(config: &config::LogConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(err) = result {
        tracing::debug!("tracing subscriber already installed: {err}");
    }
}
