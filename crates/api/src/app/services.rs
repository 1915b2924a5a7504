//! Infrastructure wiring: event store, bus, projections and the workflows on top.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;

use arkpos_auth::Hs256JwtValidator;
use arkpos_events::{EventBus, EventEnvelope, InMemoryEventBus};
use arkpos_infra::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use arkpos_infra::{CommandDispatcher, Projections, Workflows};
use arkpos_reporting::FontSource;

use crate::config::AppConfig;

pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AppWorkflows = Workflows<Arc<dyn EventStore>, SharedBus>;

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppServices {
    pub workflows: AppWorkflows,
    pub jwt: Arc<Hs256JwtValidator>,
    pub token_ttl: chrono::Duration,
    pub fonts: FontSource,
}

impl AppServices {
    pub fn projections(&self) -> &Projections {
        self.workflows.projections()
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url)
                .await
                .context("failed to connect to the event store database")?;
            store.migrate().await.context("failed to migrate the event store schema")?;
            tracing::info!("using postgres event store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set; events are kept in memory");
            Arc::new(InMemoryEventStore::new())
        }
    };

    let bus: SharedBus = Arc::new(InMemoryEventBus::new());
    let projections = Projections::new();

    // Subscribe before bootstrapping so nothing committed afterwards is missed.
    let sub = bus.subscribe();

    let workflows = Workflows::new(
        CommandDispatcher::new(store, bus.clone()),
        projections.clone(),
        config.bcrypt_cost,
    );

    let replayed = workflows
        .bootstrap()
        .context("failed to rebuild read models from the event log")?;
    tracing::info!(events = replayed, "read models rebuilt");

    // Keep projections current. The loop ends once the bus is dropped.
    tokio::task::spawn_blocking(move || {
        loop {
            match sub.recv() {
                Ok(env) => {
                    if let Err(e) = projections.apply(&env) {
                        tracing::warn!(
                            error = %e,
                            aggregate_type = env.aggregate_type(),
                            "projection apply failed"
                        );
                    }
                }
                Err(_) => break,
            }
        }
        tracing::debug!("projection subscriber stopped");
    });

    Ok(AppServices {
        workflows,
        jwt: Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes())),
        token_ttl: config.token_ttl,
        fonts: FontSource::new(config.font_dir.clone()),
    })
}
