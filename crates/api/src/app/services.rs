//! Service wiring: ledger store selection and the realtime channel.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use depot_core::TenantId;
use depot_infra::{InMemoryLedgerStore, LedgerService, LedgerStore, PostgresLedgerStore, StoreError};

use crate::config::{ApiConfig, StoreConfig};

pub const TOPIC_MOVEMENT_RECORDED: &str = "inventory.movement_recorded";
pub const TOPIC_MOVEMENT_CANCELLED: &str = "inventory.movement_cancelled";

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: &'static str,
    pub payload: Value,
}

pub type DynLedgerStore = Arc<dyn LedgerStore>;

pub struct AppServices {
    ledger: LedgerService<DynLedgerStore>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new(store: DynLedgerStore, max_attempts: u32) -> Self {
        // Lossy: slow subscribers drop messages instead of blocking writers.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
        Self {
            ledger: LedgerService::new(store).with_max_attempts(max_attempts),
            realtime_tx,
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), depot_infra::DEFAULT_MAX_ATTEMPTS)
    }

    pub fn ledger(&self) -> &LedgerService<DynLedgerStore> {
        &self.ledger
    }

    /// Publish after a commit. No subscribers is not an error.
    pub fn publish(&self, tenant_id: TenantId, topic: &'static str, payload: Value) {
        let _ = self.realtime_tx.send(RealtimeMessage {
            tenant_id,
            topic,
            payload,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.realtime_tx.subscribe()
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: DynLedgerStore = match &config.store {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
        StoreConfig::Postgres { database_url } => {
            tracing::info!("using postgres ledger store");
            Arc::new(PostgresLedgerStore::connect(database_url).await?)
        }
    };
    Ok(AppServices::new(store, config.ledger_max_attempts))
}

/// Tenant-filtered SSE stream over the realtime channel.
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        // Lagged receivers skip what they missed.
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn published_messages_reach_subscribers() {
        let services = AppServices::in_memory();
        let mut rx = services.subscribe();
        let tenant = TenantId::new();

        services.publish(tenant, TOPIC_MOVEMENT_RECORDED, json!({"n": 1}));

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.tenant_id, tenant);
        assert_eq!(msg.topic, TOPIC_MOVEMENT_RECORDED);
    }
}
