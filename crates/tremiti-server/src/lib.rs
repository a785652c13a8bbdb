//! Composition root for the Tremiti ingestion server.
//!
//! [`Services::open`] turns a [`ServerConfig`] into live backends and the
//! pipeline components wired over them; `main` serves the HTTP API, runs the
//! consumer loop, and closes everything on shutdown.

pub mod config;
pub mod error;
pub mod worker;

pub use config::{QueueConfig, ServerConfig};
pub use error::{Error, Result};

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tremiti_api::AppState;
use tremiti_archive_fs::FsArchive;
use tremiti_ingest::{
  Consumer, DeadLetterReplay, Gateway, RecoveryReprocessor, SupplierDirectory, TicketDesk,
};
use tremiti_store_sqlite::{
  QueueSettings, RedrivePolicy, SqliteItemStore, SqliteQueue, SqliteQueueBroker,
  SqliteTicketStore,
};

pub type TicketConsumer = Consumer<SqliteTicketStore, SqliteItemStore, FsArchive>;
pub type ApiState = AppState<SqliteQueue, SqliteTicketStore, SqliteItemStore>;

/// Every long-lived resource the server owns.
pub struct Services {
  pub primary:  Option<Arc<SqliteTicketStore>>,
  pub items:    Arc<SqliteItemStore>,
  pub broker:   SqliteQueueBroker,
  pub main:     Arc<SqliteQueue>,
  pub consumer: Arc<TicketConsumer>,
  pub state:    ApiState,
}

impl Services {
  pub async fn open(cfg: &ServerConfig) -> Result<Self> {
    let suppliers = Arc::new(SupplierDirectory::from_entries(cfg.suppliers.iter().cloned())?);
    if suppliers.is_empty() {
      tracing::warn!("no suppliers configured; every submission will be rejected");
    }

    let primary = match &cfg.primary_store_path {
      Some(path) => Some(Arc::new(SqliteTicketStore::open(path).await?)),
      None => {
        tracing::warn!("no primary store configured; ticket ids will be generated locally");
        None
      }
    };
    let items = Arc::new(SqliteItemStore::open(&cfg.item_store_path).await?);
    let archive = Arc::new(FsArchive::open(&cfg.archive_root).await?);
    let broker = SqliteQueueBroker::open(&cfg.queue_path).await?;

    let q = &cfg.queues;
    let main = Arc::new(broker.queue(&q.main, QueueSettings {
      visibility_timeout: q.visibility_timeout(),
      redrive:            Some(RedrivePolicy {
        dead_letter_queue: q.dead_letter.clone(),
        max_receive_count: q.max_receive_count,
      }),
    }));
    let plain = QueueSettings { visibility_timeout: q.visibility_timeout(), redrive: None };
    let recovery = Arc::new(broker.queue(&q.recovery, plain.clone()));
    let dead_letter = Arc::new(broker.queue(&q.dead_letter, plain));

    let consumer = Arc::new(Consumer::new(
      primary.clone(),
      items.clone(),
      archive,
      q.max_receive_count,
    ));

    let state = AppState {
      gateway:   Gateway::new(suppliers, main.clone(), Some(recovery.clone())),
      desk:      TicketDesk::new(primary.clone(), items.clone()),
      replay:    Arc::new(DeadLetterReplay::new(dead_letter, main.clone(), q.batch_size)),
      reprocess: Arc::new(RecoveryReprocessor::new(recovery, main.clone(), q.batch_size)),
    };

    Ok(Self { primary, items, broker, main, consumer, state })
  }

  /// The HTTP application with request tracing.
  pub fn router(&self) -> Router {
    tremiti_api::api_router(self.state.clone()).layer(TraceLayer::new_for_http())
  }

  /// Close every connection. Call after the HTTP server and the consumer loop
  /// have stopped.
  pub async fn close(self) -> Result<()> {
    let Self { primary, items, broker, .. } = self;
    broker.close().await?;
    Arc::unwrap_or_clone(items).close().await?;
    if let Some(primary) = primary {
      Arc::unwrap_or_clone(primary).close().await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use tremiti_core::queue::TicketQueue;

  use super::*;

  fn config(dir: &std::path::Path, with_primary: bool) -> ServerConfig {
    let primary = if with_primary {
      format!("primary_store_path = {:?}\n", dir.join("primary.db"))
    } else {
      "allow_degraded_ids = true\n".to_owned()
    };
    ServerConfig::from_toml(&format!(
      r#"{primary}
      item_store_path = {:?}
      queue_path      = {:?}
      archive_root    = {:?}

      [[suppliers]]
      name         = "nlg"
      id           = 1
      token_sha256 = "{}"
      "#,
      dir.join("items.db"),
      dir.join("queues.db"),
      dir.join("archive"),
      SupplierDirectory::hash_token("nlg-secret"),
    ))
    .unwrap()
  }

  async fn call(app: Router, uri: &str, auth: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
      .method("POST")
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let resp = app.oneshot(builder.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  #[tokio::test]
  async fn submit_consume_lookup_check_in() {
    let dir = tempfile::tempdir().unwrap();
    let services = Services::open(&config(dir.path(), true)).await.unwrap();

    let (status, _) = call(
      services.router(),
      "/tickets",
      Some("Bearer nlg-secret"),
      json!({"date": "2025-06-15", "number": "TEST000123", "exemption": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let batch = services.main.receive(10).await.unwrap();
    let report = services.consumer.process_batch(services.main.as_ref(), batch).await;
    assert_eq!(report.committed.len(), 1);
    let id = report.committed[0].ticket_id.clone();

    let archived = dir.path().join("archive").join(report.committed[0].archive_key.as_str());
    assert!(archived.exists());

    let (status, body) =
      call(services.router(), "/tickets/lookup", None, json!({"number": "TEST000123"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(id.as_str()));
    assert_eq!(body["exemption"], json!(7));

    let (status, body) = call(
      services.router(),
      "/tickets/check-in",
      None,
      json!({"ticketId": id.as_str(), "controller": "ctrl-7"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["controller"], json!("ctrl-7"));

    services.close().await.unwrap();
  }

  #[tokio::test]
  async fn degraded_mode_commits_without_primary() {
    let dir = tempfile::tempdir().unwrap();
    let services = Services::open(&config(dir.path(), false)).await.unwrap();
    assert!(services.primary.is_none());

    services
      .main
      .send(r#"{"date":"2025-06-15","number":"D1","supplier":1,"created_at":"2025-06-15T08:00:00Z"}"#.into())
      .await
      .unwrap();
    let batch = services.main.receive(10).await.unwrap();
    let report = services.consumer.process_batch(services.main.as_ref(), batch).await;
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].id_source, tremiti_ingest::IdSource::Degraded);

    services.close().await.unwrap();
  }

  #[tokio::test]
  async fn queues_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), true);

    let services = Services::open(&cfg).await.unwrap();
    let (status, _) = call(
      services.router(),
      "/tickets",
      Some("nlg-secret"),
      json!({"date": "2025-06-15", "number": "R1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    services.close().await.unwrap();

    let services = Services::open(&cfg).await.unwrap();
    assert_eq!(services.main.receive(10).await.unwrap().len(), 1);
    services.close().await.unwrap();
  }
}
