//! Background consumer loop.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tremiti_core::{
  queue::TicketQueue,
  store::{ArchiveStore, PrimaryStore, SecondaryStore},
};
use tremiti_ingest::Consumer;

/// Poll `queue` until `shutdown` flips to `true` (or its sender is dropped).
///
/// A full batch is followed immediately by the next receive; otherwise the
/// loop waits `poll_interval`. A batch in progress is always finished before
/// the loop observes shutdown.
pub async fn run_consumer<Q, P, S, A>(
  consumer: Arc<Consumer<P, S, A>>,
  queue: Arc<Q>,
  batch_size: usize,
  poll_interval: Duration,
  mut shutdown: watch::Receiver<bool>,
) where
  Q: TicketQueue,
  P: PrimaryStore,
  S: SecondaryStore,
  A: ArchiveStore,
{
  tracing::info!(queue = queue.name(), batch_size, "consumer started");

  loop {
    if *shutdown.borrow() {
      break;
    }

    match queue.receive(batch_size).await {
      Ok(batch) if batch.is_empty() => {}
      Ok(batch) => {
        let full = batch.len() == batch_size;
        consumer.process_batch(queue.as_ref(), batch).await;
        if full {
          continue;
        }
      }
      Err(e) => {
        tracing::error!(queue = queue.name(), error = %e, "receive failed");
      }
    }

    tokio::select! {
      () = tokio::time::sleep(poll_interval) => {}
      changed = shutdown.changed() => {
        if changed.is_err() {
          break;
        }
      }
    }
  }

  tracing::info!(queue = queue.name(), "consumer stopped");
}
