//! In-memory doubles for pipeline unit tests.

use std::{
  collections::BTreeMap,
  sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tremiti_core::{
  archive::ArchiveKey,
  queue::{QueueMessage, ReceiptHandle, TicketQueue},
  store::{ArchiveStore, Insertion, PrimaryStore, PutOutcome, SecondaryStore},
  ticket::{NewTicket, SupplierId, TicketId, TicketItem},
};
use uuid::Uuid;

use crate::suppliers::{SupplierDirectory, SupplierEntry};

/// NLG is supplier 1 (`nlg-secret`), Alidaunia supplier 2.
pub fn directory() -> SupplierDirectory {
  SupplierDirectory::from_entries([
    SupplierEntry {
      name:         "nlg".into(),
      id:           SupplierId(1),
      token_sha256: SupplierDirectory::hash_token("nlg-secret"),
    },
    SupplierEntry {
      name:         "alidaunia".into(),
      id:           SupplierId(2),
      token_sha256: SupplierDirectory::hash_token("alidaunia-secret"),
    },
  ])
  .unwrap()
}

#[derive(Debug, Error)]
#[error("{0} unavailable")]
pub struct Unavailable(pub String);

struct Stored {
  message_id:    String,
  body:          String,
  receipt:       Option<String>,
  receive_count: u32,
}

/// A queue without visibility timeout: received messages stay hidden until
/// deleted or [`MemoryQueue::release_all`] is called.
pub struct MemoryQueue {
  name:          String,
  messages:      Mutex<Vec<Stored>>,
  fail_send:     AtomicBool,
  fail_delete:   AtomicBool,
  fail_receive:  AtomicBool,
}

impl MemoryQueue {
  pub fn new(name: &str) -> Self {
    Self {
      name:         name.into(),
      messages:     Mutex::new(Vec::new()),
      fail_send:    AtomicBool::new(false),
      fail_delete:  AtomicBool::new(false),
      fail_receive: AtomicBool::new(false),
    }
  }

  /// A queue whose `send` always fails.
  pub fn failing(name: &str) -> Self {
    let q = Self::new(name);
    q.fail_send.store(true, Ordering::SeqCst);
    q
  }

  pub fn fail_deletes(&self) { self.fail_delete.store(true, Ordering::SeqCst); }

  pub fn fail_receives(&self) { self.fail_receive.store(true, Ordering::SeqCst); }

  /// Bodies of every message still on the queue, in send order.
  pub fn bodies(&self) -> Vec<String> {
    self.messages.lock().unwrap().iter().map(|m| m.body.clone()).collect()
  }

  pub fn len(&self) -> usize { self.messages.lock().unwrap().len() }

  /// Make in-flight messages visible again.
  pub fn release_all(&self) {
    for m in self.messages.lock().unwrap().iter_mut() {
      m.receipt = None;
    }
  }
}

impl TicketQueue for MemoryQueue {
  type Error = Unavailable;

  fn name(&self) -> &str { &self.name }

  async fn send(&self, body: String) -> Result<String, Unavailable> {
    if self.fail_send.load(Ordering::SeqCst) {
      return Err(Unavailable(self.name.clone()));
    }
    let message_id = Uuid::new_v4().to_string();
    self.messages.lock().unwrap().push(Stored {
      message_id:    message_id.clone(),
      body,
      receipt:       None,
      receive_count: 0,
    });
    Ok(message_id)
  }

  async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>, Unavailable> {
    if self.fail_receive.load(Ordering::SeqCst) {
      return Err(Unavailable(self.name.clone()));
    }
    let mut messages = self.messages.lock().unwrap();
    Ok(
      messages
        .iter_mut()
        .filter(|m| m.receipt.is_none())
        .take(max_messages)
        .map(|m| {
          let receipt = Uuid::new_v4().to_string();
          m.receipt = Some(receipt.clone());
          m.receive_count += 1;
          QueueMessage {
            message_id:    m.message_id.clone(),
            receipt:       ReceiptHandle::new(receipt),
            body:          m.body.clone(),
            receive_count: m.receive_count,
          }
        })
        .collect(),
    )
  }

  async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), Unavailable> {
    if self.fail_delete.load(Ordering::SeqCst) {
      return Err(Unavailable(self.name.clone()));
    }
    self
      .messages
      .lock()
      .unwrap()
      .retain(|m| m.receipt.as_deref() != Some(receipt.as_str()));
    Ok(())
  }
}

/// Archive double that can be switched into failure.
#[derive(Default)]
pub struct MemoryArchive {
  objects: Mutex<BTreeMap<String, Vec<u8>>>,
  down:    AtomicBool,
}

impl MemoryArchive {
  pub fn set_down(&self, down: bool) { self.down.store(down, Ordering::SeqCst); }

  pub fn keys(&self) -> Vec<String> { self.objects.lock().unwrap().keys().cloned().collect() }

  pub fn object(&self, key: &str) -> Option<Vec<u8>> {
    self.objects.lock().unwrap().get(key).cloned()
  }
}

impl ArchiveStore for MemoryArchive {
  type Error = Unavailable;

  async fn put_new(&self, key: &ArchiveKey, body: Vec<u8>) -> Result<(), Unavailable> {
    if self.down.load(Ordering::SeqCst) {
      return Err(Unavailable("archive".into()));
    }
    let mut objects = self.objects.lock().unwrap();
    if objects.contains_key(key.as_str()) {
      return Err(Unavailable(format!("archive key {key} already exists")));
    }
    objects.insert(key.as_str().to_owned(), body);
    Ok(())
  }
}

/// Primary store double for the consumer's fatal paths.
pub enum BrokenPrimary {
  /// Every call fails.
  Down,
  /// Inserts report a duplicate that `find_id` then cannot see.
  LostDuplicate,
}

impl PrimaryStore for BrokenPrimary {
  type Error = Unavailable;

  async fn insert_ticket(&self, _ticket: &NewTicket) -> Result<Insertion, Unavailable> {
    match self {
      Self::Down => Err(Unavailable("primary store".into())),
      Self::LostDuplicate => Ok(Insertion::Duplicate),
    }
  }

  async fn find_id(&self, _date: NaiveDate, _number: &str) -> Result<Option<TicketId>, Unavailable> {
    match self {
      Self::Down => Err(Unavailable("primary store".into())),
      Self::LostDuplicate => Ok(None),
    }
  }

  async fn check_in(
    &self,
    _id: &TicketId,
    _controller: &str,
    _at: DateTime<Utc>,
  ) -> Result<bool, Unavailable> {
    Err(Unavailable("primary store".into()))
  }
}

/// Secondary store whose every call fails.
pub struct DownSecondary;

impl SecondaryStore for DownSecondary {
  type Error = Unavailable;

  async fn put_if_absent(&self, _item: &TicketItem) -> Result<PutOutcome, Unavailable> {
    Err(Unavailable("secondary store".into()))
  }

  async fn get(&self, _id: &TicketId) -> Result<Option<TicketItem>, Unavailable> {
    Err(Unavailable("secondary store".into()))
  }

  async fn find_by_number(&self, _number: &str) -> Result<Vec<TicketItem>, Unavailable> {
    Err(Unavailable("secondary store".into()))
  }

  async fn check_in(
    &self,
    _id: &TicketId,
    _controller: &str,
    _at: DateTime<Utc>,
  ) -> Result<Option<TicketItem>, Unavailable> {
    Err(Unavailable("secondary store".into()))
  }
}
