//! SQL schemas for the Tremiti SQLite stores.
//!
//! Each store lives in its own database file and runs its schema once at
//! connection startup. Every statement is idempotent thanks to
//! `IF NOT EXISTS`; `PRAGMA user_version` gates future migrations.

/// Primary store. `(date, number)` uniqueness is the pipeline's only
/// deduplication authority.
pub const TICKETS_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tickets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier    INTEGER NOT NULL,
    date        TEXT NOT NULL,      -- YYYY-MM-DD
    number      TEXT NOT NULL,
    created_at  TEXT NOT NULL,      -- RFC 3339 UTC
    exemption   INTEGER CHECK (exemption IS NULL OR exemption BETWEEN 2 AND 12),
    checked_at  TEXT,
    controller  TEXT,
    UNIQUE (date, number)
);

PRAGMA user_version = 1;
";

/// Secondary store, keyed by the primary-assigned id.
pub const ITEMS_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS ticket_items (
    id          TEXT PRIMARY KEY,   -- primary store id, verbatim
    supplier    INTEGER NOT NULL,
    date        TEXT NOT NULL,
    number      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    exemption   INTEGER,
    uuid        TEXT NOT NULL,
    checked_at  TEXT,
    controller  TEXT
);

CREATE INDEX IF NOT EXISTS ticket_items_number_idx ON ticket_items(number);

PRAGMA user_version = 1;
";

/// Queue broker. All named queues share one table.
pub const QUEUE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS queue_messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id      TEXT NOT NULL UNIQUE,
    queue           TEXT NOT NULL,
    body            TEXT NOT NULL,
    sent_at_ms      INTEGER NOT NULL,
    visible_at_ms   INTEGER NOT NULL,  -- hidden until this instant
    receive_count   INTEGER NOT NULL DEFAULT 0,
    receipt_handle  TEXT UNIQUE        -- NULL until first received
);

CREATE INDEX IF NOT EXISTS queue_messages_visible_idx
    ON queue_messages(queue, visible_at_ms, seq);

PRAGMA user_version = 1;
";
