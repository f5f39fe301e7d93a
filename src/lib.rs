//! Encrypted, local-first storage and state for a personal life journal.
//!
//! Lifelog keeps voice, video, photo, and text recordings that answer
//! reflective questions, plus free-form journal entries. Content is sealed with
//! a passphrase-derived key before it touches disk, every write lands locally
//! first, and a background sync pass reconciles with a remote backend when one
//! is configured.
//!
//! | Entity | Encrypted fields | Queried by |
//! |--------|------------------|------------|
//! | **Recording** | content, transcription | question, category, media type, date |
//! | **Journal entry** | body | date, tag, mood |
//! | **Settings** | none | singleton row |
//! | **Question** | none | category |
//!
//! # Architecture
//!
//! - **Storage**: SQLite through `rusqlite`, one connection behind the blocking pool
//! - **Encryption**: AES-256-GCM content keys derived with Argon2id
//! - **Reactivity**: per-table broadcast topics feeding [`store::query::LiveQuery`]
//! - **State**: a reducer-driven [`state::StateStore`] with synchronous listeners
//! - **Sync**: an outbox of local mutations pushed through a [`sync::SyncClient`]
//!
//! # Modules
//!
//! - [`app`] — Application context wiring the store, state, and sync together
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`crypto`] — Key derivation, sealing, and the in-memory key holder
//! - [`db`] — SQLite initialization, schema, migrations, and health checks
//! - [`error`] — Error types shared by the store and state layers
//! - [`state`] — App State Store: actions, reducer, and subscriptions
//! - [`store`] — Local store: recordings, entries, questions, settings, live queries
//! - [`sync`] — Sync client boundary, HTTP transport, and the sync pass

pub mod app;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod state;
pub mod store;
pub mod sync;
