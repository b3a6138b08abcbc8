//! # opspulse
//!
//! A telemetry ingestion and retrieval engine. opspulse pulls
//! time-partitioned operational history (relational tables, flat log files,
//! CSV exports) into a normalized text corpus, embeds it, and upserts it
//! into a pgvector index; questions are answered by cosine similarity
//! search, degrading to a keyword ranker over a bounded recent-file window
//! whenever the vector path is disabled or failing.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌────────────┐
//! │   Sources     │──▶│     ETL      │──▶│  Postgres   │
//! │ SQL/logs/CSV  │   │ Norm + Embed │   │  pgvector   │
//! └───────────────┘   └──────────────┘   └─────┬──────┘
//!                                              │
//!                          ┌───────────────────┤
//!                          ▼                   ▼
//!                     ┌──────────┐       ┌──────────┐
//!                     │   CLI    │       │   HTTP    │
//!                     │(opspulse)│       │  (/qa)    │
//!                     └──────────┘       └──────────┘
//! ```
//!
//! The keyword fallback tier reads the CSV/log export directory directly,
//! so retrieval keeps answering while the store or the embedding provider
//! is down.
//!
//! ## Quick Start
//!
//! ```bash
//! opspulse init                 # bootstrap extension/table/index
//! opspulse etl                  # ingest the trailing window
//! opspulse ask "CPU usage high on svc1?"
//! opspulse serve                # start the HTTP surface
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`relational`] | SINGLE/RAC connection manager + per-date table lookup |
//! | [`connector_log`] | Flat log-file partitions |
//! | [`connector_csv`] | CSV export partitions |
//! | [`normalize`] | Row/line → normalized text |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | Vector store connection |
//! | [`store`] | Schema bootstrap, inserts, similarity search |
//! | [`etl`] | Day-window orchestration |
//! | [`keyword`] | Keyword fallback ranker |
//! | [`retrieve`] | Two-tier retrieval service |
//! | [`llm`] | Chat proxy client |
//! | [`server`] | HTTP surface |

pub mod config;
pub mod connector_csv;
pub mod connector_log;
pub mod db;
pub mod embedding;
pub mod error;
pub mod etl;
pub mod keyword;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod relational;
pub mod retrieve;
pub mod server;
pub mod sources;
pub mod store;
