//! # Airflow Docs
//!
//! One searchable full-text index over two documentation corpora: the
//! Apache Airflow core docs (reStructuredText, `apache/airflow`) and the
//! Python client docs (Markdown, `apache/airflow-client-python`).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Sources    │──▶│  Parsers     │──▶│   SQLite    │
//! │ sparse git  │   │  RST / MD    │   │ docs + FTS5 │
//! └─────────────┘   └─────────────┘   └──────┬──────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌───────────┐
//!                 │   CLI    │        │ HTTP/MCP  │
//!                 └──────────┘        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! airflow-docs index                    # fetch and index both sources
//! airflow-docs search "task groups"
//! airflow-docs get core core-concepts/dags.rst
//! airflow-docs serve                    # HTTP tools + MCP at /mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`models`] | Document, search result and statistics types |
//! | [`error`] | Error taxonomy of the core |
//! | [`sources`] | Source registry |
//! | [`parser`] | RST and Markdown extraction |
//! | [`fetch`] | Sparse shallow git fetch and local checkouts |
//! | [`ingest`] | Indexing orchestrator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and versioning |
//! | [`store`] | Upsert, search, sections, statistics, clear |
//! | [`search`] | Query sanitisation and the search command |
//! | [`get`] | Document lookup |
//! | [`stats`] | Statistics and sections |
//! | [`tools`] | Agent-facing tools and their registry |
//! | [`server`] | HTTP server and MCP transports |
//! | [`mcp`] | MCP protocol bridge |

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod get;
pub mod ingest;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod search;
pub mod server;
pub mod sources;
pub mod stats;
pub mod store;
pub mod tools;
