//! # Manual QA
//!
//! Retrieval-augmented question answering over PDF technical manuals.
//!
//! Manual QA ingests text extracted from equipment manuals, chunks it along
//! markdown heading boundaries, attributes a source page to every chunk,
//! embeds and indexes the chunks, and answers natural-language questions
//! through a classify → retrieve → prompt → generate pipeline with canned
//! fallbacks for out-of-scope questions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Extracted    │──▶│ Chunk + Page │──▶│  SQLite   │
//! │ manual text  │   │   + Embed    │   │  vectors  │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!  question ─▶ classify ─▶ retrieve ─▶ prompt ─▶ generate ─▶ answer
//!                  │
//!                  └─▶ canned response (greeting / general chat /
//!                      unknown manual / nothing retrieved)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mqa init                      # create the index database
//! mqa ingest ./manuals          # ingest extracted manual text
//! mqa catalog                   # list known manuals
//! mqa ask "Bobcat-T590 엔진 오일 교체 주기는?"
//! mqa serve                     # start the HTTP query server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Heading-aware text chunking |
//! | [`page`] | Best-effort page attribution |
//! | [`catalog`] | Known-manual catalog snapshot |
//! | [`classify`] | Query intent classification |
//! | [`prompt`] | Instruction templates and prompt assembly |
//! | [`embedding`] | Embedding service clients |
//! | [`completion`] | Text-completion service clients |
//! | [`index`] | Vector index backends (SQLite, in-memory) |
//! | [`pipeline`] | Query orchestration state machine |
//! | [`ingest`] | Manual ingestion pipeline |
//! | [`server`] | HTTP query server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod catalog;
pub mod chunk;
pub mod classify;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod page;
pub mod pipeline;
pub mod prompt;
pub mod server;
pub mod traits;
