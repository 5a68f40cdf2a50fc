//! # Portfolio Chat
//!
//! A retrieval-augmented chatbot that answers questions about one person's
//! professional profile.
//!
//! A plain-text profile is cleaned, split into overlapping chunks, embedded
//! and stored in a small on-disk vector index. At question time the nearest
//! chunks are retrieved, placed into a fixed prompt template, and handed to
//! a generation backend (a local model runtime or a hosted chat API).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Preprocess │──▶│ Chunk+Embed │──▶│ Vector Index │
//! └────────────┘   └─────────────┘   └──────┬───────┘
//!                                           │
//!        question ──▶ Retriever ◀───────────┘
//!                        │
//!                        ▼
//!                 Prompt Assembler ──▶ Generator ──▶ reply
//!                                     (local / remote / fallback)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio clean "Full database.txt"             # writes Full_database_cleaned.txt
//! folio index build --input Full_database_cleaned.txt
//! folio ask "Which Python projects are listed?"
//! folio serve                                 # POST /api/chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Core data types |
//! | [`preprocess`] | Corpus cleaner |
//! | [`chunk`] | Recursive character text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index |
//! | [`retrieve`] | Nearest-chunk retrieval |
//! | [`prompt`] | Prompt template |
//! | [`generate`] | Local, remote and fallback generation backends |
//! | [`chat`] | Retrieve → prompt → generate pipeline |
//! | [`suggest`] | Keyword download suggestions |
//! | [`server`] | HTTP chat server |
//! | [`download`] | Model downloader |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod download;
pub mod embedding;
pub mod generate;
pub mod index;
pub mod models;
pub mod preprocess;
pub mod prompt;
pub mod retrieve;
pub mod server;
pub mod suggest;
