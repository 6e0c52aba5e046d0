//! # Ruling RAG
//!
//! Retrieval-augmented question answering over a fixed corpus of tax-ruling
//! letters.
//!
//! A question is matched against the corpus with a character n-gram TF-IDF
//! index, the best passage of each top document is assembled into a bounded
//! context, and a single local generation backend writes a grounded answer
//! with citations. The backend only ever sees one request at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐   ┌───────────┐
//! │ Snapshot │──▶│ CorpusIndex │──▶│ Retrieval │──▶│ RagService│
//! │  (JSON)  │   │ (TF-IDF)    │   │ 2-stage   │   │           │
//! └──────────┘   └─────────────┘   └───────────┘   └─────┬─────┘
//!                                                         │
//!                      ┌──────────────┬───────────────────┤
//!                      ▼              ▼                   ▼
//!                ┌──────────┐   ┌───────────┐      ┌────────────┐
//!                │ History  │   │  Gateway  │─────▶│  Ollama    │
//!                │  (JSON)  │   │ queue + 1 │      │  backend   │
//!                └──────────┘   └───────────┘      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rrag index                           # build the index cache
//! rrag search "ภาษีมูลค่าเพิ่ม ส่งออก"
//! rrag ask "การส่งออกสินค้าต้องเสีย VAT หรือไม่"
//! rrag serve                           # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`corpus`] | Snapshot parsing and identifier extraction |
//! | [`vectorizer`] | Character n-gram TF-IDF |
//! | [`index`] | Corpus index and its cache |
//! | [`chunk`] | Overlapping window splitter |
//! | [`retrieval`] | Two-stage ranking and context assembly |
//! | [`backend`] | Generation backend abstraction |
//! | [`gateway`] | Serialized access to the backend |
//! | [`domain`] | Keyword domain tagging |
//! | [`prompt`] | Prompt construction and answer cleanup |
//! | [`history`] | Bounded question/answer log |
//! | [`rag`] | Orchestrator |
//! | [`server`] | HTTP server |

pub mod atomic;
pub mod backend;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod history;
pub mod index;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod rag;
pub mod retrieval;
pub mod server;
pub mod vectorizer;
