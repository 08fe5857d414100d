//! Core library: incremental indexer, symbol store, hybrid search engine,
//! edit engine, and unified context graph behind a set of small traits
//! (`FileSystemPort`, `Tokenizer`, `EmbeddingProvider`) so the server and
//! CLI crates can swap implementations in tests.

pub mod budget;
pub mod config;
pub mod conventions;
pub mod depgraph;
pub mod edit;
pub mod error;
pub mod fs;
pub mod fuzzy;
pub mod indexer;
pub mod model;
pub mod parser;
pub mod path;
pub mod resolver;
pub mod search;
pub mod skeleton;
pub mod store;
pub mod symbol;
pub mod tokenizer;
pub mod trigram;
pub mod ucg;
pub mod vector;

pub use config::Config;
pub use depgraph::DependencyGraph;
pub use edit::{EditCoordinator, EditRequest, EditResolver, Editor, History, ResolveOptions};
pub use error::{CoreError, CoreResult, ErrorCode, Suggestion};
pub use fs::{FileSystemPort, RealFs};
pub use indexer::{Indexer, InvalidationEvent};
pub use search::{SearchEngine, SearchHit, SearchResponse};
pub use store::SymbolStore;
pub use trigram::TrigramIndex;
pub use ucg::UnifiedContextGraph;
pub use vector::VectorIndexManager;
