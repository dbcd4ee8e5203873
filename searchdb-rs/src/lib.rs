//! searchdb - An embeddable inverted-index search database.
//!
//! # Overview
//!
//! searchdb indexes named documents and answers queries written in a small
//! boolean language:
//! - Words and prefixes (`appl`), quoted literals (`"apple pie"`)
//! - `and`, `or`, `not`/`-` and parenthesized groups, with implicit `and`
//! - Property comparisons (`price<20`, `sector=tech`, `name:smi`, `listed>=2020-01-01`)
//! - Function calls resolved by registered handlers (`len(name)>5`)
//!
//! Queries can be evaluated synchronously or posted to a worker pool and
//! polled by handle.
//!
//! # Example
//!
//! ```
//! use searchdb::{DatabaseFlags, SearchDatabase};
//!
//! let db = SearchDatabase::new(DatabaseFlags::SKIP_COMMON_WORDS);
//! let apple = db.add_document("AAPL.US");
//! db.index_text(apple, "Apple Inc designs consumer electronics", true);
//! db.index_property(apple, "sector", "Technology", true);
//! db.index_property(apple, "price", 189.5, true);
//!
//! let results = db.query_sync("electronic sector=tech -price>500").unwrap();
//! assert_eq!(results.len(), 1);
//! assert_eq!(db.document_name(results[0].id).as_deref(), Some("AAPL.US"));
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod query;
pub mod types;

// Re-export main types at crate root
pub use config::Config;
pub use database::{DatabaseFlags, DatabaseStats, FunctionCall, SearchDatabase, SearchFunction};
pub use error::{QueryError, QueryErrorKind, Result, SearchError};
pub use query::SearchQuery;
pub use types::*;
