//! Session and connection facade over relational database drivers.
//!
//! # Intention
//!
//! - Offer one synchronous API for parameterized execution, scalar retrieval,
//!   batches and explicit transactions, independent of the driver underneath.
//! - Ship a SQLite provider built on `rusqlite`.
//! - Resolve SQL text from embedded scripts, key/value bundles or files.
//!
//! # Architectural Boundaries
//!
//! - No pooling, retries or SQL parsing; driver errors pass through untouched.
//! - A [`Session`] owns at most one [`Connection`], opened on first use.

pub mod connection;
pub mod error;
pub mod parameter;
pub mod resource;
pub mod session;
pub mod sqlite;
pub mod value;
pub mod value_set;

pub use connection::{Connection, ConnectionFactory};
pub use error::{DbError, DbResult};
pub use parameter::{Parameter, ParameterSet};
pub use resource::{read_file, ResourceRegistry};
pub use session::Session;
pub use sqlite::{OpenMode, SqliteConfig, SqliteConnection, SqliteFactory};
pub use value::{DataType, FromValue, Value};
pub use value_set::{ValueSet, ValueSets};
