// SQLite module - provides SQLite-specific database functionality
//
// - config: pool manager and setup
// - query: result extraction
// - executor: statement execution on the blocking pool

pub mod config;
pub mod executor;
pub mod query;

pub use config::{SharedSqliteConnection, SqliteManager};
pub use executor::{execute_batch, execute_select, execute_statement};
pub use query::build_result_set;
