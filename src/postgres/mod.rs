// PostgreSQL module - provides PostgreSQL-specific database functionality
//
// - config: pool manager and setup
// - query: text result sets from simple queries
// - executor: statement execution

pub mod config;
pub mod executor;
pub mod query;

pub use config::PgManager;
pub use executor::{execute_batch, execute_select, execute_statement};
pub use query::{build_result_set_from_messages, text_value};
