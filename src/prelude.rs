//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_dbio::prelude::*;
//! ```

pub use crate::config::{ConnectOptions, CredentialSource, StaticCredentials, UploadOptions};
pub use crate::error::{DbIoError, UploadError};
pub use crate::formatter::{LiteralStyle, format_rows};
pub use crate::results::{ResultSet, rows_to_text};
pub use crate::schema::ColumnSchema;
pub use crate::session::DbIo;
pub use crate::types::{DatabaseType, Row, RowSet, RowValues};
pub use crate::upload::UploadSummary;
