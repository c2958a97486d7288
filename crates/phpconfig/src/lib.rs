//! # phpconfig
//!
//! Read, merge and rewrite PHP associative-array configuration files such
//! as ownCloud's `config/config.php`.
//!
//! ## Example
//!
//! ```no_run
//! use phpconfig::{ConfigFile, Value};
//! use std::collections::BTreeMap;
//!
//! let mut config = ConfigFile::parse("/var/www/owncloud/config/config.php")?;
//!
//! let mut desired = BTreeMap::new();
//! desired.insert("dbhost".to_string(), Value::from("localhost"));
//! desired.insert("dbtype".to_string(), Value::from("sqlite"));
//!
//! // keys not in `desired` are kept; an on-disk `sqlite3` driver survives
//! let changed = config.merge(&desired);
//! if !changed.is_empty() {
//!     config.write()?;
//! }
//!
//! let salt = config.get("passwordsalt").and_then(Value::as_str);
//! # let _ = salt;
//! # Ok::<(), phpconfig::Error>(())
//! ```

mod config;
pub mod error;
pub mod parser;
mod value;
pub mod writer;

pub use config::{ConfigFile, DEFAULT_VARIABLE, DRIVER_KEY, is_generic_driver_alias};
pub use error::{Error, Result};
pub use value::Value;
