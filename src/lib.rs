//! # sqlmorph
//!
//! Rule-based SQL dialect conversion between MySQL, PostgreSQL, Oracle and
//! Tibero.
//!
//! Conversion is text-to-text: statements are classified, run through a
//! fixed pipeline of feature converters and pattern rewrites, and returned
//! with the warnings and rule descriptions collected along the way.
//!
//! ## Quick Example
//!
//! ```
//! use sqlmorph::prelude::*;
//!
//! let result = sqlmorph::convert(
//!     "SELECT DECODE(status, 'A', 'Active', 'Inactive') FROM users",
//!     Dialect::Oracle,
//!     Dialect::PostgreSql,
//!     &ConversionOptions::default(),
//! );
//! assert_eq!(
//!     result.converted_sql,
//!     "SELECT CASE WHEN status = 'A' THEN 'Active' ELSE 'Inactive' END FROM users"
//! );
//! ```
//!
//! ## Pipeline
//!
//! | Stage       | Module                 |
//! |-------------|------------------------|
//! | split       | [`stream`]             |
//! | classify    | [`dispatcher`]         |
//! | CONNECT BY  | [`hierarchy`]          |
//! | MERGE       | [`merge`]              |
//! | sequences   | [`sequence`]           |
//! | types       | [`datatype`]           |
//! | rewrites    | [`rewrite`]            |

pub mod config;
pub mod datatype;
pub mod datefmt;
pub mod dialect;
pub mod dispatcher;
pub mod error;
pub mod hierarchy;
pub mod merge;
pub mod parser;
pub mod result;
pub mod rewrite;
pub mod scan;
pub mod sequence;
pub mod stream;

pub use dialect::Dialect;
pub use dispatcher::convert;
pub use result::{ConversionOptions, ConversionResult};

pub mod prelude {
    pub use crate::config::{BatchConfig, Config};
    pub use crate::dialect::{Dialect, DialectPair};
    pub use crate::dispatcher::{Dispatcher, StatementKind};
    pub use crate::error::*;
    pub use crate::result::{ConversionOptions, ConversionResult, ConversionWarning, Severity, WarningKind};
    pub use crate::stream::{ProcessingResult, StreamProcessor};
}
