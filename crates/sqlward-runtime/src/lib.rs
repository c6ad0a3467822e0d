//! # sqlward-runtime
//!
//! The query execution pipeline and its building blocks:
//!
//! - [`AdmissionPool`]: fixed-capacity, cancellable execution slots
//! - [`TimeoutSelector`], [`Sanitizer`], [`DiagnosticMatcher`]: compiled rule sets
//! - [`NativeValue`] and [`normalize`]: database values to JSON
//! - [`Backend`] / [`Transaction`]: the seam a database adapter implements
//! - [`Pipeline`]: composes all of the above with the policy engine and
//!   guardrail chain

pub mod admission;
pub mod backend;
pub mod diagnostics;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod sanitize;
pub mod timeout;
pub mod value;

pub use admission::{AdmissionError, AdmissionPool, AdmissionSlot};
pub use backend::{Backend, ColumnInfo, Execution, TableInfo, TableSchema, Transaction, TxOptions};
pub use diagnostics::DiagnosticMatcher;
pub use error::ExecuteError;
pub use normalize::normalize;
pub use pipeline::{Pipeline, TRUNCATION_SUFFIX};
pub use sanitize::Sanitizer;
pub use timeout::TimeoutSelector;
pub use value::{Date, Inet, Interval, NativeValue, Numeric, Point, Range, RangeBound, Timestamp};
