//! Domain layer for the object index
//!
//! # Domain Models
//!
//! - `IndexValue` / `ObjectIndexType`: typed scalar stored in an index column
//! - `ObjectMetadata` / `ObjectIndexMetadata`: declared index schema of an object type
//! - `ObjectIndex`: one `(name, value)` constraint or assignment
//! - `FindOptions` / `OrderOptions`: flat query options
//!
//! # Port Trait
//!
//! - `IndexProvider`: backing-store abstraction

pub mod models;
pub mod ports;
pub mod value;

pub use models::{
    FindLogic, FindOperator, FindOptions, IndexRow, ObjectIndex, ObjectIndexMetadata, ObjectMetadata,
    ObjectNaming, OrderOptions, PersistentObject, DEFAULT_STRING_PRECISION, ID_COLUMN,
};
pub use ports::{IndexProvider, IterateOptions, RowStream};
pub use value::{fit_decimal, IndexValue, ObjectIndexType, DATETIME_FORMAT, MAX_DECIMAL_PRECISION};
