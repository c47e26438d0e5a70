mod binding;
mod bound;
mod error;
mod export;
mod keys;
mod schema;
mod table;

pub use binding::{Binding, FieldFn, KeyFn, KeyRemap, KeySpec};
pub use bound::BoundRecord;
pub use error::{BindingError, Result};
pub use export::{export, to_store_dict, ExportOptions};
pub use keys::{
    derive_hash_key, derive_key, derive_range_key, KeyVal, HASH_KEY_LABEL, RANGE_KEY_LABEL,
};
pub use schema::{assign, from_fields, from_object, to_fields, Schema};
pub use table::Table;
