mod condition;
mod error;
mod pagination;
mod traits;
mod types;

pub use condition::{compare_values, Comparator, Condition, UpdateAction};
pub use error::{Result, StoreError};
pub use pagination::{collect_items, count_items, PageFuture, Pagination};
pub use traits::ItemStore;
pub use types::{
    display_value, Attributes, CountOptions, GetOptions, ItemKey, KeySchema, Page, PageRequest,
    QueryOptions, ScanOptions, StoreItem,
};
