//! Core of the boundrecord project.
//!
//! - [`store`]: the item store seam ([`store::ItemStore`]) and its vocabulary:
//!   keys, items, conditions, update actions, options and pagination.
//! - [`record`]: binding serde records to store items ([`record::Table`],
//!   [`record::BoundRecord`]).

pub mod record;
pub mod store;
