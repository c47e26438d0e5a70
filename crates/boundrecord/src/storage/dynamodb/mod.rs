//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the `ItemStore`
//! trait using `aws-sdk-dynamodb`. One store instance maps to one table.

mod conversions;
mod error;
mod expressions;
mod store;

pub use expressions::ExpressionBuilder;
pub use store::DynamoDbStore;
