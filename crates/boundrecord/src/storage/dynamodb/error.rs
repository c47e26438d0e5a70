//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `boundrecord_core::store`.
//! A missing item is never an SDK error; `get_item` reports it as
//! `StoreError::NotFound` itself.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::operation::update_time_to_live::UpdateTimeToLiveError;
use boundrecord_core::store::StoreError;

const THROUGHPUT_EXCEEDED: &str = "Throughput exceeded, please retry";
const REQUEST_LIMIT_EXCEEDED: &str = "Request limit exceeded, please retry";
const INTERNAL_SERVER_ERROR: &str = "DynamoDB internal server error";
const CONDITION_FAILED: &str = "The conditional request failed";

/// Requests that never got a response.
fn transport_error<E, R>(err: &SdkError<E, R>) -> Option<StoreError> {
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(StoreError::ConnectionFailed(err.to_string()))
        }
        _ => None,
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        GetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        GetItemError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        GetItemError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        QueryError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        QueryError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        QueryError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("Query failed: {:?}", err)),
    }
}

/// Map a Scan SDK error to StoreError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        ScanError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        ScanError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        ScanError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("Scan failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => {
            StoreError::ConditionFailed(CONDITION_FAILED.to_string())
        }
        PutItemError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        PutItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        PutItemError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::QueryFailed("Item collection size limit exceeded".to_string())
        }
        PutItemError::TransactionConflictException(_) => {
            StoreError::QueryFailed("Transaction conflict, please retry".to_string())
        }
        PutItemError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("PutItem failed: {:?}", err)),
    }
}

/// Map an UpdateItem SDK error to StoreError.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => {
            StoreError::ConditionFailed(CONDITION_FAILED.to_string())
        }
        UpdateItemError::ResourceNotFoundException(_) => {
            StoreError::TableNotFound(table.to_string())
        }
        UpdateItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        UpdateItemError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        UpdateItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::QueryFailed("Item collection size limit exceeded".to_string())
        }
        UpdateItemError::TransactionConflictException(_) => {
            StoreError::QueryFailed("Transaction conflict, please retry".to_string())
        }
        UpdateItemError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("UpdateItem failed: {:?}", err)),
    }
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => {
            StoreError::ConditionFailed(CONDITION_FAILED.to_string())
        }
        DeleteItemError::ResourceNotFoundException(_) => {
            StoreError::TableNotFound(table.to_string())
        }
        DeleteItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::QueryFailed(THROUGHPUT_EXCEEDED.to_string())
        }
        DeleteItemError::RequestLimitExceeded(_) => {
            StoreError::QueryFailed(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        DeleteItemError::TransactionConflictException(_) => {
            StoreError::QueryFailed("Transaction conflict, please retry".to_string())
        }
        DeleteItemError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("DeleteItem failed: {:?}", err)),
    }
}

/// Map a DescribeTable SDK error, treating a missing table as `Ok(false)`.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
) -> Result<bool, StoreError> {
    if let Some(err) = transport_error(&err) {
        return Err(err);
    }
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(_) => Ok(false),
        DescribeTableError::InternalServerError(_) => {
            Err(StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string()))
        }
        err => Err(StoreError::QueryFailed(format!(
            "DescribeTable failed: {:?}",
            err
        ))),
    }
}

/// Map an UpdateTimeToLive SDK error to StoreError.
pub fn map_update_ttl_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateTimeToLiveError, R>,
    table: &str,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        UpdateTimeToLiveError::ResourceNotFoundException(_) => {
            StoreError::TableNotFound(table.to_string())
        }
        UpdateTimeToLiveError::ResourceInUseException(_) => {
            StoreError::QueryFailed("Table is being updated, please retry".to_string())
        }
        UpdateTimeToLiveError::LimitExceededException(_) => {
            StoreError::QueryFailed("Too many concurrent table operations".to_string())
        }
        UpdateTimeToLiveError::InternalServerError(_) => {
            StoreError::QueryFailed(INTERNAL_SERVER_ERROR.to_string())
        }
        err => StoreError::QueryFailed(format!("UpdateTimeToLive failed: {:?}", err)),
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::types::error::{
        ConditionalCheckFailedException, ResourceNotFoundException,
    };

    use super::*;

    fn service_error<E>(err: E) -> SdkError<E, ()> {
        SdkError::service_error(err, ())
    }

    #[test]
    fn test_conditional_check_maps_to_condition_failed() {
        let err = service_error(PutItemError::ConditionalCheckFailedException(
            ConditionalCheckFailedException::builder().build(),
        ));
        assert!(matches!(
            map_put_item_error(err, "products"),
            StoreError::ConditionFailed(_)
        ));
    }

    #[test]
    fn test_missing_table_maps_to_table_not_found() {
        let err = service_error(GetItemError::ResourceNotFoundException(
            ResourceNotFoundException::builder().build(),
        ));
        assert_eq!(
            map_get_item_error(err, "products"),
            StoreError::TableNotFound("products".to_string())
        );
    }

    #[test]
    fn test_describe_missing_table_is_not_an_error() {
        let err = service_error(DescribeTableError::ResourceNotFoundException(
            ResourceNotFoundException::builder().build(),
        ));
        assert_eq!(map_describe_table_error(err), Ok(false));
    }
}
