//! Input error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error(transparent)]
    Api(#[from] vantage_api::ApiError),
}
