pub mod aom;
pub mod apig;
pub mod body;
pub mod client;
pub mod common;
pub mod error;
pub mod iam;
pub mod pagination;
pub mod pathsearch;
pub mod pool;
pub mod rms;
pub mod signer;
pub mod wait;

pub use client::{Client, RequestOptions, RetryConfig, ServiceClient};
pub use error::ApiError;

impl ServiceClient {
    pub fn apig(&self) -> apig::ApigApi<'_> {
        apig::ApigApi::new(self)
    }

    pub fn rms(&self) -> rms::RmsApi<'_> {
        rms::RmsApi::new(self)
    }

    pub fn aom(&self) -> aom::AomApi<'_> {
        aom::AomApi::new(self)
    }

    pub fn iam(&self) -> iam::IamApi<'_> {
        iam::IamApi::new(self)
    }
}
