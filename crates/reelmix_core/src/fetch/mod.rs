//! Retrieval of optional remote assets.

mod downloader;

pub use downloader::{fan_out, AssetFetcher, AssetRequest, FetchError, FetchResult, HttpFetcher};
