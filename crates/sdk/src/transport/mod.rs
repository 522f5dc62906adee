//! Transport layer for the pinner SDK.

pub mod http;

pub use http::HttpTransport;
