//! # Ferry HTTP
//!
//! Outbound HTTP plumbing for providers that talk to remote storage APIs:
//! URL and header construction, a throttled and retrying request gateway,
//! and adapters from response bodies to [`ferry_core::DownloadStream`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::ErrorKind;
//! use ferry_http::{GatewayConfig, RequestGateway, RequestOptions, download_stream};
//! use reqwest::Method;
//!
//! let gateway = RequestGateway::new(GatewayConfig::default())?
//!     .with_base_url("https://api.example.com/v1")
//!     .with_default_header("Authorization", format!("Bearer {token}"));
//!
//! let url = gateway.build_url(&["files", file_id, "content"], &[])?;
//! let response = gateway
//!     .send(Method::GET, url, RequestOptions::new().expects([200, 206]).throws(ErrorKind::Download))
//!     .await?;
//! let stream = download_stream(response);
//! ```

pub mod config;
pub mod gateway;
pub mod response;
pub mod throttle;
pub mod url;

pub use config::GatewayConfig;
pub use gateway::{
    build_range_header, error_from_response, transport_error, RequestGateway, RequestOptions,
    UrlSource,
};
pub use response::download_stream;
pub use throttle::{GovernorThrottle, Throttle, WindowThrottle};
pub use url::build_url;

pub use reqwest::Method;
