//! # Ferry
//!
//! One set of file operations (copy, move, delete, list, archive) over many
//! storage backends. The work lives in two crates re-exported here:
//!
//! - [`ferry_core`]: the provider contract, naming rules, transfers and archives
//! - [`ferry_http`]: the throttled, retrying request gateway for HTTP backends
//!
//! This crate adds deployment glue: [`Settings`] loading and tracing setup.
//!
//! ```rust,ignore
//! ferry::telemetry::init_tracing("ferry=info");
//! let settings = ferry::Settings::load(Some(Path::new("ferry.toml")))?;
//! let transfer = ferry::Transfer::new(settings.transfer.clone());
//! let gateway = ferry::RequestGateway::new(settings.gateway.clone())?;
//! ```

pub mod settings;
pub mod telemetry;

pub use ferry_core::*;
pub use ferry_http::{
    build_range_header, build_url, download_stream, GatewayConfig, GovernorThrottle,
    RequestGateway, RequestOptions, Throttle, UrlSource, WindowThrottle,
};
pub use settings::Settings;
