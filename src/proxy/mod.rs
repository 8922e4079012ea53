mod manager;
mod source;

pub use manager::ProxyPool;
pub use source::{merge_listings, parse_listing, HttpProxySource, ProxySource};

use std::fmt;

/// One egress proxy from a public listing, as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyCandidate {
    pub address: String,
    pub https: bool,
}

impl ProxyCandidate {
    pub fn new(address: impl Into<String>, https: bool) -> Self {
        Self {
            address: address.into(),
            https,
        }
    }

    /// Proxy URL handed to the HTTP client. Listings only advertise plain
    /// HTTP proxies; https targets are tunnelled with CONNECT.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
