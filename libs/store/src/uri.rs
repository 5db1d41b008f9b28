//! Storage URI parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Pool and container labels parsed from a `daos://<pool>/<container>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub pool: String,
    pub container: String,
}

static URI_RE: OnceLock<Regex> = OnceLock::new();

impl StorageUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let re = URI_RE.get_or_init(|| {
            Regex::new(r"^daos://([^/]+)/(.+)$").expect("storage URI pattern is valid")
        });
        let caps = re
            .captures(uri)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        Ok(Self {
            pool: caps[1].to_string(),
            container: caps[2].to_string(),
        })
    }
}
