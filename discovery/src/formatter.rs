//! Endpoint formatters turning a ranked SRV record into a configuration value.

use crate::ranking::SrvRecord;
use envconf_core::ServiceDescriptor;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Formatter {
    /// Host name only.
    #[default]
    BareName,
    /// `http://<prefix><host>:<port>/<suffix>`
    Http,
    /// `https://<prefix><host>:<port>/<suffix>`
    Https,
    /// `mongodb://<host>:<port>/<suffix>`; the client appends the database.
    Mongodb,
}

impl Formatter {
    /// Picks the descriptor's formatter, falling back to `bareName` when it
    /// is unset or unrecognized.
    pub fn for_service(service: &ServiceDescriptor) -> Self {
        service
            .formatter
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or_default()
    }

    pub fn format(self, endpoint: &SrvRecord, prefix: &str, suffix: &str) -> String {
        let host = &endpoint.target;
        let port = endpoint.port;
        match self {
            Self::BareName => format!("{prefix}{host}{suffix}"),
            Self::Http => format!("http://{prefix}{host}:{port}/{suffix}"),
            Self::Https => format!("https://{prefix}{host}:{port}/{suffix}"),
            Self::Mongodb => format!("mongodb://{host}:{port}/{suffix}"),
        }
    }
}
