use serde::{Deserialize, Serialize};

/// Options handed to the wire client for every connection it opens.
///
/// The topology engine never interprets these; it only forwards them to
/// [`Connector::create`](crate::Connector::create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Logical database selected after connecting
    pub database: u32,
    pub tls: bool,
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            database: 0,
            tls: false,
            connect_timeout_ms: 5000,
        }
    }
}

impl ConnectionOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be greater than zero".to_string());
        }
        if self.username.is_some() && self.password.is_none() {
            return Err("username requires a password".to_string());
        }
        Ok(())
    }
}
