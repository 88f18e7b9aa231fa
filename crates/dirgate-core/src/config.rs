//! Shared configuration types
//!
//! Connection and TLS settings common to all backends. Backend-specific
//! configuration lives in the backend crates.

use serde::{Deserialize, Serialize};

/// Connection behavior shared across backends.
///
/// Connection-establishment and per-operation timeouts are independent; a
/// timed-out operation does not tear down an established connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection-establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-operation timeout in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Maximum retry attempts for transient transport failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ConnectionSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection-establishment timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = secs;
        self
    }

    /// Connection-establishment timeout as a `Duration`.
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-operation timeout as a `Duration`.
    pub fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.operation_timeout_secs)
    }
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether to use SSL/TLS.
    #[serde(default)]
    pub enabled: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,

    /// Path to a CA certificate file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_certificate: true,
            ca_cert_path: None,
        }
    }
}

impl TlsConfig {
    /// TLS enabled with certificate verification.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Log a warning when verification is disabled.
    pub fn validate_security(&self) {
        if self.enabled && !self.verify_certificate {
            tracing::warn!(
                target: "security",
                "TLS certificate verification is disabled; the connection is \
                 vulnerable to man-in-the-middle attacks"
            );
        }
    }
}
