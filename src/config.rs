//! RPC transport configuration parameters.
//!
//! All tunable parameters for the synchronous request path. Values can
//! be overridden at init by platform glue, typically from an NVS-style
//! store; the postcard helpers encode a config into the compact blob
//! format such stores hold.
//!
//! Validation rejects out-of-range values instead of clamping them, so
//! a corrupted or hostile provisioning channel cannot silently install
//! a deadline of zero and turn every synchronous call into a spin.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the synchronous deadline. A minute-long cross-core
/// RPC means the peer core is gone; waiting longer only hides it.
const MAX_SYNC_TIMEOUT_MS: u32 = 60_000;

/// Upper bound on automatic retransmissions of a synchronous request.
const MAX_SYNC_RETRIES: u8 = 7;

/// RPC endpoint configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Service identifier stamped into the header `id` field of every
    /// request this endpoint originates.
    pub service_id: u8,
    /// Deadline for a synchronous request, in milliseconds.
    pub sync_timeout_ms: u32,
    /// Retransmissions after a deadline miss. 0 means a lost reply is
    /// reported as `Timeout` on the first miss; there is no automatic
    /// recovery beyond this count.
    pub sync_retries: u8,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            service_id: 0,
            sync_timeout_ms: 1000,
            sync_retries: 0,
        }
    }
}

impl RpcConfig {
    /// Validate field ranges. Rejects, never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "sync_timeout_ms must be non-zero",
            ));
        }
        if self.sync_timeout_ms > MAX_SYNC_TIMEOUT_MS {
            return Err(ConfigError::ValidationFailed(
                "sync_timeout_ms exceeds 60s ceiling",
            ));
        }
        if self.sync_retries > MAX_SYNC_RETRIES {
            return Err(ConfigError::ValidationFailed(
                "sync_retries exceeds ceiling",
            ));
        }
        Ok(())
    }

    /// Encode into a storage blob. Returns the number of bytes written.
    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        let used = postcard::to_slice(self, buf).map_err(|_| ConfigError::StorageFull)?;
        Ok(used.len())
    }

    /// Decode and validate a storage blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = RpcConfig::default();
        assert!(c.validate().is_ok());
        assert!(c.sync_timeout_ms > 0);
        assert_eq!(c.sync_retries, 0, "no silent retransmission by default");
    }

    #[test]
    fn postcard_roundtrip() {
        let c = RpcConfig {
            service_id: 7,
            sync_timeout_ms: 2500,
            sync_retries: 2,
        };
        let mut buf = [0u8; 32];
        let n = c.to_bytes(&mut buf).unwrap();
        let c2 = RpcConfig::from_bytes(&buf[..n]).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn zero_timeout_rejected() {
        let c = RpcConfig {
            sync_timeout_ms: 0,
            ..RpcConfig::default()
        };
        assert_eq!(
            c.validate(),
            Err(ConfigError::ValidationFailed(
                "sync_timeout_ms must be non-zero"
            ))
        );
    }

    #[test]
    fn out_of_range_blob_rejected_on_load() {
        let c = RpcConfig {
            sync_timeout_ms: 120_000,
            ..RpcConfig::default()
        };
        let mut buf = [0u8; 32];
        let n = c.to_bytes(&mut buf).unwrap();
        // Encoding succeeds, loading must fail validation.
        assert!(RpcConfig::from_bytes(&buf[..n]).is_err());
    }

    #[test]
    fn truncated_blob_is_corrupted() {
        let c = RpcConfig::default();
        let mut buf = [0u8; 32];
        let n = c.to_bytes(&mut buf).unwrap();
        assert_eq!(
            RpcConfig::from_bytes(&buf[..n - 1]),
            Err(ConfigError::Corrupted)
        );
    }
}
