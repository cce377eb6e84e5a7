//! Unified error types for the corelink transport.
//!
//! One small `Copy` enum per layer, funnelled into a crate-level `Error`
//! so callers sitting on top of the RPC layer get uniform handling.
//! Nothing in this subsystem is fatal: every variant is returned
//! synchronously at the call site that detected it, and interrupt-context
//! anomalies that cannot be reported upward are counted and logged
//! instead (see [`crate::diagnostics`]).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level transport error
// ---------------------------------------------------------------------------

/// Every fallible operation in the transport funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A channel-driver operation failed.
    Link(LinkError),
    /// A message-channel operation failed.
    Channel(ChannelError),
    /// An RPC-layer operation failed.
    Rpc(RpcError),
    /// Configuration is invalid or could not be decoded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Rpc(e) => write!(f, "rpc: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel-driver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Core id is outside the enumerated physical links.
    InvalidCore,
    /// Sub-channel id is outside the per-link multiplex range.
    InvalidSubChannel,
    /// Operation is not wired for this physical link.
    Unsupported,
    /// A message channel is already attached for this link.
    AlreadyAttached,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCore => write!(f, "invalid core id"),
            Self::InvalidSubChannel => write!(f, "invalid sub-channel id"),
            Self::Unsupported => write!(f, "not wired for this link"),
            Self::AlreadyAttached => write!(f, "link already attached"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Message-channel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation on a sub-channel that has not been opened.
    NotOpen,
    /// `open` on a sub-channel that is already open.
    AlreadyOpen,
    /// No free send record, or peer backpressure is active.
    Busy,
    /// Bad sub-channel id or empty payload.
    InvalidParam,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen => write!(f, "sub-channel not open"),
            Self::AlreadyOpen => write!(f, "sub-channel already open"),
            Self::Busy => write!(f, "send path busy"),
            Self::InvalidParam => write!(f, "invalid parameter"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// RPC-layer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcError {
    /// Reply queue is saturated; the incoming frame was rejected.
    QueueFull,
    /// No matching reply arrived before the configured deadline.
    Timeout,
    /// Received bytes do not form a valid 24-byte RPC frame.
    MalformedFrame,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "reply queue full"),
            Self::Timeout => write!(f, "reply deadline exceeded"),
            Self::MalformedFrame => write!(f, "malformed frame"),
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Stored config blob failed deserialization.
    Corrupted,
    /// Destination buffer too small for the encoded blob.
    StorageFull,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::StorageFull => write!(f, "buffer too small"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Transport-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_layered() {
        let e: Error = ChannelError::Busy.into();
        assert_eq!(format!("{e}"), "channel: send path busy");

        let e: Error = LinkError::InvalidCore.into();
        assert_eq!(format!("{e}"), "link: invalid core id");

        let e: Error = RpcError::Timeout.into();
        assert_eq!(format!("{e}"), "rpc: reply deadline exceeded");
    }

    #[test]
    fn errors_are_copy_and_comparable() {
        let a = Error::Channel(ChannelError::NotOpen);
        let b = a;
        assert_eq!(a, b);
        assert_ne!(a, Error::Channel(ChannelError::Busy));
    }
}
