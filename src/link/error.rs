use thiserror::Error;

/// Errors that can occur while snapshotting interfaces.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The rtnetlink link dump failed. The event being dispatched is
    /// dropped; the next notification triggers a fresh enumeration.
    #[error("failed to enumerate network interfaces: {0}")]
    Enumerate(#[source] rtnetlink::Error),
}
