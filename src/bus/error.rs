use thiserror::Error;

/// Errors that can occur while setting up the bus subscription.
#[derive(Debug, Error)]
pub enum BusError {
    /// Failed to connect to the system bus.
    #[error("failed to connect to the system bus: {0}")]
    Connect(#[source] zbus::Error),

    /// Failed to build the signal match rule.
    #[error("failed to build signal match rule: {0}")]
    MatchRule(#[source] zbus::Error),

    /// Failed to install the signal match.
    #[error("failed to subscribe to networkd signals: {0}")]
    Subscribe(#[source] zbus::Error),
}
