use thiserror::Error;

/// Failure of the gateway resolution chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// A default route exists for the link but carries no usable IPv4
    /// gateway. A hard miss for that tier, distinct from having no route.
    #[error("default route present but carries no usable IPv4 gateway")]
    DefaultRouteWithoutGateway,

    /// All three resolution tiers were exhausted.
    #[error("no IPv4 gateway found")]
    NotFound,
}

/// Errors talking to the kernel route table.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The IPv4 route dump failed.
    #[error("failed to dump IPv4 routes: {0}")]
    Dump(#[source] rtnetlink::Error),

    /// Route insertion failed for a reason other than the route already
    /// existing.
    #[error("failed to add route: {0}")]
    Add(#[source] rtnetlink::Error),
}
