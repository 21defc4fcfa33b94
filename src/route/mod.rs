//! IPv4 gateway resolution and route installation.
//!
//! Resolution is a pure function over a route-table snapshot so the fallback
//! policy is testable without a netlink socket. The policy is a three-tier
//! chain: a link-scoped default route is more trustworthy than any other
//! link-scoped route, and a global default is better than nothing.

mod error;

use std::{net::Ipv4Addr, num::NonZeroI32};

pub use error::{GatewayError, RouteError};
use futures::TryStreamExt;
use rtnetlink::{
    Handle, RouteMessageBuilder,
    packet_route::route::{RouteAddress, RouteAttribute, RouteMessage},
};
use tracing::debug;

/// One IPv4 route as read from the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination prefix; `None` for routes without one.
    pub destination: Option<(Ipv4Addr, u8)>,
    /// Next-hop gateway, when the route has one.
    pub gateway: Option<Ipv4Addr>,
    /// Output interface index.
    pub link_index: Option<u32>,
    /// Routing table the route lives in.
    pub table: u32,
}

impl RouteEntry {
    /// A route with no destination, or one covering the entire address
    /// space, is a default-route candidate.
    pub fn is_default(&self) -> bool {
        match self.destination {
            None => true,
            Some((_, prefix_len)) => prefix_len == 0,
        }
    }
}

/// Resolves a usable IPv4 gateway for a link from a route-table snapshot.
///
/// Tiers, each attempted only if the previous one fails:
/// 1. a default route scoped to the link,
/// 2. any route scoped to the link with a gateway,
/// 3. a system-wide default route.
pub fn resolve_gateway(routes: &[RouteEntry], link_index: u32) -> Result<Ipv4Addr, GatewayError> {
    link_default_gateway(routes, link_index)
        .or_else(|e| {
            debug!(
                event.name = "route.tier_missed",
                link.index = link_index,
                tier = 1,
                error = %e,
                "falling back to link-scoped routes"
            );
            link_any_gateway(routes, link_index)
        })
        .or_else(|e| {
            debug!(
                event.name = "route.tier_missed",
                link.index = link_index,
                tier = 2,
                error = %e,
                "falling back to the system default route"
            );
            system_default_gateway(routes)
        })
        .map_err(|_| GatewayError::NotFound)
}

/// Tier 1: default route on the given link.
///
/// A matching default route without a usable gateway is a hard miss for
/// this tier, reported distinctly from the route simply not existing.
fn link_default_gateway(routes: &[RouteEntry], link_index: u32) -> Result<Ipv4Addr, GatewayError> {
    let candidate = routes
        .iter()
        .find(|route| route.is_default() && route.link_index == Some(link_index))
        .ok_or(GatewayError::NotFound)?;

    candidate
        .gateway
        .ok_or(GatewayError::DefaultRouteWithoutGateway)
}

/// Tier 2: first route on the given link with a gateway, default or not.
fn link_any_gateway(routes: &[RouteEntry], link_index: u32) -> Result<Ipv4Addr, GatewayError> {
    routes
        .iter()
        .filter(|route| route.link_index == Some(link_index))
        .find_map(|route| route.gateway)
        .ok_or(GatewayError::NotFound)
}

/// Tier 3: system-wide default route, ignoring the link.
fn system_default_gateway(routes: &[RouteEntry]) -> Result<Ipv4Addr, GatewayError> {
    let candidate = routes
        .iter()
        .find(|route| route.is_default())
        .ok_or(GatewayError::NotFound)?;

    candidate
        .gateway
        .ok_or(GatewayError::DefaultRouteWithoutGateway)
}

/// Dumps the kernel's IPv4 routes into the snapshot the resolver works on.
pub async fn fetch_routes(handle: &Handle) -> Result<Vec<RouteEntry>, RouteError> {
    let dump = RouteMessageBuilder::<Ipv4Addr>::default().build();
    let mut stream = handle.route().get(dump).execute();

    let mut entries = Vec::new();
    while let Some(msg) = stream.try_next().await.map_err(RouteError::Dump)? {
        entries.push(route_entry(&msg));
    }
    Ok(entries)
}

fn route_entry(msg: &RouteMessage) -> RouteEntry {
    let mut destination = None;
    let mut gateway = None;
    let mut link_index = None;
    let mut table = u32::from(msg.header.table);

    for attr in &msg.attributes {
        match attr {
            RouteAttribute::Destination(RouteAddress::Inet(addr)) => {
                destination = Some((*addr, msg.header.destination_prefix_length));
            }
            RouteAttribute::Gateway(RouteAddress::Inet(addr)) => gateway = Some(*addr),
            RouteAttribute::Oif(index) => link_index = Some(*index),
            RouteAttribute::Table(id) => table = *id,
            _ => {}
        }
    }

    RouteEntry {
        destination,
        gateway,
        link_index,
        table,
    }
}

/// Installs a gateway route for a link into the given routing table.
///
/// A kernel "route already exists" reply is success; the insert is
/// idempotent.
pub async fn add_route(
    handle: &Handle,
    link_index: u32,
    table: u32,
    gateway: Ipv4Addr,
) -> Result<(), RouteError> {
    let route = RouteMessageBuilder::<Ipv4Addr>::default()
        .output_interface(link_index)
        .gateway(gateway)
        .table_id(table)
        .build();

    match handle.route().add(route).execute().await {
        Ok(()) => Ok(()),
        Err(e) if is_route_exists(&e) => {
            debug!(
                event.name = "route.already_exists",
                link.index = link_index,
                route.table = table,
                gateway = %gateway,
                "route already present, treating as success"
            );
            Ok(())
        }
        Err(e) => Err(RouteError::Add(e)),
    }
}

/// True when the kernel replied EEXIST to a route insert.
fn is_route_exists(err: &rtnetlink::Error) -> bool {
    matches!(
        err,
        rtnetlink::Error::NetlinkError(msg)
            if msg.code.map(NonZeroI32::get) == Some(-libc::EEXIST)
    )
}
