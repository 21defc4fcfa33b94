//! Event dispatcher: correlates state-change notifications with a fresh
//! interface snapshot and triggers the matching hook scripts.
//!
//! Each notification is processed by its own task; the snapshot it builds is
//! owned by that task alone and dropped when the dispatch returns. Failures
//! inside one property's dispatch are logged and contained, they never
//! abort sibling properties or the receive loop.

use std::sync::Arc;

use rtnetlink::Handle;
use tracing::{debug, error, info, warn};

use crate::{
    bus::{EventScope, StateEvent, link_index_from_path},
    hook,
    link::LinkSnapshot,
    route,
    runtime::conf::Conf,
};

/// Link properties that describe an operational state and therefore select
/// a `<state>.d` hook directory.
const STATE_PROPERTIES: &[&str] = &[
    "AddressState",
    "AdministrativeState",
    "CarrierState",
    "IPv4AddressState",
    "IPv6AddressState",
    "OnlineState",
    "OperationalState",
];

/// Operational state at which a link can carry a default route.
const OPER_STATE_ROUTABLE: &str = "routable";

pub fn is_state_property(key: &str) -> bool {
    STATE_PROPERTIES.contains(&key)
}

pub struct Dispatcher {
    conf: Arc<Conf>,
    handle: Handle,
}

impl Dispatcher {
    pub fn new(conf: Arc<Conf>, handle: Handle) -> Self {
        Self { conf, handle }
    }

    /// Processes one notification end to end.
    pub async fn dispatch(&self, event: StateEvent) {
        match event.scope {
            EventScope::Link => self.dispatch_link(event).await,
            EventScope::Manager => self.dispatch_manager(event).await,
        }
    }

    async fn dispatch_link(&self, event: StateEvent) {
        let index = match link_index_from_path(&event.path) {
            Ok(index) => index,
            Err(e) => {
                debug!(
                    event.name = "broker.path_discarded",
                    subject.path = %event.path,
                    error = %e,
                    "discarding link notification with malformed subject path"
                );
                return;
            }
        };

        let snapshot = match LinkSnapshot::acquire(&self.handle).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    event.name = "broker.enumeration_failed",
                    error = %e,
                    "dropping event, will re-enumerate on the next notification"
                );
                return;
            }
        };

        let Some(link) = snapshot.by_index(index) else {
            debug!(
                event.name = "broker.link_unknown",
                link.index = index,
                "interface not present in snapshot, ignoring"
            );
            return;
        };

        for (key, value) in &event.properties {
            if !is_state_property(key) {
                continue;
            }
            let rendered = value.render();

            info!(
                event.name = "broker.link_state_changed",
                link.name = %link.name,
                link.index = index,
                state.key = %key,
                state.value = %rendered,
                "link changed state"
            );

            if let Err(e) =
                hook::run_link_hooks(&self.conf, &link.name, index, key, &rendered).await
            {
                warn!(
                    event.name = "broker.hook_dispatch_failed",
                    link.name = %link.name,
                    state.key = %key,
                    error = %e,
                    "hook dispatch failed, continuing with remaining properties"
                );
            }

            if self.conf.routes.install_on_routable
                && key == "OperationalState"
                && rendered.trim_matches('"') == OPER_STATE_ROUTABLE
            {
                self.install_default_route(index).await;
            }
        }
    }

    async fn dispatch_manager(&self, event: StateEvent) {
        for (key, value) in &event.properties {
            let rendered = value.render();

            debug!(
                event.name = "broker.manager_state_changed",
                state.key = %key,
                state.value = %rendered,
                "manager changed state"
            );

            if let Err(e) = hook::run_manager_hooks(&self.conf, key, &rendered).await {
                warn!(
                    event.name = "broker.hook_dispatch_failed",
                    state.key = %key,
                    error = %e,
                    "manager hook dispatch failed, continuing"
                );
            }
        }
    }

    /// Best-effort default route installation for a link that just became
    /// routable.
    async fn install_default_route(&self, index: u32) {
        let routes = match route::fetch_routes(&self.handle).await {
            Ok(routes) => routes,
            Err(e) => {
                warn!(
                    event.name = "broker.route_dump_failed",
                    link.index = index,
                    error = %e,
                    "cannot resolve gateway"
                );
                return;
            }
        };

        let gateway = match route::resolve_gateway(&routes, index) {
            Ok(gateway) => gateway,
            Err(e) => {
                warn!(
                    event.name = "broker.gateway_unresolved",
                    link.index = index,
                    error = %e,
                    "no usable gateway for routable link"
                );
                return;
            }
        };

        match route::add_route(&self.handle, index, self.conf.routes.table, gateway).await {
            Ok(()) => {
                info!(
                    event.name = "broker.route_installed",
                    link.index = index,
                    gateway = %gateway,
                    route.table = self.conf.routes.table,
                    "default route installed"
                );
            }
            Err(e) => {
                warn!(
                    event.name = "broker.route_install_failed",
                    link.index = index,
                    gateway = %gateway,
                    error = %e,
                    "failed to install default route"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::is_state_property;

    #[test]
    fn operational_state_properties_match() {
        assert!(is_state_property("OperationalState"));
        assert!(is_state_property("CarrierState"));
        assert!(is_state_property("AdministrativeState"));
    }

    #[test]
    fn non_state_properties_do_not_match() {
        assert!(!is_state_property("BitRates"));
        assert!(!is_state_property("operationalstate"));
        assert!(!is_state_property(""));
    }
}
