//! Event broker for systemd-networkd state changes.
//!
//! Watches `PropertiesChanged` signals on the system bus, correlates them
//! with a fresh snapshot of the host's network interfaces, and runs hook
//! scripts from state-keyed directories. Also resolves and installs IPv4
//! default routes via rtnetlink.

pub mod broker;
pub mod bus;
pub mod hook;
pub mod link;
pub mod route;
pub mod runtime;
