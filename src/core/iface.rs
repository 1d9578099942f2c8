//! The router's local interface table.

use crate::core::repr::{
    EthernetAddress,
    Ipv4Address,
};

/// A local interface with its protocol and hardware addresses.
///
/// Interfaces are loaded once at startup and never change afterwards.
#[derive(Clone, Debug)]
pub struct Interface {
    pub name: String,
    pub ipv4_addr: Ipv4Address,
    pub ethernet_addr: EthernetAddress,
}

/// An immutable collection of local interfaces.
#[derive(Clone, Debug)]
pub struct Interfaces {
    interfaces: Vec<Interface>,
}

impl Interfaces {
    pub fn new(interfaces: Vec<Interface>) -> Interfaces {
        Interfaces { interfaces }
    }

    /// Looks up an interface by name.
    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    /// Checks if any local interface owns the address.
    pub fn owns_addr(&self, addr: Ipv4Address) -> bool {
        self.interfaces.iter().any(|iface| iface.ipv4_addr == addr)
    }
}
