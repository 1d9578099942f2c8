//! The static routing table and longest prefix matching.

use crate::core::repr::Ipv4Address;

/// A static routing table entry.
#[derive(Clone, Debug)]
pub struct Route {
    pub dst: Ipv4Address,
    pub mask: Ipv4Address,
    pub gateway: Ipv4Address,
    pub iface: String,
}

impl Route {
    /// Returns the next hop for a packet routed through this entry.
    ///
    /// An unspecified gateway marks a directly attached network, where the
    /// destination itself is the next hop.
    pub fn next_hop(&self, dst_addr: Ipv4Address) -> Ipv4Address {
        if self.gateway.is_unspecified() {
            dst_addr
        } else {
            self.gateway
        }
    }
}

/// An immutable, ordered collection of routes.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new(routes: Vec<Route>) -> RoutingTable {
        RoutingTable { routes }
    }

    /// Finds the route whose masked destination matches the address with the
    /// numerically largest mask. Returns None when no entry matches; callers
    /// without a default route must treat that as unreachable rather than
    /// falling back to any entry.
    pub fn longest_prefix_match(&self, addr: Ipv4Address) -> Option<&Route> {
        let mut longest_mask = 0;
        let mut best = None;

        for route in &self.routes {
            let mask = route.mask.as_u32();
            if (route.dst.as_u32() & mask) == (addr.as_u32() & mask) && mask >= longest_mask {
                longest_mask = mask;
                best = Some(route);
            }
        }

        best
    }
}
