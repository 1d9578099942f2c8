//! Packet processing services for the router data plane.
//!
//! The `service` module holds the router instance and the processors that
//! act on inbound frames: the ethertype dispatcher, the IP packet processor,
//! the ARP packet processor, and the ICMP synthesizer.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;

use std::sync::{
    Arc,
    Mutex,
};
use std::thread;
use std::time::Duration;

use crate::core::arp_cache::{
    ArpCache,
    ENTRY_LIFETIME_SECS,
};
use crate::core::dev::Transport;
use crate::core::iface::{
    Interface,
    Interfaces,
};
use crate::core::repr::{
    Icmpv4DestinationUnreachable,
    Icmpv4Repr,
};
use crate::core::route::{
    Route,
    RoutingTable,
};
use crate::core::time::{
    Env,
    SystemEnv,
};

/// A router data plane instance.
///
/// Owns every piece of mutable state: the transport handle, the static
/// interface and routing tables, and the ARP cache with its pending
/// resolution requests. The receive path and the periodic sweep both run
/// against one instance; share it behind a Mutex.
pub struct Router<E: Env = SystemEnv> {
    /// Transport for sending raw Ethernet frames.
    pub dev: Box<dyn Transport + Send>,
    /// The local interface table.
    pub interfaces: Interfaces,
    /// The static routing table.
    pub routes: RoutingTable,
    /// Cache for IPv4/Ethernet address translations and pending resolutions.
    pub arp_cache: ArpCache<E>,
}

impl Router<SystemEnv> {
    pub fn new(
        dev: Box<dyn Transport + Send>,
        interfaces: Vec<Interface>,
        routes: Vec<Route>,
    ) -> Router<SystemEnv> {
        Router::with_env(dev, interfaces, routes, SystemEnv::new())
    }
}

impl<E: Env> Router<E> {
    pub fn with_env(
        dev: Box<dyn Transport + Send>,
        interfaces: Vec<Interface>,
        routes: Vec<Route>,
        time_env: E,
    ) -> Router<E> {
        Router {
            dev,
            interfaces: Interfaces::new(interfaces),
            routes: RoutingTable::new(routes),
            arp_cache: ArpCache::new(ENTRY_LIFETIME_SECS, time_env),
        }
    }

    /// Processes one inbound frame. Call once per frame delivered by the
    /// transport.
    ///
    /// Every disposition, including drops, is handled internally; errors are
    /// diagnostics, not failures of the router.
    pub fn handle_frame(&mut self, frame: &[u8], ingress: &str) {
        if let Err(err) = ethernet::recv_frame(self, frame, ingress) {
            debug!("Dropped frame from {} with {:?}.", ingress, err);
        }
    }

    /// Runs one pass of the ARP maintenance sweep: purges expired cache
    /// entries, re-broadcasts overdue resolution requests, and reports every
    /// packet stranded by an exhausted request with a host unreachable
    /// message toward its own sender.
    pub fn sweep(&mut self) {
        let sweep = self.arp_cache.sweep();

        for (target, egress) in sweep.retries {
            if let Err(err) = arp::send_request(self, target, &egress) {
                debug!("Retry of ARP request for {} failed with {:?}.", target, err);
            }
        }

        for failure in sweep.failures {
            debug!(
                "Resolution of {} failed; reporting {} stranded packets.",
                failure.target,
                failure.packets.len()
            );

            for packet in failure.packets {
                let result = icmpv4::send_error(
                    self,
                    &packet.frame,
                    Icmpv4Repr::DestinationUnreachable(
                        Icmpv4DestinationUnreachable::HostUnreachable,
                    ),
                );
                if let Err(err) = result {
                    debug!("Host unreachable toward stranded sender failed with {:?}.", err);
                }
            }
        }
    }
}

/// Spawns the background thread that drives the ARP cache sweep at a fixed
/// interval. Runs until process shutdown.
pub fn spawn_sweeper<E>(
    router: Arc<Mutex<Router<E>>>,
    interval: Duration,
) -> thread::JoinHandle<()>
where
    E: Env + Send + 'static,
{
    thread::spawn(move || loop {
        thread::sleep(interval);

        let mut router = match router.lock() {
            Ok(router) => router,
            Err(err) => err.into_inner(),
        };
        router.sweep();
    })
}
