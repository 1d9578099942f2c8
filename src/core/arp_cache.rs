//! An expiring IPv4 to Ethernet address cache with pending resolution
//! requests.
//!
//! Resolution is decoupled from the packet path: packets that need a mapping
//! which is not cached yet are parked on a pending request and flushed in one
//! batch when the reply arrives. A periodic sweep drives the retry/timeout
//! side of the state machine so failures are detected even when no further
//! traffic toward the address arrives.

use std::collections::HashMap;
use std::time::{
    Duration,
    Instant,
};

use crate::core::repr::{
    EthernetAddress,
    Ipv4Address,
};
use crate::core::time::{
    Env,
    SystemEnv,
};

/// Seconds a resolved mapping stays usable.
pub const ENTRY_LIFETIME_SECS: u64 = 15;

/// Seconds between consecutive request broadcasts for the same address.
pub const RETRY_INTERVAL_SECS: u64 = 1;

/// Number of request broadcasts before a resolution is reported as failed.
pub const MAX_SEND_ATTEMPTS: usize = 5;

struct Entry {
    eth_addr: EthernetAddress,
    in_cache_since: Instant,
}

/// A frame parked while its next hop resolves, along with the interface it
/// should eventually leave through.
#[derive(Debug)]
pub struct QueuedPacket {
    pub frame: Vec<u8>,
    pub egress: String,
}

struct Request {
    target: Ipv4Address,
    egress: String,
    last_send: Instant,
    attempts: usize,
    packets: Vec<QueuedPacket>,
}

/// A resolution that exhausted its send attempts, with every packet that was
/// waiting on it in arrival order.
#[derive(Debug)]
pub struct FailedRequest {
    pub target: Ipv4Address,
    pub packets: Vec<QueuedPacket>,
}

/// The actions a sweep asks the caller to perform: re-broadcast a request for
/// each (target, egress interface) pair, and report every failed request.
#[derive(Debug)]
pub struct Sweep {
    pub retries: Vec<(Ipv4Address, String)>,
    pub failures: Vec<FailedRequest>,
}

/// Maintains an expiring set of IPv4 -> Ethernet address mappings and the
/// queue of outstanding resolution requests.
pub struct ArpCache<T = SystemEnv>
where
    T: Env,
{
    entries: HashMap<Ipv4Address, Entry>,
    requests: Vec<Request>,
    expiration: Duration,
    retry_interval: Duration,
    time_env: T,
}

impl<T: Env> ArpCache<T> {
    /// Creates an ARP cache where address mappings expire after
    /// expiration_in_secs seconds.
    pub fn new(expiration_in_secs: u64, time_env: T) -> ArpCache<T> {
        ArpCache {
            entries: HashMap::new(),
            requests: Vec::new(),
            expiration: Duration::from_secs(expiration_in_secs),
            retry_interval: Duration::from_secs(RETRY_INTERVAL_SECS),
            time_env,
        }
    }

    /// Looks up the Ethernet address for an IPv4 address. Entries past their
    /// lifetime are misses; the sweep purges them.
    pub fn eth_addr_for_ip(&mut self, ipv4_addr: Ipv4Address) -> Option<EthernetAddress> {
        let now = self.time_env.now_instant();
        let expiration = self.expiration;

        match self.entries.get(&ipv4_addr) {
            Some(entry) if now.duration_since(entry.in_cache_since) <= expiration => {
                Some(entry.eth_addr)
            }
            _ => None,
        }
    }

    /// Creates or refreshes the mapping for an IPv4 address, resolving any
    /// pending request for it. Returns the packets that were waiting on the
    /// resolution, in arrival order; the caller owns transmitting them.
    pub fn set_eth_addr_for_ip(
        &mut self,
        ipv4_addr: Ipv4Address,
        eth_addr: EthernetAddress,
    ) -> Vec<QueuedPacket> {
        let in_cache_since = self.time_env.now_instant();

        self.entries.insert(
            ipv4_addr,
            Entry {
                eth_addr,
                in_cache_since,
            },
        );

        match self.requests.iter().position(|req| req.target == ipv4_addr) {
            Some(i) => self.requests.remove(i).packets,
            None => Vec::new(),
        }
    }

    /// Parks a packet until its next hop resolves. Packets toward the same
    /// unresolved address share a single request and its retry schedule.
    ///
    /// Returns true when a new pending request was created; the caller must
    /// broadcast the initial ARP request for it.
    pub fn queue_packet(
        &mut self,
        target: Ipv4Address,
        egress: &str,
        frame: Vec<u8>,
    ) -> bool {
        let packet = QueuedPacket {
            frame,
            egress: egress.to_string(),
        };

        match self.requests.iter_mut().find(|req| req.target == target) {
            Some(req) => {
                req.packets.push(packet);
                false
            }
            None => {
                self.requests.push(Request {
                    target,
                    egress: egress.to_string(),
                    last_send: self.time_env.now_instant(),
                    attempts: 1,
                    packets: vec![packet],
                });
                true
            }
        }
    }

    /// Purges expired entries and advances the retry state of every pending
    /// request. Requests whose retry interval elapsed are either scheduled
    /// for another broadcast or, once the attempt limit is reached, removed
    /// and reported as failures.
    pub fn sweep(&mut self) -> Sweep {
        let now = self.time_env.now_instant();
        let expiration = self.expiration;
        let retry_interval = self.retry_interval;

        self.entries
            .retain(|_, entry| now.duration_since(entry.in_cache_since) <= expiration);

        let mut retries = Vec::new();
        let mut failures = Vec::new();

        let mut i = 0;
        while i < self.requests.len() {
            if now.duration_since(self.requests[i].last_send) < retry_interval {
                i += 1;
                continue;
            }

            if self.requests[i].attempts >= MAX_SEND_ATTEMPTS {
                let req = self.requests.remove(i);
                failures.push(FailedRequest {
                    target: req.target,
                    packets: req.packets,
                });
            } else {
                let req = &mut self.requests[i];
                req.attempts += 1;
                req.last_send = now;
                retries.push((req.target, req.egress.clone()));
                i += 1;
            }
        }

        Sweep { retries, failures }
    }

    /// Checks if a pending request exists for an address.
    #[cfg(test)]
    fn is_pending(&self, target: Ipv4Address) -> bool {
        self.requests.iter().any(|req| req.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::MockEnv;

    fn arp_cache() -> (ArpCache<MockEnv>, MockEnv) {
        let time_env = MockEnv::new();
        (
            ArpCache::new(ENTRY_LIFETIME_SECS, time_env.clone()),
            time_env,
        )
    }

    fn ipv4(i: u8) -> Ipv4Address {
        Ipv4Address::new([10, 0, 0, i])
    }

    fn eth(i: u8) -> EthernetAddress {
        EthernetAddress::new([0, 0, 0, 0, 0, i])
    }

    #[test]
    fn test_lookup_ip_with_no_mapping() {
        let (mut arp_cache, _) = arp_cache();
        assert_matches!(arp_cache.eth_addr_for_ip(ipv4(0)), None);
    }

    #[test]
    fn test_lookup_ip_with_mapping() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.set_eth_addr_for_ip(ipv4(0), eth(0));
        assert_eq!(arp_cache.eth_addr_for_ip(ipv4(0)).unwrap(), eth(0));

        time_env.advance(Duration::from_secs(ENTRY_LIFETIME_SECS));
        assert_eq!(arp_cache.eth_addr_for_ip(ipv4(0)).unwrap(), eth(0));
    }

    #[test]
    fn test_lookup_ip_after_expiring() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.set_eth_addr_for_ip(ipv4(0), eth(0));
        time_env.advance(Duration::from_secs(ENTRY_LIFETIME_SECS + 1));
        assert_matches!(arp_cache.eth_addr_for_ip(ipv4(0)), None);
    }

    #[test]
    fn test_sweep_purges_expired_entries() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.set_eth_addr_for_ip(ipv4(0), eth(0));
        time_env.advance(Duration::from_secs(ENTRY_LIFETIME_SECS + 1));
        arp_cache.sweep();
        assert!(arp_cache.entries.is_empty());
    }

    #[test]
    fn test_queue_packet_coalesces_requests() {
        let (mut arp_cache, _) = arp_cache();

        assert!(arp_cache.queue_packet(ipv4(0), "eth0", vec![1]));
        assert!(!arp_cache.queue_packet(ipv4(0), "eth0", vec![2]));
        assert!(!arp_cache.queue_packet(ipv4(0), "eth0", vec![3]));
        assert_eq!(1, arp_cache.requests.len());

        // A different target gets a request of its own.
        assert!(arp_cache.queue_packet(ipv4(1), "eth1", vec![4]));
        assert_eq!(2, arp_cache.requests.len());
    }

    #[test]
    fn test_resolution_flushes_packets_in_order() {
        let (mut arp_cache, _) = arp_cache();

        for i in 0 .. 4 {
            arp_cache.queue_packet(ipv4(0), "eth0", vec![i]);
        }

        let flushed = arp_cache.set_eth_addr_for_ip(ipv4(0), eth(7));
        let frames: Vec<_> = flushed.iter().map(|packet| packet.frame[0]).collect();
        assert_eq!(vec![0, 1, 2, 3], frames);

        // Request and entry are mutually exclusive.
        assert!(!arp_cache.is_pending(ipv4(0)));
        assert_eq!(arp_cache.eth_addr_for_ip(ipv4(0)).unwrap(), eth(7));
    }

    #[test]
    fn test_sweep_schedules_retries() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.queue_packet(ipv4(0), "eth0", vec![1]);

        // The initial broadcast just happened, nothing to do yet.
        let sweep = arp_cache.sweep();
        assert!(sweep.retries.is_empty());
        assert!(sweep.failures.is_empty());

        time_env.advance(Duration::from_secs(RETRY_INTERVAL_SECS));
        let sweep = arp_cache.sweep();
        assert_eq!(vec![(ipv4(0), "eth0".to_string())], sweep.retries);
        assert!(sweep.failures.is_empty());
    }

    #[test]
    fn test_sweep_fails_request_after_max_attempts() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.queue_packet(ipv4(0), "eth0", vec![1]);
        arp_cache.queue_packet(ipv4(0), "eth0", vec![2]);

        for _ in 0 .. MAX_SEND_ATTEMPTS - 1 {
            time_env.advance(Duration::from_secs(RETRY_INTERVAL_SECS));
            let sweep = arp_cache.sweep();
            assert_eq!(1, sweep.retries.len());
            assert!(sweep.failures.is_empty());
        }

        time_env.advance(Duration::from_secs(RETRY_INTERVAL_SECS));
        let sweep = arp_cache.sweep();
        assert!(sweep.retries.is_empty());
        assert_eq!(1, sweep.failures.len());
        assert_eq!(ipv4(0), sweep.failures[0].target);

        let frames: Vec<_> = sweep.failures[0]
            .packets
            .iter()
            .map(|packet| packet.frame[0])
            .collect();
        assert_eq!(vec![1, 2], frames);

        assert!(!arp_cache.is_pending(ipv4(0)));
    }

    #[test]
    fn test_late_reply_after_failure_finds_no_queue() {
        let (mut arp_cache, time_env) = arp_cache();

        arp_cache.queue_packet(ipv4(0), "eth0", vec![1]);

        for _ in 0 .. MAX_SEND_ATTEMPTS {
            time_env.advance(Duration::from_secs(RETRY_INTERVAL_SECS));
            arp_cache.sweep();
        }

        assert!(arp_cache.set_eth_addr_for_ip(ipv4(0), eth(0)).is_empty());
    }
}
