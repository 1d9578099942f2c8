use std::cmp;

use crate::core::repr::{
    eth_types,
    ipv4_flags,
    ipv4_protocols,
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Packet,
};
use crate::core::service::{
    arp,
    ethernet,
    Router,
};
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// TTL for packets originated by the router itself.
pub const DEFAULT_TTL: u8 = 64;

/// Handles an ICMP packet addressed to one of the router's interfaces.
///
/// Echo requests produce an echo reply on the ingress interface; everything
/// else is dropped with a diagnostic.
pub fn recv_packet<E: Env>(
    router: &mut Router<E>,
    eth_frame: &EthernetFrame<&[u8]>,
    ipv4_packet: &Ipv4Packet<&[u8]>,
    ingress: &str,
) -> Result<()> {
    let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload())?;

    if let Err(err) = icmp_packet.check_encoding() {
        debug!("Dropping ICMP packet from {} with {:?}.", ipv4_packet.src_addr(), err);
        return Err(err);
    }

    match Icmpv4Repr::deserialize(&icmp_packet) {
        Ok(Icmpv4Repr::EchoRequest { .. }) => {
            debug!("Got a ping from {}; sending response.", ipv4_packet.src_addr());
            send_echo_reply(router, eth_frame, ingress)
        }
        _ => {
            debug!(
                "Ignoring ICMP packet from {} with type {}/{}.",
                ipv4_packet.src_addr(),
                icmp_packet._type(),
                icmp_packet.code()
            );
            Err(Error::Ignored)
        }
    }
}

/// Turns an echo request back around: link and IP addresses swapped, a fresh
/// TTL, type set to echo reply, both checksums refilled, transmitted on the
/// ingress interface.
fn send_echo_reply<E: Env>(
    router: &mut Router<E>,
    eth_frame: &EthernetFrame<&[u8]>,
    ingress: &str,
) -> Result<()> {
    let mut frame = eth_frame.as_ref().to_vec();

    {
        let mut eth_frame = EthernetFrame::try_new(&mut frame[..])?;
        let (eth_src, eth_dst) = (eth_frame.src_addr(), eth_frame.dst_addr());
        eth_frame.set_src_addr(eth_dst);
        eth_frame.set_dst_addr(eth_src);

        let mut ipv4_packet = Ipv4Packet::try_new(eth_frame.payload_mut())?;
        let (ip_src, ip_dst) = (ipv4_packet.src_addr(), ipv4_packet.dst_addr());
        ipv4_packet.set_src_addr(ip_dst);
        ipv4_packet.set_dst_addr(ip_src);
        ipv4_packet.set_ttl(DEFAULT_TTL);
        ipv4_packet.fill_header_checksum();

        let mut icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload_mut())?;
        icmp_packet.set_type(0);
        icmp_packet.set_code(0);
        icmp_packet.fill_checksum();
    }

    ethernet::transmit_frame(router, &frame, ingress)
}

/// Builds and sends an ICMP error triggered by a received frame.
///
/// The error is sourced from the interface that routes back toward the
/// original sender, so the source address is always reachable from the
/// receiver's point of view; without a route back the error is undeliverable
/// and dropped. Delivery goes through the same ARP hit/miss protocol as any
/// forwarded packet.
pub fn send_error<E: Env>(
    router: &mut Router<E>,
    orig_frame: &[u8],
    icmp_repr: Icmpv4Repr,
) -> Result<()> {
    let orig_eth_frame = EthernetFrame::try_new(orig_frame)?;
    let orig_src = {
        let orig_ipv4_packet = Ipv4Packet::try_new(orig_eth_frame.payload())?;
        orig_ipv4_packet.src_addr()
    };

    let (next_hop, egress) = match router.routes.longest_prefix_match(orig_src) {
        Some(route) => (route.next_hop(orig_src), route.iface.clone()),
        None => {
            debug!("No route back to {}; dropping ICMP error.", orig_src);
            return Err(Error::Ignored);
        }
    };

    let src_addr = match router.interfaces.get(&egress) {
        Some(iface) => iface.ipv4_addr,
        None => {
            debug!("No interface named {} to source ICMP error from.", egress);
            return Err(Error::Ignored);
        }
    };

    let ipv4_packet_len = Ipv4Packet::<&[u8]>::buffer_len(icmp_repr.buffer_len());
    let mut frame = vec![0; EthernetFrame::<&[u8]>::buffer_len(ipv4_packet_len)];

    {
        let mut eth_frame = EthernetFrame::try_new(&mut frame[..])?;
        // Link addresses are rewritten by the resolution path.
        eth_frame.set_payload_type(eth_types::IPV4);

        let mut ipv4_packet = Ipv4Packet::try_new(eth_frame.payload_mut())?;
        ipv4_packet.set_version(4);
        ipv4_packet.set_header_len(Ipv4Packet::<&[u8]>::MIN_HEADER_LEN as u8);
        ipv4_packet.set_dscp_and_ecn(0);
        ipv4_packet.set_total_len(ipv4_packet_len as u16);
        ipv4_packet.set_identification(rand::random::<u16>());
        ipv4_packet.set_flags_and_fragment(ipv4_flags::DONT_FRAGMENT);
        ipv4_packet.set_ttl(DEFAULT_TTL);
        ipv4_packet.set_protocol(ipv4_protocols::ICMP);
        ipv4_packet.set_src_addr(src_addr);
        ipv4_packet.set_dst_addr(orig_src);
        ipv4_packet.fill_header_checksum();

        let mut icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload_mut())?;

        {
            // The data quota echoes the triggering IP header and the leading
            // octets of its payload, zero padded when the original is
            // shorter.
            let data = icmp_packet.payload_mut();
            let orig = orig_eth_frame.payload();
            let n = cmp::min(data.len(), orig.len());
            data[.. n].copy_from_slice(&orig[.. n]);
        }

        icmp_repr.serialize(&mut icmp_packet).unwrap();
    }

    arp::resolve_or_queue(router, next_hop, &egress, frame)
}
