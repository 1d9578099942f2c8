use crate::core::repr::{
    ipv4_protocols,
    EthernetFrame,
    Icmpv4DestinationUnreachable,
    Icmpv4Repr,
    Icmpv4TimeExceeded,
    Ipv4Packet,
};
use crate::core::service::{
    arp,
    icmpv4,
    Router,
};
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// Validates an inbound IPv4 packet and either delivers it locally or
/// forwards it.
///
/// Truncated, non-version-4, or checksum-failing packets are dropped with a
/// diagnostic and no network visible signal.
pub fn recv_packet<E: Env>(
    router: &mut Router<E>,
    eth_frame: &EthernetFrame<&[u8]>,
    ingress: &str,
) -> Result<()> {
    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload())?;

    if let Err(err) = ipv4_packet.check_encoding() {
        debug!("Dropping IPv4 packet from {} with {:?}.", ingress, err);
        return Err(err);
    }

    if router.interfaces.owns_addr(ipv4_packet.dst_addr()) {
        recv_local(router, eth_frame, &ipv4_packet, ingress)
    } else {
        forward(router, eth_frame)
    }
}

fn recv_local<E: Env>(
    router: &mut Router<E>,
    eth_frame: &EthernetFrame<&[u8]>,
    ipv4_packet: &Ipv4Packet<&[u8]>,
    ingress: &str,
) -> Result<()> {
    match ipv4_packet.protocol() {
        ipv4_protocols::ICMP => icmpv4::recv_packet(router, eth_frame, ipv4_packet, ingress),
        ipv4_protocols::TCP | ipv4_protocols::UDP => {
            debug!(
                "No open port for packet from {}; signaling port unreachable.",
                ipv4_packet.src_addr()
            );
            icmpv4::send_error(
                router,
                eth_frame.as_ref(),
                Icmpv4Repr::DestinationUnreachable(Icmpv4DestinationUnreachable::PortUnreachable),
            )
        }
        i => {
            debug!("Ignoring local IPv4 packet with protocol {}.", i);
            Err(Error::Ignored)
        }
    }
}

fn forward<E: Env>(router: &mut Router<E>, eth_frame: &EthernetFrame<&[u8]>) -> Result<()> {
    // TTL is checked before any mutation so the error message embeds the
    // header as it arrived.
    {
        let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload())?;
        if ipv4_packet.ttl() <= 1 {
            debug!(
                "TTL expired for packet from {} to {}.",
                ipv4_packet.src_addr(),
                ipv4_packet.dst_addr()
            );
            return icmpv4::send_error(
                router,
                eth_frame.as_ref(),
                Icmpv4Repr::TimeExceeded(Icmpv4TimeExceeded::TtlExpired),
            );
        }
    }

    let mut frame = eth_frame.as_ref().to_vec();

    let dst_addr = {
        let mut eth_frame = EthernetFrame::try_new(&mut frame[..])?;
        let mut ipv4_packet = Ipv4Packet::try_new(eth_frame.payload_mut())?;
        let ttl = ipv4_packet.ttl();
        ipv4_packet.set_ttl(ttl - 1);
        ipv4_packet.fill_header_checksum();
        ipv4_packet.dst_addr()
    };

    let (next_hop, egress) = match router.routes.longest_prefix_match(dst_addr) {
        Some(route) => (route.next_hop(dst_addr), route.iface.clone()),
        None => {
            debug!("No route to {}; signaling net unreachable.", dst_addr);
            return icmpv4::send_error(
                router,
                &frame,
                Icmpv4Repr::DestinationUnreachable(Icmpv4DestinationUnreachable::NetUnreachable),
            );
        }
    };

    arp::resolve_or_queue(router, next_hop, &egress, frame)
}
