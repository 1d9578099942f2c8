use crate::core::repr::{
    eth_types,
    Arp,
    ArpOp,
    EthernetAddress,
    EthernetFrame,
    Ipv4Address,
};
use crate::core::service::{
    ethernet,
    Router,
};
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// Handles an inbound ARP packet.
///
/// Requests for an address owned by the receiving interface are answered;
/// replies (gratuitous ones included) install a cache mapping and flush any
/// packets that were waiting on it.
pub fn recv_packet<E: Env>(
    router: &mut Router<E>,
    eth_frame: &EthernetFrame<&[u8]>,
    ingress: &str,
) -> Result<()> {
    let arp_repr = match Arp::deserialize(eth_frame.payload()) {
        Ok(arp_repr) => arp_repr,
        Err(err) => {
            debug!("Dropping ARP packet from {} with {:?}.", ingress, err);
            return Err(err);
        }
    };

    match arp_repr.op {
        ArpOp::Request => recv_request(router, &arp_repr, ingress),
        ArpOp::Reply => recv_reply(router, &arp_repr),
    }
}

fn recv_request<E: Env>(router: &mut Router<E>, arp_repr: &Arp, ingress: &str) -> Result<()> {
    let iface_addrs = match router.interfaces.get(ingress) {
        Some(iface) if iface.ipv4_addr == arp_repr.target_proto_addr => {
            (iface.ethernet_addr, iface.ipv4_addr)
        }
        _ => {
            debug!(
                "Ignoring ARP request for {} on {}.",
                arp_repr.target_proto_addr, ingress
            );
            return Err(Error::Ignored);
        }
    };

    // The reply is the request with the fields swapped around.
    let arp_reply = Arp {
        op: ArpOp::Reply,
        source_hw_addr: iface_addrs.0,
        source_proto_addr: iface_addrs.1,
        target_hw_addr: arp_repr.source_hw_addr,
        target_proto_addr: arp_repr.source_proto_addr,
    };

    debug!(
        "Sending ARP reply to {}/{}.",
        arp_reply.target_proto_addr, arp_reply.target_hw_addr
    );

    send_packet(router, ingress, &arp_reply, arp_reply.target_hw_addr)
}

fn recv_reply<E: Env>(router: &mut Router<E>, arp_repr: &Arp) -> Result<()> {
    debug!(
        "Adding mapping from {} to {}.",
        arp_repr.source_proto_addr, arp_repr.source_hw_addr
    );

    let flushed = router
        .arp_cache
        .set_eth_addr_for_ip(arp_repr.source_proto_addr, arp_repr.source_hw_addr);

    for packet in flushed {
        let mut frame = packet.frame;

        {
            let src_addr = match router.interfaces.get(&packet.egress) {
                Some(iface) => iface.ethernet_addr,
                None => {
                    debug!("Discarding queued frame for missing interface {}.", packet.egress);
                    continue;
                }
            };

            let mut eth_frame = match EthernetFrame::try_new(&mut frame[..]) {
                Ok(eth_frame) => eth_frame,
                Err(_) => continue,
            };
            eth_frame.set_dst_addr(arp_repr.source_hw_addr);
            eth_frame.set_src_addr(src_addr);
        }

        // Keep flushing the queue even if the transport rejects a frame.
        let _ = ethernet::transmit_frame(router, &frame, &packet.egress);
    }

    Ok(())
}

/// Sends an ARP packet on the named interface.
pub fn send_packet<E: Env>(
    router: &mut Router<E>,
    egress: &str,
    arp_repr: &Arp,
    dst_addr: EthernetAddress,
) -> Result<()> {
    let eth_frame_len = EthernetFrame::<&[u8]>::buffer_len(arp_repr.buffer_len());

    ethernet::send_frame(router, egress, eth_frame_len, |eth_frame| {
        eth_frame.set_dst_addr(dst_addr);
        eth_frame.set_payload_type(eth_types::ARP);
        arp_repr.serialize(eth_frame.payload_mut()).unwrap();
    })
}

/// Broadcasts an ARP request for an address out of the named interface.
pub fn send_request<E: Env>(
    router: &mut Router<E>,
    target: Ipv4Address,
    egress: &str,
) -> Result<()> {
    let iface_addrs = match router.interfaces.get(egress) {
        Some(iface) => (iface.ethernet_addr, iface.ipv4_addr),
        None => {
            debug!("No interface named {} to resolve {} from.", egress, target);
            return Err(Error::Ignored);
        }
    };

    let arp_repr = Arp {
        op: ArpOp::Request,
        source_hw_addr: iface_addrs.0,
        source_proto_addr: iface_addrs.1,
        target_hw_addr: EthernetAddress::BROADCAST,
        target_proto_addr: target,
    };

    debug!("Sending ARP request for {} on {}.", target, egress);
    send_packet(router, egress, &arp_repr, EthernetAddress::BROADCAST)
}

/// Resolves a next hop and transmits the frame, or parks the frame on the
/// pending request for the next hop.
///
/// On a cache hit the frame's link addresses are rewritten (source from the
/// egress interface, destination from the cache) and it is transmitted
/// immediately. On a miss the frame joins the queue for the next hop and, if
/// that created a new pending request, the initial ARP request is broadcast
/// right away; later re-broadcasts are driven by the cache sweep.
pub fn resolve_or_queue<E: Env>(
    router: &mut Router<E>,
    next_hop: Ipv4Address,
    egress: &str,
    mut frame: Vec<u8>,
) -> Result<()> {
    match router.arp_cache.eth_addr_for_ip(next_hop) {
        Some(eth_addr) => {
            {
                let src_addr = match router.interfaces.get(egress) {
                    Some(iface) => iface.ethernet_addr,
                    None => {
                        debug!("No interface named {} to send via.", egress);
                        return Err(Error::Ignored);
                    }
                };

                let mut eth_frame = EthernetFrame::try_new(&mut frame[..])?;
                eth_frame.set_src_addr(src_addr);
                eth_frame.set_dst_addr(eth_addr);
            }

            ethernet::transmit_frame(router, &frame, egress)
        }
        None => {
            debug!("Queueing frame for {} pending resolution.", next_hop);
            if router.arp_cache.queue_packet(next_hop, egress, frame) {
                send_request(router, next_hop, egress)?;
            }
            Ok(())
        }
    }
}
