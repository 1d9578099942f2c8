use crate::core::repr::{
    eth_types,
    EthernetFrame,
};
use crate::core::service::{
    arp,
    ipv4,
    Router,
};
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// Demultiplexes an inbound frame to the IP or ARP processor by ethertype.
pub fn recv_frame<E: Env>(router: &mut Router<E>, frame: &[u8], ingress: &str) -> Result<()> {
    let eth_frame = EthernetFrame::try_new(frame)?;

    match eth_frame.payload_type() {
        eth_types::ARP => arp::recv_packet(router, &eth_frame, ingress),
        eth_types::IPV4 => ipv4::recv_packet(router, &eth_frame, ingress),
        i => {
            debug!("Ignoring frame with ethertype 0x{:04X}.", i);
            Err(Error::Ignored)
        }
    }
}

/// Builds and transmits an Ethernet frame on the named interface.
///
/// The source hardware address is filled in from the egress interface; the
/// closure is responsible for the destination address, ethertype, and
/// payload.
pub fn send_frame<E: Env, F>(
    router: &mut Router<E>,
    egress: &str,
    eth_frame_len: usize,
    f: F,
) -> Result<()>
where
    F: FnOnce(&mut EthernetFrame<&mut [u8]>),
{
    let src_addr = match router.interfaces.get(egress) {
        Some(iface) => iface.ethernet_addr,
        None => {
            debug!("No interface named {} to send from.", egress);
            return Err(Error::Ignored);
        }
    };

    let mut eth_buffer = vec![0; eth_frame_len];

    {
        let mut eth_frame = EthernetFrame::try_new(&mut eth_buffer[..])?;
        f(&mut eth_frame);
        eth_frame.set_src_addr(src_addr);
    }

    transmit_frame(router, &eth_buffer, egress)
}

/// Hands an already built frame to the transport. Failures are logged, never
/// retried.
pub fn transmit_frame<E: Env>(router: &mut Router<E>, frame: &[u8], egress: &str) -> Result<()> {
    if let Err(err) = router.dev.transmit(frame, egress) {
        warn!("Transmit of {} bytes on {} failed with {:?}.", frame.len(), egress, err);
        return Err(err);
    }

    Ok(())
}
