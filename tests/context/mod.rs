// Not every test binary uses every helper.
#![allow(dead_code)]

use softroute::core::dev::MockTransport;
use softroute::core::iface::Interface;
use softroute::core::repr::{
    eth_types,
    Arp,
    ArpOp,
    EthernetAddress,
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
    ipv4_protocols,
};
use softroute::core::route::Route;
use softroute::core::service::Router;
use softroute::core::time::MockEnv;

lazy_static! {
    pub static ref ROUTER_MAC_0: EthernetAddress = "02:00:00:00:00:01".parse().unwrap();
    pub static ref ROUTER_MAC_1: EthernetAddress = "02:00:00:00:00:02".parse().unwrap();
    pub static ref ROUTER_IP_0: Ipv4Address = "10.0.1.1".parse().unwrap();
    pub static ref ROUTER_IP_1: Ipv4Address = "10.0.2.1".parse().unwrap();
    pub static ref HOST_A_MAC: EthernetAddress = "0A:00:00:00:00:01".parse().unwrap();
    pub static ref HOST_A_IP: Ipv4Address = "10.0.1.100".parse().unwrap();
    pub static ref HOST_B_MAC: EthernetAddress = "0B:00:00:00:00:02".parse().unwrap();
    pub static ref HOST_B_IP: Ipv4Address = "10.0.2.200".parse().unwrap();
}

fn interfaces() -> Vec<Interface> {
    vec![
        Interface {
            name: "eth0".to_string(),
            ipv4_addr: *ROUTER_IP_0,
            ethernet_addr: *ROUTER_MAC_0,
        },
        Interface {
            name: "eth1".to_string(),
            ipv4_addr: *ROUTER_IP_1,
            ethernet_addr: *ROUTER_MAC_1,
        },
    ]
}

fn routes() -> Vec<Route> {
    vec![
        Route {
            dst: "10.0.1.0".parse().unwrap(),
            mask: "255.255.255.0".parse().unwrap(),
            gateway: Ipv4Address::UNSPECIFIED,
            iface: "eth0".to_string(),
        },
        Route {
            dst: "10.0.2.0".parse().unwrap(),
            mask: "255.255.255.0".parse().unwrap(),
            gateway: Ipv4Address::UNSPECIFIED,
            iface: "eth1".to_string(),
        },
    ]
}

/// Creates a two interface router on 10.0.1.0/24 and 10.0.2.0/24 with a
/// recording transport and a controllable clock.
pub fn router() -> (Router<MockEnv>, MockTransport, MockEnv) {
    let _ = env_logger::try_init();

    let dev = MockTransport::new();
    let time_env = MockEnv::new();
    let router = Router::with_env(
        Box::new(dev.clone()),
        interfaces(),
        routes(),
        time_env.clone(),
    );

    (router, dev, time_env)
}

/// Same topology plus a default route through a gateway on eth1.
pub fn router_with_default_route() -> (Router<MockEnv>, MockTransport, MockEnv) {
    let _ = env_logger::try_init();

    let mut all_routes = routes();
    all_routes.push(Route {
        dst: Ipv4Address::UNSPECIFIED,
        mask: Ipv4Address::UNSPECIFIED,
        gateway: "10.0.2.254".parse().unwrap(),
        iface: "eth1".to_string(),
    });

    let dev = MockTransport::new();
    let time_env = MockEnv::new();
    let router = Router::with_env(
        Box::new(dev.clone()),
        interfaces(),
        all_routes,
        time_env.clone(),
    );

    (router, dev, time_env)
}

/// Builds a complete Ethernet + IPv4 frame with a valid header checksum.
pub fn ipv4_frame(
    src_mac: EthernetAddress,
    dst_mac: EthernetAddress,
    src_ip: Ipv4Address,
    dst_ip: Ipv4Address,
    protocol: u8,
    ttl: u8,
    payload: &[u8],
) -> Vec<u8> {
    let ipv4_packet_len = Ipv4Packet::<&[u8]>::buffer_len(payload.len());
    let mut frame = vec![0; EthernetFrame::<&[u8]>::buffer_len(ipv4_packet_len)];

    {
        let mut eth_frame = EthernetFrame::try_new(&mut frame[..]).unwrap();
        eth_frame.set_dst_addr(dst_mac);
        eth_frame.set_src_addr(src_mac);
        eth_frame.set_payload_type(eth_types::IPV4);

        let mut ipv4_packet = Ipv4Packet::try_new(eth_frame.payload_mut()).unwrap();
        ipv4_packet.set_version(4);
        ipv4_packet.set_header_len(20);
        ipv4_packet.set_dscp_and_ecn(0);
        ipv4_packet.set_total_len(ipv4_packet_len as u16);
        ipv4_packet.set_identification(1);
        ipv4_packet.set_flags_and_fragment(0);
        ipv4_packet.set_ttl(ttl);
        ipv4_packet.set_protocol(protocol);
        ipv4_packet.set_src_addr(src_ip);
        ipv4_packet.set_dst_addr(dst_ip);
        ipv4_packet.fill_header_checksum();
        ipv4_packet.payload_mut().copy_from_slice(payload);
    }

    frame
}

/// A UDP-ish frame from host A toward the destination, with a payload tag to
/// tell frames apart.
pub fn udp_frame_from_a(dst_ip: Ipv4Address, ttl: u8, tag: u8) -> Vec<u8> {
    ipv4_frame(
        *HOST_A_MAC,
        *ROUTER_MAC_0,
        *HOST_A_IP,
        dst_ip,
        ipv4_protocols::UDP,
        ttl,
        &[tag; 8],
    )
}

pub fn echo_request_frame(
    src_mac: EthernetAddress,
    dst_mac: EthernetAddress,
    src_ip: Ipv4Address,
    dst_ip: Ipv4Address,
    id: u16,
    seq: u16,
    data: &[u8],
) -> Vec<u8> {
    let mut icmp_buffer = vec![0; Icmpv4Packet::<&[u8]>::buffer_len(data.len())];

    {
        let mut icmp_packet = Icmpv4Packet::try_new(&mut icmp_buffer[..]).unwrap();
        icmp_packet.payload_mut().copy_from_slice(data);
        Icmpv4Repr::EchoRequest { id, seq }
            .serialize(&mut icmp_packet)
            .unwrap();
    }

    ipv4_frame(
        src_mac,
        dst_mac,
        src_ip,
        dst_ip,
        ipv4_protocols::ICMP,
        64,
        &icmp_buffer,
    )
}

pub fn arp_frame(
    op: ArpOp,
    source_hw_addr: EthernetAddress,
    source_proto_addr: Ipv4Address,
    target_hw_addr: EthernetAddress,
    target_proto_addr: Ipv4Address,
    eth_dst_addr: EthernetAddress,
) -> Vec<u8> {
    let arp_repr = Arp {
        op,
        source_hw_addr,
        source_proto_addr,
        target_hw_addr,
        target_proto_addr,
    };

    let mut frame = vec![0; EthernetFrame::<&[u8]>::buffer_len(arp_repr.buffer_len())];

    {
        let mut eth_frame = EthernetFrame::try_new(&mut frame[..]).unwrap();
        eth_frame.set_dst_addr(eth_dst_addr);
        eth_frame.set_src_addr(source_hw_addr);
        eth_frame.set_payload_type(eth_types::ARP);
        arp_repr.serialize(eth_frame.payload_mut()).unwrap();
    }

    frame
}

/// Feeds the router an ARP reply so a host's mapping is resolved up front.
pub fn seed_mapping(
    router: &mut Router<MockEnv>,
    mac: EthernetAddress,
    ip: Ipv4Address,
    router_mac: EthernetAddress,
    router_ip: Ipv4Address,
    ingress: &str,
) {
    let reply = arp_frame(ArpOp::Reply, mac, ip, router_mac, router_ip, router_mac);
    router.handle_frame(&reply, ingress);
}
