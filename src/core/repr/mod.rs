//! Serialization and deserialization of network packets.
//!
//! The `repr` module provides abstractions for serializing and deserializing
//! packets and frames at different network layers to/from byte buffers.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;

pub use self::arp::{
    Arp,
    Op as ArpOp,
};
pub use self::ethernet::{
    eth_types,
    Address as EthernetAddress,
    Frame as EthernetFrame,
};
pub use self::icmpv4::{
    DestinationUnreachable as Icmpv4DestinationUnreachable,
    Packet as Icmpv4Packet,
    Repr as Icmpv4Repr,
    TimeExceeded as Icmpv4TimeExceeded,
};
pub use self::ipv4::{
    ipv4_flags,
    ipv4_protocols,
    Address as Ipv4Address,
    Packet as Ipv4Packet,
};
