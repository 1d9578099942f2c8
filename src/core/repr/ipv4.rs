use std::cmp;
use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::io::Write;
use std::result::Result as StdResult;
use std::str::FromStr;

use byteorder::{
    NetworkEndian,
    ReadBytesExt,
    WriteBytesExt,
};

use crate::core::check::internet_checksum;
use crate::{
    Error,
    Result,
};

/// [IPv4 address](https://en.wikipedia.org/wiki/IPv4) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 4]);

impl Address {
    pub const UNSPECIFIED: Address = Address([0; 4]);

    /// Creates an IPv4 address from a network byte order buffer.
    pub fn new(addr: [u8; 4]) -> Address {
        Address(addr)
    }

    /// Tries to create an IPv4 address from a network byte order slice.
    pub fn try_new(addr: &[u8]) -> Result<Address> {
        if addr.len() != 4 {
            return Err(Error::Exhausted);
        }

        let mut _addr: [u8; 4] = [0; 4];
        _addr.clone_from_slice(addr);
        Ok(Address(_addr))
    }

    /// Returns a reference to the network byte order representation of the
    /// address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the address as a host byte order integer, useful for prefix
    /// arithmetic.
    pub fn as_u32(&self) -> u32 {
        (&self.0[..]).read_u32::<NetworkEndian>().unwrap()
    }

    /// Checks if this is the unspecified (0.0.0.0) address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Address {
    type Err = ();

    /// Parses an IPv4 address from an A.B.C.D style string.
    fn from_str(addr: &str) -> StdResult<Address, Self::Err> {
        let (bytes, unknown): (Vec<_>, Vec<_>) = addr.split(".")
            .map(|token| token.parse::<u8>())
            .partition(|byte| !byte.is_err());

        if bytes.len() != 4 || unknown.len() > 0 {
            return Err(());
        }

        let bytes: Vec<_> = bytes.into_iter().map(|byte| byte.unwrap()).collect();

        let mut ipv4: [u8; 4] = [0; 4];
        ipv4.clone_from_slice(&bytes);

        Ok(Address::new(ipv4))
    }
}

/// [Assigned protocol numbers](https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers).
pub mod ipv4_protocols {
    pub const ICMP: u8 = 1;

    pub const TCP: u8 = 6;

    pub const UDP: u8 = 17;
}

pub mod ipv4_flags {
    pub const DONT_FRAGMENT: u16 = 0x4000;
}

mod fields {
    use std::ops::Range;

    pub const VERSION_AND_HEADER_LEN: usize = 0;

    pub const DSCP_AND_ECN: usize = 1;

    pub const TOTAL_LEN: Range<usize> = 2 .. 4;

    pub const IDENTIFICATION: Range<usize> = 4 .. 6;

    pub const FLAGS_AND_FRAGMENT: Range<usize> = 6 .. 8;

    pub const TTL: usize = 8;

    pub const PROTOCOL: usize = 9;

    pub const CHECKSUM: Range<usize> = 10 .. 12;

    pub const SRC_ADDR: Range<usize> = 12 .. 16;

    pub const DST_ADDR: Range<usize> = 16 .. 20;
}

/// View of a byte buffer as an IPv4 packet.
#[derive(Debug)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> AsMut<[u8]> for Packet<T> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut()
    }
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub const MIN_HEADER_LEN: usize = 20;

    /// Tries to create an IPv4 packet view over a byte buffer.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        if buffer.as_ref().len() < Self::MIN_HEADER_LEN {
            Err(Error::Exhausted)
        } else {
            Ok(Packet { buffer })
        }
    }

    /// Returns the length of an IPv4 packet with no options and the specified
    /// payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::MIN_HEADER_LEN + payload_len
    }

    /// Checks if the header has a valid encoding, including the header
    /// checksum computed over the declared header length with the checksum
    /// field zeroed.
    pub fn check_encoding(&self) -> Result<()> {
        if self.version() != 4 {
            return Err(Error::Malformed);
        }

        let buffer_len = self.buffer.as_ref().len();
        let header_len = self.header_len() as usize;
        let total_len = self.total_len() as usize;

        if header_len < Self::MIN_HEADER_LEN || header_len > buffer_len || total_len < header_len {
            return Err(Error::Malformed);
        }

        // Links may pad frames; buffers shorter than the declared total
        // length are truncated packets, though.
        if total_len > buffer_len {
            return Err(Error::Malformed);
        }

        if self.gen_header_checksum() != 0 {
            return Err(Error::Checksum);
        }

        Ok(())
    }

    /// Calculates the checksum over the declared header length.
    pub fn gen_header_checksum(&self) -> u16 {
        let header_len = cmp::min(self.header_len() as usize, self.buffer.as_ref().len());
        internet_checksum(&self.buffer.as_ref()[.. header_len])
    }

    pub fn version(&self) -> u8 {
        (self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] & 0xF0) >> 4
    }

    /// Returns the header length in bytes.
    pub fn header_len(&self) -> u8 {
        (self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] & 0x0F) * 4
    }

    pub fn total_len(&self) -> u16 {
        (&self.buffer.as_ref()[fields::TOTAL_LEN])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn identification(&self) -> u16 {
        (&self.buffer.as_ref()[fields::IDENTIFICATION])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn ttl(&self) -> u8 {
        self.buffer.as_ref()[fields::TTL]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer.as_ref()[fields::PROTOCOL]
    }

    pub fn header_checksum(&self) -> u16 {
        (&self.buffer.as_ref()[fields::CHECKSUM])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn src_addr(&self) -> Address {
        Address::try_new(&self.buffer.as_ref()[fields::SRC_ADDR]).unwrap()
    }

    pub fn dst_addr(&self) -> Address {
        Address::try_new(&self.buffer.as_ref()[fields::DST_ADDR]).unwrap()
    }

    /// Returns an immutable view of the payload, delimited by the header and
    /// total length fields.
    pub fn payload(&self) -> &[u8] {
        let end = cmp::min(self.total_len() as usize, self.buffer.as_ref().len());
        let start = cmp::min(self.header_len() as usize, end);
        &self.buffer.as_ref()[start .. end]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_version(&mut self, version: u8) {
        let byte = self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN];
        self.buffer.as_mut()[fields::VERSION_AND_HEADER_LEN] = (byte & 0x0F) | (version << 4);
    }

    /// Sets the header length field; the length is specified in bytes and
    /// must be a multiple of 4.
    pub fn set_header_len(&mut self, header_len: u8) {
        let byte = self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN];
        self.buffer.as_mut()[fields::VERSION_AND_HEADER_LEN] = (byte & 0xF0) | (header_len / 4);
    }

    pub fn set_dscp_and_ecn(&mut self, dscp_and_ecn: u8) {
        self.buffer.as_mut()[fields::DSCP_AND_ECN] = dscp_and_ecn;
    }

    pub fn set_total_len(&mut self, total_len: u16) {
        (&mut self.buffer.as_mut()[fields::TOTAL_LEN])
            .write_u16::<NetworkEndian>(total_len)
            .unwrap()
    }

    pub fn set_identification(&mut self, identification: u16) {
        (&mut self.buffer.as_mut()[fields::IDENTIFICATION])
            .write_u16::<NetworkEndian>(identification)
            .unwrap()
    }

    pub fn set_flags_and_fragment(&mut self, flags_and_fragment: u16) {
        (&mut self.buffer.as_mut()[fields::FLAGS_AND_FRAGMENT])
            .write_u16::<NetworkEndian>(flags_and_fragment)
            .unwrap()
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.buffer.as_mut()[fields::TTL] = ttl;
    }

    pub fn set_protocol(&mut self, protocol: u8) {
        self.buffer.as_mut()[fields::PROTOCOL] = protocol;
    }

    pub fn set_header_checksum(&mut self, checksum: u16) {
        (&mut self.buffer.as_mut()[fields::CHECKSUM])
            .write_u16::<NetworkEndian>(checksum)
            .unwrap()
    }

    pub fn set_src_addr(&mut self, addr: Address) {
        (&mut self.buffer.as_mut()[fields::SRC_ADDR])
            .write(addr.as_bytes())
            .unwrap();
    }

    pub fn set_dst_addr(&mut self, addr: Address) {
        (&mut self.buffer.as_mut()[fields::DST_ADDR])
            .write(addr.as_bytes())
            .unwrap();
    }

    /// Zeros the checksum field and refills it with a checksum computed over
    /// the declared header length.
    pub fn fill_header_checksum(&mut self) {
        self.set_header_checksum(0);
        let checksum = self.gen_header_checksum();
        self.set_header_checksum(checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let end = cmp::min(self.total_len() as usize, self.buffer.as_ref().len());
        let start = cmp::min(self.header_len() as usize, end);
        &mut self.buffer.as_mut()[start .. end]
    }
}
