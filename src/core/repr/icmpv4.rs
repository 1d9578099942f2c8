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

/// Number of bytes of the triggering packet (IP header + leading payload
/// octets) echoed back inside type 3 and type 11 messages.
pub const ERROR_DATA_LEN: usize = 28;

/// Safe representation of an ICMP header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    EchoRequest {
        id: u16,
        seq: u16,
    },
    EchoReply {
        id: u16,
        seq: u16,
    },
    DestinationUnreachable(DestinationUnreachable),
    TimeExceeded(TimeExceeded),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationUnreachable {
    NetUnreachable,
    HostUnreachable,
    PortUnreachable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeExceeded {
    TtlExpired,
}

impl Repr {
    /// Returns the ICMP packet size needed to serialize this representation,
    /// excluding any echo payload.
    pub fn buffer_len(&self) -> usize {
        match *self {
            Repr::DestinationUnreachable(_) | Repr::TimeExceeded(_) => {
                Packet::<&[u8]>::HEADER_LEN + ERROR_DATA_LEN
            }
            _ => Packet::<&[u8]>::HEADER_LEN,
        }
    }

    /// Tries to deserialize a packet into an ICMP representation.
    pub fn deserialize<T>(packet: &Packet<T>) -> Result<Repr>
    where
        T: AsRef<[u8]>,
    {
        fn echo_id_seq<T>(packet: &Packet<T>) -> (u16, u16)
        where
            T: AsRef<[u8]>,
        {
            (
                (&packet.header()[0 .. 2])
                    .read_u16::<NetworkEndian>()
                    .unwrap(),
                (&packet.header()[2 .. 4])
                    .read_u16::<NetworkEndian>()
                    .unwrap(),
            )
        }

        match (packet._type(), packet.code()) {
            (0, 0) => {
                let (id, seq) = echo_id_seq(packet);
                Ok(Repr::EchoReply { id, seq })
            }
            (8, 0) => {
                let (id, seq) = echo_id_seq(packet);
                Ok(Repr::EchoRequest { id, seq })
            }
            (3, 0) => Ok(Repr::DestinationUnreachable(
                DestinationUnreachable::NetUnreachable,
            )),
            (3, 1) => Ok(Repr::DestinationUnreachable(
                DestinationUnreachable::HostUnreachable,
            )),
            (3, 3) => Ok(Repr::DestinationUnreachable(
                DestinationUnreachable::PortUnreachable,
            )),
            (11, 0) => Ok(Repr::TimeExceeded(TimeExceeded::TtlExpired)),
            _ => Err(Error::Malformed),
        }
    }

    /// Serializes the ICMP representation into a packet and fills in the
    /// checksum.
    ///
    /// Any payload must be written to the packet before serializing so the
    /// checksum covers it.
    pub fn serialize<T>(&self, packet: &mut Packet<T>) -> Result<()>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        fn echo<T>(packet: &mut Packet<T>, type_of: u8, id: u16, seq: u16)
        where
            T: AsRef<[u8]> + AsMut<[u8]>,
        {
            packet.set_type(type_of);
            packet.set_code(0);

            (&mut packet.header_mut()[0 .. 2])
                .write_u16::<NetworkEndian>(id)
                .unwrap();
            (&mut packet.header_mut()[2 .. 4])
                .write_u16::<NetworkEndian>(seq)
                .unwrap();
        }

        fn error<T>(packet: &mut Packet<T>, type_of: u8, code: u8) -> Result<()>
        where
            T: AsRef<[u8]> + AsMut<[u8]>,
        {
            if packet.payload().len() != ERROR_DATA_LEN {
                return Err(Error::Exhausted);
            }
            packet.set_type(type_of);
            packet.set_code(code);
            // Unused + next MTU words.
            let zeros = [0; 4];
            packet.header_mut().copy_from_slice(&zeros[..]);
            Ok(())
        }

        match *self {
            Repr::EchoReply { id, seq } => echo(packet, 0, id, seq),
            Repr::EchoRequest { id, seq } => echo(packet, 8, id, seq),
            Repr::DestinationUnreachable(reason) => {
                let code = match reason {
                    DestinationUnreachable::NetUnreachable => 0,
                    DestinationUnreachable::HostUnreachable => 1,
                    DestinationUnreachable::PortUnreachable => 3,
                };
                error(packet, 3, code)?;
            }
            Repr::TimeExceeded(TimeExceeded::TtlExpired) => {
                error(packet, 11, 0)?;
            }
        };

        packet.fill_checksum();

        Ok(())
    }
}

/// [https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol](https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol)
mod fields {
    use std::ops::{
        Range,
        RangeFrom,
    };

    pub const TYPE: usize = 0;

    pub const CODE: usize = 1;

    pub const CHECKSUM: Range<usize> = 2 .. 4;

    pub const HEADER: Range<usize> = 4 .. 8;

    pub const PAYLOAD: RangeFrom<usize> = 8 ..;
}

/// View of a byte buffer as an ICMP packet.
#[derive(Debug)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub const HEADER_LEN: usize = 8;

    /// Tries to create an ICMP packet view over a byte buffer.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        if buffer.as_ref().len() < Self::HEADER_LEN {
            Err(Error::Exhausted)
        } else {
            Ok(Packet { buffer })
        }
    }

    /// Returns the length of an ICMP packet with the specified payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::HEADER_LEN + payload_len
    }

    /// Checks if the packet has a valid checksum.
    pub fn check_encoding(&self) -> Result<()> {
        if self.gen_packet_checksum() != 0 {
            Err(Error::Checksum)
        } else {
            Ok(())
        }
    }

    /// Calculates the checksum over the entire packet.
    pub fn gen_packet_checksum(&self) -> u16 {
        internet_checksum(self.buffer.as_ref())
    }

    pub fn _type(&self) -> u8 {
        self.buffer.as_ref()[fields::TYPE]
    }

    pub fn code(&self) -> u8 {
        self.buffer.as_ref()[fields::CODE]
    }

    pub fn checksum(&self) -> u16 {
        (&self.buffer.as_ref()[fields::CHECKSUM])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn header(&self) -> &[u8] {
        &self.buffer.as_ref()[fields::HEADER]
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[fields::PAYLOAD]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_type(&mut self, type_of: u8) {
        self.buffer.as_mut()[fields::TYPE] = type_of
    }

    pub fn set_code(&mut self, code: u8) {
        self.buffer.as_mut()[fields::CODE] = code;
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        (&mut self.buffer.as_mut()[fields::CHECKSUM])
            .write_u16::<NetworkEndian>(checksum)
            .unwrap()
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[fields::HEADER]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[fields::PAYLOAD]
    }

    /// Zeros the checksum field and refills it with a checksum computed over
    /// the entire packet.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = self.gen_packet_checksum();
        self.set_checksum(checksum);
    }
}
