use byteorder::{
    NetworkEndian,
    ReadBytesExt,
};

/// Calculates the Internet Checksum from [RFC1071](https://tools.ietf.org/html/rfc1071).
///
/// See [IPv4 header checksum](https://en.wikipedia.org/wiki/IPv4_header_checksum) for an example.
pub fn internet_checksum(buffer: &[u8]) -> u16 {
    let mut acc = 0 as u32;

    for i in 0 .. (buffer.len() / 2) {
        let x = (&buffer[i * 2 .. i * 2 + 2])
            .read_u16::<NetworkEndian>()
            .unwrap();
        acc += x as u32;
    }

    if buffer.len() % 2 == 1 {
        let x = buffer[buffer.len() - 1];
        acc += (x as u32) << 8;
    }

    while acc > 0xFFFF {
        acc -= 0xFFFF;
    }

    !acc as u16
}
