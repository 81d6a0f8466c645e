//! Base communication implementation for interacting with Scd41 device
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::i2c;

use crate::{Error};
use crate::device::*;

/// Transport used to reach the device
/// This is implemented for any embedded-hal blocking I2C connector, the bus itself
/// (and any sharing between devices) remains the responsibility of the caller
pub trait Transport<Err> {
    /// Write bytes to the device at `address`
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Err>;
    /// Read `buff.len()` bytes from the device at `address`
    /// `timeout_ms` bounds the read, connectors without a per-call timeout apply their bus timeout
    fn read(&mut self, address: u8, buff: &mut [u8], timeout_ms: u32) -> Result<(), Err>;
    /// Write bytes then read the response in one transaction
    fn write_read(&mut self, address: u8, bytes: &[u8], buff: &mut [u8], timeout_ms: u32) -> Result<(), Err>;
}

impl <Conn, Err> Transport<Err> for Conn where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err> + i2c::WriteRead<Error=Err>,
    Err: Debug,
{
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Err> {
        i2c::Write::write(self, address, bytes)
    }

    fn read(&mut self, address: u8, buff: &mut [u8], _timeout_ms: u32) -> Result<(), Err> {
        i2c::Read::read(self, address, buff)
    }

    fn write_read(&mut self, address: u8, bytes: &[u8], buff: &mut [u8], _timeout_ms: u32) -> Result<(), Err> {
        i2c::WriteRead::write_read(self, address, bytes, buff)
    }
}

/// Frame decoding error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is not `words * 3` bytes long
    Length { expected: usize, actual: usize },
    /// CRC mismatch on the word at `index`
    Crc { index: usize, expected: u8, actual: u8 },
}

/// Helper for device CRC-8 calculation
pub fn crc8_bytes(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;

    // For each byte
    for v in data {
        // XOR with current byte
        crc ^= v;

        // MSB first, no reflection
        for _bit in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    // Apply final xor
    crc ^ CRC_XOR
}

/// CRC-8 of a big endian data word
pub fn crc8(word: u16) -> u8 {
    crc8_bytes(&word.to_be_bytes())
}

/// Encode a command opcode for the wire
pub fn encode_command(command: Command) -> [u8; 2] {
    command.code().to_be_bytes()
}

/// Encode a data word followed by its CRC
pub fn encode_word(word: u16) -> [u8; WORD_LEN] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, crc8(word)]
}

/// Decode `N` consecutive (MSB, LSB, CRC) groups
/// The whole frame is rejected on the first CRC mismatch
pub fn decode_words<const N: usize>(buff: &[u8]) -> Result<[u16; N], FrameError> {
    if buff.len() != N * WORD_LEN {
        return Err(FrameError::Length{ expected: N * WORD_LEN, actual: buff.len() });
    }

    let mut words = [0u16; N];

    for (index, (w, line)) in words.iter_mut().zip(buff.chunks_exact(WORD_LEN)).enumerate() {
        let word = u16::from_be_bytes([line[0], line[1]]);

        let expected = crc8(word);
        if expected != line[2] {
            return Err(FrameError::Crc{ index, expected, actual: line[2] });
        }

        *w = word;
    }

    Ok(words)
}

/// Base API for reading and writing to the device
/// This should not be required by consumers, but is exposed to support alternate use
pub trait Base<Err> {
    /// Write a command to the device with optional data
    fn write_command(&mut self, address: u8, command: Command, data: Option<u16>) -> Result<(), Error<Err>>;
    /// Write a command and read the response in a single transaction
    fn read_command(&mut self, address: u8, command: Command, data: &mut [u8], timeout_ms: u32) -> Result<(), Error<Err>>;
    /// Read a pending response from a previously written command
    fn read_response(&mut self, address: u8, data: &mut [u8], timeout_ms: u32) -> Result<(), Error<Err>>;
}

/// Base implementation for any transport
impl <T, Err> Base<Err> for T where
    T: Transport<Err>,
    Err: Debug,
{
    fn write_command(&mut self, address: u8, command: Command, data: Option<u16>) -> Result<(), Error<Err>> {
        let [c0, c1] = encode_command(command);

        let mut buff: [u8; 5] = [c0, c1, 0, 0, 0];

        let len = match data {
            Some(d) => {
                buff[2..].copy_from_slice(&encode_word(d));
                5
            },
            None => 2,
        };

        trace!("Writing command: {:?} data: {:?}", command, data);

        self.write(address, &buff[..len]).map_err(Error::Conn)
    }

    fn read_command(&mut self, address: u8, command: Command, data: &mut [u8], timeout_ms: u32) -> Result<(), Error<Err>> {
        let cmd = encode_command(command);

        trace!("Writing command: {:x?} ({:?})", cmd, command);

        self.write_read(address, &cmd, data, timeout_ms)
            .map_err(Error::Conn)?;

        trace!("Read data: {:x?}", data);

        Ok(())
    }

    fn read_response(&mut self, address: u8, data: &mut [u8], timeout_ms: u32) -> Result<(), Error<Err>> {
        self.read(address, data, timeout_ms)
            .map_err(Error::Conn)?;

        trace!("Read data: {:x?}", data);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_crc() {
        // Test vectors from datasheet
        let tests = &[
            (0xbeef, 0x92),
            (0xbe02, 0x1f),
            (0x0000, 0x81),
            (0x7f07, 0xb4),
        ];

        for t in tests {
            assert_eq!(crc8(t.0), t.1);
        }
    }

    #[test]
    fn test_crc_matches_polynomial() {
        // Bitwise reference over the word as a single 16-bit register
        fn reference(word: u16) -> u8 {
            let mut reg: u32 = (word as u32) ^ 0xff00;
            for _ in 0..16 {
                reg <<= 1;
                if reg & 0x1_0000 != 0 {
                    reg ^= 0x1_3100;
                }
            }
            (reg >> 8) as u8
        }

        for w in (0..=u16::MAX).step_by(7) {
            assert_eq!(crc8(w), reference(w), "word {:04x}", w);
        }
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(encode_command(Command::StartPeriodicMeasurement), [0x21, 0xB1]);
        assert_eq!(encode_command(Command::ReadMeasurement), [0xEC, 0x05]);
    }

    #[test]
    fn test_word_round_trip() {
        for w in 0..=u16::MAX {
            assert_eq!(decode_words::<1>(&encode_word(w)), Ok([w]));
        }
    }

    #[test]
    fn test_decode_frame() {
        let buff = [0x12, 0x34, 0x37, 0x56, 0x78, 0x7d, 0x9a, 0xbc, 0xe0];
        assert_eq!(decode_words::<3>(&buff), Ok([0x1234, 0x5678, 0x9abc]));
    }

    #[test]
    fn test_corrupt_byte_rejected() {
        let good = [0x12, 0x34, 0x37, 0x56, 0x78, 0x7d, 0x9a, 0xbc, 0xe0];

        for i in 0..good.len() {
            for flip in [0x01u8, 0x80, 0xff] {
                let mut buff = good;
                buff[i] ^= flip;

                match decode_words::<3>(&buff) {
                    Err(FrameError::Crc{ index, .. }) => assert_eq!(index, i / WORD_LEN),
                    r => panic!("byte {} flip {:02x} accepted: {:?}", i, flip, r),
                }
            }
        }
    }

    #[test]
    fn test_decode_length() {
        assert_eq!(
            decode_words::<3>(&[0x00, 0x00, 0x81]),
            Err(FrameError::Length{ expected: 9, actual: 3 })
        );
    }
}
