//! Physical address decoding.
//!
//! A linear physical address maps bijectively onto PCM array coordinates.
//! The decoder slices the address with a fixed field-width vector ordered
//! from most significant to least significant as
//! `[Rank, Partition, Tile, Row, Col, Bank, Channel, CacheLine]`; the last
//! vector entry occupies the least significant bits of the address.
//! [`AddrDecoder::compose`] is the exact inverse of
//! [`AddrDecoder::decode`].
//!
//! Keeping `Bank` and `Channel` in the low bits interleaves consecutive
//! cache lines across banks and channels.

use crate::common::Addr;
use crate::config::Config;

/// Coordinate fields of a decoded address, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Field {
    /// Rank within a channel.
    Rank,
    /// Partition (sub-array) within a bank.
    Partition,
    /// Tile within a partition.
    Tile,
    /// Word line within a tile.
    Row,
    /// Cache-line column within a tile.
    Col,
    /// Bank within a rank.
    Bank,
    /// Channel within the memory system.
    Channel,
    /// Byte offset bits covered by one cache line.
    CacheLine,
}

/// Number of coordinate fields in a decoded address.
pub const NUM_FIELDS: usize = 8;

/// An address split into its array coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedAddr(pub [Addr; NUM_FIELDS]);

impl DecodedAddr {
    /// Reads one coordinate.
    pub fn field(&self, f: Field) -> Addr {
        self.0[f as usize]
    }

    /// Overwrites one coordinate.
    pub fn set_field(&mut self, f: Field, v: Addr) {
        self.0[f as usize] = v;
    }

    /// Rank coordinate.
    pub fn rank(&self) -> usize {
        self.field(Field::Rank) as usize
    }

    /// Bank coordinate.
    pub fn bank(&self) -> usize {
        self.field(Field::Bank) as usize
    }

    /// Channel coordinate.
    pub fn channel(&self) -> usize {
        self.field(Field::Channel) as usize
    }

    /// Partition coordinate.
    pub fn partition(&self) -> usize {
        self.field(Field::Partition) as usize
    }
}

/// Bijective map between linear addresses and array coordinates.
#[derive(Debug, Clone)]
pub struct AddrDecoder {
    widths: [u32; NUM_FIELDS],
}

impl AddrDecoder {
    /// Builds a decoder from an explicit field-width vector.
    pub fn new(widths: [u32; NUM_FIELDS]) -> Self {
        Self { widths }
    }

    /// Builds a decoder from the configured array geometry. Every
    /// geometry parameter is a power of two, so the widths are exact.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.decoding_widths())
    }

    /// Width in bits of one coordinate field.
    pub fn width(&self, f: Field) -> u32 {
        self.widths[f as usize]
    }

    /// Splits `addr` into array coordinates. Low bits are consumed in
    /// reverse vector order, so the last field sits in the least
    /// significant bits.
    pub fn decode(&self, addr: Addr) -> DecodedAddr {
        let mut rest = addr;
        let mut out = DecodedAddr::default();
        for i in (0..NUM_FIELDS).rev() {
            let bits = self.widths[i];
            out.0[i] = slice_lower_bits(&mut rest, bits);
        }
        out
    }

    /// Reassembles the linear address a coordinate tuple came from.
    pub fn compose(&self, vec: &DecodedAddr) -> Addr {
        let mut addr = 0;
        for i in 0..NUM_FIELDS {
            addr = (addr << self.widths[i]) | vec.0[i];
        }
        addr
    }

    /// Total number of address bits the decoder covers.
    pub fn total_bits(&self) -> u32 {
        self.widths.iter().sum()
    }
}

/// Removes and returns the lowest `bits` bits of `addr`.
fn slice_lower_bits(addr: &mut Addr, bits: u32) -> Addr {
    if bits == 0 {
        return 0;
    }
    let low = *addr & ((1u64 << bits) - 1);
    *addr >>= bits;
    low
}
