//! Programmable pattern memories.
//!
//! The tracker firmware classifies zone projections through lookup
//! tables burned into hardware memories. The emulation mirrors them as
//! fully precomputed tables: `2^address_bits` entries of `data_bits`
//! each, loaded once at initialization and read-only afterwards.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// A `2^address_bits` lookup table of `data_bits`-wide entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMemory {
    address_bits: u32,
    data_bits: u32,
    entries: Vec<u16>,
}

impl PatternMemory {
    /// Maximum supported address width.
    pub const MAX_ADDRESS_BITS: u32 = 16;
    /// Maximum supported data width.
    pub const MAX_DATA_BITS: u32 = 16;

    /// Creates an all-zero memory.
    pub fn new(address_bits: u32, data_bits: u32) -> Result<Self> {
        if address_bits == 0 || address_bits > Self::MAX_ADDRESS_BITS {
            return Err(Error::MemoryRange {
                value: address_bits,
                bits: Self::MAX_ADDRESS_BITS,
            });
        }
        if data_bits == 0 || data_bits > Self::MAX_DATA_BITS {
            return Err(Error::MemoryRange {
                value: data_bits,
                bits: Self::MAX_DATA_BITS,
            });
        }
        Ok(Self {
            address_bits,
            data_bits,
            entries: vec![0; 1 << address_bits],
        })
    }

    /// Address width in bits.
    #[inline]
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Data width in bits.
    #[inline]
    pub fn data_bits(&self) -> u32 {
        self.data_bits
    }

    /// Writes one entry.
    pub fn program(&mut self, address: u16, data: u16) -> Result<()> {
        if u32::from(address) >= (1 << self.address_bits) {
            return Err(Error::MemoryRange {
                value: u32::from(address),
                bits: self.address_bits,
            });
        }
        if u32::from(data) >= (1 << self.data_bits) {
            return Err(Error::MemoryRange {
                value: u32::from(data),
                bits: self.data_bits,
            });
        }
        self.entries[usize::from(address)] = data;
        Ok(())
    }

    /// Reads the entry for `address`; addresses wider than the memory
    /// are truncated to the low bits, as the hardware bus would.
    #[inline]
    pub fn fetch(&self, address: u16) -> u16 {
        let mask = ((1u32 << self.address_bits) - 1) as u16;
        self.entries[usize::from(address & mask)]
    }

    /// Programs every entry through `f(address) -> data`.
    pub fn fill_with(&mut self, mut f: impl FnMut(u16) -> u16) -> Result<()> {
        // The counter stays u32: 1 << 16 does not fit a u16 bound.
        for address in 0..(1u32 << self.address_bits) {
            let address = address as u16;
            let data = f(address);
            self.program(address, data)?;
        }
        Ok(())
    }

    /// Loads a memory from its text form.
    ///
    /// The format is a `# <address_bits> <data_bits>` header followed by
    /// `<address> <data>` rows in binary notation; unlisted addresses
    /// stay zero.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate();
        let (line_no, header) = loop {
            match lines.next() {
                Some((n, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break (n + 1, line);
                    }
                }
                None => {
                    return Err(Error::MemoryFormat {
                        line: 0,
                        reason: "empty file".into(),
                    })
                }
            }
        };

        let mut parts = header.trim().split_whitespace();
        if parts.next() != Some("#") {
            return Err(Error::MemoryFormat {
                line: line_no,
                reason: "expected '# <address_bits> <data_bits>' header".into(),
            });
        }
        let parse_width = |token: Option<&str>, line: usize| -> Result<u32> {
            token
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| Error::MemoryFormat {
                    line,
                    reason: "malformed width in header".into(),
                })
        };
        let address_bits = parse_width(parts.next(), line_no)?;
        let data_bits = parse_width(parts.next(), line_no)?;
        let mut memory = Self::new(address_bits, data_bits)?;

        for (n, line) in lines {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let address = Self::parse_binary(fields.next(), n + 1)?;
            let data = Self::parse_binary(fields.next(), n + 1)?;
            memory.program(address, data)?;
        }
        Ok(memory)
    }

    /// Loads a memory from a text file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Writes the memory in its text form, skipping zero entries.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "# {} {}", self.address_bits, self.data_bits)?;
        for (address, &data) in self.entries.iter().enumerate() {
            if data != 0 {
                writeln!(
                    out,
                    "{:0aw$b} {:0dw$b}",
                    address,
                    data,
                    aw = self.address_bits as usize,
                    dw = self.data_bits as usize
                )?;
            }
        }
        Ok(())
    }

    fn parse_binary(token: Option<&str>, line: usize) -> Result<u16> {
        let token = token.ok_or_else(|| Error::MemoryFormat {
            line,
            reason: "expected '<address> <data>' row".into(),
        })?;
        u16::from_str_radix(token, 2).map_err(|_| Error::MemoryFormat {
            line,
            reason: format!("'{token}' is not a binary word"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_program_and_fetch() {
        let mut memory = PatternMemory::new(4, 2).unwrap();
        memory.program(0b1010, 0b11).unwrap();
        assert_eq!(memory.fetch(0b1010), 0b11);
        assert_eq!(memory.fetch(0b0101), 0);
        // High address bits beyond the memory width are ignored.
        assert_eq!(memory.fetch(0b1_1010), 0b11);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut memory = PatternMemory::new(4, 2).unwrap();
        assert!(memory.program(16, 0).is_err());
        assert!(memory.program(3, 4).is_err());
        assert!(PatternMemory::new(0, 2).is_err());
        assert!(PatternMemory::new(20, 2).is_err());
    }

    #[test]
    fn test_fill_with_covers_the_widest_memory() {
        let mut memory = PatternMemory::new(PatternMemory::MAX_ADDRESS_BITS, 1).unwrap();
        memory.fill_with(|_| 1).unwrap();
        assert_eq!(memory.fetch(0), 1);
        assert_eq!(memory.fetch(u16::MAX), 1);

        memory.fill_with(|addr| u16::from(addr == u16::MAX)).unwrap();
        assert_eq!(memory.fetch(0), 0);
        assert_eq!(memory.fetch(u16::MAX), 1);
    }

    #[test]
    fn test_text_parsing() {
        let text = "\n# 4 2\n0001 01\n1111 10\n# trailing comment\n";
        let memory = PatternMemory::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(memory.address_bits(), 4);
        assert_eq!(memory.fetch(0b0001), 0b01);
        assert_eq!(memory.fetch(0b1111), 0b10);
        assert_eq!(memory.fetch(0), 0);

        assert!(PatternMemory::from_reader(Cursor::new("4 2\n")).is_err());
        assert!(PatternMemory::from_reader(Cursor::new("# 4 2\n0001 21\n")).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let mut memory = PatternMemory::new(8, 3).unwrap();
        memory.fill_with(|addr| if addr.count_ones() >= 2 { 0b101 } else { 0 }).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone_horizontal.mem");
        memory.to_file(&path).unwrap();
        let reloaded = PatternMemory::from_file(&path).unwrap();
        assert_eq!(reloaded, memory);
    }
}
