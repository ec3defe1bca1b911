use crate::fault::Fault;

pub mod parse;

pub type Byte = u8; // 1 byte
pub type Word = u16; // 2 bytes, wide enough to address any supported memory

/// Memory size of a stock LS-8
pub const MEMORY_SIZE: usize = 256;

/// Default memory
pub type StdMem = Memory<MEMORY_SIZE>;

/// Emulates memory for use with the CPU. Code and stack share this space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Number of addressable bytes
    pub const fn capacity(&self) -> usize {
        S
    }

    fn check(&self, position: usize) -> Result<usize, Fault> {
        if position < S {
            Ok(position)
        } else {
            Err(Fault::AddressOutOfRange {
                address: position,
                capacity: S,
            })
        }
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Word) -> Result<Byte, Fault> {
        let position = self.check(position as usize)?;
        Ok(self.data[position])
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Word, value: Byte) -> Result<(), Fault> {
        let position = self.check(position as usize)?;
        self.data[position] = value;
        Ok(())
    }

    /// Reads a byte without failing, for diagnostics
    pub fn peek(&self, position: usize) -> Option<Byte> {
        self.data.get(position).copied()
    }

    /// Writes an array of bytes to the memory. Nothing is written if the
    /// array does not fit.
    pub fn write_array(&mut self, position: Word, data: &[Byte]) -> Result<(), Fault> {
        let start = position as usize;
        let end = start + data.len();
        if end > S {
            return Err(Fault::AddressOutOfRange {
                address: end - 1,
                capacity: S,
            });
        }

        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Logs the whole memory as a hex dump, 16 bytes per row
    pub fn dump(&self) {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            let bytes = chunk
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("{:04X}: {}", row * 16, bytes);
        }
    }
}

/// Builds a program from instructions and raw bytes
// Thanks for @Shemnei for helping me with this!
#[macro_export]
macro_rules! program {
    ( $( $byte:expr ),+ $(,)? ) => {
        vec![
            $(
                $byte as $crate::memory::Byte,
            )+
        ]
    };
}
