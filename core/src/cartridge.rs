//! Cartridge header inspection.
//!
//! Reads the fixed header at 0x100-0x14F of a program image: title,
//! color/super compatibility flags and the header checksum. Enough for a
//! host to name save files and pick a boot mode without running the core.

use crate::core::machine::BootMode;

const TITLE_START: usize = 0x134;
const TITLE_LEN: usize = 11;
const MANUFACTURER_START: usize = 0x13F;
const MANUFACTURER_LEN: usize = 4;
const CGB_FLAG: usize = 0x143;
const SGB_FLAG: usize = 0x146;
const HEADER_CHECKSUM: usize = 0x14D;

/// Minimum image length that contains a complete header.
pub const HEADER_END: usize = 0x150;

/// Errors that can occur when parsing a cartridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    /// The image is shorter than the header.
    TooShort { len: usize },

    /// The header checksum byte does not match the header contents.
    ChecksumMismatch { expected: u8, actual: u8 },
}

impl std::fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { len } => write!(
                f,
                "image is {len} bytes, header needs at least {HEADER_END}"
            ),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "header checksum expected 0x{expected:02X}, got 0x{actual:02X}"
            ),
        }
    }
}

impl std::error::Error for CartridgeError {}

/// Parsed cartridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeInfo {
    title: String,
    cgb_compatible: bool,
    sgb_compatible: bool,
    header_checksum: u8,
    computed_checksum: u8,
}

impl CartridgeInfo {
    /// Parse the header of `image`. Does not validate the checksum; see
    /// [`validate`](Self::validate).
    pub fn parse(image: &[u8]) -> Result<Self, CartridgeError> {
        if image.len() < HEADER_END {
            return Err(CartridgeError::TooShort { len: image.len() });
        }

        let cgb_flag = image[CGB_FLAG];
        let mut title: String = image[TITLE_START..TITLE_START + TITLE_LEN]
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();

        // Older carts use the whole 16-byte area for the title.
        if cgb_flag & 0x80 == 0 {
            title.extend(
                image[MANUFACTURER_START..MANUFACTURER_START + MANUFACTURER_LEN]
                    .iter()
                    .filter(|&&b| b != 0)
                    .map(|&b| b as char),
            );
            if cgb_flag != 0 {
                title.push(cgb_flag as char);
            }
        }

        Ok(Self {
            title: title.trim_end().to_string(),
            cgb_compatible: cgb_flag & 0x80 != 0,
            sgb_compatible: image[SGB_FLAG] & 0x03 != 0,
            header_checksum: image[HEADER_CHECKSUM],
            computed_checksum: header_checksum(image),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_cgb_compatible(&self) -> bool {
        self.cgb_compatible
    }

    pub fn is_sgb_compatible(&self) -> bool {
        self.sgb_compatible
    }

    /// The mode the cartridge asks for: color beats super beats original.
    pub fn boot_mode(&self) -> BootMode {
        if self.cgb_compatible {
            BootMode::Cgb
        } else if self.sgb_compatible {
            BootMode::Sgb
        } else {
            BootMode::Dmg
        }
    }

    /// Check the header checksum byte at 0x14D.
    pub fn validate(&self) -> Result<(), CartridgeError> {
        if self.header_checksum == self.computed_checksum {
            Ok(())
        } else {
            Err(CartridgeError::ChecksumMismatch {
                expected: self.computed_checksum,
                actual: self.header_checksum,
            })
        }
    }
}

/// Header checksum over 0x134..=0x14C, as verified by the boot ROM.
pub fn header_checksum(image: &[u8]) -> u8 {
    image[TITLE_START..HEADER_CHECKSUM]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1))
}
