//! Bech32 codec
//!
//! Decodes and encodes bech32 strings of any length up to the BOLT11 limit and
//! regroups bit widths. Lightning invoices routinely exceed the 90 character
//! limit of BIP-173, so the checksum is parameterised with a longer code length.

use bitcoin::bech32::primitives::decode::CheckedHrpstring;
use bitcoin::bech32::{Bech32, Checksum, Fe32, Fe32IterExt, Hrp};
use thiserror::Error;

/// Longest bech32 string accepted
pub const MAX_LENGTH: usize = 7089;

/// Bech32 Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Checksum, character set or separator invalid
    #[error("Invalid bech32 format: {0}")]
    InvalidFormat(String),
    /// Human readable part invalid
    #[error("Invalid human readable part: {0}")]
    InvalidHrp(String),
    /// Value does not fit in the source bit width
    #[error("Value `{value}` does not fit in {bits} bits")]
    ValueOutOfRange {
        /// Offending value
        value: u8,
        /// Source bit width
        bits: u32,
    },
    /// Bit width outside 1..=8
    #[error("Unsupported bit width {0}")]
    InvalidBitWidth(u32),
    /// Leftover bits that cannot be dropped
    #[error("Invalid padding")]
    InvalidPadding,
}

/// Bech32 checksum with the BOLT11 code length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bolt11Bech32 {}

impl Checksum for Bolt11Bech32 {
    type MidstateRepr = <Bech32 as Checksum>::MidstateRepr;
    const CODE_LENGTH: usize = MAX_LENGTH;
    const CHECKSUM_LENGTH: usize = Bech32::CHECKSUM_LENGTH;
    const GENERATOR_SH: [Self::MidstateRepr; 5] = Bech32::GENERATOR_SH;
    const TARGET_RESIDUE: Self::MidstateRepr = Bech32::TARGET_RESIDUE;
}

/// Decoded bech32 string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Lower case human readable part
    pub hrp: String,
    /// Data part as 5-bit groups, checksum removed
    pub data: Vec<u8>,
}

/// Decode a bech32 string into its human readable part and 5-bit groups
pub fn decode(s: &str) -> Result<Decoded, Error> {
    let parsed = CheckedHrpstring::new::<Bolt11Bech32>(s)
        .map_err(|e| Error::InvalidFormat(e.to_string()))?;

    // The type parameter is unused by the bech32 crate
    let data = parsed
        .fe32_iter::<&mut dyn Iterator<Item = u8>>()
        .map(|fe| fe.to_u8())
        .collect();

    Ok(Decoded {
        hrp: parsed.hrp().to_lowercase(),
        data,
    })
}

/// Encode 5-bit groups under `hrp`, appending the checksum
pub fn encode(hrp: &str, data: &[u8]) -> Result<String, Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Error::InvalidHrp(e.to_string()))?;

    let groups = data
        .iter()
        .map(|value| {
            Fe32::try_from(*value).map_err(|_| Error::ValueOutOfRange {
                value: *value,
                bits: 5,
            })
        })
        .collect::<Result<Vec<Fe32>, Error>>()?;

    Ok(groups
        .into_iter()
        .with_checksum::<Bolt11Bech32>(&hrp)
        .chars()
        .collect())
}

/// Regroup a sequence of `from_bits` wide values into `to_bits` wide values
///
/// Without `pad`, leftover bits are accepted only if there are fewer than
/// `from_bits` of them and they are all zero.
pub fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Result<Vec<u8>, Error> {
    if !(1..=8).contains(&from_bits) {
        return Err(Error::InvalidBitWidth(from_bits));
    }
    if !(1..=8).contains(&to_bits) {
        return Err(Error::InvalidBitWidth(to_bits));
    }

    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to_bits) - 1;
    let max_acc: u32 = (1 << (from_bits + to_bits - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from_bits as usize / to_bits as usize + 1);

    for value in data {
        let v = u32::from(*value);
        if v >> from_bits != 0 {
            return Err(Error::ValueOutOfRange {
                value: *value,
                bits: from_bits,
            });
        }
        acc = ((acc << from_bits) | v) & max_acc;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return Err(Error::InvalidPadding);
    }

    Ok(out)
}
