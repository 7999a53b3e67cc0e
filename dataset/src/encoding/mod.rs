//! Position encoders.
//!
//! Square convention, shared by every plane and feature: `row = 8 - rank`,
//! `column = file`, so a8 is (0, 0) and h1 is (7, 7). Flat feature vectors
//! index squares a1..h8 as 0..63 instead, see [`flat`].
//!
//! Not encoded by any scheme: en passant, promotion, check status and the
//! move counters.

#[cfg(test)]
mod checks;
pub mod flat;
pub mod moves;
pub mod planes;

use crate::codec;
use crate::error::EncodeError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;
use shakmaty::{Board, Chess, Color, File, Position, Rank, Role, Square};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub use flat::Flat;
pub use planes::Planes;

/// Roles in encoding order
pub const ROLES: [Role; 6] = [
    Role::Pawn,
    Role::Knight,
    Role::Bishop,
    Role::Rook,
    Role::Queen,
    Role::King,
];

/// The encoding schemes a dataset can be built with
#[enum_dispatch]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Planes,
    Flat,
}

#[enum_dispatch(Scheme)]
pub trait Encoding {
    /// Name stored in the dataset and used on the command line
    fn name(&self) -> &'static str;

    fn shape(&self) -> &'static [usize];

    fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }

    /// Bytes of a packed tensor, the N of every record in a dataset
    fn packed_len(&self) -> usize {
        codec::packed_len(self.num_elements())
    }

    /// Encodes a position. Pure: the same position always gives the same tensor
    fn encode(&self, position: &Chess) -> Result<Tensor, EncodeError>;

    /// Recovers what the tensor says about the position (used for validation)
    fn decode(&self, tensor: &Tensor) -> Result<DecodedPosition, EncodeError>;
}

/// What can be read back from an encoded tensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPosition {
    pub board: Board,
    pub turn: Color,
    /// White king side, white queen side, black king side, black queen side.
    /// Only present for schemes that encode castling rights.
    pub castling: Option<[bool; 4]>,
}

pub fn build_scheme(name: &str) -> Result<Scheme, EncodeError> {
    match name {
        "planes" => Ok(Planes.into()),
        "flat" => Ok(Flat.into()),
        _ => Err(EncodeError::UnknownScheme(name.to_string())),
    }
}

impl Default for Scheme {
    fn default() -> Self {
        Planes.into()
    }
}

impl FromStr for Scheme {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        build_scheme(s)
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for Scheme {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Scheme {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        build_scheme(&name).map_err(serde::de::Error::custom)
    }
}

/// (row, column) of a square: rank 8 is row 0, file a is column 0
#[inline]
pub fn square_coords(square: Square) -> (usize, usize) {
    (7 - square.rank() as usize, square.file() as usize)
}

#[inline]
pub fn coords_square(row: usize, column: usize) -> Square {
    debug_assert!(row < 8 && column < 8);
    Square::from_coords(File::new(column as u32), Rank::new(7 - row as u32))
}

/// Encodes the starting position, packs, unpacks and decodes it again.
/// Meant to run once at startup, before a dataset is built or read.
pub fn self_check(scheme: &Scheme) -> Result<(), EncodeError> {
    let fail = |reason: &str| EncodeError::SelfCheck {
        scheme: scheme.name(),
        reason: reason.to_string(),
    };

    let start = Chess::default();
    let tensor = scheme.encode(&start)?;
    if tensor.shape() != scheme.shape() {
        return Err(fail("encoded shape differs from the scheme shape"));
    }

    let packed = codec::pack(&tensor)?;
    if packed.len() != scheme.packed_len() {
        return Err(fail("packed length differs from the scheme length"));
    }

    let unpacked = codec::unpack(&packed, scheme.shape())?;
    if unpacked != tensor {
        return Err(fail("unpack(pack(start)) differs from the encoding"));
    }

    let decoded = scheme.decode(&unpacked)?;
    if decoded.board != *start.board() || decoded.turn != start.turn() {
        return Err(fail("decoded board differs from the starting position"));
    }

    log::debug!(
        "encoding self-check passed for '{}' ({} elements, {} bytes)",
        scheme,
        scheme.num_elements(),
        scheme.packed_len()
    );

    Ok(())
}
