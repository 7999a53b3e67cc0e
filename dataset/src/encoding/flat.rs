use super::{DecodedPosition, Encoding, ROLES};
use crate::error::EncodeError;
use crate::tensor::Tensor;
use shakmaty::{Board, CastlingSide, Chess, Color, Piece, Position, Square};

/// Side to move (2) and castling rights (4)
pub const NUM_FLAGS: usize = 6;
pub const NUM_FEATURES: usize = NUM_FLAGS + 64 * 12;

const SHAPE: [usize; 1] = [NUM_FEATURES];

const CASTLING: [(Color, CastlingSide); 4] = [
    (Color::White, CastlingSide::KingSide),
    (Color::White, CastlingSide::QueenSide),
    (Color::Black, CastlingSide::KingSide),
    (Color::Black, CastlingSide::QueenSide),
];

/// Flat vector of 774 features:
/// `[white to move, black to move, white O-O, white O-O-O, black O-O, black O-O-O]`
/// followed by one bit per (square, color, role), squares a1..h8 = 0..63.
/// No move destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flat;

impl Flat {
    fn make_index(square: Square, piece: Piece) -> usize {
        let color = match piece.color {
            Color::Black => 0,
            Color::White => 6,
        };
        NUM_FLAGS + square as usize * 12 + color + piece.role as usize - 1
    }

    fn invalid(reason: String) -> EncodeError {
        EncodeError::InvalidTensor {
            scheme: "flat",
            reason,
        }
    }
}

impl Encoding for Flat {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn shape(&self) -> &'static [usize] {
        &SHAPE
    }

    fn encode(&self, position: &Chess) -> Result<Tensor, EncodeError> {
        let mut tensor = Tensor::zeros(&SHAPE);
        let features = tensor.as_mut_slice();

        features[0] = (position.turn() == Color::White) as u8;
        features[1] = (position.turn() == Color::Black) as u8;

        for (i, (color, side)) in CASTLING.into_iter().enumerate() {
            features[2 + i] = position.castles().has(color, side) as u8;
        }

        for (square, piece) in position.board().clone().into_iter() {
            features[Self::make_index(square, piece)] = 1;
        }

        Ok(tensor)
    }

    fn decode(&self, tensor: &Tensor) -> Result<DecodedPosition, EncodeError> {
        if tensor.shape() != SHAPE {
            return Err(EncodeError::ShapeMismatch {
                expected: SHAPE.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        let features = tensor.as_slice();

        let turn = match (features[0], features[1]) {
            (1, 0) => Color::White,
            (0, 1) => Color::Black,
            flags => return Err(Self::invalid(format!("side to move flags are {:?}", flags))),
        };

        let mut castling = [false; 4];
        for (i, flag) in castling.iter_mut().enumerate() {
            *flag = features[2 + i] == 1;
        }

        let mut board = Board::empty();

        for (index, chunk) in features[NUM_FLAGS..].chunks(12).enumerate() {
            let square = Square::new(index as u32);
            let mut pieces = chunk.iter().enumerate().filter(|(_, &bit)| bit == 1);

            if let Some((offset, _)) = pieces.next() {
                if pieces.next().is_some() {
                    return Err(Self::invalid(format!("square {} holds two pieces", square)));
                }

                let piece = Piece {
                    color: if offset < 6 { Color::Black } else { Color::White },
                    role: ROLES[offset % 6],
                };
                board.set_piece_at(square, piece);
            }
        }

        Ok(DecodedPosition {
            board,
            turn,
            castling: Some(castling),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::checks::sanity_checks;
    use shakmaty::{fen::Fen, CastlingMode};

    fn position(fen: &str) -> Chess {
        let fen: Fen = fen.parse().unwrap();
        fen.into_position(CastlingMode::Standard).unwrap()
    }

    #[test]
    fn test_sanity_checks() {
        sanity_checks(&Flat.into());
    }

    #[test]
    fn test_start_position_features() {
        let tensor = Flat.encode(&Chess::default()).unwrap();
        let features = tensor.as_slice();

        assert_eq!(&features[..NUM_FLAGS], &[1, 0, 1, 1, 1, 1]);
        assert_eq!(tensor.count_ones(), 5 + 32);

        // white king e1 = square 4, black pawn a7 = square 48
        assert_eq!(features[NUM_FLAGS + 4 * 12 + 6 + 5], 1);
        assert_eq!(features[NUM_FLAGS + 48 * 12], 1);
    }

    #[test]
    fn test_castling_flags() {
        let pos = position("r3k2r/8/8/8/8/8/8/R3K2R b Kq - 0 1");
        let tensor = Flat.encode(&pos).unwrap();

        assert_eq!(&tensor.as_slice()[..NUM_FLAGS], &[0, 1, 1, 0, 0, 1]);
        assert_eq!(
            Flat.decode(&tensor).unwrap().castling,
            Some([true, false, false, true])
        );
    }

    #[test]
    fn test_decode_rejects_two_turns() {
        let mut tensor = Flat.encode(&Chess::default()).unwrap();
        tensor.as_mut_slice()[1] = 1;

        assert!(matches!(
            Flat.decode(&tensor),
            Err(EncodeError::InvalidTensor { .. })
        ));
    }
}
