use super::moves::destinations;
use super::{coords_square, square_coords, DecodedPosition, Encoding, ROLES};
use crate::error::EncodeError;
use crate::tensor::Tensor;
use shakmaty::{Board, Chess, Color, Piece, Position};

pub const NUM_PLANES: usize = 15;

/// Legal destinations of white, regardless of the side to move
pub const WHITE_MOVES: usize = 12;
/// Legal destinations of black, regardless of the side to move
pub const BLACK_MOVES: usize = 13;
/// All ones if white is to move, all zeros otherwise
pub const TURN: usize = 14;

const SHAPE: [usize; 3] = [NUM_PLANES, 8, 8];

/// 15 planes of 8x8:
/// 0-5 white pawn, knight, bishop, rook, queen, king;
/// 6-11 the same for black;
/// 12-13 move destinations of white and black;
/// 14 side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Planes;

impl Planes {
    fn piece_plane(piece: Piece) -> usize {
        let channel = match piece.color {
            Color::White => 0,
            Color::Black => 6,
        };
        channel + piece.role as usize - 1
    }

    fn plane_piece(plane: usize) -> Piece {
        debug_assert!(plane < 12);
        Piece {
            color: if plane < 6 { Color::White } else { Color::Black },
            role: ROLES[plane % 6],
        }
    }

    fn invalid(reason: String) -> EncodeError {
        EncodeError::InvalidTensor {
            scheme: "planes",
            reason,
        }
    }
}

impl Encoding for Planes {
    fn name(&self) -> &'static str {
        "planes"
    }

    fn shape(&self) -> &'static [usize] {
        &SHAPE
    }

    fn encode(&self, position: &Chess) -> Result<Tensor, EncodeError> {
        let mut tensor = Tensor::zeros(&SHAPE);

        for (square, piece) in position.board().clone().into_iter() {
            let (row, column) = square_coords(square);
            tensor.set(&[Self::piece_plane(piece), row, column], 1);
        }

        for (plane, color) in [(WHITE_MOVES, Color::White), (BLACK_MOVES, Color::Black)] {
            for square in destinations(position, color) {
                let (row, column) = square_coords(square);
                tensor.set(&[plane, row, column], 1);
            }
        }

        if position.turn() == Color::White {
            tensor.outer_mut(TURN).fill(1);
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

        let mut board = Board::empty();

        for plane in 0..12 {
            for (offset, &bit) in tensor.outer(plane).iter().enumerate() {
                if bit == 0 {
                    continue;
                }

                let square = coords_square(offset / 8, offset % 8);
                if let Some(other) = board.piece_at(square) {
                    return Err(Self::invalid(format!(
                        "square {} holds both {:?} and {:?}",
                        square,
                        other,
                        Self::plane_piece(plane)
                    )));
                }
                board.set_piece_at(square, Self::plane_piece(plane));
            }
        }

        let turn = tensor.outer(TURN);
        let turn = if turn.iter().all(|&x| x == 1) {
            Color::White
        } else if turn.iter().all(|&x| x == 0) {
            Color::Black
        } else {
            return Err(Self::invalid("side to move plane is mixed".to_string()));
        };

        Ok(DecodedPosition {
            board,
            turn,
            castling: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::checks::sanity_checks;
    use shakmaty::{fen::Fen, CastlingMode, Square};

    fn position(fen: &str) -> Chess {
        let fen: Fen = fen.parse().unwrap();
        fen.into_position(CastlingMode::Standard).unwrap()
    }

    fn plane_squares(tensor: &Tensor, plane: usize) -> Vec<Square> {
        tensor
            .outer(plane)
            .iter()
            .enumerate()
            .filter(|(_, &bit)| bit == 1)
            .map(|(offset, _)| coords_square(offset / 8, offset % 8))
            .collect()
    }

    #[test]
    fn test_sanity_checks() {
        sanity_checks(&Planes.into());
    }

    #[test]
    fn test_start_position_planes() {
        let tensor = Planes.encode(&Chess::default()).unwrap();

        // rank 2 is row 6, rank 8 is row 0
        assert!(tensor.outer(0)[6 * 8..7 * 8].iter().all(|&x| x == 1));
        assert!(tensor.outer(6)[8..2 * 8].iter().all(|&x| x == 1));
        assert_eq!(plane_squares(&tensor, 5), vec![Square::E1]);
        assert_eq!(plane_squares(&tensor, 11), vec![Square::E8]);
        assert_eq!(plane_squares(&tensor, 4), vec![Square::D1]);

        assert_eq!(tensor.outer(WHITE_MOVES).iter().filter(|&&x| x == 1).count(), 16);
        assert_eq!(tensor.outer(BLACK_MOVES).iter().filter(|&&x| x == 1).count(), 16);
        assert!(tensor.outer(TURN).iter().all(|&x| x == 1));

        // 32 pieces, 32 destinations, 64 turn bits
        assert_eq!(tensor.count_ones(), 128);
    }

    #[test]
    fn test_move_planes_share_piece_convention() {
        // after 1. e4 the pawn sits on e4 and black's reply e5 is a destination
        let pos = position("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let tensor = Planes.encode(&pos).unwrap();

        assert_eq!(tensor.get(&[0, 4, 4]), 1); // white pawn e4
        assert_eq!(tensor.get(&[0, 6, 4]), 0); // e2 is empty
        assert_eq!(tensor.get(&[BLACK_MOVES, 3, 4]), 1); // ...e5
        assert_eq!(tensor.get(&[WHITE_MOVES, 3, 4]), 1); // e4-e5, white not to move
        assert_eq!(tensor.get(&[WHITE_MOVES, 3, 0]), 0); // a5 is out of reach
        assert!(plane_squares(&tensor, WHITE_MOVES).contains(&Square::E2)); // Qe2, Ke2, Be2
        assert!(tensor.outer(TURN).iter().all(|&x| x == 0));
    }

    #[test]
    fn test_no_moves_gives_empty_plane() {
        let mated = position("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        let tensor = Planes.encode(&mated).unwrap();
        assert!(tensor.outer(WHITE_MOVES).iter().all(|&x| x == 0));
        assert!(tensor.outer(BLACK_MOVES).iter().any(|&x| x == 1));

        let stalemate = position("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        let tensor = Planes.encode(&stalemate).unwrap();
        assert!(tensor.outer(BLACK_MOVES).iter().all(|&x| x == 0));
        assert!(tensor.outer(WHITE_MOVES).iter().any(|&x| x == 1));
    }

    #[test]
    fn test_decode_rejects_overlapping_pieces() {
        let mut tensor = Planes.encode(&Chess::default()).unwrap();
        tensor.set(&[1, 6, 0], 1); // knight on a2, already holding a pawn

        assert!(matches!(
            Planes.decode(&tensor),
            Err(EncodeError::InvalidTensor { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_mixed_turn_plane() {
        let mut tensor = Planes.encode(&Chess::default()).unwrap();
        tensor.set(&[TURN, 3, 3], 0);

        assert!(Planes.decode(&tensor).is_err());
    }
}
