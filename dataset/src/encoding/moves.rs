use shakmaty::{attacks, Bitboard, Board, Chess, Color, File, Move, Position, Rank, Role, Square};

/// Destination squares of the legal moves `color` could play in `position`,
/// whether or not it is actually `color`'s turn.
///
/// The side not to move is evaluated on a copy with the turn swapped (which
/// also drops the en passant square). If the side to move is in check that
/// copy would be illegal, and the king-safe pseudo-legal destinations of the
/// other side are used instead (no castling, no en passant).
pub fn destinations(position: &Chess, color: Color) -> Bitboard {
    if position.turn() == color {
        return legal_destinations(position);
    }

    match position.clone().swap_turn() {
        Ok(swapped) => legal_destinations(&swapped),
        Err(_) => pseudo_legal_destinations(position.board(), color),
    }
}

fn legal_destinations(position: &Chess) -> Bitboard {
    let mut squares = Bitboard(0);

    for mov in position.legal_moves() {
        squares.set(destination(&mov), true);
    }

    squares
}

/// Square the moving piece lands on. Castling lands the king on the g or c file
fn destination(mov: &Move) -> Square {
    match *mov {
        Move::Castle { king, rook } => {
            let file = if king < rook { File::G } else { File::C };
            Square::from_coords(file, king.rank())
        }
        _ => mov.to(),
    }
}

fn pseudo_legal_destinations(board: &Board, color: Color) -> Bitboard {
    let mut squares = Bitboard(0);

    for (square, piece) in board.clone().into_iter() {
        if piece.color == color {
            squares |= mobility(board, square);
        }
    }

    squares
}

/// Squares the piece at `sq` can reach without leaving its own king attacked
fn mobility(board: &Board, sq: Square) -> Bitboard {
    let Some(piece) = board.piece_at(sq) else {
        return Bitboard(0);
    };
    let occupied = board.occupied();

    // attacks ignore colors, squares with own pieces are removed below
    let mut move_or_attack = attacks::attacks(sq, piece, occupied);

    if piece.role == Role::Pawn {
        // pawns only capture diagonally
        move_or_attack &= board.by_color(piece.color.other());

        if let Some(single_step) = sq.offset(piece.color.fold_wb(8, -8)) {
            if !occupied.contains(single_step) {
                move_or_attack.set(single_step, true);

                let start_rank = piece.color.fold_wb(Rank::Second, Rank::Seventh);
                if sq.rank() == start_rank {
                    if let Some(double_step) = single_step.offset(piece.color.fold_wb(8, -8)) {
                        if !occupied.contains(double_step) {
                            move_or_attack.set(double_step, true);
                        }
                    }
                }
            }
        }
    }

    let mobility = move_or_attack & !board.by_color(piece.color);

    let mut safe_mobility = Bitboard(0);

    for to in mobility {
        let mut board = board.clone();
        let mut occupied = occupied;

        board.discard_piece_at(sq);
        board.set_piece_at(to, piece);
        occupied.set(sq, false);
        occupied.set(to, true);

        // read the king square again, the moving piece may be the king
        if let Some(king_sq) = board.king_of(piece.color) {
            if board
                .attacks_to(king_sq, piece.color.other(), occupied)
                .is_empty()
            {
                safe_mobility.set(to, true);
            }
        }
    }

    safe_mobility
}
