use super::{Encoding, Scheme};
use crate::codec;
use shakmaty::{fen::Fen, CastlingMode, Chess, Position};

const FENS: [&str; 6] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "4nrk1/3q1pp1/2n1p1p1/8/1P2Q3/7P/PB1N1PP1/2R3K1 w - - 5 26",
    "5r2/1p2ppkp/p2p1nP1/qn6/4P3/2r2B2/1PPQ1PP1/2KR3R w - - 0 21",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 0 1",
    "8/2k5/p1P5/5r2/2K5/8/P7/7R b - - 4 39",
    "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
];

fn parse(fen: &str) -> Chess {
    let fen: Fen = fen.parse().unwrap();
    fen.into_position(CastlingMode::Standard).unwrap()
}

/// Properties every scheme must satisfy
pub(super) fn sanity_checks(scheme: &Scheme) {
    for fen in FENS {
        check_deterministic(fen, scheme);
        check_roundtrip(&parse(fen), scheme);
        check_decode(&parse(fen), scheme);
    }
}

/// Two independently parsed copies of a position encode identically
fn check_deterministic(fen: &str, scheme: &Scheme) {
    let first = scheme.encode(&parse(fen)).unwrap();
    let second = scheme.encode(&parse(fen)).unwrap();

    assert_eq!(first, second, "{} is not deterministic for {}", scheme, fen);
}

/// unpack(pack(t)) == t and the packed length is the scheme's N
fn check_roundtrip(pos: &Chess, scheme: &Scheme) {
    let tensor = scheme.encode(pos).unwrap();
    assert_eq!(tensor.shape(), scheme.shape());
    assert!(tensor.as_slice().iter().all(|&x| x <= 1));

    let packed = codec::pack(&tensor).unwrap();
    assert_eq!(packed.len(), scheme.packed_len());

    let unpacked = codec::unpack(&packed, scheme.shape()).unwrap();
    assert_eq!(unpacked, tensor);
}

/// The board and side to move can be read back
fn check_decode(pos: &Chess, scheme: &Scheme) {
    let decoded = scheme.decode(&scheme.encode(pos).unwrap()).unwrap();

    assert_eq!(&decoded.board, pos.board());
    assert_eq!(decoded.turn, pos.turn());
}
