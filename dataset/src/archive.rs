//! Game archives as a feed of scored positions.
//!
//! Lichess-style PGN where each mainline move may carry an engine evaluation
//! in its comment, e.g. `1. e4 { [%eval 0.17] } 1... c5 { [%eval 0.25] }`.

use crate::error::ArchiveError;
use pgn_reader::{BufferedReader, RawComment, RawHeader, SanPlus, Skip, Visitor};
use shakmaty::{Chess, Position};
use std::fs::File;
use std::io::Read;

/// A position reached in a game and the evaluation annotated on the move
/// leading to it, in centipawns from white's point of view
#[derive(Debug, Clone)]
pub struct ScoredPosition {
    pub position: Chess,
    /// `None` for missing evaluations and mate scores
    pub eval_cp: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameFilter {
    /// Only keep positions at least this many plies deep
    pub min_ply: usize,
    /// Only keep games where both players have at least this elo
    pub min_elo: Option<u32>,
}

/// Opens a local path or an http(s) URL, decompressing `.zst` on the fly
pub fn open_archive(input: &str) -> Result<Box<dyn Read>, ArchiveError> {
    let raw_reader: Box<dyn Read> = if input.starts_with("http") {
        Box::new(reqwest::blocking::get(input)?.error_for_status()?)
    } else {
        Box::new(File::open(input)?)
    };

    let reader: Box<dyn Read> = if input.ends_with(".zst") {
        Box::new(zstd::Decoder::new(raw_reader)?)
    } else {
        raw_reader
    };

    Ok(reader)
}

/// Parses the `[%eval ...]` command of a move comment into centipawns.
/// Mate scores (`#-3`) have no centipawn value and give `None`.
pub fn parse_eval(comment: &[u8]) -> Option<i32> {
    let comment = std::str::from_utf8(comment).ok()?;
    let start = comment.find("[%eval")? + "[%eval".len();
    let end = start + comment[start..].find(']')?;

    // an optional search depth follows the score: [%eval 0.17,23]
    let value = comment[start..end].trim().split(',').next()?.trim();
    if value.starts_with('#') {
        return None;
    }

    let pawns: f64 = value.parse().ok()?;
    if !pawns.is_finite() {
        return None;
    }

    Some((pawns * 100.0).round() as i32)
}

pub struct ScoredGameVisitor {
    filter: GameFilter,

    /// Positions of the current game, after each mainline move
    positions: Vec<ScoredPosition>,
    current: Chess,

    white_elo: u32,
    black_elo: u32,
    /// Set on an illegal move, the rest of the game is ignored
    broken: bool,
}

impl ScoredGameVisitor {
    pub fn new(filter: GameFilter) -> Self {
        ScoredGameVisitor {
            filter,
            positions: Vec::new(),
            current: Chess::default(),
            white_elo: 0,
            black_elo: 0,
            broken: false,
        }
    }
}

impl Visitor for ScoredGameVisitor {
    /// `None` for games rejected by the filter
    type Result = Option<Vec<ScoredPosition>>;

    fn begin_game(&mut self) {
        self.positions.clear();
        self.current = Chess::default();
        self.white_elo = 0;
        self.black_elo = 0;
        self.broken = false;
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        let value = String::from_utf8_lossy(value.as_bytes());

        match key {
            b"WhiteElo" => self.white_elo = value.parse().unwrap_or(0),
            b"BlackElo" => self.black_elo = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    fn end_headers(&mut self) -> Skip {
        let min_elo = self.filter.min_elo.unwrap_or(0);
        let keep = self.white_elo >= min_elo && self.black_elo >= min_elo;

        if !keep {
            // end_game still runs for skipped games
            self.broken = true;
        }

        Skip(!keep)
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn san(&mut self, san_plus: SanPlus) {
        if self.broken {
            return;
        }

        let next = san_plus
            .san
            .to_move(&self.current)
            .ok()
            .and_then(|mov| self.current.clone().play(&mov).ok());

        match next {
            Some(position) => {
                self.current = position.clone();
                self.positions.push(ScoredPosition {
                    position,
                    eval_cp: None,
                });
            }
            None => {
                log::warn!(
                    "illegal move {} after {} plies, dropping the rest of the game",
                    san_plus,
                    self.positions.len()
                );
                self.broken = true;
            }
        }
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        if self.broken {
            return;
        }

        if let Some(last) = self.positions.last_mut() {
            if last.eval_cp.is_none() {
                last.eval_cp = parse_eval(comment.as_bytes());
            }
        }
    }

    fn end_game(&mut self) -> Self::Result {
        if self.broken && self.positions.is_empty() {
            return None;
        }

        // positions[i] is i + 1 plies deep
        let first = self.filter.min_ply.saturating_sub(1).min(self.positions.len());
        Some(self.positions.split_off(first))
    }
}

/// Sequential reader of the games of an archive
pub struct ArchiveReader<R: Read> {
    reader: BufferedReader<R>,
    visitor: ScoredGameVisitor,
    games: usize,
    rejected: usize,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(reader: R, filter: GameFilter) -> Self {
        ArchiveReader {
            reader: BufferedReader::new(reader),
            visitor: ScoredGameVisitor::new(filter),
            games: 0,
            rejected: 0,
        }
    }

    /// Positions of the next game passing the filter, `None` at the end
    pub fn next_game(&mut self) -> Result<Option<Vec<ScoredPosition>>, ArchiveError> {
        while let Some(result) = self.reader.read_game(&mut self.visitor)? {
            self.games += 1;

            match result {
                Some(positions) => return Ok(Some(positions)),
                None => self.rejected += 1,
            }
        }

        Ok(None)
    }

    /// Games read so far, including rejected ones
    pub fn games(&self) -> usize {
        self.games
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
