use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{BoardError, ProtocolError};

/// Board side length.
pub const SIZE: usize = 4;

/// Largest tile a [`Board`] can hold (2^15).
///
/// Two of these never merge: see [`at_merge_limit`].
pub const MAX_TILE: u32 = 1 << MAX_EXPONENT;

const MAX_EXPONENT: u8 = 15;
const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

type BoardRaw = u64;
type Line = u16;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions in the order the strategies try them.
    ///
    /// Ties between equally scored moves go to the earlier entry.
    pub const ALL: [Move; 4] = [Move::Up, Move::Left, Move::Right, Move::Down];

    /// Lower-case wire token (`up`, `down`, `left`, `right`).
    pub fn as_str(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }

    /// Clockwise quarter turns applied before and after the left-move primitive.
    #[inline]
    fn rotations(self) -> (u32, u32) {
        match self {
            Move::Left => (0, 0),
            Move::Right => (2, 2),
            Move::Up => (3, 1),
            Move::Down => (1, 3),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Move::Up),
            "down" => Ok(Move::Down),
            "left" => Ok(Move::Left),
            "right" => Ok(Move::Right),
            other => Err(ProtocolError::UnknownToken(other.to_string())),
        }
    }
}

/// Outcome of sliding a board in one direction (no random insert).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResult {
    pub board: Board,
    /// Sum of the tiles produced by merges during this move.
    pub gained: u32,
    /// False iff `board` is identical to the input; `gained` is then 0.
    pub changed: bool,
}

struct Stores {
    left: Box<[Line]>,
    gain: Box<[u32]>,
    limit: Box<[bool]>,
}

/// Packed 4x4 2048 board as 16 4-bit exponent nibbles in a `u64`.
///
/// Row-major, cell (0, 0) in the most significant nibble. A nibble `e > 0`
/// holds the tile `2^e`; `0` is an empty cell. Two boards with the same
/// tiles always have the same raw value, so the raw value doubles as a
/// hash/cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from tile values, `0` meaning empty.
    ///
    /// ```
    /// use merge_2048::engine::Board;
    /// let b = Board::from_rows([[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.tile(0, 2), 4);
    /// assert!(Board::from_rows([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows(rows: [[u32; SIZE]; SIZE]) -> Result<Self, BoardError> {
        let mut raw = 0;
        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                raw |= encode_cell(r, c, value as i64)? << cell_shift(r * SIZE + c);
            }
        }
        Ok(Board(raw))
    }

    /// Build a board from an arbitrary, unchecked grid (e.g. a vision reading).
    ///
    /// Rejects wrong dimensions, negative values, non powers of two and
    /// tiles above [`MAX_TILE`].
    pub fn from_grid<R: AsRef<[i64]>>(rows: &[R]) -> Result<Self, BoardError> {
        if rows.len() != SIZE {
            return Err(BoardError::RowCount { expected: SIZE, got: rows.len() });
        }
        let mut raw = 0;
        for (r, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != SIZE {
                return Err(BoardError::RowLength { row: r, expected: SIZE, got: row.len() });
            }
            for (c, &value) in row.iter().enumerate() {
                raw |= encode_cell(r, c, value)? << cell_shift(r * SIZE + c);
            }
        }
        Ok(Board(raw))
    }

    /// Tile values row by row, `0` for empty cells.
    pub fn to_rows(self) -> [[u32; SIZE]; SIZE] {
        let mut rows = [[0; SIZE]; SIZE];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.tile(r, c);
            }
        }
        rows
    }

    /// Tile value at (`row`, `col`), `0` if empty.
    #[inline]
    pub fn tile(self, row: usize, col: usize) -> u32 {
        exponent_to_value(self.exponent(row * SIZE + col))
    }

    #[inline]
    pub(crate) fn exponent(self, idx: usize) -> u8 {
        ((self.0 >> cell_shift(idx)) & 0xf) as u8
    }

    /// Copy of this board with `exponent` written into the empty cell `idx`.
    #[inline]
    pub(crate) fn with_exponent(self, idx: usize, exponent: u8) -> Self {
        debug_assert_eq!(self.exponent(idx), 0);
        Board(self.0 | (exponent as u64) << cell_shift(idx))
    }

    /// Slide/merge tiles in `dir`, reporting the score gained and whether anything moved.
    ///
    /// ```
    /// use merge_2048::engine::{Board, Move};
    /// let b = Board::from_rows([[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let res = b.apply(Move::Left);
    /// assert_eq!(res.board.to_rows()[0], [4, 4, 0, 0]);
    /// assert_eq!(res.gained, 4);
    /// assert!(res.changed);
    /// ```
    #[inline]
    pub fn apply(self, dir: Move) -> MoveResult { apply(self, dir) }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    #[inline]
    pub fn shift(self, dir: Move) -> Self { apply(self, dir).board }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use merge_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = random_exponent(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Perform a move then insert a random tile if the move changed the board.
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let res = apply(self, dir);
        if res.changed { res.board.with_random_tile(rng) } else { self }
    }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use merge_2048::engine::Board;
    /// // Nothing can slide on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    /// True if two [`MAX_TILE`]s would merge in some row or column.
    #[inline]
    pub fn at_merge_limit(self) -> bool { at_merge_limit(self) }

    /// The board itself, or [`BoardError::MergeLimit`] when it is
    /// [at the merge limit](Board::at_merge_limit).
    ///
    /// ```
    /// use merge_2048::engine::Board;
    /// let b = Board::from_rows([[32768, 0, 0, 32768], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert!(b.check_merge_limit().is_err());
    /// ```
    pub fn check_merge_limit(self) -> Result<Self, BoardError> {
        if self.at_merge_limit() { Err(BoardError::MergeLimit) } else { Ok(self) }
    }

    /// Highest tile value present, `0` for an empty board.
    pub fn highest_tile(self) -> u32 {
        let max_exp = (0..SIZE * SIZE).map(|idx| self.exponent(idx)).max().unwrap_or(0);
        exponent_to_value(max_exp)
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { 16 - count_non_empty(self.0) }

    /// Sum of all tile values.
    pub fn tile_sum(self) -> u64 {
        (0..SIZE * SIZE).map(|idx| exponent_to_value(self.exponent(idx)) as u64).sum()
    }

    /// Rotate the board a quarter turn clockwise.
    #[inline]
    pub fn rotate_cw(self) -> Self { Board(rotate_cw(self.0)) }

    /// Rotate the board a half turn.
    #[inline]
    pub fn rotate_180(self) -> Self { Board(rotate_cw_n(self.0, 2)) }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.to_rows().iter().enumerate() {
            if r > 0 {
                writeln!(f, "-------------------------------")?;
            }
            let cells: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

impl TryFrom<[[u32; SIZE]; SIZE]> for Board {
    type Error = BoardError;

    fn try_from(rows: [[u32; SIZE]; SIZE]) -> Result<Self, Self::Error> { Board::from_rows(rows) }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    let _ = stores();
}

/// Slide/merge `board` in `direction`.
///
/// Every direction is the left-move primitive applied to a rotated view of
/// the board, with the inverse rotation applied to the result: Right turns
/// 180° before and after, Up turns 270° then 90°, Down turns 90° then 270°.
pub fn apply(board: Board, direction: Move) -> MoveResult {
    let (before, after) = direction.rotations();
    let (shifted, gained) = slide_rows_left(rotate_cw_n(board.0, before));
    let moved = rotate_cw_n(shifted, after);
    MoveResult { board: Board(moved), gained, changed: moved != board.0 }
}

/// Legal moves from `board` with their outcomes, in [`Move::ALL`] order.
pub fn legal_moves(board: Board) -> impl Iterator<Item = (Move, MoveResult)> {
    Move::ALL
        .into_iter()
        .map(move |dir| (dir, apply(board, dir)))
        .filter(|(_, res)| res.changed)
}

/// True if no move in any direction changes the board.
///
/// A board [at the merge limit](at_merge_limit) is never over: the game would
/// go on with a tile this representation cannot hold.
pub fn is_game_over(board: Board) -> bool {
    legal_moves(board).next().is_none() && !at_merge_limit(board)
}

/// True if some row or column holds two [`MAX_TILE`]s with nothing but
/// empty cells between them.
///
/// Moving along that line would create a 65536 tile, which has no nibble, so
/// [`apply`] leaves the pair in place. Strategies reject such boards with
/// [`BoardError::MergeLimit`] instead of treating them as stuck.
pub fn at_merge_limit(board: Board) -> bool {
    let s = stores();
    let cols = transpose(board.0);
    (0..SIZE).any(|idx| {
        s.limit[extract_line(board.0, idx) as usize] || s.limit[extract_line(cols, idx) as usize]
    })
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Reverse the cell order inside every row.
fn mirror_rows(x: BoardRaw) -> BoardRaw {
    ((x & 0xF000F000F000F000) >> 12)
        | ((x & 0x0F000F000F000F00) >> 4)
        | ((x & 0x00F000F000F000F0) << 4)
        | ((x & 0x000F000F000F000F) << 12)
}

#[inline]
fn rotate_cw(x: BoardRaw) -> BoardRaw { mirror_rows(transpose(x)) }

#[inline]
fn rotate_cw_n(x: BoardRaw, turns: u32) -> BoardRaw {
    (0..turns).fold(x, |acc, _| rotate_cw(acc))
}

#[inline]
pub(crate) fn extract_line(board: BoardRaw, line_idx: usize) -> Line {
    ((board >> ((3 - line_idx) * 16)) & 0xffff) as Line
}

#[inline]
fn cell_shift(idx: usize) -> usize { 60 - 4 * idx }

pub(crate) fn line_to_tiles(line: Line) -> [u8; SIZE] {
    [
        ((line >> 12) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        (line & 0xf) as u8,
    ]
}

fn tiles_to_line(tiles: [u8; SIZE]) -> Line {
    (tiles[0] as Line) << 12 | (tiles[1] as Line) << 8 | (tiles[2] as Line) << 4 | tiles[3] as Line
}

#[inline]
pub(crate) fn exponent_to_value(exponent: u8) -> u32 {
    if exponent == 0 { 0 } else { 1 << exponent }
}

fn encode_cell(row: usize, col: usize, value: i64) -> Result<BoardRaw, BoardError> {
    if value < 0 {
        return Err(BoardError::Negative { row, col, value });
    }
    if value == 0 {
        return Ok(0);
    }
    if value == 1 || !(value as u64).is_power_of_two() {
        return Err(BoardError::NotPowerOfTwo { row, col, value });
    }
    if value > MAX_TILE as i64 {
        return Err(BoardError::TooLarge { row, col, value, max: MAX_TILE });
    }
    Ok(value.trailing_zeros() as BoardRaw)
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut left = vec![0 as Line; LINE_TABLE_SIZE];
    let mut gain = vec![0u32; LINE_TABLE_SIZE];
    let mut limit = vec![false; LINE_TABLE_SIZE];
    for (line, ((slot, score), blocked)) in left.iter_mut().zip(gain.iter_mut()).zip(limit.iter_mut()).enumerate() {
        let tiles = line_to_tiles(line as Line);
        let (moved, gained) = slide_line_left(tiles);
        *slot = tiles_to_line(moved);
        *score = gained;
        *blocked = line_at_merge_limit(tiles);
    }
    Stores { left: left.into_boxed_slice(), gain: gain.into_boxed_slice(), limit: limit.into_boxed_slice() }
}

/// Two `MAX_EXPONENT`s adjacent once the gaps are squeezed out. Such a pair
/// merges whichever way the line is moved.
fn line_at_merge_limit(tiles: [u8; SIZE]) -> bool {
    let present: Vec<u8> = tiles.iter().copied().filter(|&t| t != 0).collect();
    present.windows(2).any(|w| w[0] == MAX_EXPONENT && w[1] == MAX_EXPONENT)
}

/// Compress the non-empty tiles toward index 0, merging equal neighbours once.
///
/// Advancing two places past every merge keeps a freshly merged tile from
/// merging again in the same move. Two `MAX_TILE`s stay apart since their
/// sum does not fit in a nibble.
fn slide_line_left(tiles: [u8; SIZE]) -> ([u8; SIZE], u32) {
    let mut compressed = [0u8; SIZE];
    let mut n = 0;
    for &t in tiles.iter().filter(|&&t| t != 0) {
        compressed[n] = t;
        n += 1;
    }
    let mut out = [0u8; SIZE];
    let mut len = 0;
    let mut gained = 0;
    let mut i = 0;
    while i < n {
        let t = compressed[i];
        if i + 1 < n && compressed[i + 1] == t && t < MAX_EXPONENT {
            out[len] = t + 1;
            gained += 1u32 << (t + 1);
            i += 2;
        } else {
            out[len] = t;
            i += 1;
        }
        len += 1;
    }
    (out, gained)
}

fn slide_rows_left(board: BoardRaw) -> (BoardRaw, u32) {
    let s = stores();
    (0..SIZE).fold((0, 0), |(acc, gained), row_idx| {
        let line = extract_line(board, row_idx) as usize;
        let moved = s.left[line] as BoardRaw;
        (acc | moved << (48 - 16 * row_idx), gained + s.gain[line])
    })
}

fn random_exponent<R: Rng + ?Sized>(rng: &mut R) -> BoardRaw { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(board: BoardRaw) -> u32 {
    let mut board_copy = board;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones()
}

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        x => format!("{:^7}", x),
    }
}
