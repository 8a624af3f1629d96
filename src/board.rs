//! Connect-4 board representation and rules.
//!
//! Everything here is pure and synchronous: the game driver owns the only
//! mutable board per game and calls into this module between agent requests.
//! Cells hold `0` (empty), `1` (first mover) or `2` (second mover); row `0`
//! is the top of the grid, so a column is playable iff its row-0 cell is
//! empty.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Number of rows of the grid.
pub const ROWS: usize = 6;
/// Number of columns of the grid.
pub const COLS: usize = 7;
/// Number of aligned discs required to win.
const CONNECT: usize = 4;

/// One of the two players of a single game, identified by move order.
///
/// `One` always owns the first move of the game. The mapping between
/// players and teams rotates between games and is handled by the match
/// runner, never by the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    /// The player who moves first (cell value `1`).
    One,
    /// The player who moves second (cell value `2`).
    Two,
}

impl Player {
    /// The opponent of `self`.
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Cell value written to the grid for this player (`1` or `2`).
    pub fn cell(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

/// Terminal state of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The game goes on.
    None,
    /// Four aligned discs belong to this player.
    Win(Player),
    /// The grid is full without a winner.
    Draw,
}

/// A 6x7 Connect-4 grid.
///
/// Serializes as the plain nested array used on the wire (`int[6][7]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[u8; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty grid.
    pub fn new() -> Board {
        Board {
            cells: [[0; COLS]; ROWS],
        }
    }

    /// Raw cells, row 0 on top. This is the wire representation.
    pub fn cells(&self) -> &[[u8; COLS]; ROWS] {
        &self.cells
    }

    /// True if a disc can still be dropped in `col`.
    pub fn is_playable(&self, col: u8) -> bool {
        (col as usize) < COLS && self.cells[0][col as usize] == 0
    }

    /// Columns that can currently receive a disc, in ascending order.
    pub fn legal_moves(&self) -> impl Iterator<Item = u8> + '_ {
        (0..COLS as u8).filter(|&c| self.is_playable(c))
    }

    /// Drops a disc for `player` into `col` and returns the landing row.
    ///
    /// # Errors
    /// Fails when the column is out of range or already full. The board is
    /// left untouched in that case.
    pub fn apply(&mut self, col: u8, player: Player) -> Result<u8, ColumnFull> {
        if (col as usize) >= COLS {
            return Err(ColumnFull(col));
        }
        // Gravity: the disc lands on the deepest empty cell of the column.
        for row in (0..ROWS).rev() {
            if self.cells[row][col as usize] == 0 {
                self.cells[row][col as usize] = player.cell();
                return Ok(row as u8);
            }
        }
        Err(ColumnFull(col))
    }

    /// Detects a finished position: a four-in-a-row in any of the four line
    /// directions, or a draw once the grid is full.
    pub fn terminal(&self) -> Terminal {
        // Right, down, down-right, down-left.
        const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        for row in 0..ROWS {
            for col in 0..COLS {
                let cell = self.cells[row][col];
                if cell == 0 {
                    continue;
                }
                for (dr, dc) in DIRECTIONS {
                    if self.run_length(row, col, dr, dc, cell) >= CONNECT {
                        let winner = if cell == 1 { Player::One } else { Player::Two };
                        return Terminal::Win(winner);
                    }
                }
            }
        }
        if self.legal_moves().next().is_none() {
            Terminal::Draw
        } else {
            Terminal::None
        }
    }

    fn run_length(&self, row: usize, col: usize, dr: isize, dc: isize, cell: u8) -> usize {
        let mut len = 0;
        let (mut r, mut c) = (row as isize, col as isize);
        while r >= 0
            && (r as usize) < ROWS
            && c >= 0
            && (c as usize) < COLS
            && self.cells[r as usize][c as usize] == cell
        {
            len += 1;
            r += dr;
            c += dc;
        }
        len
    }

    /// True when no column has an empty cell below a filled one.
    ///
    /// Boards produced through [`Board::apply`] always satisfy this; the
    /// check exists for boards deserialized from stored state.
    pub fn is_well_formed(&self) -> bool {
        (0..COLS).all(|col| {
            let mut seen_filled = false;
            (0..ROWS).all(|row| {
                let filled = self.cells[row][col] != 0;
                let ok = filled || !seen_filled;
                seen_filled |= filled;
                ok
            })
        })
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            for cell in row {
                let glyph = match cell {
                    1 => 'x',
                    2 => 'o',
                    _ => '.',
                };
                write!(f, "{glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Returned by [`Board::apply`] when the requested column cannot take a disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("column {0} is full or out of range")]
pub struct ColumnFull(pub u8);

#[cfg(test)]
mod board_tests {
    use super::*;

    fn board_from_moves(moves: &[(u8, Player)]) -> Board {
        let mut board = Board::new();
        for &(col, player) in moves {
            board.apply(col, player).unwrap();
        }
        board
    }

    #[test]
    fn discs_stack_from_the_bottom() {
        let mut board = Board::new();
        assert_eq!(board.apply(3, Player::One).unwrap(), 5);
        assert_eq!(board.apply(3, Player::Two).unwrap(), 4);
        assert_eq!(board.apply(3, Player::One).unwrap(), 3);
        assert!(board.is_well_formed());
    }

    #[test]
    fn full_column_is_rejected_and_unlisted() {
        let mut board = Board::new();
        for i in 0..ROWS {
            let player = if i % 2 == 0 { Player::One } else { Player::Two };
            board.apply(0, player).unwrap();
        }
        assert_eq!(board.apply(0, Player::One), Err(ColumnFull(0)));
        assert!(!board.legal_moves().any(|c| c == 0));
        assert!(board.legal_moves().eq(1..COLS as u8));
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let mut board = Board::new();
        assert_eq!(board.apply(7, Player::One), Err(ColumnFull(7)));
    }

    #[test]
    fn detects_horizontal_win() {
        let board = board_from_moves(&[
            (0, Player::One),
            (0, Player::Two),
            (1, Player::One),
            (1, Player::Two),
            (2, Player::One),
            (2, Player::Two),
            (3, Player::One),
        ]);
        assert_eq!(board.terminal(), Terminal::Win(Player::One));
    }

    #[test]
    fn detects_vertical_win() {
        let board = board_from_moves(&[
            (4, Player::Two),
            (4, Player::Two),
            (4, Player::Two),
            (4, Player::Two),
        ]);
        assert_eq!(board.terminal(), Terminal::Win(Player::Two));
    }

    #[test]
    fn detects_rising_diagonal_win() {
        // One's discs on (5,0) (4,1) (3,2) (2,3), padded with Two's discs.
        let board = board_from_moves(&[
            (0, Player::One),
            (1, Player::Two),
            (1, Player::One),
            (2, Player::Two),
            (2, Player::Two),
            (2, Player::One),
            (3, Player::Two),
            (3, Player::Two),
            (3, Player::Two),
            (3, Player::One),
        ]);
        assert_eq!(board.terminal(), Terminal::Win(Player::One));
    }

    #[test]
    fn detects_falling_diagonal_win() {
        // One's discs on (2,0) (3,1) (4,2) (5,3).
        let board = board_from_moves(&[
            (3, Player::One),
            (2, Player::Two),
            (2, Player::One),
            (1, Player::Two),
            (1, Player::Two),
            (1, Player::One),
            (0, Player::Two),
            (0, Player::Two),
            (0, Player::Two),
            (0, Player::One),
        ]);
        assert_eq!(board.terminal(), Terminal::Win(Player::One));
    }

    #[test]
    fn full_board_without_alignment_is_a_draw() {
        // Even rows follow the column pattern below, odd rows its inverse.
        // No line direction ever reaches four equal cells in that tiling.
        let pattern = [true, true, false, false, true, true, false];
        let mut board = Board::new();
        for col in 0..COLS {
            for row in (0..ROWS).rev() {
                let one = pattern[col] ^ (row % 2 == 1);
                let player = if one { Player::One } else { Player::Two };
                board.apply(col as u8, player).unwrap();
            }
        }
        assert!(board.legal_moves().next().is_none());
        assert_eq!(board.terminal(), Terminal::Draw);
    }

    #[test]
    fn empty_board_is_not_terminal() {
        assert_eq!(Board::new().terminal(), Terminal::None);
        assert_eq!(Board::new().legal_moves().count(), COLS);
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let mut board = Board::new();
        board.apply(3, Player::One).unwrap();
        let json = serde_json::to_value(board).unwrap();
        assert_eq!(json[5][3], 1);
        assert_eq!(json[0][0], 0);
        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
    }
}
