//! The player's 5×5 card.

use std::collections::BTreeSet;

/// Cells per side.
pub const CARD_SIDE: usize = 5;

/// Total number of cells.
pub const CARD_CELLS: usize = CARD_SIDE * CARD_SIDE;

/// Sentinel value of the free cell.
pub const FREE_CELL: u8 = 0;

/// Position of the free cell.
pub const FREE_POS: CellPos = CellPos { row: 2, col: 2 };

/// A `(row, col)` coordinate on a card, both in `0..5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPos {
    pub row: u8,
    pub col: u8,
}

impl CellPos {
    /// Build a position, or `None` if it falls off the card.
    pub fn new(row: u8, col: u8) -> Option<Self> {
        let side = CARD_SIDE as u8;
        (row < side && col < side).then_some(Self { row, col })
    }

    fn index(self) -> usize {
        usize::from(self.row) * CARD_SIDE + usize::from(self.col)
    }
}

/// A completed line on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Row(u8),
    Column(u8),
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

/// A server-assigned card: row-major cells with the free cell at the center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    cells: [u8; CARD_CELLS],
}

impl Card {
    /// Build a card from a flat row-major playboard.
    ///
    /// Returns `None` unless there are exactly 25 cells and the center is the
    /// free sentinel.
    pub fn from_cells(cells: &[u8]) -> Option<Self> {
        let cells: [u8; CARD_CELLS] = cells.try_into().ok()?;
        (cells.get(FREE_POS.index()) == Some(&FREE_CELL)).then_some(Self { cells })
    }

    /// The raw cells in row-major order.
    pub fn cells(&self) -> &[u8; CARD_CELLS] {
        &self.cells
    }

    /// Returns `true` if `number` is printed on the card. The free cell never matches.
    pub fn contains(&self, number: u8) -> bool {
        number != FREE_CELL && self.cells.contains(&number)
    }

    /// Lines fully covered by `marked`, counting the free cell as covered.
    ///
    /// This is a display hint. Whether a claim wins is decided by the server.
    pub fn completed_lines(&self, marked: &BTreeSet<u8>) -> Vec<Line> {
        let covered = |row: usize, col: usize| {
            self.cells
                .get(row * CARD_SIDE + col)
                .is_some_and(|v| *v == FREE_CELL || marked.contains(v))
        };

        let mut lines = Vec::new();
        for i in 0..CARD_SIDE {
            if (0..CARD_SIDE).all(|c| covered(i, c)) {
                lines.push(Line::Row(i as u8));
            }
        }
        for i in 0..CARD_SIDE {
            if (0..CARD_SIDE).all(|r| covered(r, i)) {
                lines.push(Line::Column(i as u8));
            }
        }
        if (0..CARD_SIDE).all(|i| covered(i, i)) {
            lines.push(Line::Diagonal);
        }
        if (0..CARD_SIDE).all(|i| covered(i, CARD_SIDE - 1 - i)) {
            lines.push(Line::AntiDiagonal);
        }
        lines
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    /// B 1-5, I 16-20, N 31-35 (free center), G 46-50, O 61-65, laid out by column.
    pub(crate) fn sample_cells() -> Vec<u8> {
        let mut cells = Vec::with_capacity(CARD_CELLS);
        for r in 0..5u8 {
            for c in 0..5u8 {
                if r == 2 && c == 2 {
                    cells.push(FREE_CELL);
                } else {
                    cells.push(1 + c * 15 + r);
                }
            }
        }
        cells
    }

    #[test]
    fn rejects_wrong_length_or_missing_free_cell() {
        assert!(Card::from_cells(&[1, 2, 3]).is_none());
        let mut cells = sample_cells();
        cells[12] = 33;
        assert!(Card::from_cells(&cells).is_none());
        assert!(Card::from_cells(&sample_cells()).is_some());
    }

    #[test]
    fn free_cell_is_never_contained() {
        let card = Card::from_cells(&sample_cells()).unwrap();
        assert!(!card.contains(FREE_CELL));
        assert_eq!(card.cells()[12], FREE_CELL);
    }

    #[test]
    fn positions_stay_on_the_card() {
        assert_eq!(CellPos::new(4, 4), Some(CellPos { row: 4, col: 4 }));
        assert!(CellPos::new(5, 0).is_none());
        assert!(CellPos::new(0, 5).is_none());
    }

    #[test]
    fn middle_row_needs_four_marks() {
        let card = Card::from_cells(&sample_cells()).unwrap();
        let mut marked: BTreeSet<u8> = [3, 18, 48].into_iter().collect();
        assert!(card.completed_lines(&marked).is_empty());
        marked.insert(63);
        assert_eq!(card.completed_lines(&marked), vec![Line::Row(2)]);
    }

    #[test]
    fn diagonals_and_columns() {
        let card = Card::from_cells(&sample_cells()).unwrap();
        let diag: BTreeSet<u8> = [1, 17, 49, 65].into_iter().collect();
        assert_eq!(card.completed_lines(&diag), vec![Line::Diagonal]);
        let column: BTreeSet<u8> = (1..=5).collect();
        assert_eq!(card.completed_lines(&column), vec![Line::Column(0)]);
    }
}
