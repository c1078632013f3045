use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

pub const DEFAULT_ROWS: usize = 5;
pub const DEFAULT_COLS: usize = 5;
pub const MAX_ROWS: usize = 25;
pub const MAX_COLS: usize = 25;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("invalid seat map dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("seat ({row}, {col}) is outside of the seat map")]
    OutOfRange { row: i64, col: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseResult {
    OutOfRange,
    AlreadySold,
    Success,
}

#[derive(Debug)]
struct Grid {
    rows: usize,
    cols: usize,
    // row-major, true when the seat has been sold
    seats: Vec<bool>,
    sold: usize,
}

impl Grid {
    fn index(&self, row: i64, col: i64) -> Option<usize> {
        let row = usize::try_from(row).ok().filter(|row| *row < self.rows)?;
        let col = usize::try_from(col).ok().filter(|col| *col < self.cols)?;
        Some(row * self.cols + col)
    }
}

/// The seat map shared by every connection.
///
/// Each operation takes the lock exactly once, so the grid and the sold
/// counter are always observed together.
#[derive(Debug)]
pub struct Inventory {
    grid: Mutex<Grid>,
}

impl Inventory {
    /// Creates a seat map where every seat is still available
    pub fn create(rows: usize, cols: usize) -> Result<Self, InventoryError> {
        if rows == 0 || cols == 0 || rows > MAX_ROWS || cols > MAX_COLS {
            return Err(InventoryError::InvalidDimensions { rows, cols });
        }

        Ok(Self {
            grid: Mutex::new(Grid {
                rows,
                cols,
                seats: vec![false; rows * cols],
                sold: 0,
            }),
        })
    }

    // a panic can't happen while the guard is held, so a poisoned grid is still consistent
    fn grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_sold(&self, row: i64, col: i64) -> Result<bool, InventoryError> {
        let grid = self.grid();
        grid.index(row, col)
            .map(|idx| grid.seats[idx])
            .ok_or(InventoryError::OutOfRange { row, col })
    }

    /// Attempts to buy a single seat
    ///
    /// at most one caller ever receives `Success` for a given seat.
    pub fn purchase(&self, row: i64, col: i64) -> PurchaseResult {
        let mut grid = self.grid();
        let Some(idx) = grid.index(row, col) else {
            return PurchaseResult::OutOfRange;
        };

        if grid.seats[idx] {
            return PurchaseResult::AlreadySold;
        }

        grid.seats[idx] = true;
        grid.sold += 1;
        PurchaseResult::Success
    }

    pub fn dimensions(&self) -> (usize, usize) {
        let grid = self.grid();
        (grid.rows, grid.cols)
    }

    pub fn total(&self) -> usize {
        let grid = self.grid();
        grid.rows * grid.cols
    }

    pub fn available(&self) -> usize {
        let grid = self.grid();
        grid.rows * grid.cols - grid.sold
    }

    pub fn sold_count(&self) -> usize {
        self.grid().sold
    }

    /// Takes a consistent copy of the whole seat map
    pub fn snapshot(&self) -> SeatMap {
        let grid = self.grid();
        SeatMap {
            rows: grid.rows,
            cols: grid.cols,
            seats: grid.seats.clone(),
        }
    }
}

/// A point-in-time copy of the seat map, mostly useful for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatMap {
    rows: usize,
    cols: usize,
    seats: Vec<bool>,
}

impl SeatMap {
    pub fn is_sold(&self, row: usize, col: usize) -> Option<bool> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        Some(self.seats[row * self.cols + col])
    }
}

impl fmt::Display for SeatMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====== Seats Sold =======")?;

        write!(f, "   | ")?;
        for col in 0..self.cols {
            write!(f, "{:2} ", col)?;
        }
        writeln!(f)?;
        writeln!(f, "---|--{}", "---".repeat(self.cols))?;

        for (row, seats) in self.seats.chunks(self.cols).enumerate() {
            write!(f, "{:2} | ", row)?;
            for sold in seats {
                write!(f, "{:2} ", u8::from(*sold))?;
            }
            writeln!(f, "|")?;
        }

        write!(f, "~~~~~~{}", "~~~".repeat(self.cols))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::{Inventory, InventoryError, PurchaseResult, MAX_COLS, MAX_ROWS};

    #[test]
    fn rejects_bad_dimensions() {
        for (rows, cols) in [(0, 5), (5, 0), (MAX_ROWS + 1, 5), (5, MAX_COLS + 1)] {
            assert_eq!(
                Inventory::create(rows, cols).unwrap_err(),
                InventoryError::InvalidDimensions { rows, cols }
            );
        }

        assert!(Inventory::create(MAX_ROWS, MAX_COLS).is_ok());
    }

    #[test]
    fn fresh_inventory() {
        let inventory = Inventory::create(5, 5).unwrap();
        assert_eq!(inventory.dimensions(), (5, 5));
        assert_eq!(inventory.total(), 25);
        assert_eq!(inventory.available(), 25);
        assert_eq!(inventory.sold_count(), 0);
        assert_eq!(inventory.is_sold(4, 4), Ok(false));
    }

    #[test]
    fn purchase_flow() {
        let inventory = Inventory::create(3, 4).unwrap();

        assert_eq!(inventory.purchase(2, 3), PurchaseResult::Success);
        assert_eq!(inventory.purchase(2, 3), PurchaseResult::AlreadySold);
        assert_eq!(inventory.is_sold(2, 3), Ok(true));
        assert_eq!(inventory.is_sold(3, 2), Err(InventoryError::OutOfRange { row: 3, col: 2 }));

        assert_eq!(inventory.sold_count(), 1);
        assert_eq!(inventory.available() + inventory.sold_count(), inventory.total());
    }

    #[test]
    fn boundary_rejection() {
        let inventory = Inventory::create(2, 3).unwrap();

        for (row, col) in [(-1, 0), (0, -1), (2, 0), (0, 3), (i64::MAX, i64::MIN)] {
            assert_eq!(inventory.purchase(row, col), PurchaseResult::OutOfRange);
            assert!(inventory.is_sold(row, col).is_err());
        }

        assert_eq!(inventory.sold_count(), 0);
        assert_eq!(inventory.available(), 6);
    }

    #[test]
    fn query_does_not_mutate() {
        let inventory = Inventory::create(2, 2).unwrap();
        inventory.purchase(1, 1);

        let before = inventory.snapshot();
        for _ in 0..10 {
            assert_eq!(inventory.is_sold(1, 1), Ok(true));
            assert_eq!(inventory.is_sold(0, 1), Ok(false));
        }

        assert_eq!(inventory.snapshot(), before);
        assert_eq!(inventory.sold_count(), 1);
    }

    #[test]
    fn concurrent_purchases_are_exclusive() {
        let inventory = Arc::new(Inventory::create(4, 4).unwrap());

        // every thread tries to buy every seat
        let handles = (0..8)
            .map(|_| {
                let inventory = inventory.clone();
                thread::spawn(move || {
                    let mut won = Vec::new();
                    for row in 0..4 {
                        for col in 0..4 {
                            if inventory.purchase(row, col) == PurchaseResult::Success {
                                won.push((row, col));
                            }
                        }
                    }
                    won
                })
            })
            .collect::<Vec<_>>();

        let mut won = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        won.sort();

        let expected = (0..4)
            .flat_map(|row| (0..4).map(move |col| (row, col)))
            .collect::<Vec<_>>();
        assert_eq!(won, expected);
        assert_eq!(inventory.available(), 0);
        assert_eq!(inventory.sold_count(), 16);
    }

    #[test]
    fn seat_map_rendering() {
        let inventory = Inventory::create(2, 2).unwrap();
        inventory.purchase(0, 1);

        let map = inventory.snapshot();
        assert_eq!(map.is_sold(0, 1), Some(true));
        assert_eq!(map.is_sold(1, 0), Some(false));
        assert_eq!(map.is_sold(2, 0), None);

        let expected = "====== Seats Sold =======\n\
                        \x20  |  0  1 \n\
                        ---|--------\n\
                        \x200 |  0  1 |\n\
                        \x201 |  0  0 |\n\
                        ~~~~~~~~~~~~";
        assert_eq!(map.to_string(), expected);
    }
}
