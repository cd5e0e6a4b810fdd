//! Sliding K x K neighborhood reconstruction from a raster stream.
//!
//! [`WindowEngine`] keeps the previous `K - 1` rows in a [`RowStore`] and a
//! `K x K` register [`Window`]. Each accepted pixel is written into the row
//! store, the window shifts one column left, and a new rightmost column is
//! loaded from the row store plus the incoming pixel. The newest row is the
//! stream itself, so only `K - 1` rows are ever stored.
//!
//! The incoming pixel sits at the bottom-right corner of the window, which
//! makes the window *center* lag the stream by `K / 2` rows and columns.
//! A window is valid once every cell holds a pixel of the current frame:
//! its center is at row and column `>= K / 2`.

use log::trace;

use crate::token::{FramePosition, Token};
use crate::types::StreamError;

/// Construction-time parameters of a windowing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    kernel_size: usize,
    max_image_width: usize,
}

impl WindowConfig {
    /// Validate and create a window configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `kernel_size` is even or
    /// smaller than 3, or if `max_image_width` is smaller than
    /// `kernel_size`.
    pub fn new(kernel_size: usize, max_image_width: usize) -> Result<Self, StreamError> {
        if kernel_size < 3 || kernel_size % 2 == 0 {
            return Err(StreamError::InvalidConfig(format!(
                "kernel size must be odd and at least 3, got {kernel_size}"
            )));
        }
        if max_image_width < kernel_size {
            return Err(StreamError::InvalidConfig(format!(
                "max image width {max_image_width} is smaller than kernel size {kernel_size}"
            )));
        }
        Ok(Self {
            kernel_size,
            max_image_width,
        })
    }

    /// Window edge length `K`.
    #[must_use]
    pub const fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Widest frame the row store can hold.
    #[must_use]
    pub const fn max_image_width(&self) -> usize {
        self.max_image_width
    }

    /// Distance from the window center to its edge, `K / 2`.
    #[must_use]
    pub const fn radius(&self) -> usize {
        self.kernel_size / 2
    }

    /// Accepted pixels from frame start until the first valid window for a
    /// frame of the given width.
    #[must_use]
    pub const fn fill_latency(&self, image_width: usize) -> usize {
        (self.kernel_size - 1) * image_width + (self.kernel_size - 1)
    }
}

/// The `K - 1` most recent rows, stored as a ring indexed by
/// `(row mod (K - 1), column)`.
///
/// Sized once at construction for the maximum image width.
#[derive(Debug, Clone)]
pub struct RowStore {
    rows: usize,
    width: usize,
    data: Vec<u32>,
}

impl RowStore {
    /// Allocate storage for `rows` rows of `width` pixels, zero-filled.
    #[must_use]
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            rows,
            width,
            data: vec![0; rows * width],
        }
    }

    /// Number of stored rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Read the stored column at `column` for the rows preceding `row`
    /// (oldest first) into `out`, then store `value` as row `row`,
    /// discarding the oldest.
    ///
    /// `out` must hold exactly [`rows`](Self::rows) values. Row
    /// `row - rows + j` lives in slot `(row + j) mod rows`, so the oldest
    /// row's slot is the one overwritten.
    pub fn shift_in(&mut self, row: usize, column: usize, value: u32, out: &mut [u32]) {
        let n = self.rows;
        for (j, slot) in out.iter_mut().enumerate() {
            *slot = self.data[((row + j) % n) * self.width + column];
        }
        self.data[(row % n) * self.width + column] = value;
    }
}

/// A `K x K` neighborhood, row-major, top row oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    size: usize,
    cells: Vec<u32>,
}

impl Window {
    /// A zero-filled window.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Build a window from row-major cells.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `cells` is not a square
    /// number of values.
    pub fn from_cells(size: usize, cells: Vec<u32>) -> Result<Self, StreamError> {
        if cells.len() != size * size {
            return Err(StreamError::InvalidConfig(format!(
                "a {size}x{size} window needs {} cells, got {}",
                size * size,
                cells.len()
            )));
        }
        Ok(Self { size, cells })
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Cell at `(row, column)` within the window.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> u32 {
        self.cells[row * self.size + column]
    }

    /// All cells, row-major.
    #[must_use]
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Shift every row one column left and load `column` (top to bottom)
    /// as the new rightmost column.
    fn shift_left(&mut self, column: &[u32]) {
        let k = self.size;
        for (row, &value) in self.cells.chunks_exact_mut(k).zip(column) {
            row.copy_within(1.., 0);
            row[k - 1] = value;
        }
    }
}

/// Result of one [`WindowEngine::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowStatus {
    /// The window is fully populated with pixels of the current frame.
    ///
    /// Set once the incoming pixel (the window's bottom-right cell) is at
    /// row and column `>= K - 1`; the first valid window is therefore the
    /// one whose `center` is `(K / 2, K / 2)`.
    pub valid: bool,
    /// First valid window of the frame.
    pub first: bool,
    /// The incoming pixel ended its row; last valid window of the row.
    pub end_of_row: bool,
    /// Frame coordinates of the window center (meaningful when `valid`).
    pub center: FramePosition,
}

/// Reconstructs a `K x K` window per accepted pixel.
///
/// Call [`advance`](Self::advance) only on ticks where the upstream
/// transfer happened; nothing here moves otherwise.
///
/// The runtime image width must not exceed the configured maximum. A wider
/// frame is a caller contract violation: the engine does not check it and
/// indexing past the row store will panic.
#[derive(Debug, Clone)]
pub struct WindowEngine {
    config: WindowConfig,
    store: RowStore,
    window: Window,
    column: Vec<u32>,
    image_width: usize,
    pending_width: usize,
    next: FramePosition,
    current: FramePosition,
    status: WindowStatus,
}

impl WindowEngine {
    /// Create an engine; the runtime width defaults to the maximum.
    #[must_use]
    pub fn new(config: WindowConfig) -> Self {
        let k = config.kernel_size;
        Self {
            config,
            store: RowStore::new(k - 1, config.max_image_width),
            window: Window::new(k),
            column: vec![0; k],
            image_width: config.max_image_width,
            pending_width: config.max_image_width,
            next: FramePosition::default(),
            current: FramePosition::default(),
            status: WindowStatus::default(),
        }
    }

    /// Configuration this engine was built with.
    #[must_use]
    pub const fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Declare the width of the next frame. Takes effect when the next
    /// `start_of_frame` is accepted.
    pub const fn set_image_width(&mut self, width: usize) {
        self.pending_width = width;
    }

    /// Width of the frame currently streaming.
    #[must_use]
    pub const fn image_width(&self) -> usize {
        self.image_width
    }

    /// Position of the most recently accepted pixel.
    #[must_use]
    pub const fn position(&self) -> FramePosition {
        self.current
    }

    /// The current window register.
    #[must_use]
    pub const fn window(&self) -> &Window {
        &self.window
    }

    /// Status produced by the last accepted pixel.
    #[must_use]
    pub const fn status(&self) -> WindowStatus {
        self.status
    }

    /// Accept one token.
    ///
    /// A `start_of_frame` token resets the position to `(0, 0)` and latches
    /// the pending width before its pixel is written, so frame start and
    /// first write coincide. Invalid tokens change nothing and report an
    /// invalid window.
    pub fn advance(&mut self, token: Token) -> WindowStatus {
        if !token.valid {
            return WindowStatus::default();
        }

        if token.start_of_frame {
            self.next = FramePosition::default();
            self.image_width = self.pending_width;
            trace!(
                "frame start: {}x{} window, width {}",
                self.config.kernel_size, self.config.kernel_size, self.image_width
            );
        }

        let FramePosition { column, row } = self.next;
        let k = self.config.kernel_size;

        let (stored, newest) = self.column.split_at_mut(k - 1);
        self.store.shift_in(row, column, token.value, stored);
        newest[0] = token.value;
        self.window.shift_left(&self.column);

        let border = k - 1;
        let radius = self.config.radius();
        let valid = row >= border && column >= border;
        let end_of_row = column + 1 >= self.image_width;
        self.status = WindowStatus {
            valid,
            first: row == border && column == border,
            end_of_row,
            center: if valid {
                FramePosition::new(column - radius, row - radius)
            } else {
                FramePosition::default()
            },
        };

        self.current = self.next;
        self.next = if end_of_row {
            FramePosition::new(0, row + 1)
        } else {
            FramePosition::new(column + 1, row)
        };
        self.status
    }
}
