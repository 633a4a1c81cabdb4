//! Page window navigation for inline keyboards.
//!
//! Collections coming back from GLPI (tickets, followups, documents, history)
//! have no fixed length, while an inline keyboard shows at most one page of
//! them. `render` turns a window into the prev/next controls of that page.

/// Which way a navigation control moves the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    /// Button label shown in the keyboard
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Prev => "⬅️",
            Direction::Next => "➡️",
        }
    }
}

/// A single navigation control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavControl {
    pub direction: Direction,
    pub target_page_start: usize,
    /// Callback identifier: the window's prefix followed by the target offset
    pub callback: String,
}

impl NavControl {
    fn new(direction: Direction, target_page_start: usize, prefix: &str) -> Self {
        Self {
            direction,
            target_page_start,
            callback: format!("{}{}", prefix, target_page_start),
        }
    }
}

/// Ordered controls: prev (if any) always comes before next (if any).
pub type NavigationControls = Vec<NavControl>;

/// Build the navigation controls for one page.
///
/// A `page_size` of zero is treated as "everything on one page".
pub fn render(
    item_count: usize,
    page_start: usize,
    page_size: usize,
    callback_prefix: &str,
) -> NavigationControls {
    let mut controls = Vec::with_capacity(2);
    if page_size == 0 || item_count <= page_size {
        return controls;
    }

    let next_start = page_start.saturating_add(page_size);

    if page_start >= page_size {
        controls.push(NavControl::new(
            Direction::Prev,
            page_start - page_size,
            callback_prefix,
        ));
        if next_start < item_count {
            controls.push(NavControl::new(Direction::Next, next_start, callback_prefix));
        }
    } else {
        // first page (or an offset that is not page aligned): forward only
        controls.push(NavControl::new(Direction::Next, next_start, callback_prefix));
    }

    controls
}

/// Items visible in the window `[page_start, page_start + page_size)`.
pub fn page_slice<T>(items: &[T], page_start: usize, page_size: usize) -> &[T] {
    if page_start >= items.len() {
        return &[];
    }
    let end = page_start.saturating_add(page_size).min(items.len());
    &items[page_start..end]
}
