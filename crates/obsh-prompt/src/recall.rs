//! Clamped recall navigation.

/// Cursor into a recall list of length `len`.
///
/// Position `len` is the post-end slot: nothing selected, blank buffer.
/// Navigation is clamped to `[0, len]` in both directions.
#[derive(Debug, Clone, Copy)]
pub struct RecallCursor {
    len: usize,
    pos: usize,
}

impl RecallCursor {
    /// Create a cursor at the post-end position.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { len, pos: len }
    }

    /// Move toward older entries; clamped at the oldest.
    pub fn up(&mut self) -> Option<usize> {
        self.pos = self.pos.saturating_sub(1);
        self.selected()
    }

    /// Move toward newer entries; clamped at the post-end blank slot.
    pub fn down(&mut self) -> Option<usize> {
        if self.pos < self.len {
            self.pos += 1;
        }
        self.selected()
    }

    /// Currently selected index, or `None` at the post-end position.
    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        (self.pos < self.len).then_some(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unselected() {
        let cursor = RecallCursor::new(3);
        assert_eq!(cursor.selected(), None);
    }

    #[test]
    fn up_walks_to_oldest_and_clamps() {
        let mut cursor = RecallCursor::new(2);
        assert_eq!(cursor.up(), Some(1));
        assert_eq!(cursor.up(), Some(0));
        assert_eq!(cursor.up(), Some(0));
        assert_eq!(cursor.up(), Some(0));
    }

    #[test]
    fn down_walks_back_to_blank_and_clamps() {
        let mut cursor = RecallCursor::new(2);
        cursor.up();
        cursor.up();
        assert_eq!(cursor.down(), Some(1));
        assert_eq!(cursor.down(), None);
        assert_eq!(cursor.down(), None);
    }

    #[test]
    fn empty_history_never_selects() {
        let mut cursor = RecallCursor::new(0);
        assert_eq!(cursor.up(), None);
        assert_eq!(cursor.down(), None);
    }
}
