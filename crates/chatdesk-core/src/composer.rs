//! Multi-line message input whose height follows its content.

pub const DEFAULT_MAX_ROWS: u16 = 6;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Clone)]
pub struct Composer {
    text: String,
    cursor: usize, // in chars
    max_rows: u16,
    scroll: u16,
}

impl Composer {
    pub fn new(max_rows: u16) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            max_rows: max_rows.max(1),
            scroll: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
        self.follow_cursor();
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert_char(if c == '\r' { '\n' } else { c });
        }
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
            self.follow_cursor();
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
            self.follow_cursor();
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.follow_cursor();
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
        self.follow_cursor();
    }

    pub fn move_home(&mut self) {
        let (_, col) = self.cursor_position();
        self.cursor -= usize::from(col);
    }

    pub fn move_end(&mut self) {
        let rest = self.text.chars().skip(self.cursor).take_while(|c| *c != '\n').count();
        self.cursor += rest;
    }

    /// Empty the box and hand back what was typed.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        self.scroll = 0;
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.take();
    }

    pub fn line_count(&self) -> u16 {
        let lines = self.text.split('\n').count();
        u16::try_from(lines).unwrap_or(u16::MAX)
    }

    /// Rows to draw: grows with the content, capped at `max_rows`.
    pub fn height(&self) -> u16 {
        self.line_count().clamp(1, self.max_rows)
    }

    /// First visible row once the content outgrows the box.
    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    /// (row, column) of the cursor, in chars.
    pub fn cursor_position(&self) -> (u16, u16) {
        let before: String = self.text.chars().take(self.cursor).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        (
            u16::try_from(row).unwrap_or(u16::MAX),
            u16::try_from(col).unwrap_or(u16::MAX),
        )
    }

    fn follow_cursor(&mut self) {
        let (row, _) = self.cursor_position();
        let height = self.height();
        if row < self.scroll {
            self.scroll = row;
        } else if row >= self.scroll + height {
            self.scroll = row + 1 - height;
        }
        let max_scroll = self.line_count().saturating_sub(height);
        self.scroll = self.scroll.min(max_scroll);
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROWS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_grows_then_caps() {
        let mut composer = Composer::new(3);
        assert_eq!(composer.height(), 1);
        composer.insert_str("a\nb");
        assert_eq!(composer.height(), 2);
        composer.insert_str("\nc\nd\ne");
        assert_eq!(composer.line_count(), 5);
        assert_eq!(composer.height(), 3);
    }

    #[test]
    fn test_scrolls_internally_to_keep_cursor_visible() {
        let mut composer = Composer::new(2);
        composer.insert_str("1\n2\n3\n4");
        assert_eq!(composer.cursor_position(), (3, 1));
        assert_eq!(composer.scroll(), 2);

        for _ in 0..6 {
            composer.move_left();
        }
        assert_eq!(composer.cursor_position().0, 0);
        assert_eq!(composer.scroll(), 0);
    }

    #[test]
    fn test_delete_joining_lines_keeps_scroll_in_range() {
        let mut composer = Composer::new(2);
        composer.insert_str("1\n2\n3");
        assert_eq!(composer.scroll(), 1);

        composer.move_home();
        composer.move_left();
        composer.delete();
        assert_eq!(composer.text(), "1\n23");
        assert_eq!(composer.height(), 2);
        assert_eq!(composer.scroll(), 0);
    }

    #[test]
    fn test_utf8_editing() {
        let mut composer = Composer::default();
        composer.insert_str("añb");
        composer.move_left();
        composer.backspace();
        assert_eq!(composer.text(), "ab");
        composer.insert_char('ü');
        assert_eq!(composer.text(), "aüb");
        composer.delete();
        assert_eq!(composer.text(), "aü");
    }

    #[test]
    fn test_home_end_within_line() {
        let mut composer = Composer::default();
        composer.insert_str("first\nsecond");
        composer.move_home();
        assert_eq!(composer.cursor_position(), (1, 0));
        composer.move_end();
        assert_eq!(composer.cursor_position(), (1, 6));
    }

    #[test]
    fn test_take_resets() {
        let mut composer = Composer::default();
        composer.insert_str("hello\nworld");
        assert_eq!(composer.take(), "hello\nworld");
        assert!(composer.is_blank());
        assert_eq!(composer.cursor(), 0);
        assert_eq!(composer.height(), 1);
    }
}
