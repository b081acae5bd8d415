//! Inline terminal regions and text measurement
//!
//! `InlineRegion` repaints a block of lines in place so successive
//! frames replace each other instead of scrolling. Repaint math counts
//! physical lines, so all text is wrapped here before it is written.

use crossterm::{cursor, terminal, QueueableCommand};
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

/// Width assumed when the terminal size cannot be queried
pub const DEFAULT_WIDTH: usize = 80;

/// Current terminal width in columns
pub fn terminal_width() -> usize {
    match terminal::size() {
        Ok((columns, _)) => columns as usize,
        Err(_) => DEFAULT_WIDTH,
    }
}

/// Display width of `text`, ignoring ANSI color sequences
pub fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        width += c.width().unwrap_or(0);
    }
    width
}

/// Wrap one logical line to `width` columns without splitting words
///
/// Continuation lines repeat the original leading indentation. A word
/// wider than the available space overflows on its own line.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 || visible_width(line) <= width {
        return vec![line.to_string()];
    }

    let indent: String = line.chars().take_while(|c| *c == ' ').collect();
    let body = &line[indent.len()..];
    let available = width.saturating_sub(indent.len()).max(1);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for word in body.split(' ') {
        let word_width = visible_width(word);
        if current.is_empty() {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= available {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(format!("{indent}{current}"));
            current = word.to_string();
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(format!("{indent}{current}"));
    }
    lines
}

/// Region that owns stdout
pub type TermRegion = InlineRegion<Box<dyn Write + Send>>;

/// In-place multi-line terminal updates
///
/// A region must be the only writer to its stream while active.
pub struct InlineRegion<W: Write> {
    out: W,
    last_lines: u16,
}

impl InlineRegion<Box<dyn Write + Send>> {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl<W: Write> InlineRegion<W> {
    pub fn new(out: W) -> Self {
        Self { out, last_lines: 0 }
    }

    /// Replace the region contents with `text`, wrapped to `width`
    pub fn update(&mut self, text: &str, width: usize) -> io::Result<()> {
        self.out.queue(cursor::MoveToColumn(0))?;
        if self.last_lines > 0 {
            self.out.queue(cursor::MoveUp(self.last_lines))?;
        }
        self.out.queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;

        let mut count: u16 = 0;
        for logical in text.lines() {
            for line in wrap_line(logical, width) {
                self.out.write_all(line.as_bytes())?;
                self.out.write_all(b"\n")?;
                count = count.saturating_add(1);
            }
        }
        self.out.flush()?;
        self.last_lines = count;
        Ok(())
    }

    /// Print `text` below the region and leave it out of future repaints
    pub fn append(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.last_lines = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_width_counts_columns() {
        assert_eq!(visible_width("hello"), 5);
        assert_eq!(visible_width(""), 0);
    }

    #[test]
    fn ansi_sequences_are_invisible() {
        let colored = "\x1b[32m\u{2713}\x1b[0m passed";
        assert_eq!(visible_width(colored), 8);
    }

    #[test]
    fn short_lines_pass_through_unwrapped() {
        assert_eq!(wrap_line("short line", 40), vec!["short line"]);
    }

    #[test]
    fn wrapping_never_splits_words() {
        let wrapped = wrap_line("the quick brown fox jumps over the lazy dog", 15);
        assert_eq!(
            wrapped,
            vec!["the quick brown", "fox jumps over", "the lazy dog"]
        );
        for line in &wrapped {
            assert!(visible_width(line) <= 15);
        }
    }

    #[test]
    fn continuation_lines_keep_indentation() {
        let wrapped = wrap_line("    check: the dashboard greets returning users", 24);
        assert!(wrapped.len() > 1);
        for line in &wrapped {
            assert!(line.starts_with("    "));
        }
    }

    #[test]
    fn oversized_words_overflow_without_splitting() {
        let wrapped = wrap_line("see https://example.com/very/long/path/segment now", 20);
        assert!(wrapped.iter().any(|l| l.contains("https://")));
        assert!(!wrapped.iter().any(|l| l.ends_with('-')));
    }

    #[test]
    fn first_update_writes_without_moving_up() {
        let mut region = InlineRegion::new(Vec::new());
        region.update("one\ntwo", 80).unwrap();
        let written = String::from_utf8(region.out.clone()).unwrap();
        assert!(written.contains("one\n"));
        assert!(written.contains("two\n"));
        assert!(!written.contains("A"), "no cursor-up on first paint");
    }

    #[test]
    fn second_update_repaints_over_the_previous_frame() {
        let mut region = InlineRegion::new(Vec::new());
        region.update("one\ntwo", 80).unwrap();
        region.out.clear();
        region.update("three", 80).unwrap();
        let written = String::from_utf8(region.out.clone()).unwrap();
        assert!(written.contains("\x1b[2A"), "moves up over two lines");
        assert!(written.contains("\x1b[J"), "clears the old frame");
        assert!(written.contains("three\n"));
    }

    #[test]
    fn repaint_counts_wrapped_physical_lines() {
        let mut region = InlineRegion::new(Vec::new());
        region.update("alpha beta gamma delta", 11).unwrap();
        region.out.clear();
        region.update("x", 11).unwrap();
        let written = String::from_utf8(region.out.clone()).unwrap();
        assert!(written.contains("\x1b[2A"), "two physical lines from one logical line");
    }

    #[test]
    fn append_resets_region_tracking() {
        let mut region = InlineRegion::new(Vec::new());
        region.update("frame", 80).unwrap();
        region.append("summary").unwrap();
        region.out.clear();
        region.update("next", 80).unwrap();
        let written = String::from_utf8(region.out.clone()).unwrap();
        assert!(!written.contains("A"), "no cursor-up after append");
    }
}
