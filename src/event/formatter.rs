const DEFAULT_TAB_SIZE: usize = 4;

/// Line-oriented text builder with indentation, used by text and digest sinks.
#[derive(Debug, Clone)]
pub struct EventFormatter {
    level: usize,
    tab_size: usize,
    buf: String,
}

impl Default for EventFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFormatter {
    pub fn new() -> Self {
        Self {
            level: 0,
            tab_size: DEFAULT_TAB_SIZE,
            buf: String::new(),
        }
    }

    /// Appends a line prefixed by the current indentation.
    pub fn append_line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.level * self.tab_size {
            self.buf.push(' ');
        }
        self.buf.push_str(line.as_ref());
        self.buf.push('\n');
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    /// Decreases the indentation; saturates at zero.
    pub fn outdent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn indentation_level(&self) -> usize {
        self.level
    }

    pub fn set_indentation_level(&mut self, level: usize) {
        self.level = level;
    }

    pub fn tab_size(&self) -> usize {
        self.tab_size
    }

    pub fn set_tab_size(&mut self, tab_size: usize) {
        self.tab_size = tab_size;
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
