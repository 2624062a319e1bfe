/// Splits decoded text into `\n`-terminated lines.
///
/// The internal buffer only ever holds the unterminated tail of the most
/// recent line.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    /// Appends `text` and returns the lines it completed.
    ///
    /// The returned iterator owns the completed segment, so the framer is
    /// free to accept more text while lines are still being consumed.
    pub fn feed(&mut self, text: &str) -> Lines {
        self.buffer.push_str(text);
        match self.buffer.rfind('\n') {
            Some(last_newline) => {
                let tail = self.buffer.split_off(last_newline + 1);
                Lines::new(std::mem::replace(&mut self.buffer, tail))
            }
            None => Lines::default(),
        }
    }

    /// Flushes whatever is left once the stream has closed.
    ///
    /// Servers are not required to terminate the last line, so a non-empty
    /// tail is returned as one final line.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buffer);
        let line = tail.strip_suffix('\r').unwrap_or(&tail);
        (!line.is_empty()).then(|| line.to_string())
    }

    /// The unterminated tail currently buffered.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Lazy iterator over the lines completed by one [`LineFramer::feed`] call.
#[derive(Debug, Default)]
pub struct Lines {
    segment: String,
    pos: usize,
}

impl Lines {
    fn new(segment: String) -> Self {
        Self { segment, pos: 0 }
    }
}

impl Iterator for Lines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = self.segment.get(self.pos..)?;
        let end = rest.find('\n')?;
        let line = &rest[..end];
        let line = line.strip_suffix('\r').unwrap_or(line).to_string();
        self.pos += end + 1;
        Some(line)
    }
}
