//! Tab-indented Go source buffer.

#[derive(Debug, Default)]
pub(crate) struct GoWriter {
    buf: String,
    depth: usize,
}

impl GoWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.buf.push('\t');
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    /// Write `text` and indent what follows.
    pub(crate) fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent and write `text`.
    pub(crate) fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// `} else {`
    pub(crate) fn reopen(&mut self, text: impl AsRef<str>) {
        self.close(text);
        self.depth += 1;
    }

    pub(crate) fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_tab_indented() {
        let mut w = GoWriter::new();
        w.open("if x {");
        w.line("a()");
        w.reopen("} else {");
        w.line("b()");
        w.close("}");
        assert_eq!(w.finish(), "if x {\n\ta()\n} else {\n\tb()\n}\n");
    }
}
