use console::{Term, style, truncate_str};
use uncia_archive::{EntryHeader, Progress};

/// Reports extracted entries on stderr.
///
/// On an interactive terminal each entry overwrites the previous line and a
/// successful run ends with a newline; in verbose mode or when stderr is
/// redirected every entry gets its own line.
pub struct TerminalProgress {
    term: Term,
    overwrite: bool,
    /// A line without trailing newline is on screen.
    dirty: bool,
}

impl TerminalProgress {
    pub fn new(verbose: bool) -> Self {
        let term = Term::stderr();
        let overwrite = term.is_term() && !verbose;
        Self::with_term(term, overwrite)
    }

    fn with_term(term: Term, overwrite: bool) -> Self {
        Self {
            term,
            overwrite,
            dirty: false,
        }
    }

    fn newline(&mut self) {
        self.dirty = false;
        if let Err(err) = self.term.write_line("") {
            tracing::debug!("progress output failed: {err}");
        }
    }
}

impl Progress for TerminalProgress {
    fn entry(&mut self, header: &EntryHeader) {
        let line = format!("{} {}", style("x").yellow(), header.path.display());

        let result = if self.overwrite {
            let (_, width) = self.term.size();
            self.dirty = true;
            self.term
                .clear_line()
                .and_then(|()| self.term.write_str(&truncate_str(&line, width as usize, "...")))
        } else {
            self.term.write_line(&line)
        };
        if let Err(err) = result {
            tracing::debug!("progress output failed: {err}");
        }
    }

    fn finish(&mut self) {
        if self.overwrite {
            self.newline();
        }
    }
}

impl Drop for TerminalProgress {
    // Leave the cursor on a fresh line when extraction stops early.
    fn drop(&mut self) {
        if self.dirty {
            self.newline();
        }
    }
}
