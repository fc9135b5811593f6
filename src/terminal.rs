use crossterm::{
    cursor, execute, queue,
    style::{Print, PrintStyledContent, Stylize},
    terminal::{
        self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{self, Write};
use tracing::debug;

/// The text surface a stream session renders into.
///
/// Writes are passed through untouched; the surface does no line handling
/// beyond what `writeln` appends.
pub trait TerminalSurface {
    fn open(&mut self) -> io::Result<()>;
    fn toggle_full_screen(&mut self, full_screen: bool) -> io::Result<()>;
    /// Resize the surface to the space it is mounted in.
    fn fit(&mut self) -> io::Result<()>;
    fn write(&mut self, text: &str) -> io::Result<()>;
    fn writeln(&mut self, text: &str) -> io::Result<()>;
    /// Release the surface. Nothing is written after this.
    fn destroy(&mut self) -> io::Result<()>;
    /// Static text shown instead of a terminal when none can be attached.
    fn render_notice(&mut self, text: &str) -> io::Result<()>;
}

/// A terminal surface on top of the controlling terminal.
///
/// In interactive mode the terminal is switched to raw mode and the
/// alternate screen; in plain mode text goes straight to the writer.
pub struct CrosstermSurface<W: Write> {
    out: W,
    interactive: bool,
    raw: bool,
    full_screen: bool,
    size: (u16, u16),
    destroyed: bool,
}

impl<W: Write> CrosstermSurface<W> {
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out,
            interactive,
            raw: false,
            full_screen: false,
            size: (0, 0),
            destroyed: false,
        }
    }

    fn line_ending(&self) -> &'static str {
        if self.raw { "\r\n" } else { "\n" }
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.full_screen {
            execute!(self.out, LeaveAlternateScreen)?;
            self.full_screen = false;
        }
        if self.raw {
            disable_raw_mode()?;
            execute!(self.out, cursor::Show)?;
            self.raw = false;
        }
        Ok(())
    }
}

impl<W: Write> TerminalSurface for CrosstermSurface<W> {
    fn open(&mut self) -> io::Result<()> {
        if self.interactive && !self.raw {
            enable_raw_mode()?;
            self.raw = true;
        }
        Ok(())
    }

    fn toggle_full_screen(&mut self, full_screen: bool) -> io::Result<()> {
        if !self.interactive || self.full_screen == full_screen {
            return Ok(());
        }
        if full_screen {
            execute!(
                self.out,
                EnterAlternateScreen,
                Clear(ClearType::All),
                cursor::MoveTo(0, 0)
            )?;
        } else {
            execute!(self.out, LeaveAlternateScreen)?;
        }
        self.full_screen = full_screen;
        Ok(())
    }

    fn fit(&mut self) -> io::Result<()> {
        if self.interactive {
            self.size = terminal::size()?;
            debug!(cols = self.size.0, rows = self.size.1, "terminal fitted");
        }
        Ok(())
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    fn writeln(&mut self, text: &str) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        let ending = self.line_ending();
        queue!(self.out, Print(text), Print(ending))?;
        self.out.flush()
    }

    fn destroy(&mut self) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        self.restore()
    }

    fn render_notice(&mut self, text: &str) -> io::Result<()> {
        let ending = self.line_ending();
        execute!(self.out, PrintStyledContent(text.bold()), Print(ending))
    }
}

impl<W: Write> Drop for CrosstermSurface<W> {
    fn drop(&mut self) {
        // Never leave the user's shell in raw mode, whatever state we end in.
        if let Err(e) = self.restore() {
            debug!("failed to restore terminal: {}", e);
        }
    }
}
