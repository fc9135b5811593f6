use crate::ui::widgets::NoticeBox;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};

/// Show a blocking notice and wait until the viewer dismisses it.
pub async fn alert(title: &str, message: &str) -> std::io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = show_until_key(&mut terminal, title, message).await;

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn show_until_key<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    title: &str,
    message: &str,
) -> std::io::Result<()> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|f| f.render_widget(NoticeBox::new(title, message), f.area()))?;
        match events.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}
