use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

/// A centered, opaque message box.
pub struct NoticeBox<'a> {
    title: &'a str,
    lines: Vec<Line<'a>>,
}

impl<'a> NoticeBox<'a> {
    pub fn new(title: &'a str, message: &'a str) -> Self {
        let mut lines: Vec<Line> = message.lines().map(Line::from).collect();
        lines.push(Line::from(""));
        lines.push(Line::from("Press any key to close"));
        Self { title, lines }
    }
}

impl Widget for NoticeBox<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let widest = self.lines.iter().map(Line::width).max().unwrap_or(0) as u16;
        let width = (widest + 4).max(self.title.len() as u16 + 4).min(area.width);
        let height = (self.lines.len() as u16 + 2).min(area.height);
        let x = (area.width.saturating_sub(width)) / 2;
        let y = (area.height.saturating_sub(height)) / 2;

        let notice_area = Rect {
            x: area.x + x,
            y: area.y + y,
            width,
            height,
        };

        Clear.render(notice_area, buf);

        let block = Block::default()
            .title(self.title)
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::Black).fg(Color::Yellow));

        Paragraph::new(self.lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(Color::Black).fg(Color::White))
            .render(notice_area, buf);
    }
}
