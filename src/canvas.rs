use crate::types::{Color, FontFace, Rect, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Text run with its baseline origin at (x, y). `text` is already folded to
    /// ASCII but not yet escaped.
    DrawString {
        x: f32,
        y: f32,
        text: String,
        font: FontFace,
        size: f32,
        color: Color,
    },
    StrokeRect { rect: Rect, color: Color },
    FillRect { rect: Rect, color: Color },
    /// Paints the document's single image XObject into `rect`.
    DrawImage { rect: Rect },
}

impl Command {
    /// Lowest y the command touches.
    pub fn min_y(&self) -> f32 {
        match self {
            Command::DrawString { y, .. } => *y,
            Command::StrokeRect { rect, .. }
            | Command::FillRect { rect, .. }
            | Command::DrawImage { rect } => rect.y,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn uses_image(&self) -> bool {
        self.commands
            .iter()
            .any(|cmd| matches!(cmd, Command::DrawImage { .. }))
    }
}

/// Pages in output order. Pages are only ever appended.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    pub page_size: Size,
    pages: Vec<Page>,
}

impl PageSet {
    /// Starts with one empty page.
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: vec![Page::new()],
        }
    }

    pub fn start_page(&mut self) {
        self.pages.push(Page::new());
    }

    pub fn current_mut(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn command_count(&self) -> usize {
        self.pages.iter().map(|p| p.commands.len()).sum()
    }
}
