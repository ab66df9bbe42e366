/// Braille canvas for high-resolution terminal rendering
/// Each terminal cell contains a 2×4 grid of Braille dots, which makes every dot
/// roughly square on a typical terminal font. A cell takes the color of the last
/// dot drawn into it.
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

pub struct BrailleCanvas {
    width: usize,  // Width in terminal cells
    height: usize, // Height in terminal cells
    dots: Vec<u8>,
    colors: Vec<Option<Color>>,
}

impl BrailleCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dots: vec![0; width * height],
            colors: vec![None; width * height],
        }
    }

    /// Set a dot at pixel coordinates; anything off the canvas is ignored
    /// pixel_x: 0 to (width * 2 - 1)
    /// pixel_y: 0 to (height * 4 - 1)
    pub fn set_pixel(&mut self, pixel_x: i32, pixel_y: i32, color: Color) {
        if pixel_x < 0 || pixel_y < 0 {
            return;
        }
        let (pixel_x, pixel_y) = (pixel_x as usize, pixel_y as usize);
        let cell_x = pixel_x / 2;
        let cell_y = pixel_y / 4;
        if cell_x >= self.width || cell_y >= self.height {
            return;
        }

        // Braille dot numbering:
        // 1 4
        // 2 5
        // 3 6
        // 7 8
        let bit = match (pixel_x % 2, pixel_y % 4) {
            (0, 0) => 0,
            (0, 1) => 1,
            (0, 2) => 2,
            (0, _) => 6,
            (_, 0) => 3,
            (_, 1) => 4,
            (_, 2) => 5,
            _ => 7,
        };

        let index = cell_y * self.width + cell_x;
        self.dots[index] |= 1 << bit;
        self.colors[index] = Some(color);
    }

    /// Fill a rectangle with pixels
    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Color) {
        for py in y..(y + height.max(1)) {
            for px in x..(x + width.max(1)) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Convert dot pattern to Braille character
    /// Braille Unicode: U+2800 + dot pattern
    pub fn to_char(&self, cell_x: usize, cell_y: usize) -> char {
        if cell_x >= self.width || cell_y >= self.height {
            return ' ';
        }

        let pattern = self.dots[cell_y * self.width + cell_x];
        char::from_u32(0x2800 + pattern as u32).unwrap_or(' ')
    }

    pub fn color_at(&self, cell_x: usize, cell_y: usize) -> Option<Color> {
        if cell_x >= self.width || cell_y >= self.height {
            return None;
        }
        self.colors[cell_y * self.width + cell_x]
    }

    /// One styled line per cell row, with runs of equal color merged into a span
    pub fn lines(&self) -> Vec<Line<'static>> {
        (0..self.height)
            .map(|y| {
                let mut spans: Vec<Span<'static>> = Vec::new();
                let mut run = String::new();
                let mut run_color = None;

                for x in 0..self.width {
                    let color = self.color_at(x, y);
                    if color != run_color && !run.is_empty() {
                        spans.push(styled(std::mem::take(&mut run), run_color));
                    }
                    run_color = color;
                    run.push(self.to_char(x, y));
                }
                if !run.is_empty() {
                    spans.push(styled(run, run_color));
                }
                Line::from(spans)
            })
            .collect()
    }

    /// Get width in pixels (2 per cell)
    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    /// Get height in pixels (4 per cell)
    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }
}

fn styled(text: String, color: Option<Color>) -> Span<'static> {
    match color {
        Some(color) => Span::styled(text, Style::default().fg(color)),
        None => Span::raw(text),
    }
}
