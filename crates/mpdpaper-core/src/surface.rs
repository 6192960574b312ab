//! E-paper rendering of the screen regions.
//!
//! [`EpdSurface`] keeps one packed 4bpp [`Canvas`] per region, draws text into
//! it with embedded-graphics and hands the bytes to a [`Panel`] together with
//! the refresh mode to use. Menus go out with [`MENU_REFRESH`] because they
//! repaint on every cursor move; status text goes out with [`STATUS_REFRESH`].

use core::convert::Infallible;
use core::fmt::Debug;

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Gray4,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use embedded_text::{alignment::HorizontalAlignment, style::TextBoxStyleBuilder, TextBox};
use it8951::{Area, BuilderError, Canvas};

use crate::board::DisplaySurface;
use crate::layout::{
    BOTTOM_AREA, CONTENT_AREA, CONTENT_HEIGHT, DISPLAY_HEIGHT, DISPLAY_WIDTH, TEXT_MARGIN,
    TOP_AREA,
};
use crate::menu::MenuLine;

/// E-paper waveform class for a region update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Flashing 16-level update, no ghosting
    Full,
    /// Non-flashing 4-level update
    Partial,
    /// Black/white only, fastest, ghosts
    #[default]
    Fast,
}

pub const MENU_REFRESH: RefreshMode = RefreshMode::Fast;
pub const STATUS_REFRESH: RefreshMode = RefreshMode::Full;

/// Glyph cell of [`FONT_10X20`]
const GLYPH_WIDTH: u16 = 10;
const MAX_LINE_CHARS: usize = ((DISPLAY_WIDTH - 2 * TEXT_MARGIN) / GLYPH_WIDTH) as usize;
const HIGHLIGHT_HEIGHT: u32 = 26;
const STATUS_PARAGRAPH_GAP: u32 = 10;

/// Sink for rendered region pixels.
pub trait Panel {
    type Error: Debug;

    /// Power up and clear the panel
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Show `pixels` (packed 4bpp, `area.buffer_size()` bytes) in `area`
    fn push(&mut self, area: Area, pixels: &[u8], mode: RefreshMode) -> Result<(), Self::Error>;
}

/// Region renderer over any [`Panel`]
pub struct EpdSurface<P> {
    panel: P,
    top: Canvas<Vec<u8>>,
    content: Canvas<Vec<u8>>,
    bottom: Canvas<Vec<u8>>,
}

fn region_canvas(area: Area) -> Result<Canvas<Vec<u8>>, BuilderError> {
    Canvas::new(vec![0xFF; area.buffer_size()], area.width, area.height)
}

fn settle(result: Result<(), Infallible>) {
    result.unwrap_or_else(|never| match never {})
}

impl<P: Panel> EpdSurface<P> {
    /// Allocate the region canvases
    ///
    /// # Errors
    ///
    /// Returns a [`BuilderError`] if a region in [`crate::layout`] is not 4-pixel aligned.
    pub fn new(panel: P) -> Result<Self, BuilderError> {
        Ok(Self {
            panel,
            top: region_canvas(TOP_AREA)?,
            content: region_canvas(CONTENT_AREA)?,
            bottom: region_canvas(BOTTOM_AREA)?,
        })
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }
}

impl<P: Panel> DisplaySurface for EpdSurface<P> {
    type Error = P::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.panel.init()
    }

    fn draw_top(&mut self, text: &str) -> Result<(), Self::Error> {
        settle(draw_line(&mut self.top, text));
        self.panel.push(TOP_AREA, self.top.as_bytes(), STATUS_REFRESH)
    }

    fn draw_status(&mut self, lines: &[String]) -> Result<(), Self::Error> {
        settle(draw_paragraphs(&mut self.content, lines));
        self.panel
            .push(CONTENT_AREA, self.content.as_bytes(), STATUS_REFRESH)
    }

    fn draw_menu(&mut self, lines: &[MenuLine], selected: usize) -> Result<(), Self::Error> {
        settle(draw_rows(&mut self.content, lines, selected));
        self.panel
            .push(CONTENT_AREA, self.content.as_bytes(), MENU_REFRESH)
    }

    fn draw_bottom(&mut self, text: &str) -> Result<(), Self::Error> {
        settle(draw_line(&mut self.bottom, text));
        self.panel
            .push(BOTTOM_AREA, self.bottom.as_bytes(), STATUS_REFRESH)
    }
}

/// Cut `text` to what fits on one row
fn fit_line(text: &str) -> &str {
    match text.char_indices().nth(MAX_LINE_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn draw_line<D: DrawTarget<Color = Gray4>>(target: &mut D, text: &str) -> Result<(), D::Error> {
    target.clear(Gray4::WHITE)?;
    let style = MonoTextStyle::new(&FONT_10X20, Gray4::BLACK);
    Text::with_baseline(
        fit_line(text),
        Point::new(TEXT_MARGIN as i32, TEXT_MARGIN as i32),
        style,
        Baseline::Top,
    )
    .draw(target)?;
    Ok(())
}

fn draw_paragraphs<D: DrawTarget<Color = Gray4>>(
    target: &mut D,
    lines: &[String],
) -> Result<(), D::Error> {
    target.clear(Gray4::WHITE)?;

    // Long song titles wrap instead of being cut
    let text = lines.join("\n");
    let character_style = MonoTextStyle::new(&FONT_10X20, Gray4::BLACK);
    let textbox_style = TextBoxStyleBuilder::new()
        .alignment(HorizontalAlignment::Left)
        .paragraph_spacing(STATUS_PARAGRAPH_GAP)
        .build();
    let bounds = Rectangle::new(
        Point::new(TEXT_MARGIN as i32, TEXT_MARGIN as i32),
        Size::new(
            (DISPLAY_WIDTH - 2 * TEXT_MARGIN) as u32,
            (CONTENT_HEIGHT - 2 * TEXT_MARGIN) as u32,
        ),
    );
    TextBox::with_textbox_style(&text, bounds, character_style, textbox_style).draw(target)?;
    Ok(())
}

fn draw_rows<D: DrawTarget<Color = Gray4>>(
    target: &mut D,
    lines: &[MenuLine],
    selected: usize,
) -> Result<(), D::Error> {
    target.clear(Gray4::WHITE)?;

    for (index, line) in lines.iter().enumerate() {
        let text_color = if index == selected {
            Rectangle::new(
                Point::new(0, line.y as i32),
                Size::new(DISPLAY_WIDTH as u32, HIGHLIGHT_HEIGHT),
            )
            .into_styled(PrimitiveStyle::with_fill(Gray4::BLACK))
            .draw(target)?;
            Gray4::WHITE
        } else {
            Gray4::BLACK
        };

        Text::with_baseline(
            fit_line(&line.text),
            Point::new(line.x as i32, line.y as i32 + 3),
            MonoTextStyle::new(&FONT_10X20, text_color),
            Baseline::Top,
        )
        .draw(target)?;
    }

    Ok(())
}

/// Whole-screen framebuffer panel for host tests and screenshots.
///
/// Keeps a log of every push so tests can check which refresh mode each
/// region update used.
pub struct FramePanel {
    frame: Vec<u8>,
    pushes: Vec<(Area, RefreshMode)>,
    initialized: bool,
}

impl Default for FramePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePanel {
    pub fn new() -> Self {
        Self {
            frame: vec![0xFF; DISPLAY_WIDTH as usize * DISPLAY_HEIGHT as usize / 2],
            pushes: Vec::new(),
            initialized: false,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn pushes(&self) -> &[(Area, RefreshMode)] {
        &self.pushes
    }

    /// Gray level 0 (black) to 15 (white) at a portrait coordinate
    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= DISPLAY_WIDTH as u32 || y >= DISPLAY_HEIGHT as u32 {
            return None;
        }
        let offset = (y * DISPLAY_WIDTH as u32 + x) as usize;
        let byte = self.frame[offset / 2];
        Some(if offset % 2 == 0 { byte >> 4 } else { byte & 0x0F })
    }

    /// Row-major gray levels for the whole screen
    pub fn lumas(&self) -> impl Iterator<Item = u8> + '_ {
        self.frame
            .iter()
            .flat_map(|byte| [byte >> 4, byte & 0x0F])
    }

    pub fn dark_pixel_count(&self) -> usize {
        self.lumas().filter(|luma| *luma < 8).count()
    }

    /// Dark pixels inside one region
    pub fn dark_pixels_in(&self, area: Area) -> usize {
        let mut count = 0;
        for y in area.y as u32..(area.y + area.height) as u32 {
            for x in area.x as u32..(area.x + area.width) as u32 {
                if self.luma(x, y).is_some_and(|luma| luma < 8) {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Panel for FramePanel {
    type Error = Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.frame.fill(0xFF);
        self.initialized = true;
        Ok(())
    }

    fn push(&mut self, area: Area, pixels: &[u8], mode: RefreshMode) -> Result<(), Self::Error> {
        let fits = area.x % 2 == 0
            && area.x as u32 + area.width as u32 <= DISPLAY_WIDTH as u32
            && area.y as u32 + area.height as u32 <= DISPLAY_HEIGHT as u32
            && pixels.len() >= area.buffer_size();
        if !fits {
            log::warn!("frame panel: dropping push outside the screen {area:?}");
            return Ok(());
        }

        let row_bytes = area.width as usize / 2;
        for row in 0..area.height as usize {
            let src = &pixels[row * row_bytes..(row + 1) * row_bytes];
            let dst = ((area.y as usize + row) * DISPLAY_WIDTH as usize + area.x as usize) / 2;
            self.frame[dst..dst + row_bytes].copy_from_slice(src);
        }
        self.pushes.push((area, mode));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> EpdSurface<FramePanel> {
        EpdSurface::new(FramePanel::new()).unwrap()
    }

    #[test]
    fn fit_line_cuts_on_char_boundary() {
        let long = "é".repeat(80);
        assert_eq!(fit_line(&long).chars().count(), MAX_LINE_CHARS);
        assert_eq!(fit_line("short"), "short");
    }

    #[test]
    fn top_line_renders_only_in_top_region() {
        let mut surface = surface();
        surface.init().unwrap();
        surface.draw_top("No WiFi connection").unwrap();

        let panel = surface.panel();
        assert!(panel.dark_pixels_in(TOP_AREA) > 0);
        assert_eq!(panel.dark_pixels_in(CONTENT_AREA), 0);
        assert_eq!(panel.pushes(), &[(TOP_AREA, STATUS_REFRESH)]);
    }

    #[test]
    fn menu_uses_fast_refresh_and_highlights_selection() {
        let mut surface = surface();
        let lines = vec![
            MenuLine {
                x: 10,
                y: 10,
                text: "Start/Stop Play".into(),
            },
            MenuLine {
                x: 10,
                y: 40,
                text: "Return".into(),
            },
        ];
        surface.draw_menu(&lines, 1).unwrap();

        let panel = surface.panel();
        assert_eq!(panel.pushes(), &[(CONTENT_AREA, MENU_REFRESH)]);
        // Highlight bar of the selected row is solid at its right edge
        let y = (crate::layout::CONTENT_Y + 41) as u32;
        assert_eq!(panel.luma(535, y), Some(0));
        let y = (crate::layout::CONTENT_Y + 11) as u32;
        assert_eq!(panel.luma(535, y), Some(15));
    }

    #[test]
    fn status_lines_use_full_refresh() {
        let mut surface = surface();
        surface
            .draw_status(&["2024:01:01 - 00:00:00".to_string(), "Player: Kitchen".to_string()])
            .unwrap();
        let panel = surface.panel();
        assert_eq!(panel.pushes(), &[(CONTENT_AREA, STATUS_REFRESH)]);
        assert!(panel.dark_pixels_in(CONTENT_AREA) > 0);
    }

    #[test]
    fn frame_panel_drops_out_of_range_push() {
        let mut panel = FramePanel::new();
        panel
            .push(Area::new(0, 950, 540, 40), &[0u8; 10_800], RefreshMode::Full)
            .unwrap();
        assert!(panel.pushes().is_empty());
        assert_eq!(panel.dark_pixel_count(), 0);
    }
}
