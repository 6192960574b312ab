//! Menu engine.
//!
//! A [`SubMenu`] is a list of rows with a cursor. [`SubMenu::display_menu`]
//! runs a cooperative polling loop until the user commits a row, either with
//! the select button or by tapping the right half of the highlighted row.
//! [`Menu`] owns the main menu, the player picker and the favourites pages and
//! dispatches the committed row to the matching action.

use log::{debug, info, warn};

use crate::board::{Board, Context, InputSource, Platform};
use crate::config::{ConfigStore, Configuration};
use crate::input::{Button, TouchPoint};
use crate::layout::{CONTENT_Y, DISPLAY_WIDTH, TEXT_MARGIN};
use crate::status;

pub const MENU_X: u16 = TEXT_MARGIN;
const FIRST_ROW_Y: u16 = 10;

pub const MAIN_ROW_HEIGHT: u16 = 30;
pub const LIST_ROW_HEIGHT: u16 = 40;

pub const FAVOURITES_PER_PAGE: usize = 20;
pub const MAX_FAVOURITE_PAGES: usize = 5;

pub const RETURN_LABEL: &str = "Return";

/// Poll interval of the menu loop
pub const MENU_POLL_MS: u32 = 10;

/// One menu row. `y` is relative to the content region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuLine {
    pub x: u16,
    pub y: u16,
    pub text: String,
}

/// Touch behaviour of menus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPolicy {
    /// A tap on the highlighted row commits only right of this column
    pub commit_x: u16,
}

impl Default for TouchPolicy {
    fn default() -> Self {
        Self {
            commit_x: DISPLAY_WIDTH / 2,
        }
    }
}

/// Result of a tap on a menu row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorEvent {
    Moved,
    Committed(usize),
    Ignored,
}

/// Selection cursor over `len` rows.
///
/// Remembers the row of the last tap; only a second tap on that same row can
/// commit. Button moves forget it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuCursor {
    selected: usize,
    len: usize,
    touched: Option<usize>,
}

impl MenuCursor {
    pub fn new(len: usize) -> Self {
        Self {
            selected: 0,
            len,
            touched: None,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn up(&mut self) {
        self.touched = None;
        if self.len == 0 {
            return;
        }
        self.selected = if self.selected == 0 {
            self.len - 1
        } else {
            self.selected - 1
        };
    }

    pub fn down(&mut self) {
        self.touched = None;
        if self.len == 0 {
            return;
        }
        self.selected = (self.selected + 1) % self.len;
    }

    /// Apply a tap at column `x` on `row`
    pub fn touch(&mut self, row: usize, x: u16, policy: &TouchPolicy) -> CursorEvent {
        if row >= self.len {
            return CursorEvent::Ignored;
        }
        if self.touched == Some(row) {
            return if x > policy.commit_x {
                CursorEvent::Committed(row)
            } else {
                CursorEvent::Ignored
            };
        }
        self.touched = Some(row);
        if row == self.selected {
            CursorEvent::Ignored
        } else {
            self.selected = row;
            CursorEvent::Moved
        }
    }
}

/// A list of rows with a fixed row pitch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMenu {
    lines: Vec<MenuLine>,
    row_height: u16,
    next_y: u16,
}

impl SubMenu {
    pub fn new(row_height: u16) -> Self {
        Self {
            lines: Vec::new(),
            row_height,
            next_y: FIRST_ROW_Y,
        }
    }

    pub fn add_line(&mut self, text: impl Into<String>) {
        self.lines.push(MenuLine {
            x: MENU_X,
            y: self.next_y,
            text: text.into(),
        });
        self.next_y = self.next_y.saturating_add(self.row_height);
    }

    pub fn lines(&self) -> &[MenuLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn row_height(&self) -> u16 {
        self.row_height
    }

    /// Row whose band contains screen row `y`
    pub fn row_at(&self, y: u16) -> Option<usize> {
        let y = u32::from(y);
        self.lines.iter().position(|line| {
            let top = u32::from(line.y) + u32::from(CONTENT_Y);
            (top..=top + u32::from(self.row_height)).contains(&y)
        })
    }

    /// Show the rows and poll input until one is committed.
    ///
    /// Returns the committed row index, or `None` once `idle_ticks` polls in
    /// a row saw no input. The watchdog is fed on repaints and input only.
    pub fn display_menu<B: Board>(
        &self,
        ctx: &mut Context<B>,
        policy: &TouchPolicy,
        idle_ticks: u32,
    ) -> Option<usize> {
        if self.lines.is_empty() {
            warn!("menu: nothing to show");
            return None;
        }

        let mut cursor = MenuCursor::new(self.lines.len());
        let mut repaint = true;
        let mut idle = 0;
        loop {
            if repaint {
                ctx.show_menu(&self.lines, cursor.selected());
                repaint = false;
            }
            if idle >= idle_ticks {
                info!("menu: no input for {} polls, giving up", idle);
                return None;
            }

            let buttons = ctx.input.poll_buttons();
            let touches = ctx.input.poll_touches();
            if !buttons.any() && touches.is_empty() {
                idle += 1;
                ctx.platform.delay_ms(MENU_POLL_MS);
                continue;
            }
            idle = 0;
            ctx.platform.feed_watchdog();

            if buttons.pressed(Button::Up) {
                cursor.up();
                repaint = true;
            }
            if buttons.pressed(Button::Down) {
                cursor.down();
                repaint = true;
            }
            if buttons.pressed(Button::Select) {
                debug!("menu: select on row {}", cursor.selected());
                return Some(cursor.selected());
            }

            for TouchPoint { x, y } in touches {
                let Some(row) = self.row_at(y) else {
                    continue;
                };
                match cursor.touch(row, x, policy) {
                    CursorEvent::Moved => repaint = true,
                    CursorEvent::Committed(row) => {
                        debug!("menu: tap commit on row {}", row);
                        return Some(row);
                    }
                    CursorEvent::Ignored => {}
                }
            }

            ctx.platform.delay_ms(MENU_POLL_MS);
        }
    }
}

/// What a main-menu row does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainEntry {
    TogglePlayback,
    SelectPlayer,
    Favourites(usize),
    Return,
}

/// Number of favourites pages for `count` favourites
pub fn favourite_page_count(count: usize) -> usize {
    count.div_ceil(FAVOURITES_PER_PAGE).min(MAX_FAVOURITE_PAGES)
}

/// The full menu tree for one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    main: SubMenu,
    players: SubMenu,
    favourites: Vec<SubMenu>,
}

impl Menu {
    pub fn create(config: &Configuration) -> Self {
        let pages = favourite_page_count(config.favourites.len());

        let mut main = SubMenu::new(MAIN_ROW_HEIGHT);
        main.add_line("Start/Stop Play");
        main.add_line("Select Player");
        for page in 1..=pages {
            main.add_line(format!("Favourites {}", page));
        }
        main.add_line(RETURN_LABEL);

        let mut players = SubMenu::new(LIST_ROW_HEIGHT);
        for player in &config.players {
            players.add_line(player.name.as_str());
        }
        players.add_line(RETURN_LABEL);

        let favourites = config
            .favourites
            .chunks(FAVOURITES_PER_PAGE)
            .take(pages)
            .map(|chunk| {
                let mut page = SubMenu::new(LIST_ROW_HEIGHT);
                for favourite in chunk {
                    page.add_line(favourite.name.as_str());
                }
                page.add_line(RETURN_LABEL);
                page
            })
            .collect();

        Self {
            main,
            players,
            favourites,
        }
    }

    pub fn main(&self) -> &SubMenu {
        &self.main
    }

    pub fn players(&self) -> &SubMenu {
        &self.players
    }

    pub fn favourite_pages(&self) -> &[SubMenu] {
        &self.favourites
    }

    /// Meaning of main-menu row `index`
    pub fn entry(&self, index: usize) -> MainEntry {
        match index {
            0 => MainEntry::TogglePlayback,
            1 => MainEntry::SelectPlayer,
            i if i - 2 < self.favourites.len() => MainEntry::Favourites(i - 2),
            _ => MainEntry::Return,
        }
    }

    /// Run the main menu and the chosen action; returns the status lines the
    /// action produced (empty when nothing was done).
    ///
    /// `None` means some level saw `idle_ticks` polls without input and was
    /// left like a Return.
    pub fn show<B: Board>(
        &self,
        ctx: &mut Context<B>,
        policy: &TouchPolicy,
        idle_ticks: u32,
    ) -> Option<Vec<String>> {
        let index = self.main.display_menu(ctx, policy, idle_ticks)?;
        match self.entry(index) {
            MainEntry::TogglePlayback => Some(status::toggle_playback(ctx)),
            MainEntry::SelectPlayer => {
                self.select_player(ctx, policy, idle_ticks)?;
                Some(Vec::new())
            }
            MainEntry::Favourites(page) => self.play_from_page(ctx, policy, page, idle_ticks),
            MainEntry::Return => Some(Vec::new()),
        }
    }

    fn select_player<B: Board>(
        &self,
        ctx: &mut Context<B>,
        policy: &TouchPolicy,
        idle_ticks: u32,
    ) -> Option<()> {
        let index = self.players.display_menu(ctx, policy, idle_ticks)?;
        if !ctx.config.set_player_index(index) {
            return Some(());
        }
        let name = ctx
            .config
            .active_player()
            .map(|player| player.name.clone())
            .unwrap_or_default();
        info!("menu: active player is now {} ({})", name, index);

        // Player count is capped well below u16::MAX
        let stored = u16::try_from(index).unwrap_or_default();
        if let Err(err) = ctx.flash.save_player_index(stored) {
            warn!("menu: saving player index failed: {}", err);
        }
        ctx.show_bottom(&format!("New player @{}", name));
        Some(())
    }

    fn play_from_page<B: Board>(
        &self,
        ctx: &mut Context<B>,
        policy: &TouchPolicy,
        page: usize,
        idle_ticks: u32,
    ) -> Option<Vec<String>> {
        let Some(sub) = self.favourites.get(page) else {
            return Some(Vec::new());
        };
        let index = sub.display_menu(ctx, policy, idle_ticks)?;
        if index + 1 >= sub.len() {
            return Some(Vec::new());
        }
        let Some(favourite) = ctx
            .config
            .favourites
            .get(page * FAVOURITES_PER_PAGE + index)
            .cloned()
        else {
            return Some(Vec::new());
        };
        Some(status::play_favourite(ctx, &favourite))
    }
}
