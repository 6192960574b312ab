//! Button and touch input abstraction.

/// Physical device buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Rocker pushed left (GPIO37)
    Up,
    /// Rocker pushed right (GPIO39)
    Down,
    /// Rocker pressed in (GPIO38)
    Select,
}

impl Button {
    pub const ALL: [Self; 3] = [Self::Up, Self::Down, Self::Select];

    const fn mask(self) -> u8 {
        match self {
            Self::Up => 1 << 0,
            Self::Down => 1 << 1,
            Self::Select => 1 << 2,
        }
    }
}

/// Buttons that went from released to pressed since the previous sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonEdges {
    bits: u8,
}

impl ButtonEdges {
    pub const NONE: Self = Self { bits: 0 };

    pub const fn with(self, button: Button) -> Self {
        Self {
            bits: self.bits | button.mask(),
        }
    }

    pub const fn pressed(self, button: Button) -> bool {
        self.bits & button.mask() != 0
    }

    pub const fn any(self) -> bool {
        self.bits != 0
    }
}

impl From<Button> for ButtonEdges {
    fn from(button: Button) -> Self {
        Self::NONE.with(button)
    }
}

/// Turns level samples taken once per tick into press edges.
#[derive(Debug, Default)]
pub struct ButtonState {
    current: u8,
    previous: u8,
}

impl ButtonState {
    /// Record the levels sampled this tick and return the new presses
    pub fn update(&mut self, up: bool, down: bool, select: bool) -> ButtonEdges {
        let mut levels = 0u8;
        for (button, level) in Button::ALL.into_iter().zip([up, down, select]) {
            if level {
                levels |= button.mask();
            }
        }
        self.previous = self.current;
        self.current = levels;
        ButtonEdges {
            bits: self.current & !self.previous,
        }
    }

    pub fn is_held(&self, button: Button) -> bool {
        self.current & button.mask() != 0
    }
}

/// A finger landing on the panel, in portrait screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

impl TouchPoint {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_reports_one_edge_until_released() {
        let mut state = ButtonState::default();
        let edges = state.update(false, true, false);
        assert!(edges.pressed(Button::Down));
        assert!(!edges.pressed(Button::Up));

        let edges = state.update(false, true, false);
        assert!(!edges.any());
        assert!(state.is_held(Button::Down));

        state.update(false, false, false);
        assert!(state.update(false, true, false).pressed(Button::Down));
    }

    #[test]
    fn edges_builder_combines_buttons() {
        let edges = ButtonEdges::from(Button::Up).with(Button::Select);
        assert!(edges.pressed(Button::Up));
        assert!(edges.pressed(Button::Select));
        assert!(!edges.pressed(Button::Down));
        assert!(!ButtonEdges::NONE.any());
    }
}
