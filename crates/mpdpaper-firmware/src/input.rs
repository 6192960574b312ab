use esp_idf_svc::hal::gpio::{AnyInputPin, Input, PinDriver};
use mpdpaper_core::{ButtonEdges, ButtonState, InputSource, TouchPoint};

use crate::board::SharedI2c;
use crate::touch::Gt911;

/// The three side buttons (active low, pulled up on the board) and the touch
/// panel.
pub struct M5PaperInput {
    up: PinDriver<'static, AnyInputPin, Input>,
    down: PinDriver<'static, AnyInputPin, Input>,
    select: PinDriver<'static, AnyInputPin, Input>,
    buttons: ButtonState,
    touch: Gt911<SharedI2c>,
}

impl M5PaperInput {
    pub fn new(
        up: PinDriver<'static, AnyInputPin, Input>,
        down: PinDriver<'static, AnyInputPin, Input>,
        select: PinDriver<'static, AnyInputPin, Input>,
        touch: Gt911<SharedI2c>,
    ) -> Self {
        Self {
            up,
            down,
            select,
            buttons: ButtonState::default(),
            touch,
        }
    }
}

impl InputSource for M5PaperInput {
    fn poll_buttons(&mut self) -> ButtonEdges {
        self.buttons
            .update(self.up.is_low(), self.down.is_low(), self.select.is_low())
    }

    fn poll_touches(&mut self) -> Vec<TouchPoint> {
        match self.touch.scan() {
            Ok(points) => points,
            Err(err) => {
                log::debug!("GT911 read failed: {:?}", err);
                Vec::new()
            }
        }
    }
}
