use esp_idf_svc::hal::delay::Delay;
use it8951::{Area, Display, DisplayInterface, UpdateMode};
use mpdpaper_core::{Panel, RefreshMode};

/// IT8951 controller as the sink of [`mpdpaper_core::EpdSurface`].
pub struct It8951Panel<I: DisplayInterface> {
    display: Display<I>,
    delay: Delay,
}

fn waveform(mode: RefreshMode) -> UpdateMode {
    match mode {
        RefreshMode::Full => UpdateMode::Gc16,
        RefreshMode::Partial => UpdateMode::Du4,
        RefreshMode::Fast => UpdateMode::A2,
    }
}

impl<I: DisplayInterface> It8951Panel<I> {
    pub fn new(display: Display<I>) -> Self {
        Self {
            display,
            delay: Delay::new_default(),
        }
    }
}

impl<I: DisplayInterface> Panel for It8951Panel<I> {
    type Error = String;

    fn init(&mut self) -> Result<(), Self::Error> {
        let info = self
            .display
            .init(&mut self.delay)
            .map_err(|err| format!("panel init failed: {}", err))?;
        log::info!("IT8951: {:?}", info);
        self.display
            .clear(&mut self.delay)
            .map_err(|err| format!("panel clear failed: {}", err))
    }

    fn push(&mut self, area: Area, pixels: &[u8], mode: RefreshMode) -> Result<(), Self::Error> {
        self.display
            .update(area, pixels, waveform(mode), &mut self.delay)
            .map_err(|err| format!("panel update failed: {}", err))
    }
}
