//! Clock, battery, sensors, watchdog and the power latch.

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys;
use mpdpaper_core::{DateTime, Platform, Telemetry, WakeCause};

use crate::board::SharedI2c;
use crate::rtc::Bm8563;
use crate::sensors::Sht30;

const BATTERY_ADC_CHANNEL: sys::adc_channel_t = sys::adc_channel_t_ADC_CHANNEL_7;
const ADC_WIDTH_BIT_12: u32 = 3;
const ADC_ATTEN_DB_11: u32 = 3;
const BATTERY_SAMPLES: u32 = 8;
/// Full-scale input at 11 dB attenuation
const ADC_FULL_SCALE_MV: u32 = 3_600;
/// The battery feeds the ADC through a 1:2 divider
const BATTERY_DIVIDER: u32 = 2;

pub fn init_task_watchdog(timeout_ms: u32) {
    unsafe {
        let _ = sys::esp_task_wdt_deinit();
        let config = sys::esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        let result = sys::esp_task_wdt_init(&config as *const _);
        if result != sys::ESP_OK {
            log::warn!("Watchdog init failed: {:?}", result);
            return;
        }
        let add_result = sys::esp_task_wdt_add(core::ptr::null_mut());
        if add_result != sys::ESP_OK {
            log::warn!("Failed to add task to watchdog: {:?}", add_result);
        }
    }
}

pub fn feed_task_watchdog() {
    unsafe {
        sys::esp_task_wdt_reset();
    }
}

pub fn init_battery_adc() {
    unsafe {
        sys::adc1_config_width(ADC_WIDTH_BIT_12);
        sys::adc1_config_channel_atten(BATTERY_ADC_CHANNEL, ADC_ATTEN_DB_11);
    }
}

fn read_battery_raw() -> u32 {
    let total: u32 = (0..BATTERY_SAMPLES)
        .map(|_| unsafe { sys::adc1_get_raw(BATTERY_ADC_CHANNEL) }.max(0) as u32)
        .sum();
    total / BATTERY_SAMPLES
}

/// Log heap usage and current task stack headroom.
pub fn log_heap(label: &str) {
    let free_heap = unsafe { sys::esp_get_free_heap_size() };
    let min_free = unsafe { sys::esp_get_minimum_free_heap_size() };
    let free_psram = unsafe { sys::heap_caps_get_free_size(sys::MALLOC_CAP_SPIRAM) };
    let stack_hwm_words = unsafe { sys::uxTaskGetStackHighWaterMark(core::ptr::null_mut()) };
    let stack_hwm_bytes = (stack_hwm_words as usize) * core::mem::size_of::<sys::StackType_t>();
    log::info!(
        "[MEM] {}: free={} min_free={} psram={} stack_hwm={}B",
        label,
        free_heap,
        min_free,
        free_psram,
        stack_hwm_bytes
    );
}

/// Power rails that stay on while the firmware runs
pub struct PowerRails {
    pub main: PinDriver<'static, AnyOutputPin, Output>,
    pub epd: PinDriver<'static, AnyOutputPin, Output>,
    pub external: PinDriver<'static, AnyOutputPin, Output>,
}

pub struct EspPlatform {
    rtc: Bm8563<SharedI2c>,
    climate: Sht30<SharedI2c>,
    rails: PowerRails,
    wake: WakeCause,
}

impl EspPlatform {
    pub fn new(
        rtc: Bm8563<SharedI2c>,
        climate: Sht30<SharedI2c>,
        rails: PowerRails,
        wake: WakeCause,
    ) -> Self {
        Self {
            rtc,
            climate,
            rails,
            wake,
        }
    }
}

impl Platform for EspPlatform {
    fn feed_watchdog(&mut self) {
        feed_task_watchdog();
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }

    fn now(&mut self) -> DateTime {
        self.rtc.time().unwrap_or_else(|err| {
            log::warn!("RTC read failed: {:?}", err);
            DateTime::default()
        })
    }

    fn set_time(&mut self, time: &DateTime) {
        if let Err(err) = self.rtc.set_time(time) {
            log::warn!("RTC write failed: {:?}", err);
        }
    }

    fn wake_cause(&self) -> WakeCause {
        self.wake
    }

    fn battery_millivolts(&mut self) -> u32 {
        read_battery_raw() * ADC_FULL_SCALE_MV / 4_095 * BATTERY_DIVIDER
    }

    fn telemetry(&mut self) -> Telemetry {
        let free_heap = unsafe { sys::esp_get_free_heap_size() };
        let free_psram = unsafe { sys::heap_caps_get_free_size(sys::MALLOC_CAP_SPIRAM) };
        let mut telemetry = Telemetry {
            free_heap_kb: free_heap / 1024,
            free_psram_mb: (free_psram / (1024 * 1024)) as u32,
            ..Telemetry::default()
        };
        match self.climate.measure(&mut FreeRtos) {
            Ok(climate) => {
                telemetry.temperature_c = climate.temperature_c;
                telemetry.humidity_pct = climate.humidity_pct;
            }
            Err(err) => log::warn!("SHT30 read failed: {:?}", err),
        }
        telemetry
    }

    fn power_down(&mut self, seconds: u32) -> ! {
        log::info!("power: off for {} s", seconds);
        if let Err(err) = self.rtc.arm_timer(seconds) {
            log::warn!("RTC timer arm failed: {:?}", err);
        }
        // On battery this cuts the supply; on USB the board stays up and
        // falls through to deep sleep.
        let _ = self.rails.main.set_low();
        FreeRtos::delay_ms(10);
        let _ = self.rails.epd.set_low();
        let _ = self.rails.external.set_low();
        unsafe { sys::esp_deep_sleep((u64::from(seconds) + 1) * 1_000_000) }
    }
}
