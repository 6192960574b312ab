//! SD card over the shared SPI bus, read for the configuration files.

use core::ptr;
use std::ffi::CString;

use esp_idf_svc::hal::gpio::Pin;
use esp_idf_svc::hal::spi::SpiDriver;
use esp_idf_svc::sys;
use mpdpaper_core::{ConfigError, ConfigSource, Configuration, FileConfigSource};

const SD_MOUNT_POINT: &str = "/sd";
const SD_MAX_FILES: i32 = 4;

/// Configuration files on the card, or an error on every load when the card
/// did not mount.
pub struct SdConfigSource {
    files: Option<FileConfigSource>,
    mount_error: String,
}

impl SdConfigSource {
    /// Mount the card; boot carries on without it
    pub fn mount(spi: &SpiDriver, cs_pin: impl Pin) -> Self {
        match mount_fat(spi, cs_pin) {
            Ok(()) => {
                log::info!("SD card mounted at {}", SD_MOUNT_POINT);
                Self {
                    files: Some(FileConfigSource::new(SD_MOUNT_POINT)),
                    mount_error: String::new(),
                }
            }
            Err(err) => {
                log::warn!("{}", err);
                Self {
                    files: None,
                    mount_error: err,
                }
            }
        }
    }
}

impl ConfigSource for SdConfigSource {
    fn load(&mut self) -> Result<Configuration, ConfigError> {
        match self.files.as_mut() {
            Some(files) => files.load(),
            None => Err(ConfigError::Storage(self.mount_error.clone())),
        }
    }
}

fn mount_fat(spi: &SpiDriver, cs_pin: impl Pin) -> Result<(), String> {
    let c_base =
        CString::new(SD_MOUNT_POINT).map_err(|_| String::from("invalid mount path"))?;

    let host = build_sdspi_host(spi.host());
    let slot_config = sys::sdspi_device_config_t {
        host_id: spi.host(),
        gpio_cs: cs_pin.pin(),
        gpio_cd: -1,
        gpio_wp: -1,
        gpio_int: -1,
        gpio_wp_polarity: false,
    };
    let mount_config = sys::esp_vfs_fat_mount_config_t {
        format_if_mount_failed: false,
        max_files: SD_MAX_FILES,
        allocation_unit_size: 0,
        disk_status_check_enable: false,
        use_one_fat: false,
    };

    let res = unsafe {
        sys::esp_vfs_fat_sdspi_mount(
            c_base.as_ptr(),
            &host,
            &slot_config,
            &mount_config,
            ptr::null_mut(),
        )
    };
    if res != sys::ESP_OK {
        return Err(format!("SD mount failed: {}", res));
    }
    Ok(())
}

fn build_sdspi_host(host_id: sys::spi_host_device_t) -> sys::sdmmc_host_t {
    const SDMMC_HOST_FLAG_SPI: u32 = 1 << 3;
    const SDMMC_HOST_FLAG_DEINIT_ARG: u32 = 1 << 5;

    sys::sdmmc_host_t {
        flags: SDMMC_HOST_FLAG_SPI | SDMMC_HOST_FLAG_DEINIT_ARG,
        slot: host_id as _,
        max_freq_khz: 20_000,
        io_voltage: 3.3,
        init: Some(sys::sdspi_host_init),
        set_bus_width: None,
        get_bus_width: None,
        set_bus_ddr_mode: None,
        set_card_clk: Some(sys::sdspi_host_set_card_clk),
        set_cclk_always_on: None,
        do_transaction: Some(sys::sdspi_host_do_transaction),
        __bindgen_anon_1: sys::sdmmc_host_t__bindgen_ty_1 {
            deinit_p: Some(sys::sdspi_host_remove_device),
        },
        io_int_enable: Some(sys::sdspi_host_io_int_enable),
        io_int_wait: Some(sys::sdspi_host_io_int_wait),
        command_timeout_ms: 0,
        get_real_freq: Some(sys::sdspi_host_get_real_freq),
        input_delay_phase: sys::sdmmc_delay_phase_t_SDMMC_DELAY_PHASE_0,
        set_input_delay: None,
        dma_aligned_buffer: ptr::null_mut(),
        pwr_ctrl_handle: ptr::null_mut(),
        get_dma_info: Some(sys::sdspi_host_get_dma_info),
    }
}
