use core::convert::TryInto;
use std::time::{SystemTime, UNIX_EPOCH};

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};
use esp_idf_svc::sys;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use mpdpaper_core::{DateTime, Network, NetworkConfig, NetworkError};

use crate::power::feed_task_watchdog;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_TIMEOUT_MS: u32 = 10_000;
const SNTP_TIMEOUT_MS: u32 = 10_000;
const POLL_MS: u32 = 50;

/// Station-mode WiFi plus SNTP. The driver is created on first use.
pub struct WifiManager {
    modem: Option<Modem>,
    sys_loop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
}

/// Poll `ready` until it holds or `timeout_ms` passes, keeping the watchdog fed
fn wait_until(timeout_ms: u32, mut ready: impl FnMut() -> bool) -> bool {
    let mut waited = 0;
    while waited < timeout_ms {
        if ready() {
            return true;
        }
        feed_task_watchdog();
        FreeRtos::delay_ms(POLL_MS);
        waited += POLL_MS;
    }
    ready()
}

impl WifiManager {
    pub fn new(modem: Modem, sys_loop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> Self {
        Self {
            modem: Some(modem),
            sys_loop,
            nvs: Some(nvs),
            wifi: None,
        }
    }

    fn ensure_wifi(&mut self) -> Result<&mut BlockingWifi<EspWifi<'static>>, String> {
        if self.wifi.is_none() {
            let Some(modem) = self.modem.take() else {
                return Err(String::from("Wi-Fi modem unavailable"));
            };
            let esp_wifi = EspWifi::new(modem, self.sys_loop.clone(), self.nvs.take())
                .map_err(|err| format!("wifi init failed: {}", err))?;
            let blocking = BlockingWifi::wrap(esp_wifi, self.sys_loop.clone())
                .map_err(|err| format!("wifi wrapper init failed: {}", err))?;
            self.wifi = Some(blocking);
        }
        self.wifi
            .as_mut()
            .ok_or_else(|| String::from("wifi init failed"))
    }

    fn start_station(&mut self, config: &NetworkConfig) -> Result<(), String> {
        let ssid = config.ssid.trim();
        let ssid_h = ssid
            .try_into()
            .map_err(|_| String::from("STA SSID too long (max 32)"))?;
        let (auth_method, password_h) = if config.password.is_empty() {
            (AuthMethod::None, Default::default())
        } else {
            (
                AuthMethod::WPA2Personal,
                config
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| String::from("STA password too long (max 64)"))?,
            )
        };

        let wifi = self.ensure_wifi()?;
        let conf = Configuration::Client(ClientConfiguration {
            ssid: ssid_h,
            bssid: None,
            auth_method,
            password: password_h,
            channel: None,
            ..Default::default()
        });
        wifi.set_configuration(&conf)
            .map_err(|err| format!("wifi sta config failed: {}", err))?;
        if !wifi.is_started().unwrap_or(false) {
            wifi.start()
                .map_err(|err| format!("wifi sta start failed: {}", err))?;
        }

        for attempt in 1..=CONNECT_ATTEMPTS {
            log::info!("wifi: connecting to {} (attempt {})", ssid, attempt);
            if let Err(err) = wifi.wifi_mut().connect() {
                log::warn!("wifi: connect request failed: {}", err);
            } else if wait_until(CONNECT_TIMEOUT_MS, || wifi.is_up().unwrap_or(false)) {
                let ip = wifi
                    .wifi()
                    .sta_netif()
                    .get_ip_info()
                    .map_err(|err| format!("wifi sta ip failed: {}", err))?
                    .ip;
                log::info!("wifi: connected, ip {}", ip);
                return Ok(());
            }
            let _ = wifi.wifi_mut().disconnect();
        }
        Err(format!("no connection to {} after {} attempts", ssid, CONNECT_ATTEMPTS))
    }
}

fn local_time() -> Result<DateTime, String> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| format!("clock before epoch: {}", err))?;
    let secs = epoch.as_secs() as sys::time_t;
    let mut tm: sys::tm = unsafe { core::mem::zeroed() };
    if unsafe { sys::localtime_r(&secs, &mut tm) }.is_null() {
        return Err(String::from("localtime failed"));
    }
    Ok(DateTime::new(
        (tm.tm_year + 1900) as u16,
        (tm.tm_mon + 1) as u8,
        tm.tm_mday as u8,
        tm.tm_hour as u8,
        tm.tm_min as u8,
        tm.tm_sec as u8,
    ))
}

impl Network for WifiManager {
    fn connect(&mut self, config: &NetworkConfig) -> Result<(), NetworkError> {
        self.start_station(config).map_err(NetworkError::Association)
    }

    fn is_connected(&mut self) -> bool {
        self.wifi
            .as_ref()
            .is_some_and(|wifi| wifi.is_up().unwrap_or(false))
    }

    fn disconnect(&mut self) {
        if let Some(wifi) = self.wifi.as_mut() {
            let _ = wifi.disconnect();
            let _ = wifi.stop();
        }
        log::info!("wifi: disconnected");
    }

    fn sync_time(&mut self, config: &NetworkConfig) -> Result<DateTime, NetworkError> {
        if config.ntp_server.is_empty() {
            return Err(NetworkError::TimeSync(String::from("no NTP server configured")));
        }
        let mut conf = SntpConf::default();
        conf.servers[0] = config.ntp_server.as_str();
        let sntp = EspSntp::new(&conf)
            .map_err(|err| NetworkError::TimeSync(format!("sntp init failed: {}", err)))?;
        if !wait_until(SNTP_TIMEOUT_MS, || {
            sntp.get_sync_status() == SyncStatus::Completed
        }) {
            return Err(NetworkError::TimeSync(format!(
                "no answer from {}",
                config.ntp_server
            )));
        }

        std::env::set_var("TZ", &config.timezone);
        unsafe { sys::tzset() };
        let now = local_time().map_err(NetworkError::TimeSync)?;
        log::info!("sntp: {} ({})", now, config.timezone);
        Ok(now)
    }
}
