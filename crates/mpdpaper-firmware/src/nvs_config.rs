//! Flash copy of the configuration in NVS.
//!
//! Namespaces: `wifi` (`ssid`, `psw`, `ntp_server`, `tz`), `players` and
//! `favs` (keys `"0"`, `"1"`, ... holding `|` records) and `curmpd`
//! (`cur_mpd`, the active player index).

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;
use mpdpaper_core::config::{
    Favourite, NetworkConfig, PlayerEndpoint, MAX_FAVOURITES, MAX_PLAYERS,
};
use mpdpaper_core::{ConfigError, ConfigSource, ConfigStore, Configuration};

const NVS_WIFI: &str = "wifi";
const NVS_PLAYERS: &str = "players";
const NVS_FAVOURITES: &str = "favs";
const NVS_CURRENT_PLAYER: &str = "curmpd";
const CURRENT_PLAYER_KEY: &str = "cur_mpd";

/// Largest stored value: a favourite URL record
const VALUE_BUFFER_BYTES: usize = 512;

fn storage_error(context: &str) -> impl Fn(EspError) -> ConfigError + '_ {
    move |err| ConfigError::Storage(format!("nvs {}: {}", context, err))
}

pub struct NvsConfigStore {
    partition: EspDefaultNvsPartition,
}

impl NvsConfigStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }

    fn open(&self, namespace: &str, read_write: bool) -> Result<EspNvs<NvsDefault>, ConfigError> {
        EspNvs::new(self.partition.clone(), namespace, read_write).map_err(storage_error(namespace))
    }

    fn read_network(&self) -> Result<NetworkConfig, ConfigError> {
        let nvs = self.open(NVS_WIFI, false)?;
        let mut buf = [0u8; VALUE_BUFFER_BYTES];
        let mut get = |key: &str| -> Result<String, ConfigError> {
            Ok(nvs
                .get_str(key, &mut buf)
                .map_err(storage_error(key))?
                .unwrap_or_default()
                .to_string())
        };
        Ok(NetworkConfig {
            ssid: get("ssid")?,
            password: get("psw")?,
            ntp_server: get("ntp_server")?,
            timezone: get("tz")?,
        })
    }

    /// Records stored under consecutive keys, up to the first gap
    fn read_records(&self, namespace: &str, max: usize) -> Result<Vec<String>, ConfigError> {
        let nvs = self.open(namespace, false)?;
        let mut buf = [0u8; VALUE_BUFFER_BYTES];
        let mut records = Vec::new();
        for index in 0..max {
            let key = index.to_string();
            match nvs.get_str(&key, &mut buf).map_err(storage_error(namespace))? {
                Some(record) if !record.is_empty() => records.push(record.to_string()),
                _ => break,
            }
        }
        Ok(records)
    }

    fn write_records(
        &self,
        namespace: &str,
        max: usize,
        records: impl Iterator<Item = String>,
    ) -> Result<usize, ConfigError> {
        let mut nvs = self.open(namespace, true)?;
        let mut written = 0;
        for (index, record) in records.take(max).enumerate() {
            nvs.set_str(&index.to_string(), &record)
                .map_err(storage_error(namespace))?;
            written = index + 1;
        }
        // Drop leftovers of a longer previous list
        for index in written..max {
            nvs.remove(&index.to_string())
                .map_err(storage_error(namespace))?;
        }
        Ok(written)
    }
}

impl ConfigSource for NvsConfigStore {
    fn load(&mut self) -> Result<Configuration, ConfigError> {
        let network = self.read_network()?;
        let players = self
            .read_records(NVS_PLAYERS, MAX_PLAYERS)?
            .iter()
            .filter_map(|record| PlayerEndpoint::from_record(record))
            .collect();
        let favourites = self
            .read_records(NVS_FAVOURITES, MAX_FAVOURITES)?
            .iter()
            .filter_map(|record| Favourite::from_record(record))
            .collect();
        Ok(Configuration::new(network, players, favourites))
    }
}

impl ConfigStore for NvsConfigStore {
    fn save(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        let mut nvs = self.open(NVS_WIFI, true)?;
        let network = &config.network;
        for (key, value) in [
            ("ssid", &network.ssid),
            ("psw", &network.password),
            ("ntp_server", &network.ntp_server),
            ("tz", &network.timezone),
        ] {
            nvs.set_str(key, value).map_err(storage_error(key))?;
        }

        let players = self.write_records(
            NVS_PLAYERS,
            MAX_PLAYERS,
            config.players.iter().map(PlayerEndpoint::to_record),
        )?;
        let favourites = self.write_records(
            NVS_FAVOURITES,
            MAX_FAVOURITES,
            config.favourites.iter().map(Favourite::to_record),
        )?;
        log::info!("nvs: saved {} players, {} favourites", players, favourites);
        Ok(())
    }

    fn load_player_index(&mut self) -> Result<Option<u16>, ConfigError> {
        // Opened read-write: on first boot the namespace is created and reads as None
        let nvs = self.open(NVS_CURRENT_PLAYER, true)?;
        nvs.get_u16(CURRENT_PLAYER_KEY)
            .map_err(storage_error(CURRENT_PLAYER_KEY))
    }

    fn save_player_index(&mut self, index: u16) -> Result<(), ConfigError> {
        let mut nvs = self.open(NVS_CURRENT_PLAYER, true)?;
        nvs.set_u16(CURRENT_PLAYER_KEY, index)
            .map_err(storage_error(CURRENT_PLAYER_KEY))
    }
}
