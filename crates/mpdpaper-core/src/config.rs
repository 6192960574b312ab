//! Device configuration: network credentials, players and favourites.
//!
//! The configuration is authored as three pipe-separated text files on the SD
//! card and mirrored into flash so the device keeps working once the card is
//! removed:
//!
//! ```text
//! wifi.txt     ssid|password
//!              ntp_server|TZ
//! players.txt  name|host|port      (one per line, at most 5)
//! favs.txt     name|url            (one per line, at most 50)
//! ```
//!
//! Malformed lines are skipped. The index of the active player is stored
//! separately and survives configuration reloads.

use core::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

pub const MAX_PLAYERS: usize = 5;
pub const MAX_FAVOURITES: usize = 50;
pub const FIELD_SEPARATOR: char = '|';

pub const WIFI_FILE: &str = "wifi.txt";
pub const PLAYERS_FILE: &str = "players.txt";
pub const FAVOURITES_FILE: &str = "favs.txt";

/// Station credentials and time source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: String,
    pub ntp_server: String,
    /// POSIX TZ string, e.g. `CET-1CEST,M3.5.0,M10.5.0/3`
    pub timezone: String,
}

/// A network endpoint running an MPD daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl PlayerEndpoint {
    /// Parse `name|host|port`
    pub fn from_record(record: &str) -> Option<Self> {
        let fields = split_record::<3>(record)?;
        let port = fields[2].parse().ok()?;
        Some(Self {
            name: fields[0].to_string(),
            host: fields[1].to_string(),
            port,
        })
    }

    pub fn to_record(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.name,
            self.host,
            self.port,
            sep = FIELD_SEPARATOR
        )
    }
}

/// A named stream URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favourite {
    pub name: String,
    pub url: String,
}

impl Favourite {
    /// Parse `name|url`
    pub fn from_record(record: &str) -> Option<Self> {
        let fields = split_record::<2>(record)?;
        Some(Self {
            name: fields[0].to_string(),
            url: fields[1].to_string(),
        })
    }

    pub fn to_record(&self) -> String {
        format!("{}{}{}", self.name, FIELD_SEPARATOR, self.url)
    }
}

/// Exactly `N` non-empty fields or nothing
fn split_record<const N: usize>(record: &str) -> Option<[&str; N]> {
    let mut fields = [""; N];
    let mut parts = record.split(FIELD_SEPARATOR).map(str::trim);
    for field in fields.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() {
            return None;
        }
        *field = part;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(fields)
}

/// Non-trivial lines of a config file
fn records(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.len() >= 2 && !line.starts_with('#'))
}

/// Parse `wifi.txt`: credentials on the first record, time source on the second
pub fn parse_network(text: &str) -> Option<NetworkConfig> {
    let mut lines = records(text);
    let [ssid, password] = split_record::<2>(lines.next()?)?;
    let mut config = NetworkConfig {
        ssid: ssid.to_string(),
        password: password.to_string(),
        ..NetworkConfig::default()
    };
    if let Some([server, timezone]) = lines.next().and_then(split_record::<2>) {
        config.ntp_server = server.to_string();
        config.timezone = timezone.to_string();
    }
    Some(config)
}

pub fn parse_players(text: &str) -> Vec<PlayerEndpoint> {
    records(text)
        .filter_map(|line| {
            let player = PlayerEndpoint::from_record(line);
            if player.is_none() {
                warn!("config: skipping player line {:?}", line);
            }
            player
        })
        .take(MAX_PLAYERS)
        .collect()
}

pub fn parse_favourites(text: &str) -> Vec<Favourite> {
    records(text)
        .filter_map(|line| {
            let favourite = Favourite::from_record(line);
            if favourite.is_none() {
                warn!("config: skipping favourite line {:?}", line);
            }
            favourite
        })
        .take(MAX_FAVOURITES)
        .collect()
}

/// The complete device configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub network: NetworkConfig,
    pub players: Vec<PlayerEndpoint>,
    pub favourites: Vec<Favourite>,
    player_index: usize,
}

impl Configuration {
    /// Build a configuration, dropping entries beyond the caps
    pub fn new(
        network: NetworkConfig,
        mut players: Vec<PlayerEndpoint>,
        mut favourites: Vec<Favourite>,
    ) -> Self {
        players.truncate(MAX_PLAYERS);
        favourites.truncate(MAX_FAVOURITES);
        Self {
            network,
            players,
            favourites,
            player_index: 0,
        }
    }

    /// Usable when there is a network to join and a player to talk to
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.ssid.is_empty() {
            return Err(ConfigError::Missing("wifi"));
        }
        if self.players.is_empty() {
            return Err(ConfigError::Missing("players"));
        }
        Ok(())
    }

    pub fn player_index(&self) -> usize {
        self.player_index
    }

    pub fn active_player(&self) -> Option<&PlayerEndpoint> {
        self.players.get(self.player_index)
    }

    /// Switch the active player; out-of-range indices are rejected
    pub fn set_player_index(&mut self, index: usize) -> bool {
        if index >= self.players.len() {
            return false;
        }
        self.player_index = index;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required part of the configuration is absent
    Missing(&'static str),
    /// The backing store failed
    Storage(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(what) => write!(f, "missing {} configuration", what),
            ConfigError::Storage(msg) => write!(f, "config storage error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Read-only source of a full configuration
pub trait ConfigSource {
    fn load(&mut self) -> Result<Configuration, ConfigError>;
}

/// Persistent configuration store
pub trait ConfigStore: ConfigSource {
    fn save(&mut self, config: &Configuration) -> Result<(), ConfigError>;

    fn load_player_index(&mut self) -> Result<Option<u16>, ConfigError>;

    fn save_player_index(&mut self, index: u16) -> Result<(), ConfigError>;
}

/// Prefer the removable source and mirror it to the store, fall back to the
/// store, then restore the persisted active player.
pub fn load_configuration<S, F>(sd: &mut S, flash: &mut F) -> Result<Configuration, ConfigError>
where
    S: ConfigSource,
    F: ConfigStore,
{
    let from_sd = sd.load().and_then(|config| config.validate().map(|()| config));
    let mut config = match from_sd {
        Ok(config) => {
            info!(
                "config: loaded from sd ({} players, {} favourites)",
                config.players.len(),
                config.favourites.len()
            );
            if let Err(err) = flash.save(&config) {
                warn!("config: mirroring to flash failed: {}", err);
            }
            config
        }
        Err(err) => {
            info!("config: sd unavailable ({}), trying flash", err);
            let config = flash.load()?;
            config.validate()?;
            info!("config: loaded from flash");
            config
        }
    };

    let index = match flash.load_player_index() {
        Ok(Some(index)) => index as usize,
        Ok(None) => {
            if let Err(err) = flash.save_player_index(0) {
                warn!("config: storing default player index failed: {}", err);
            }
            0
        }
        Err(err) => {
            warn!("config: reading player index failed: {}", err);
            0
        }
    };
    if !config.set_player_index(index) {
        warn!("config: player index {} out of range, using 0", index);
        config.set_player_index(0);
    }
    Ok(config)
}

/// Configuration files in a directory (the SD card mount point on the device)
pub struct FileConfigSource {
    root: PathBuf,
}

impl FileConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, name: &str) -> Result<String, ConfigError> {
        let path = self.root.join(name);
        fs::read_to_string(&path)
            .map_err(|err| ConfigError::Storage(format!("{}: {}", path.display(), err)))
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&mut self) -> Result<Configuration, ConfigError> {
        let network = parse_network(&self.read(WIFI_FILE)?).ok_or(ConfigError::Missing("wifi"))?;
        let players = parse_players(&self.read(PLAYERS_FILE)?);
        // Favourites are optional
        let favourites = match self.read(FAVOURITES_FILE) {
            Ok(text) => parse_favourites(&text),
            Err(err) => {
                info!("config: no favourites ({})", err);
                Vec::new()
            }
        };
        Ok(Configuration::new(network, players, favourites))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_configuration, MemoryConfigSource, MemoryConfigStore};

    #[test]
    fn parse_network_reads_both_lines() {
        let config = parse_network("home|secret\r\npool.ntp.org|CET-1CEST,M3.5.0,M10.5.0/3\n").unwrap();
        assert_eq!(config.ssid, "home");
        assert_eq!(config.password, "secret");
        assert_eq!(config.ntp_server, "pool.ntp.org");
        assert_eq!(config.timezone, "CET-1CEST,M3.5.0,M10.5.0/3");
    }

    #[test]
    fn parse_network_without_time_source() {
        let config = parse_network("home|secret").unwrap();
        assert!(config.ntp_server.is_empty());
        assert!(parse_network("only-ssid").is_none());
        assert!(parse_network("").is_none());
    }

    #[test]
    fn parse_players_skips_malformed_lines() {
        let text = "Kitchen|192.168.1.10|6600\n\
                    broken line\n\
                    Attic|attic.local|notaport\n\
                    x\n\
                    Office|10.0.0.7|6601|extra\n\
                    Living|10.0.0.8|6600\n";
        let players = parse_players(text);
        assert_eq!(
            players,
            vec![
                PlayerEndpoint {
                    name: "Kitchen".into(),
                    host: "192.168.1.10".into(),
                    port: 6600
                },
                PlayerEndpoint {
                    name: "Living".into(),
                    host: "10.0.0.8".into(),
                    port: 6600
                },
            ]
        );
    }

    #[test]
    fn parsers_enforce_caps() {
        let players: String = (0..8).map(|i| format!("P{i}|host{i}|6600\n")).collect();
        assert_eq!(parse_players(&players).len(), MAX_PLAYERS);

        let favourites: String = (0..60).map(|i| format!("F{i}|http://s/{i}\n")).collect();
        assert_eq!(parse_favourites(&favourites).len(), MAX_FAVOURITES);
    }

    #[test]
    fn favourite_url_keeps_colons() {
        let favourite = Favourite::from_record("Radio 1|http://stream.example:8000/r1").unwrap();
        assert_eq!(favourite.url, "http://stream.example:8000/r1");
        assert_eq!(favourite.to_record(), "Radio 1|http://stream.example:8000/r1");
    }

    #[test]
    fn player_record_round_trips() {
        let player = PlayerEndpoint::from_record("Kitchen|192.168.1.10|6600").unwrap();
        assert_eq!(PlayerEndpoint::from_record(&player.to_record()), Some(player));
    }

    #[test]
    fn active_player_is_stable_until_changed() {
        let mut config = sample_configuration(3, 0);
        assert!(config.set_player_index(1));
        assert_eq!(config.active_player().unwrap().name, "Player 2");
        assert_eq!(config.active_player().unwrap().name, "Player 2");

        assert!(!config.set_player_index(3));
        assert_eq!(config.player_index(), 1);

        assert!(config.set_player_index(2));
        assert_eq!(config.active_player().unwrap().name, "Player 3");
    }

    #[test]
    fn sd_config_is_mirrored_to_flash() {
        let mut sd = MemoryConfigSource::new(Some(sample_configuration(2, 4)));
        let mut flash = MemoryConfigStore::default();
        let config = load_configuration(&mut sd, &mut flash).unwrap();
        assert_eq!(config.players.len(), 2);
        assert_eq!(flash.stored(), Some(&config));
        assert_eq!(flash.player_index(), Some(0));
    }

    #[test]
    fn flash_is_used_when_sd_is_missing() {
        let mut sd = MemoryConfigSource::new(None);
        let mut flash = MemoryConfigStore::with(sample_configuration(3, 0), Some(2));
        let config = load_configuration(&mut sd, &mut flash).unwrap();
        assert_eq!(config.player_index(), 2);
        assert_eq!(config.active_player().unwrap().name, "Player 3");
    }

    #[test]
    fn out_of_range_stored_index_falls_back_to_first_player() {
        let mut sd = MemoryConfigSource::new(None);
        let mut flash = MemoryConfigStore::with(sample_configuration(2, 0), Some(4));
        let config = load_configuration(&mut sd, &mut flash).unwrap();
        assert_eq!(config.player_index(), 0);
    }

    #[test]
    fn incomplete_sd_config_falls_back_to_flash() {
        let mut empty = sample_configuration(0, 0);
        empty.network.ssid.clear();
        let mut sd = MemoryConfigSource::new(Some(empty));
        let mut flash = MemoryConfigStore::with(sample_configuration(1, 0), None);
        let config = load_configuration(&mut sd, &mut flash).unwrap();
        assert_eq!(config.players.len(), 1);
    }

    #[test]
    fn nothing_anywhere_is_an_error() {
        let mut sd = MemoryConfigSource::new(None);
        let mut flash = MemoryConfigStore::default();
        assert!(load_configuration(&mut sd, &mut flash).is_err());
    }

    #[test]
    fn file_source_reads_directory() {
        let dir = std::env::temp_dir().join(format!("mpdpaper-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(WIFI_FILE), "home|secret\npool.ntp.org|UTC0\n").unwrap();
        fs::write(dir.join(PLAYERS_FILE), "Kitchen|10.0.0.2|6600\n").unwrap();
        let _ = fs::remove_file(dir.join(FAVOURITES_FILE));

        let config = FileConfigSource::new(&dir).load().unwrap();
        assert_eq!(config.network.ssid, "home");
        assert_eq!(config.players.len(), 1);
        assert!(config.favourites.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }
}
