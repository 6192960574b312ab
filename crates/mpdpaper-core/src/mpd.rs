//! Minimal MPD client.
//!
//! Speaks the line-based MPD protocol: the server greets with `OK MPD <version>`,
//! every command is one line and its response is a run of `key: value` lines
//! terminated by `OK`, or a single `ACK [code@index] {command} message` line.
//! Each call below sends one command and drains its response before returning.

use core::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::PlayerEndpoint;

/// Opens byte streams to player endpoints.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&mut self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// TCP connector with connect and I/O timeouts
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self, host: &str, port: u16) -> io::Result<TcpStream> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host did not resolve");
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

#[derive(Debug)]
pub enum MpdError {
    NotConnected,
    Io(io::Error),
    /// Server closed the connection mid-response
    Closed,
    /// Greeting was not `OK MPD ...`
    Protocol(String),
    /// Server rejected a command
    Ack { code: u16, message: String },
}

impl fmt::Display for MpdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpdError::NotConnected => write!(f, "not connected"),
            MpdError::Io(err) => write!(f, "io error: {}", err),
            MpdError::Closed => write!(f, "connection closed"),
            MpdError::Protocol(line) => write!(f, "unexpected reply {:?}", line),
            MpdError::Ack { code, message } => write!(f, "server error {}: {}", code, message),
        }
    }
}

impl std::error::Error for MpdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MpdError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MpdError {
    fn from(err: io::Error) -> Self {
        MpdError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    Play,
    Pause,
    #[default]
    Stop,
}

impl PlayerState {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
        }
    }
}

/// Subset of the `status` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpdStatus {
    pub state: PlayerState,
    /// 0-100, absent when the output has no mixer
    pub volume: Option<u8>,
    pub playlist_length: u32,
}

/// Subset of the `currentsong` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    pub file: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Stream name for radio URLs
    pub name: Option<String>,
}

impl Song {
    /// Best human-readable description
    pub fn display_line(&self) -> String {
        match (&self.artist, &self.title, &self.name) {
            (Some(artist), Some(title), _) => format!("{} - {}", artist, title),
            (None, Some(title), _) => title.clone(),
            (_, None, Some(name)) => name.clone(),
            _ => self.file.clone(),
        }
    }
}

type Pairs = Vec<(String, String)>;

struct Connection<S: Read + Write> {
    stream: BufReader<S>,
}

impl<S: Read + Write> Connection<S> {
    fn read_line(&mut self) -> Result<String, MpdError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line)? == 0 {
            return Err(MpdError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn send(&mut self, command: &str) -> Result<(), MpdError> {
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
        Ok(())
    }

    /// Collect `key: value` pairs up to the terminating `OK`
    fn drain(&mut self) -> Result<Pairs, MpdError> {
        let mut pairs = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "OK" {
                return Ok(pairs);
            }
            if let Some(rest) = line.strip_prefix("ACK ") {
                return Err(parse_ack(rest));
            }
            match line.split_once(": ") {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => debug!("mpd: ignoring line {:?}", line),
            }
        }
    }
}

/// `[code@index] {command} message`
fn parse_ack(rest: &str) -> MpdError {
    let code = rest
        .strip_prefix('[')
        .and_then(|tail| tail.split_once('@'))
        .and_then(|(code, _)| code.parse().ok())
        .unwrap_or(0);
    let message = rest
        .split_once("} ")
        .map(|(_, message)| message)
        .unwrap_or(rest)
        .to_string();
    MpdError::Ack { code, message }
}

/// Quote an argument for the command line
fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for ch in arg.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

fn value<'a>(pairs: &'a Pairs, key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Short-lived client: connect, issue a few commands, disconnect.
pub struct MpdClient<C: Connector> {
    connector: C,
    connection: Option<Connection<C::Stream>>,
}

impl<C: Connector> MpdClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open a connection and return the server's protocol version
    pub fn connect(&mut self, endpoint: &PlayerEndpoint) -> Result<String, MpdError> {
        self.disconnect();
        let stream = self.connector.connect(&endpoint.host, endpoint.port)?;
        let mut connection = Connection {
            stream: BufReader::new(stream),
        };
        let banner = connection.read_line()?;
        let version = banner
            .strip_prefix("OK MPD ")
            .ok_or_else(|| MpdError::Protocol(banner.clone()))?
            .to_string();
        info!(
            "mpd: connected to {} ({}:{}), protocol {}",
            endpoint.name, endpoint.host, endpoint.port, version
        );
        self.connection = Some(connection);
        Ok(version)
    }

    /// Send `close` and drop the connection; safe to call when not connected
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(err) = connection.send("close") {
                debug!("mpd: close failed: {}", err);
            }
        }
    }

    pub fn status(&mut self) -> Result<MpdStatus, MpdError> {
        let pairs = self.command("status")?;
        Ok(MpdStatus {
            state: value(&pairs, "state")
                .and_then(PlayerState::parse)
                .unwrap_or_default(),
            volume: value(&pairs, "volume")
                .and_then(|v| v.parse::<i16>().ok())
                .and_then(|v| u8::try_from(v).ok()),
            playlist_length: value(&pairs, "playlistlength")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }

    pub fn is_playing(&mut self) -> Result<bool, MpdError> {
        Ok(self.status()?.state == PlayerState::Play)
    }

    pub fn current_song(&mut self) -> Result<Option<Song>, MpdError> {
        let pairs = self.command("currentsong")?;
        let Some(file) = value(&pairs, "file") else {
            return Ok(None);
        };
        Ok(Some(Song {
            file: file.to_string(),
            title: value(&pairs, "Title").map(str::to_string),
            artist: value(&pairs, "Artist").map(str::to_string),
            name: value(&pairs, "Name").map(str::to_string),
        }))
    }

    pub fn play(&mut self) -> Result<(), MpdError> {
        self.command("play").map(drop)
    }

    pub fn stop(&mut self) -> Result<(), MpdError> {
        self.command("stop").map(drop)
    }

    pub fn clear(&mut self) -> Result<(), MpdError> {
        self.command("clear").map(drop)
    }

    /// Append a URL to the queue
    pub fn add(&mut self, url: &str) -> Result<(), MpdError> {
        self.command(&format!("add {}", quote(url))).map(drop)
    }

    fn command(&mut self, line: &str) -> Result<Pairs, MpdError> {
        let connection = self.connection.as_mut().ok_or(MpdError::NotConnected)?;
        debug!("mpd: > {}", line);
        let result = connection.send(line).and_then(|()| connection.drain());
        match &result {
            // The connection is still in sync after an ACK
            Err(MpdError::Ack { .. }) | Ok(_) => {}
            Err(err) => {
                warn!("mpd: dropping connection after {:?} failed: {}", line, err);
                self.connection = None;
            }
        }
        result
    }
}
