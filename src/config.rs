//! Connection manager configuration.
//!
//! Values arrive as strings from a keyed settings store and are validated here, so an invalid
//! setting never reaches the state machine.

use core::{
    net::{Ipv4Addr, SocketAddrV4},
    str::FromStr,
};

use embassy_time::Duration;
use heapless::{String, Vec};

use crate::at_command::{
    cgauth::AuthProtocol, xbandlock::BANDLOCK_BITS, xsystemmode::SystemPreference, Plmn,
};
use crate::fsm::policy::AttachPolicy;

pub use crate::at_command::cgauth::AuthProtocol as Auth;

/// Bands the modem can be locked to.
pub const SUPPORTED_BANDS: [u8; 16] = [1, 2, 3, 4, 5, 8, 12, 13, 17, 18, 19, 20, 25, 26, 28, 66];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    UnknownKey,
    InvalidMode,
    InvalidBand,
    InvalidNetwork,
    InvalidAuth,
    InvalidAttachPolicy,
    InvalidBool,
    InvalidAddress,
    TooLong,
}

/// Enabled radio access technologies. With both enabled, the first one is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeConfig {
    LteM,
    NbIot,
    LteMFirst,
    NbIotFirst,
}

impl ModeConfig {
    pub fn lte_m(&self) -> bool {
        !matches!(self, ModeConfig::NbIot)
    }

    pub fn nb_iot(&self) -> bool {
        !matches!(self, ModeConfig::LteM)
    }

    pub fn preference(&self) -> SystemPreference {
        match self {
            ModeConfig::LteM | ModeConfig::NbIot => SystemPreference::Auto,
            ModeConfig::LteMFirst => SystemPreference::LteM,
            ModeConfig::NbIotFirst => SystemPreference::NbIot,
        }
    }
}

impl FromStr for ModeConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let mode = match (parts.next(), parts.next()) {
            (Some("lte-m"), None) => ModeConfig::LteM,
            (Some("nb-iot"), None) => ModeConfig::NbIot,
            (Some("lte-m"), Some("nb-iot")) => ModeConfig::LteMFirst,
            (Some("nb-iot"), Some("lte-m")) => ModeConfig::NbIotFirst,
            _ => return Err(ConfigError::InvalidMode),
        };
        match parts.next() {
            None => Ok(mode),
            Some(_) => Err(ConfigError::InvalidMode),
        }
    }
}

/// A set of LTE bands. Empty means the modem picks any band it supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bands(Vec<u8, 16>);

impl Bands {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The `%XBANDLOCK` bit string, band `n` at index `88 - n`. `None` if no band is locked.
    pub fn bitstring(&self) -> Option<String<BANDLOCK_BITS>> {
        if self.is_empty() {
            return None;
        }

        let mut bits = [b'0'; BANDLOCK_BITS];
        for &band in &self.0 {
            bits[BANDLOCK_BITS - usize::from(band)] = b'1';
        }

        let mut out = String::new();
        for bit in bits {
            out.push(char::from(bit)).ok()?;
        }
        Some(out)
    }
}

impl FromStr for Bands {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bands = Vec::new();
        for band in s.split(',').map(str::trim).filter(|b| !b.is_empty()) {
            let band: u8 = band.parse().map_err(|_| ConfigError::InvalidBand)?;
            if !SUPPORTED_BANDS.contains(&band) {
                return Err(ConfigError::InvalidBand);
            }
            if !bands.contains(&band) {
                bands.push(band).map_err(|_| ConfigError::InvalidBand)?;
            }
        }
        Ok(Bands(bands))
    }
}

/// Quiescent pauses around radio and socket operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timings {
    /// Pause after stopping the modem before it may be started again.
    pub radio_settle: Duration,
    /// Pause after a send that does not expect a response.
    pub send_settle: Duration,
    /// Pause after receiving, before evaluating the connection.
    pub recv_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            radio_settle: Duration::from_secs(5),
            send_settle: Duration::from_millis(500),
            recv_settle: Duration::from_millis(100),
        }
    }
}

/// Where the data socket connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketConfig {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub addr: Ipv4Addr,
    pub port: u16,
    pub dtls: bool,
}

impl SocketConfig {
    /// A loopback target never opens a socket.
    pub fn is_loopback(&self) -> bool {
        self.addr.is_loopback()
    }

    pub fn remote(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.port)
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig {
            addr: Ipv4Addr::new(192, 168, 192, 4),
            port: 5002,
            dtls: false,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LteConfig {
    pub mode: ModeConfig,
    pub bands: Bands,
    /// `None` selects the operator automatically.
    pub network: Option<Plmn>,
    pub apn: String<63>,
    pub auth: Auth,
    pub username: String<32>,
    pub password: String<32>,
    pub attach_policy: AttachPolicy,
    pub modemtrace: bool,
    pub timings: Timings,
}

impl Default for LteConfig {
    fn default() -> Self {
        LteConfig {
            mode: ModeConfig::LteMFirst,
            bands: Bands::default(),
            network: None,
            apn: String::new(),
            auth: Auth::None,
            username: String::new(),
            password: String::new(),
            attach_policy: AttachPolicy::default(),
            modemtrace: false,
            timings: Timings::default(),
        }
    }
}

impl LteConfig {
    /// Apply one setting from the settings store.
    ///
    /// Keys: `mode`, `bands`, `network`, `apn`, `auth`, `username`, `password`,
    /// `attach-policy` and `modemtrace`. The config is left unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "mode" => self.mode = value.parse()?,
            "bands" => self.bands = value.parse()?,
            "network" => self.network = parse_network(value)?,
            "apn" => self.apn = bounded(value)?,
            "auth" => self.auth = value.parse()?,
            "username" => self.username = bounded(value)?,
            "password" => self.password = bounded(value)?,
            "attach-policy" => self.attach_policy = value.parse()?,
            "modemtrace" => self.modemtrace = parse_bool(value)?,
            _ => return Err(ConfigError::UnknownKey),
        }
        Ok(())
    }
}

impl FromStr for AuthProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AuthProtocol::None),
            "pap" => Ok(AuthProtocol::Pap),
            "chap" => Ok(AuthProtocol::Chap),
            _ => Err(ConfigError::InvalidAuth),
        }
    }
}

/// Empty selects the network automatically, otherwise a 5 or 6 digit PLMN.
pub fn parse_network(s: &str) -> Result<Option<Plmn>, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    Plmn::parse(s)
        .map(Some)
        .map_err(|_| ConfigError::InvalidNetwork)
}

/// Parse a socket target given as `a.b.c.d` and a port.
pub fn parse_socket(addr: &str, port: u16, dtls: bool) -> Result<SocketConfig, ConfigError> {
    let addr = addr.parse().map_err(|_| ConfigError::InvalidAddress)?;
    Ok(SocketConfig { addr, port, dtls })
}

fn parse_bool(s: &str) -> Result<bool, ConfigError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool),
    }
}

fn bounded<const N: usize>(s: &str) -> Result<String<N>, ConfigError> {
    let mut out = String::new();
    out.push_str(s).map_err(|_| ConfigError::TooLong)?;
    Ok(out)
}
