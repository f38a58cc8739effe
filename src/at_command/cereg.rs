use core::fmt::Write;
use embassy_time::Duration;
use heapless::String;

use super::tok::Tokenizer;
use super::{bounded, response_line, AtParseErr, AtParseLine, AtRequest, AtResponse, GenericOk};

/// Largest valid E-UTRAN cell identity (28 bits).
pub const CELL_ECI_MAX: u32 = 0x0FFF_FFFF;

/// AT+CEREG=...
///
/// Configure network registration URC
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigureRegistrationUrc {
    /// Disable URC
    Disable = 0,

    /// Network registration URC
    EnableReg = 1,

    /// Network registration and location information URC
    EnableRegLocation = 2,

    /// Registration, location and EMM cause value
    EnableRegLocationCause = 3,

    /// Registration, location and PSM timers
    EnableRegLocationPsm = 4,

    /// Registration, location, cause value and PSM timers
    EnableRegLocationCausePsm = 5,
}

/// AT+CEREG?
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetRegistrationStatus;

/// Response to [GetRegistrationStatus].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistrationReport {
    /// The configured URC reporting level, 0 means not subscribed.
    pub reporting: u8,
    pub registration: CeregParam,
}

impl AtRequest for ConfigureRegistrationUrc {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CEREG={}", *self as u8).ok();
        buf
    }
}

impl AtRequest for GetRegistrationStatus {
    type Response = RegistrationReport;
    fn encode(&self) -> String<256> {
        "AT+CEREG?".into()
    }
}

impl AtResponse for RegistrationReport {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // +CEREG: 5,1,"AF66","009DE067",9,,,"00000000","00111000"
        let line = response_line(text, "+CEREG: ")?;
        let (reporting, body) = line.split_once(',').ok_or("Missing ','")?;

        Ok(RegistrationReport {
            reporting: reporting.parse()?,
            registration: CeregParam::parse(body)?,
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    NotRegistered,
    RegisteredHome,
    Searching,
    RegistrationDenied,
    Unknown,
    RegisteredRoaming,
    SimFailure,
}

impl RegistrationStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RegistrationStatus::NotRegistered,
            1 => RegistrationStatus::RegisteredHome,
            2 => RegistrationStatus::Searching,
            3 => RegistrationStatus::RegistrationDenied,
            5 => RegistrationStatus::RegisteredRoaming,
            90 => RegistrationStatus::SimFailure,
            _ => RegistrationStatus::Unknown,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::RegisteredHome | RegistrationStatus::RegisteredRoaming
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::NotRegistered => "not-registered",
            RegistrationStatus::RegisteredHome => "registered-home",
            RegistrationStatus::Searching => "searching",
            RegistrationStatus::RegistrationDenied => "registration-denied",
            RegistrationStatus::Unknown => "unknown",
            RegistrationStatus::RegisteredRoaming => "registered-roaming",
            RegistrationStatus::SimFailure => "sim-failure",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessTechnology {
    Unknown,
    LteM,
    NbIot,
}

impl AccessTechnology {
    pub fn from_code(code: i32) -> Self {
        match code {
            7 => AccessTechnology::LteM,
            9 => AccessTechnology::NbIot,
            _ => AccessTechnology::Unknown,
        }
    }
}

/// Which unit table a GPRS timer field is decoded with.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TimerKind {
    /// T3324, the PSM active time.
    ActiveTime,
    /// T3412 extended, the periodic tracking area update interval.
    PeriodicTauExt,
}

/// A decoded GPRS timer (3GPP TS 24.008, 10.5.7.4a).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GprsTimer {
    Seconds(u32),
    /// Unit code `111`, the timer is switched off.
    Deactivated,
    /// The unit code is not defined for this timer, or the field is not an 8 bit string.
    Invalid,
}

impl GprsTimer {
    /// Decode an 8 character binary string, e.g. `"00111000"`.
    pub fn decode(bits: &str, kind: TimerKind) -> GprsTimer {
        if bits.len() != 8 || !bits.bytes().all(|b| b == b'0' || b == b'1') {
            return GprsTimer::Invalid;
        }
        let Ok(raw) = u8::from_str_radix(bits, 2) else {
            return GprsTimer::Invalid;
        };

        let unit = raw >> 5;
        let value = u32::from(raw & 0x1f);

        if unit == 0b111 {
            return GprsTimer::Deactivated;
        }

        let seconds = match (kind, unit) {
            (TimerKind::ActiveTime, 0) => 2,
            (TimerKind::ActiveTime, 1) => 60,
            (TimerKind::ActiveTime, 2) => 360,
            (TimerKind::PeriodicTauExt, 0) => 600,
            (TimerKind::PeriodicTauExt, 1) => 3600,
            (TimerKind::PeriodicTauExt, 2) => 36000,
            (TimerKind::PeriodicTauExt, 3) => 2,
            (TimerKind::PeriodicTauExt, 4) => 30,
            (TimerKind::PeriodicTauExt, 5) => 60,
            (TimerKind::PeriodicTauExt, 6) => 1_152_000,
            _ => return GprsTimer::Invalid,
        };

        GprsTimer::Seconds(value * seconds)
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            GprsTimer::Seconds(s) => Some(Duration::from_secs(u64::from(*s))),
            _ => None,
        }
    }
}

/// EPS network registration status, from a `+CEREG` notification.
///
/// Everything after `stat` is optional; absent groups are `None`.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CeregParam {
    pub stat: RegistrationStatus,
    /// Tracking area code, 4 hex characters.
    pub tac: Option<String<4>>,
    pub cell_id: Option<u32>,
    pub act: Option<AccessTechnology>,
    pub cause_type: Option<u8>,
    pub reject_cause: Option<u16>,
    pub active_time: Option<GprsTimer>,
    pub periodic_tau_ext: Option<GprsTimer>,
}

impl CeregParam {
    fn new(stat: RegistrationStatus) -> Self {
        CeregParam {
            stat,
            tac: None,
            cell_id: None,
            act: None,
            cause_type: None,
            reject_cause: None,
            active_time: None,
            periodic_tau_ext: None,
        }
    }

    /// Whether the network refused PSM, i.e. the radio will never sleep on its own.
    pub fn psm_deactivated(&self) -> bool {
        self.active_time == Some(GprsTimer::Deactivated)
    }

    /// Parse the body of a `+CEREG` notification:
    /// `stat[,"tac","ci",act[,cause_type[,reject_cause[,"active_time","periodic_tau_ext"]]]]`
    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let stat = tok.num::<i32>()?.ok_or("Missing <stat>")?;
        let mut param = CeregParam::new(RegistrationStatus::from_code(stat));

        if !tok.sep() {
            tok.end()?;
            return Ok(param);
        }

        let tac = tok.quoted()?.ok_or("Missing <tac>")?;
        param.tac = Some(bounded(tac)?);
        tok.expect_sep()?;
        let cell_id = tok.quoted()?.ok_or("Missing <ci>")?;
        param.cell_id = Some(parse_cell_id(cell_id)?);
        tok.expect_sep()?;
        let act = tok.num::<i32>()?.ok_or("Missing <AcT>")?;
        param.act = Some(AccessTechnology::from_code(act));

        if !tok.sep() {
            tok.end()?;
            return Ok(param);
        }

        param.cause_type = tok.num()?;

        if !tok.sep() {
            tok.end()?;
            return Ok(param);
        }

        param.reject_cause = tok.num()?;

        if !tok.sep() {
            tok.end()?;
            return Ok(param);
        }

        let active_time = tok.quoted()?.ok_or("Missing <Active-Time>")?;
        param.active_time = Some(GprsTimer::decode(active_time, TimerKind::ActiveTime));
        tok.expect_sep()?;
        let tau = tok.quoted()?.ok_or("Missing <Periodic-TAU-ext>")?;
        param.periodic_tau_ext = Some(GprsTimer::decode(tau, TimerKind::PeriodicTauExt));
        tok.end()?;

        Ok(param)
    }
}

impl AtParseLine for CeregParam {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let body = line.strip_prefix("+CEREG: ").ok_or("Missing '+CEREG: '")?;
        CeregParam::parse(body)
    }
}

/// Parse an E-UTRAN cell identity given as exactly 8 hex digits.
pub(crate) fn parse_cell_id(s: &str) -> Result<u32, AtParseErr> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("Cell ID must be 8 hex digits".into());
    }
    let cell_id = u32::from_str_radix(s, 16)?;
    if cell_id > CELL_ECI_MAX {
        return Err("Cell ID out of range".into());
    }
    Ok(cell_id)
}

/// Parse a tracking area code given as exactly 4 hex digits.
pub(crate) fn parse_tac(s: &str) -> Result<u16, AtParseErr> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("TAC must be 4 hex digits".into());
    }
    Ok(u16::from_str_radix(s, 16)?)
}
