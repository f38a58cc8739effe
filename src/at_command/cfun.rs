use core::fmt::Write;
use heapless::String;

use super::{response_line, AtParseErr, AtRequest, AtResponse, GenericOk};

/// Modem functional mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionalMode {
    /// Power off, settings are stored to flash.
    PowerOff = 0,
    /// Full functionality, both LTE and GNSS.
    Normal = 1,
    /// Flight mode, radio disabled.
    Offline = 4,
}

/// AT+CFUN=<mode>
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetFunctionalMode(pub FunctionalMode);

/// AT+CFUN?
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetFunctionalMode;

/// The raw mode reported by `AT+CFUN?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Functionality(pub u8);

impl AtRequest for SetFunctionalMode {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CFUN={}", self.0 as u8).ok();
        buf
    }
}

impl AtRequest for GetFunctionalMode {
    type Response = Functionality;
    fn encode(&self) -> String<256> {
        "AT+CFUN?".into()
    }
}

impl AtResponse for Functionality {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        Ok(Functionality(response_line(text, "+CFUN: ")?.parse()?))
    }
}

impl Functionality {
    pub fn is_normal(&self) -> bool {
        self.0 == FunctionalMode::Normal as u8
    }
}
