use crate::at_command::{AtParseErr, AtParseLine};

/// The modem firmware finished booting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ready;

impl AtParseLine for Ready {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        line.eq("Ready")
            .then_some(Ready)
            .ok_or_else(|| "Missing 'Ready'".into())
    }
}

/// `%XTIME: ...`, network time update. The payload is not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkTime;

impl AtParseLine for NetworkTime {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        line.starts_with("%XTIME:")
            .then_some(NetworkTime)
            .ok_or_else(|| "Missing '%XTIME:'".into())
    }
}
