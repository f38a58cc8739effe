use crate::at_command::{AtParseErr, AtParseLine};

/// `%MDMEV: <event>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemEvent {
    /// The modem firmware detected it is resetting repeatedly.
    ResetLoop,
    /// Any other modem domain event, only logged.
    Other,
}

impl AtParseLine for ModemEvent {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let event = line.strip_prefix("%MDMEV: ").ok_or("Missing '%MDMEV: '")?;
        if event.starts_with("RESET LOOP") {
            Ok(ModemEvent::ResetLoop)
        } else {
            Ok(ModemEvent::Other)
        }
    }
}
