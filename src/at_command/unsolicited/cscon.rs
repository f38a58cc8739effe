use crate::at_command::{AtParseErr, AtParseLine};

/// `+CSCON: <mode>`, RRC connected (1) or idle (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignallingConnection(pub bool);

impl AtParseLine for SignallingConnection {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let mode = line.strip_prefix("+CSCON: ").ok_or("Missing '+CSCON: '")?;
        match mode.split(',').next() {
            Some("0") => Ok(SignallingConnection(false)),
            Some("1") => Ok(SignallingConnection(true)),
            _ => Err("Invalid signalling connection mode".into()),
        }
    }
}
