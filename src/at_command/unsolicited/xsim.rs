use crate::at_command::{AtParseErr, AtParseLine};

/// `%XSIM: <state>`, SIM card inserted (1) or removed (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimState(pub bool);

impl AtParseLine for SimState {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let state = line.strip_prefix("%XSIM: ").ok_or("Missing '%XSIM: '")?;
        match state.split(',').next() {
            Some("1") => Ok(SimState(true)),
            Some("0") => Ok(SimState(false)),
            _ => Err("Invalid SIM state".into()),
        }
    }
}
