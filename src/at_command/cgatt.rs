use heapless::String;

use super::{response_line, AtParseErr, AtRequest, AtResponse};

/// AT+CGATT?
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetAttachState;

/// Packet domain attach state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttachState {
    pub attached: bool,
}

impl AtRequest for GetAttachState {
    type Response = AttachState;
    fn encode(&self) -> String<256> {
        "AT+CGATT?".into()
    }
}

impl AtResponse for AttachState {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        let state: u8 = response_line(text, "+CGATT: ")?.parse()?;
        Ok(AttachState {
            attached: state == 1,
        })
    }
}
