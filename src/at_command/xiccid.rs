use heapless::String;

use super::{bounded, response_line, AtParseErr, AtRequest, AtResponse};

/// AT%XICCID
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetIccid;

/// SIM card identifier, 18 to 22 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Iccid(pub String<22>);

impl AtRequest for GetIccid {
    type Response = Iccid;
    fn encode(&self) -> String<256> {
        "AT%XICCID".into()
    }
}

impl AtResponse for Iccid {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        let iccid = response_line(text, "%XICCID: ")?;
        if !(18..=22).contains(&iccid.len()) {
            return Err("ICCID must be 18 to 22 characters".into());
        }
        Ok(Iccid(bounded(iccid)?))
    }
}
