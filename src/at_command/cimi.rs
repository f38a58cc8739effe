use heapless::String;

use super::{AtParseErr, AtRequest, AtResponse};

/// AT+CIMI
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetImsi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Imsi(pub u64);

impl AtRequest for GetImsi {
    type Response = Imsi;
    fn encode(&self) -> String<256> {
        "AT+CIMI".into()
    }
}

impl AtResponse for Imsi {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // The IMSI is the only line, without any prefix.
        let line = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or("Missing IMSI")?;
        if !line.bytes().all(|b| b.is_ascii_digit()) {
            return Err("IMSI must only contain digits".into());
        }
        Ok(Imsi(line.parse()?))
    }
}
