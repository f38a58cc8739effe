use heapless::String;

use super::{response_line, AtParseErr, AtRequest, AtResponse};

/// AT+CGSN=1
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetImei;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Imei(pub u64);

impl AtRequest for GetImei {
    type Response = Imei;
    fn encode(&self) -> String<256> {
        "AT+CGSN=1".into()
    }
}

impl AtResponse for Imei {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // +CGSN: "352656100367872"
        let imei = response_line(text, "+CGSN: ")?.trim_matches('"');
        if imei.len() != 15 || !imei.bytes().all(|b| b.is_ascii_digit()) {
            return Err("IMEI must be 15 digits".into());
        }
        Ok(Imei(imei.parse()?))
    }
}
