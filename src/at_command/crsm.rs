//! Restricted SIM access, used for the forbidden PLMN list (EF_FPLMN, file id 28539).

use heapless::String;

use super::tok::Tokenizer;
use super::{response_line, AtParseErr, AtRequest, AtResponse, GenericOk};

/// An empty forbidden PLMN list: four entries of `FFFFFF`.
pub const FPLMN_EMPTY: &str = "FFFFFFFFFFFFFFFFFFFFFFFF";

/// AT+CRSM=176,28539,0,0,12
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadForbiddenPlmns;

/// AT+CRSM=214,28539,0,0,12,"FFFFFFFFFFFFFFFFFFFFFFFF"
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EraseForbiddenPlmns;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimFileResponse {
    pub sw1: u8,
    pub sw2: u8,
    pub data: String<64>,
}

impl SimFileResponse {
    /// Status word 144 (0x90) means the access succeeded.
    pub fn is_success(&self) -> bool {
        self.sw1 == 144
    }

    pub fn is_fplmn_empty(&self) -> bool {
        self.data.as_str() == FPLMN_EMPTY
    }
}

impl AtRequest for ReadForbiddenPlmns {
    type Response = SimFileResponse;
    fn encode(&self) -> String<256> {
        "AT+CRSM=176,28539,0,0,12".into()
    }
}

impl AtRequest for EraseForbiddenPlmns {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        buf.push_str("AT+CRSM=214,28539,0,0,12,\"").ok();
        buf.push_str(FPLMN_EMPTY).ok();
        buf.push('"').ok();
        buf
    }
}

impl AtResponse for SimFileResponse {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // +CRSM: 144,0,"FFFFFFFFFFFFFFFFFFFFFFFF"
        let mut tok = Tokenizer::new(response_line(text, "+CRSM: ")?);
        let sw1 = tok.num()?.ok_or("Missing <sw1>")?;
        tok.expect_sep()?;
        let sw2 = tok.num()?.ok_or("Missing <sw2>")?;

        let mut data = String::new();
        if tok.sep() {
            let response = tok.quoted()?.unwrap_or("");
            data.push_str(response).map_err(|_| "Response too long")?;
        }

        Ok(SimFileResponse { sw1, sw2, data })
    }
}
