use core::fmt::Write;
use heapless::String;

use super::{AtRequest, GenericOk};

/// AT+CPSMS=1,"","","<periodic_tau>","<active_time>"
///
/// Request power saving mode with the given GPRS timer bit strings.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestPsm<'a> {
    pub periodic_tau: &'a str,
    pub active_time: &'a str,
}

impl AtRequest for RequestPsm<'_> {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(
            buf,
            "AT+CPSMS=1,\"\",\"\",\"{}\",\"{}\"",
            self.periodic_tau, self.active_time
        )
        .ok();
        buf
    }
}
