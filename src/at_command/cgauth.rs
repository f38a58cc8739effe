use core::fmt::Write;
use heapless::String;

use super::{AtRequest, GenericOk};

/// PDN authentication protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuthProtocol {
    #[default]
    None = 0,
    Pap = 1,
    Chap = 2,
}

/// AT+CGAUTH=<cid>,<prot>[,"<username>","<password>"]
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetPdpAuth<'a> {
    pub cid: u8,
    pub protocol: AuthProtocol,
    pub username: &'a str,
    pub password: &'a str,
}

impl AtRequest for SetPdpAuth<'_> {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CGAUTH={},{}", self.cid, self.protocol as u8).ok();
        if self.protocol != AuthProtocol::None {
            write!(buf, ",\"{}\",\"{}\"", self.username, self.password).ok();
        }
        buf
    }
}
