use core::fmt::Write;
use heapless::{String, Vec};

use super::tok::Tokenizer;
use super::{bounded, response_lines, AtParseErr, AtRequest, AtResponse, GenericOk};

/// AT+CGDCONT=<cid>,"<pdn_type>"[,"<apn>"]
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DefinePdpContext<'a> {
    pub cid: u8,
    pub pdn_type: &'a str,
    /// Empty leaves the APN to the network.
    pub apn: &'a str,
}

impl AtRequest for DefinePdpContext<'_> {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CGDCONT={},\"{}\"", self.cid, self.pdn_type).ok();
        if !self.apn.is_empty() {
            write!(buf, ",\"{}\"", self.apn).ok();
        }
        buf
    }
}

/// AT+CGDCONT?
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetPdpContexts;

impl AtRequest for GetPdpContexts {
    type Response = PdpContexts;
    fn encode(&self) -> String<256> {
        "AT+CGDCONT?".into()
    }
}

/// One line of `+CGDCONT: <cid>,"<pdn_type>","<apn>","<addr>",...`
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdpContext {
    pub cid: u8,
    pub pdn_type: String<8>,
    pub apn: String<64>,
    pub addr: String<48>,
}

impl PdpContext {
    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let cid = tok.num::<u8>()?.ok_or("Missing <cid>")?;
        tok.expect_sep()?;
        let pdn_type = bounded(tok.quoted()?.unwrap_or(""))?;
        tok.expect_sep()?;
        let apn = bounded(tok.quoted()?.unwrap_or(""))?;
        tok.expect_sep()?;
        let addr = bounded(tok.quoted()?.unwrap_or(""))?;

        Ok(PdpContext {
            cid,
            pdn_type,
            apn,
            addr,
        })
    }

    /// An IPv4 context the network has assigned both an APN and an address to.
    pub fn is_usable(&self) -> bool {
        self.pdn_type == "IP" && !self.apn.is_empty() && !self.addr.is_empty()
    }
}

/// Every context line of a `AT+CGDCONT?` response. Lines that fail to parse are skipped.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdpContexts {
    pub contexts: Vec<PdpContext, 4>,
}

impl PdpContexts {
    /// The first usable context, see [PdpContext::is_usable].
    pub fn usable(&self) -> Option<&PdpContext> {
        self.contexts.iter().find(|c| c.is_usable())
    }
}

impl AtResponse for PdpContexts {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        let mut contexts = Vec::new();
        for context in response_lines(text, "+CGDCONT: ").filter_map(|l| PdpContext::parse(l).ok())
        {
            if contexts.push(context).is_err() {
                break;
            }
        }
        Ok(PdpContexts { contexts })
    }
}
