use core::fmt::Write;
use heapless::String;

use super::cereg::parse_cell_id;
use super::tok::Tokenizer;
use super::{AtParseErr, AtParseLine, AtRequest, GenericOk, Plmn};

/// AT%RAI=...
///
/// Release assistance indication reporting.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigureRai {
    Disable = 0,
    Enable = 1,
    /// Enable RAI and the `%RAI` notification.
    EnableWithUrc = 2,
}

impl AtRequest for ConfigureRai {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT%RAI={}", *self as u8).ok();
        buf
    }
}

/// %RAI: "<cell_id>","<plmn>",<as_rai>,<cp_rai>
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RaiParam {
    pub cell_id: u32,
    pub plmn: u32,
    /// Access stratum RAI is supported by the cell.
    pub as_rai: bool,
    /// Control plane RAI is supported by the cell.
    pub cp_rai: bool,
}

impl RaiParam {
    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let cell_id = parse_cell_id(tok.quoted()?.ok_or("Missing <cell_id>")?)?;
        tok.expect_sep()?;
        let plmn = Plmn::parse(tok.quoted()?.ok_or("Missing <plmn>")?)?;
        tok.expect_sep()?;
        let as_rai = tok.num::<u8>()?.ok_or("Missing <as_rai>")?;
        tok.expect_sep()?;
        let cp_rai = tok.num::<u8>()?.ok_or("Missing <cp_rai>")?;
        tok.end()?;

        Ok(RaiParam {
            cell_id,
            plmn: plmn.plmn,
            as_rai: as_rai != 0,
            cp_rai: cp_rai != 0,
        })
    }
}

impl AtParseLine for RaiParam {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        RaiParam::parse(line.strip_prefix("%RAI: ").ok_or("Missing '%RAI: '")?)
    }
}
