//! AT commands of the nRF91 series modem firmware, and the decoders for their responses.

use core::{
    fmt::Debug,
    num::{ParseFloatError, ParseIntError},
};

pub mod generic_response;
pub(crate) mod tok;
pub mod unsolicited;

pub mod cereg;
pub mod cfun;
pub mod cgact;
pub mod cgatt;
pub mod cgauth;
pub mod cgdcont;
pub mod cimi;
pub mod coneval;
pub mod cops;
pub mod cpsms;
pub mod crsm;
pub mod gsn;
pub mod ncellmeas;
pub mod plmn;
pub mod rai;
pub mod reporting;
pub mod version;
pub mod xbandlock;
pub mod xiccid;
pub mod xmodemsleep;
pub mod xmodemtrace;
pub mod xsystemmode;

pub use cereg::{AccessTechnology, CeregParam, GprsTimer, RegistrationStatus};
pub use coneval::{ConnEvalParam, ConnEvalResult};
pub use generic_response::{AtText, GenericOk, SimError, AT_TEXT_LEN};
pub use ncellmeas::{NcellMeasCell, NcellMeasNeighbor, NcellMeasParam};
pub use plmn::Plmn;
pub use rai::RaiParam;
pub use xmodemsleep::XModemSleep;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AtParseErr {
    message: &'static str,
}

impl AtParseErr {
    pub fn message(&self) -> &'static str {
        self.message
    }
}

/// Parse a single line of modem output.
pub trait AtParseLine: Sized {
    fn from_line(line: &str) -> Result<Self, AtParseErr>;
}

#[cfg(feature = "defmt")]
pub trait AtRequest: Debug + defmt::Format {
    type Response: AtResponse;
    fn encode(&self) -> heapless::String<256>;
}

#[cfg(not(feature = "defmt"))]
pub trait AtRequest: Debug {
    type Response: AtResponse;
    fn encode(&self) -> heapless::String<256>;
}

/// Decode the information text of a successful command into a typed response.
pub trait AtResponse: Sized {
    fn from_response(text: &str) -> Result<Self, AtParseErr>;
}

/// Every response line starting with `prefix`, with the prefix stripped.
pub(crate) fn response_lines<'a>(
    text: &'a str,
    prefix: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    text.lines()
        .map(str::trim)
        .filter_map(move |line| line.strip_prefix(prefix))
}

/// The first response line starting with `prefix`, with the prefix stripped.
pub(crate) fn response_line<'a>(text: &'a str, prefix: &'a str) -> Result<&'a str, AtParseErr> {
    response_lines(text, prefix)
        .next()
        .ok_or_else(|| "Missing response line".into())
}

/// Copy `s` into a fixed capacity string, failing instead of panicking when it doesn't fit.
pub(crate) fn bounded<const N: usize>(s: &str) -> Result<heapless::String<N>, AtParseErr> {
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|_| AtParseErr::from("Field too long"))?;
    Ok(out)
}

impl From<&'static str> for AtParseErr {
    fn from(message: &'static str) -> Self {
        AtParseErr { message }
    }
}

impl From<ParseIntError> for AtParseErr {
    fn from(_: ParseIntError) -> Self {
        AtParseErr {
            message: "Failed to parse integer",
        }
    }
}

impl From<ParseFloatError> for AtParseErr {
    fn from(_: ParseFloatError) -> Self {
        AtParseErr {
            message: "Failed to parse float",
        }
    }
}
