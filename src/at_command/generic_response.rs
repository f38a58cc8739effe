use super::{AtParseErr, AtParseLine, AtResponse};

/// Maximum length of the information text returned for a single AT command.
pub const AT_TEXT_LEN: usize = 512;

/// Information text of a successful AT command, i.e. every line before the final `OK`.
pub type AtText = heapless::String<AT_TEXT_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GenericOk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimError {
    /// Generic error
    Generic,

    /// Error relating to mobile equipment or to the network.
    CmeErr { code: u32 },

    /// Error relating to message service or to the network.
    CmsErr { code: u32 },
}

impl AtResponse for GenericOk {
    fn from_response(_text: &str) -> Result<Self, AtParseErr> {
        Ok(GenericOk)
    }
}

impl AtParseLine for SimError {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        if let Some(code) = line.strip_prefix("+CME ERROR: ") {
            Ok(SimError::CmeErr {
                code: code.parse()?,
            })
        } else if let Some(code) = line.strip_prefix("+CMS ERROR: ") {
            Ok(SimError::CmsErr {
                code: code.parse()?,
            })
        } else if line == "ERROR" {
            Ok(SimError::Generic)
        } else {
            Err("Not a valid error code".into())
        }
    }
}
