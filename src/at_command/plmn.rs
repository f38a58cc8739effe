use core::str::FromStr;

use super::AtParseErr;

/// A public land mobile network identity, e.g. `23003`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Plmn {
    /// MCC and MNC concatenated as a decimal number.
    pub plmn: u32,
    pub mcc: u16,
    pub mnc: u16,
    /// Whether the MNC has three digits.
    pub long_mnc: bool,
}

impl Plmn {
    /// Parse a 5 digit (2 digit MNC) or 6 digit (3 digit MNC) PLMN string.
    pub fn parse(s: &str) -> Result<Plmn, AtParseErr> {
        if s.len() != 5 && s.len() != 6 {
            return Err("PLMN must be 5 or 6 digits".into());
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err("PLMN must only contain digits".into());
        }

        let (mcc, mnc) = s.split_at(3);
        let mcc: u16 = mcc.parse()?;
        let mnc: u16 = mnc.parse()?;

        if mcc == 0 {
            return Err("MCC must not be zero".into());
        }

        let long_mnc = s.len() == 6;
        let plmn = if long_mnc {
            u32::from(mcc) * 1000 + u32::from(mnc)
        } else {
            u32::from(mcc) * 100 + u32::from(mnc)
        };

        Ok(Plmn {
            plmn,
            mcc,
            mnc,
            long_mnc,
        })
    }
}

impl FromStr for Plmn {
    type Err = AtParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plmn::parse(s)
    }
}

impl core::fmt::Display for Plmn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}
