use core::fmt::Write;
use heapless::String;

use super::tok::Tokenizer;
use super::{AtParseErr, AtParseLine, AtRequest, GenericOk};

/// AT%XMODEMSLEEP=1,<threshold>,<warning_time>
///
/// Subscribe to modem sleep notifications for sleeps longer than `threshold_ms`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigureModemSleepUrc {
    pub warning_time_ms: u32,
    pub threshold_ms: u32,
}

impl AtRequest for ConfigureModemSleepUrc {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(
            buf,
            "AT%XMODEMSLEEP=1,{},{}",
            self.warning_time_ms, self.threshold_ms
        )
        .ok();
        buf
    }
}

/// %XMODEMSLEEP: <type>[,<time>]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct XModemSleep {
    pub sleep_type: u32,
    /// Remaining sleep time in milliseconds, 0 when absent.
    pub time_ms: u32,
}

impl XModemSleep {
    /// Sleep type reported when the modem enters flight mode or PSM without a timer.
    const SLEEP_TYPE_PROPRIETARY_PSM: u32 = 4;

    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let sleep_type = tok.uint()?.ok_or("Missing <type>")?;
        let mut time_ms = 0;

        if tok.sep() {
            time_ms = tok.uint()?.unwrap_or(0);
        }
        tok.end()?;

        Ok(XModemSleep {
            sleep_type,
            time_ms,
        })
    }

    /// Whether this notification means the radio is going to sleep.
    pub fn is_sleeping(&self) -> bool {
        self.time_ms > 0 || self.sleep_type == Self::SLEEP_TYPE_PROPRIETARY_PSM
    }
}

impl AtParseLine for XModemSleep {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let body = line
            .strip_prefix("%XMODEMSLEEP: ")
            .ok_or("Missing '%XMODEMSLEEP: '")?;
        XModemSleep::parse(body)
    }
}
