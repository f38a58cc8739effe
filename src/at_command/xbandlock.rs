use core::fmt::Write;
use heapless::String;

use super::{AtRequest, GenericOk};

/// Length of the `%XBANDLOCK` band bit string.
pub const BANDLOCK_BITS: usize = 88;

/// AT%XBANDLOCK=...
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetBandLock<'a> {
    /// AT%XBANDLOCK=0
    Disabled,
    /// AT%XBANDLOCK=1,"<88 bit string>", band `n` at index `88 - n`.
    Permanent(&'a str),
}

impl AtRequest for SetBandLock<'_> {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        match self {
            SetBandLock::Disabled => write!(buf, "AT%XBANDLOCK=0").ok(),
            SetBandLock::Permanent(bits) => write!(buf, "AT%XBANDLOCK=1,\"{}\"", bits).ok(),
        };
        buf
    }
}
