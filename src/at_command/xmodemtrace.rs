use heapless::String;

use super::{AtRequest, GenericOk};

/// AT%XMODEMTRACE=1,2 or AT%XMODEMTRACE=0
///
/// Trace set 2 carries the LTE and IP layer traces.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetModemTrace(pub bool);

impl AtRequest for SetModemTrace {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        if self.0 {
            "AT%XMODEMTRACE=1,2"
        } else {
            "AT%XMODEMTRACE=0"
        }
        .into()
    }
}
