use heapless::String;

use super::tok::Tokenizer;
use super::{response_lines, AtParseErr, AtRequest, AtResponse};

/// AT+CGACT?
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetPdpActivation;

/// Activation state of every defined PDP context.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdpActivation {
    pub active: heapless::Vec<(u8, bool), 4>,
}

impl PdpActivation {
    pub fn is_active(&self, cid: u8) -> bool {
        self.active.iter().any(|&(c, active)| c == cid && active)
    }
}

impl AtRequest for GetPdpActivation {
    type Response = PdpActivation;
    fn encode(&self) -> String<256> {
        "AT+CGACT?".into()
    }
}

impl AtResponse for PdpActivation {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // +CGACT: 0,1
        let mut activation = PdpActivation::default();
        for line in response_lines(text, "+CGACT: ") {
            let mut tok = Tokenizer::new(line);
            let cid = tok.num::<u8>()?.ok_or("Missing <cid>")?;
            tok.expect_sep()?;
            let state = tok.num::<u8>()?.ok_or("Missing <state>")?;
            activation
                .active
                .push((cid, state == 1))
                .map_err(|_| "Too many contexts")?;
        }
        Ok(activation)
    }
}
