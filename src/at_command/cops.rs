use core::fmt::Write;
use heapless::String;

use super::tok::Tokenizer;
use super::{bounded, response_line, AtParseErr, AtRequest, AtResponse, GenericOk, Plmn};

/// AT+COPS=...
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectOperator {
    /// AT+COPS=0
    Automatic,
    /// AT+COPS=1,2,"<plmn>"
    Manual(Plmn),
}

impl AtRequest for SelectOperator {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        match self {
            SelectOperator::Automatic => write!(buf, "AT+COPS=0").ok(),
            SelectOperator::Manual(plmn) => write!(buf, "AT+COPS=1,2,\"{}\"", plmn).ok(),
        };
        buf
    }
}

/// AT+COPS?
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetOperatorInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OperatorInfo {
    pub mode: u8,
    pub operator: Option<String<16>>,
    pub act: Option<u8>,
}

impl AtRequest for GetOperatorInfo {
    type Response = OperatorInfo;
    fn encode(&self) -> String<256> {
        "AT+COPS?".into()
    }
}

impl AtResponse for OperatorInfo {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        // +COPS: 0,2,"23003",9
        let mut tok = Tokenizer::new(response_line(text, "+COPS: ")?);

        let mode = tok.num()?.ok_or("Missing <mode>")?;
        let mut info = OperatorInfo {
            mode,
            operator: None,
            act: None,
        };

        if tok.sep() {
            let _format: Option<u8> = tok.num()?;
            tok.expect_sep()?;
            info.operator = tok.quoted()?.map(bounded::<16>).transpose()?;
            tok.expect_sep()?;
            info.act = tok.num()?;
        }

        Ok(info)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_operator() {
        let info = OperatorInfo::from_response("+COPS: 0,2,\"23003\",9").unwrap();
        assert_eq!(info.mode, 0);
        assert_eq!(info.operator.as_deref(), Some("23003"));
        assert_eq!(info.act, Some(9));

        let info = OperatorInfo::from_response("+COPS: 0").unwrap();
        assert_eq!(info.operator, None);
    }

    #[test]
    fn encode() {
        assert_eq!(SelectOperator::Automatic.encode().as_str(), "AT+COPS=0");
        let plmn = Plmn::parse("23003").unwrap();
        assert_eq!(
            SelectOperator::Manual(plmn).encode().as_str(),
            "AT+COPS=1,2,\"23003\""
        );
    }
}
