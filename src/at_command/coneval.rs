use heapless::String;

use super::cereg::parse_cell_id;
use super::tok::Tokenizer;
use super::{response_line, AtParseErr, AtRequest, AtResponse, Plmn};

/// AT%CONEVAL
///
/// Connection pre-evaluation: estimate the link quality before sending data.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EvaluateConnection;

impl AtRequest for EvaluateConnection {
    type Response = ConnEvalParam;
    fn encode(&self) -> String<256> {
        "AT%CONEVAL".into()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnEvalResult {
    #[default]
    Success,
    NoCell,
    UiccNotAvailable,
    CellsBarred,
    Busy,
    Aborted,
    NotRegistered,
    Unspecified,
    Other(u8),
}

impl ConnEvalResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ConnEvalResult::Success,
            1 => ConnEvalResult::NoCell,
            2 => ConnEvalResult::UiccNotAvailable,
            3 => ConnEvalResult::CellsBarred,
            4 => ConnEvalResult::Busy,
            5 => ConnEvalResult::Aborted,
            6 => ConnEvalResult::NotRegistered,
            7 => ConnEvalResult::Unspecified,
            other => ConnEvalResult::Other(other),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnEvalResult::Success => "Connection pre-evaluation successful",
            ConnEvalResult::NoCell => "Evaluation failed, no cell available",
            ConnEvalResult::UiccNotAvailable => "Evaluation failed, UICC not available",
            ConnEvalResult::CellsBarred => "Evaluation failed, only barred cells available",
            ConnEvalResult::Busy => "Evaluation failed, busy (e.g. GNSS activity)",
            ConnEvalResult::Aborted => {
                "Evaluation failed, aborted because of higher priority operation"
            }
            ConnEvalResult::NotRegistered => "Evaluation failed, UE not registered to network",
            ConnEvalResult::Unspecified => "Evaluation failed, unspecified",
            ConnEvalResult::Other(_) => "Evaluation failed, unknown result",
        }
    }
}

/// Connection evaluation result. Every field besides `result` is zero unless
/// `result` is [ConnEvalResult::Success].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnEvalParam {
    pub result: ConnEvalResult,
    /// Energy estimate, 5 (worst) to 9 (best).
    pub eest: i32,
    /// Coverage enhancement level.
    pub ecl: i32,
    /// dBm
    pub rsrp: i32,
    /// dB
    pub rsrq: i32,
    /// dB
    pub snr: i32,
    pub plmn: u32,
    pub cell_id: u32,
    pub band: i32,
    pub earfcn: i32,
}

impl ConnEvalParam {
    /// Parse the body of a `%CONEVAL` response:
    /// `result[,rrc_state,energy_estimate,rsrp,rsrq,snr,"cell_id","plmn",phys_cell_id,
    /// earfcn,band,tau_triggered,ce_level,...]`
    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let result = tok.num::<u8>()?.ok_or("Missing <result>")?;
        let result = ConnEvalResult::from_code(result);

        if result != ConnEvalResult::Success {
            return Ok(ConnEvalParam {
                result,
                ..ConnEvalParam::default()
            });
        }

        let _rrc_state = num(&mut tok)?;
        let eest = num(&mut tok)?;
        let rsrp = num(&mut tok)?;
        let rsrq = num(&mut tok)?;
        let snr = num(&mut tok)?;

        tok.expect_sep()?;
        let cell_id = parse_cell_id(tok.quoted()?.ok_or("Missing <cell_id>")?)?;
        tok.expect_sep()?;
        let plmn = Plmn::parse(tok.quoted()?.ok_or("Missing <plmn>")?)?;

        let _phys_cell_id = num(&mut tok)?;
        let earfcn = num(&mut tok)?;
        let band = num(&mut tok)?;
        let _tau_triggered = num(&mut tok)?;
        let ecl = num(&mut tok)?;

        Ok(ConnEvalParam {
            result,
            eest,
            ecl,
            rsrp: rsrp - 140,
            rsrq: (rsrq - 39) / 2,
            snr: snr - 24,
            plmn: plmn.plmn,
            cell_id,
            band,
            earfcn,
        })
    }
}

/// Consume a separator followed by a mandatory number.
fn num(tok: &mut Tokenizer<'_>) -> Result<i32, AtParseErr> {
    tok.expect_sep()?;
    Ok(tok.num()?.ok_or("Missing field")?)
}

impl AtResponse for ConnEvalParam {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        ConnEvalParam::parse(response_line(text, "%CONEVAL: ")?)
    }
}
