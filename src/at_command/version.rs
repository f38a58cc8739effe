use heapless::String;

use super::{bounded, response_line, AtParseErr, AtRequest, AtResponse};

/// AT%HWVERSION
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetHwVersion;

/// AT%SHORTSWVER
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetFwVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HwVersion(pub String<32>);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FwVersion(pub String<32>);

impl AtRequest for GetHwVersion {
    type Response = HwVersion;
    fn encode(&self) -> String<256> {
        "AT%HWVERSION".into()
    }
}

impl AtRequest for GetFwVersion {
    type Response = FwVersion;
    fn encode(&self) -> String<256> {
        "AT%SHORTSWVER".into()
    }
}

impl AtResponse for HwVersion {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        Ok(HwVersion(bounded(response_line(text, "%HWVERSION: ")?)?))
    }
}

impl AtResponse for FwVersion {
    fn from_response(text: &str) -> Result<Self, AtParseErr> {
        Ok(FwVersion(bounded(response_line(text, "%SHORTSWVER: ")?)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_versions() {
        let hw = HwVersion::from_response("%HWVERSION: nRF9151 LACA A0A").unwrap();
        assert_eq!(hw.0.as_str(), "nRF9151 LACA A0A");
        let fw = FwVersion::from_response("%SHORTSWVER: nrf91x1_2.0.2\r\n").unwrap();
        assert_eq!(fw.0.as_str(), "nrf91x1_2.0.2");
    }
}
