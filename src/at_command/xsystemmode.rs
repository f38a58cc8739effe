use core::fmt::Write;
use heapless::String;

use super::{AtRequest, GenericOk};

/// Which system is preferred when both LTE-M and NB-IoT are enabled.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemPreference {
    #[default]
    Auto = 0,
    LteM = 1,
    NbIot = 2,
}

/// AT%XSYSTEMMODE=<lte_m>,<nb_iot>,0,<preference>
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetSystemMode {
    pub lte_m: bool,
    pub nb_iot: bool,
    pub preference: SystemPreference,
}

impl AtRequest for SetSystemMode {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(
            buf,
            "AT%XSYSTEMMODE={},{},0,{}",
            self.lte_m as u8, self.nb_iot as u8, self.preference as u8
        )
        .ok();
        buf
    }
}
