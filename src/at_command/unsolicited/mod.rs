//! Unsolicited Response Codes

use super::{AtParseErr, AtParseLine, CeregParam, NcellMeasParam, RaiParam, XModemSleep};

mod cscon;
mod mdmev;
mod ready;
mod xsim;

pub use cscon::SignallingConnection;
pub use mdmev::ModemEvent;
pub use ready::{NetworkTime, Ready};
pub use xsim::SimState;

/// Unsolicited Response Code
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Urc {
    Ready(Ready),
    Sim(SimState),
    NetworkTime(NetworkTime),
    Registration(CeregParam),
    ModemEvent(ModemEvent),
    SignallingConnection(SignallingConnection),
    ModemSleep(XModemSleep),
    Rai(RaiParam),
    CellMeasurement(NcellMeasParam),
}

impl AtParseLine for Urc {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        /// Returns a function that tries to parse the line into a Urc::T
        fn parse<'a, T: AtParseLine>(
            line: &'a str,
            f: impl Fn(T) -> Urc + 'a,
        ) -> impl Fn(AtParseErr) -> Result<Urc, AtParseErr> + 'a {
            move |_| Ok(f(T::from_line(line)?))
        }

        let line = line.trim();

        Err(AtParseErr::default())
            .or_else(parse(line, Urc::Ready))
            .or_else(parse(line, Urc::Sim))
            .or_else(parse(line, Urc::NetworkTime))
            .or_else(parse(line, Urc::Registration))
            .or_else(parse(line, Urc::ModemEvent))
            .or_else(parse(line, Urc::SignallingConnection))
            .or_else(parse(line, Urc::ModemSleep))
            .or_else(parse(line, Urc::Rai))
            .or_else(parse(line, Urc::CellMeasurement))
            .map_err(|_| AtParseErr::from("Failed to parse as a URC"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::at_command::RegistrationStatus;

    #[test]
    fn parse_simple_urcs() {
        assert_eq!(Urc::from_line("Ready\r\n").unwrap(), Urc::Ready(Ready));
        assert_eq!(
            Urc::from_line("%XSIM: 1").unwrap(),
            Urc::Sim(SimState(true))
        );
        assert_eq!(
            Urc::from_line("%XTIME: \"0A\",\"42806291219240\",\"01\"").unwrap(),
            Urc::NetworkTime(NetworkTime)
        );
        assert_eq!(
            Urc::from_line("%MDMEV: RESET LOOP").unwrap(),
            Urc::ModemEvent(ModemEvent::ResetLoop)
        );
        assert_eq!(
            Urc::from_line("%MDMEV: SEARCH STATUS 1").unwrap(),
            Urc::ModemEvent(ModemEvent::Other)
        );
        assert_eq!(
            Urc::from_line("+CSCON: 0").unwrap(),
            Urc::SignallingConnection(SignallingConnection(false))
        );
    }

    #[test]
    fn parse_registration() {
        let Urc::Registration(cereg) =
            Urc::from_line("+CEREG: 5,\"AF66\",\"009DE067\",9,,,\"00000000\",\"00111000\"")
                .unwrap()
        else {
            panic!("expected a registration URC");
        };
        assert_eq!(cereg.stat, RegistrationStatus::RegisteredRoaming);
        assert_eq!(cereg.cell_id, Some(0x009DE067));
    }

    #[test]
    fn parse_modem_sleep() {
        let Urc::ModemSleep(sleep) = Urc::from_line("%XMODEMSLEEP: 1,36000").unwrap() else {
            panic!("expected a modem sleep URC");
        };
        assert!(sleep.is_sleeping());
    }

    #[test]
    fn reject_unknown() {
        assert!(Urc::from_line("+CGEV: ME PDN ACT 0").is_err());
        assert!(Urc::from_line("%XSIM: 7").is_err());
    }
}
