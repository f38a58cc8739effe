use crate::{
    at_command::{
        unsolicited::{ModemEvent, SignallingConnection, SimState, Urc},
        AtParseLine,
    },
    fsm::FsmEvent,
    log,
    pump::Pump,
    Error, UrcSource,
};

use super::LteContext;

/// Turns unsolicited modem lines into state machine events.
#[derive(Clone, Copy)]
pub struct Monitor<'c> {
    ctx: &'c LteContext,
}

impl<'c> Monitor<'c> {
    pub fn new(ctx: &'c LteContext) -> Self {
        Monitor { ctx }
    }

    /// Handle one line from the modem. Lines that aren't notifications we track are ignored.
    pub fn process(&self, line: &str) {
        let urc = match Urc::from_line(line) {
            Ok(urc) => urc,
            Err(_) => {
                log::trace!("ignoring modem line {:?}", line);
                return;
            }
        };

        let event = match urc {
            Urc::Ready(_) => Some(FsmEvent::Ready),
            Urc::Sim(SimState(inserted)) => inserted.then_some(FsmEvent::SimDetected),
            Urc::NetworkTime(_) => Some(FsmEvent::XTime),
            Urc::Registration(cereg) => {
                log::info!("registration status: {}", cereg.stat.as_str());
                let registered = cereg.stat.is_registered();
                self.ctx.state.set_cereg(cereg);
                Some(if registered {
                    FsmEvent::Registered
                } else {
                    FsmEvent::Deregistered
                })
            }
            Urc::ModemEvent(ModemEvent::ResetLoop) => {
                log::warn!("modem reset loop detected");
                Some(FsmEvent::ResetLoop)
            }
            Urc::ModemEvent(ModemEvent::Other) => None,
            Urc::SignallingConnection(SignallingConnection(true)) => Some(FsmEvent::Cscon1),
            Urc::SignallingConnection(SignallingConnection(false)) => Some(FsmEvent::Cscon0),
            Urc::ModemSleep(sleep) => sleep.is_sleeping().then_some(FsmEvent::XModemSleep),
            Urc::Rai(rai) => {
                self.ctx.state.set_rai(rai);
                None
            }
            Urc::CellMeasurement(meas) => {
                let done = meas.is_success();
                if !done {
                    log::warn!("cell measurement failed with status {}", meas.status);
                }
                self.ctx.state.set_ncellmeas(meas);
                done.then_some(FsmEvent::NcellMeasDone)
            }
        };

        if let Some(event) = event {
            self.ctx.delegate(event);
        }
    }
}

/// Feeds every line of a [UrcSource] to the [Monitor].
pub struct UrcPump<'c, U> {
    pub(crate) source: U,
    pub(crate) monitor: Monitor<'c>,
}

impl<'c, U: UrcSource> UrcPump<'c, U> {
    pub fn new(ctx: &'c LteContext, source: U) -> Self {
        UrcPump {
            source,
            monitor: Monitor::new(ctx),
        }
    }
}

impl<U: UrcSource> Pump for UrcPump<'_, U> {
    type Err = Error;

    async fn pump(&mut self) -> Result<(), Self::Err> {
        let line = self.source.next_line().await?;
        self.monitor.process(&line);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::at_command::RegistrationStatus;

    fn events(ctx: &LteContext) -> std::vec::Vec<FsmEvent> {
        let mut events = std::vec::Vec::new();
        while let Ok(event) = ctx.events.try_receive() {
            events.push(event);
        }
        events
    }

    #[test]
    fn notifications_become_events() {
        let ctx = LteContext::new();
        let monitor = Monitor::new(&ctx);

        monitor.process("Ready\r\n");
        monitor.process("%XSIM: 1");
        monitor.process("%XSIM: 0");
        monitor.process("%XTIME: \"0A\",\"52104161715080\",\"01\"");
        monitor.process("%MDMEV: RESET LOOP");
        monitor.process("+CSCON: 1");
        monitor.process("+CSCON: 0");

        assert_eq!(
            events(&ctx),
            [
                FsmEvent::Ready,
                FsmEvent::SimDetected,
                FsmEvent::XTime,
                FsmEvent::ResetLoop,
                FsmEvent::Cscon1,
                FsmEvent::Cscon0,
            ]
        );
        assert!(!ctx.is_cscon());
    }

    #[test]
    fn registration_is_stored() {
        let ctx = LteContext::new();
        let monitor = Monitor::new(&ctx);

        monitor.process("+CEREG: 5,\"AF66\",\"009DE067\",9,,,\"00000000\",\"00111000\"");
        monitor.process("+CEREG: 2");

        assert_eq!(
            events(&ctx),
            [FsmEvent::Registered, FsmEvent::Deregistered]
        );
        assert_eq!(
            ctx.state.cereg().unwrap().stat,
            RegistrationStatus::Searching
        );
    }

    #[test]
    fn unknown_lines_are_ignored() {
        let ctx = LteContext::new();
        let monitor = Monitor::new(&ctx);
        monitor.process("+CGEV: ME PDN ACT 0");
        monitor.process("");
        assert!(events(&ctx).is_empty());
    }
}
