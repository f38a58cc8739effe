//! The connection state machine.
//!
//! A single task owns the [Fsm]. Everything else talks to it by queueing [FsmEvent]s on the
//! [LteContext], so a handler always runs to completion before the next event is looked at.

pub mod policy;

use core::{convert::Infallible, sync::atomic::Ordering};

use embassy_time::{Duration, Instant, Timer};
use futures::{select_biased, FutureExt};

use crate::{
    log,
    lte::LteEvent,
    modem::{flow::FunctionalMode, Flow, FplmnStatus, LteContext, Payload, SendRecvRequest},
    pump::Pump,
    AtClient, CheckError, DataSocket, Error, ModemPower,
};

use policy::{error_backoff, AttachStrategy};

/// Pause in the error state before resuming after a successful check.
pub const ERROR_RESUME_DELAY: Duration = Duration::from_secs(5);
pub const SIM_DETECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const RESET_LOOP_DELAY: Duration = Duration::from_secs(32 * 60);
pub const READY_TIMEOUT: Duration = Duration::from_millis(500);
/// How long a sent packet may wait for the signalling connection.
pub const CSCON_TIMEOUT: Duration = Duration::from_secs(30);
pub const NCELLMEAS_TIMEOUT: Duration = Duration::from_secs(120);
/// Socket-only check failures tolerated before a full restart.
pub const SOCKET_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmState {
    Disabled,
    Error,
    Prepare,
    Attach,
    RetryDelay,
    ResetLoop,
    OpenSocket,
    Ready,
    Sleep,
    Send,
    Receive,
    Coneval,
    Ncellmeas,
}

impl FsmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsmState::Disabled => "disabled",
            FsmState::Error => "error",
            FsmState::Prepare => "prepare",
            FsmState::Attach => "attach",
            FsmState::RetryDelay => "retry_delay",
            FsmState::ResetLoop => "reset_loop",
            FsmState::OpenSocket => "open_socket",
            FsmState::Ready => "ready",
            FsmState::Sleep => "sleep",
            FsmState::Send => "send",
            FsmState::Receive => "receive",
            FsmState::Coneval => "coneval",
            FsmState::Ncellmeas => "ncellmeas",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmEvent {
    Error,
    Timeout,
    Enable,
    Ready,
    SimDetected,
    Registered,
    Deregistered,
    ResetLoop,
    SocketOpened,
    XModemSleep,
    Cscon0,
    Cscon1,
    XTime,
    Send,
    Recv,
    NcellMeasDone,
}

impl FsmEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsmEvent::Error => "ERROR",
            FsmEvent::Timeout => "TIMEOUT",
            FsmEvent::Enable => "ENABLE",
            FsmEvent::Ready => "READY",
            FsmEvent::SimDetected => "SIM_DETECTED",
            FsmEvent::Registered => "REGISTERED",
            FsmEvent::Deregistered => "DEREGISTERED",
            FsmEvent::ResetLoop => "RESET_LOOP",
            FsmEvent::SocketOpened => "SOCKET_OPENED",
            FsmEvent::XModemSleep => "XMODEMSLEEP",
            FsmEvent::Cscon0 => "CSCON_0",
            FsmEvent::Cscon1 => "CSCON_1",
            FsmEvent::XTime => "XTIME",
            FsmEvent::Send => "SEND",
            FsmEvent::Recv => "RECV",
            FsmEvent::NcellMeasDone => "NCELLMEAS_DONE",
        }
    }
}

pub struct Fsm<'c, A, P, S> {
    ctx: &'c LteContext,
    flow: Flow<'c, A, P, S>,
    state: FsmState,
    /// When to raise [FsmEvent::Timeout]. Cleared on every transition.
    deadline: Option<Instant>,
    attach_attempt: u32,
    /// Consecutive failed checks in the error state.
    failures: u32,
    socket_retries: u32,
    /// Where the error state goes once its delay is over.
    resume: FsmState,
    /// The exchange being worked on, taken out of the request slot.
    request: Option<SendRecvRequest>,
    /// The radio was turned off in ready because the network refused PSM.
    radio_off: bool,
    ncellmeas_running: bool,
}

impl<'c, A, P, S> Fsm<'c, A, P, S>
where
    A: AtClient,
    P: ModemPower,
    S: DataSocket,
{
    pub fn new(ctx: &'c LteContext, flow: Flow<'c, A, P, S>) -> Self {
        Fsm {
            ctx,
            flow,
            state: FsmState::Disabled,
            deadline: None,
            attach_attempt: 0,
            failures: 0,
            socket_retries: 0,
            resume: FsmState::Prepare,
            request: None,
            radio_off: false,
            ncellmeas_running: false,
        }
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    async fn next_event(&mut self) -> FsmEvent {
        let ctx = self.ctx;
        match self.deadline {
            None => ctx.events.receive().await,
            Some(deadline) => select_biased! {
                event = ctx.events.receive().fuse() => event,
                _ = Timer::at(deadline).fuse() => {
                    self.deadline = None;
                    FsmEvent::Timeout
                }
            },
        }
    }

    /// Run the handler of the current state for `event`.
    ///
    /// A failing handler raises [FsmEvent::Error], unless it was already handling one.
    pub async fn handle(&mut self, event: FsmEvent) {
        log::debug!("{}: {}", self.state.as_str(), event.as_str());

        match event {
            FsmEvent::Cscon0 => self.ctx.notify(LteEvent::Cscon0),
            FsmEvent::Cscon1 => self.ctx.notify(LteEvent::Cscon1),
            _ => {}
        }

        if let Err(e) = self.on_event(event).await {
            log::error!(
                "{} failed handling {}: {:?}",
                self.state.as_str(),
                event.as_str(),
                e
            );
            self.deadline = None;
            if event != FsmEvent::Error {
                self.ctx.delegate(FsmEvent::Error);
            }
        }
    }

    async fn enter_state(&mut self, next: FsmState) {
        if next == self.state {
            log::debug!("already in {}", next.as_str());
            return;
        }

        self.deadline = None;

        if let Err(e) = self.on_leave().await {
            log::error!("leaving {} failed: {:?}", self.state.as_str(), e);
            // the error state must always be reachable
            if next != FsmState::Error {
                self.ctx.delegate(FsmEvent::Error);
                return;
            }
        }

        log::info!("{} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
        self.ctx.set_fsm_state(next);

        if let Err(e) = self.on_enter().await {
            log::error!("entering {} failed: {:?}", next.as_str(), e);
            self.deadline = None;
            if next != FsmState::Error {
                self.ctx.delegate(FsmEvent::Error);
            }
        }
    }

    async fn on_leave(&mut self) -> Result<(), Error> {
        match self.state {
            FsmState::RetryDelay => {
                self.attach_attempt = self.attach_attempt.saturating_add(1);
            }
            FsmState::ResetLoop => {
                self.flow.stop().await?;
                Timer::after(self.flow.config().timings.radio_settle).await;
            }
            FsmState::Ncellmeas if self.ncellmeas_running => {
                self.ncellmeas_running = false;
                if let Err(e) = self.flow.ncellmeas_stop().await {
                    log::warn!("failed to stop cell measurement: {:?}", e);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_enter(&mut self) -> Result<(), Error> {
        match self.state {
            FsmState::Disabled => {
                self.ctx.connected.signal(false);
                self.flow.stop().await?;
            }
            FsmState::Error => self.enter_error().await,
            FsmState::Prepare => {
                self.flow.start().await?;
                self.flow.prepare().await?;
                self.flow.cfun(FunctionalMode::Normal).await?;
                self.arm(SIM_DETECT_TIMEOUT);
            }
            FsmState::Attach => {
                self.ctx.metrics.attach_started(Instant::now());
                self.ctx.connected.signal(false);
                let timeout = self
                    .flow
                    .config()
                    .attach_policy
                    .timeout(self.attach_attempt);
                log::info!(
                    "attach attempt {}, timeout {} s",
                    self.attach_attempt,
                    timeout.attach_timeout.as_secs()
                );
                self.ctx.set_attach_timeout(timeout);
                self.arm(timeout.attach_timeout);
            }
            FsmState::RetryDelay => {
                self.radio_offline().await;
                let delay = self
                    .flow
                    .config()
                    .attach_policy
                    .timeout(self.attach_attempt)
                    .retry_delay;
                log::info!("next attach in {} s", delay.as_secs());
                self.arm(delay);
            }
            FsmState::ResetLoop => {
                self.radio_offline().await;
                self.attach_attempt = 0;
                self.arm(RESET_LOOP_DELAY);
            }
            FsmState::OpenSocket => {
                let loopback = self
                    .ctx
                    .socket_config()
                    .is_some_and(|config| config.is_loopback());
                if !loopback {
                    self.flow.open_socket().await?;
                }
                self.ctx.delegate(FsmEvent::SocketOpened);
            }
            FsmState::Ready => {
                if self.request.is_some() || self.ctx.request.has_pending() {
                    self.ctx.delegate(FsmEvent::Send);
                }
                self.arm(READY_TIMEOUT);
            }
            FsmState::Sleep => {
                if self.request.is_some() || self.ctx.request.has_pending() {
                    self.ctx.delegate(FsmEvent::Send);
                }
            }
            FsmState::Send => self.enter_send().await?,
            FsmState::Receive => self.enter_receive().await?,
            FsmState::Coneval => {
                if let Err(e) = self.flow.coneval().await {
                    log::warn!("connection evaluation failed: {:?}", e);
                }
                self.ctx.delegate(FsmEvent::Ready);
            }
            FsmState::Ncellmeas => {
                self.arm(NCELLMEAS_TIMEOUT);
                self.flow.ncellmeas_start().await?;
                self.ncellmeas_running = true;
            }
        }
        Ok(())
    }

    /// Check the connection and pick where to resume. Never fails, so the state machine can't
    /// get stuck here.
    async fn enter_error(&mut self) {
        let delay = match self.flow.check().await {
            Ok(()) => {
                log::info!("connection is fine, resuming");
                self.failures = 0;
                self.socket_retries = 0;
                self.resume = FsmState::Ready;
                ERROR_RESUME_DELAY
            }
            Err(e) if e.is_socket_only() && self.socket_retries < SOCKET_RETRIES => {
                self.socket_retries = self.socket_retries.saturating_add(1);
                log::warn!(
                    "socket check failed: {:?}, reopening ({}/{})",
                    e,
                    self.socket_retries,
                    SOCKET_RETRIES
                );
                self.resume = FsmState::OpenSocket;
                ERROR_RESUME_DELAY
            }
            Err(e) => {
                self.ctx.connected.signal(false);
                self.failures = self.failures.saturating_add(1);
                self.socket_retries = 0;
                self.resume = FsmState::Prepare;
                let delay = error_backoff(self.failures);
                log::warn!(
                    "connection check failed: {:?}, restarting in {} s",
                    e,
                    delay.as_secs()
                );
                if let Err(e) = self.flow.stop().await {
                    log::error!("failed to stop modem: {:?}", e);
                }
                delay
            }
        };
        self.arm(delay);
    }

    async fn enter_send(&mut self) -> Result<(), Error> {
        if self.request.is_none() {
            self.request = self.ctx.request.take();
        }
        let Some(request) = self.request.as_ref() else {
            self.ctx.delegate(FsmEvent::Ready);
            return Ok(());
        };
        let id = request.id;

        if !self.ctx.request.is_live(id) {
            log::warn!("dropping abandoned request {}", id);
            self.request = None;
            self.ctx.delegate(FsmEvent::Ready);
            return Ok(());
        }

        self.ctx.metrics.uplink(request.send.len(), Instant::now());
        if let Err(e) = self.flow.send(request).await {
            self.ctx.metrics.uplink_error();
            self.ctx.request.complete(id, Err(e));
            self.request = None;
            return Err(e);
        }

        self.arm(CSCON_TIMEOUT);
        if self.ctx.is_cscon() {
            // the connection is already up, no CSCON notification will follow
            self.ctx.delegate(FsmEvent::Send);
        }
        Ok(())
    }

    async fn enter_receive(&mut self) -> Result<(), Error> {
        let Some(request) = self.request.as_ref() else {
            self.ctx.delegate(FsmEvent::Ready);
            return Ok(());
        };
        let id = request.id;

        self.ctx.metrics.downlink(Instant::now());
        let data = match self.flow.recv(request).await {
            Ok(data) => data,
            Err(e) => {
                self.ctx.metrics.downlink_error();
                self.ctx.request.complete(id, Err(e));
                self.request = None;
                return Err(e);
            }
        };

        self.ctx.metrics.downlink_bytes(data.len());
        Timer::after(self.flow.config().timings.recv_settle).await;
        self.ctx.delegate(FsmEvent::Recv);
        self.ctx.request.complete(id, Ok(data));
        self.request = None;
        Ok(())
    }

    /// Switch the radio to offline mode, tolerating failure.
    async fn radio_offline(&mut self) {
        if let Err(e) = self.flow.cfun(FunctionalMode::Offline).await {
            log::warn!("failed to switch radio off: {:?}", e);
        }
        Timer::after(self.flow.config().timings.radio_settle).await;
    }

    /// Turn the radio back on after it was switched off in ready, and attach again.
    async fn wake_radio(&mut self) -> Result<(), Error> {
        self.flow.cfun(FunctionalMode::Normal).await?;
        self.radio_off = false;
        self.enter_state(FsmState::Attach).await;
        Ok(())
    }

    async fn on_event(&mut self, event: FsmEvent) -> Result<(), Error> {
        use FsmEvent as Event;
        use FsmState as State;

        match (self.state, event) {
            (State::Disabled, Event::Enable) => self.enter_state(State::Prepare).await,
            (State::Disabled, Event::Error) => self.enter_state(State::Error).await,
            (State::Disabled, _) => {}

            (State::Error, Event::Timeout) => self.enter_state(self.resume).await,

            (State::Prepare, Event::SimDetected) => {
                self.deadline = None;
                self.flow.sim_info().await?;
                match self.flow.sim_fplmn().await? {
                    FplmnStatus::Clean => self.enter_state(State::Attach).await,
                    FplmnStatus::Retry => {
                        log::info!("waiting for the SIM to reload");
                        self.arm(SIM_DETECT_TIMEOUT);
                    }
                }
            }
            (State::Prepare, Event::ResetLoop) => self.enter_state(State::ResetLoop).await,
            (State::Prepare, Event::Timeout | Event::Error) => self.enter_state(State::Error).await,

            (State::Attach, Event::Registered) => {
                self.attach_attempt = 0;
                self.ctx.metrics.attach_finished(true, Instant::now());
                self.enter_state(State::OpenSocket).await;
            }
            (State::Attach, Event::ResetLoop) => {
                self.attach_attempt = 0;
                self.enter_state(State::ResetLoop).await;
            }
            (State::Attach, Event::Timeout) => {
                log::warn!("attach attempt {} timed out", self.attach_attempt);
                self.ctx.metrics.attach_finished(false, Instant::now());
                self.enter_state(State::RetryDelay).await;
            }

            (State::RetryDelay | State::ResetLoop, Event::Timeout) => self.enter_state(State::Prepare).await,

            (State::OpenSocket, Event::SocketOpened) => {
                self.ctx.connected.signal(true);
                self.socket_retries = 0;
                self.enter_state(State::Coneval).await;
            }

            (State::Ready, Event::Send) => {
                if self.radio_off {
                    return self.wake_radio().await;
                }
                match self.flow.check().await {
                    Ok(()) => self.enter_state(State::Send).await,
                    Err(CheckError::NotConnected) => self.ctx.delegate(Event::Deregistered),
                    Err(e) => return Err(e.into()),
                }
            }
            (State::Ready, Event::Deregistered) if self.radio_off => {}
            (State::Ready, Event::XModemSleep) => self.enter_state(State::Sleep).await,
            (State::Ready, Event::Cscon0) if self.ncellmeas_requested() => {
                self.enter_state(State::Ncellmeas).await
            }
            (State::Ready, Event::Timeout) => {
                if self.ctx.state.psm_deactivated() && !self.radio_off {
                    log::info!("network refused PSM, switching the radio off");
                    self.flow.cfun(FunctionalMode::Offline).await?;
                    self.radio_off = true;
                } else if self.ncellmeas_requested() && !self.ctx.is_cscon() {
                    self.enter_state(State::Ncellmeas).await;
                }
            }

            (State::Sleep, Event::Send | Event::Ready) if self.radio_off => return self.wake_radio().await,
            (State::Sleep, Event::Send) => self.enter_state(State::Send).await,
            (State::Sleep, Event::Ready) => self.enter_state(State::Ready).await,

            (State::Send, Event::Cscon0) => self.enter_state(State::Ready).await,
            (State::Send, Event::Cscon1 | Event::Send) => {
                self.deadline = None;
                match self.request.take() {
                    Some(request) if request.expects_response() => {
                        self.request = Some(request);
                        self.enter_state(State::Receive).await;
                    }
                    Some(request) => {
                        Timer::after(self.flow.config().timings.send_settle).await;
                        self.ctx.request.complete(request.id, Ok(Payload::new()));
                        self.enter_state(State::Coneval).await;
                    }
                    None => self.enter_state(State::Ready).await,
                }
            }
            (State::Send, Event::Ready | Event::Timeout) => {
                if self.request.is_some() {
                    log::warn!("send was not confirmed");
                    self.ctx.metrics.uplink_error();
                }
                self.enter_state(State::Ready).await;
            }

            (State::Receive, Event::Recv) if self.request.is_none() => self.enter_state(State::Coneval).await,
            (State::Receive, Event::Recv | Event::Ready | Event::Timeout) => self.enter_state(State::Ready).await,

            (State::Coneval, Event::Ready | Event::Timeout) => self.enter_state(State::Ready).await,

            (State::Ncellmeas, Event::NcellMeasDone) => {
                self.ctx.ncellmeas_requested.store(false, Ordering::Relaxed);
                self.ncellmeas_running = false;
                self.ctx.notify(LteEvent::NcellMeasDone);
                self.enter_state(State::Ready).await;
            }
            (State::Ncellmeas, Event::Timeout) => {
                log::warn!("cell measurement timed out");
                self.enter_state(State::Ready).await;
            }

            (
                State::OpenSocket | State::Ready | State::Send | State::Receive | State::Coneval,
                Event::Deregistered,
            ) => self.enter_state(State::Attach).await,

            (_, Event::Error) => self.enter_state(State::Error).await,

            (state, event) => {
                log::trace!("{} ignores {}", state.as_str(), event.as_str());
            }
        }
        Ok(())
    }

    fn ncellmeas_requested(&self) -> bool {
        self.ctx.ncellmeas_requested.load(Ordering::Relaxed)
    }
}

impl<A, P, S> Pump for Fsm<'_, A, P, S>
where
    A: AtClient,
    P: ModemPower,
    S: DataSocket,
{
    type Err = Infallible;

    async fn pump(&mut self) -> Result<(), Self::Err> {
        let event = self.next_event().await;
        self.handle(event).await;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{LteConfig, SocketConfig, Timings};
    use crate::lte::LteObserver;
    use crate::mock::{MockAtClient, MockPower, MockSocket};
    use crate::modem::Monitor;
    use crate::{PowerState, SocketError};
    use core::net::Ipv4Addr;
    use core::sync::atomic::AtomicU32;
    use futures::executor::block_on;

    type TestFsm<'c> = Fsm<'c, MockAtClient, MockPower, MockSocket>;

    const REGISTERED: &str = "+CEREG: 1,\"AF66\",\"009DE067\",7";

    fn config() -> LteConfig {
        LteConfig {
            timings: Timings {
                radio_settle: Duration::from_millis(1),
                send_settle: Duration::from_millis(1),
                recv_settle: Duration::from_millis(1),
            },
            ..LteConfig::default()
        }
    }

    fn fsm<'c>(
        ctx: &'c LteContext,
        client: &MockAtClient,
        power: &MockPower,
        socket: &MockSocket,
    ) -> TestFsm<'c> {
        ctx.set_socket_config(SocketConfig::default());
        let flow = Flow::new(ctx, client.clone(), power.clone(), socket.clone(), config());
        Fsm::new(ctx, flow)
    }

    /// Handle queued events until the queue is empty.
    fn drain(fsm: &mut TestFsm) {
        while let Ok(event) = fsm.ctx.events.try_receive() {
            block_on(fsm.handle(event));
        }
    }

    fn urc(fsm: &mut TestFsm, line: &str) {
        Monitor::new(fsm.ctx).process(line);
        drain(fsm);
    }

    fn event(fsm: &mut TestFsm, event: FsmEvent) {
        block_on(fsm.handle(event));
        drain(fsm);
    }

    /// Enable, detect the SIM and register.
    fn connect(fsm: &mut TestFsm) {
        fsm.ctx.delegate(FsmEvent::Enable);
        drain(fsm);
        assert_eq!(fsm.state(), FsmState::Prepare);
        urc(fsm, "%XSIM: 1");
        assert_eq!(fsm.state(), FsmState::Attach);
        urc(fsm, REGISTERED);
        assert_eq!(fsm.state(), FsmState::Ready);
    }

    fn remaining(fsm: &TestFsm) -> Duration {
        fsm.deadline
            .unwrap()
            .saturating_duration_since(Instant::now())
    }

    #[test]
    fn enable_to_ready() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);

        connect(&mut fsm);

        assert_eq!(ctx.fsm_state(), FsmState::Ready);
        assert!(ctx.connected.current());
        assert_eq!(power.current(), PowerState::On);
        assert_eq!(socket.opened().len(), 1);
        assert_eq!(ctx.state.imsi(), Ok(230038123456789));
        assert!(ctx.state.conn().is_ok());
        assert_eq!(client.count("AT+CFUN=1"), 1);
        assert_eq!(ctx.metrics.snapshot().attach_count, 1);
        assert_eq!(
            ctx.attach_timeout().unwrap().attach_timeout,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn disabled_only_reacts_to_enable() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);

        for e in [FsmEvent::Timeout, FsmEvent::Registered, FsmEvent::Send] {
            event(&mut fsm, e);
        }
        assert_eq!(fsm.state(), FsmState::Disabled);
        assert!(client.commands().is_empty());
    }

    #[test]
    fn same_state_is_a_noop() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        client.clear();
        fsm.deadline = None;
        block_on(fsm.enter_state(FsmState::Ready));
        assert!(fsm.deadline.is_none());
        assert!(client.commands().is_empty());
    }

    #[test]
    fn attach_timeout_retries() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.delegate(FsmEvent::Enable);
        drain(&mut fsm);
        urc(&mut fsm, "%XSIM: 1");

        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::RetryDelay);
        assert_eq!(client.count("AT+CFUN=4"), 1);
        assert_eq!(ctx.metrics.snapshot().attach_fail_count, 1);
        // the first progressive attempt is retried right away
        assert!(remaining(&fsm) <= Duration::from_millis(1));

        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Prepare);
        assert_eq!(fsm.attach_attempt, 1);

        urc(&mut fsm, "%XSIM: 1");
        event(&mut fsm, FsmEvent::Timeout);
        event(&mut fsm, FsmEvent::Timeout);
        urc(&mut fsm, "%XSIM: 1");
        assert_eq!(fsm.state(), FsmState::Attach);
        assert_eq!(fsm.attach_attempt, 2);
        assert_eq!(
            ctx.attach_timeout().unwrap().attach_timeout,
            Duration::from_secs(50 * 60)
        );

        // the third attempt is followed by an hour of rest
        event(&mut fsm, FsmEvent::Timeout);
        assert!(remaining(&fsm) > Duration::from_secs(3590));

        event(&mut fsm, FsmEvent::Timeout);
        urc(&mut fsm, "%XSIM: 1");
        urc(&mut fsm, REGISTERED);
        assert_eq!(fsm.attach_attempt, 0);
        assert_eq!(fsm.state(), FsmState::Ready);
    }

    #[test]
    fn sim_reload_rearms_detection() {
        let ctx = LteContext::new();
        let client = MockAtClient::healthy().respond_once(
            "AT+CRSM=176",
            "+CRSM: 144,0,\"32F40132F402FFFFFFFFFFFF\"",
        );
        let (power, socket) = (MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.delegate(FsmEvent::Enable);
        drain(&mut fsm);

        urc(&mut fsm, "%XSIM: 1");
        assert_eq!(fsm.state(), FsmState::Prepare);
        assert!(remaining(&fsm) > Duration::from_secs(9));

        urc(&mut fsm, "%XSIM: 1");
        assert_eq!(fsm.state(), FsmState::Attach);
    }

    #[test]
    fn reset_loop_waits_and_restarts() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.delegate(FsmEvent::Enable);
        drain(&mut fsm);
        urc(&mut fsm, "%XSIM: 1");
        fsm.attach_attempt = 4;

        urc(&mut fsm, "%MDMEV: RESET LOOP");
        assert_eq!(fsm.state(), FsmState::ResetLoop);
        assert_eq!(fsm.attach_attempt, 0);
        assert!(remaining(&fsm) > Duration::from_secs(31 * 60));

        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Prepare);
        // stopped on the way out, started again in prepare
        assert_eq!(power.enables(), 2);
    }

    #[test]
    fn error_backs_off_on_failed_check() {
        let ctx = LteContext::new();
        let client = MockAtClient::healthy();
        let (power, socket) = (MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        let client = client.respond("AT+CEREG?", "+CEREG: 5,2");
        event(&mut fsm, FsmEvent::Error);
        assert_eq!(fsm.state(), FsmState::Error);
        assert_eq!(fsm.failures, 1);
        assert_eq!(fsm.resume, FsmState::Prepare);
        assert!(!ctx.connected.current());
        assert_eq!(power.current(), PowerState::Off);
        assert!(remaining(&fsm) > Duration::from_secs(9));

        // prepare fails as well, the next wait is longer
        let client = client.fail("AT%XSYSTEMMODE", Error::Transport);
        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Error);
        assert_eq!(fsm.failures, 2);
        assert!(remaining(&fsm) > Duration::from_secs(19));

        client
            .respond("AT%XSYSTEMMODE", "")
            .respond("AT+CEREG?", "+CEREG: 5,1,\"AF66\",\"009DE067\",7");
        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Prepare);
    }

    #[test]
    fn healthy_check_resumes_ready() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);
        fsm.failures = 3;

        event(&mut fsm, FsmEvent::Error);
        assert_eq!(fsm.resume, FsmState::Ready);
        assert_eq!(fsm.failures, 0);
        assert!(ctx.connected.current());

        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Ready);
    }

    #[test]
    fn socket_errors_reopen_then_escalate() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        socket.set_pending_error(Some(SocketError::Refused));
        for retry in 1..=SOCKET_RETRIES {
            event(&mut fsm, FsmEvent::Error);
            assert_eq!(fsm.state(), FsmState::Error);
            assert_eq!(fsm.socket_retries, retry);
            assert_eq!(fsm.resume, FsmState::OpenSocket);
            // go through error again without reopening
            fsm.state = FsmState::Ready;
        }

        event(&mut fsm, FsmEvent::Error);
        assert_eq!(fsm.resume, FsmState::Prepare);
        assert_eq!(fsm.failures, 1);
        assert_eq!(fsm.socket_retries, 0);
    }

    #[test]
    fn failed_leave_still_reaches_error() {
        let ctx = LteContext::new();
        let client = MockAtClient::healthy();
        let (power, socket) = (MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.delegate(FsmEvent::Enable);
        drain(&mut fsm);
        urc(&mut fsm, "%XSIM: 1");
        urc(&mut fsm, "%MDMEV: RESET LOOP");

        // stopping on the way out of the reset loop fails once
        client.clone().fail_once("AT+CFUN=0", Error::Transport);
        block_on(fsm.handle(FsmEvent::Error));
        assert_eq!(fsm.state(), FsmState::Error);
    }

    #[test]
    fn send_and_receive() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        socket.push_rx(Ok(b"pong".to_vec()));
        let id = ctx.request.publish(b"ping", 16, true).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert_eq!(fsm.state(), FsmState::Send);
        assert_eq!(socket.sent(), [b"ping".to_vec()]);

        urc(&mut fsm, "+CSCON: 1");
        assert_eq!(fsm.state(), FsmState::Ready);
        assert_eq!(block_on(ctx.request.wait(id)).unwrap().as_slice(), b"pong");

        let m = ctx.metrics.snapshot();
        assert_eq!((m.uplink_count, m.uplink_bytes), (1, 4));
        assert_eq!((m.downlink_count, m.downlink_bytes), (1, 4));
    }

    #[test]
    fn send_without_response_while_connected() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);
        urc(&mut fsm, "+CSCON: 1");

        client.clear();
        let id = ctx.request.publish(b"x", 0, false).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert_eq!(fsm.state(), FsmState::Ready);
        assert!(block_on(ctx.request.wait(id)).unwrap().is_empty());
        // went through connection evaluation
        assert_eq!(client.count("AT%CONEVAL"), 1);
    }

    #[test]
    fn send_failure_completes_request() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        socket.set_send_error(Some(SocketError::Refused));
        let id = ctx.request.publish(b"ping", 16, true).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert_eq!(
            block_on(ctx.request.wait(id)),
            Err(Error::Socket(SocketError::Refused))
        );
        assert_eq!(fsm.state(), FsmState::Error);
        assert_eq!(ctx.metrics.snapshot().uplink_errors, 1);
    }

    #[test]
    fn unconfirmed_send_times_out() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        let id = ctx.request.publish(b"ping", 16, true).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert!(remaining(&fsm) > Duration::from_secs(29));

        // the caller gives up before the modem confirms
        ctx.request.abandon(id);
        block_on(fsm.handle(FsmEvent::Timeout));
        assert_eq!(fsm.state(), FsmState::Ready);
        assert_eq!(ctx.metrics.snapshot().uplink_errors, 1);

        // ready retries the held request, send drops it
        drain(&mut fsm);
        assert_eq!(fsm.state(), FsmState::Ready);
        assert!(fsm.request.is_none());
        assert_eq!(ctx.metrics.snapshot().uplink_errors, 1);
        assert_eq!(socket.sent().len(), 1);
    }

    #[test]
    fn psm_refusal_turns_radio_off() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);
        urc(
            &mut fsm,
            "+CEREG: 1,\"AF66\",\"009DE067\",7,,,\"11100000\",\"00111000\"",
        );

        client.clear();
        event(&mut fsm, FsmEvent::Timeout);
        assert!(fsm.radio_off);
        assert_eq!(client.count("AT+CFUN=4"), 1);

        // deregistration is expected now
        urc(&mut fsm, "+CEREG: 0");
        assert_eq!(fsm.state(), FsmState::Ready);

        ctx.request.publish(b"ping", 0, false).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert!(!fsm.radio_off);
        assert_eq!(fsm.state(), FsmState::Attach);
        assert_eq!(client.count("AT+CFUN=1"), 1);
    }

    #[test]
    fn modem_sleep_and_wake() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        urc(&mut fsm, "%XMODEMSLEEP: 1,3600000");
        assert_eq!(fsm.state(), FsmState::Sleep);
        assert!(fsm.deadline.is_none());

        ctx.request.publish(b"ping", 0, false).unwrap();
        event(&mut fsm, FsmEvent::Send);
        assert_eq!(fsm.state(), FsmState::Send);
    }

    #[test]
    fn cell_measurement() {
        struct Counter(AtomicU32);

        impl LteObserver for Counter {
            fn on_event(&self, event: LteEvent) {
                if event == LteEvent::NcellMeasDone {
                    self.0.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        static DONE: Counter = Counter(AtomicU32::new(0));

        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.add_observer(&DONE).unwrap();
        connect(&mut fsm);

        ctx.ncellmeas_requested.store(true, Ordering::Relaxed);
        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Ncellmeas);
        assert_eq!(client.count("AT%NCELLMEAS=5,5"), 1);

        urc(
            &mut fsm,
            "%NCELLMEAS: 0,\"00011B07\",\"26295\",\"00B7\",10512,9034,2300,7,63,31,150344527,1,0",
        );
        assert_eq!(fsm.state(), FsmState::Ready);
        assert_eq!(DONE.0.load(Ordering::Relaxed), 1);
        assert!(!ctx.ncellmeas_requested.load(Ordering::Relaxed));
        assert!(ctx.state.ncellmeas().is_ok());
        assert_eq!(client.count("AT%NCELLMEASSTOP"), 0);

        // a measurement that never completes is stopped
        ctx.ncellmeas_requested.store(true, Ordering::Relaxed);
        urc(&mut fsm, "+CSCON: 0");
        assert_eq!(fsm.state(), FsmState::Ncellmeas);
        event(&mut fsm, FsmEvent::Timeout);
        assert_eq!(fsm.state(), FsmState::Ready);
        assert_eq!(client.count("AT%NCELLMEASSTOP"), 1);
    }

    #[test]
    fn loopback_skips_socket() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        ctx.set_socket_config(SocketConfig {
            addr: Ipv4Addr::LOCALHOST,
            ..SocketConfig::default()
        });

        connect(&mut fsm);
        assert!(socket.opened().is_empty());
        assert!(ctx.connected.current());
    }

    #[test]
    fn pump_raises_timeout() {
        let ctx = LteContext::new();
        let (client, power, socket) = (MockAtClient::healthy(), MockPower::new(), MockSocket::new());
        let mut fsm = fsm(&ctx, &client, &power, &socket);
        connect(&mut fsm);

        fsm.state = FsmState::Coneval;
        fsm.arm(Duration::from_millis(5));
        block_on(fsm.pump()).unwrap();
        assert_eq!(fsm.state(), FsmState::Ready);
    }
}
