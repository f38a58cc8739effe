//! The application facing handle of the connection manager.

use core::sync::atomic::Ordering;

use embassy_time::{with_timeout, Duration, Instant};
use heapless::String;

use crate::{
    at_command::{CeregParam, ConnEvalParam, NcellMeasParam, RaiParam},
    config::{LteConfig, SocketConfig},
    fsm::{policy::AttachTimeout, Fsm, FsmEvent, FsmState},
    log,
    modem::{Flow, LteContext, Metrics, UrcPump, SEND_RECV_MAX},
    AtClient, DataSocket, Error, ModemPower, UrcSource,
};

/// Notifications delivered to [LteObserver]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LteEvent {
    /// The radio left RRC connected mode.
    Cscon0,
    /// The radio entered RRC connected mode.
    Cscon1,
    /// A neighbor cell measurement finished, see [Lte::ncellmeas_param].
    NcellMeasDone,
}

/// Receives [LteEvent]s. Called from the state machine task, so it must not block.
pub trait LteObserver: Sync {
    fn on_event(&self, event: LteEvent);
}

#[derive(Clone, Copy)]
pub struct Lte<'c> {
    ctx: &'c LteContext,
}

impl<'c> Lte<'c> {
    /// Create the connection manager.
    ///
    /// Returns the API handle along with the state machine and the URC pump, which must both
    /// be pumped for anything to happen. [crate::spawn_lte] does that for you.
    pub fn new<A, P, S, U>(
        ctx: &'c LteContext,
        client: A,
        power: P,
        socket: S,
        urcs: U,
        config: LteConfig,
    ) -> (Lte<'c>, Fsm<'c, A, P, S>, UrcPump<'c, U>)
    where
        A: AtClient,
        P: ModemPower,
        S: DataSocket,
        U: UrcSource,
    {
        log::info!("attach policy: {:?}", config.attach_policy);
        let flow = Flow::new(ctx, client, power, socket, config);
        (Lte { ctx }, Fsm::new(ctx, flow), UrcPump::new(ctx, urcs))
    }

    /// Start connecting to `socket`. Calling this again only updates the socket target, which
    /// takes effect the next time the socket is opened.
    pub fn enable(&self, socket: SocketConfig) {
        self.ctx.set_socket_config(socket);
        if self.ctx.enabled.swap(true, Ordering::Relaxed) {
            log::debug!("already enabled");
            return;
        }
        self.ctx.delegate(FsmEvent::Enable);
    }

    /// Wait until the network is attached and the socket is open.
    pub async fn wait_for_connected(&self, timeout: Duration) -> Result<(), Error> {
        with_timeout(timeout, self.ctx.connected.compare_wait(|connected| *connected)).await?;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.ctx.connected.current()
    }

    /// Send `send` and, if `recv` is given, wait for one datagram in response.
    ///
    /// Only one exchange runs at a time; other callers wait for their turn within `timeout`.
    /// Returns the number of bytes written to `recv`. On [Error::Timeout], `recv` is left
    /// untouched.
    pub async fn send_recv(
        &self,
        send: &[u8],
        recv: Option<&mut [u8]>,
        rai: bool,
        timeout: Duration,
    ) -> Result<usize, Error> {
        let deadline = Instant::now() + timeout;
        let remaining = || deadline.saturating_duration_since(Instant::now());

        let _guard = with_timeout(remaining(), self.ctx.send_recv_lock.lock())
            .await
            .map_err(|_| {
                log::warn!("send_recv is busy");
                Error::Timeout
            })?;

        let recv_size = recv.as_ref().map_or(0, |buf| buf.len().min(SEND_RECV_MAX));
        let id = self.ctx.request.publish(send, recv_size, rai)?;
        self.ctx.delegate(FsmEvent::Send);

        let data = match with_timeout(remaining(), self.ctx.request.wait(id)).await {
            Ok(result) => result?,
            Err(_) => {
                log::warn!("send_recv timed out");
                self.ctx.request.abandon(id);
                self.ctx.delegate(FsmEvent::Timeout);
                return Err(Error::Timeout);
            }
        };

        match recv {
            Some(buf) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    pub fn imei(&self) -> Result<u64, Error> {
        self.ctx.state.imei()
    }

    pub fn imsi(&self) -> Result<u64, Error> {
        self.ctx.state.imsi()
    }

    pub fn iccid(&self) -> Result<String<22>, Error> {
        self.ctx.state.iccid()
    }

    pub fn modem_fw_version(&self) -> Result<String<32>, Error> {
        self.ctx.state.fw_version()
    }

    /// The last connection evaluation.
    pub fn conn_param(&self) -> Result<ConnEvalParam, Error> {
        self.ctx.state.conn()
    }

    pub fn cereg_param(&self) -> Result<CeregParam, Error> {
        self.ctx.state.cereg()
    }

    pub fn rai_param(&self) -> Result<RaiParam, Error> {
        self.ctx.state.rai()
    }

    pub fn ncellmeas_param(&self) -> Result<NcellMeasParam, Error> {
        self.ctx.state.ncellmeas()
    }

    pub fn get_metrics(&self) -> Metrics {
        self.ctx.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.ctx.metrics.reset();
    }

    pub fn fsm_state(&self) -> FsmState {
        self.ctx.fsm_state()
    }

    /// Timeouts of the current, or last, attach attempt.
    pub fn curr_attach_timeout(&self) -> Option<AttachTimeout> {
        self.ctx.attach_timeout()
    }

    /// Measure neighbor cells the next time the radio is idle.
    pub fn schedule_ncellmeas(&self) {
        self.ctx.ncellmeas_requested.store(true, Ordering::Relaxed);
        if self.ctx.fsm_state() == FsmState::Sleep {
            self.ctx.delegate(FsmEvent::Ready);
        }
    }

    pub fn add_callback(&self, observer: &'static dyn LteObserver) -> Result<(), Error> {
        self.ctx.add_observer(observer)
    }

    pub fn remove_callback(&self, observer: &'static dyn LteObserver) -> Result<(), Error> {
        self.ctx.remove_observer(observer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Timings;
    use crate::mock::{MockAtClient, MockPower, MockSocket, MockUrcSource};
    use crate::pump::Pump;
    use embassy_futures::join::join;
    use embassy_futures::select::{select, Either};
    use futures::executor::block_on;

    type Parts<'c> = (
        Lte<'c>,
        Fsm<'c, MockAtClient, MockPower, MockSocket>,
        UrcPump<'c, MockUrcSource>,
    );

    fn lte<'c>(ctx: &'c LteContext, socket: &MockSocket, urcs: &[&str]) -> Parts<'c> {
        let config = LteConfig {
            timings: Timings {
                radio_settle: Duration::from_millis(1),
                send_settle: Duration::from_millis(1),
                recv_settle: Duration::from_millis(1),
            },
            ..LteConfig::default()
        };
        Lte::new(
            ctx,
            MockAtClient::healthy(),
            MockPower::new(),
            socket.clone(),
            MockUrcSource::new(urcs),
            config,
        )
    }

    fn queued(ctx: &LteContext) -> std::vec::Vec<FsmEvent> {
        let mut events = std::vec::Vec::new();
        while let Ok(event) = ctx.events.try_receive() {
            events.push(event);
        }
        events
    }

    #[test]
    fn enable_is_idempotent() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        lte.enable(SocketConfig::default());
        lte.enable(SocketConfig {
            port: 6000,
            ..SocketConfig::default()
        });

        assert_eq!(queued(&ctx), [FsmEvent::Enable]);
        assert_eq!(ctx.socket_config().unwrap().port, 6000);
    }

    #[test]
    fn connect_and_exchange() {
        let ctx = LteContext::new();
        let socket = MockSocket::new();
        let urcs = ["%XSIM: 1", "+CEREG: 1,\"AF66\",\"009DE067\",7", "+CSCON: 1"];
        let (lte, mut fsm, mut urc_pump) = lte(&ctx, &socket, &urcs);

        lte.enable(SocketConfig::default());
        for _ in urcs {
            block_on(urc_pump.pump()).unwrap();
        }
        assert_eq!(block_on(urc_pump.pump()), Err(Error::Transport));

        socket.push_rx(Ok(b"pong".to_vec()));

        let dispatcher = async {
            loop {
                fsm.pump().await.ok();
            }
        };
        let app = async {
            lte.wait_for_connected(Duration::from_secs(5)).await?;
            let mut buf = [0u8; 16];
            let n = lte
                .send_recv(b"ping", Some(&mut buf), true, Duration::from_secs(5))
                .await?;
            Ok::<_, Error>(std::vec::Vec::from(&buf[..n]))
        };

        let Either::Second(received) = block_on(select(dispatcher, app)) else {
            unreachable!()
        };
        assert_eq!(received.unwrap(), b"pong");
        assert!(lte.is_attached());
        assert_eq!(socket.sent(), [b"ping".to_vec()]);
        assert_eq!(lte.imei(), Ok(352656100367872));
        assert_eq!(lte.modem_fw_version().unwrap().as_str(), "nrf91x1_2.0.2");
        assert_eq!(lte.get_metrics().uplink_count, 1);
        assert_ne!(lte.fsm_state(), FsmState::Disabled);
    }

    #[test]
    fn send_recv_times_out() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        let mut buf = [0xAAu8; 4];
        let result = block_on(lte.send_recv(
            b"ping",
            Some(&mut buf),
            false,
            Duration::from_millis(10),
        ));
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(buf, [0xAA; 4]);
        assert_eq!(queued(&ctx), [FsmEvent::Send, FsmEvent::Timeout]);

        // the request was withdrawn, and a late completion is discarded
        assert!(!ctx.request.has_pending());
        assert!(!ctx.request.complete(0, Ok(Default::default())));
    }

    #[test]
    fn one_exchange_at_a_time() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        let _busy = block_on(ctx.send_recv_lock.lock());
        let result = block_on(lte.send_recv(b"ping", None, false, Duration::from_millis(10)));
        assert_eq!(result, Err(Error::Timeout));
        assert!(queued(&ctx).is_empty());
    }

    #[test]
    fn concurrent_callers_take_turns() {
        let ctx = LteContext::new();
        let socket = MockSocket::new();
        let urcs = ["%XSIM: 1", "+CEREG: 1,\"AF66\",\"009DE067\",7", "+CSCON: 1"];
        let (lte, mut fsm, mut urc_pump) = lte(&ctx, &socket, &urcs);

        lte.enable(SocketConfig::default());
        for _ in urcs {
            block_on(urc_pump.pump()).unwrap();
        }
        socket.push_rx(Ok(b"one".to_vec()));
        socket.push_rx(Ok(b"two".to_vec()));

        let exchange = |payload: &'static [u8]| async move {
            let mut buf = [0u8; 8];
            let n = lte
                .send_recv(payload, Some(&mut buf), false, Duration::from_secs(5))
                .await?;
            Ok::<_, Error>(std::vec::Vec::from(&buf[..n]))
        };
        let dispatcher = async {
            loop {
                fsm.pump().await.ok();
            }
        };
        let app = async {
            lte.wait_for_connected(Duration::from_secs(5)).await?;
            Ok::<_, Error>(join(exchange(b"a"), exchange(b"b")).await)
        };

        let Either::Second(result) = block_on(select(dispatcher, app)) else {
            unreachable!()
        };
        let (first, second) = result.unwrap();
        assert_eq!(first.unwrap(), b"one");
        assert_eq!(second.unwrap(), b"two");
        assert_eq!(socket.sent(), [b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(lte.get_metrics().uplink_count, 2);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        let payload = [0u8; SEND_RECV_MAX + 1];
        let result = block_on(lte.send_recv(&payload, None, false, Duration::from_secs(1)));
        assert_eq!(result, Err(Error::BufferOverflow));
    }

    #[test]
    fn accessors_before_connecting() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        assert_eq!(lte.imsi(), Err(Error::NoData));
        assert_eq!(lte.iccid(), Err(Error::NoData));
        assert!(lte.conn_param().is_err());
        assert!(lte.cereg_param().is_err());
        assert!(lte.rai_param().is_err());
        assert!(lte.ncellmeas_param().is_err());
        assert!(lte.curr_attach_timeout().is_none());
        assert_eq!(lte.fsm_state().as_str(), "disabled");
        assert!(!lte.is_attached());
        assert_eq!(
            block_on(lte.wait_for_connected(Duration::from_millis(5))),
            Err(Error::Timeout)
        );

        ctx.metrics.uplink(3, Instant::now());
        lte.reset_metrics();
        assert_eq!(lte.get_metrics(), Metrics::EMPTY);
    }

    #[test]
    fn ncellmeas_wakes_sleeping_modem() {
        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        lte.schedule_ncellmeas();
        assert!(queued(&ctx).is_empty());

        ctx.set_fsm_state(FsmState::Sleep);
        lte.schedule_ncellmeas();
        assert_eq!(queued(&ctx), [FsmEvent::Ready]);
        assert!(ctx.ncellmeas_requested.load(Ordering::Relaxed));
    }

    #[test]
    fn callbacks() {
        struct Ignore;

        impl LteObserver for Ignore {
            fn on_event(&self, _event: LteEvent) {}
        }

        static OBSERVER: Ignore = Ignore;

        let ctx = LteContext::new();
        let (lte, _, _) = lte(&ctx, &MockSocket::new(), &[]);

        lte.add_callback(&OBSERVER).unwrap();
        assert_eq!(lte.add_callback(&OBSERVER), Err(Error::CallbackExists));
        lte.remove_callback(&OBSERVER).unwrap();
        assert_eq!(lte.remove_callback(&OBSERVER), Err(Error::CallbackNotFound));
    }
}
