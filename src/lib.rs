#![cfg_attr(not(test), no_std)]
#![allow(clippy::single_component_path_imports)]
// large enum variants are unavoidable in no_std, since we can't box things
#![allow(clippy::large_enum_variant, clippy::result_large_err)]

pub mod at_command;
pub mod config;
mod error;
pub mod fsm;
pub mod lte;
pub mod modem;
pub mod pump;
mod util;

#[cfg(test)]
mod mock;

pub use util::*;

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("'log' and 'defmt' features are mutually exclusive");
#[cfg(not(any(feature = "log", feature = "defmt")))]
compile_error!("please enable a logging feature, e.g. 'log' or 'defmt'");
#[cfg(feature = "defmt")]
pub(crate) use defmt as log;
#[cfg(feature = "log")]
pub(crate) use log;

pub use config::{LteConfig, SocketConfig};
pub use error::{CheckError, Error, SocketError};
pub use fsm::{FsmEvent, FsmState};
pub use lte::{Lte, LteEvent, LteObserver};
pub use modem::LteContext;

use core::{future::Future, net::SocketAddrV4};

use at_command::AtText;
use embassy_time::Duration;

/// The AT command channel to the modem firmware.
///
/// This is the only way the connection manager talks to the modem. Implementations send one
/// command line, wait for the final result code, and return the information text that came
/// before `OK`. An `ERROR`, `+CME ERROR` or `+CMS ERROR` result maps to [Error::Sim], a broken
/// link to [Error::Transport].
pub trait AtClient {
    fn send(&mut self, command: &str) -> impl Future<Output = Result<AtText, Error>>;
}

/// A source of unsolicited lines from the modem, see [modem::UrcPump].
pub trait UrcSource {
    fn next_line(&mut self) -> impl Future<Output = Result<AtText, Error>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    On,
    Off,
}

/// Start and stop the modem library. Both must be no-ops when already in the requested state.
pub trait ModemPower {
    fn enable(&mut self) -> impl Future<Output = Result<(), Error>>;

    fn disable(&mut self) -> impl Future<Output = Result<(), Error>>;

    fn state(&mut self) -> PowerState;
}

/// Release assistance indication, a hint to the network about upcoming traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rai {
    /// This is the last packet, the connection can be released.
    Last,
    /// One response is expected after this packet.
    OneResponse,
    /// No more data is expected.
    NoData,
}

/// Parameters of the data socket, applied on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketOptions {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub remote: SocketAddrV4,
    /// Bind to this PDN context, if set.
    pub pdn_cid: Option<u8>,
    pub dtls: bool,
    /// Ask the modem to resume a cached DTLS session instead of a full handshake.
    pub resume_session: bool,
    pub send_timeout: Duration,
    pub recv_timeout: Duration,
}

/// The single connected UDP socket used for application data.
pub trait DataSocket {
    /// Open the socket, apply `options` and connect to the remote. Closes any open socket first.
    fn open(&mut self, options: &SocketOptions) -> impl Future<Output = Result<(), SocketError>>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// The pending socket level error, if any.
    fn pending_error(&mut self) -> Result<(), SocketError>;

    fn set_rai(&mut self, rai: Rai) -> Result<(), SocketError>;

    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<usize, SocketError>>;

    /// Receive one datagram. Returns `Ok(0)` if the peer closed the connection.
    fn recv(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<usize, SocketError>>;
}

/// This macro sets up the connection manager, statically allocating its context and spawning
/// the state machine and URC pump tasks.
///
/// You can call [Lte::new] directly if you want more control over initialization.
#[macro_export]
macro_rules! spawn_lte {
    (
        $spawner:expr,
        $client_ty:ty as $client:expr,
        $power_ty:ty as $power:expr,
        $socket_ty:ty as $socket:expr,
        $urc_ty:ty as $urcs:expr,
        $config:expr $(,)?
    ) => {{
        static CONTEXT: ::lte_modem_async::LteContext = ::lte_modem_async::LteContext::new();

        let spawner: &::embassy_executor::Spawner = $spawner;
        let (lte, fsm, urc_pump) =
            ::lte_modem_async::Lte::new(&CONTEXT, $client, $power, $socket, $urcs, $config);

        mod __tasks {
            use super::*;
            use ::lte_modem_async::pump_task;
            pump_task!(
                fsm_pump,
                ::lte_modem_async::fsm::Fsm<'static, $client_ty, $power_ty, $socket_ty>
            );
            pump_task!(urc_pump, ::lte_modem_async::modem::UrcPump<'static, $urc_ty>);
        }

        spawner.must_spawn(__tasks::fsm_pump(fsm));
        spawner.must_spawn(__tasks::urc_pump(urc_pump));

        lte
    }};
}
