//! Ordered AT command sequences behind each step of the connection lifecycle.

use embassy_time::{Duration, Timer};

use super::{CommandRunner, LteContext, Payload, SendRecvRequest};
use crate::{
    at_command::{
        cereg, cfun, cgact, cgatt, cgauth, cgdcont, cimi, coneval, cops, cpsms, crsm, gsn,
        ncellmeas, rai, reporting, version, xbandlock, xiccid, xmodemsleep, xmodemtrace,
        xsystemmode, ConnEvalResult,
    },
    config::LteConfig,
    log, AtClient, CheckError, DataSocket, Error, ModemPower, PowerState, Rai, SocketError,
    SocketOptions,
};

pub use cfun::FunctionalMode;

/// Requested periodic TAU (T3412 extended), 24 hours.
const PSM_PERIODIC_TAU: &str = "00111000";
/// Requested active time (T3324), 0 seconds.
const PSM_ACTIVE_TIME: &str = "00000000";

pub const SOCKET_SEND_TIMEOUT: Duration = Duration::from_secs(30);
pub const SOCKET_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between the two functional mode changes that reload the SIM.
const SIM_RELOAD_DELAY: Duration = Duration::from_millis(100);
const SIM_INFO_ATTEMPTS: usize = 10;

/// Outcome of the forbidden network check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FplmnStatus {
    Clean,
    /// The list was erased and the SIM reloaded, the step must be repeated.
    Retry,
}

pub struct Flow<'c, A, P, S> {
    ctx: &'c LteContext,
    commands: CommandRunner<A>,
    power: P,
    socket: S,
    config: LteConfig,
    /// A DTLS session was established before and may be resumed.
    dtls_resume: bool,
}

impl<'c, A: AtClient, P: ModemPower, S: DataSocket> Flow<'c, A, P, S> {
    pub fn new(ctx: &'c LteContext, client: A, power: P, socket: S, config: LteConfig) -> Self {
        Flow {
            ctx,
            commands: CommandRunner::new(client),
            power,
            socket,
            config,
            dtls_resume: false,
        }
    }

    pub fn config(&self) -> &LteConfig {
        &self.config
    }

    /// Start the modem library. Does nothing if it is already running.
    pub async fn start(&mut self) -> Result<(), Error> {
        if self.power.state() == PowerState::On {
            return Ok(());
        }

        log::info!("starting modem");
        self.power.enable().await?;
        self.commands
            .run(xmodemtrace::SetModemTrace(self.config.modemtrace))
            .await?;
        Ok(())
    }

    /// Power off the radio and stop the modem library. Does nothing if it is already stopped.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if self.power.state() == PowerState::Off {
            return Ok(());
        }

        log::info!("stopping modem");
        self.socket.close();
        self.commands
            .run(cfun::SetFunctionalMode(FunctionalMode::PowerOff))
            .await?;
        self.power.disable().await
    }

    /// Configure the modem for the next attach. Any failing command aborts the sequence.
    pub async fn prepare(&mut self) -> Result<(), Error> {
        let c = &mut self.commands;
        let config = &self.config;

        c.run(cfun::SetFunctionalMode(FunctionalMode::PowerOff))
            .await?;

        let imei = c.run(gsn::GetImei).await?;
        log::info!("IMEI: {}", imei.0);
        self.ctx.state.set_imei(imei.0);

        let hw = c.run(version::GetHwVersion).await?;
        log::info!("hardware version: {}", hw.0.as_str());
        let fw = c.run(version::GetFwVersion).await?;
        log::info!("firmware version: {}", fw.0.as_str());
        self.ctx.state.set_fw_version(fw.0);

        c.run(reporting::EnablePowerOffWarning).await?;
        c.run(reporting::SetHighTemperatureLevel).await?;
        c.run(reporting::EnableTemperatureUrc).await?;

        c.run(xsystemmode::SetSystemMode {
            lte_m: config.mode.lte_m(),
            nb_iot: config.mode.nb_iot(),
            preference: config.mode.preference(),
        })
        .await?;

        c.run(reporting::DisableExtendedPco).await?;
        c.run(reporting::SetDataProfile).await?;

        match config.bands.bitstring() {
            Some(bits) => c.run(xbandlock::SetBandLock::Permanent(&bits)).await?,
            None => c.run(xbandlock::SetBandLock::Disabled).await?,
        };

        c.run(reporting::EnableSimUrc).await?;
        c.run(reporting::EnableNetworkTimeUrc).await?;
        c.run(reporting::EnableModemEvents).await?;
        c.run(rai::ConfigureRai::EnableWithUrc).await?;
        c.run(cpsms::RequestPsm {
            periodic_tau: PSM_PERIODIC_TAU,
            active_time: PSM_ACTIVE_TIME,
        })
        .await?;
        c.run(reporting::SetPowerPreference).await?;
        c.run(cereg::ConfigureRegistrationUrc::EnableRegLocationCausePsm)
            .await?;
        c.run(reporting::EnablePacketDomainEvents).await?;
        c.run(reporting::EnableNumericErrors).await?;
        c.run(reporting::EnableNetworkErrorReporting).await?;
        c.run(reporting::EnableSignallingUrc).await?;

        match config.network {
            Some(plmn) => c.run(cops::SelectOperator::Manual(plmn)).await?,
            None => c.run(cops::SelectOperator::Automatic).await?,
        };

        c.run(xmodemsleep::ConfigureModemSleepUrc {
            warning_time_ms: 500,
            threshold_ms: 10240,
        })
        .await?;

        c.run(cgdcont::DefinePdpContext {
            cid: 0,
            pdn_type: "IP",
            apn: &config.apn,
        })
        .await?;

        c.run(cgauth::SetPdpAuth {
            cid: 0,
            protocol: config.auth,
            username: &config.username,
            password: &config.password,
        })
        .await?;

        Ok(())
    }

    pub async fn cfun(&mut self, mode: FunctionalMode) -> Result<(), Error> {
        self.commands.run(cfun::SetFunctionalMode(mode)).await?;
        Ok(())
    }

    /// Read and store the IMSI and ICCID.
    ///
    /// The SIM may answer with a partial IMSI right after it is detected, so the IMSI is only
    /// accepted once two consecutive reads agree.
    pub async fn sim_info(&mut self) -> Result<(), Error> {
        let mut previous = 0;
        let mut imsi = None;
        for _ in 0..SIM_INFO_ATTEMPTS {
            let read = self.commands.run(cimi::GetImsi).await?.0;
            if read != 0 && read == previous {
                imsi = Some(read);
                break;
            }
            previous = read;
        }

        let Some(imsi) = imsi else {
            log::error!("IMSI reads never agreed");
            return Err(Error::NoData);
        };
        log::info!("IMSI: {}", imsi);
        self.ctx.state.set_imsi(imsi);

        let iccid = match self.commands.run(xiccid::GetIccid).await {
            Ok(iccid) => iccid.0,
            Err(Error::Parse(_)) => return Err(Error::InvalidIccid),
            Err(e) => return Err(e),
        };
        log::info!("ICCID: {}", iccid.as_str());
        self.ctx.state.set_iccid(iccid);

        Ok(())
    }

    /// Erase the forbidden network list of the SIM if it isn't empty.
    pub async fn sim_fplmn(&mut self) -> Result<FplmnStatus, Error> {
        let fplmn = self.commands.run(crsm::ReadForbiddenPlmns).await?;
        if fplmn.is_fplmn_empty() {
            return Ok(FplmnStatus::Clean);
        }

        log::warn!("found forbidden networks {}, erasing", fplmn.data.as_str());
        if let Err(e) = self.commands.run(crsm::EraseForbiddenPlmns).await {
            log::warn!("erasing forbidden networks is not supported: {:?}", e);
            return Ok(FplmnStatus::Clean);
        }

        self.cfun(FunctionalMode::Offline).await?;
        Timer::after(SIM_RELOAD_DELAY).await;
        self.cfun(FunctionalMode::Normal).await?;

        Ok(FplmnStatus::Retry)
    }

    /// Probe whether the connection is usable right now.
    pub async fn check(&mut self) -> Result<(), CheckError> {
        let c = &mut self.commands;

        let mode = c
            .run(cfun::GetFunctionalMode)
            .await
            .map_err(|_| CheckError::Command)?;
        if !mode.is_normal() {
            log::error!("unexpected functional mode {}", mode.0);
            return Err(CheckError::NotFunctional);
        }

        let report = c
            .run(cereg::GetRegistrationStatus)
            .await
            .map_err(|_| CheckError::Command)?;
        if report.reporting == 0 {
            log::error!("registration notifications are not subscribed");
            return Err(CheckError::NotSubscribed);
        }
        let registered = report.registration.stat.is_registered();
        self.ctx.state.set_cereg(report.registration);
        if !registered {
            return Err(CheckError::NotRegistered);
        }

        let attach = c
            .run(cgatt::GetAttachState)
            .await
            .map_err(|_| CheckError::Command)?;
        if !attach.attached {
            return Err(CheckError::NotAttached);
        }

        let activation = c
            .run(cgact::GetPdpActivation)
            .await
            .map_err(|_| CheckError::Command)?;
        if !activation.is_active(0) {
            return Err(CheckError::NotConnected);
        }

        if self.is_loopback() {
            return Ok(());
        }

        if !self.socket.is_open() {
            log::error!("socket is not open");
            return Err(CheckError::NoSocket);
        }
        if let Err(e) = self.socket.pending_error() {
            log::error!("socket error: {:?}", e);
            return Err(CheckError::SocketError);
        }

        Ok(())
    }

    fn is_loopback(&self) -> bool {
        self.ctx
            .socket_config()
            .is_some_and(|config| config.is_loopback())
    }

    /// Resolve the PDN context and open the data socket to the configured target.
    pub async fn open_socket(&mut self) -> Result<(), Error> {
        let target = self.ctx.socket_config().unwrap_or_default();

        match self.commands.run(cops::GetOperatorInfo).await {
            Ok(info) => log::info!(
                "operator: {}",
                info.operator.as_ref().map(|o| o.as_str()).unwrap_or("none")
            ),
            Err(e) => log::warn!("operator query failed: {:?}", e),
        }

        let contexts = self.commands.run(cgdcont::GetPdpContexts).await?;
        let context = contexts.usable().ok_or_else(|| {
            log::error!("no usable PDN context");
            Error::NoPdnContext
        })?;
        log::info!(
            "PDN context {}: {} {}",
            context.cid,
            context.apn.as_str(),
            context.addr.as_str()
        );

        let options = SocketOptions {
            remote: target.remote(),
            pdn_cid: (context.cid > 0).then_some(context.cid),
            dtls: target.dtls,
            resume_session: target.dtls && self.dtls_resume,
            send_timeout: SOCKET_SEND_TIMEOUT,
            recv_timeout: SOCKET_RECV_TIMEOUT,
        };

        self.socket.open(&options).await?;
        if target.dtls {
            self.dtls_resume = true;
        }
        log::info!("socket connected");
        Ok(())
    }

    /// Send the whole request payload, signalling RAI if requested.
    pub async fn send(&mut self, request: &SendRecvRequest) -> Result<(), Error> {
        if request.rai {
            self.socket.set_rai(if request.expects_response() {
                Rai::OneResponse
            } else {
                Rai::Last
            })?;
        }

        let mut sent = 0;
        while sent < request.send.len() {
            let rest = &request.send[sent..];
            match self.socket.send(rest).await? {
                0 => return Err(SocketError::Closed.into()),
                n => sent += n.min(rest.len()),
            }
        }

        if request.rai && !request.expects_response() {
            self.socket.set_rai(Rai::NoData)?;
        }

        log::info!("sent {} bytes", sent);
        Ok(())
    }

    /// Receive the response of a request.
    pub async fn recv(&mut self, request: &SendRecvRequest) -> Result<Payload, Error> {
        let mut payload = Payload::new();
        payload
            .resize_default(request.recv_size.min(payload.capacity()))
            .map_err(|_| Error::BufferOverflow)?;

        let n = self.socket.recv(&mut payload, SOCKET_RECV_TIMEOUT).await?;
        let n = n.min(payload.len());
        if n == 0 {
            log::error!("connection closed by the peer");
            return Err(SocketError::Closed.into());
        }
        log::info!("received {} bytes", n);

        if request.rai {
            if let Err(e) = self.socket.set_rai(Rai::NoData) {
                log::warn!("setting RAI failed: {:?}", e);
            }
        }

        payload.truncate(n);
        Ok(payload)
    }

    /// Evaluate the connection and store the result.
    pub async fn coneval(&mut self) -> Result<(), Error> {
        let conn = self.commands.run(coneval::EvaluateConnection).await?;
        if conn.result != ConnEvalResult::Success {
            log::warn!("connection evaluation: {}", conn.result.description());
        }
        self.ctx.state.set_conn(conn);
        Ok(())
    }

    pub async fn ncellmeas_start(&mut self) -> Result<(), Error> {
        self.commands
            .run(ncellmeas::StartCellMeasurement {
                search_type: 5,
                gci_count: 5,
            })
            .await?;
        Ok(())
    }

    pub async fn ncellmeas_stop(&mut self) -> Result<(), Error> {
        self.commands.run(ncellmeas::StopCellMeasurement).await?;
        Ok(())
    }
}
