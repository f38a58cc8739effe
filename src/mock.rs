//! Scripted collaborators for host tests.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    string::String,
    vec::Vec,
};

use embassy_time::Duration;

use crate::{
    at_command::AtText, AtClient, DataSocket, Error, ModemPower, PowerState, Rai, SocketError,
    SocketOptions, UrcSource,
};

struct Rule {
    prefix: String,
    reply: Result<String, Error>,
    once: bool,
}

#[derive(Default)]
struct AtScript {
    rules: Vec<Rule>,
    log: Vec<String>,
}

/// An [AtClient] that answers by command prefix and records every command.
///
/// One-shot replies are used first, in the order they were added. Among the persistent
/// replies the one added last wins, so a test can override a single answer of
/// [MockAtClient::healthy]. Commands without a matching rule succeed with no text.
#[derive(Clone, Default)]
pub struct MockAtClient {
    script: Rc<RefCell<AtScript>>,
}

impl MockAtClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every query the way a registered modem with an active PDN context does.
    pub fn healthy() -> Self {
        MockAtClient::new()
            .respond("AT+CGSN=1", "+CGSN: \"352656100367872\"")
            .respond("AT%HWVERSION", "%HWVERSION: nRF9151 LACA A0A")
            .respond("AT%SHORTSWVER", "%SHORTSWVER: nrf91x1_2.0.2")
            .respond("AT+CIMI", "230038123456789")
            .respond("AT%XICCID", "%XICCID: 8942310222000123456F")
            .respond("AT+CRSM=176", "+CRSM: 144,0,\"FFFFFFFFFFFFFFFFFFFFFFFF\"")
            .respond("AT+CFUN?", "+CFUN: 1")
            .respond("AT+CEREG?", "+CEREG: 5,1,\"AF66\",\"009DE067\",7")
            .respond("AT+CGATT?", "+CGATT: 1")
            .respond("AT+CGACT?", "+CGACT: 0,1")
            .respond("AT+COPS?", "+COPS: 0,2,\"23003\",7")
            .respond(
                "AT+CGDCONT?",
                "+CGDCONT: 0,\"IP\",\"iot.1nce.net\",\"10.52.2.149\",0,0",
            )
            .respond(
                "AT%CONEVAL",
                "%CONEVAL: 0,1,7,68,29,47,\"000AE520\",\"23003\",135,6447,20,0,0,14,2,1,99",
            )
    }

    fn rule(self, prefix: &str, reply: Result<String, Error>, once: bool) -> Self {
        self.script.borrow_mut().rules.push(Rule {
            prefix: prefix.into(),
            reply,
            once,
        });
        self
    }

    pub fn respond(self, prefix: &str, text: &str) -> Self {
        self.rule(prefix, Ok(text.into()), false)
    }

    pub fn respond_once(self, prefix: &str, text: &str) -> Self {
        self.rule(prefix, Ok(text.into()), true)
    }

    pub fn fail(self, prefix: &str, error: Error) -> Self {
        self.rule(prefix, Err(error), false)
    }

    pub fn fail_once(self, prefix: &str, error: Error) -> Self {
        self.rule(prefix, Err(error), true)
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.borrow().log.clone()
    }

    /// Number of commands sent that start with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.script
            .borrow()
            .log
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.script.borrow_mut().log.clear();
    }

    fn reply(&self, command: &str) -> Result<AtText, Error> {
        let mut script = self.script.borrow_mut();
        script.log.push(command.into());

        let once = script
            .rules
            .iter()
            .position(|r| r.once && command.starts_with(r.prefix.as_str()));
        let reply = match once {
            Some(i) => script.rules.remove(i).reply,
            None => match script
                .rules
                .iter()
                .rev()
                .find(|r| command.starts_with(r.prefix.as_str()))
            {
                Some(rule) => rule.reply.clone(),
                None => Ok(String::new()),
            },
        };

        reply.map(|text| AtText::from(text.as_str()))
    }
}

impl AtClient for MockAtClient {
    async fn send(&mut self, command: &str) -> Result<AtText, Error> {
        self.reply(command)
    }
}

#[derive(Clone)]
pub struct MockPower {
    state: Rc<Cell<PowerState>>,
    enables: Rc<Cell<u32>>,
}

impl MockPower {
    pub fn new() -> Self {
        MockPower {
            state: Rc::new(Cell::new(PowerState::Off)),
            enables: Rc::new(Cell::new(0)),
        }
    }

    pub fn current(&self) -> PowerState {
        self.state.get()
    }

    /// How many times the modem library was started.
    pub fn enables(&self) -> u32 {
        self.enables.get()
    }
}

impl ModemPower for MockPower {
    async fn enable(&mut self) -> Result<(), Error> {
        self.state.set(PowerState::On);
        self.enables.set(self.enables.get() + 1);
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), Error> {
        self.state.set(PowerState::Off);
        Ok(())
    }

    fn state(&mut self) -> PowerState {
        self.state.get()
    }
}

#[derive(Default)]
struct SocketLog {
    open: bool,
    opened: Vec<SocketOptions>,
    sent: Vec<Vec<u8>>,
    rai: Vec<Rai>,
    rx: VecDeque<Result<Vec<u8>, SocketError>>,
    pending_error: Option<SocketError>,
    send_error: Option<SocketError>,
    overreport: usize,
}

/// A [DataSocket] that records what is sent and replays queued datagrams.
///
/// A receive with nothing queued times out.
#[derive(Clone, Default)]
pub struct MockSocket {
    log: Rc<RefCell<SocketLog>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_open(&self, open: bool) {
        self.log.borrow_mut().open = open;
    }

    pub fn set_pending_error(&self, error: Option<SocketError>) {
        self.log.borrow_mut().pending_error = error;
    }

    pub fn set_send_error(&self, error: Option<SocketError>) {
        self.log.borrow_mut().send_error = error;
    }

    /// Report `extra` more bytes than were actually sent or received.
    pub fn set_overreport(&self, extra: usize) {
        self.log.borrow_mut().overreport = extra;
    }

    pub fn push_rx(&self, datagram: Result<Vec<u8>, SocketError>) {
        self.log.borrow_mut().rx.push_back(datagram);
    }

    pub fn opened(&self) -> Vec<SocketOptions> {
        self.log.borrow().opened.clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.log.borrow().sent.clone()
    }

    pub fn rai(&self) -> Vec<Rai> {
        self.log.borrow().rai.clone()
    }
}

impl DataSocket for MockSocket {
    async fn open(&mut self, options: &SocketOptions) -> Result<(), SocketError> {
        let mut log = self.log.borrow_mut();
        log.opened.push(*options);
        log.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.log.borrow_mut().open = false;
    }

    fn is_open(&self) -> bool {
        self.log.borrow().open
    }

    fn pending_error(&mut self) -> Result<(), SocketError> {
        match self.log.borrow().pending_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn set_rai(&mut self, rai: Rai) -> Result<(), SocketError> {
        self.log.borrow_mut().rai.push(rai);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, SocketError> {
        let mut log = self.log.borrow_mut();
        if let Some(error) = log.send_error {
            return Err(error);
        }
        log.sent.push(data.to_vec());
        Ok(data.len() + log.overreport)
    }

    async fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SocketError> {
        let mut log = self.log.borrow_mut();
        let datagram = log.rx.pop_front().unwrap_or(Err(SocketError::TimedOut))?;
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(n + log.overreport)
    }
}

/// A [UrcSource] replaying a fixed list of lines, then failing with [Error::Transport].
pub struct MockUrcSource {
    lines: VecDeque<String>,
}

impl MockUrcSource {
    pub fn new(lines: &[&str]) -> Self {
        MockUrcSource {
            lines: lines.iter().map(|l| String::from(*l)).collect(),
        }
    }
}

impl UrcSource for MockUrcSource {
    async fn next_line(&mut self) -> Result<AtText, Error> {
        let line = self.lines.pop_front().ok_or(Error::Transport)?;
        Ok(AtText::from(line.as_str()))
    }
}
