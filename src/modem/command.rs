use core::mem;
use embassy_time::{with_timeout, Duration};

use crate::at_command::{AtRequest, AtResponse};
use crate::log;
use crate::{AtClient, Error};

/// The default timeout of AT commands
pub const AT_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs typed [AtRequest]s over an [AtClient].
///
/// Exclusive access to the client follows from `&mut self`, so the state machine, which owns
/// the runner, is the only task that ever talks to the modem.
pub struct CommandRunner<A> {
    client: A,
    timeout: Option<Duration>,
}

impl<A: AtClient> CommandRunner<A> {
    pub fn new(client: A) -> Self {
        CommandRunner {
            client,
            timeout: Some(AT_DEFAULT_TIMEOUT),
        }
    }

    /// Send a request to the modem, and decode its response.
    pub async fn run<R: AtRequest>(&mut self, command: R) -> Result<R::Response, Error> {
        let encoded = command.encode();
        log::trace!("Running AT command: {:?}", command);

        let timeout = self.timeout;
        let result = match timeout {
            Some(timeout) => with_timeout(timeout, self.client.send(&encoded))
                .await
                .map_err(Error::from)
                .and_then(|r| r),
            None => self.client.send(&encoded).await,
        }
        .and_then(|text| R::Response::from_response(&text).map_err(Error::from));

        if let Err(e) = &result {
            log::error!("AT command {:?} error: {:?}", command, e);
        }

        result
    }

    /// Send a request to the modem and decode its response.
    ///
    /// Use the provided timeout value instead of the configured one.
    pub async fn run_with_timeout<R: AtRequest>(
        &mut self,
        mut timeout: Option<Duration>,
        command: R,
    ) -> Result<R::Response, Error> {
        mem::swap(&mut self.timeout, &mut timeout);
        let result = self.run(command).await;
        mem::swap(&mut self.timeout, &mut timeout);
        result
    }

    /// Set the timeout of subsequent commands
    ///
    /// Note that the timeout defaults to [AT_DEFAULT_TIMEOUT].
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }
}
