//! Fixed configuration commands with no response payload.
//!
//! Each one enables a notification or a modem feature the connection manager relies on.

use heapless::String;

use super::{AtRequest, GenericOk};

macro_rules! fixed_command {
    ($(#[$meta:meta])* $name:ident => $command:literal) => {
        $(#[$meta])*
        #[doc = concat!("`", $command, "`")]
        #[derive(Debug, Clone, Copy)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name;

        impl AtRequest for $name {
            type Response = GenericOk;
            fn encode(&self) -> String<256> {
                $command.into()
            }
        }
    };
}

fixed_command!(
    /// Power-off warning when the supply drops below 3.0 V.
    EnablePowerOffWarning => "AT%XPOFWARN=1,30"
);
fixed_command!(
    /// High temperature warning level, in degrees Celsius.
    SetHighTemperatureLevel => "AT%XTEMPHIGHLVL=70"
);
fixed_command!(EnableTemperatureUrc => "AT%XTEMP=1");
fixed_command!(
    /// Disable extended PCO, use plain PCO towards the network.
    DisableExtendedPco => "AT%XEPCO=0"
);
fixed_command!(
    /// Data profile 0: ultra low power.
    SetDataProfile => "AT%XDATAPRFL=0"
);
fixed_command!(EnableSimUrc => "AT%XSIM=1");
fixed_command!(EnableNetworkTimeUrc => "AT%XNETTIME=1");
fixed_command!(
    /// Modem domain events, including the reset loop warning.
    EnableModemEvents => "AT%MDMEV=1"
);
fixed_command!(
    /// Power preference indication: low power.
    SetPowerPreference => "AT+CEPPI=1"
);
fixed_command!(EnablePacketDomainEvents => "AT+CGEREP=1");
fixed_command!(
    /// Numeric `+CME ERROR` codes.
    EnableNumericErrors => "AT+CMEE=1"
);
fixed_command!(
    /// EPS mobility and session management error reporting.
    EnableNetworkErrorReporting => "AT+CNEC=24"
);
fixed_command!(
    /// `+CSCON` signalling connection URCs.
    EnableSignallingUrc => "AT+CSCON=1"
);
