use core::{fmt::Debug, future::Future};

/// A unit of background work, polled forever by a task declared with [pump_task].
pub trait Pump {
    type Err: Debug;

    fn pump(&mut self) -> impl Future<Output = Result<(), Self::Err>>;
}

/// Declares an embassy task that runs a [Pump] forever.
#[macro_export]
macro_rules! pump_task {
    ($name:ident, $type:ty) => {
        #[embassy_executor::task]
        pub(crate) async fn $name(mut pump: $type) {
            use ::lte_modem_async::pump::Pump;
            loop {
                if let Err(err) = pump.pump().await {
                    #[cfg(feature = "log")]
                    log::error!("Error pumping {} {:?}", stringify!($name), err);
                    #[cfg(feature = "defmt")]
                    defmt::error!("Error pumping {} {:?}", stringify!($name), err);
                }
            }
        }
    };
}
