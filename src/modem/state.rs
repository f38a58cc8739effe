use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use heapless::String;

use crate::at_command::{CeregParam, ConnEvalParam, NcellMeasParam, RaiParam};
use crate::Error;

/// The most recent values read from the modem or reported by it.
#[derive(Default)]
struct Values {
    imei: Option<u64>,
    imsi: Option<u64>,
    iccid: Option<String<22>>,
    fw_version: Option<String<32>>,
    conn: Option<ConnEvalParam>,
    cereg: Option<CeregParam>,
    rai: Option<RaiParam>,
    ncellmeas: Option<NcellMeasParam>,
}

pub struct StateStore {
    values: Mutex<CriticalSectionRawMutex, RefCell<Values>>,
}

fn nonzero(v: Option<u64>) -> Result<u64, Error> {
    v.filter(|v| *v != 0).ok_or(Error::NoData)
}

fn nonempty<const N: usize>(v: Option<String<N>>) -> Result<String<N>, Error> {
    v.filter(|v| !v.is_empty()).ok_or(Error::NoData)
}

impl StateStore {
    pub const fn new() -> Self {
        StateStore {
            values: Mutex::new(RefCell::new(Values {
                imei: None,
                imsi: None,
                iccid: None,
                fw_version: None,
                conn: None,
                cereg: None,
                rai: None,
                ncellmeas: None,
            })),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Values) -> T) -> T {
        self.values.lock(|v| f(&v.borrow()))
    }

    fn write(&self, f: impl FnOnce(&mut Values)) {
        self.values.lock(|v| f(&mut v.borrow_mut()))
    }

    pub fn set_imei(&self, imei: u64) {
        self.write(|v| v.imei = Some(imei));
    }

    pub fn imei(&self) -> Result<u64, Error> {
        nonzero(self.read(|v| v.imei))
    }

    pub fn set_imsi(&self, imsi: u64) {
        self.write(|v| v.imsi = Some(imsi));
    }

    pub fn imsi(&self) -> Result<u64, Error> {
        nonzero(self.read(|v| v.imsi))
    }

    pub fn set_iccid(&self, iccid: String<22>) {
        self.write(|v| v.iccid = Some(iccid));
    }

    pub fn iccid(&self) -> Result<String<22>, Error> {
        nonempty(self.read(|v| v.iccid.clone()))
    }

    pub fn set_fw_version(&self, version: String<32>) {
        self.write(|v| v.fw_version = Some(version));
    }

    pub fn fw_version(&self) -> Result<String<32>, Error> {
        nonempty(self.read(|v| v.fw_version.clone()))
    }

    pub fn set_conn(&self, conn: ConnEvalParam) {
        self.write(|v| v.conn = Some(conn));
    }

    pub fn conn(&self) -> Result<ConnEvalParam, Error> {
        self.read(|v| v.conn).ok_or(Error::NoData)
    }

    pub fn set_cereg(&self, cereg: CeregParam) {
        self.write(|v| v.cereg = Some(cereg));
    }

    pub fn cereg(&self) -> Result<CeregParam, Error> {
        self.read(|v| v.cereg.clone()).ok_or(Error::NoData)
    }

    pub fn set_rai(&self, rai: RaiParam) {
        self.write(|v| v.rai = Some(rai));
    }

    pub fn rai(&self) -> Result<RaiParam, Error> {
        self.read(|v| v.rai).ok_or(Error::NoData)
    }

    pub fn set_ncellmeas(&self, ncellmeas: NcellMeasParam) {
        self.write(|v| v.ncellmeas = Some(ncellmeas));
    }

    pub fn ncellmeas(&self) -> Result<NcellMeasParam, Error> {
        self.read(|v| v.ncellmeas.clone()).ok_or(Error::NoData)
    }

    /// Whether the network refused PSM in the last registration report.
    pub fn psm_deactivated(&self) -> bool {
        self.read(|v| v.cereg.as_ref().is_some_and(CeregParam::psm_deactivated))
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
