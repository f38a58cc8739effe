use core::fmt::Write;
use heapless::{String, Vec};

use super::cereg::{parse_cell_id, parse_tac};
use super::tok::Tokenizer;
use super::{AtParseErr, AtParseLine, AtRequest, GenericOk, Plmn};

pub const NCELLMEAS_MAX_CELLS: usize = 16;
pub const NCELLMEAS_MAX_NEIGHBORS: usize = 32;

/// AT%NCELLMEAS=<search_type>,<gci_count>
///
/// The result arrives later as a `%NCELLMEAS` notification.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartCellMeasurement {
    pub search_type: u8,
    pub gci_count: u8,
}

/// AT%NCELLMEASSTOP
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StopCellMeasurement;

impl AtRequest for StartCellMeasurement {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT%NCELLMEAS={},{}", self.search_type, self.gci_count).ok();
        buf
    }
}

impl AtRequest for StopCellMeasurement {
    type Response = GenericOk;
    fn encode(&self) -> String<256> {
        "AT%NCELLMEASSTOP".into()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NcellMeasCell {
    pub eci: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub tac: u16,
    /// Timing advance, 65535 when not valid.
    pub adv: u32,
    pub adv_meas_time: u64,
    pub earfcn: u32,
    pub pci: u16,
    pub rsrp: i16,
    pub rsrq: i16,
    pub meas_time: u64,
    pub serving: bool,
    pub neighbor_count: usize,
    /// Index of this cell's first neighbor in [NcellMeasParam::neighbors].
    neighbor_start: usize,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NcellMeasNeighbor {
    pub earfcn: u32,
    pub pci: u16,
    pub rsrp: i16,
    pub rsrq: i16,
    pub time_diff: i32,
}

/// A neighbor cell measurement, from a `%NCELLMEAS` notification.
///
/// Neighbors of all cells are stored back to back, see [NcellMeasParam::neighbors_of].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NcellMeasParam {
    pub status: u8,
    pub cells: Vec<NcellMeasCell, NCELLMEAS_MAX_CELLS>,
    pub neighbors: Vec<NcellMeasNeighbor, NCELLMEAS_MAX_NEIGHBORS>,
}

impl NcellMeasParam {
    /// Parse the body of a `%NCELLMEAS` notification:
    /// `status[,"eci","plmn","tac",adv,adv_meas_time,earfcn,pci,rsrp,rsrq,meas_time,serving,
    /// neighbor_count[,earfcn,pci,rsrp,rsrq,time_diff]*]*`
    pub fn parse(body: &str) -> Result<Self, AtParseErr> {
        let mut tok = Tokenizer::new(body);

        let mut param = NcellMeasParam {
            status: tok.num()?.ok_or("Missing <status>")?,
            ..NcellMeasParam::default()
        };

        while tok.sep() {
            let cell = param.parse_cell(&mut tok)?;
            param.cells.push(cell).map_err(|_| "Too many cells")?;
        }
        tok.end()?;

        Ok(param)
    }

    fn parse_cell(&mut self, tok: &mut Tokenizer<'_>) -> Result<NcellMeasCell, AtParseErr> {
        let eci = parse_cell_id(tok.quoted()?.ok_or("Missing <eci>")?)?;
        tok.expect_sep()?;
        let plmn = Plmn::parse(tok.quoted()?.ok_or("Missing <plmn>")?)?;
        tok.expect_sep()?;
        let tac = parse_tac(tok.quoted()?.ok_or("Missing <tac>")?)?;

        let mut cell = NcellMeasCell {
            eci,
            mcc: plmn.mcc,
            mnc: plmn.mnc,
            tac,
            adv: field(tok)?,
            adv_meas_time: field(tok)?,
            earfcn: field(tok)?,
            pci: field(tok)?,
            rsrp: field(tok)?,
            rsrq: field(tok)?,
            meas_time: field(tok)?,
            serving: field::<u8>(tok)? != 0,
            neighbor_count: field(tok)?,
            neighbor_start: self.neighbors.len(),
        };

        for _ in 0..cell.neighbor_count {
            let neighbor = NcellMeasNeighbor {
                earfcn: field(tok)?,
                pci: field(tok)?,
                rsrp: field(tok)?,
                rsrq: field(tok)?,
                time_diff: field(tok)?,
            };
            self.neighbors
                .push(neighbor)
                .map_err(|_| "Too many neighbor cells")?;
        }

        if cell.neighbor_count == 0 {
            cell.neighbor_start = 0;
        }

        Ok(cell)
    }

    /// The neighbors measured around `cell`.
    pub fn neighbors_of(&self, cell: &NcellMeasCell) -> &[NcellMeasNeighbor] {
        self.neighbors
            .get(cell.neighbor_start..cell.neighbor_start + cell.neighbor_count)
            .unwrap_or(&[])
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Consume a separator followed by a mandatory number.
fn field<T: core::str::FromStr>(tok: &mut Tokenizer<'_>) -> Result<T, AtParseErr> {
    tok.expect_sep()?;
    Ok(tok.num()?.ok_or("Missing field")?)
}

impl AtParseLine for NcellMeasParam {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let body = line
            .strip_prefix("%NCELLMEAS: ")
            .ok_or("Missing '%NCELLMEAS: '")?;
        NcellMeasParam::parse(body)
    }
}
