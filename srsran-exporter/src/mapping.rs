//! Mapping from srsRAN gNB JSON metrics to store updates.
//!
//! Decoding happens in two steps. The payload is first turned into typed
//! records ([`Tick`]); only a fully decoded tick is then flattened into
//! series and written to the store in one batch. A payload that is not a
//! JSON object changes nothing but the parse error counter.
//!
//! Inside a valid document every section and field is optional: a missing
//! or mistyped section is skipped, a missing or non-numeric field skips
//! only that one series.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::declarations::*;
use crate::store::{SeriesKey, SharedStore};

/// Why a payload could not be mapped at all.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object at the root, found {0}")]
    NotAnObject(&'static str),
}

/// A decoded upstream message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Command echo such as `{"cmd": "metrics_subscribe"}`.
    Ack(String),
    /// One metrics report.
    Tick(Tick),
}

/// One telemetry report from the gNB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    pub cells: Vec<CellReport>,
    pub mac_dl: Vec<MacDlReport>,
}

/// Scheduler metrics for one cell, from `cells[]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellReport {
    pub pci: String,
    pub error_indication_count: Option<f64>,
    pub average_latency: Option<f64>,
    pub max_latency: Option<f64>,
    pub late_dl_harqs: Option<f64>,
    pub late_ul_harqs: Option<f64>,
    pub avg_prach_delay: Option<f64>,
    pub nof_failed_pdcch_allocs: Option<f64>,
    pub nof_failed_uci_allocs: Option<f64>,
    /// Length of `ue_list`, when the cell reported one.
    pub active_ues: Option<usize>,
    pub ues: Vec<UeReport>,
}

/// Scheduler metrics for one UE, from `cells[].ue_list[]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UeReport {
    pub pci: String,
    pub rnti: String,
    pub dl_nof_ok: Option<f64>,
    pub dl_nof_nok: Option<f64>,
    pub ul_nof_ok: Option<f64>,
    pub ul_nof_nok: Option<f64>,
    pub dl_brate: Option<f64>,
    pub ul_brate: Option<f64>,
    pub dl_mcs: Option<f64>,
    pub ul_mcs: Option<f64>,
    pub cqi: Option<f64>,
    pub dl_ri: Option<f64>,
    pub pucch_snr_db: Option<f64>,
    pub pusch_snr_db: Option<f64>,
    pub bsr: Option<f64>,
    pub last_phr: Option<f64>,
}

/// MAC downlink metrics for one cell, from `du.du_high.mac.dl[]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacDlReport {
    pub pci: String,
    pub average_latency_us: Option<f64>,
    pub max_latency_us: Option<f64>,
    pub min_latency_us: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
}

/// Decode a raw text message.
pub fn decode(raw: &str) -> Result<Decoded, DecodeError> {
    let root: Value = serde_json::from_str(raw)?;

    let Some(object) = root.as_object() else {
        return Err(DecodeError::NotAnObject(json_kind(&root)));
    };

    if let Some(cmd) = object.get("cmd") {
        let cmd = match cmd {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(Decoded::Ack(cmd));
    }

    Ok(Decoded::Tick(Tick::from_json(&root)))
}

impl Tick {
    /// Extract every known section from a JSON object.
    pub fn from_json(root: &Value) -> Self {
        let cells = root
            .get("cells")
            .and_then(Value::as_array)
            .map(|cells| {
                cells
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, cell)| CellReport::from_json(idx, cell))
                    .collect()
            })
            .unwrap_or_default();

        let mac_dl = root
            .pointer("/du/du_high/mac/dl")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, entry)| MacDlReport::from_json(idx, entry))
                    .collect()
            })
            .unwrap_or_default();

        Self { cells, mac_dl }
    }

    /// Flatten the tick into series updates.
    pub fn samples(&self) -> Vec<(SeriesKey, f64)> {
        let mut out = Vec::new();

        for cell in &self.cells {
            cell.push_samples(&mut out);
        }
        for entry in &self.mac_dl {
            entry.push_samples(&mut out);
        }

        out
    }
}

impl CellReport {
    fn from_json(idx: usize, cell: &Value) -> Option<Self> {
        let cell = cell.as_object()?;

        let empty = Map::new();
        let metrics = match cell.get("cell_metrics") {
            None => &empty,
            Some(Value::Object(metrics)) => metrics,
            Some(_) => return None,
        };

        let pci = identifier(metrics.get("pci"))
            .or_else(|| identifier(cell.get("pci")))
            .unwrap_or_else(|| ordinal(idx));

        let ue_list = cell.get("ue_list").and_then(Value::as_array);
        let ues = ue_list
            .map(|list| {
                list.iter()
                    .enumerate()
                    .filter_map(|(ue_idx, ue)| UeReport::from_json(idx, ue_idx, ue, &pci))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            error_indication_count: number(metrics, "error_indication_count"),
            average_latency: number(metrics, "average_latency"),
            max_latency: number(metrics, "max_latency"),
            late_dl_harqs: number(metrics, "late_dl_harqs"),
            late_ul_harqs: number(metrics, "late_ul_harqs"),
            avg_prach_delay: number(metrics, "avg_prach_delay"),
            nof_failed_pdcch_allocs: number(metrics, "nof_failed_pdcch_allocs"),
            nof_failed_uci_allocs: number(metrics, "nof_failed_uci_allocs"),
            active_ues: ue_list.map(Vec::len),
            ues,
            pci,
        })
    }

    fn push_samples(&self, out: &mut Vec<(SeriesKey, f64)>) {
        let labels = [("pci", self.pci.as_str())];

        push_all(
            out,
            &labels,
            [
                (SCHED_ERROR_INDICATION_COUNT, self.error_indication_count),
                (SCHED_AVERAGE_LATENCY_US, self.average_latency),
                (SCHED_MAX_LATENCY_US, self.max_latency),
                (SCHED_LATE_DL_HARQS, self.late_dl_harqs),
                (SCHED_LATE_UL_HARQS, self.late_ul_harqs),
                (SCHED_AVG_PRACH_DELAY_SLOTS, self.avg_prach_delay),
                (SCHED_NOF_FAILED_PDCCH_ALLOCS, self.nof_failed_pdcch_allocs),
                (SCHED_NOF_FAILED_UCI_ALLOCS, self.nof_failed_uci_allocs),
                (ACTIVE_UES, self.active_ues.map(|n| n as f64)),
            ],
        );

        for ue in &self.ues {
            ue.push_samples(out);
        }
    }
}

impl UeReport {
    fn from_json(cell_idx: usize, idx: usize, ue: &Value, cell_pci: &str) -> Option<Self> {
        let ue = ue.as_object()?;

        Some(Self {
            pci: identifier(ue.get("pci")).unwrap_or_else(|| cell_pci.to_string()),
            rnti: identifier(ue.get("rnti"))
                .unwrap_or_else(|| format!("#{}.{}", cell_idx, idx)),
            dl_nof_ok: number(ue, "dl_nof_ok"),
            dl_nof_nok: number(ue, "dl_nof_nok"),
            ul_nof_ok: number(ue, "ul_nof_ok"),
            ul_nof_nok: number(ue, "ul_nof_nok"),
            dl_brate: number(ue, "dl_brate"),
            ul_brate: number(ue, "ul_brate"),
            dl_mcs: number(ue, "dl_mcs"),
            ul_mcs: number(ue, "ul_mcs"),
            cqi: number(ue, "cqi"),
            dl_ri: number(ue, "dl_ri"),
            pucch_snr_db: number(ue, "pucch_snr_db"),
            pusch_snr_db: number(ue, "pusch_snr_db"),
            bsr: number(ue, "bsr"),
            last_phr: number(ue, "last_phr"),
        })
    }

    fn push_samples(&self, out: &mut Vec<(SeriesKey, f64)>) {
        let labels = [("pci", self.pci.as_str()), ("rnti", self.rnti.as_str())];

        push_all(
            out,
            &labels,
            [
                (UE_DL_NOF_OK, self.dl_nof_ok),
                (UE_DL_NOF_NOK, self.dl_nof_nok),
                (UE_UL_NOF_OK, self.ul_nof_ok),
                (UE_UL_NOF_NOK, self.ul_nof_nok),
                (UE_DL_BRATE_BPS, self.dl_brate),
                (UE_UL_BRATE_BPS, self.ul_brate),
                (UE_DL_MCS, self.dl_mcs),
                (UE_UL_MCS, self.ul_mcs),
                (UE_CQI, self.cqi),
                (UE_RI, self.dl_ri),
                (UE_PUCCH_SNR_DB, self.pucch_snr_db),
                (UE_PUSCH_SNR_DB, self.pusch_snr_db),
                (UE_BSR, self.bsr),
                (UE_LAST_PHR, self.last_phr),
            ],
        );
    }
}

impl MacDlReport {
    fn from_json(idx: usize, entry: &Value) -> Option<Self> {
        let entry = entry.as_object()?;

        Some(Self {
            pci: identifier(entry.get("pci")).unwrap_or_else(|| ordinal(idx)),
            average_latency_us: number(entry, "average_latency_us"),
            max_latency_us: number(entry, "max_latency_us"),
            min_latency_us: number(entry, "min_latency_us"),
            cpu_usage_percent: number(entry, "cpu_usage_percent"),
        })
    }

    fn push_samples(&self, out: &mut Vec<(SeriesKey, f64)>) {
        let labels = [("pci", self.pci.as_str())];

        push_all(
            out,
            &labels,
            [
                (MAC_DL_AVERAGE_LATENCY_US, self.average_latency_us),
                (MAC_DL_MAX_LATENCY_US, self.max_latency_us),
                (MAC_DL_MIN_LATENCY_US, self.min_latency_us),
                (MAC_DL_CPU_USAGE_PERCENT, self.cpu_usage_percent),
            ],
        );
    }
}

/// What happened to one text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    /// The tick was applied; carries the number of series written.
    Applied(usize),
    /// A command echo, deliberately not mapped.
    Acknowledgment,
    /// Not decodable; counted as a parse error.
    Rejected,
}

/// Applies decoded messages to the metric store.
#[derive(Clone)]
pub struct MessageMapper {
    store: SharedStore,
}

impl MessageMapper {
    /// Create a mapper writing to `store`.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Decode one text message and apply it.
    pub fn handle_text(&self, raw: &str) -> MapOutcome {
        match decode(raw) {
            Ok(Decoded::Tick(tick)) => {
                let written = self.store.set_all(tick.samples());
                trace!(
                    cells = tick.cells.len(),
                    mac_dl = tick.mac_dl.len(),
                    written,
                    "Applied metrics tick"
                );
                MapOutcome::Applied(written)
            }
            Ok(Decoded::Ack(cmd)) => {
                debug!(cmd = %cmd, "Ignoring command response");
                MapOutcome::Acknowledgment
            }
            Err(e) => {
                self.reject(&e);
                MapOutcome::Rejected
            }
        }
    }

    /// Count a message that could not be decoded.
    pub fn reject(&self, reason: &dyn std::fmt::Display) {
        self.store.inc(WS_PARSE_ERRORS_TOTAL);
        debug!(error = %reason, "Failed to decode metrics message");
    }
}

fn push_all<const N: usize>(
    out: &mut Vec<(SeriesKey, f64)>,
    labels: &[(&str, &str)],
    fields: [(&str, Option<f64>); N],
) {
    for (name, value) in fields {
        if let Some(value) = value {
            out.push((SeriesKey::new(name, labels), value));
        }
    }
}

/// Read a numeric field. Booleans and numeric strings do not count.
fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(Value::as_f64)
}

/// Read an identifier field as label text.
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Label used when an entity does not report its identifier.
///
/// The `#` prefix keeps it apart from any reported numeric identifier.
fn ordinal(idx: usize) -> String {
    format!("#{}", idx)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
