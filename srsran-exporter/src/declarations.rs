//! Static metadata for every metric the exporter knows about.

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Help text and type for one metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDeclaration {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

// Exporter self-monitoring
pub const WS_MESSAGES_TOTAL: &str = "srsran_exporter_ws_messages_total";
pub const WS_PARSE_ERRORS_TOTAL: &str = "srsran_exporter_ws_parse_errors_total";
pub const WS_CONNECTIONS_TOTAL: &str = "srsran_exporter_ws_connections_total";
pub const WS_CONNECTED: &str = "srsran_exporter_ws_connected";
pub const LAST_MESSAGE_UNIXTIME: &str = "srsran_exporter_last_message_unixtime";

/// Samples seeded to zero when the store is created.
pub const SELF_MONITORING: [&str; 5] = [
    WS_MESSAGES_TOTAL,
    WS_PARSE_ERRORS_TOTAL,
    WS_CONNECTIONS_TOTAL,
    WS_CONNECTED,
    LAST_MESSAGE_UNIXTIME,
];

// Scheduler cell metrics
pub const SCHED_ERROR_INDICATION_COUNT: &str = "srsran_sched_error_indication_count";
pub const SCHED_AVERAGE_LATENCY_US: &str = "srsran_sched_average_latency_us";
pub const SCHED_MAX_LATENCY_US: &str = "srsran_sched_max_latency_us";
pub const SCHED_LATE_DL_HARQS: &str = "srsran_sched_late_dl_harqs";
pub const SCHED_LATE_UL_HARQS: &str = "srsran_sched_late_ul_harqs";
pub const SCHED_AVG_PRACH_DELAY_SLOTS: &str = "srsran_sched_avg_prach_delay_slots";
pub const SCHED_NOF_FAILED_PDCCH_ALLOCS: &str = "srsran_sched_nof_failed_pdcch_allocs";
pub const SCHED_NOF_FAILED_UCI_ALLOCS: &str = "srsran_sched_nof_failed_uci_allocs";
pub const ACTIVE_UES: &str = "srsran_active_ues";

// Per-UE scheduler metrics
pub const UE_DL_NOF_OK: &str = "srsran_ue_dl_nof_ok";
pub const UE_DL_NOF_NOK: &str = "srsran_ue_dl_nof_nok";
pub const UE_UL_NOF_OK: &str = "srsran_ue_ul_nof_ok";
pub const UE_UL_NOF_NOK: &str = "srsran_ue_ul_nof_nok";
pub const UE_DL_BRATE_BPS: &str = "srsran_ue_dl_brate_bps";
pub const UE_UL_BRATE_BPS: &str = "srsran_ue_ul_brate_bps";
pub const UE_DL_MCS: &str = "srsran_ue_dl_mcs";
pub const UE_UL_MCS: &str = "srsran_ue_ul_mcs";
pub const UE_CQI: &str = "srsran_ue_cqi";
pub const UE_RI: &str = "srsran_ue_ri";
pub const UE_PUCCH_SNR_DB: &str = "srsran_ue_pucch_snr_db";
pub const UE_PUSCH_SNR_DB: &str = "srsran_ue_pusch_snr_db";
pub const UE_BSR: &str = "srsran_ue_bsr";
pub const UE_LAST_PHR: &str = "srsran_ue_last_phr";

// MAC DL metrics
pub const MAC_DL_AVERAGE_LATENCY_US: &str = "srsran_mac_dl_average_latency_us";
pub const MAC_DL_MAX_LATENCY_US: &str = "srsran_mac_dl_max_latency_us";
pub const MAC_DL_MIN_LATENCY_US: &str = "srsran_mac_dl_min_latency_us";
pub const MAC_DL_CPU_USAGE_PERCENT: &str = "srsran_mac_dl_cpu_usage_percent";

const fn gauge(name: &'static str, help: &'static str) -> MetricDeclaration {
    MetricDeclaration {
        name,
        help,
        kind: MetricKind::Gauge,
    }
}

const fn counter(name: &'static str, help: &'static str) -> MetricDeclaration {
    MetricDeclaration {
        name,
        help,
        kind: MetricKind::Counter,
    }
}

/// Every declared metric.
///
/// Values relayed from the gNB are exported as gauges: the gNB reports
/// per-period figures and may reset them at will.
pub static DECLARATIONS: &[MetricDeclaration] = &[
    gauge(
        SCHED_ERROR_INDICATION_COUNT,
        "Scheduler error indications received from lower layers.",
    ),
    gauge(
        SCHED_AVERAGE_LATENCY_US,
        "Average scheduler decision latency in microseconds.",
    ),
    gauge(
        SCHED_MAX_LATENCY_US,
        "Maximum scheduler decision latency in microseconds.",
    ),
    gauge(SCHED_LATE_DL_HARQS, "Failed PDSCH allocations due to late HARQs."),
    gauge(SCHED_LATE_UL_HARQS, "Failed PUSCH allocations due to late HARQs."),
    gauge(SCHED_AVG_PRACH_DELAY_SLOTS, "Average PRACH delay in slots."),
    gauge(
        SCHED_NOF_FAILED_PDCCH_ALLOCS,
        "Failed PDCCH allocation attempts.",
    ),
    gauge(SCHED_NOF_FAILED_UCI_ALLOCS, "Failed UCI allocation attempts."),
    gauge(UE_DL_NOF_OK, "Successful DL HARQ transmissions per UE."),
    gauge(UE_DL_NOF_NOK, "Failed DL HARQ transmissions per UE."),
    gauge(UE_UL_NOF_OK, "Successful UL HARQ transmissions per UE."),
    gauge(UE_UL_NOF_NOK, "Failed UL HARQ transmissions per UE."),
    gauge(UE_DL_BRATE_BPS, "DL bitrate in bits per second per UE."),
    gauge(UE_UL_BRATE_BPS, "UL bitrate in bits per second per UE."),
    gauge(UE_DL_MCS, "DL MCS index per UE."),
    gauge(UE_UL_MCS, "UL MCS index per UE."),
    gauge(UE_CQI, "Channel Quality Indicator per UE."),
    gauge(UE_RI, "Rank Indicator per UE."),
    gauge(UE_PUCCH_SNR_DB, "PUCCH signal-to-noise ratio in dB per UE."),
    gauge(UE_PUSCH_SNR_DB, "PUSCH signal-to-noise ratio in dB per UE."),
    gauge(UE_BSR, "Buffer Status Report value per UE."),
    gauge(UE_LAST_PHR, "Last Power Headroom Report per UE."),
    gauge(
        ACTIVE_UES,
        "Number of active UEs reported by the scheduler.",
    ),
    gauge(
        MAC_DL_AVERAGE_LATENCY_US,
        "Average MAC DL slot handling latency in microseconds.",
    ),
    gauge(
        MAC_DL_MAX_LATENCY_US,
        "Maximum MAC DL slot handling latency in microseconds.",
    ),
    gauge(
        MAC_DL_MIN_LATENCY_US,
        "Minimum MAC DL slot handling latency in microseconds.",
    ),
    gauge(
        MAC_DL_CPU_USAGE_PERCENT,
        "MAC DL slot handling CPU usage percent.",
    ),
    counter(
        WS_MESSAGES_TOTAL,
        "Total WebSocket messages received by exporter.",
    ),
    counter(
        WS_PARSE_ERRORS_TOTAL,
        "Total WebSocket messages that failed JSON parsing.",
    ),
    counter(
        WS_CONNECTIONS_TOTAL,
        "Total WebSocket connection attempts.",
    ),
    gauge(
        WS_CONNECTED,
        "Whether the exporter is currently connected to the gNB (1=yes, 0=no).",
    ),
    gauge(
        LAST_MESSAGE_UNIXTIME,
        "Unix timestamp of last WebSocket message reception.",
    ),
];

/// Find the declaration for `name`.
pub fn lookup(name: &str) -> Option<&'static MetricDeclaration> {
    DECLARATIONS.iter().find(|d| d.name == name)
}
