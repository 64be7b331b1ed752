//! Structured probe results and the on-disk envelope

use serde::{Deserialize, Serialize};

use crate::parser::OutputLayout;

/// What a single per-attempt line reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Reply,
    Timeout,
    Error,
}

/// One per-attempt line of probe output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub response_type: ResponseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<f64>,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProbeResponse {
    pub(crate) fn new(response_type: ResponseKind) -> Self {
        Self {
            response_type,
            timestamp: None,
            icmp_seq: None,
            bytes: None,
            response_ip: None,
            ttl: None,
            time_ms: None,
            duplicate: false,
            message: None,
        }
    }
}

/// Parsed output of one probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub layout: OutputLayout,
    /// Destination as the user typed it (hostname or address)
    pub destination: String,
    pub destination_ip: String,
    pub data_bytes: Option<u32>,
    pub packets_transmitted: u32,
    pub packets_received: u32,
    pub packet_loss_percent: f64,
    pub duplicates: u32,
    pub errors: u32,
    /// Wall time of the run (Linux only)
    pub time_ms: Option<f64>,
    pub round_trip_ms_min: Option<f64>,
    pub round_trip_ms_avg: Option<f64>,
    pub round_trip_ms_max: Option<f64>,
    pub round_trip_ms_stddev: Option<f64>,
    pub responses: Vec<ProbeResponse>,
}

/// One element of the envelope's `info` array.
///
/// A per-attempt response flattened together with the run summary so that
/// each record stands on its own once it is split out for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub destination: String,
    pub destination_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_bytes: Option<u32>,
    pub packets_transmitted: u32,
    pub packets_received: u32,
    pub packet_loss_percent: f64,
    pub duplicates: u32,
    pub errors: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_ms_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_ms_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_ms_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_ms_stddev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProbeRecord {
    fn summary(result: &ProbeResult) -> Self {
        Self {
            destination: result.destination.clone(),
            destination_ip: result.destination_ip.clone(),
            data_bytes: result.data_bytes,
            packets_transmitted: result.packets_transmitted,
            packets_received: result.packets_received,
            packet_loss_percent: result.packet_loss_percent,
            duplicates: result.duplicates,
            errors: result.errors,
            round_trip_ms_min: result.round_trip_ms_min,
            round_trip_ms_avg: result.round_trip_ms_avg,
            round_trip_ms_max: result.round_trip_ms_max,
            round_trip_ms_stddev: result.round_trip_ms_stddev,
            response_type: None,
            icmp_seq: None,
            bytes: None,
            response_ip: None,
            ttl: None,
            time_ms: None,
            duplicate: false,
            message: None,
        }
    }

    fn with_response(mut self, response: &ProbeResponse) -> Self {
        self.response_type = Some(response.response_type);
        self.icmp_seq = response.icmp_seq;
        self.bytes = response.bytes;
        self.response_ip = response.response_ip.clone();
        self.ttl = response.ttl;
        self.time_ms = response.time_ms;
        self.duplicate = response.duplicate;
        self.message = response.message.clone();
        self
    }
}

/// `{ "info": [ProbeRecord, ...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub info: Vec<ProbeRecord>,
}

impl ResultEnvelope {
    /// One record per response line, or a single summary record when the
    /// probe produced no response lines at all.
    pub fn from_result(result: &ProbeResult) -> Self {
        let summary = ProbeRecord::summary(result);
        let info = if result.responses.is_empty() {
            vec![summary]
        } else {
            result
                .responses
                .iter()
                .map(|r| summary.clone().with_response(r))
                .collect()
        };
        Self { info }
    }
}
