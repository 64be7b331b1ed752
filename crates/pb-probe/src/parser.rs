//! Ping output parser
//!
//! Understands two layouts:
//!
//! | Layout | Header | Statistics |
//! |--------|--------|------------|
//! | Linux iputils | `PING host (ip) 56(84) bytes of data.` | `rtt min/avg/max/mdev = ...` |
//! | BSD / macOS | `PING host (ip): 56 data bytes` | `round-trip min/avg/max/stddev = ...` |
//!
//! Anything else (Windows, BusyBox, localized builds, truncated output) is a
//! [`ParseError`]. The header and the statistics block are mandatory, and so
//! is the round-trip line whenever a reply came back. A `N bytes from` line
//! carrying reply fields in an unknown shape is rejected; other unknown body
//! lines are skipped.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::record::{ProbeResponse, ProbeResult, ResponseKind};

lazy_static! {
    static ref BSD_HEADER: Regex =
        Regex::new(r"^PING (\S+) \(([^()\s]+)\): (\d+) data bytes$").expect("valid regex");
    static ref LINUX_HEADER: Regex =
        Regex::new(r"^PING (\S+) \(([^()\s]+)\) (\d+)\(\d+\) bytes of data\.?$")
            .expect("valid regex");
    static ref LINUX_V6_HEADER: Regex =
        Regex::new(r"^PING (\S+?) ?\((?:[^()\s]+ \()?([^()\s]+)\)?\) (\d+) data bytes$")
            .expect("valid regex");
    static ref REPLY: Regex = Regex::new(
        r"^(?:\[(\d+(?:\.\d+)?)\] )?(\d+) bytes from (.+?): icmp_seq=(\d+) ttl=(\d+) time[=<]([\d.]+) ?ms(.*)$"
    )
    .expect("valid regex");
    static ref LINUX_ERROR: Regex = Regex::new(
        r"^(?:\[(\d+(?:\.\d+)?)\] )?From (\S+)(?: \(([^()\s]+)\))? icmp_seq=(\d+) (.+)$"
    )
    .expect("valid regex");
    static ref BSD_ERROR: Regex =
        Regex::new(r"^(\d+) bytes from ([^\s:]+): (.+)$").expect("valid regex");
    static ref LINUX_NO_ANSWER: Regex =
        Regex::new(r"^no answer yet for icmp_seq=(\d+)$").expect("valid regex");
    static ref BSD_TIMEOUT: Regex =
        Regex::new(r"^Request timeout for icmp_seq (\d+)$").expect("valid regex");
    static ref STATS_HEADER: Regex =
        Regex::new(r"^--- (.+) ping statistics ---$").expect("valid regex");
    static ref RTT: Regex = Regex::new(
        r"^(?:rtt|round-trip) min/avg/max/(?:mdev|stddev|std-dev) = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+) ms"
    )
    .expect("valid regex");
    static ref REPLY_FIELDS: Regex =
        Regex::new(r"\b(?:icmp_seq|seq|ttl|time)[=<]").expect("valid regex");
    static ref HOST_WITH_IP: Regex = Regex::new(r"^\S+ \(([^()\s]+)\)$").expect("valid regex");
}

/// Which layout the output was recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    Linux,
    Bsd,
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLayout::Linux => write!(f, "linux"),
            OutputLayout::Bsd => write!(f, "bsd"),
        }
    }
}

/// Why probe output could not be parsed
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("probe produced no output")]
    Empty,

    #[error("unrecognized probe header: {0}")]
    UnknownHeader(String),

    #[error("probe output has no statistics section")]
    MissingStatistics,

    #[error("malformed statistics line: {0}")]
    MalformedStatistics(String),

    #[error("unrecognized reply line: {0}")]
    UnrecognizedReply(String),

    #[error("invalid number '{value}' in {field}")]
    InvalidNumber { field: &'static str, value: String },
}

impl From<ParseError> for pb_core::Error {
    fn from(err: ParseError) -> Self {
        pb_core::Error::Parse(err.to_string())
    }
}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse the standard output of `ping -c N <target>`.
pub fn parse_ping_output(text: &str) -> ParseResult<ProbeResult> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().ok_or(ParseError::Empty)?;
    let (layout, destination, destination_ip, data_bytes) = parse_header(header)?;

    let mut responses = Vec::new();
    let mut saw_statistics = false;
    for line in lines.by_ref() {
        if STATS_HEADER.is_match(line) {
            saw_statistics = true;
            break;
        }
        match parse_response(line)? {
            Some(response) => responses.push(response),
            None => debug!(line, "Skipping unrecognized probe line"),
        }
    }
    if !saw_statistics {
        return Err(ParseError::MissingStatistics);
    }

    let counts_line = lines.next().ok_or(ParseError::MissingStatistics)?;
    let counts = parse_counts(counts_line)?;

    let mut rtt = None;
    for line in lines {
        if let Some(caps) = RTT.captures(line) {
            rtt = Some([
                num::<f64>(&caps, 1, "round_trip_ms_min")?,
                num::<f64>(&caps, 2, "round_trip_ms_avg")?,
                num::<f64>(&caps, 3, "round_trip_ms_max")?,
                num::<f64>(&caps, 4, "round_trip_ms_stddev")?,
            ]);
            break;
        }
        if line.starts_with("rtt ") || line.starts_with("round-trip ") {
            return Err(ParseError::MalformedStatistics(line.to_string()));
        }
    }
    if counts.received > 0 && rtt.is_none() {
        return Err(ParseError::MissingStatistics);
    }

    Ok(ProbeResult {
        layout,
        destination,
        destination_ip,
        data_bytes: Some(data_bytes),
        packets_transmitted: counts.transmitted,
        packets_received: counts.received,
        packet_loss_percent: counts.loss_percent,
        duplicates: counts.duplicates,
        errors: counts.errors,
        time_ms: counts.time_ms,
        round_trip_ms_min: rtt.map(|r| r[0]),
        round_trip_ms_avg: rtt.map(|r| r[1]),
        round_trip_ms_max: rtt.map(|r| r[2]),
        round_trip_ms_stddev: rtt.map(|r| r[3]),
        responses,
    })
}

fn parse_header(line: &str) -> ParseResult<(OutputLayout, String, String, u32)> {
    let (layout, caps) = if let Some(caps) = BSD_HEADER.captures(line) {
        (OutputLayout::Bsd, caps)
    } else if let Some(caps) = LINUX_HEADER.captures(line) {
        (OutputLayout::Linux, caps)
    } else if let Some(caps) = LINUX_V6_HEADER.captures(line) {
        (OutputLayout::Linux, caps)
    } else {
        return Err(ParseError::UnknownHeader(line.to_string()));
    };

    Ok((
        layout,
        caps[1].to_string(),
        caps[2].to_string(),
        num(&caps, 3, "data_bytes")?,
    ))
}

fn parse_response(line: &str) -> ParseResult<Option<ProbeResponse>> {
    if let Some(caps) = REPLY.captures(line) {
        let response = ProbeResponse {
            timestamp: opt_num(&caps, 1, "timestamp")?,
            bytes: Some(num(&caps, 2, "bytes")?),
            response_ip: Some(response_ip(&caps[3])),
            icmp_seq: Some(num(&caps, 4, "icmp_seq")?),
            ttl: Some(num(&caps, 5, "ttl")?),
            time_ms: Some(num(&caps, 6, "time_ms")?),
            duplicate: caps[7].contains("DUP!"),
            ..ProbeResponse::new(ResponseKind::Reply)
        };
        return Ok(Some(response));
    }

    if let Some(caps) = LINUX_ERROR.captures(line) {
        let ip = caps
            .get(3)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
        let response = ProbeResponse {
            timestamp: opt_num(&caps, 1, "timestamp")?,
            response_ip: ip,
            icmp_seq: Some(num(&caps, 4, "icmp_seq")?),
            message: Some(caps[5].to_string()),
            ..ProbeResponse::new(ResponseKind::Error)
        };
        return Ok(Some(response));
    }

    if let Some(caps) = BSD_TIMEOUT
        .captures(line)
        .or_else(|| LINUX_NO_ANSWER.captures(line))
    {
        let response = ProbeResponse {
            icmp_seq: Some(num(&caps, 1, "icmp_seq")?),
            ..ProbeResponse::new(ResponseKind::Timeout)
        };
        return Ok(Some(response));
    }

    if let Some(caps) = BSD_ERROR.captures(line) {
        if REPLY_FIELDS.is_match(&caps[3]) {
            return Err(ParseError::UnrecognizedReply(line.to_string()));
        }
        let response = ProbeResponse {
            bytes: Some(num(&caps, 1, "bytes")?),
            response_ip: Some(caps[2].to_string()),
            message: Some(caps[3].to_string()),
            ..ProbeResponse::new(ResponseKind::Error)
        };
        return Ok(Some(response));
    }

    Ok(None)
}

/// `host (ip)` → `ip`; a bare address is returned unchanged.
fn response_ip(from: &str) -> String {
    HOST_WITH_IP
        .captures(from)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| from.to_string())
}

#[derive(Debug, Default)]
struct Counts {
    transmitted: u32,
    received: u32,
    loss_percent: f64,
    duplicates: u32,
    errors: u32,
    time_ms: Option<f64>,
}

/// `4 packets transmitted, 4 received, +1 duplicates, 0% packet loss, time 3004ms`
fn parse_counts(line: &str) -> ParseResult<Counts> {
    let malformed = || ParseError::MalformedStatistics(line.to_string());

    let mut counts = Counts::default();
    let mut transmitted = None;
    let mut received = None;
    let mut loss = None;

    for token in line.split(',').map(str::trim) {
        if let Some(n) = token.strip_suffix(" packets transmitted") {
            transmitted = Some(parse_field(n, "packets_transmitted")?);
        } else if let Some(n) = token
            .strip_suffix(" packets received")
            .or_else(|| token.strip_suffix(" received"))
        {
            received = Some(parse_field(n, "packets_received")?);
        } else if let Some(n) = token.strip_prefix('+').and_then(|t| t.strip_suffix(" duplicates")) {
            counts.duplicates = parse_field(n, "duplicates")?;
        } else if let Some(n) = token.strip_prefix('+').and_then(|t| t.strip_suffix(" errors")) {
            counts.errors = parse_field(n, "errors")?;
        } else if let Some(n) = token.strip_prefix('+').and_then(|t| t.strip_suffix(" corrupted")) {
            counts.errors += parse_field::<u32>(n, "corrupted")?;
        } else if let Some(n) = token.strip_suffix("% packet loss") {
            loss = Some(parse_field(n, "packet_loss_percent")?);
        } else if let Some(n) = token.strip_prefix("time ").and_then(|t| t.strip_suffix("ms")) {
            counts.time_ms = Some(parse_field(n, "time_ms")?);
        } else if let Some(n) = token.strip_prefix("pipe ") {
            parse_field::<u32>(n, "pipe")?;
        } else {
            return Err(malformed());
        }
    }

    counts.transmitted = transmitted.ok_or_else(malformed)?;
    counts.received = received.ok_or_else(malformed)?;
    counts.loss_percent = loss.ok_or_else(malformed)?;
    Ok(counts)
}

fn parse_field<T: FromStr>(value: &str, field: &'static str) -> ParseResult<T> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn num<T: FromStr>(caps: &Captures<'_>, idx: usize, field: &'static str) -> ParseResult<T> {
    parse_field(&caps[idx], field)
}

fn opt_num<T: FromStr>(caps: &Captures<'_>, idx: usize, field: &'static str) -> ParseResult<Option<T>> {
    caps.get(idx)
        .map(|m| parse_field(m.as_str(), field))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "\
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=11.8 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=12.0 ms
64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=11.9 ms
64 bytes from 8.8.8.8: icmp_seq=4 ttl=117 time=12.1 ms

--- 8.8.8.8 ping statistics ---
4 packets transmitted, 4 received, 0% packet loss, time 3004ms
rtt min/avg/max/mdev = 11.812/11.950/12.101/0.107 ms
";

    const LINUX_HOSTNAME: &str = "\
PING example.com (93.184.216.34) 56(84) bytes of data.
64 bytes from 93.184.216.34 (93.184.216.34): icmp_seq=1 ttl=56 time=88.1 ms
64 bytes from 93.184.216.34 (93.184.216.34): icmp_seq=2 ttl=56 time=87.9 ms

--- example.com ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 87.912/88.006/88.100/0.094 ms
";

    const LINUX_TOTAL_LOSS: &str = "\
PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.

--- 10.255.255.1 ping statistics ---
4 packets transmitted, 0 received, 100% packet loss, time 3063ms
";

    const LINUX_UNREACHABLE: &str = "\
PING 192.168.1.250 (192.168.1.250) 56(84) bytes of data.
From 192.168.1.10 icmp_seq=1 Destination Host Unreachable
From 192.168.1.10 icmp_seq=2 Destination Host Unreachable

--- 192.168.1.250 ping statistics ---
2 packets transmitted, 0 received, +2 errors, 100% packet loss, time 1030ms
pipe 2
";

    const LINUX_V6: &str = "\
PING ::1(::1) 56 data bytes
64 bytes from ::1: icmp_seq=1 ttl=64 time=0.045 ms
64 bytes from ::1: icmp_seq=1 ttl=64 time=0.050 ms (DUP!)

--- ::1 ping statistics ---
1 packets transmitted, 1 received, +1 duplicates, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 0.045/0.047/0.050/0.002 ms
";

    const LINUX_TIMESTAMPED: &str = "\
PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.
[1700000000.123456] 64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=9.41 ms

--- 1.1.1.1 ping statistics ---
1 packets transmitted, 1 received, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 9.410/9.410/9.410/0.000 ms
";

    const BSD_OK: &str = "\
PING 8.8.8.8 (8.8.8.8): 56 data bytes
64 bytes from 8.8.8.8: icmp_seq=0 ttl=117 time=11.766 ms
Request timeout for icmp_seq 1
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=12.304 ms

--- 8.8.8.8 ping statistics ---
3 packets transmitted, 2 packets received, 33.3% packet loss
round-trip min/avg/max/stddev = 11.766/12.035/12.304/0.269 ms
";

    const BSD_UNREACHABLE: &str = "\
PING 10.0.0.99 (10.0.0.99): 56 data bytes
92 bytes from 10.0.0.1: Destination Host Unreachable
Request timeout for icmp_seq 0

--- 10.0.0.99 ping statistics ---
2 packets transmitted, 0 packets received, 100.0% packet loss
";

    const BUSYBOX: &str = "\
PING 8.8.8.8 (8.8.8.8): 56 data bytes
64 bytes from 8.8.8.8: seq=0 ttl=117 time=11.812 ms
64 bytes from 8.8.8.8: seq=1 ttl=117 time=11.950 ms
64 bytes from 8.8.8.8: seq=2 ttl=117 time=12.101 ms
64 bytes from 8.8.8.8: seq=3 ttl=117 time=12.001 ms

--- 8.8.8.8 ping statistics ---
4 packets transmitted, 4 packets received, 0% packet loss
round-trip min/avg/max = 11.812/11.966/12.101 ms
";

    #[test]
    fn test_linux_success() {
        let result = parse_ping_output(LINUX_OK).unwrap();
        assert_eq!(result.layout, OutputLayout::Linux);
        assert_eq!(result.destination, "8.8.8.8");
        assert_eq!(result.destination_ip, "8.8.8.8");
        assert_eq!(result.data_bytes, Some(56));
        assert_eq!(result.packets_transmitted, 4);
        assert_eq!(result.packets_received, 4);
        assert_eq!(result.packet_loss_percent, 0.0);
        assert_eq!(result.time_ms, Some(3004.0));
        assert_eq!(result.round_trip_ms_avg, Some(11.950));
        assert_eq!(result.responses.len(), 4);

        let first = &result.responses[0];
        assert_eq!(first.response_type, ResponseKind::Reply);
        assert_eq!(first.icmp_seq, Some(1));
        assert_eq!(first.ttl, Some(117));
        assert_eq!(first.bytes, Some(64));
        assert_eq!(first.time_ms, Some(11.8));
        assert_eq!(first.response_ip.as_deref(), Some("8.8.8.8"));
        assert!(!first.duplicate);
    }

    #[test]
    fn test_linux_hostname_reply_ip() {
        let result = parse_ping_output(LINUX_HOSTNAME).unwrap();
        assert_eq!(result.destination, "example.com");
        assert_eq!(result.destination_ip, "93.184.216.34");
        assert_eq!(
            result.responses[0].response_ip.as_deref(),
            Some("93.184.216.34")
        );
    }

    #[test]
    fn test_linux_total_loss() {
        let result = parse_ping_output(LINUX_TOTAL_LOSS).unwrap();
        assert_eq!(result.packets_transmitted, 4);
        assert_eq!(result.packets_received, 0);
        assert_eq!(result.packet_loss_percent, 100.0);
        assert!(result.responses.is_empty());
        assert_eq!(result.round_trip_ms_min, None);
    }

    #[test]
    fn test_linux_unreachable_errors() {
        let result = parse_ping_output(LINUX_UNREACHABLE).unwrap();
        assert_eq!(result.errors, 2);
        assert_eq!(result.responses.len(), 2);
        let first = &result.responses[0];
        assert_eq!(first.response_type, ResponseKind::Error);
        assert_eq!(first.response_ip.as_deref(), Some("192.168.1.10"));
        assert_eq!(first.message.as_deref(), Some("Destination Host Unreachable"));
    }

    #[test]
    fn test_linux_ipv6_with_duplicate() {
        let result = parse_ping_output(LINUX_V6).unwrap();
        assert_eq!(result.destination_ip, "::1");
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.responses.len(), 2);
        assert_eq!(result.responses[0].response_ip.as_deref(), Some("::1"));
        assert!(result.responses[1].duplicate);
    }

    #[test]
    fn test_linux_ipv6_hostname_header() {
        let header = "PING ipv6.example.net(host.example.net (2001:db8::1)) 56 data bytes";
        let (layout, destination, ip, bytes) = parse_header(header).unwrap();
        assert_eq!(layout, OutputLayout::Linux);
        assert_eq!(destination, "ipv6.example.net");
        assert_eq!(ip, "2001:db8::1");
        assert_eq!(bytes, 56);
    }

    #[test]
    fn test_linux_timestamps() {
        let result = parse_ping_output(LINUX_TIMESTAMPED).unwrap();
        assert_eq!(result.responses[0].timestamp, Some(1700000000.123456));
    }

    #[test]
    fn test_bsd_with_timeout() {
        let result = parse_ping_output(BSD_OK).unwrap();
        assert_eq!(result.layout, OutputLayout::Bsd);
        assert_eq!(result.packets_transmitted, 3);
        assert_eq!(result.packets_received, 2);
        assert_eq!(result.packet_loss_percent, 33.3);
        assert_eq!(result.time_ms, None);
        assert_eq!(result.round_trip_ms_stddev, Some(0.269));
        assert_eq!(result.responses.len(), 3);
        assert_eq!(result.responses[1].response_type, ResponseKind::Timeout);
        assert_eq!(result.responses[1].icmp_seq, Some(1));
    }

    #[test]
    fn test_bsd_error_line() {
        let result = parse_ping_output(BSD_UNREACHABLE).unwrap();
        assert_eq!(result.packets_received, 0);
        assert_eq!(result.round_trip_ms_avg, None);
        assert_eq!(result.responses.len(), 2);
        let first = &result.responses[0];
        assert_eq!(first.response_type, ResponseKind::Error);
        assert_eq!(first.bytes, Some(92));
        assert_eq!(first.response_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(first.message.as_deref(), Some("Destination Host Unreachable"));
    }

    #[test]
    fn test_busybox_layout_is_rejected() {
        assert_eq!(
            parse_ping_output(BUSYBOX),
            Err(ParseError::UnrecognizedReply(
                "64 bytes from 8.8.8.8: seq=0 ttl=117 time=11.812 ms".to_string()
            ))
        );
    }

    #[test]
    fn test_three_field_round_trip_is_rejected() {
        let text = BUSYBOX.replace(": seq=", ": icmp_seq=");
        assert_eq!(
            parse_ping_output(&text),
            Err(ParseError::MalformedStatistics(
                "round-trip min/avg/max = 11.812/11.966/12.101 ms".to_string()
            ))
        );
    }

    #[test]
    fn test_replies_without_round_trip_line() {
        let text = LINUX_OK.replace("rtt min/avg/max/mdev = 11.812/11.950/12.101/0.107 ms\n", "");
        assert_eq!(parse_ping_output(&text), Err(ParseError::MissingStatistics));
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(parse_ping_output(""), Err(ParseError::Empty));
        assert_eq!(parse_ping_output("  \n\n "), Err(ParseError::Empty));
    }

    #[test]
    fn test_unknown_layout() {
        let windows = "\nPinging 8.8.8.8 with 32 bytes of data:\nReply from 8.8.8.8: bytes=32 time=12ms TTL=117\n";
        assert!(matches!(
            parse_ping_output(windows),
            Err(ParseError::UnknownHeader(_))
        ));
    }

    #[test]
    fn test_truncated_output() {
        let truncated = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=11.8 ms\n";
        assert_eq!(
            parse_ping_output(truncated),
            Err(ParseError::MissingStatistics)
        );
    }

    #[test]
    fn test_malformed_statistics() {
        let text = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\n--- 8.8.8.8 ping statistics ---\n4 paquets transmis, 4 reçus\n";
        assert!(matches!(
            parse_ping_output(text),
            Err(ParseError::MalformedStatistics(_))
        ));
    }

    #[test]
    fn test_parse_error_converts_to_core_error() {
        let err: pb_core::Error = ParseError::Empty.into();
        assert_eq!(err.category(), pb_core::ErrorCategory::Parse);
    }
}
