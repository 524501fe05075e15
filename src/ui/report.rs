use std::fmt;

use crate::session::SessionSummary;
use crate::utils::formatting::{
    format_bytes, format_count, format_duration, format_ip_address, format_rate, truncate_string,
};

/// Plain-text rendering of a session summary for the `summary` command.
pub struct TextReport<'a>(pub &'a SessionSummary);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        if let Some(id) = summary.session_id {
            writeln!(f, "Session {}", id)?;
        }
        self.write_capture(f)?;
        self.write_traffic(f)?;
        self.write_protocols(f)?;
        self.write_conversations(f)?;
        self.write_dns(f)?;
        self.write_hosts(f)?;
        self.write_security(f)?;
        self.write_sizes(f)
    }
}

impl TextReport<'_> {
    fn write_capture(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(capture) = &self.0.capture else {
            return Ok(());
        };
        writeln!(
            f,
            "File: {} ({}, {})",
            capture.file_name,
            format_bytes(capture.file_size),
            capture.link_type
        )?;
        writeln!(f, "MD5:    {}", capture.md5_hash)?;
        writeln!(f, "SHA256: {}", capture.sha256_hash)?;
        if let (Some(first), Some(last)) = (capture.first_packet_utc, capture.last_packet_utc) {
            writeln!(f, "First packet: {}", first.to_rfc3339())?;
            writeln!(f, "Last packet:  {}", last.to_rfc3339())?;
        }
        if let Some(reader) = &self.0.reader {
            writeln!(
                f,
                "Frames: {} read, {} without a network layer",
                format_count(reader.frames_read),
                format_count(reader.undecoded_frames)
            )?;
        }
        writeln!(f)
    }

    fn write_traffic(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let traffic = &self.0.traffic;
        writeln!(
            f,
            "Packets: {} | Bytes: {} | Span: {} | Avg rate: {}",
            format_count(traffic.total_packets),
            format_bytes(traffic.total_bytes),
            format_duration(traffic.duration().as_secs()),
            format_rate(traffic.average_rate()),
        )
    }

    fn write_protocols(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chart = &self.0.protocol_chart;
        writeln!(f, "\nProtocols")?;
        if chart.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for slice in chart.slices.iter().take(self.0.top_protocols.len()) {
            writeln!(
                f,
                "  {:<8} {:>10} {:>6.1}%",
                slice.label,
                format_count(slice.value),
                slice.percentage
            )?;
        }
        Ok(())
    }

    fn write_conversations(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nTop conversations")?;
        for conv in &self.0.top_conversations {
            writeln!(
                f,
                "  {:<26} -> {:<26} {:<5} {:>8} pkts {:>12}",
                format_ip_address(&conv.key.src_ip),
                format_ip_address(&conv.key.dst_ip),
                conv.key.protocol,
                format_count(conv.packet_count),
                format_bytes(conv.total_bytes),
            )?;
        }
        Ok(())
    }

    fn write_dns(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        writeln!(f, "\nTop DNS queries")?;
        if summary.top_queries.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for query in &summary.top_queries {
            writeln!(f, "  {:<48} {:>6}", truncate_string(&query.domain, 48), query.count)?;
        }

        if !summary.top_answers.is_empty() {
            writeln!(f, "\nTop DNS answers")?;
            for answer in &summary.top_answers {
                writeln!(f, "  {:<48} {:>6}", truncate_string(&answer.domain, 48), answer.count)?;
            }
        }

        if !summary.dns_opcodes.is_empty() {
            let opcodes: Vec<String> = summary
                .dns_opcodes
                .iter()
                .map(|(opcode, count)| format!("{} {}", opcode, count))
                .collect();
            writeln!(f, "  Opcodes: {}", opcodes.join(", "))?;
        }
        Ok(())
    }

    fn write_hosts(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        writeln!(f, "\nHosts ({})", summary.network_nodes.len())?;
        for node in &summary.network_nodes {
            let services: Vec<&str> = node.services.iter().map(String::as_str).collect();
            writeln!(
                f,
                "  {:<26} {:<6} {:<6} {}",
                format_ip_address(&node.ip),
                node.role,
                if node.local { "local" } else { "remote" },
                services.join(", "),
            )?;
        }

        writeln!(
            f,
            "\nConnections active in the final minute ({})",
            summary.recent_connections.len()
        )?;
        for conn in &summary.recent_connections {
            writeln!(
                f,
                "  {:<26} -> {:<26} {:<5} x{}",
                format_ip_address(&conn.source),
                format_ip_address(&conn.destination),
                conn.protocol,
                conn.count
            )?;
        }
        Ok(())
    }

    fn write_security(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nSuspicious ports")?;
        if self.0.suspicious_ports.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for port in &self.0.suspicious_ports {
            writeln!(
                f,
                "  {:<6} {:<8} {:>10}",
                port.port,
                port.service,
                format_count(port.count)
            )?;
        }
        Ok(())
    }

    fn write_sizes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nPacket sizes")?;
        for (label, count) in &self.0.traffic_timeline.size_distribution {
            writeln!(f, "  {:<10} {:>10}", label, format_count(*count))?;
        }
        Ok(())
    }
}
