use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
};

use crate::analysis::{
    Conversation, NetworkConnection, NetworkNode, NodeRole, PortCount, QueryCount, TrafficSnapshot,
};
use crate::utils::formatting::{
    format_bytes, format_count, format_duration, format_ip_address, format_rate,
};

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.to_vec())
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1)
}

pub fn render_stats_panel(snapshot: &TrafficSnapshot, area: Rect, frame: &mut Frame) {
    let text = vec![
        Line::from(format!(
            "Packets: {} | Bytes: {} | Avg size: {:.0} B",
            format_count(snapshot.total_packets),
            format_bytes(snapshot.total_bytes),
            snapshot.average_packet_size(),
        )),
        Line::from(format!(
            "Span: {} | Avg rate: {}",
            format_duration(snapshot.duration().as_secs()),
            format_rate(snapshot.average_rate()),
        )),
    ];

    let panel = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Capture"))
        .alignment(Alignment::Center);
    frame.render_widget(panel, area);
}

pub fn render_conversation_table(conversations: &[Conversation], area: Rect, frame: &mut Frame) {
    let visible = area.height.saturating_sub(4) as usize;
    let rows: Vec<Row> = conversations
        .iter()
        .take(visible)
        .map(|conv| {
            Row::new(vec![
                Cell::from(format_ip_address(&conv.key.src_ip)),
                Cell::from(format_ip_address(&conv.key.dst_ip)),
                Cell::from(conv.key.protocol.clone()),
                Cell::from(format_count(conv.packet_count)),
                Cell::from(format_bytes(conv.total_bytes)),
            ])
        })
        .collect();

    let table = Table::new(rows)
        .widths(&[
            Constraint::Percentage(28),
            Constraint::Percentage(28),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
            Constraint::Percentage(18),
        ])
        .header(header_row(&["Source", "Destination", "Proto", "Packets", "Bytes"]))
        .block(Block::default().borders(Borders::ALL).title("Top Conversations"));

    frame.render_widget(table, area);
}

pub fn render_node_table(nodes: &[NetworkNode], area: Rect, frame: &mut Frame) {
    let visible = area.height.saturating_sub(4) as usize;
    let rows: Vec<Row> = nodes
        .iter()
        .take(visible)
        .map(|node| {
            let style = match node.role {
                NodeRole::Server => Style::default().fg(Color::Green),
                NodeRole::Client => Style::default().fg(Color::White),
            };
            let services: Vec<&str> = node.services.iter().map(String::as_str).collect();
            Row::new(vec![
                Cell::from(format_ip_address(&node.ip)),
                Cell::from(node.role.to_string()),
                Cell::from(if node.local { "local" } else { "remote" }),
                Cell::from(node.ports.len().to_string()),
                Cell::from(services.join(", ")),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(rows)
        .widths(&[
            Constraint::Percentage(30),
            Constraint::Percentage(10),
            Constraint::Percentage(10),
            Constraint::Percentage(10),
            Constraint::Percentage(40),
        ])
        .header(header_row(&["Host", "Role", "Scope", "Ports", "Services"]))
        .block(Block::default().borders(Borders::ALL).title("Hosts"));

    frame.render_widget(table, area);
}

pub fn render_connection_list(connections: &[NetworkConnection], area: Rect, frame: &mut Frame) {
    let mut sorted: Vec<&NetworkConnection> = connections.iter().collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));

    let items: Vec<ListItem> = sorted
        .iter()
        .take(area.height.saturating_sub(2) as usize)
        .map(|conn| {
            ListItem::new(format!(
                "{} → {} [{}] x{}",
                format_ip_address(&conn.source),
                format_ip_address(&conn.destination),
                if conn.protocol.is_empty() { "?" } else { conn.protocol.as_str() },
                conn.count
            ))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Links"));
    frame.render_widget(list, area);
}

pub fn render_query_list(queries: &[QueryCount], area: Rect, frame: &mut Frame) {
    let items: Vec<ListItem> = if queries.is_empty() {
        vec![ListItem::new("No DNS traffic").style(Style::default().fg(Color::DarkGray))]
    } else {
        queries
            .iter()
            .enumerate()
            .map(|(i, q)| ListItem::new(format!("{:2}. {} ({})", i + 1, q.domain, q.count)))
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Top DNS Queries"));
    frame.render_widget(list, area);
}

pub fn render_port_list(ports: &[PortCount], area: Rect, frame: &mut Frame) {
    let items: Vec<ListItem> = if ports.is_empty() {
        vec![ListItem::new("No suspicious ports").style(Style::default().fg(Color::DarkGray))]
    } else {
        ports
            .iter()
            .map(|p| {
                ListItem::new(format!("{:>5} {:<7} {}", p.port, p.service, format_count(p.count)))
                    .style(Style::default().fg(Color::Red))
            })
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Suspicious Ports"));
    frame.render_widget(list, area);
}
