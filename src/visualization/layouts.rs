use ratatui::prelude::*;

/// Header / body / footer split shared by every dashboard tab.
pub struct FrameLayout {
    pub header: Rect,
    pub body: Rect,
    pub footer: Rect,
}

impl FrameLayout {
    pub fn split(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Tab content
                Constraint::Length(3), // Key help
            ])
            .split(area);

        Self {
            header: chunks[0],
            body: chunks[1],
            footer: chunks[2],
        }
    }
}

/// Overview tab: totals on top, charts in the middle, DNS and sizes below.
pub struct OverviewLayout {
    pub stats: Rect,
    pub protocols: Rect,
    pub timeline: Rect,
    pub sizes: Rect,
    pub queries: Rect,
}

impl OverviewLayout {
    pub fn split(body: Rect) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Percentage(50),
                Constraint::Min(6),
            ])
            .split(body);

        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[1]);

        let bottom = if body.width < 80 {
            // Narrow terminals drop the size histogram.
            vec![rows[2], Rect::new(rows[2].x, rows[2].y, 0, 0)]
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(rows[2])
                .to_vec()
        };

        Self {
            stats: rows[0],
            protocols: charts[0],
            timeline: charts[1],
            queries: bottom[0],
            sizes: bottom[1],
        }
    }
}
