use ratatui::{
    prelude::*,
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table},
};

use humansize::{format_size, DECIMAL};

use super::widgets::{
    colored_gauge, format_duration, format_sample, history_sparkline, level_color, unavailable,
};
use crate::core::system_monitor::sources::{
    BATTERY_ID, BATTERY_PLUGGED_ID, BATTERY_TIME_LEFT_ID, CONTAINERS_ID, CONTAINER_CPU_FAMILY,
    CONTAINER_MEM_FAMILY, CPU_CORE_FAMILY, CPU_FREQ_ID, CPU_ID, CPU_TEMP_ID, DISK_FAMILY, GPU_ID,
    GPU_MEMORY_ID, GPU_TEMP_ID, LOAD_AVG_FAMILY, MEMORY_ID, MEMORY_TOTAL_ID, MEMORY_USED_ID,
    NET_RX_FAMILY, NET_RX_TOTAL_ID, NET_TX_FAMILY, NET_TX_TOTAL_ID, SWAP_ID, SWAP_TOTAL_ID,
    SWAP_USED_ID,
};
use crate::core::system_monitor::{
    AlertLevel, MetricId, PanelId, SessionState, Snapshot, ViewMode,
};

/// Main render function. Reads both inputs, mutates neither.
pub fn render_ui(frame: &mut Frame, snapshot: &Snapshot, session: &SessionState, top_processes: usize) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Active view
            Constraint::Length(1), // Footer
        ])
        .split(area);

    render_header(frame, chunks[0], snapshot, session);
    match session.view_mode {
        ViewMode::Main => render_main_view(frame, chunks[1], snapshot, session, top_processes),
        ViewMode::Containers => render_containers_view(frame, chunks[1], snapshot),
        ViewMode::Alerts => render_alerts_view(frame, chunks[1], snapshot),
    }
    render_footer(frame, chunks[2], session);

    if session.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect, snapshot: &Snapshot, session: &SessionState) {
    let host = &snapshot.host;
    let worst = snapshot.worst_level();

    let title = format!(
        " {} │ Uptime: {} │ Refresh: {}ms │ Alerts: {} ",
        host.hostname,
        format_duration(host.uptime_secs(snapshot.taken_at)),
        session.poll_interval_ms,
        worst
    );

    let view = match session.view_mode {
        ViewMode::Main => "[1] Main",
        ViewMode::Containers => "[2] Containers",
        ViewMode::Alerts => "[3] Alerts",
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(level_color(worst)));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(format!(" {}  (tick #{})", view, snapshot.sequence)),
        inner,
    );
}

fn render_main_view(
    frame: &mut Frame,
    area: Rect,
    snapshot: &Snapshot,
    session: &SessionState,
    top_processes: usize,
) {
    // CPU spans the full width; the rest pair up two per row
    let paired: Vec<PanelId> = PanelId::ALL
        .into_iter()
        .filter(|p| *p != PanelId::Cpu && session.is_visible(*p))
        .collect();
    let pairs: Vec<&[PanelId]> = paired.chunks(2).collect();

    let mut constraints = Vec::new();
    if session.is_visible(PanelId::Cpu) {
        constraints.push(Constraint::Length(10));
    }
    constraints.extend(pairs.iter().map(|_| Constraint::Length(6)));
    constraints.push(Constraint::Min(4)); // Processes

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next_row = 0;
    if session.is_visible(PanelId::Cpu) {
        render_cpu_panel(frame, rows[0], snapshot);
        next_row = 1;
    }
    for pair in &pairs {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[next_row]);
        for (panel, col) in pair.iter().zip(cols.iter()) {
            render_panel(frame, *col, snapshot, *panel);
        }
        next_row += 1;
    }

    render_processes_section(frame, rows[next_row], snapshot, session, top_processes);
}

fn render_panel(frame: &mut Frame, area: Rect, snapshot: &Snapshot, panel: PanelId) {
    let block = Block::default()
        .title(format!(" {} ", panel.title()))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    match panel {
        PanelId::System => render_system(frame, inner, snapshot),
        PanelId::Memory => render_memory(frame, inner, snapshot),
        PanelId::Disk => {
            let disks: Vec<MetricId> = snapshot
                .family(DISK_FAMILY)
                .map(|s| s.metric_id.clone())
                .collect();
            if disks.is_empty() {
                frame.render_widget(unavailable("disks"), inner);
            } else {
                let ids: Vec<&str> = disks.iter().map(|id| id.as_str()).collect();
                render_gauges(frame, inner, snapshot, &ids);
            }
        }
        PanelId::Network => render_network(frame, inner, snapshot),
        PanelId::Gpu => {
            if snapshot.is_unavailable(GPU_ID) {
                frame.render_widget(unavailable("GPU"), inner);
            } else {
                render_gauges(frame, inner, snapshot, &[GPU_ID, GPU_MEMORY_ID, GPU_TEMP_ID]);
            }
        }
        PanelId::Battery => render_battery(frame, inner, snapshot),
        PanelId::Cpu => render_gauges(frame, inner, snapshot, &[CPU_ID]),
    }
}

fn render_system(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let host = &snapshot.host;
    let lines = vec![
        Line::from(format!("Host:   {}", host.hostname)),
        Line::from(format!("OS:     {} {}", host.os_name, host.os_version)),
        Line::from(format!("Kernel: {}", host.kernel_version)),
        Line::from(format!("CPU:    {} ({} cores)", host.cpu_brand, host.core_count)),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

/// One gauge line per metric, or a grey placeholder when it is unavailable.
fn render_gauges(frame: &mut Frame, area: Rect, snapshot: &Snapshot, ids: &[&str]) {
    let shown = ids.len().min(area.height as usize);
    if shown == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); shown])
        .split(area);

    for (id, row) in ids.iter().zip(layout.iter()) {
        let sample = snapshot.sample(id);
        match sample.and_then(|s| s.value) {
            Some(value) => {
                // Temperatures are drawn against a 0-100 scale too
                let label = gauge_label(snapshot, id);
                frame.render_widget(colored_gauge(value, label, snapshot.alert_level(id)), *row);
            }
            None => frame.render_widget(unavailable(id), *row),
        }
    }
}

/// `memory 52.0% (8.2 GB / 16.0 GB)`; the sizes are left out when unknown.
fn gauge_label(snapshot: &Snapshot, id: &str) -> String {
    let label = format!("{} {}", id, format_sample(snapshot.sample(id)));
    let sizes = match id {
        MEMORY_ID => (MEMORY_USED_ID, MEMORY_TOTAL_ID),
        SWAP_ID => (SWAP_USED_ID, SWAP_TOTAL_ID),
        _ => return label,
    };
    match (snapshot.sample(sizes.0), snapshot.sample(sizes.1)) {
        (Some(used), Some(total)) if used.is_available() && total.is_available() => format!(
            "{} ({} / {})",
            label,
            format_sample(Some(used)),
            format_sample(Some(total))
        ),
        _ => label,
    }
}

/// Gauges on the left, a trend line on the right when there is room.
fn split_for_trend(area: Rect) -> Option<(Rect, Rect)> {
    if area.width < 40 {
        return None;
    }
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    Some((cols[0], cols[1]))
}

fn render_memory(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let ids = [MEMORY_ID, SWAP_ID];
    let Some((gauges, trend)) = split_for_trend(area) else {
        render_gauges(frame, area, snapshot, &ids);
        return;
    };

    render_gauges(frame, gauges, snapshot, &ids);
    let sparkline = history_sparkline(
        " History ".to_string(),
        snapshot.history(MEMORY_ID),
        trend.width,
        Some(1000), // percent scaled by 10
        level_color(snapshot.alert_level(MEMORY_ID)),
    );
    frame.render_widget(sparkline, trend);
}

fn render_battery(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    if snapshot.is_unavailable(BATTERY_ID) {
        frame.render_widget(unavailable("battery"), area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);
    render_gauges(frame, rows[0], snapshot, &[BATTERY_ID]);
    frame.render_widget(Paragraph::new(battery_status(snapshot)), rows[1]);
}

/// `Charging, 1h 30m to full`, `On battery, 2h 5m left` or `Plugged in`.
fn battery_status(snapshot: &Snapshot) -> String {
    let time_left = snapshot
        .sample(BATTERY_TIME_LEFT_ID)
        .filter(|s| s.is_available())
        .map(|s| format_sample(Some(s)));

    match (snapshot.value(BATTERY_PLUGGED_ID), time_left) {
        (Some(plugged), Some(left)) if plugged > 0.0 => format!("Charging, {} to full", left),
        (Some(plugged), None) if plugged > 0.0 => "Plugged in".to_string(),
        (Some(_), Some(left)) => format!("On battery, {} left", left),
        (Some(_), None) => "On battery".to_string(),
        (None, _) => "Power state unknown".to_string(),
    }
}

/// Panel title: brand, usage, clock, temperature and load when known.
fn cpu_title(snapshot: &Snapshot) -> String {
    let mut title = format!(
        " CPU: {} ({} cores) │ Avg: {}",
        snapshot.host.cpu_brand,
        snapshot.host.core_count,
        format_sample(snapshot.sample(CPU_ID))
    );
    if let Some(freq) = snapshot.sample(CPU_FREQ_ID).filter(|s| s.is_available()) {
        title.push_str(&format!(" @ {}", format_sample(Some(freq))));
    }
    if let Some(temp) = snapshot.sample(CPU_TEMP_ID).filter(|s| s.is_available()) {
        title.push_str(&format!(" │ Temp: {}", format_sample(Some(temp))));
    }

    let load: Vec<f64> = [1, 5, 15]
        .iter()
        .map(|minutes| MetricId::instance(LOAD_AVG_FAMILY, minutes))
        .filter_map(|id| snapshot.value(id.as_str()))
        .collect();
    if let &[one, five, fifteen] = load.as_slice() {
        title.push_str(&format!(" │ Load: {:.2} {:.2} {:.2}", one, five, fifteen));
    }
    title.push(' ');
    title
}

fn render_cpu_panel(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    // Hot CPU colors the frame even when usage is calm
    let level = snapshot
        .alert_level(CPU_ID)
        .max(snapshot.alert_level(CPU_TEMP_ID));
    let block = Block::default()
        .title(cpu_title(snapshot))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(level_color(level)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if snapshot.is_unavailable(CPU_ID) {
        frame.render_widget(unavailable("cpu"), inner);
        return;
    }

    let cores: Vec<MetricId> = snapshot
        .family(CPU_CORE_FAMILY)
        .map(|s| s.metric_id.clone())
        .collect();
    let mut ids: Vec<&str> = vec![CPU_ID];
    ids.extend(cores.iter().map(|id| id.as_str()));

    // Only split if we have enough space for sparkline
    if inner.height < 3 || inner.width < 60 {
        render_gauges(frame, inner, snapshot, &ids);
        return;
    }

    let cpu_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    render_gauges(frame, cpu_chunks[0], snapshot, &ids);

    let history_data = snapshot
        .history(CPU_ID)
        .map(|series| series.as_u64())
        .unwrap_or_default();
    if history_data.is_empty() || cpu_chunks[1].width <= 4 {
        return;
    }

    // Each bar needs bar_width + bar_gap columns
    let inner_width = cpu_chunks[1].width.saturating_sub(2) as usize;
    let bar_width: u16 = 1;
    let bar_gap: u16 = 1;
    let max_bars = (inner_width / (bar_width + bar_gap) as usize).min(history_data.len());
    let start_idx = history_data.len().saturating_sub(max_bars);
    let data_to_show: Vec<(&str, u64)> = history_data[start_idx..]
        .iter()
        .map(|&val| ("", val))
        .collect();

    let chart = BarChart::default()
        .block(Block::default().title("History").borders(Borders::ALL))
        .direction(Direction::Vertical)
        .bar_width(bar_width)
        .bar_gap(bar_gap)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .data(&data_to_show)
        .max(1000); // percent scaled by 10

    frame.render_widget(chart, cpu_chunks[1]);
}

fn render_network(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let area = match split_for_trend(area) {
        Some((table, trend)) => {
            render_network_trend(frame, trend, snapshot);
            table
        }
        None => area,
    };

    let rows: Vec<Row> = snapshot
        .family(NET_RX_FAMILY)
        .filter_map(|rx| {
            let name = rx.metric_id.instance_name()?;
            let tx = MetricId::instance(NET_TX_FAMILY, name);
            Some(Row::new(vec![
                Cell::from(name.to_string()),
                Cell::from(format!("↓ {}", format_sample(Some(rx)))),
                Cell::from(format!("↑ {}", format_sample(snapshot.sample(tx.as_str())))),
            ]))
        })
        .take(area.height as usize)
        .collect();

    if rows.is_empty() {
        frame.render_widget(unavailable("network"), area);
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ],
    );
    frame.render_widget(table, area);
}

/// Total receive and transmit rates over time, one line each.
fn render_network_trend(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for ((id, arrow, color), row) in [
        (NET_RX_TOTAL_ID, "↓", Color::Green),
        (NET_TX_TOTAL_ID, "↑", Color::Magenta),
    ]
    .into_iter()
    .zip(rows.iter())
    {
        let title = format!("{} total {}", arrow, format_sample(snapshot.sample(id)));
        let sparkline = history_sparkline(title, snapshot.history(id), row.width, None, color);
        frame.render_widget(sparkline, *row);
    }
}

fn render_processes_section(
    frame: &mut Frame,
    area: Rect,
    snapshot: &Snapshot,
    session: &SessionState,
    top_processes: usize,
) {
    let block = Block::default()
        .title(format!(
            " Processes (sort: {}) [c/m/p/n] ",
            session.sort_key.label()
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Header + at least one row
    if inner.height < 2 {
        return;
    }

    let header = Row::new(vec![
        Cell::from("PID").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Name").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("CPU %").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Memory").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Mem %").style(Style::default().add_modifier(Modifier::BOLD)),
    ])
    .height(1);

    let limit = top_processes.min(inner.height.saturating_sub(1) as usize);
    let rows: Vec<Row> = snapshot
        .processes_sorted(session.sort_key, limit)
        .into_iter()
        .map(|proc| {
            Row::new(vec![
                Cell::from(proc.pid.to_string()),
                Cell::from(proc.name),
                Cell::from(format!("{:.1}%", proc.cpu_usage_percent)),
                Cell::from(format_size(proc.memory_bytes, DECIMAL)),
                Cell::from(format!("{:.1}%", proc.memory_percent)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(45),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(8),
        ],
    )
    .header(header);
    frame.render_widget(table, inner);
}

fn render_containers_view(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = Block::default()
        .title(format!(
            " Containers ({}) ",
            format_sample(snapshot.sample(CONTAINERS_ID))
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if snapshot.is_unavailable(CONTAINERS_ID) {
        frame.render_widget(unavailable("container runtime"), inner);
        return;
    }

    let header = Row::new(vec!["Name", "CPU %", "Mem %", "Level"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = snapshot
        .family(CONTAINER_CPU_FAMILY)
        .filter_map(|cpu| {
            let name = cpu.metric_id.instance_name()?;
            let mem = MetricId::instance(CONTAINER_MEM_FAMILY, name);
            let level = snapshot
                .alert_level(cpu.metric_id.as_str())
                .max(snapshot.alert_level(mem.as_str()));
            Some(Row::new(vec![
                Cell::from(name.to_string()),
                Cell::from(format_sample(Some(cpu))),
                Cell::from(format_sample(snapshot.sample(mem.as_str()))),
                Cell::from(level.to_string()).style(Style::default().fg(level_color(level))),
            ]))
        })
        .collect();

    if rows.is_empty() {
        frame.render_widget(
            Paragraph::new("No running containers").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(46),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header);
    frame.render_widget(table, inner);
}

fn render_alerts_view(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    // Current levels, worst first
    let mut levels: Vec<(&MetricId, AlertLevel)> = snapshot
        .alert_levels
        .iter()
        .map(|(id, level)| (id, *level))
        .collect();
    levels.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let level_rows: Vec<Row> = levels
        .into_iter()
        .map(|(id, level)| {
            Row::new(vec![
                Cell::from(id.to_string()),
                Cell::from(format_sample(snapshot.sample(id.as_str()))),
                Cell::from(level.to_string()).style(Style::default().fg(level_color(level))),
            ])
        })
        .collect();
    let levels_table = Table::new(
        level_rows,
        [
            Constraint::Percentage(50),
            Constraint::Length(12),
            Constraint::Length(10),
        ],
    )
    .header(Row::new(vec!["Metric", "Value", "Level"]).style(Style::default().add_modifier(Modifier::BOLD)))
    .block(Block::default().title(" Alert State ").borders(Borders::ALL));
    frame.render_widget(levels_table, chunks[0]);

    let block = Block::default().title(" Alert Log ").borders(Borders::ALL);
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);

    if snapshot.alert_log.is_empty() {
        frame.render_widget(
            Paragraph::new("No alerts raised").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let lines: Vec<Line> = snapshot
        .recent_alerts(inner.height as usize)
        .map(|event| {
            Line::from(vec![
                Span::styled(
                    event.timestamp.format("%H:%M:%S ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<8} ", event.to_level),
                    Style::default()
                        .fg(level_color(event.to_level))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(event.message.clone()),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_footer(frame: &mut Frame, area: Rect, session: &SessionState) {
    let help = format!(
        " q: Quit │ ?: Help │ 1/2/3: View │ +/-: Interval ({}ms) │ S C M D N G B: Panels ",
        session.poll_interval_ms
    );
    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = r#"
    sysdash - Help

    Keyboard Shortcuts:
    ─────────────────────────────────────
    q / Esc       Quit
    ? / h         Toggle this help screen
    1 / 2 / 3     Main / Containers / Alerts view
    c m p n       Sort processes by CPU / memory / PID / name
    S C M D N G B Toggle System / CPU / Memory / Disk /
                  Network / GPU / Battery panels
    + / -         Slower / faster refresh
    "#;

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::DarkGray));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .alignment(Alignment::Left);

    // Center the help popup
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(paragraph, popup_area);
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
