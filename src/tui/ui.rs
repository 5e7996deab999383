//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use super::app::DebuggerApp;

/// Bytes shown per memory row.
const ROW_BYTES: usize = 8;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, registers, status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: program screen, memory, help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_screen(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw disassembly around the current PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = rows
        .iter()
        .map(|(addr, text, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}0x{:04X}: {}", bp, prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register and flag state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;

    let content = vec![
        Line::from(vec![
            Span::raw("R0: "),
            Span::styled(format!("0x{:04X}", regs.r[0]), Style::default().fg(Color::White)),
            Span::raw("   R1: "),
            Span::styled(format!("0x{:04X}", regs.r[1]), Style::default().fg(Color::White)),
            Span::raw("   R2: "),
            Span::styled(format!("0x{:04X}", regs.r[2]), Style::default().fg(Color::White)),
            Span::raw("   R3: "),
            Span::styled(format!("0x{:04X}", regs.r[3]), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("0x{:04X}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   SP: "),
            Span::styled(format!("0x{:04X}", regs.sp), Style::default().fg(Color::Magenta)),
            Span::raw("   ZF: "),
            Span::styled(
                format!("{}", regs.zf as u8),
                if regs.zf {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Gray)
                },
            ),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   Ticks: "),
            Span::styled(format!("{}", app.cpu.io.ticks()), Style::default().fg(Color::Cyan)),
            Span::raw("   Key: "),
            Span::styled(
                if app.cpu.io.key_pending() { "pending" } else { "none" },
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(
                format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                },
            ),
            Span::raw("   Input: "),
            Span::styled(
                if app.input_mode { "VM" } else { "debugger" },
                if app.input_mode {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::Gray)
                },
            ),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the program's screen output.
fn draw_screen(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let text = String::from_utf8_lossy(app.cpu.io.screen_contents()).into_owned();

    let paragraph = Paragraph::new(text)
        .block(Block::default()
            .title(" Screen ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(paragraph, area);
}

/// Draw memory hex view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let total_rows = app.cpu.mem.size() / ROW_BYTES;
    let start_row = app.mem_scroll.min(total_rows.saturating_sub(1));

    let items: Vec<ListItem> = (start_row..(start_row + visible_rows).min(total_rows))
        .map(|row| {
            let addr = (row * ROW_BYTES) as u16;
            let bytes = app.cpu.mem.dump(addr, ROW_BYTES);

            let hex: Vec<String> = bytes.iter().map(|(_, b)| format!("{:02X}", b)).collect();
            let ascii: String = bytes
                .iter()
                .map(|(_, b)| if b.is_ascii_graphic() { *b as char } else { '.' })
                .collect();

            let pc_row = (app.cpu.regs.pc as usize) / ROW_BYTES == row;
            let all_zero = bytes.iter().all(|(_, b)| *b == 0);

            let style = if pc_row {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if all_zero {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };

            ListItem::new(format!("0x{:04X}: {} |{}|", addr, hex.join(" "), ascii)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  x: Reset"),
        Line::from("i: Send keys to VM (Esc leaves)  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
