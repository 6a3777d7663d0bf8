use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::taskpane::StatusKind;
use crate::taskpane::state::{AppState, Focus};

pub fn render(f: &mut Frame, state: &AppState) {
    let [header, input, draft, status, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(4),
        Constraint::Length(4),
        Constraint::Length(1),
    ])
    .margin(1)
    .areas(f.area());

    f.render_widget(
        Paragraph::new(Span::styled(
            state.debug_info.clone(),
            Style::default().fg(Color::DarkGray),
        )),
        header,
    );

    let input_border = if state.focus == Focus::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let input_block = Block::default()
        .title(" Recipient email ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border));
    f.render_widget(Paragraph::new(state.input.as_str()).block(input_block), input);

    if state.focus == Focus::Help {
        render_help(f, draft);
    } else {
        render_draft(f, state, draft);
    }

    let (color, text) = match &state.status {
        Some(s) => (
            match s.kind {
                StatusKind::Success => Color::Green,
                StatusKind::Error => Color::Red,
                StatusKind::Info => Color::Cyan,
            },
            s.message.clone(),
        ),
        None => (Color::Gray, "Enter an email and press Enter to look up its CID.".to_string()),
    };
    let status_block = Block::default().title(" Status ").borders(Borders::ALL);
    f.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(color)))
            .block(status_block)
            .wrap(Wrap { trim: true }),
        status,
    );

    let hint = Paragraph::new(Line::from(vec![
        Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" lookup  "),
        Span::styled("F2", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" apply  "),
        Span::styled("F3", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" register  "),
        Span::styled("F4", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" add  "),
        Span::styled("F1", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" help  "),
        Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]));
    f.render_widget(hint, footer);
}

fn render_draft(f: &mut Frame, state: &AppState, area: ratatui::layout::Rect) {
    let block = Block::default().title(" Draft ").borders(Borders::ALL);
    let lines = match &state.draft {
        Some(d) => vec![
            Line::from(vec![
                Span::styled("Subject: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(d.subject()),
            ]),
            Line::from(
                d.notices()
                    .into_iter()
                    .map(|(_, n)| n.message)
                    .collect::<Vec<_>>()
                    .join(" | "),
            ),
        ],
        None => vec![Line::from("No message open. F2 previews the typed address.")],
    };
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn render_help(f: &mut Frame, area: ratatui::layout::Rect) {
    let block = Block::default().title(" Help ").borders(Borders::ALL);
    let text = "Enter looks up the typed address in the CID Register.\n\
                F2 tags the open draft's subject from its recipients.\n\
                F3 opens the register list, F4 its new-item form.\n\
                Backspace edits, Delete clears the input.";
    f.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), area);
}
