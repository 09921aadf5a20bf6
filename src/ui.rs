use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use crate::app::App;

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);
    render_dashboard(f, app, layout[1]);
    render_footer(f, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let spans = vec![
        Span::styled(" Markowitz MC ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(app.universe.join(", "), Style::default().fg(Color::Yellow)),
        Span::raw(" | "),
        Span::styled(
            format!("{} portfolios", app.summary.samples),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ];

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled("f: toggle frontier | q/Esc: quit", Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    let ((var_lo, var_hi), (ret_lo, ret_hi)) = app.bounds();

    let mut datasets = vec![Dataset::default()
        .name("Portfolios")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Scatter)
        .style(Style::default().fg(Color::Cyan))
        .data(&app.cloud)];

    if app.show_frontier {
        datasets.push(Dataset::default()
            .name("Frontier")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&app.frontier));
    }

    let label = |v: f64| Span::styled(format!("{:.4}", v), Style::default().fg(Color::Gray));

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    "Return vs Variance",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Variance")
                .style(Style::default().fg(Color::Gray))
                .bounds([var_lo, var_hi])
                .labels(vec![label(var_lo), label(var_hi)]),
        )
        .y_axis(
            Axis::default()
                .title("Return")
                .style(Style::default().fg(Color::Gray))
                .bounds([ret_lo, ret_hi])
                .labels(vec![label(ret_lo), label(ret_hi)]),
        );

    f.render_widget(chart, chunks[0]);

    let mut info_text = vec![
        Line::from(Span::styled("Cloud", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
        Line::from(format!("Samples:  {}", app.summary.samples)),
        Line::from(format!("Frontier: {}", app.summary.frontier_len)),
        Line::from(""),
    ];

    if let Some(s) = app.summary.min_variance {
        info_text.push(Line::from(Span::styled("Min Variance", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))));
        info_text.push(Line::from(format!("Var: {:.6}", s.variance)));
        info_text.push(Line::from(format!("Ret: {:+.4}", s.ret)));
        info_text.push(Line::from(""));
    }
    if let Some(s) = app.summary.max_return {
        info_text.push(Line::from(Span::styled("Max Return", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))));
        info_text.push(Line::from(format!("Var: {:.6}", s.variance)));
        info_text.push(Line::from(format!("Ret: {:+.4}", s.ret)));
    }

    let info_block = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .style(Style::default().fg(Color::White));

    f.render_widget(info_block, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{PortfolioSample, ResultTable};
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_render_shows_summary() {
        let mut table = ResultTable::default();
        for (ret, variance) in [(0.1, 0.02), (0.3, 0.08)] {
            table.push(PortfolioSample { ret, variance });
        }
        let app = App::new(&table, &["AAA".to_string(), "BBB".to_string()]);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Markowitz MC"));
        assert!(text.contains("2 portfolios"));
        assert!(text.contains("Return vs Variance"));
    }
}
