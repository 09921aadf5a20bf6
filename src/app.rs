use crate::results::{PortfolioSample, ResultTable, SimulationSummary};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;

pub struct App {
    pub should_quit: bool,
    pub show_frontier: bool,
    pub universe: Vec<String>,
    /// (variance, return) points of the whole cloud.
    pub cloud: Vec<(f64, f64)>,
    /// (variance, return) points of the envelope, ascending variance.
    pub frontier: Vec<(f64, f64)>,
    pub summary: SimulationSummary,
}

impl App {
    pub fn new(table: &ResultTable, universe: &[String]) -> Self {
        let to_point = |s: PortfolioSample| (s.variance, s.ret);
        Self {
            should_quit: false,
            show_frontier: true,
            universe: universe.to_vec(),
            cloud: table.rows().map(to_point).collect(),
            frontier: table.efficient_frontier().into_iter().map(to_point).collect(),
            summary: table.summary(),
        }
    }

    /// ((min variance, max variance), (min return, max return)) over the cloud.
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let fold = |pick: fn(&(f64, f64)) -> f64| {
            self.cloud
                .iter()
                .map(pick)
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
        };
        let widen = |(lo, hi): (f64, f64)| {
            if !lo.is_finite() || !hi.is_finite() {
                (0.0, 1.0)
            } else if (hi - lo).abs() < 1e-12 {
                (lo - 0.5, hi + 0.5)
            } else {
                (lo, hi)
            }
        };
        (widen(fold(|p| p.0)), widen(fold(|p| p.1)))
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('f') => self.show_frontier = !self.show_frontier,
            _ => {}
        }
    }

    pub fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ResultTable {
        let mut table = ResultTable::default();
        for (ret, variance) in [(0.1, 0.02), (0.3, 0.08), (0.05, 0.04)] {
            table.push(PortfolioSample { ret, variance });
        }
        table
    }

    #[test]
    fn test_app_points_are_variance_then_return() {
        let app = App::new(&sample_table(), &["A".to_string(), "B".to_string()]);
        assert_eq!(app.cloud[0], (0.02, 0.1));
        assert_eq!(app.frontier, vec![(0.02, 0.1), (0.08, 0.3)]);
        assert_eq!(app.bounds(), ((0.02, 0.08), (0.05, 0.3)));
    }

    #[test]
    fn test_keys_toggle_and_quit() {
        let mut app = App::new(&sample_table(), &["A".to_string()]);
        app.handle_key(KeyCode::Char('f'));
        assert!(!app.show_frontier);
        app.handle_key(KeyCode::Char('x'));
        assert!(!app.should_quit);
        app.handle_key(KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[test]
    fn test_bounds_of_empty_cloud() {
        let app = App::new(&ResultTable::default(), &[]);
        assert_eq!(app.bounds(), ((0.0, 1.0), (0.0, 1.0)));
    }
}
