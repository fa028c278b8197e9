pub mod screen;

use std::time::Instant;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::speaking::{Mode, Status};
use crate::util::format_countdown;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Session => render_session(self, area, buf),
            AppState::ConfirmExit => {
                render_session(self, area, buf);
                render_exit_modal(area, buf);
            }
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn status_line(app: &App) -> String {
    let session = &app.session;
    match session.status() {
        Status::Idle => "press (enter) to begin".to_string(),
        Status::ReadingQuestion => "listen to the question".to_string(),
        Status::Watching => match session.current_youtube_url() {
            Some(url) => format!("watch {url}, then (enter) to repeat the phrase"),
            None => "(enter) to repeat the phrase".to_string(),
        },
        Status::Ready => "(enter) to start recording, the examiner leads".to_string(),
        Status::Recording if session.mode() == Mode::Human => {
            "recording  (n)ext question / (f)inish".to_string()
        }
        Status::Recording => "recording  (space) done".to_string(),
        Status::Finished => "finished".to_string(),
    }
}

pub fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);

    if area.width <= HORIZONTAL_MARGIN * 2 {
        return;
    }

    let text = match session.status() {
        Status::Idle => format!(
            "{} ({} mode, {} questions)",
            session.test_id().unwrap_or("speaking test"),
            session.mode(),
            session.total_steps()
        ),
        _ => session
            .current_question()
            .map(|q| q.text.clone())
            .unwrap_or_default(),
    };

    let max_chars_per_line = area.width - (HORIZONTAL_MARGIN * 2);
    let text_lines = if text.width() <= max_chars_per_line as usize {
        1
    } else {
        ((text.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let padding = area.height.saturating_sub(text_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1), // header
                Constraint::Length(padding),
                Constraint::Length(2), // countdown
                Constraint::Length(text_lines),
                Constraint::Length(padding),
                Constraint::Length(1), // status
            ]
            .as_ref(),
        )
        .split(area);

    let part_title = session
        .current_question()
        .and_then(|q| session.parts().iter().find(|p| p.id == q.part_id))
        .map(|p| p.title.as_str())
        .unwrap_or("");
    let mut header = vec![Span::styled(
        format!(
            "{} / {}  {}",
            (session.current_step() + 1).min(session.total_steps()),
            session.total_steps(),
            part_title
        ),
        dim_bold_style,
    )];
    if app.is_locked_down() {
        header.push(Span::styled("  PROCTORED", red_bold_style));
    }
    Paragraph::new(Line::from(header)).render(chunks[0], buf);

    if let Some(left) = app.remaining(Instant::now()) {
        let millis = u64::try_from(left.as_millis()).unwrap_or(u64::MAX);
        Paragraph::new(Span::styled(format_countdown(millis), dim_bold_style))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    } else if session.status() == Status::Recording {
        Paragraph::new(Span::styled("● rec", red_bold_style))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled(text, bold_style))
        .alignment(if text_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    let status = match &app.notice {
        Some(notice) => format!("{}  ({notice})", status_line(app)),
        None => status_line(app),
    };
    Paragraph::new(Span::styled(status, italic_style)).render(chunks[5], buf);
}

pub fn render_exit_modal(area: Rect, buf: &mut Buffer) {
    let width = area.width.min(44);
    let height = area.height.min(5);
    let modal = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );
    Clear.render(modal, buf);
    Paragraph::new(vec![
        Line::from("Leave the test? Your answers so far are kept."),
        Line::from(Span::styled(
            "(y)es, finish / (n)o, keep going",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Exit")
            .border_style(Style::default().fg(Color::Yellow)),
    )
    .render(modal, buf);
}

pub fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Min(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let Some(result) = app.result() else {
        Paragraph::new(Span::styled("no result was stored", italic_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        return;
    };

    let summary = format!(
        "{}  {} of {} answers recorded",
        result.test_id.as_deref().unwrap_or("speaking test"),
        result.recorded_count(),
        result.questions.len()
    );
    Paragraph::new(Span::styled(summary, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let lines: Vec<Line> = if app.session.mode() == Mode::Human {
        result
            .recording_results
            .iter()
            .flatten()
            .map(|r| {
                Line::from(vec![
                    Span::styled("✓ ", green_bold_style),
                    Span::raw(format!("full session  {}", r.audio_url)),
                ])
            })
            .collect()
    } else {
        result
            .questions
            .iter()
            .zip(result.recording_results.iter())
            .map(|(q, r)| match r {
                Some(r) => Line::from(vec![
                    Span::styled("✓ ", green_bold_style),
                    Span::raw(format!("{}  ", q.text)),
                    Span::styled(r.audio_url.clone(), italic_style),
                ]),
                None => Line::from(vec![
                    Span::styled("✗ ", red_bold_style),
                    Span::raw(q.text.clone()),
                ]),
            })
            .collect()
    };
    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    Paragraph::new(Span::styled("(r)etry / (esc)ape", italic_style)).render(chunks[2], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{HostKit, SessionPlan};
    use crate::lockdown::{FullscreenApi, FullscreenError};
    use crate::runtime::AppEvent;
    use crate::speaking::narration::MutedNarrator;
    use crate::speaking::recorder::NoRecorder;
    use crate::speaking::source::{FixtureSource, PartsSource};
    use crate::speaking::storage::MemorySessionStorage;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    struct NoScreen;

    impl FullscreenApi for NoScreen {
        fn is_supported(&self) -> bool {
            false
        }
        fn is_fullscreen(&self) -> bool {
            false
        }
        fn request(&mut self) -> Result<(), FullscreenError> {
            Err(FullscreenError::Unsupported)
        }
        fn exit(&mut self) -> Result<(), FullscreenError> {
            Ok(())
        }
    }

    fn create_test_app(mode: Mode) -> App {
        let parts = FixtureSource.parts_for_test("speaking-sample").unwrap();
        App::new(
            SessionPlan {
                test_id: "speaking-sample".into(),
                parts,
                mode,
                proctored: false,
                open_videos: false,
            },
            HostKit {
                fullscreen: Box::new(NoScreen),
                narrator: Box::new(MutedNarrator),
                recorder: Box::new(NoRecorder),
                history: None,
            },
            Rc::new(RefCell::new(MemorySessionStorage::default())),
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        app.on_event(
            AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)),
            Instant::now(),
        );
    }

    fn rendered(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn idle_screen_names_the_test() {
        let app = create_test_app(Mode::TextToSpeech);
        let text = rendered(&app, Rect::new(0, 0, 100, 24));
        assert!(text.contains("speaking-sample"));
        assert!(text.contains("press (enter) to begin"));
    }

    #[test]
    fn recording_shows_question_and_countdown() {
        let mut app = create_test_app(Mode::TextToSpeech);
        press(&mut app, KeyCode::Enter);
        let question = app.session.current_question().unwrap().text.clone();
        let text = rendered(&app, Rect::new(0, 0, 120, 24));
        assert!(text.contains(&question));
        assert!(text.contains("recording"));
        assert!(text.contains("0:"));
    }

    #[test]
    fn exit_modal_overlays_the_session() {
        let mut app = create_test_app(Mode::TextToSpeech);
        app.state = AppState::ConfirmExit;
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("Leave the test?"));
    }

    #[test]
    fn results_list_every_question() {
        let mut app = create_test_app(Mode::TextToSpeech);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('f'));
        let window = Duration::from_millis(app.session.current_step_duration_ms());
        app.on_tick(Instant::now() + window);
        assert_eq!(app.state, AppState::Results);
        let text = rendered(&app, Rect::new(0, 0, 160, 40));
        assert!(text.contains("2 of 6 answers recorded"));
        assert!(text.contains("✗"));
    }

    #[test]
    fn tiny_areas_do_not_panic() {
        let mut app = create_test_app(Mode::Human);
        for (w, h) in [(1, 1), (10, 2), (12, 4), (200, 3)] {
            rendered(&app, Rect::new(0, 0, w, h));
        }
        app.state = AppState::ConfirmExit;
        rendered(&app, Rect::new(0, 0, 3, 2));
    }
}
