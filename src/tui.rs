use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::api::CuratorApi;
use crate::controller::{Controller, FlowState, SearchParams};
use crate::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Results,
    ManifestModal,
    ManifestsList,
    Help,
}

/// Interactive shell. All actions go through the command line at the bottom;
/// the console panel mirrors every command and backend response.
pub struct Tui<A: CuratorApi> {
    controller: Controller<A>,
    view: View,
    input: String,
    history: Vec<String>,
    history_index: Option<usize>,
    results_scroll: u16,
    year: Option<String>,
    has_reads_only: bool,
    manifest_name: String,
    manifest_desc: String,
    manifest_tags: String,
}

impl<A: CuratorApi> Tui<A> {
    pub fn new(controller: Controller<A>, year: Option<String>) -> Self {
        Self {
            controller,
            view: View::Results,
            input: String::new(),
            history: Vec::new(),
            history_index: None,
            results_scroll: 0,
            year,
            has_reads_only: false,
            manifest_name: String::new(),
            manifest_desc: String::new(),
            manifest_tags: String::new(),
        }
    }

    pub fn run(&mut self) -> miette::Result<()> {
        self.controller.log_info("NCBI SRA Manifest Curator ready.");
        self.controller
            .log_info("Type `help` for commands; `search <terms>` to begin.");

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            terminal
                .draw(|frame| draw_ui(frame, self))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::F(1) => {
                self.view = View::Help;
                return false;
            }
            KeyCode::F(2) => {
                self.view = View::Results;
                return false;
            }
            KeyCode::F(3) => {
                self.controller.load_manifests();
                self.view = View::ManifestsList;
                return false;
            }
            _ => {}
        }

        match key.code {
            KeyCode::Esc => match self.view {
                View::Results => return true,
                View::ManifestModal => {
                    self.controller.close_modal();
                    self.view = View::Results;
                }
                _ => self.view = View::Results,
            },
            KeyCode::Enter => {
                if let Some(command) = self.take_command() {
                    return self.execute_command(&command);
                }
            }
            KeyCode::Up => self.history_up(),
            KeyCode::Down => self.history_down(),
            KeyCode::PageUp => {
                self.results_scroll = self.results_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                self.results_scroll = self.results_scroll.saturating_add(5);
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(ch) => self.input.push(ch),
            _ => {}
        }
        false
    }

    fn take_command(&mut self) -> Option<String> {
        let current = self.input.trim().to_string();
        if current.is_empty() {
            return None;
        }
        self.history.push(current.clone());
        self.history_index = None;
        self.input.clear();
        Some(current)
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_index {
            Some(index) if index > 0 => index - 1,
            Some(_) => 0,
            None => self.history.len().saturating_sub(1),
        };
        self.history_index = Some(next);
        if let Some(value) = self.history.get(next).cloned() {
            self.input = value;
        }
    }

    fn history_down(&mut self) {
        if self.history.is_empty() {
            return;
        }
        match self.history_index {
            Some(index) if index + 1 < self.history.len() => {
                self.history_index = Some(index + 1);
                if let Some(value) = self.history.get(index + 1).cloned() {
                    self.input = value;
                }
            }
            _ => {
                self.history_index = None;
                self.input.clear();
            }
        }
    }

    /// Returns true when the shell should exit.
    fn execute_command(&mut self, command: &str) -> bool {
        let (verb, rest) = match command.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (command, ""),
        };

        match (self.view, verb) {
            (_, "help") => self.view = View::Help,
            (_, "quit") | (_, "exit") => return true,
            (_, "db") => match rest.parse::<crate::domain::Database>() {
                Ok(database) => {
                    self.controller.state_mut().database = database;
                    self.controller.log_cmd(format!("database = {database}"));
                }
                Err(err) => self.controller.log_error(err.to_string()),
            },
            (_, "year") => {
                if rest.is_empty() || rest == "off" {
                    self.year = None;
                    self.controller.log_cmd("year filter cleared");
                } else {
                    self.year = Some(rest.to_string());
                    self.controller.log_cmd(format!("year = {rest}"));
                }
            }
            (_, "reads") => {
                self.has_reads_only = rest == "on";
                self.controller
                    .log_cmd(format!("has-reads-only = {}", self.has_reads_only));
            }
            (_, "search") => {
                if rest.is_empty() {
                    self.controller.log_error("search requires query terms");
                } else {
                    let params = SearchParams {
                        query: rest.to_string(),
                        year: self.year.clone(),
                        has_reads_only: self.has_reads_only,
                    };
                    self.results_scroll = 0;
                    self.controller.submit_search(&params);
                    self.view = View::Results;
                }
            }
            (_, "expand") => {
                if rest.is_empty() {
                    self.controller.log_error("expand requires a study accession");
                } else {
                    self.controller.toggle_expand(&rest.to_uppercase());
                }
            }
            (_, "collapse") => {
                if let Some(acc) = self.controller.state().expanded_study.clone() {
                    self.controller.toggle_expand(&acc);
                }
            }
            (_, "check") | (_, "uncheck") => {
                let checked = verb == "check";
                let Some(study) = self.controller.state().expanded_study.clone() else {
                    self.controller.log_error("no study expanded");
                    return false;
                };
                self.controller
                    .state_mut()
                    .select_run(&study, &rest.to_uppercase(), checked);
            }
            (_, "all") => {
                let Some(study) = self.controller.state().expanded_study.clone() else {
                    self.controller.log_error("no study expanded");
                    return false;
                };
                self.controller
                    .state_mut()
                    .select_all_runs(&study, rest != "off");
            }
            (_, "add") => {
                let Some(study) = self.controller.state().expanded_study.clone() else {
                    self.controller.log_error("no study expanded");
                    return false;
                };
                self.controller.add_selected(&study);
            }
            (_, "manifest") => {
                self.controller.open_manifest_modal();
                self.view = View::ManifestModal;
            }
            (_, "manifests") => {
                self.controller.load_manifests();
                self.view = View::ManifestsList;
            }
            (View::ManifestModal, "remove") => {
                self.controller.remove_staged(&rest.to_uppercase());
            }
            (View::ManifestModal, "drop") | (View::ManifestModal, "keep") => {
                let keep = verb == "keep";
                let run = rest.to_uppercase();
                let owner = if keep {
                    // An unchecked run is gone from the staged list, so the
                    // owning study comes from the cached run lists instead.
                    self.controller
                        .state()
                        .study_runs
                        .iter()
                        .find(|(_, runs)| runs.iter().any(|r| r.accession == run))
                        .map(|(key, _)| key.clone())
                } else {
                    self.controller
                        .state()
                        .staged
                        .iter()
                        .find(|s| s.runs.iter().any(|r| r.accession == run))
                        .map(|s| s.accession.clone())
                };
                match owner {
                    Some(study) => self.controller.set_staged_run_checked(&study, &run, keep),
                    None => self.controller.log_error(format!("{run} is not staged")),
                }
            }
            (View::ManifestModal, "name") => self.manifest_name = rest.to_string(),
            (View::ManifestModal, "desc") => self.manifest_desc = rest.to_string(),
            (View::ManifestModal, "tags") => self.manifest_tags = rest.to_string(),
            (View::ManifestModal, "approve") => {
                let name = self.manifest_name.clone();
                let desc = self.manifest_desc.clone();
                let tags = self.manifest_tags.clone();
                let tags = (!tags.is_empty()).then_some(tags);
                self.controller
                    .approve_manifest(&name, &desc, tags.as_deref());
                if self.controller.flow() == FlowState::Approved {
                    self.manifest_name.clear();
                    self.manifest_desc.clear();
                    self.manifest_tags.clear();
                    self.view = View::Results;
                }
            }
            (View::ManifestsList, "approve") => {
                self.controller.approve_from_list(&rest.to_string());
            }
            (View::ManifestsList, "import") if !rest.is_empty() => {
                self.controller.import_from_list(rest);
            }
            (_, "import") => self.controller.load_to_hox(),
            (_, "status") => self.controller.poll_import_status(),
            (_, "dismiss") => self.controller.dismiss_approval(),
            _ => self
                .controller
                .log_error(format!("unknown command: {command}")),
        }
        false
    }
}

fn draw_ui<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, tui, chunks[0]);
    match tui.view {
        View::Results => draw_results(frame, tui, chunks[1]),
        View::ManifestModal => draw_manifest_modal(frame, tui, chunks[1]),
        View::ManifestsList => draw_manifests_list(frame, tui, chunks[1]),
        View::Help => draw_help(frame, chunks[1]),
    }
    draw_console(frame, tui, chunks[2]);
    draw_command_line(frame, tui, chunks[3]);
}

fn draw_header<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let state = tui.controller.state();
    let staged = state.staged_run_count();
    let mut spans = vec![
        Span::styled(
            "SRA CURATOR",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!("   db: {}", state.database)),
    ];
    if let Some(year) = &tui.year {
        spans.push(Span::raw(format!("   year: {year}")));
    }
    if tui.has_reads_only {
        spans.push(Span::raw("   has-reads-only"));
    }

    let banner = if let Some(approved) = tui.controller.approval_banner() {
        Line::from(Span::styled(
            format!(
                "Manifest \"{}\" approved ({} runs) — `import` loads to HOX, `dismiss` hides this",
                approved.name, approved.run_count
            ),
            Style::default().fg(Color::Green),
        ))
    } else if staged > 0 {
        let studies = state.staged.len();
        let run_plural = if staged > 1 { "s" } else { "" };
        let study_plural = if studies > 1 { "ies" } else { "y" };
        Line::from(Span::styled(
            format!("{staged} run{run_plural} staged from {studies} stud{study_plural} — `manifest` to review"),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from("")
    };

    let header = Paragraph::new(vec![Line::from(spans), banner])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn draw_results<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let state = tui.controller.state();
    let lines = if tui.controller.flow() == FlowState::Searching {
        vec![Line::from(Span::styled(
            format!("Searching {}...", state.database.to_string().to_uppercase()),
            Style::default().fg(Color::Yellow),
        ))]
    } else if state.search_results.is_empty() && tui.controller.flow() == FlowState::Idle {
        vec![Line::from(Span::styled(
            "Select a database, set filters, and `search <terms>`.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        render::render_results(
            &state.search_results,
            state.expanded_study.as_deref(),
            &state.study_runs,
            &state.selected_runs,
            tui.has_reads_only,
        )
    };

    let block = Block::default().borders(Borders::NONE);
    let view = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((tui.results_scroll, 0));
    frame.render_widget(view, area);
}

fn draw_manifest_modal<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(
        "CREATE & APPROVE MANIFEST",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];

    if let Some(error) = tui.controller.modal_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let field = |label: &str, value: &str| {
        let shown = if value.is_empty() { "—" } else { value };
        Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
            Span::raw(render::sanitize(shown)),
        ])
    };
    lines.push(field("name", &tui.manifest_name));
    lines.push(field("desc", &tui.manifest_desc));
    lines.push(field("tags", &tui.manifest_tags));
    lines.push(Line::from(Span::styled(
        "set with `name ...`, `desc ...`, `tags k=v,k=v`; `approve` submits",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));

    lines.extend(render::render_staged_studies(&tui.controller.state().staged));

    let block = Block::default().borders(Borders::ALL).title("Manifest");
    let view = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(view, area);
}

fn draw_manifests_list<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(
        "MANIFESTS",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    if let Some(error) = tui.controller.manifests_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.extend(render::render_manifests(tui.controller.manifests()));
        lines.push(Line::from(Span::styled(
            "`approve <name>` / `import <name>` act on a manifest",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default().borders(Borders::ALL).title("Manifests");
    let view = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(view, area);
}

fn draw_help(frame: &mut ratatui::Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Help");
    let lines = vec![
        Line::from("F1 Help  F2 Results  F3 Manifests  PgUp/PgDn scroll  Esc or `quit` exits"),
        Line::from("search <terms>      query the selected database"),
        Line::from("db sra|gds          switch database"),
        Line::from("year <y>|off        set or clear the year filter"),
        Line::from("reads on|off        keep only studies with runs"),
        Line::from("expand <ACC>        load and show runs for a study"),
        Line::from("check/uncheck <RUN> toggle one run, `all on|off` for every run"),
        Line::from("add                 stage the selected runs"),
        Line::from("manifest            review staged runs; name/desc/tags + approve"),
        Line::from("manifests           list server manifests"),
        Line::from("import              load the approved manifest to HOX"),
        Line::from("status              one-shot import status check"),
    ];
    let view = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(view, area);
}

fn draw_console<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let state = tui.controller.state();
    let visible = area.height.saturating_sub(1) as usize;
    let skip = state.console_len().saturating_sub(visible);
    let lines = render::render_console(state.console().skip(skip));
    let view = Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP).title("console"))
        .wrap(Wrap { trim: true });
    frame.render_widget(view, area);
}

fn draw_command_line<A: CuratorApi>(frame: &mut ratatui::Frame, tui: &Tui<A>, area: Rect) {
    let para = Paragraph::new(Line::from(vec![
        Span::styled(
            ": ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(tui.input.clone()),
    ]))
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(para, area);

    let cursor_x = area.x.saturating_add((2 + tui.input.len()) as u16);
    let cursor_y = area.y.saturating_add(1);
    frame.set_cursor_position((
        cursor_x.min(area.x.saturating_add(area.width.saturating_sub(1))),
        cursor_y,
    ));
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use crate::api::{
        ApproveResponse, CreateOutcome, CreateResponse, ImportResponse, ManifestsResponse,
        RunsResponse, SearchResponse,
    };
    use crate::domain::{Database, StagedStudy};
    use crate::error::CuratorError;

    use super::*;

    struct FakeApi;

    impl CuratorApi for FakeApi {
        fn search(
            &self,
            _query: &str,
            _database: Database,
            _organism: &str,
            _limit: u32,
            _year: Option<&str>,
        ) -> Result<SearchResponse, CuratorError> {
            Ok(SearchResponse {
                studies: Vec::new(),
                total_found: 0,
                resolved_query: None,
            })
        }

        fn study_info(&self, _accession: &str) -> Result<serde_json::Value, CuratorError> {
            Ok(serde_json::json!({}))
        }

        fn list_runs(&self, _study_accession: &str) -> Result<RunsResponse, CuratorError> {
            Ok(RunsResponse {
                runs: Vec::new(),
                error: None,
            })
        }

        fn file_urls(&self, _accession: &str) -> Result<serde_json::Value, CuratorError> {
            Ok(serde_json::json!({}))
        }

        fn create_manifest(
            &self,
            _name: &str,
            _description: &str,
            _studies: &[StagedStudy],
            _tags: Option<&str>,
        ) -> Result<CreateOutcome, CuratorError> {
            Ok(CreateOutcome::Created(CreateResponse {
                created: String::new(),
                total_runs: 0,
            }))
        }

        fn list_manifests(&self, _name: Option<&str>) -> Result<ManifestsResponse, CuratorError> {
            Ok(ManifestsResponse {
                manifests: Vec::new(),
            })
        }

        fn approve_manifest(&self, _name: &str) -> Result<ApproveResponse, CuratorError> {
            Ok(ApproveResponse {
                runs_to_import: 0,
                error: None,
            })
        }

        fn import_to_hox(
            &self,
            _name: &str,
            _set_name: Option<&str>,
            _profile: Option<&str>,
        ) -> Result<ImportResponse, CuratorError> {
            Ok(ImportResponse {
                started: 0,
                failed: 0,
                error: None,
            })
        }

        fn import_status(&self, _profile: Option<&str>) -> Result<serde_json::Value, CuratorError> {
            Ok(serde_json::json!({}))
        }
    }

    fn tui() -> Tui<FakeApi> {
        let controller = Controller::new(FakeApi, "Homo sapiens".to_string(), 20, None);
        Tui::new(controller, None)
    }

    fn press(tui: &mut Tui<FakeApi>, code: KeyCode) -> bool {
        tui.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_command(tui: &mut Tui<FakeApi>, command: &str) -> bool {
        for ch in command.chars() {
            assert!(!press(tui, KeyCode::Char(ch)));
        }
        press(tui, KeyCode::Enter)
    }

    #[test]
    fn q_feeds_the_input_line_instead_of_quitting() {
        let mut tui = tui();
        assert!(!press(&mut tui, KeyCode::Char('q')));
        assert_eq!(tui.input, "q");
    }

    #[test]
    fn quit_command_exits() {
        let mut tui = tui();
        assert!(type_command(&mut tui, "quit"));
    }

    #[test]
    fn esc_in_results_exits() {
        let mut tui = tui();
        assert!(press(&mut tui, KeyCode::Esc));
    }

    #[test]
    fn esc_closes_the_manifest_modal_without_exiting() {
        let mut tui = tui();
        assert!(!type_command(&mut tui, "manifest"));
        assert_eq!(tui.view, View::ManifestModal);
        assert!(!press(&mut tui, KeyCode::Esc));
        assert_eq!(tui.view, View::Results);
    }
}
