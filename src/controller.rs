use tracing::debug;

use crate::api::{CreateOutcome, CuratorApi, SearchResponse};
use crate::domain::{ManifestRecord, Run};
use crate::error::CuratorError;
use crate::state::{ApprovedManifest, ConsoleKind, SessionState};

/// Where the manifest lifecycle currently stands. Transitions are checked,
/// so an approval cannot start while a creation request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Searching,
    ResultsShown,
    StudyExpanded,
    RunsStaged,
    ManifestModalOpen,
    Creating,
    Approving,
    Approved,
    Importing,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub year: Option<String>,
    pub has_reads_only: bool,
}

/// Binds user intents to the backend client and the session state. Owns both;
/// the renderer reads state slices through the accessors.
pub struct Controller<A: CuratorApi> {
    api: A,
    state: SessionState,
    flow: FlowState,
    search_seq: u64,
    approval_dismissed: bool,
    modal_error: Option<String>,
    manifests: Vec<ManifestRecord>,
    manifests_error: Option<String>,
    organism: String,
    limit: u32,
    profile: Option<String>,
}

impl<A: CuratorApi> Controller<A> {
    pub fn new(api: A, organism: String, limit: u32, profile: Option<String>) -> Self {
        Self {
            api,
            state: SessionState::new(),
            flow: FlowState::Idle,
            search_seq: 0,
            approval_dismissed: false,
            modal_error: None,
            manifests: Vec::new(),
            manifests_error: None,
            organism,
            limit,
            profile,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn flow(&self) -> FlowState {
        self.flow
    }

    pub fn modal_error(&self) -> Option<&str> {
        self.modal_error.as_deref()
    }

    /// Approval banner content. `None` once dismissed, even though the
    /// approved manifest itself is kept for the import action.
    pub fn approval_banner(&self) -> Option<&ApprovedManifest> {
        if self.approval_dismissed {
            None
        } else {
            self.state.approved.as_ref()
        }
    }

    pub fn manifests(&self) -> &[ManifestRecord] {
        &self.manifests
    }

    pub fn manifests_error(&self) -> Option<&str> {
        self.manifests_error.as_deref()
    }

    pub fn log_cmd(&mut self, text: impl Into<String>) {
        self.state.log(text, ConsoleKind::Command);
    }

    pub fn log_info(&mut self, text: impl Into<String>) {
        self.state.log(text, ConsoleKind::Info);
    }

    pub fn log_error(&mut self, text: impl Into<String>) {
        self.state.log(text, ConsoleKind::Error);
    }

    // --- Search ---

    /// Stamp a new search and move to `Searching`. Returns the stamp that
    /// `apply_search_outcome` must present; an older stamp is dropped, which
    /// is what keeps a superseded search from overwriting newer results.
    pub fn begin_search(&mut self, params: &SearchParams) -> u64 {
        self.search_seq += 1;
        self.flow = FlowState::Searching;
        self.state.expanded_study = None;
        let year_flag = params
            .year
            .as_deref()
            .map(|y| format!(" --year={y}"))
            .unwrap_or_default();
        self.log_cmd(format!(
            "search \"{}\" --db={}{year_flag}",
            params.query, self.state.database
        ));
        self.search_seq
    }

    pub fn apply_search_outcome(
        &mut self,
        seq: u64,
        outcome: Result<SearchResponse, CuratorError>,
        has_reads_only: bool,
    ) {
        if seq != self.search_seq {
            debug!(seq, current = self.search_seq, "dropping stale search response");
            return;
        }
        match outcome {
            Ok(response) => {
                let mut studies = response.studies;

                // Remember experiment accessions per study; the expand flow
                // falls back to them when the runs endpoint is empty.
                self.state.search_experiments.clear();
                for study in &studies {
                    if !study.experiment.is_empty() {
                        self.state
                            .search_experiments
                            .entry(study.key().to_string())
                            .or_default()
                            .push(study.experiment.clone());
                    }
                }

                if has_reads_only {
                    studies.retain(|s| s.runs > 0);
                }

                if let Some(resolved) = response.resolved_query {
                    self.log_info(format!("Query: {resolved}"));
                }
                let suffix = if has_reads_only { " (with reads)" } else { "" };
                self.log_info(format!(
                    "Found {} results, showing {}{suffix}",
                    response.total_found,
                    studies.len()
                ));

                self.state.search_results = studies;
                self.flow = FlowState::ResultsShown;
            }
            Err(err) => {
                self.log_error(format!("Search failed: {err}"));
                self.state.search_results.clear();
                self.flow = FlowState::Idle;
            }
        }
    }

    pub fn submit_search(&mut self, params: &SearchParams) {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return;
        }
        let seq = self.begin_search(params);
        let outcome = self.api.search(
            &query,
            self.state.database,
            &self.organism,
            self.limit,
            params.year.as_deref(),
        );
        self.apply_search_outcome(seq, outcome, params.has_reads_only);
    }

    // --- Expansion ---

    /// Expand or collapse a study card. Runs are fetched lazily and cached;
    /// a second expand never refetches.
    pub fn toggle_expand(&mut self, accession: &str) {
        if self.state.expanded_study.as_deref() == Some(accession) {
            self.state.expanded_study = None;
            self.flow = FlowState::ResultsShown;
            return;
        }
        self.state.expanded_study = Some(accession.to_string());
        self.flow = FlowState::StudyExpanded;

        if self.state.study_runs.contains_key(accession) {
            return;
        }

        self.log_cmd(format!("list_runs(\"{accession}\")"));
        let primary = match self.api.list_runs(accession) {
            Ok(response) if !response.runs.is_empty() => Ok(response.runs),
            Ok(response) => Err(response
                .error
                .unwrap_or_else(|| "No runs from API".to_string())),
            Err(err) => Err(err.to_string()),
        };

        match primary {
            Ok(runs) => {
                for run in &runs {
                    self.state.select_run(accession, &run.accession, true);
                }
                self.log_info(format!("{} runs loaded for {accession}", runs.len()));
                self.state.study_runs.insert(accession.to_string(), runs);
            }
            Err(reason) => {
                // Soft-fail: experiment accessions cached from the search
                // payload stand in for the missing run list.
                let experiments = self
                    .state
                    .search_experiments
                    .get(accession)
                    .cloned()
                    .unwrap_or_default();
                if experiments.is_empty() {
                    self.log_error(format!("Failed to load runs: {reason}"));
                    self.state
                        .study_runs
                        .insert(accession.to_string(), Vec::new());
                } else {
                    let runs: Vec<Run> = experiments
                        .iter()
                        .map(|acc| Run::from_accession(acc))
                        .collect();
                    for run in &runs {
                        self.state.select_run(accession, &run.accession, true);
                    }
                    self.log_info(format!(
                        "{} experiments loaded for {accession} (from search cache)",
                        runs.len()
                    ));
                    self.state.study_runs.insert(accession.to_string(), runs);
                }
            }
        }
    }

    // --- Staging ---

    pub fn add_selected(&mut self, accession: &str) {
        let selected = self.state.selected_run_records(accession);
        if selected.is_empty() {
            return;
        }
        let title = self
            .state
            .search_results
            .iter()
            .find(|s| s.key() == accession)
            .map(|s| s.title.clone())
            .unwrap_or_default();
        let count = selected.len();
        self.state.stage(accession, &title, selected);
        self.log_info(format!("Staged {count} runs from {accession}"));
        self.flow = FlowState::RunsStaged;
    }

    pub fn open_manifest_modal(&mut self) {
        self.modal_error = None;
        self.flow = FlowState::ManifestModalOpen;
    }

    /// Closing a modal never alters staged or approved state.
    pub fn close_modal(&mut self) {
        if matches!(
            self.flow,
            FlowState::ManifestModalOpen | FlowState::RunsStaged
        ) {
            self.flow = FlowState::ResultsShown;
        }
    }

    pub fn remove_staged(&mut self, accession: &str) {
        self.state.unstage(accession);
    }

    pub fn set_staged_run_checked(&mut self, accession: &str, run: &str, checked: bool) {
        self.state.set_staged_run(accession, run, checked);
    }

    // --- Approval flow ---

    /// Create-then-approve. Validation failures short-circuit before any
    /// network call; a failure at either network step leaves the modal open
    /// and the staged list untouched.
    pub fn approve_manifest(&mut self, name: &str, description: &str, tags: Option<&str>) {
        if matches!(self.flow, FlowState::Creating | FlowState::Approving) {
            debug!("approval already in flight, ignoring");
            return;
        }
        self.modal_error = None;

        let name = name.trim();
        let description = description.trim();
        if name.is_empty() {
            self.modal_error = Some("Manifest name is required.".to_string());
            return;
        }
        if description.is_empty() {
            self.modal_error = Some("Description is required.".to_string());
            return;
        }
        if self.state.staged.is_empty() {
            self.modal_error = Some("No runs staged. Search and add runs first.".to_string());
            return;
        }

        self.flow = FlowState::Creating;
        let total_runs = self.state.staged_run_count();
        self.log_cmd(format!(
            "create_manifest(\"{name}\", {} studies, {total_runs} runs)",
            self.state.staged.len()
        ));

        let created =
            match self
                .api
                .create_manifest(name, description, &self.state.staged, tags)
            {
                Ok(CreateOutcome::Created(response)) => response,
                Ok(CreateOutcome::Rejected { error }) => {
                    self.fail_modal(format!("Create failed: {error}"));
                    return;
                }
                Err(err) => {
                    self.fail_modal(format!("Error: {err}"));
                    return;
                }
            };
        self.log_info(format!(
            "Manifest \"{name}\" created with {} runs",
            created.total_runs
        ));

        self.flow = FlowState::Approving;
        self.log_cmd(format!("approve_manifest(\"{name}\")"));
        let approved = match self.api.approve_manifest(name) {
            Ok(response) => response,
            Err(err) => {
                self.fail_modal(format!("Error: {err}"));
                return;
            }
        };
        if let Some(error) = approved.error {
            self.fail_modal(format!("Approval failed: {error}"));
            return;
        }

        self.log_info(format!(
            "Manifest \"{name}\" approved — {} runs ready to import",
            approved.runs_to_import
        ));
        self.state.approved = Some(ApprovedManifest {
            name: name.to_string(),
            run_count: approved.runs_to_import,
        });
        self.approval_dismissed = false;
        self.state.clear_staged();
        self.flow = FlowState::Approved;
    }

    fn fail_modal(&mut self, message: String) {
        self.log_error(message.clone());
        self.modal_error = Some(message);
        self.flow = FlowState::ManifestModalOpen;
    }

    // --- Import ---

    /// Kick off the HOX import for the approved manifest, then poll the
    /// import status once.
    pub fn load_to_hox(&mut self) {
        if self.flow == FlowState::Importing {
            debug!("import already in flight, ignoring");
            return;
        }
        let Some(name) = self.state.approved.as_ref().map(|a| a.name.clone()) else {
            return;
        };

        self.flow = FlowState::Importing;
        self.log_cmd(format!("import_to_hox(\"{name}\")"));
        match self
            .api
            .import_to_hox(&name, None, self.profile.as_deref())
        {
            Ok(response) => {
                if let Some(error) = response.error {
                    self.log_error(format!("Import error: {error}"));
                } else {
                    self.log_info(format!(
                        "Import started: {} runs queued, {} failed",
                        response.started, response.failed
                    ));
                    self.poll_import_status();
                }
            }
            Err(err) => self.log_error(format!("Import failed: {err}")),
        }
        // The synchronous call is over either way; a later import must not
        // be refused by a stale Importing state.
        self.flow = FlowState::Approved;
    }

    /// One-shot status check, not a repeating interval.
    pub fn poll_import_status(&mut self) {
        self.log_cmd("get_import_status()");
        match self.api.import_status(self.profile.as_deref()) {
            Ok(status) => {
                let summary: String = status.to_string().chars().take(200).collect();
                self.log_info(format!("Import status: {summary}"));
            }
            Err(err) => self.log_error(format!("Status check failed: {err}")),
        }
    }

    /// Hide the approval banner. The approved manifest stays available, so
    /// the import action keeps working after dismissal.
    pub fn dismiss_approval(&mut self) {
        self.approval_dismissed = true;
        self.flow = FlowState::ResultsShown;
    }

    // --- Manifests list ---

    pub fn load_manifests(&mut self) {
        match self.api.list_manifests(None) {
            Ok(response) => {
                self.manifests = response.manifests;
                self.manifests_error = None;
            }
            Err(err) => {
                self.manifests_error = Some(format!("Failed to load manifests: {err}"));
            }
        }
    }

    pub fn approve_from_list(&mut self, name: &str) {
        match self.api.approve_manifest(name) {
            Ok(response) => {
                if let Some(error) = response.error {
                    self.log_error(format!("Approval failed: {error}"));
                } else {
                    self.log_info(format!("Manifest \"{name}\" approved"));
                }
            }
            Err(err) => self.log_error(format!("Error: {err}")),
        }
        self.load_manifests();
    }

    pub fn import_from_list(&mut self, name: &str) {
        self.log_cmd(format!("import_to_hox(\"{name}\")"));
        match self.api.import_to_hox(name, None, self.profile.as_deref()) {
            Ok(response) => {
                if let Some(error) = response.error {
                    self.log_error(format!("Import error: {error}"));
                } else {
                    self.log_info(format!(
                        "Import started: {} runs queued, {} failed",
                        response.started, response.failed
                    ));
                }
            }
            Err(err) => self.log_error(format!("Import failed: {err}")),
        }
        self.load_manifests();
    }
}
