use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::domain::{Run, StagedStudy, Study};

pub const CONSOLE_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKind {
    Command,
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    pub text: String,
    pub kind: ConsoleKind,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ApprovedManifest {
    pub name: String,
    pub run_count: u64,
}

/// Session-scoped UI state. Owned by the controller and passed by reference;
/// nothing here persists past the session and every operation is total.
#[derive(Debug, Default)]
pub struct SessionState {
    pub database: crate::domain::Database,
    pub search_results: Vec<Study>,
    /// study accession -> runs, filled lazily on expand.
    pub study_runs: HashMap<String, Vec<Run>>,
    /// study accession -> selected run accessions.
    pub selected_runs: HashMap<String, BTreeSet<String>>,
    /// study accession -> experiment accessions seen in the search payload.
    /// Fallback source when the runs endpoint comes back empty.
    pub search_experiments: HashMap<String, Vec<String>>,
    pub staged: Vec<StagedStudy>,
    pub expanded_study: Option<String>,
    pub approved: Option<ApprovedManifest>,
    console: VecDeque<ConsoleEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage selected runs for a study, replacing any prior entry for the
    /// same accession. An empty run list removes the study instead; no empty
    /// staged entries ever exist.
    pub fn stage(&mut self, accession: &str, title: &str, runs: Vec<Run>) {
        self.staged.retain(|s| s.accession != accession);
        if !runs.is_empty() {
            self.staged.push(StagedStudy {
                accession: accession.to_string(),
                title: title.to_string(),
                runs,
            });
        }
    }

    pub fn unstage(&mut self, accession: &str) {
        self.staged.retain(|s| s.accession != accession);
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
        self.selected_runs.clear();
    }

    /// Re-check or uncheck a run inside the staged list. Unchecking the last
    /// run removes the whole study from staging.
    pub fn set_staged_run(&mut self, accession: &str, run_accession: &str, checked: bool) {
        let Some(study) = self.staged.iter_mut().find(|s| s.accession == accession) else {
            return;
        };
        if checked {
            if !study.runs.iter().any(|r| r.accession == run_accession) {
                let restored = self
                    .study_runs
                    .get(accession)
                    .and_then(|runs| runs.iter().find(|r| r.accession == run_accession).cloned())
                    .unwrap_or_else(|| Run::from_accession(run_accession));
                study.runs.push(restored);
            }
        } else {
            study.runs.retain(|r| r.accession != run_accession);
            if study.runs.is_empty() {
                self.unstage(accession);
            }
        }
    }

    pub fn staged_run_count(&self) -> usize {
        self.staged.iter().map(|s| s.runs.len()).sum()
    }

    pub fn staged_accessions_csv(&self) -> String {
        self.staged
            .iter()
            .flat_map(|s| s.runs.iter().map(|r| r.accession.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn select_run(&mut self, study: &str, run: &str, selected: bool) {
        let set = self.selected_runs.entry(study.to_string()).or_default();
        if selected {
            set.insert(run.to_string());
        } else {
            set.remove(run);
        }
    }

    pub fn select_all_runs(&mut self, study: &str, selected: bool) {
        let runs: Vec<String> = self
            .study_runs
            .get(study)
            .map(|runs| runs.iter().map(|r| r.accession.clone()).collect())
            .unwrap_or_default();
        let set = self.selected_runs.entry(study.to_string()).or_default();
        if selected {
            set.extend(runs);
        } else {
            set.clear();
        }
    }

    pub fn all_runs_selected(&self, study: &str) -> bool {
        let Some(runs) = self.study_runs.get(study) else {
            return false;
        };
        if runs.is_empty() {
            return false;
        }
        let selected = self.selected_runs.get(study);
        runs.iter().all(|r| {
            selected
                .map(|set| set.contains(&r.accession))
                .unwrap_or(false)
        })
    }

    /// Full run records for the current selection of a study, preserving the
    /// run-list order.
    pub fn selected_run_records(&self, study: &str) -> Vec<Run> {
        let Some(runs) = self.study_runs.get(study) else {
            return Vec::new();
        };
        let Some(selected) = self.selected_runs.get(study) else {
            return Vec::new();
        };
        runs.iter()
            .filter(|r| selected.contains(&r.accession))
            .cloned()
            .collect()
    }

    /// Append a console line, evicting the oldest past the cap.
    pub fn log(&mut self, text: impl Into<String>, kind: ConsoleKind) {
        self.console.push_back(ConsoleEntry {
            text: text.into(),
            kind,
            time: Utc::now(),
        });
        while self.console.len() > CONSOLE_MAX {
            self.console.pop_front();
        }
    }

    pub fn console(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.console.iter()
    }

    pub fn console_len(&self) -> usize {
        self.console.len()
    }
}
