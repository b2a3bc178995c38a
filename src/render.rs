use std::collections::{BTreeSet, HashMap};

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::domain::{ManifestRecord, ManifestStatus, Run, StagedStudy, Study};
use crate::state::{ConsoleEntry, ConsoleKind};

/// Strip control characters from server/user supplied text before it reaches
/// the terminal. Escape sequences embedded in a study title must render as
/// plain text, never execute.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_control()).collect()
}

/// Abbreviate counts: 1500 -> "1.5K", 2_500_000 -> "2.5M". Zero renders as
/// an em dash, matching the rest of the missing-value placeholders.
pub fn format_number(n: u64) -> String {
    if n == 0 {
        return "—".to_string();
    }
    if n >= 1_000_000_000 {
        return format!("{:.1}B", n as f64 / 1e9);
    }
    if n >= 1_000_000 {
        return format!("{:.1}M", n as f64 / 1e6);
    }
    if n >= 1_000 {
        return format!("{:.1}K", n as f64 / 1e3);
    }
    n.to_string()
}

/// Abbreviate base counts: 5_000_000 -> "5.0 Mb", small values as raw "bp".
/// Zero renders as the empty string so callers can filter it out of meta
/// rows.
pub fn format_size(bases: u64) -> String {
    if bases == 0 {
        return String::new();
    }
    if bases >= 1_000_000_000_000 {
        return format!("{:.1} Tb", bases as f64 / 1e12);
    }
    if bases >= 1_000_000_000 {
        return format!("{:.1} Gb", bases as f64 / 1e9);
    }
    if bases >= 1_000_000 {
        return format!("{:.1} Mb", bases as f64 / 1e6);
    }
    if bases >= 1_000 {
        return format!("{:.1} Kb", bases as f64 / 1e3);
    }
    format!("{bases} bp")
}

pub fn render_console<'a>(entries: impl Iterator<Item = &'a ConsoleEntry>) -> Vec<Line<'static>> {
    entries
        .map(|entry| {
            let text = sanitize(&entry.text);
            match entry.kind {
                ConsoleKind::Command => Line::from(vec![
                    Span::styled("> ", Style::default().fg(Color::Cyan)),
                    Span::raw(text),
                ]),
                ConsoleKind::Info => {
                    Line::from(Span::styled(text, Style::default().fg(Color::Gray)))
                }
                ConsoleKind::Error => {
                    Line::from(Span::styled(text, Style::default().fg(Color::Red)))
                }
            }
        })
        .collect()
}

/// Render all study cards. Same inputs always produce the same lines; no
/// state is touched.
pub fn render_results(
    studies: &[Study],
    expanded_study: Option<&str>,
    study_runs: &HashMap<String, Vec<Run>>,
    selected_runs: &HashMap<String, BTreeSet<String>>,
    has_reads_only: bool,
) -> Vec<Line<'static>> {
    if studies.is_empty() {
        let hint = if has_reads_only {
            " or disable the has-reads filter"
        } else {
            ""
        };
        return vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("No studies found. Try different search terms{hint}."),
                Style::default().fg(Color::DarkGray),
            )),
        ];
    }

    let mut lines = Vec::new();
    for study in studies {
        let key = study.key();
        let is_expanded = expanded_study == Some(key);
        let runs = study_runs.get(key);
        let selected = selected_runs.get(key);
        lines.extend(render_study_card(study, is_expanded, runs, selected));
        lines.push(Line::from(""));
    }
    lines
}

fn render_study_card(
    study: &Study,
    is_expanded: bool,
    runs: Option<&Vec<Run>>,
    selected: Option<&BTreeSet<String>>,
) -> Vec<Line<'static>> {
    let acc = if study.key().is_empty() {
        "—".to_string()
    } else {
        sanitize(study.key())
    };

    let mut meta = Vec::new();
    for part in [&study.organism, &study.platform, &study.date] {
        if !part.is_empty() {
            meta.push(sanitize(part));
        }
    }
    if study.runs > 0 {
        meta.push(format!("{} runs", study.runs));
    }

    let marker = if is_expanded { "v" } else { ">" };
    let mut header = vec![
        Span::styled(
            format!("{marker} {acc}"),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if !meta.is_empty() {
        header.push(Span::styled(
            format!("  {}", meta.join(" | ")),
            Style::default().fg(Color::Gray),
        ));
    }

    let mut lines = vec![Line::from(header)];
    let title = if study.title.is_empty() {
        "—".to_string()
    } else {
        sanitize(&study.title)
    };
    lines.push(Line::from(format!("  {title}")));
    if !study.summary.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", sanitize(&study.summary)),
            Style::default().fg(Color::DarkGray),
        )));
    }

    if is_expanded {
        match runs {
            Some(runs) => lines.extend(render_runs_section(runs, selected)),
            None => lines.push(Line::from(Span::styled(
                "  Loading runs...",
                Style::default().fg(Color::Yellow),
            ))),
        }
    }

    lines
}

fn render_runs_section(runs: &[Run], selected: Option<&BTreeSet<String>>) -> Vec<Line<'static>> {
    if runs.is_empty() {
        return vec![Line::from(Span::styled(
            "  No runs found",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let all_selected = runs.iter().all(|r| {
        selected
            .map(|set| set.contains(&r.accession))
            .unwrap_or(false)
    });
    let plural = if runs.len() > 1 { "s" } else { "" };
    let toggle = if all_selected { "[x]" } else { "[ ]" };
    let mut lines = vec![Line::from(Span::styled(
        format!("  {} run{plural}   {toggle} select all", runs.len()),
        Style::default().fg(Color::Gray),
    ))];

    for run in runs {
        let checked = selected
            .map(|set| set.contains(&run.accession))
            .unwrap_or(false);
        let checkbox = if checked { "[x]" } else { "[ ]" };
        let details: Vec<&str> = [&run.strategy, &run.source, &run.platform]
            .into_iter()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();
        let details = if details.is_empty() {
            "—".to_string()
        } else {
            sanitize(&details.join(" / "))
        };
        let mut spans = vec![
            Span::raw(format!("  {checkbox} ")),
            Span::styled(
                sanitize(&run.accession),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(format!("  {details}"), Style::default().fg(Color::Gray)),
        ];
        if !run.sample.is_empty() {
            spans.push(Span::styled(
                format!(" | {}", sanitize(&run.sample)),
                Style::default().fg(Color::Gray),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(Span::styled(
        "  [a] add selected runs to manifest",
        Style::default().fg(Color::Green),
    )));

    lines
}

/// Staged-studies panel inside the manifest modal: per-study spot/base
/// totals and the first non-empty strategy/platform.
pub fn render_staged_studies(staged: &[StagedStudy]) -> Vec<Line<'static>> {
    if staged.is_empty() {
        return vec![Line::from(Span::styled(
            "No studies staged yet. Search and add runs first.",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let mut lines = Vec::new();
    for (index, study) in staged.iter().enumerate() {
        let total_spots: u64 = study.runs.iter().map(Run::spots_value).sum();
        let total_bases: u64 = study.runs.iter().map(Run::bases_value).sum();
        let strategy = study
            .runs
            .iter()
            .map(|r| r.strategy.as_str())
            .find(|v| !v.is_empty())
            .unwrap_or("");
        let platform = study
            .runs
            .iter()
            .map(|r| r.platform.as_str())
            .find(|v| !v.is_empty())
            .unwrap_or("");

        let mut meta = Vec::new();
        if !strategy.is_empty() {
            meta.push(sanitize(strategy));
        }
        if !platform.is_empty() {
            meta.push(sanitize(platform));
        }
        meta.push(format!("{} runs", study.runs.len()));
        if total_spots > 0 {
            meta.push(format!("{} spots", format_number(total_spots)));
        }
        let size = format_size(total_bases);
        if !size.is_empty() {
            meta.push(size);
        }

        lines.push(Line::from(vec![
            Span::styled(
                format!("#{} ", index + 1),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                sanitize(&study.accession),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  [d] remove", Style::default().fg(Color::Red)),
        ]));
        lines.push(Line::from(Span::styled(
            format!("   {}", meta.join(" · ")),
            Style::default().fg(Color::Gray),
        )));

        for run in &study.runs {
            let spots = run.spots_value();
            let mut run_meta = Vec::new();
            if !run.strategy.is_empty() {
                run_meta.push(sanitize(&run.strategy));
            }
            if spots > 0 {
                run_meta.push(format!("{} spots", format_number(spots)));
            }
            let size = format_size(run.bases_value());
            if !size.is_empty() {
                run_meta.push(size);
            }
            let mut spans = vec![
                Span::raw("   [x] "),
                Span::styled(sanitize(&run.accession), Style::default().fg(Color::Cyan)),
            ];
            if !run_meta.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", run_meta.join(" · ")),
                    Style::default().fg(Color::Gray),
                ));
            }
            lines.push(Line::from(spans));
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Manifests list with status-conditional action hints.
pub fn render_manifests(manifests: &[ManifestRecord]) -> Vec<Line<'static>> {
    if manifests.is_empty() {
        return vec![Line::from(Span::styled(
            "No manifests yet. Create one by staging runs and approving.",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let mut lines = Vec::new();
    for manifest in manifests {
        let status_color = match manifest.status {
            ManifestStatus::Approved => Color::Green,
            ManifestStatus::Importing => Color::Yellow,
            ManifestStatus::Pending => Color::Cyan,
            ManifestStatus::Other(_) => Color::Gray,
        };
        lines.push(Line::from(vec![
            Span::styled(
                sanitize(&manifest.name),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(manifest.status.to_string(), Style::default().fg(status_color)),
        ]));
        if !manifest.description.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("  {}", sanitize(&manifest.description)),
                Style::default().fg(Color::Gray),
            )));
        }

        let mut meta = vec![format!("{} runs", manifest.runs)];
        if !manifest.created.is_empty() {
            meta.push(sanitize(&manifest.created));
        }
        if !manifest.tags.is_empty() {
            let tags: Vec<String> = manifest
                .tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or("?")))
                .collect();
            meta.push(sanitize(&tags.join(", ")));
        }
        lines.push(Line::from(Span::styled(
            format!("  {}", meta.join("  ")),
            Style::default().fg(Color::DarkGray),
        )));

        let action = match manifest.status {
            ManifestStatus::Pending => Some(Span::styled(
                "  [enter] approve",
                Style::default().fg(Color::Green),
            )),
            ManifestStatus::Approved => Some(Span::styled(
                "  [enter] load to HOX",
                Style::default().fg(Color::Cyan),
            )),
            ManifestStatus::Importing => Some(Span::styled(
                "  importing...",
                Style::default().fg(Color::Yellow),
            )),
            ManifestStatus::Other(_) => None,
        };
        if let Some(action) = action {
            lines.push(Line::from(action));
        }
        lines.push(Line::from(""));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn number_formatting_thresholds() {
        assert_eq!(format_number(950), "950");
        assert_eq!(format_number(1500), "1.5K");
        assert_eq!(format_number(2_500_000), "2.5M");
        assert_eq!(format_number(3_000_000_000), "3.0B");
        assert_eq!(format_number(0), "—");
    }

    #[test]
    fn size_formatting_thresholds() {
        assert_eq!(format_size(500), "500 bp");
        assert_eq!(format_size(5_000), "5.0 Kb");
        assert_eq!(format_size(5_000_000), "5.0 Mb");
        assert_eq!(format_size(5_000_000_000), "5.0 Gb");
        assert_eq!(format_size(5_000_000_000_000), "5.0 Tb");
        assert_eq!(format_size(0), "");
    }

    #[test]
    fn sanitize_strips_control_bytes() {
        assert_eq!(sanitize("title\x1b[31mred\x07"), "title[31mred");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn empty_results_render_empty_state() {
        let lines = render_results(&[], None, &HashMap::new(), &HashMap::new(), true);
        let text = flat(&lines).join("\n");
        assert!(text.contains("No studies found"));
        assert!(text.contains("has-reads filter"));
    }

    #[test]
    fn add_selected_hint_requires_runs() {
        let study = Study {
            accession: "SRP1".to_string(),
            title: "t".to_string(),
            ..Study::default()
        };
        let mut study_runs = HashMap::new();
        study_runs.insert("SRP1".to_string(), Vec::new());
        let lines = render_results(
            std::slice::from_ref(&study),
            Some("SRP1"),
            &study_runs,
            &HashMap::new(),
            false,
        );
        let text = flat(&lines).join("\n");
        assert!(text.contains("No runs found"));
        assert!(!text.contains("add selected"));

        study_runs.insert("SRP1".to_string(), vec![Run::from_accession("SRR1")]);
        let lines = render_results(
            std::slice::from_ref(&study),
            Some("SRP1"),
            &study_runs,
            &HashMap::new(),
            false,
        );
        let text = flat(&lines).join("\n");
        assert!(text.contains("add selected"));
    }

    #[test]
    fn staged_panel_aggregates_per_study() {
        let staged = vec![StagedStudy {
            accession: "SRP1".to_string(),
            title: "t".to_string(),
            runs: vec![
                Run {
                    accession: "SRR1".to_string(),
                    strategy: "".to_string(),
                    platform: "ILLUMINA".to_string(),
                    spots: "1000".to_string(),
                    bases: "2000000".to_string(),
                    ..Run::default()
                },
                Run {
                    accession: "SRR2".to_string(),
                    strategy: "RNA-Seq".to_string(),
                    spots: "500".to_string(),
                    bases: "3000000".to_string(),
                    ..Run::default()
                },
            ],
        }];
        let text = flat(&render_staged_studies(&staged)).join("\n");
        // First non-empty strategy and platform, summed spots and bases.
        assert!(text.contains("RNA-Seq"));
        assert!(text.contains("ILLUMINA"));
        assert!(text.contains("1.5K spots"));
        assert!(text.contains("5.0 Mb"));
        assert!(text.contains("2 runs"));
    }

    #[test]
    fn manifest_actions_follow_status() {
        let record = |status| ManifestRecord {
            name: "m".to_string(),
            description: String::new(),
            status,
            runs: 1,
            created: String::new(),
            tags: serde_json::Map::new(),
        };
        let pending = flat(&render_manifests(&[record(ManifestStatus::Pending)])).join("\n");
        assert!(pending.contains("approve"));
        let approved = flat(&render_manifests(&[record(ManifestStatus::Approved)])).join("\n");
        assert!(approved.contains("load to HOX"));
        let importing = flat(&render_manifests(&[record(ManifestStatus::Importing)])).join("\n");
        assert!(importing.contains("importing..."));
        assert!(!importing.contains("[enter]"));
    }

    #[test]
    fn empty_staged_and_manifest_lists() {
        let text = flat(&render_staged_studies(&[])).join("\n");
        assert!(text.contains("No studies staged yet"));
        let text = flat(&render_manifests(&[])).join("\n");
        assert!(text.contains("No manifests yet"));
    }
}
