use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CuratorError;

/// Entrez database the search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Sra,
    Gds,
}

impl Default for Database {
    fn default() -> Self {
        Database::Sra
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Database::Sra => write!(f, "sra"),
            Database::Gds => write!(f, "gds"),
        }
    }
}

impl FromStr for Database {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sra" => Ok(Database::Sra),
            "gds" => Ok(Database::Gds),
            other => Err(CuratorError::InvalidDatabase(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyAccession(String);

impl StudyAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudyAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyAccession {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let re = Regex::new(r"^(SRP|ERP|DRP|SRX|ERX|DRX|GSE|PRJ[EDN][A-Z]?)\d+$").unwrap();
        if !re.is_match(&normalized) {
            return Err(CuratorError::InvalidStudyAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunAccession(String);

impl RunAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunAccession {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let re = Regex::new(r"^(SRR|ERR|DRR|SRX|ERX|DRX|GSM)\d+$").unwrap();
        if !re.is_match(&normalized) {
            return Err(CuratorError::InvalidRunAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Study record as returned by the search endpoint. SRA results carry the
/// experiment accession alongside the study accession; GDS results leave it
/// empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    #[serde(default)]
    pub accession: String,
    #[serde(default)]
    pub experiment: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub organism: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, alias = "samples")]
    pub runs: u64,
}

impl Study {
    /// Key the UI tracks the study under. SRA summaries sometimes only carry
    /// the experiment accession.
    pub fn key(&self) -> &str {
        if self.accession.is_empty() {
            &self.experiment
        } else {
            &self.accession
        }
    }
}

/// A single sequencing run. Spot and base counts arrive as strings from the
/// backend (Entrez serves them that way) and are parsed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub accession: String,
    #[serde(default)]
    pub sample: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub spots: String,
    #[serde(default)]
    pub bases: String,
}

impl Run {
    pub fn from_accession(accession: &str) -> Self {
        Self {
            accession: accession.to_string(),
            ..Self::default()
        }
    }

    pub fn spots_value(&self) -> u64 {
        self.spots.trim().parse().unwrap_or(0)
    }

    pub fn bases_value(&self) -> u64 {
        self.bases.trim().parse().unwrap_or(0)
    }
}

/// A study committed to the manifest draft, together with the selected runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedStudy {
    pub accession: String,
    pub title: String,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestStatus {
    Pending,
    Approved,
    Importing,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestStatus::Pending => write!(f, "pending"),
            ManifestStatus::Approved => write!(f, "approved"),
            ManifestStatus::Importing => write!(f, "importing"),
            ManifestStatus::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Server-owned manifest record; the curator only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ManifestStatus,
    #[serde(default)]
    pub runs: u64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub tags: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_study_accession_valid() {
        let acc: StudyAccession = "srp000001".parse().unwrap();
        assert_eq!(acc.as_str(), "SRP000001");
        let gse: StudyAccession = "GSE102902".parse().unwrap();
        assert_eq!(gse.as_str(), "GSE102902");
    }

    #[test]
    fn parse_study_accession_invalid() {
        let err = "SRR014966".parse::<StudyAccession>().unwrap_err();
        assert_matches!(err, CuratorError::InvalidStudyAccession(_));
    }

    #[test]
    fn parse_run_accession_valid() {
        let acc: RunAccession = "srr014966".parse().unwrap();
        assert_eq!(acc.as_str(), "SRR014966");
    }

    #[test]
    fn parse_run_accession_invalid() {
        let err = "GSE12345".parse::<RunAccession>().unwrap_err();
        assert_matches!(err, CuratorError::InvalidRunAccession(_));
    }

    #[test]
    fn parse_database() {
        assert_eq!("SRA".parse::<Database>().unwrap(), Database::Sra);
        assert_eq!("gds".parse::<Database>().unwrap(), Database::Gds);
        assert_matches!(
            "geo".parse::<Database>(),
            Err(CuratorError::InvalidDatabase(_))
        );
    }

    #[test]
    fn study_key_falls_back_to_experiment() {
        let study = Study {
            experiment: "SRX000001".to_string(),
            ..Study::default()
        };
        assert_eq!(study.key(), "SRX000001");
    }

    #[test]
    fn run_counts_parse_leniently() {
        let run = Run {
            spots: "1500".to_string(),
            bases: "not-a-number".to_string(),
            ..Run::default()
        };
        assert_eq!(run.spots_value(), 1500);
        assert_eq!(run.bases_value(), 0);
    }
}
