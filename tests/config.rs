use sra_manifest_curator::config::{ConfigLoader, DEFAULT_LIMIT, DEFAULT_ORGANISM};
use sra_manifest_curator::domain::Database;
use sra_manifest_curator::error::CuratorError;

#[test]
fn explicit_config_file_is_loaded() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("curator.json");
    std::fs::write(
        &path,
        r#"{"base_url":"http://curator.lab:9000/","database":"gds","organism":"Mus musculus","limit":50}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.base_url, "http://curator.lab:9000");
    assert_eq!(resolved.database, Database::Gds);
    assert_eq!(resolved.organism, "Mus musculus");
    assert_eq!(resolved.limit, 50);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("curator.json");
    std::fs::write(&path, r#"{"year":"2024"}"#).unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.database, Database::Sra);
    assert_eq!(resolved.organism, DEFAULT_ORGANISM);
    assert_eq!(resolved.limit, DEFAULT_LIMIT);
    assert_eq!(resolved.year.as_deref(), Some("2024"));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/curator.json")).unwrap_err();
    assert!(matches!(err, CuratorError::ConfigRead(_)));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("curator.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, CuratorError::ConfigParse(_)));
}
