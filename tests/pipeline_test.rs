use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use owner_cleaner::app::clean_use_case::CleanUseCase;
use owner_cleaner::app::ports::TranslatorPort;
use owner_cleaner::config::{Config, GarbageMode, MissingColumnPolicy, TranslationFailurePolicy};
use owner_cleaner::error::CleanerError;
use owner_cleaner::infra::CsvOutputAdapter;
use owner_cleaner::pipeline::processing::email::is_valid_email;

const HEADER: &str = "Province,City,address,post code,Monthly salary,marriage,educate,color,gender,Birthday,industry,Unnamed: 21,Email,ID Number,Frame number";

fn owners_csv() -> String {
    [
        HEADER,
        "Beijing,,1 Main St,100000,5000,yes,college,red,m,1990-01-01,IT,,a@b.com,123,F1",
        "Beijing,,1 Main St,100000,5000,yes,college,red,m,1990-01-01,IT,,a@b.com,123,F1",
        "Shanghai,Pudong,,200000,,,,,,,,,bad-email,456,F2",
        ",,,,,,,,,,,,c@d.com,0789,F3",
    ]
    .join("\n")
        + "\n"
}

fn config_for(dir: &Path, input: &Path) -> Config {
    let mut config = Config::default();
    config.paths.input = input.to_path_buf();
    config.paths.clean = dir.join("out/clean.csv");
    config.paths.garbage = dir.join("out/garbage.csv");
    config.translation.enabled = false;
    config
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = vec![reader.headers()?.iter().map(str::to_string).collect()];
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[tokio::test]
async fn test_cleans_owner_export_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, owners_csv())?;

    let config = config_for(dir.path(), &input);
    let report = CleanUseCase::from_config(config)?.run().await?;

    assert_eq!(report.input_rows, 4);
    assert_eq!(report.clean_rows, 2);
    assert_eq!(report.invalid_email_rows, 1);
    assert_eq!(report.duplicate_rows, 1);
    assert_eq!(report.clean_rows + report.rejected_rows(), report.input_rows);

    let clean = fs::read_to_string(dir.path().join("out/clean.csv"))?;
    assert_eq!(
        clean,
        "Email,ID Number,Frame number,Full Address\n\
         a@b.com,123,F1,\"Beijing, 1 Main St, 100000\"\n\
         c@d.com,0789,F3,\n"
    );

    let garbage = read_rows(&dir.path().join("out/garbage.csv"))?;
    assert_eq!(garbage[0][..3], ["reason", "source_row", "Province"]);
    let tags: Vec<(&str, &str)> = garbage[1..]
        .iter()
        .map(|r| (r[0].as_str(), r[1].as_str()))
        .collect();
    assert_eq!(
        tags,
        vec![
            ("columns_dropped", "1"),
            ("columns_dropped", "2"),
            ("columns_dropped", "3"),
            ("columns_dropped", "4"),
            ("invalid_email", "3"),
            ("duplicate", "2"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_clean_rows_satisfy_output_invariants() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, owners_csv())?;

    CleanUseCase::from_config(config_for(dir.path(), &input))?.run().await?;

    let rows = read_rows(&dir.path().join("out/clean.csv"))?;
    let mut keys = std::collections::HashSet::new();
    for row in &rows[1..] {
        assert!(is_valid_email(&row[0]));
        assert!(keys.insert((row[0].clone(), row[1].clone(), row[2].clone())));
        assert!(!row[3].starts_with(", ") && !row[3].ends_with(", "));
    }
    Ok(())
}

#[tokio::test]
async fn test_rerun_on_clean_output_rejects_nothing() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, owners_csv())?;
    CleanUseCase::from_config(config_for(dir.path(), &input))?.run().await?;

    let first_clean = dir.path().join("out/clean.csv");
    let second = dir.path().join("second");
    let mut config = config_for(&second, &first_clean);
    config.schema.on_missing_column = MissingColumnPolicy::Empty;

    let report = CleanUseCase::from_config(config)?.run().await?;
    assert_eq!(report.rejected_rows(), 0);
    assert_eq!(report.clean_rows, 2);
    assert_eq!(
        fs::read_to_string(second.join("out/clean.csv"))?,
        fs::read_to_string(first_clean)?
    );
    Ok(())
}

#[tokio::test]
async fn test_split_mode_writes_rejected_file() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, owners_csv())?;

    let mut config = config_for(dir.path(), &input);
    config.output.garbage_mode = GarbageMode::Split;
    let report = CleanUseCase::from_config(config)?.run().await?;
    assert_eq!(report.outputs.len(), 3);

    let garbage = read_rows(&dir.path().join("out/garbage.csv"))?;
    assert_eq!(garbage[0][0], "Province");
    assert_eq!(garbage.len(), 5);

    let rejected = read_rows(&dir.path().join("out/garbage_rejected.csv"))?;
    assert_eq!(rejected[0][..3], ["reason", "source_row", "Email"]);
    assert_eq!(rejected[1][..3], ["invalid_email", "3", "bad-email"]);
    assert_eq!(rejected[2][..2], ["duplicate", "2"]);
    Ok(())
}

#[tokio::test]
async fn test_split_mode_refuses_rejected_path_over_clean_output() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, owners_csv())?;

    let mut config = config_for(dir.path(), &input);
    config.output.garbage_mode = GarbageMode::Split;
    config.paths.rejected = Some(config.paths.clean.clone());

    let err = CleanUseCase::from_config(config).err().expect("config must be refused");
    assert!(matches!(err, CleanerError::Config(_)));
    assert!(!dir.path().join("out").exists());
    Ok(())
}

#[tokio::test]
async fn test_header_only_input_fails_without_outputs() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, format!("{HEADER}\n"))?;

    let err = CleanUseCase::from_config(config_for(dir.path(), &input))?
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, CleanerError::DataLoad { .. }));
    assert!(!dir.path().join("out").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_required_column_fails_by_default() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, "Email,ID Number,Frame number\na@b.com,1,F1\n")?;

    let err = CleanUseCase::from_config(config_for(dir.path(), &input))?
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, CleanerError::Schema { stage: "address merge", .. }));
    assert!(!dir.path().join("out/clean.csv").exists());
    Ok(())
}

/// Dictionary-backed translator that records every label it was asked for
struct MockTranslator {
    known: HashMap<&'static str, &'static str>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TranslatorPort for MockTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, String> {
        self.calls.lock().unwrap().push(text.to_string());
        self.known
            .get(text)
            .map(|t| t.to_string())
            .ok_or_else(|| format!("no translation for {text}"))
    }
}

fn chinese_csv() -> String {
    let header = "省份,城市,地址,邮编,月薪,婚姻,教育,颜色,性别,生日,行业,Unnamed: 21,邮箱,身份证号,车架号";
    format!("{header}\n北京,,1 Main St,100000,,,,,,,,,a@b.com,123,F1\n")
}

fn mock_translator(calls: Arc<Mutex<Vec<String>>>) -> MockTranslator {
    let known = HashMap::from([
        ("省份", "Province"),
        ("城市", "City"),
        ("地址", "address"),
        ("邮编", "post code"),
        ("月薪", "Monthly salary"),
        ("婚姻", "marriage"),
        ("教育", "educate"),
        ("颜色", "color"),
        ("性别", "gender"),
        ("生日", "Birthday"),
        ("行业", "industry"),
        ("邮箱", "Email"),
        ("身份证号", "ID Number"),
    ]);
    MockTranslator { known, calls }
}

#[tokio::test]
async fn test_translated_headers_feed_the_pipeline() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, chinese_csv())?;

    let mut config = config_for(dir.path(), &input);
    config.translation.enabled = true;
    config
        .translation
        .overrides
        .insert("车架号".to_string(), "Frame number".to_string());

    let calls = Arc::new(Mutex::new(Vec::new()));
    let output = CsvOutputAdapter::from_config(&config)?;
    let use_case = CleanUseCase::new(
        config,
        Some(Box::new(mock_translator(calls.clone()))),
        Box::new(output),
    );
    let report = use_case.run().await?;

    assert_eq!(report.clean_rows, 1);
    assert_eq!(report.translation_failures, 0);
    let asked = calls.lock().unwrap().clone();
    assert_eq!(asked.len(), 13);
    assert!(!asked.iter().any(|l| l == "Unnamed: 21" || l == "车架号"));

    let clean = fs::read_to_string(dir.path().join("out/clean.csv"))?;
    assert!(clean.starts_with("Email,ID Number,Frame number,Full Address\n"));
    assert!(clean.contains("\"北京, 1 Main St, 100000\""));
    Ok(())
}

#[tokio::test]
async fn test_abort_policy_stops_on_untranslatable_header() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("owners.csv");
    fs::write(&input, chinese_csv())?;

    // 车架号 has neither an override nor a translation
    let mut config = config_for(dir.path(), &input);
    config.translation.enabled = true;
    config.translation.on_failure = TranslationFailurePolicy::Abort;

    let output = CsvOutputAdapter::from_config(&config)?;
    let use_case = CleanUseCase::new(
        config,
        Some(Box::new(mock_translator(Arc::new(Mutex::new(Vec::new()))))),
        Box::new(output),
    );
    let err = use_case.run().await.unwrap_err();

    assert!(matches!(err, CleanerError::Translation { ref label, .. } if label == "车架号"));
    assert!(!dir.path().join("out").exists());
    Ok(())
}
