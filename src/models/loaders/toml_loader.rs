use crate::error::AppError;
use crate::models::answers::AnswerMap;
use crate::models::blueprint::Blueprint;
use crate::models::item::BankItem;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载试卷蓝图并校验
pub async fn load_blueprint(toml_file_path: &Path) -> Result<Blueprint> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(toml_file_path, e))?;

    let blueprint: Blueprint = toml::from_str(&content)
        .map_err(|e| AppError::toml_parse_failed(toml_file_path, e))?;

    blueprint
        .validate()
        .with_context(|| format!("蓝图校验失败: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载蓝图 {}: {} 个分段",
        toml_file_path.file_name().unwrap_or_default().to_string_lossy(),
        blueprint.sections.len()
    );

    Ok(blueprint)
}

/// 从 JSON 文件加载回放作答（id -> 作答）
pub async fn load_replay_answers(json_file_path: &Path) -> Result<AnswerMap> {
    let content = fs::read_to_string(json_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(json_file_path, e))?;

    let answers: AnswerMap = serde_json::from_str(&content)
        .map_err(|e| AppError::json_parse_failed(json_file_path, e))?;

    tracing::info!("成功加载 {} 条回放作答", answers.len());

    Ok(answers)
}

/// 从 JSON 文件加载本地题库（题目记录数组）
pub async fn load_bank_fixture(json_file_path: &Path) -> Result<Vec<BankItem>> {
    let content = fs::read_to_string(json_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(json_file_path, e))?;

    let items: Vec<BankItem> = serde_json::from_str(&content)
        .map_err(|e| AppError::json_parse_failed(json_file_path, e))?;

    tracing::info!("成功加载本地题库: {} 道题", items.len());

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileError;
    use crate::models::task::{Section, Stage, TaskType};
    use std::io::Write;

    const BLUEPRINT: &str = r#"
name = "mini"

[[sections]]
section = "reading"
time_limit_secs = 600
reviewable = true

[[sections.router]]
task_type = "complete_the_words"
count = 2
prefix = "RD-R"

[[sections.lower]]
task_type = "read_in_daily_life"
count = 1
prefix = "RD-L"

[[sections.upper]]
task_type = "read_academic_passage"
count = 1
prefix = "RD-U"

[[sections]]
section = "speaking"

[[sections.linear]]
task_type = "listen_and_repeat"
count = 3
"#;

    #[tokio::test]
    async fn test_load_blueprint_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BLUEPRINT.as_bytes()).unwrap();

        let blueprint = load_blueprint(file.path()).await.unwrap();

        assert_eq!(blueprint.name, "mini");
        let reading = blueprint.section(Section::Reading).unwrap();
        assert!(reading.is_adaptive());
        assert!(reading.reviewable);
        assert_eq!(reading.slots(Stage::Router)[0].count, 2);
        assert_eq!(reading.slots(Stage::Upper)[0].task_type, TaskType::ReadAcademicPassage);

        let speaking = blueprint.section(Section::Speaking).unwrap();
        assert!(!speaking.is_adaptive());
        assert_eq!(speaking.slots(Stage::Linear)[0].prefix, "");
    }

    #[tokio::test]
    async fn test_load_blueprint_rejects_invalid_plan() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[[sections]]
section = "reading"

[[sections.router]]
task_type = "complete_the_words"
count = 1
"#,
        )
        .unwrap();

        assert!(load_blueprint(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_bank_fixture_accepts_numeric_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"[{"id": 101, "task_type": "write_email", "section": "writing",
                  "prompt_content": "{\"prompt\": \"Write\"}"}]"#,
        )
        .unwrap();

        let items = load_bank_fixture(file.path()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "101");
        assert!(items[0].questions.is_empty());
    }

    #[tokio::test]
    async fn test_load_replay_answers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"q1": 2, "entry-1": "[\"a\", \"b\"]"}"#).unwrap();

        let answers = load_replay_answers(file.path()).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("q1"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_missing_blueprint_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        let err = load_blueprint(&missing).await.unwrap_err();

        match err.downcast_ref::<AppError>() {
            Some(AppError::File(FileError::ReadFailed { path, .. })) => {
                assert!(path.ends_with("missing.toml"));
            }
            other => panic!("意外错误: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_files_report_parse_errors() {
        let mut toml_file = tempfile::NamedTempFile::new().unwrap();
        toml_file.write_all(b"[[sections]\nsection = ").unwrap();
        let err = load_blueprint(toml_file.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::File(FileError::TomlParseFailed { .. }))
        ));

        let mut json_file = tempfile::NamedTempFile::new().unwrap();
        json_file.write_all(b"{not json").unwrap();
        let err = load_replay_answers(json_file.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::File(FileError::JsonParseFailed { .. }))
        ));
    }
}
