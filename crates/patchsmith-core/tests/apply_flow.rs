use patchsmith_core::services::apply::{ApplyAction, ChangeApplicator};
use patchsmith_core::services::response::parse_response;
use patchsmith_core::shared::logging::InteractionLog;
use patchsmith_core::{EditSource, TaskState};
use std::fs;
use tempfile::TempDir;

// モデル応答の想定例。新規1件 + 検索置換1件
const RESPONSE: &str = r#"
<summary>
Creates new.txt and renames the constant in config.rs.
</summary>
<file_list>
new.txt
config.rs
</file_list>
<file>
<file_path>new.txt</file_path>
<file_status>new</file_status>
<file_content>
hello
</file_content>
</file>
<file>
<file_path>config.rs</file_path>
<file_status>modified</file_status>
<file_changes>
<change>
<search>
const RETRIES: u8 = 3;
</search>
<replace>
const RETRIES: u8 = 5;
</replace>
</change>
</file_changes>
</file>
<git_branch_name>feature/retries</git_branch_name>
<git_commit_message>chore: bump retry count</git_commit_message>
<potential_issues>None.</potential_issues>
"#;

fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.rs"),
        "const RETRIES: u8 = 3;\nconst TIMEOUT: u8 = 9;\n",
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn test_end_to_end_apply() {
    let dir = setup_workspace();
    let parsed = parse_response(RESPONSE, &InteractionLog::disabled());
    assert_eq!(parsed.file_list, vec!["new.txt", "config.rs"]);

    let applicator = ChangeApplicator::new(dir.path(), false, None);
    let report = applicator
        .apply_all(&parsed.files, &InteractionLog::disabled())
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("new.txt")).unwrap(),
        "hello"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("config.rs")).unwrap(),
        "const RETRIES: u8 = 5;\nconst TIMEOUT: u8 = 9;\n"
    );
    assert_eq!(report.entries[0].action, ApplyAction::Created);
    assert_eq!(report.entries[1].action, ApplyAction::Modified);
}

#[tokio::test]
async fn test_end_to_end_dry_run_is_side_effect_free() {
    let dir = setup_workspace();
    let parsed = parse_response(RESPONSE, &InteractionLog::disabled());

    let applicator = ChangeApplicator::new(dir.path(), true, None);
    applicator
        .apply_all(&parsed.files, &InteractionLog::disabled())
        .await
        .unwrap();

    assert!(!dir.path().join("new.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("config.rs")).unwrap(),
        "const RETRIES: u8 = 3;\nconst TIMEOUT: u8 = 9;\n"
    );
}

#[tokio::test]
async fn test_saved_state_replays_identically() {
    let dir = setup_workspace();
    let parsed = parse_response(RESPONSE, &InteractionLog::disabled());

    // 保存して読み直してから適用しても結果は同じ
    let state = TaskState {
        task_description: "bump retries".to_string(),
        parsed_response: parsed.clone(),
    };
    let state_path = state.save(&dir.path().join(".patchsmith/task-1")).await.unwrap();
    let loaded = TaskState::load(&state_path).await.unwrap();
    assert_eq!(loaded.parsed_response, parsed);
    match &loaded.parsed_response.files[1].source {
        EditSource::SearchReplace { blocks } => assert_eq!(blocks.len(), 1),
        other => panic!("expected search/replace after round trip, got {:?}", other),
    }

    let applicator = ChangeApplicator::new(dir.path(), false, None);
    applicator
        .apply_all(&loaded.parsed_response.files, &InteractionLog::disabled())
        .await
        .unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("config.rs")).unwrap(),
        "const RETRIES: u8 = 5;\nconst TIMEOUT: u8 = 9;\n"
    );
}
