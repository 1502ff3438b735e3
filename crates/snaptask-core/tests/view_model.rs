mod common;

use std::fs;

use common::{FakeBackend, PUBLIC_BASE, alice, task};
use snaptask_core::viewmodel::{CreateOutcome, Phase, SelectedFile, SkipReason, TaskViewModel};

fn image_file(dir: &tempfile::TempDir, name: &str) -> SelectedFile {
    let path = dir.path().join(name);
    fs::write(&path, b"\x89PNG\r\n\x1a\nfake").expect("write image");
    SelectedFile::new(path)
}

#[tokio::test]
async fn no_identity_means_no_fetch() {
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(vec![task(1, "a", false)]));

    vm.on_identity(None).await.expect("no-op");

    assert_eq!(vm.backend().count_calls("list"), 0);
    assert!(vm.tasks().is_empty());
    assert_eq!(vm.phase(), Phase::Uninitialized);
    assert!(vm.is_loading());

    vm.reload().await.expect("no-op reload");
    assert_eq!(vm.backend().count_calls("list"), 0);
}

#[tokio::test]
async fn identity_ready_loads_once() {
    let rows = vec![task(1, "a", false), task(2, "b", true)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));

    vm.on_identity(Some(alice())).await.expect("load");

    assert_eq!(vm.backend().count_calls("list"), 1);
    assert_eq!(vm.tasks(), rows.as_slice());
    assert_eq!(vm.phase(), Phase::Loaded);
    assert!(!vm.is_loading());
}

#[tokio::test]
async fn failed_load_keeps_previous_list() {
    let rows = vec![task(1, "a", false)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));
    vm.on_identity(Some(alice())).await.expect("load");

    vm.backend().set_fail_list(true);
    assert!(vm.load().await.is_err());

    assert_eq!(vm.tasks(), rows.as_slice());
    assert!(!vm.is_loading());
    assert_eq!(vm.phase(), Phase::Loaded);
}

#[tokio::test]
async fn create_uploads_inserts_and_reloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(vec![task(1, "existing", false)]));
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().clear_calls();

    vm.set_name("Buy milk");
    vm.select_files(vec![image_file(&dir, "milk.png")]);
    let outcome = vm.create().await.expect("create");

    let (object_key, image_url, upload_error) = match outcome {
        CreateOutcome::Created {
            object_key,
            image_url,
            upload_error,
        } => (object_key, image_url, upload_error),
        other => panic!("expected a created outcome, got {other:?}"),
    };
    assert_eq!(upload_error, None);
    assert_eq!(image_url, format!("{PUBLIC_BASE}/{object_key}"));

    assert_eq!(
        vm.backend().calls(),
        vec![
            format!("upload {object_key}"),
            "insert Buy milk".to_string(),
            "list".to_string(),
        ]
    );

    let created: Vec<_> = vm.tasks().iter().filter(|t| t.name == "Buy milk").collect();
    assert_eq!(created.len(), 1);
    assert!(!created[0].is_done);
    assert!(created[0].has_image());
    assert_eq!(vm.tasks(), vm.backend().rows().as_slice());

    let stored = vm.backend().state.lock().objects.get(&object_key).cloned();
    let stored = stored.expect("object stored");
    assert_eq!(stored.content_type, "image/png");
    assert!(stored.bytes.starts_with(b"\x89PNG"));

    assert_eq!(vm.name(), "");
    assert!(vm.selected_file().is_none());
    assert!(vm.preview_url().is_none());
}

#[tokio::test]
async fn create_without_file_does_nothing() {
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(vec![task(1, "a", false)]));
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().clear_calls();
    let before = vm.tasks().to_vec();

    vm.set_name("No picture");
    let outcome = vm.create().await.expect("create");

    assert_eq!(outcome, CreateOutcome::Skipped(SkipReason::NoFile));
    assert!(vm.backend().calls().is_empty());
    assert_eq!(vm.tasks(), before.as_slice());
}

#[tokio::test]
async fn create_without_identity_does_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::default());

    vm.set_name("x");
    vm.select_files(vec![image_file(&dir, "x.jpg")]);
    let outcome = vm.create().await.expect("create");

    assert_eq!(outcome, CreateOutcome::Skipped(SkipReason::NoIdentity));
    assert!(vm.backend().calls().is_empty());
}

#[tokio::test]
async fn failed_upload_still_inserts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::default());
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().set_fail_upload(true);

    vm.set_name("Broken image");
    vm.select_files(vec![image_file(&dir, "x.gif")]);
    let outcome = vm.create().await.expect("create");

    match outcome {
        CreateOutcome::Created { upload_error, .. } => assert!(upload_error.is_some()),
        other => panic!("expected created, got {other:?}"),
    }
    assert_eq!(vm.backend().count_calls("insert"), 1);
    assert_eq!(vm.tasks().len(), 1);
}

#[tokio::test]
async fn toggle_changes_only_that_task() {
    let rows = vec![task(1, "a", false), task(2, "b", false), task(3, "c", true)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));
    vm.on_identity(Some(alice())).await.expect("load");

    vm.toggle_done(2, true).await.expect("toggle");

    let after = vm.tasks();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], rows[0]);
    assert!(after[1].is_done);
    assert_eq!(after[1].name, "b");
    assert_eq!(after[1].image_url, rows[1].image_url);
    assert_eq!(after[2], rows[2]);
    assert_eq!(vm.backend().count_calls("list"), 2);
}

#[tokio::test]
async fn delete_removes_exactly_that_task() {
    let rows = vec![task(1, "a", false), task(2, "b", true), task(3, "c", false)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));
    vm.on_identity(Some(alice())).await.expect("load");

    vm.delete(2).await.expect("delete");

    assert_eq!(vm.tasks(), &[rows[0].clone(), rows[2].clone()]);
}

#[tokio::test]
async fn list_matches_backend_after_mixed_mutations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(vec![task(1, "a", false)]));
    vm.on_identity(Some(alice())).await.expect("load");

    vm.set_name("b");
    vm.select_files(vec![image_file(&dir, "b.png")]);
    vm.create().await.expect("create");
    vm.toggle_done(1, true).await.expect("toggle");
    vm.set_name("c");
    vm.select_files(vec![image_file(&dir, "c.jpeg")]);
    vm.create().await.expect("create");
    vm.delete(1).await.expect("delete");
    vm.toggle_done(3, true).await.expect("toggle");

    assert_eq!(vm.tasks(), vm.backend().rows().as_slice());
    let names: Vec<_> = vm.tasks().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn selecting_a_file_sets_preview_before_any_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::default());
    let file = image_file(&dir, "first.png");
    let expected = format!("file://{}", file.path.display());

    vm.select_files(vec![file.clone(), image_file(&dir, "second.png")]);

    assert_eq!(vm.selected_file(), Some(&file));
    assert_eq!(vm.preview_url(), Some(expected.as_str()));
    assert!(vm.backend().calls().is_empty());

    vm.select_files(vec![]);
    assert!(vm.selected_file().is_none());
    assert!(vm.preview_url().is_none());
}

#[test]
fn non_image_selection_is_rejected() {
    let mut vm = TaskViewModel::new(FakeBackend::default());

    vm.select_files(vec![SelectedFile::new("/tmp/report.pdf")]);
    assert!(vm.file_type_error());
    assert!(vm.selected_file().is_none());

    vm.select_files(vec![SelectedFile::new("/tmp/cat.png")]);
    assert!(!vm.file_type_error());
    assert!(vm.selected_file().is_some());
}

#[tokio::test]
async fn row_actions_need_identity() {
    let rows = vec![task(1, "a", false), task(2, "b", false)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));
    vm.on_identity(None).await.expect("no-op");

    vm.delete(1).await.expect("skipped delete");
    vm.toggle_done(2, true).await.expect("skipped toggle");

    assert!(vm.backend().calls().is_empty());
    assert_eq!(vm.backend().rows(), rows);
}

#[tokio::test]
async fn failed_insert_still_reloads_and_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(vec![task(1, "a", false)]));
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().clear_calls();
    vm.backend().set_fail_insert(true);

    vm.set_name("Rejected");
    vm.select_files(vec![image_file(&dir, "r.png")]);
    let result = vm.create().await;

    assert!(result.is_err());
    let calls = vm.backend().calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("upload "));
    assert_eq!(calls[1], "insert Rejected");
    assert_eq!(calls[2], "list");
    assert_eq!(vm.tasks().len(), 1);
    assert_eq!(vm.name(), "");
}

#[tokio::test]
async fn failed_toggle_and_delete_still_reload() {
    let rows = vec![task(1, "a", false), task(2, "b", false)];
    let mut vm = TaskViewModel::new(FakeBackend::with_rows(rows.clone()));
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().clear_calls();
    vm.backend().set_fail_update(true);
    vm.backend().set_fail_delete(true);

    assert!(vm.toggle_done(1, true).await.is_err());
    assert!(vm.delete(2).await.is_err());

    assert_eq!(
        vm.backend().calls(),
        vec!["update 1 true", "list", "delete 2", "list"]
    );
    assert_eq!(vm.tasks(), rows.as_slice());
}

#[tokio::test]
async fn unreadable_file_counts_as_upload_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut vm = TaskViewModel::new(FakeBackend::default());
    vm.on_identity(Some(alice())).await.expect("load");
    vm.backend().clear_calls();

    let file = image_file(&dir, "gone.png");
    fs::remove_file(&file.path).expect("remove image");
    vm.set_name("Lost picture");
    vm.select_files(vec![file]);
    let outcome = vm.create().await.expect("create");

    match outcome {
        CreateOutcome::Created { upload_error, .. } => {
            let message = upload_error.expect("upload error");
            assert!(message.contains("gone.png"), "got {message}");
        }
        other => panic!("expected created, got {other:?}"),
    }
    assert_eq!(vm.backend().calls(), vec!["insert Lost picture", "list"]);
    assert_eq!(vm.backend().count_calls("upload"), 0);
    assert_eq!(vm.tasks().len(), 1);
}
