use chrono::Duration;
use exam_core::model::{
    Answer, CompletionReason, ExamId, ExamResult, QuestionId, UserDraft, UserId,
};
use exam_core::time::fixed_now;
use storage::repository::{ExamResultRepository, StorageError, UserRepository};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_result(exam: u64, offset_secs: i64, reason: CompletionReason) -> ExamResult {
    let now = fixed_now();
    ExamResult::from_persisted(
        ExamId::new(exam),
        vec![
            Answer::new(QuestionId::new(2), 1),
            Answer::new(QuestionId::new(5), 0),
        ],
        75,
        3,
        2,
        67,
        now,
        now + Duration::seconds(offset_secs),
        reason,
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_exam_result() {
    let repo = connect("memdb_result_roundtrip").await;
    let result = build_result(4, 75, CompletionReason::TimedOut);

    let id = repo.append_result(None, &result).await.unwrap();
    let row = repo.get_result(id).await.unwrap();

    assert_eq!(row.id, id);
    assert_eq!(row.user_id, None);
    assert_eq!(row.result, result);
}

#[tokio::test]
async fn sqlite_missing_result_is_not_found() {
    let repo = connect("memdb_result_missing").await;
    let err = repo.get_result(404).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_lists_results_by_user_and_exam() {
    let repo = connect("memdb_result_listing").await;
    let user = repo
        .upsert_user(
            &UserDraft {
                google_id: "g-1".into(),
                email: "ada@example.com".into(),
                name: "Ada".into(),
            }
            .validate()
            .unwrap(),
            fixed_now(),
        )
        .await
        .unwrap();

    repo.append_result(Some(user.id), &build_result(1, 10, CompletionReason::Finished))
        .await
        .unwrap();
    repo.append_result(Some(user.id), &build_result(2, 20, CompletionReason::Finished))
        .await
        .unwrap();
    repo.append_result(None, &build_result(1, 30, CompletionReason::TimedOut))
        .await
        .unwrap();

    let mine = repo.list_results(Some(user.id), None, 10).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].result.exam_id(), ExamId::new(2));

    let exam_one = repo
        .list_results(None, Some(ExamId::new(1)), 10)
        .await
        .unwrap();
    assert_eq!(exam_one.len(), 2);
    assert_eq!(exam_one[0].result.reason(), CompletionReason::TimedOut);

    let nobody = repo
        .list_results(Some(UserId::new(999)), None, 10)
        .await
        .unwrap();
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn sqlite_upsert_user_updates_profile_in_place() {
    let repo = connect("memdb_user_upsert").await;
    let draft = |email: &str| {
        UserDraft {
            google_id: "g-42".into(),
            email: email.into(),
            name: "Grace".into(),
        }
        .validate()
        .unwrap()
    };

    let first = repo
        .upsert_user(&draft("first@example.com"), fixed_now())
        .await
        .unwrap();
    let second = repo
        .upsert_user(&draft("second@example.com"), fixed_now() + Duration::days(3))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.email, "second@example.com");
    assert_eq!(second.created_at, fixed_now());

    let found = repo.find_user_by_google_id("g-42").await.unwrap();
    assert_eq!(found, Some(second));
    assert!(repo.find_user_by_google_id("g-0").await.unwrap().is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
