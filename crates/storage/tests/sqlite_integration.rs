use storage::repository::{ModuleRepository, ProgressRepository, SessionRepository};
use storage::sqlite::SqliteRepository;
use surge_core::model::{
    Chapter, ChapterId, ChapterProgress, ChatSession, Message, Module, ModuleId, SessionKey,
    SessionScope, SsiScore, StudentId,
};
use surge_core::time::fixed_now;

fn build_session(key: SessionKey) -> ChatSession {
    let now = fixed_now();
    let mut session = ChatSession::new(key);
    session
        .append_exchange(
            Message::seed(now),
            Message::assistant("What problem do you want to solve?", now).unwrap(),
        )
        .unwrap();
    session
        .append_exchange(
            Message::user("Tutoring for rural schools", now).unwrap(),
            Message::assistant("Who would pay for it?", now).unwrap(),
        )
        .unwrap();
    session.record_score(SsiScore::new(62, 60, 55, 70, 58, 66).unwrap());
    session
}

#[tokio::test]
async fn sqlite_roundtrips_session_with_conversation_and_score() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_session_rt?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let key = SessionKey::new(
        StudentId::new(),
        SessionScope::chapter(ModuleId::new(), ChapterId::new()),
    );
    let mut session = build_session(key);
    session.finish(fixed_now()).unwrap();
    repo.upsert_session(&session).await.unwrap();

    let fetched = repo.get_session(&key).await.expect("fetch").expect("some");
    assert_eq!(fetched.conversation().len(), 4);
    assert!(fetched.is_completed());
    assert_eq!(fetched.started_at(), Some(fixed_now()));
    assert_eq!(fetched.finished_at(), Some(fixed_now()));
    let score = fetched.ssi_score().expect("score persisted");
    assert_eq!(score.overall(), 62);
    assert_eq!(score.resilience(), 70);
    // The seed survives persistence but stays hidden from the visible view.
    assert_eq!(fetched.visible_conversation().count(), 3);
}

#[tokio::test]
async fn sqlite_upsert_replaces_instead_of_duplicating() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_session_up?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let student = StudentId::new();
    let key = SessionKey::global(student);
    let mut session = build_session(key);
    repo.upsert_session(&session).await.unwrap();

    session
        .append_exchange(
            Message::user("Maybe school districts", fixed_now()).unwrap(),
            Message::assistant("How would you reach them?", fixed_now()).unwrap(),
        )
        .unwrap();
    repo.upsert_session(&session).await.unwrap();

    let sessions = repo.list_sessions_by_student(student).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].conversation().len(), 6);
}

#[tokio::test]
async fn sqlite_missing_session_reads_as_none() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_session_none?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let key = SessionKey::global(StudentId::new());
    assert!(repo.get_session(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_catalog_and_progress_roundtrip() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_catalog?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let module = Module::new(ModuleId::new(), "Founding Mindset").unwrap();
    repo.insert_module(&module).await.unwrap();

    let reflective = Chapter::new(ChapterId::new(), module.id(), "Reflect", 1, true).unwrap();
    let intro = Chapter::new(ChapterId::new(), module.id(), "Intro", 0, false).unwrap();
    repo.insert_chapter(&reflective).await.unwrap();
    repo.insert_chapter(&intro).await.unwrap();

    let chapters = repo.list_chapters(module.id()).await.unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].title(), "Intro");
    assert!(chapters[1].ai_interaction_enabled());

    let student = StudentId::new();
    let mut progress = ChapterProgress::locked(student, module.id(), intro.id());
    progress.mark_complete(fixed_now());
    repo.upsert_progress(&progress).await.unwrap();
    // Second upsert with the same state is a no-op, not a duplicate.
    repo.upsert_progress(&progress).await.unwrap();

    let records = repo.list_progress_by_student(student).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].unlocked_complete());
    assert_eq!(records[0].completed_at(), Some(fixed_now()));
}

#[tokio::test]
async fn sqlite_duplicate_module_is_a_conflict() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_conflict?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let module = Module::new(ModuleId::new(), "Once").unwrap();
    repo.insert_module(&module).await.unwrap();
    let err = repo.insert_module(&module).await.unwrap_err();
    assert!(matches!(err, storage::repository::StorageError::Conflict));
}
