use sqlx::Row;
use uuid::Uuid;

use surge_core::model::{
    ChapterId, ChapterProgress, ChatSession, Message, ModuleId, SessionKey, SessionScope,
    SsiScore, StudentId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn uuid_from_text(field: &'static str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

pub(crate) fn student_id_from_text(raw: &str) -> Result<StudentId, StorageError> {
    Ok(StudentId::from_uuid(uuid_from_text("student_id", raw)?))
}

pub(crate) fn module_id_from_text(raw: &str) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::from_uuid(uuid_from_text("module_id", raw)?))
}

pub(crate) fn chapter_id_from_text(raw: &str) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::from_uuid(uuid_from_text("chapter_id", raw)?))
}

/// Column encoding of a session key. Global sessions use empty-string
/// module/chapter markers so the composite primary key stays unique.
pub(crate) fn scope_to_columns(scope: SessionScope) -> (String, String) {
    match scope {
        SessionScope::Chapter { module, chapter } => (module.to_string(), chapter.to_string()),
        SessionScope::Global => (String::new(), String::new()),
    }
}

pub(crate) fn scope_from_columns(
    module_raw: &str,
    chapter_raw: &str,
) -> Result<SessionScope, StorageError> {
    match (module_raw.is_empty(), chapter_raw.is_empty()) {
        (true, true) => Ok(SessionScope::Global),
        (false, false) => Ok(SessionScope::chapter(
            module_id_from_text(module_raw)?,
            chapter_id_from_text(chapter_raw)?,
        )),
        _ => Err(StorageError::Serialization(
            "session scope has module without chapter or vice versa".into(),
        )),
    }
}

fn score_dim(field: &'static str, v: Option<i64>) -> Result<Option<u8>, StorageError> {
    v.map(|raw| {
        u8::try_from(raw).map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
    })
    .transpose()
}

/// Rebuilds an `SsiScore` from its six flattened columns. All-absent means
/// "never scored"; a partially present score is corrupt.
pub(crate) fn score_from_columns(
    overall: Option<i64>,
    self_awareness: Option<i64>,
    understanding: Option<i64>,
    resilience: Option<i64>,
    growth: Option<i64>,
    leadership: Option<i64>,
) -> Result<Option<SsiScore>, StorageError> {
    let dims = [
        score_dim("ssi_overall", overall)?,
        score_dim("ssi_self_awareness", self_awareness)?,
        score_dim("ssi_understanding", understanding)?,
        score_dim("ssi_resilience", resilience)?,
        score_dim("ssi_growth", growth)?,
        score_dim("ssi_leadership", leadership)?,
    ];
    if dims.iter().all(Option::is_none) {
        return Ok(None);
    }
    let [Some(o), Some(s), Some(u), Some(r), Some(g), Some(l)] = dims else {
        return Err(StorageError::Serialization(
            "partially stored SSI score".into(),
        ));
    };
    SsiScore::from_persisted(o, s, u, r, g, l).map(Some).map_err(ser)
}

pub(crate) fn score_to_columns(score: Option<SsiScore>) -> [Option<i64>; 6] {
    match score {
        Some(score) => [
            Some(i64::from(score.overall())),
            Some(i64::from(score.self_awareness())),
            Some(i64::from(score.understanding_opportunities())),
            Some(i64::from(score.resilience())),
            Some(i64::from(score.growth_execution())),
            Some(i64::from(score.entrepreneurial_leadership())),
        ],
        None => [None; 6],
    }
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChatSession, StorageError> {
    let student = student_id_from_text(&row.try_get::<String, _>("student_id").map_err(ser)?)?;
    let module_raw: String = row.try_get("module_id").map_err(ser)?;
    let chapter_raw: String = row.try_get("chapter_id").map_err(ser)?;
    let scope = scope_from_columns(&module_raw, &chapter_raw)?;

    let conversation_json: String = row.try_get("conversation").map_err(ser)?;
    let conversation: Vec<Message> = serde_json::from_str(&conversation_json).map_err(ser)?;

    let ssi_score = score_from_columns(
        row.try_get("ssi_overall").map_err(ser)?,
        row.try_get("ssi_self_awareness").map_err(ser)?,
        row.try_get("ssi_understanding").map_err(ser)?,
        row.try_get("ssi_resilience").map_err(ser)?,
        row.try_get("ssi_growth").map_err(ser)?,
        row.try_get("ssi_leadership").map_err(ser)?,
    )?;

    let is_completed: i64 = row.try_get("is_completed").map_err(ser)?;

    ChatSession::from_persisted(
        SessionKey::new(student, scope),
        conversation,
        ssi_score,
        is_completed != 0,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("finished_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ChapterProgress, StorageError> {
    let student = student_id_from_text(&row.try_get::<String, _>("student_id").map_err(ser)?)?;
    let module = module_id_from_text(&row.try_get::<String, _>("module_id").map_err(ser)?)?;
    let chapter = chapter_id_from_text(&row.try_get::<String, _>("chapter_id").map_err(ser)?)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    Ok(ChapterProgress::from_persisted(
        student, module, chapter, completed_at,
    ))
}
