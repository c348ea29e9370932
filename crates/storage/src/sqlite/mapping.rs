use sqlx::Row;
use tutor_core::difficulty::DifficultyLevel;
use tutor_core::mastery::{MasteryLabel, MasteryPercentage};
use tutor_core::model::{TestSessionSummary, TopicId, TopicMasteryRecord, UserId};

use crate::repository::{StorageError, SummaryRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

fn percentage_from_i64(v: i64) -> Result<MasteryPercentage, StorageError> {
    let raw = u8::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid progress: {v}")))?;
    MasteryPercentage::try_new(raw).map_err(ser)
}

fn difficulty_from_i64(field: &'static str, v: i64) -> Result<DifficultyLevel, StorageError> {
    let raw =
        u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))?;
    DifficultyLevel::try_new(raw).map_err(ser)
}

pub(crate) fn map_mastery_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TopicMasteryRecord, StorageError> {
    let label: String = row.try_get("label").map_err(ser)?;
    let label: MasteryLabel = label.parse().map_err(ser)?;

    TopicMasteryRecord::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        percentage_from_i64(row.try_get::<i64, _>("progress").map_err(ser)?)?,
        label,
        row.try_get("last_practiced_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_summary_row(row: &sqlx::sqlite::SqliteRow) -> Result<SummaryRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let summary = TestSessionSummary::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        u32_from_i64(
            "total_answered",
            row.try_get::<i64, _>("total_answered").map_err(ser)?,
        )?,
        u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
        difficulty_from_i64(
            "final_difficulty",
            row.try_get::<i64, _>("final_difficulty").map_err(ser)?,
        )?,
        difficulty_from_i64(
            "peak_difficulty",
            row.try_get::<i64, _>("peak_difficulty").map_err(ser)?,
        )?,
    )
    .map_err(ser)?;

    Ok(SummaryRow::new(id, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            user_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(topic_id_from_i64(4).unwrap(), TopicId::new(4));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(percentage_from_i64(101).is_err());
        assert!(percentage_from_i64(-5).is_err());
        assert!(difficulty_from_i64("final_difficulty", 0).is_err());
        assert_eq!(
            difficulty_from_i64("final_difficulty", 3).unwrap(),
            DifficultyLevel::HARD
        );
    }

    #[test]
    fn oversized_ids_do_not_wrap() {
        assert!(id_to_i64("user_id", u64::MAX).is_err());
    }
}
