use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_repeat_unit, parse_status, to_i64, to_u64},
    models::{AlarmRecord, AlarmStatus, NewAlarm, Recurrence},
};

const ALARM_COLUMNS: &str = "id, fire_time, anchor_time, status, snooze_interval_secs, payload, \
     repeat_unit, repeat_every, created_at, updated_at";

fn row_to_alarm(row: &Row) -> Result<AlarmRecord> {
    let fire_time: String = row.get("fire_time")?;
    let anchor_time: String = row.get("anchor_time")?;
    let status: String = row.get("status")?;
    let snooze_interval_secs: Option<i64> = row.get("snooze_interval_secs")?;
    let payload: String = row.get("payload")?;
    let repeat_unit: Option<String> = row.get("repeat_unit")?;
    let repeat_every: Option<i64> = row.get("repeat_every")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let recurs = match repeat_unit {
        Some(unit) => {
            let every = to_u64(repeat_every.unwrap_or(1), "repeat_every")?;
            Some(Recurrence::new(
                parse_repeat_unit(&unit)?,
                u32::try_from(every).unwrap_or(u32::MAX),
            ))
        }
        None => None,
    };

    Ok(AlarmRecord {
        id: row.get("id")?,
        fire_time: parse_datetime(&fire_time, "fire_time")?,
        anchor_time: parse_datetime(&anchor_time, "anchor_time")?,
        status: parse_status(&status)?,
        snooze_interval_secs: snooze_interval_secs
            .map(|secs| to_u64(secs, "snooze_interval_secs"))
            .transpose()?,
        payload: serde_json::from_str(&payload).context("failed to parse alarm payload")?,
        recurs,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn query_alarms(conn: &Connection, sql: &str, statuses: &[AlarmStatus]) -> Result<Vec<AlarmRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(statuses.iter().map(|s| s.as_str())))?;
    let mut alarms = Vec::new();
    while let Some(row) = rows.next()? {
        alarms.push(row_to_alarm(row)?);
    }
    Ok(alarms)
}

impl Database {
    pub async fn get_alarm(&self, id: i64) -> Result<Option<AlarmRecord>> {
        self.execute(move |conn| {
            let sql = format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1");
            let alarm = conn
                .query_row(&sql, params![id], |row| Ok(row_to_alarm(row)))
                .optional()?
                .transpose()?;
            Ok(alarm)
        })
        .await
    }

    /// Upsert keyed by `id`.
    pub async fn put_alarm(&self, alarm: &AlarmRecord) -> Result<()> {
        let record = alarm.clone();
        self.execute(move |conn| {
            let payload =
                serde_json::to_string(&record.payload).context("failed to encode alarm payload")?;
            conn.execute(
                "INSERT INTO alarms (id, fire_time, anchor_time, status, snooze_interval_secs, payload, repeat_unit, repeat_every, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     fire_time = excluded.fire_time,
                     anchor_time = excluded.anchor_time,
                     status = excluded.status,
                     snooze_interval_secs = excluded.snooze_interval_secs,
                     payload = excluded.payload,
                     repeat_unit = excluded.repeat_unit,
                     repeat_every = excluded.repeat_every,
                     updated_at = excluded.updated_at",
                params![
                    record.id,
                    record.fire_time.to_rfc3339(),
                    record.anchor_time.to_rfc3339(),
                    record.status.as_str(),
                    record.snooze_interval_secs.map(to_i64).transpose()?,
                    payload,
                    record.recurs.map(|r| r.unit.as_str()),
                    record.recurs.map(|r| i64::from(r.every)),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to store alarm {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Inserts a new `Scheduled` alarm and returns it with its assigned id.
    /// AUTOINCREMENT keeps ids from being handed out twice, even after deletes.
    pub async fn insert_alarm(&self, alarm: &NewAlarm, now: DateTime<Utc>) -> Result<AlarmRecord> {
        let request = alarm.clone();
        self.execute(move |conn| {
            let payload = serde_json::to_string(&request.payload)
                .context("failed to encode alarm payload")?;
            let snooze_interval_secs = request.resolved_snooze_secs();
            conn.execute(
                "INSERT INTO alarms (fire_time, anchor_time, status, snooze_interval_secs, payload, repeat_unit, repeat_every, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    request.fire_time.to_rfc3339(),
                    request.fire_time.to_rfc3339(),
                    AlarmStatus::Scheduled.as_str(),
                    snooze_interval_secs.map(to_i64).transpose()?,
                    payload,
                    request.recurs.map(|r| r.unit.as_str()),
                    request.recurs.map(|r| i64::from(r.every)),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .context("failed to insert alarm")?;

            Ok(AlarmRecord {
                id: conn.last_insert_rowid(),
                fire_time: request.fire_time,
                anchor_time: request.fire_time,
                status: AlarmStatus::Scheduled,
                snooze_interval_secs,
                payload: request.payload,
                recurs: request.recurs,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    /// Returns whether a row was removed. Deleting a missing id is not an error.
    pub async fn delete_alarm(&self, id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM alarms WHERE id = ?1", params![id])
                .with_context(|| format!("failed to delete alarm {id}"))?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// All alarms in ascending id order.
    pub async fn list_alarms(&self) -> Result<Vec<AlarmRecord>> {
        self.execute(|conn| {
            let sql = format!("SELECT {ALARM_COLUMNS} FROM alarms ORDER BY id ASC");
            query_alarms(conn, &sql, &[])
        })
        .await
    }

    pub async fn list_alarms_with_status(
        &self,
        statuses: &[AlarmStatus],
    ) -> Result<Vec<AlarmRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let statuses = statuses.to_vec();
        self.execute(move |conn| {
            let placeholders = (1..=statuses.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {ALARM_COLUMNS} FROM alarms WHERE status IN ({placeholders}) ORDER BY id ASC"
            );
            query_alarms(conn, &sql, &statuses)
        })
        .await
    }
}
