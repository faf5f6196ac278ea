//! Alert queries. Sole writer is `flintroute-monitor`; append-only
//! apart from the ack fields.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flintroute_schemas::{Alert, AlertType, Severity};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert(
    pool: &PgPool,
    id: Uuid,
    alert_type: AlertType,
    severity: Severity,
    message: &str,
    peer_id: Option<Uuid>,
) -> Result<Alert> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        insert into alerts (id, alert_type, severity, message, peer_id, acknowledged)
        values ($1, $2, $3, $4, $5, false)
        returning *
        "#,
    )
    .bind(id)
    .bind(alert_type.as_str())
    .bind(severity_str(severity))
    .bind(message)
    .bind(peer_id)
    .fetch_one(pool)
    .await
    .context("insert alert failed")?;

    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Alert>> {
    let row = sqlx::query_as::<_, AlertRow>("select * from alerts where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get alert failed")?;

    Ok(row.map(Into::into))
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub acknowledged: Option<bool>,
    pub severity: Option<Severity>,
}

pub async fn list(pool: &PgPool, filter: &AlertFilter) -> Result<Vec<Alert>> {
    let rows = sqlx::query_as::<_, AlertRow>(
        r#"
        select * from alerts
        where ($1::boolean is null or acknowledged = $1)
          and ($2::text is null or severity = $2)
        order by created_at desc
        "#,
    )
    .bind(filter.acknowledged)
    .bind(filter.severity.map(severity_str))
    .fetch_all(pool)
    .await
    .context("list alerts failed")?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Mark an alert acknowledged. A second call on an already-acknowledged
/// alert is a no-op: acknowledgement never reverts once set.
pub async fn acknowledge(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<Option<Alert>> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        update alerts set
            acknowledged = true,
            acknowledged_at = now(),
            acknowledged_by = $2
        where id = $1 and acknowledged = false
        returning *
        "#,
    )
    .bind(id)
    .bind(actor)
    .fetch_optional(pool)
    .await
    .context("acknowledge alert failed")?;

    match row {
        Some(r) => Ok(Some(r.into())),
        None => get(pool, id).await,
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "warning" => Severity::Warning,
        "critical" => Severity::Critical,
        _ => Severity::Info,
    }
}

fn parse_alert_type(s: &str) -> AlertType {
    match s {
        "peer_down" => AlertType::PeerDown,
        _ => AlertType::PeerUp,
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    alert_type: String,
    severity: String,
    message: String,
    peer_id: Option<Uuid>,
    acknowledged: bool,
    acknowledged_at: Option<DateTime<Utc>>,
    acknowledged_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<AlertRow> for Alert {
    fn from(r: AlertRow) -> Self {
        Alert {
            id: r.id,
            alert_type: parse_alert_type(&r.alert_type),
            severity: parse_severity(&r.severity),
            message: r.message,
            peer_id: r.peer_id,
            acknowledged: r.acknowledged,
            acknowledged_at: r.acknowledged_at,
            acknowledged_by: r.acknowledged_by,
            created_at: r.created_at,
        }
    }
}
