//! # ml Warehouse Queries
//!
//! Read-only access to the multi-LIMS warehouse (MySQL). The warehouse is
//! the source of truth for which people are attached to a study and in what
//! role; notifications go to the union of a study's managers, followers and
//! owners.

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{FromRow, MySqlPool};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use crate::config::MlwhSection;
use crate::error::{NotifyError, NotifyResult};

/// Roles whose holders receive study notifications
pub const CONTACT_ROLES: [&str; 3] = ["manager", "follower", "owner"];

/// A study row, as used in notification text
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Study {
    pub id_study_lims: String,
    pub name: Option<String>,
}

/// A study_users row; both columns are nullable in the warehouse
#[derive(Debug, Clone, FromRow)]
pub struct StudyUserRow {
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Create a connection pool for the warehouse
///
/// The pool connects lazily, so a consumer run that claims no tasks never
/// opens a database connection.
pub fn connect_pool(config: &MlwhSection) -> MySqlPool {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.schema)
        .charset("utf8mb4");
    if let Some(ref password) = config.password {
        options = options.password(password);
    }

    MySqlPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect_lazy_with(options)
}

/// Retrieve the email addresses of a study's contacts
///
/// Contacts are the distinct addresses of `study_users` rows in one of the
/// [`CONTACT_ROLES`], returned sorted. A study without contacts yields an
/// empty list; an unknown study is [`NotifyError::StudyNotFound`].
pub async fn study_contacts(pool: &MySqlPool, study_id: &str) -> NotifyResult<Vec<String>> {
    let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM study WHERE id_study_lims = ?")
        .bind(study_id)
        .fetch_one(pool)
        .await?;
    if known == 0 {
        return Err(NotifyError::StudyNotFound(study_id.to_string()));
    }

    let rows = sqlx::query_as::<_, StudyUserRow>(
        r"
        SELECT su.email, su.role
        FROM study_users su
        JOIN study s ON s.id_study_tmp = su.id_study_tmp
        WHERE s.id_study_lims = ?
        ",
    )
    .bind(study_id)
    .fetch_all(pool)
    .await?;

    let contacts = collect_contact_emails(&rows);
    debug!(study_id, contacts = contacts.len(), "Retrieved study contacts");
    Ok(contacts)
}

/// Retrieve the studies associated with an ONT run
///
/// A run is identified by its experiment name, instrument slot and flowcell
/// ID; multiplexed runs span several studies. Results are ordered by
/// ascending study ID so notification text is deterministic.
pub async fn studies_for_ont_run(
    pool: &MySqlPool,
    experiment_name: &str,
    instrument_slot: i32,
    flowcell_id: &str,
) -> NotifyResult<Vec<Study>> {
    let studies = sqlx::query_as::<_, Study>(
        r"
        SELECT DISTINCT s.id_study_lims, s.name
        FROM study s
        JOIN oseq_flowcell f ON f.id_study_tmp = s.id_study_tmp
        WHERE f.experiment_name = ?
          AND f.instrument_slot = ?
          AND f.flowcell_id = ?
        ORDER BY s.id_study_lims ASC
        ",
    )
    .bind(experiment_name)
    .bind(instrument_slot)
    .bind(flowcell_id)
    .fetch_all(pool)
    .await?;

    debug!(
        experiment_name,
        instrument_slot,
        flowcell_id,
        studies = studies.len(),
        "Retrieved studies for ONT run"
    );
    Ok(studies)
}

/// Filter study_users rows down to distinct, sorted contact addresses
fn collect_contact_emails(rows: &[StudyUserRow]) -> Vec<String> {
    let mut emails = BTreeSet::new();
    for row in rows {
        if let (Some(email), Some(role)) = (&row.email, &row.role) {
            if CONTACT_ROLES.contains(&role.as_str()) {
                emails.insert(email.clone());
            }
        }
    }
    emails.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: Option<&str>, role: Option<&str>) -> StudyUserRow {
        StudyUserRow {
            email: email.map(String::from),
            role: role.map(String::from),
        }
    }

    #[test]
    fn test_contacts_filtered_by_role() {
        let rows = vec![
            row(Some("owner@sanger.ac.uk"), Some("owner")),
            row(Some("user1@sanger.ac.uk"), Some("manager")),
            row(Some("user2@sanger.ac.uk"), Some("follower")),
            row(Some("loader@sanger.ac.uk"), Some("loader")),
            row(Some("anon@sanger.ac.uk"), None),
            row(None, Some("manager")),
        ];

        assert_eq!(
            collect_contact_emails(&rows),
            vec![
                "owner@sanger.ac.uk".to_string(),
                "user1@sanger.ac.uk".to_string(),
                "user2@sanger.ac.uk".to_string(),
            ]
        );
    }

    #[test]
    fn test_contacts_deduplicated_and_sorted() {
        let rows = vec![
            row(Some("user3@sanger.ac.uk"), Some("follower")),
            row(Some("user1@sanger.ac.uk"), Some("manager")),
            row(Some("user1@sanger.ac.uk"), Some("owner")),
            row(Some("user2@sanger.ac.uk"), Some("follower")),
        ];

        assert_eq!(
            collect_contact_emails(&rows),
            vec![
                "user1@sanger.ac.uk".to_string(),
                "user2@sanger.ac.uk".to_string(),
                "user3@sanger.ac.uk".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_rows_means_no_contacts() {
        assert!(collect_contact_emails(&[]).is_empty());
    }
}
