//! # Patient Repository
//!
//! Plain CRUD over patients. The placement engine only ever reads through
//! [`PatientRepository::get_by_id`].

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacy_core::validation::validate_patient;
use pharmacy_core::{Patient, PatientInput};

/// Repository for patient database operations.
#[derive(Debug, Clone)]
pub struct PatientRepository {
    pool: SqlitePool,
}

impl PatientRepository {
    /// Creates a new PatientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PatientRepository { pool }
    }

    /// Gets a patient by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT id, name, address, phone_number FROM patients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    pub async fn list(&self) -> DbResult<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(
            "SELECT id, name, address, phone_number FROM patients ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(patients)
    }

    pub async fn insert(&self, patient: &PatientInput) -> DbResult<Patient> {
        validate_patient(patient)?;
        debug!(name = %patient.name, "Inserting patient");

        let inserted = sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (name, address, phone_number)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, address, phone_number
            "#,
        )
        .bind(patient.name.trim())
        .bind(patient.address.trim())
        .bind(patient.phone_number.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    pub async fn update(&self, id: i64, patient: &PatientInput) -> DbResult<Patient> {
        validate_patient(patient)?;
        debug!(id = id, "Updating patient");

        let updated = sqlx::query_as::<_, Patient>(
            r#"
            UPDATE patients
            SET name = ?2, address = ?3, phone_number = ?4
            WHERE id = ?1
            RETURNING id, name, address, phone_number
            "#,
        )
        .bind(id)
        .bind(patient.name.trim())
        .bind(patient.address.trim())
        .bind(patient.phone_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Patient", id))
    }

    /// Deletes a patient without orders. Patients with order history are
    /// kept by the foreign key.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting patient");

        let result = sqlx::query("DELETE FROM patients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Patient", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{patient, test_db};

    #[tokio::test]
    async fn test_insert_get_update_delete() {
        let db = test_db().await;
        let id = patient(&db).await;

        let fetched = db.patients().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Grace Hopper");

        let updated = db
            .patients()
            .update(
                id,
                &PatientInput {
                    name: "Grace B. Hopper".to_string(),
                    address: "9 Navy Yard".to_string(),
                    phone_number: "555-0199".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone_number, "555-0199");

        db.patients().delete(id).await.unwrap();
        assert!(db.patients().get_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            db.patients().update(id, &PatientInput {
                name: "Ghost".to_string(),
                address: "None".to_string(),
                phone_number: "555-0000".to_string(),
            }).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_phone_rejected() {
        let db = test_db().await;

        let err = db
            .patients()
            .insert(&PatientInput {
                name: "Alan Turing".to_string(),
                address: "Bletchley Park".to_string(),
                phone_number: "n/a".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Invalid(_)));
    }
}
