//! Idempotent provisioning of databases, schemas and tables.
//!
//! Each operation opens a session, consults the catalog, issues at most one
//! DDL statement, re-checks the catalog and closes the session on every exit
//! path.

use common::errors::{AppError, AppResult};
use common::models::{ColumnDef, Outcome, ResourceKind, ResourceRef};

use crate::catalog::CatalogSession;
use crate::connector::Connector;

/// Ensures catalog objects exist or are absent.
pub struct Provisioner<C> {
    connector: C,
}

impl<C: Connector> Provisioner<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Creates `target` unless it already exists. Tables get zero columns.
    pub async fn ensure_exists(&self, target: &ResourceRef) -> AppResult<Outcome> {
        self.ensure_exists_with(target, &[]).await
    }

    /// Creates `target` with the given columns unless it already exists.
    ///
    /// An existing table is left untouched even if its columns differ.
    ///
    /// # Errors
    /// `Validation` when columns are given for a database or schema,
    /// `Consistency` when the created object is not visible afterwards.
    pub async fn ensure_exists_with(
        &self,
        target: &ResourceRef,
        columns: &[ColumnDef],
    ) -> AppResult<Outcome> {
        target.validate_identifiers()?;
        if !columns.is_empty() && target.kind() != ResourceKind::Table {
            return Err(AppError::Validation(format!(
                "columns can only be given for tables, not {}",
                target.kind()
            )));
        }

        let mut session = self.connector.connect().await?;
        let result = create_if_missing(&mut session, target, columns).await;
        release(session, target).await;
        result
    }

    /// Drops `target` if it exists.
    pub async fn ensure_absent(&self, target: &ResourceRef) -> AppResult<Outcome> {
        target.validate_identifiers()?;

        let mut session = self.connector.connect().await?;
        let result = drop_if_present(&mut session, target).await;
        release(session, target).await;
        result
    }

    /// Whether `target` exists right now. Never mutates.
    pub async fn exists(&self, target: &ResourceRef) -> AppResult<bool> {
        target.validate_identifiers()?;

        let mut session = self.connector.connect().await?;
        let result = session.lookup(target).await.map(|found| found.is_some());
        release(session, target).await;
        result
    }
}

async fn create_if_missing<S: CatalogSession>(
    session: &mut S,
    target: &ResourceRef,
    columns: &[ColumnDef],
) -> AppResult<Outcome> {
    if session.lookup(target).await?.is_some() {
        tracing::info!(resource = %target, "already exists");
        return Ok(Outcome::AlreadyExists);
    }

    tracing::info!(resource = %target, columns = columns.len(), "does not exist, creating it");
    session.create(target, columns).await?;

    if session.lookup(target).await?.is_none() {
        tracing::error!(resource = %target, "create succeeded but the catalog does not show it");
        return Err(AppError::Consistency(format!(
            "{} was created but is not visible in the catalog",
            target
        )));
    }

    tracing::info!(resource = %target, "created");
    Ok(Outcome::Created)
}

async fn drop_if_present<S: CatalogSession>(
    session: &mut S,
    target: &ResourceRef,
) -> AppResult<Outcome> {
    let Some(resolved) = session.lookup(target).await? else {
        tracing::info!(resource = %target, "cannot be dropped, it does not exist");
        return Ok(Outcome::AlreadyAbsent);
    };

    session.drop_resource(target, &resolved).await?;

    if session.lookup(target).await?.is_some() {
        tracing::error!(resource = %target, "drop succeeded but the catalog still shows it");
        return Err(AppError::Consistency(format!(
            "{} was dropped but is still visible in the catalog",
            target
        )));
    }

    tracing::info!(resource = %target, "dropped");
    Ok(Outcome::Dropped)
}

async fn release<S: CatalogSession>(session: S, target: &ResourceRef) {
    if let Err(e) = session.close().await {
        tracing::warn!(resource = %target, error = %e, "failed to close connection cleanly");
    }
}
