//! JSON persistence for the paper account.
//!
//! Stores everything needed to resume a session:
//! - The portfolio, field for field (cash, positions, orders, transactions)
//! - The last known price of every symbol

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::Portfolio;
use crate::trading::PriceBook;

/// On-disk account state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub portfolio: Portfolio,

    #[serde(default)]
    pub prices: PriceBook,

    pub saved_at: DateTime<Utc>,
}

impl StoredAccount {
    pub fn new(portfolio: Portfolio, prices: PriceBook) -> Self {
        Self {
            portfolio,
            prices,
            saved_at: Utc::now(),
        }
    }
}

/// JSON file holding one account.
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored account, or `None` if nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<StoredAccount>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to check {}", self.path.display()))?
        {
            debug!(path = %self.path.display(), "No saved account");
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let account: StoredAccount = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            orders = account.portfolio.orders().len(),
            positions = account.portfolio.positions().len(),
            "Account loaded"
        );
        Ok(Some(account))
    }

    /// Write the account, replacing the previous file in one rename.
    pub async fn save(&self, account: &StoredAccount) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(account).context("Failed to serialize account")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        info!(path = %self.path.display(), "Account saved");
        Ok(())
    }
}
