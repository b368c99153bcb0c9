//! Transactions and debts

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, conn, new_id, parse_datetime, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// Direction of a money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(Error::Validation(format!("unknown transaction type: {other}"))),
        }
    }
}

/// Spending category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Food,
    Transport,
    Entertainment,
    Shopping,
    Services,
    Health,
    Education,
    DebtPayment,
    Savings,
    #[default]
    Other,
}

impl TransactionCategory {
    pub const ALL: [Self; 10] = [
        Self::Food,
        Self::Transport,
        Self::Entertainment,
        Self::Shopping,
        Self::Services,
        Self::Health,
        Self::Education,
        Self::DebtPayment,
        Self::Savings,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Services => "services",
            Self::Health => "health",
            Self::Education => "education",
            Self::DebtPayment => "debt_payment",
            Self::Savings => "savings",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Food => "🍔 Comida",
            Self::Transport => "🚗 Transporte",
            Self::Entertainment => "🎮 Entretenimiento",
            Self::Shopping => "🛒 Compras",
            Self::Services => "📦 Servicios",
            Self::Health => "💊 Salud",
            Self::Education => "📚 Educación",
            Self::DebtPayment => "💳 Pago de deuda",
            Self::Savings => "🏦 Ahorro",
            Self::Other => "📌 Otros",
        }
    }
}

impl FromStr for TransactionCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown category: {s}")))
    }
}

/// A money movement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub tx_type: TransactionType,
    pub category: TransactionCategory,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Debt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Active,
    Paid,
    Defaulted,
}

impl DebtStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paid => "paid",
            Self::Defaulted => "defaulted",
        }
    }
}

impl FromStr for DebtStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "paid" => Ok(Self::Paid),
            "defaulted" => Ok(Self::Defaulted),
            other => Err(Error::Validation(format!("unknown debt status: {other}"))),
        }
    }
}

/// A debt or credit line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debt {
    pub id: String,
    pub name: String,
    pub creditor: String,
    pub status: DebtStatus,
    pub original_amount: f64,
    pub current_amount: f64,
    pub minimum_payment: f64,
    pub interest_rate: Option<f64>,
    pub payment_day: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// Percentage of the original amount already paid
    #[must_use]
    pub fn paid_percent(&self) -> f64 {
        if self.original_amount <= 0.0 {
            return 0.0;
        }
        ((self.original_amount - self.current_amount) / self.original_amount * 100.0)
            .clamp(0.0, 100.0)
    }
}

/// Totals across active debts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct DebtSummary {
    pub count: usize,
    pub total: f64,
    pub minimum_payments: f64,
}

const DEBT_COLUMNS: &str = "id, name, creditor, status, original_amount, current_amount, \
                            minimum_payment, interest_rate, payment_day, created_at, updated_at";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let tx_type: String = row.get(3)?;
    let category: String = row.get(4)?;
    Ok(Transaction {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&row.get::<_, String>(1)?, "%Y-%m-%d").unwrap_or_default(),
        amount: row.get(2)?,
        tx_type: tx_type.parse().unwrap_or(TransactionType::Expense),
        category: category.parse().unwrap_or_default(),
        description: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_debt(row: &Row<'_>) -> rusqlite::Result<Debt> {
    let status: String = row.get(3)?;
    Ok(Debt {
        id: row.get(0)?,
        name: row.get(1)?,
        creditor: row.get(2)?,
        status: status.parse().unwrap_or(DebtStatus::Active),
        original_amount: row.get(4)?,
        current_amount: row.get(5)?,
        minimum_payment: row.get(6)?,
        interest_rate: row.get(7)?,
        payment_day: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

/// Finance repository
#[derive(Clone)]
pub struct FinanceRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl FinanceRepo {
    /// Create a new finance repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Record a transaction
    ///
    /// # Errors
    ///
    /// Returns error if the amount is not positive or the insert fails
    pub fn log_transaction(
        &self,
        date: NaiveDate,
        amount: f64,
        tx_type: TransactionType,
        category: TransactionCategory,
        description: Option<&str>,
    ) -> Result<Transaction> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Validation(format!("invalid amount: {amount}")));
        }

        let tx = Transaction {
            id: new_id(),
            date,
            amount,
            tx_type,
            category,
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO transactions (id, date, amount, tx_type, category, description, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tx.id,
                date.to_string(),
                amount,
                tx_type.as_str(),
                category.as_str(),
                tx.description,
                timestamp(&tx.created_at),
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Finance);
        Ok(tx)
    }

    /// Transactions on or after `since`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn transactions_since(&self, since: NaiveDate) -> Result<Vec<Transaction>> {
        self.cache
            .get_or_load(CacheScope::Finance, &format!("tx|{since}"), || {
                let conn = conn(&self.pool)?;
                let mut stmt = conn.prepare(
                    "SELECT id, date, amount, tx_type, category, description, created_at \
                     FROM transactions WHERE date >= ?1 ORDER BY date, created_at",
                )?;
                let txs = stmt
                    .query_map([since.to_string()], row_to_transaction)?
                    .collect::<rusqlite::Result<_>>()?;
                Ok(txs)
            })
    }

    /// Total expenses on or after `since`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn spending_since(&self, since: NaiveDate) -> Result<f64> {
        Ok(self
            .transactions_since(since)?
            .iter()
            .filter(|t| t.tx_type == TransactionType::Expense)
            .map(|t| t.amount)
            .sum())
    }

    /// Expenses since `since` grouped by category, largest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn spending_by_category(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<(TransactionCategory, f64)>> {
        let mut totals: Vec<(TransactionCategory, f64)> = Vec::new();
        for tx in self
            .transactions_since(since)?
            .into_iter()
            .filter(|t| t.tx_type == TransactionType::Expense)
        {
            match totals.iter_mut().find(|(c, _)| *c == tx.category) {
                Some((_, sum)) => *sum += tx.amount,
                None => totals.push((tx.category, tx.amount)),
            }
        }
        totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(totals)
    }

    /// Register a debt
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn add_debt(
        &self,
        name: &str,
        creditor: &str,
        amount: f64,
        minimum_payment: f64,
        payment_day: Option<u32>,
    ) -> Result<Debt> {
        let conn = conn(&self.pool)?;
        let id = new_id();
        let now = timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO debts (id, name, creditor, status, original_amount, current_amount, \
             minimum_payment, payment_day, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'active', ?4, ?4, ?5, ?6, ?7, ?7)",
            params![id, name, creditor, amount, minimum_payment, payment_day, now],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Finance);
        self.get_debt(&id)?
            .ok_or_else(|| Error::NotFound(format!("debt {id}")))
    }

    /// Fetch a debt
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn get_debt(&self, id: &str) -> Result<Option<Debt>> {
        let conn = conn(&self.pool)?;
        let debt = conn
            .query_row(
                &format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = ?1"),
                [id],
                row_to_debt,
            )
            .optional()?;
        Ok(debt)
    }

    /// Active debts, largest balance first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn active_debts(&self) -> Result<Vec<Debt>> {
        self.cache.get_or_load(CacheScope::Finance, "active_debts", || {
            let conn = conn(&self.pool)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEBT_COLUMNS} FROM debts WHERE status = 'active' \
                 ORDER BY current_amount DESC"
            ))?;
            let debts = stmt
                .query_map([], row_to_debt)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(debts)
        })
    }

    /// Totals across active debts
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn debt_summary(&self) -> Result<DebtSummary> {
        let debts = self.active_debts()?;
        Ok(DebtSummary {
            count: debts.len(),
            total: debts.iter().map(|d| d.current_amount).sum(),
            minimum_payments: debts.iter().map(|d| d.minimum_payment).sum(),
        })
    }

    /// Apply a payment; a debt that reaches zero becomes `paid`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the debt does not exist
    pub fn record_payment(&self, id: &str, amount: f64, date: NaiveDate) -> Result<Debt> {
        let debt = self
            .get_debt(id)?
            .ok_or_else(|| Error::NotFound(format!("debt {id}")))?;
        let remaining = (debt.current_amount - amount).max(0.0);
        let status = if remaining <= 0.0 {
            DebtStatus::Paid
        } else {
            debt.status
        };

        {
            let conn = conn(&self.pool)?;
            conn.execute(
                "UPDATE debts SET current_amount = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![remaining, status.as_str(), timestamp(&Utc::now()), id],
            )?;
        }
        self.log_transaction(
            date,
            amount,
            TransactionType::Expense,
            TransactionCategory::DebtPayment,
            Some(&debt.name),
        )?;
        self.get_debt(id)?
            .ok_or_else(|| Error::NotFound(format!("debt {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn repo() -> FinanceRepo {
        FinanceRepo::new(init_memory().unwrap(), QueryCache::default())
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
    }

    #[test]
    fn spending_sums_expenses_only() {
        let repo = repo();
        repo.log_transaction(d(1), 250.0, TransactionType::Expense, TransactionCategory::Food, None)
            .unwrap();
        repo.log_transaction(
            d(2),
            100.0,
            TransactionType::Expense,
            TransactionCategory::Transport,
            None,
        )
            .unwrap();
        repo.log_transaction(
            d(2),
            5000.0,
            TransactionType::Income,
            TransactionCategory::Other,
            None,
        )
            .unwrap();

        assert!((repo.spending_since(d(1)).unwrap() - 350.0).abs() < f64::EPSILON);
        assert!((repo.spending_since(d(2)).unwrap() - 100.0).abs() < f64::EPSILON);

        let by_cat = repo.spending_by_category(d(1)).unwrap();
        assert_eq!(by_cat[0].0, TransactionCategory::Food);
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let repo = repo();
        let err = repo
            .log_transaction(d(1), 0.0, TransactionType::Expense, TransactionCategory::Food, None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn payment_reduces_and_settles_debt() {
        let repo = repo();
        let debt = repo.add_debt("Tarjeta", "credit_card", 1000.0, 100.0, Some(15)).unwrap();
        assert_eq!(repo.debt_summary().unwrap().count, 1);

        let debt = repo.record_payment(&debt.id, 400.0, d(15)).unwrap();
        assert!((debt.current_amount - 600.0).abs() < f64::EPSILON);
        assert!((debt.paid_percent() - 40.0).abs() < 1e-9);

        let debt = repo.record_payment(&debt.id, 700.0, d(30)).unwrap();
        assert_eq!(debt.status, DebtStatus::Paid);
        assert_eq!(repo.debt_summary().unwrap().count, 0);
        assert!((repo.spending_since(d(1)).unwrap() - 1100.0).abs() < f64::EPSILON);
    }
}
