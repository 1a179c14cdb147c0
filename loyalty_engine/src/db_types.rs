use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use loyalty_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Internal identifier of a user account.
pub type UserId = i64;

//--------------------------------------     OrderNumber      ---------------------------------------------------------
/// The purchase order number a user submits for accrual, or references when withdrawing points.
///
/// Order numbers are globally unique across all users. Format validation (the Luhn check) happens in the
/// [`crate::OrderService`], not here, so that stored numbers can always be read back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been uploaded, but the accrual authority has not been consulted yet.
    New,
    /// The accrual authority reported that it is still calculating the reward.
    Processing,
    /// The accrual authority refused the order. No points are awarded. Terminal.
    Invalid,
    /// The accrual has been calculated and credited to the owner's balance. Terminal.
    Processed,
}

impl OrderStatusType {
    /// Terminal orders never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "NEW"),
            OrderStatusType::Processing => write!(f, "PROCESSING"),
            OrderStatusType::Invalid => write!(f, "INVALID"),
            OrderStatusType::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderStatusType {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    #[serde(skip_serializing)]
    pub id: i64,
    pub number: OrderNumber,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub status: OrderStatusType,
    /// Only present once the order is `PROCESSED` with a positive reward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    #[serde(serialize_with = "rfc3339::serialize")]
    pub uploaded_at: DateTime<Utc>,
}

//--------------------------------------      Withdrawal       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Withdrawal {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    #[serde(rename = "order")]
    pub order_number: OrderNumber,
    pub sum: Points,
    #[serde(serialize_with = "rfc3339::serialize")]
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------     UserAccount       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserAccount {
    pub id: UserId,
    pub login: String,
    /// A PHC-format password hash. The engine never sees plaintext passwords.
    pub password_hash: String,
    /// Spendable points. Never negative.
    pub balance: Points,
    /// Lifetime total of points withdrawn. Never decreases.
    pub withdrawn: Points,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new<S: Into<String>>(login: S, password_hash: S) -> Self {
        Self { login: login.into(), password_hash: password_hash.into() }
    }
}

//--------------------------------------       Balance         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

impl From<&UserAccount> for Balance {
    fn from(account: &UserAccount) -> Self {
        Self { current: account.balance, withdrawn: account.withdrawn }
    }
}

//--------------------------------------    AccrualUpdate      ---------------------------------------------------------
/// The outcome of one reconciliation, ready to be applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualUpdate {
    pub order_id: i64,
    pub user_id: UserId,
    pub points: Points,
    pub status: OrderStatusType,
}

impl AccrualUpdate {
    /// True if applying this update changes the owner's balance.
    pub fn credits_balance(&self) -> bool {
        self.status == OrderStatusType::Processed && self.points.is_positive()
    }
}

mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
