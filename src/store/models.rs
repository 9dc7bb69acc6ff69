//! Row types returned by the store queries

use serde::Serialize;
use sqlx::FromRow;

/// Summary of one invoice for a customer
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceSummary {
    /// Invoice id
    pub id: i64,
    /// ISO-8601 purchase date
    pub invoice_date: String,
    /// Billing city on the invoice
    pub billing_city: String,
    /// Invoice total
    pub total: f64,
}

/// One line item of an invoice, joined to catalog names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceLineItem {
    /// Track name
    pub track: String,
    /// Album title
    pub album: String,
    /// Artist name
    pub artist: String,
    /// Price per unit at purchase time
    pub unit_price: f64,
    /// Quantity purchased
    pub quantity: i64,
}

/// A catalog search hit
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrackHit {
    /// Track name
    pub track: String,
    /// Album title
    pub album: String,
    /// Artist name
    pub artist: String,
    /// Genre label
    pub genre: String,
    /// Current unit price
    pub unit_price: f64,
}

/// An album with its artist
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlbumHit {
    /// Album title
    pub album: String,
    /// Artist name
    pub artist: String,
}
