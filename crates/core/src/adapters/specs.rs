//! Desired-state specifications consumed by the capability adapters.
//!
//! Specs describe what should exist, not how to get there; adapters
//! converge the system toward the spec and are safe to re-apply.

use serde::{Deserialize, Serialize};

/// Desired state of a system (Unix) user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    pub username: String,
    pub home_directory: String,
    pub primary_group: Option<String>,
    pub shell: Option<String>,
    pub quota_mb: Option<i64>,
}

/// Desired state of a web server virtual host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebVhostSpec {
    pub domain: String,
    pub document_root: String,
    /// PHP-FPM pool name whose socket handles PHP requests, if any.
    pub php_fpm_pool: Option<String>,
    pub ssl_certificate_id: Option<String>,
}

/// Desired state of a PHP-FPM pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhpFpmPoolSpec {
    pub name: String,
    pub user: String,
    pub group: String,
    /// Listen address, normally a Unix socket path.
    pub listen: String,
    pub php_version: String,
}

/// Desired state of a MySQL account and its databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlAccountSpec {
    pub username: String,
    pub password: String,
    /// Databases the account owns; each is created and granted.
    pub databases: Vec<String>,
}

/// A single record inside a DNS zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    /// Record owner name relative to the zone (`@` for the apex).
    pub name: String,
    pub record_type: String,
    pub data: String,
}

/// Desired state of a DNS zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsZoneSpec {
    pub zone_name: String,
    pub records: Vec<DnsRecordSpec>,
}

/// Desired state of a mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxSpec {
    pub address: String,
    pub password: String,
    pub quota_mb: Option<i64>,
}

/// Desired state of an FTP account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpAccountSpec {
    pub username: String,
    pub password: String,
    pub home_directory: String,
}
