//! DNS zone adapter supporting bind and PowerDNS backends.
//!
//! The backend is chosen by configuration. bind deployments get a rendered
//! zone file plus `rndc reload`; PowerDNS deployments are driven through
//! `pdnsutil` (create-zone / load-zone / delete-zone). An unset backend is
//! a loggable failure rather than a panic: DNS is optional until the
//! operator wires one up.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, DnsAdapter, DnsZoneSpec,
    OperationKind, TargetKind,
};
use crate::exec::run_tool;
use crate::naming::safe_domain_name;
use crate::tools::{ResolveOptions, ToolResolver};

/// DNS adapter configuration.
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Backend name: `bind`, `powerdns`, or unset.
    pub backend: Option<String>,
    /// Zone file directory for the bind backend (default `/etc/named`).
    pub bind_zone_root: PathBuf,
    /// Default TTL written into rendered zones (default `3600`).
    pub ttl: u32,
}

impl DnsConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                 | Default      |
    /// |-------------------------|--------------|
    /// | `NPANEL_DNS_BACKEND`    | (unset)      |
    /// | `NPANEL_BIND_ZONE_ROOT` | `/etc/named` |
    /// | `NPANEL_DNS_TTL`        | `3600`       |
    pub fn from_env() -> Self {
        let backend = std::env::var("NPANEL_DNS_BACKEND")
            .ok()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty() && v != "none");
        let ttl = std::env::var("NPANEL_DNS_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);
        Self {
            backend,
            bind_zone_root: super::shell_web::env_path("NPANEL_BIND_ZONE_ROOT", "/etc/named"),
            ttl,
        }
    }
}

/// Render a zone file for the spec.
///
/// The serial is the current Unix timestamp, so every render is newer than
/// the last.
pub fn render_zone(spec: &DnsZoneSpec, ttl: u32) -> String {
    render_zone_with_serial(spec, ttl, chrono::Utc::now().timestamp())
}

fn render_zone_with_serial(spec: &DnsZoneSpec, ttl: u32, serial: i64) -> String {
    let zone = &spec.zone_name;
    let mut out = format!(
        "$TTL {ttl}\n@ IN SOA ns1.{zone}. hostmaster.{zone}. (\n    {serial} ; serial\n    3600 ; refresh\n    900 ; retry\n    1209600 ; expire\n    300 ; minimum\n)\n@ IN NS ns1.{zone}.\n"
    );
    for record in &spec.records {
        out.push_str(&format!(
            "{} IN {} {}\n",
            record.name, record.record_type, record.data
        ));
    }
    out
}

pub struct ShellDnsAdapter {
    tools: Arc<ToolResolver>,
    config: DnsConfig,
}

impl ShellDnsAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: DnsConfig) -> Self {
        Self { tools, config }
    }

    fn safe_zone(&self, zone_name: &str) -> Result<String, AdapterError> {
        let safe = safe_domain_name(zone_name);
        if safe.is_empty() {
            return Err(AdapterError::UnsafeIdentifier {
                what: "zone name",
                value: zone_name.to_string(),
            });
        }
        Ok(safe)
    }

    async fn resolve_backend_tool(&self, tool: &str, hint: &str) -> Result<String, AdapterError> {
        let resolved = self
            .tools
            .resolve_with(
                tool,
                ResolveOptions {
                    refresh: false,
                    package_hint: Some(hint.to_string()),
                },
            )
            .await?;
        Ok(resolved.path)
    }

    async fn bind_apply(&self, spec: &DnsZoneSpec) -> Result<Applied, AdapterError> {
        let safe = self.safe_zone(&spec.zone_name)?;
        let zone_path = self.config.bind_zone_root.join(format!("{safe}.zone"));
        tokio::fs::write(&zone_path, render_zone(spec, self.config.ttl)).await?;

        let rndc = self.resolve_backend_tool("rndc", "bind").await?;
        let result = run_tool(
            &rndc,
            &["reload".to_string(), spec.zone_name.clone()],
            None,
        )
        .await?;
        if !result.ok() {
            return Err(AdapterError::command_failed("dns_reload_failed", &result));
        }

        let tools = self.tools.clone();
        let undo_path = zone_path.clone();
        let zone = spec.zone_name.clone();
        let undo = rollback(async move {
            let _ = tokio::fs::remove_file(&undo_path).await;
            if let Ok(resolved) = tools.resolve("rndc").await {
                let _ = run_tool(&resolved.path, &["reload".to_string()], None).await;
            } else {
                tracing::warn!(%zone, "dns rollback skipped: rndc not found");
            }
        });

        Ok(Applied::new(
            format!("applied bind zone '{}'", spec.zone_name),
            serde_json::json!({
                "zone": spec.zone_name,
                "backend": "bind",
                "zone_file": zone_path.display().to_string(),
                "records": spec.records.len(),
            }),
        )
        .with_rollback(undo))
    }

    async fn powerdns_apply(&self, spec: &DnsZoneSpec) -> Result<Applied, AdapterError> {
        let safe = self.safe_zone(&spec.zone_name)?;
        let pdnsutil = self.resolve_backend_tool("pdnsutil", "pdns").await?;

        let listed = run_tool(
            &pdnsutil,
            &["list-zone".to_string(), spec.zone_name.clone()],
            None,
        )
        .await?;
        let mut created = false;
        if !listed.ok() {
            let create = run_tool(
                &pdnsutil,
                &[
                    "create-zone".to_string(),
                    spec.zone_name.clone(),
                    format!("ns1.{}", spec.zone_name),
                ],
                None,
            )
            .await?;
            if !create.ok() {
                return Err(AdapterError::command_failed("dns_create_zone_failed", &create));
            }
            created = true;
        }

        // load-zone reads from a file; stage the rendered zone in a
        // uniquely named temp file and clean it up afterwards.
        let staging = std::env::temp_dir().join(format!("npanel-zone-{safe}-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, render_zone(spec, self.config.ttl)).await?;
        let loaded = run_tool(
            &pdnsutil,
            &[
                "load-zone".to_string(),
                spec.zone_name.clone(),
                staging.display().to_string(),
            ],
            None,
        )
        .await;
        let _ = tokio::fs::remove_file(&staging).await;
        let loaded = loaded?;
        if !loaded.ok() {
            return Err(AdapterError::command_failed("dns_load_zone_failed", &loaded));
        }

        let mut applied = Applied::new(
            format!("applied powerdns zone '{}'", spec.zone_name),
            serde_json::json!({
                "zone": spec.zone_name,
                "backend": "powerdns",
                "created": created,
                "records": spec.records.len(),
            }),
        );
        if created {
            let tools = self.tools.clone();
            let zone = spec.zone_name.clone();
            applied = applied.with_rollback(rollback(async move {
                match tools.resolve("pdnsutil").await {
                    Ok(resolved) => {
                        let _ = run_tool(
                            &resolved.path,
                            &["delete-zone".to_string(), zone.clone()],
                            None,
                        )
                        .await;
                    }
                    Err(err) => {
                        tracing::warn!(%zone, error = %err, "dns rollback skipped");
                    }
                }
            }));
        }
        Ok(applied)
    }
}

#[async_trait]
impl DnsAdapter for ShellDnsAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &DnsZoneSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::DnsZone;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.zone_name).await;
        }

        let inner = async {
            match self.config.backend.as_deref() {
                None => Err(AdapterError::BackendNotConfigured("DNS")),
                Some("bind") => self.bind_apply(spec).await,
                Some("powerdns") => self.powerdns_apply(spec).await,
                Some(other) => Err(AdapterError::UnsupportedDnsBackend(other.to_string())),
            }
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        zone_name: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::DnsZone;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, zone_name).await;
        }

        let inner = async {
            match self.config.backend.as_deref() {
                None => Err(AdapterError::BackendNotConfigured("DNS")),
                Some("bind") => {
                    let safe = self.safe_zone(zone_name)?;
                    let zone_path = self.config.bind_zone_root.join(format!("{safe}.zone"));
                    let removed = match tokio::fs::remove_file(&zone_path).await {
                        Ok(()) => true,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                        Err(e) => return Err(e.into()),
                    };
                    if removed {
                        let rndc = self.resolve_backend_tool("rndc", "bind").await?;
                        let result = run_tool(&rndc, &["reload".to_string()], None).await?;
                        if !result.ok() {
                            return Err(AdapterError::command_failed("dns_reload_failed", &result));
                        }
                    }
                    Ok(Applied::new(
                        format!("removed bind zone '{zone_name}'"),
                        serde_json::json!({ "zone": zone_name, "removed": removed }),
                    ))
                }
                Some("powerdns") => {
                    let pdnsutil = self.resolve_backend_tool("pdnsutil", "pdns").await?;
                    let result = run_tool(
                        &pdnsutil,
                        &["delete-zone".to_string(), zone_name.to_string()],
                        None,
                    )
                    .await?;
                    if !result.ok() {
                        return Err(AdapterError::command_failed("dns_delete_zone_failed", &result));
                    }
                    Ok(Applied::new(
                        format!("removed powerdns zone '{zone_name}'"),
                        serde_json::json!({ "zone": zone_name, "removed": true }),
                    ))
                }
                Some(other) => Err(AdapterError::UnsupportedDnsBackend(other.to_string())),
            }
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterLogEntry, AdapterLogSink, DnsRecordSpec};
    use assert_matches::assert_matches;
    use tokio::sync::Mutex;

    fn zone_spec() -> DnsZoneSpec {
        DnsZoneSpec {
            zone_name: "example.com".into(),
            records: vec![
                DnsRecordSpec {
                    name: "@".into(),
                    record_type: "A".into(),
                    data: "203.0.113.5".into(),
                },
                DnsRecordSpec {
                    name: "@".into(),
                    record_type: "MX".into(),
                    data: "10 example.com.".into(),
                },
            ],
        }
    }

    #[test]
    fn rendered_zone_has_soa_ns_and_records() {
        let text = render_zone_with_serial(&zone_spec(), 3600, 1700000000);
        assert!(text.starts_with("$TTL 3600\n"));
        assert!(text.contains("IN SOA ns1.example.com. hostmaster.example.com."));
        assert!(text.contains("1700000000 ; serial"));
        assert!(text.contains("@ IN NS ns1.example.com.\n"));
        assert!(text.contains("@ IN A 203.0.113.5\n"));
        assert!(text.contains("@ IN MX 10 example.com.\n"));
    }

    struct RecordingSink {
        entries: Mutex<Vec<AdapterLogEntry>>,
    }

    #[async_trait]
    impl AdapterLogSink for RecordingSink {
        async fn record(&self, entry: AdapterLogEntry) {
            self.entries.lock().await.push(entry);
        }
    }

    #[tokio::test]
    async fn unconfigured_backend_is_a_logged_failure() {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        let ctx = AdapterContext::new(false, None, sink.clone());
        let adapter = ShellDnsAdapter::new(
            Arc::new(ToolResolver::with_fallback_dirs(vec![])),
            DnsConfig {
                backend: None,
                bind_zone_root: "/tmp".into(),
                ttl: 3600,
            },
        );

        let err = adapter.ensure_present(&ctx, &zone_spec()).await.unwrap_err();
        assert_matches!(err, AdapterError::BackendNotConfigured("DNS"));

        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn unsupported_backend_is_rejected() {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        let ctx = AdapterContext::new(false, None, sink);
        let adapter = ShellDnsAdapter::new(
            Arc::new(ToolResolver::with_fallback_dirs(vec![])),
            DnsConfig {
                backend: Some("route53".into()),
                bind_zone_root: "/tmp".into(),
                ttl: 3600,
            },
        );

        let err = adapter.ensure_absent(&ctx, "example.com").await.unwrap_err();
        assert_matches!(err, AdapterError::UnsupportedDnsBackend(b) if b == "route53");
    }
}
