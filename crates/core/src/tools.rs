//! System tool resolution.
//!
//! Adapters never hardcode binary paths. Every external tool is resolved by
//! name through a [`ToolResolver`], which probes `command -v`, `which`, and
//! a fixed list of fallback directories, records which methods were tried,
//! and caches successful lookups per instance. Failures carry an optional
//! package hint so operators know what to install.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::exec::run_tool;

/// Directories probed directly when PATH-based lookups fail. Covers sbin
/// locations that are commonly absent from non-root PATH.
pub const FALLBACK_DIRS: &[&str] = &[
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
    "/usr/local/sbin",
    "/usr/local/bin",
];

/// Tool names safe to pass to PATH-based lookup commands.
const SAFE_NAME_PATTERN: &str = "^[a-zA-Z0-9._+-]+$";

/// Timeout for the lookup commands themselves.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Package hints for tools the panel commonly needs.
///
/// Used in [`ToolNotFound`] messages when the caller does not supply its
/// own hint.
pub fn default_package_hint(tool: &str) -> Option<&'static str> {
    match tool {
        "rndc" | "named" | "named-checkzone" => Some("bind"),
        "pdnsutil" => Some("pdns"),
        "nginx" => Some("nginx"),
        "php-fpm" => Some("php-fpm"),
        "mysql" | "mysqladmin" => Some("mysql or mariadb client"),
        "quota" | "setquota" => Some("quota"),
        "useradd" | "usermod" | "userdel" => Some("shadow-utils"),
        "rsync" => Some("rsync"),
        "ssh" => Some("openssh clients"),
        _ => None,
    }
}

/// How a tool path was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMethod {
    Direct,
    CommandV,
    Which,
    Fallback,
}

impl ResolveMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolveMethod::Direct => "direct",
            ResolveMethod::CommandV => "command -v",
            ResolveMethod::Which => "which",
            ResolveMethod::Fallback => "fallback",
        }
    }
}

/// A successfully resolved tool.
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub path: String,
    pub method: ResolveMethod,
}

/// Typed failure returned when a tool cannot be located.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "required tool '{tool}' not found (tried: {}){}",
    methods_tried.join(", "),
    package_hint
        .as_deref()
        .map(|h| format!("; install the '{h}' package"))
        .unwrap_or_default()
)]
pub struct ToolNotFound {
    pub tool: String,
    pub methods_tried: Vec<String>,
    pub package_hint: Option<String>,
}

/// Options for a single resolution attempt.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Bypass the cache and re-probe the system.
    pub refresh: bool,
    /// Override the built-in package hint on failure.
    pub package_hint: Option<String>,
}

/// Non-failing readiness probe result for a single tool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub found: bool,
    pub path: Option<String>,
    pub method: Option<ResolveMethod>,
    pub package_hint: Option<String>,
}

/// Resolves tool names to absolute paths, with a per-instance cache.
///
/// Instances are cheap to construct; tests build isolated resolvers with
/// their own fallback directories instead of sharing global state.
pub struct ToolResolver {
    fallback_dirs: Vec<PathBuf>,
    cache: Mutex<HashMap<String, ResolvedTool>>,
}

impl Default for ToolResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolResolver {
    /// Resolver with the standard [`FALLBACK_DIRS`].
    pub fn new() -> Self {
        Self::with_fallback_dirs(FALLBACK_DIRS.iter().map(PathBuf::from).collect())
    }

    /// Resolver probing only the given directories in the fallback step.
    pub fn with_fallback_dirs(fallback_dirs: Vec<PathBuf>) -> Self {
        Self {
            fallback_dirs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `name` to an absolute path with default options.
    pub async fn resolve(&self, name: &str) -> Result<ResolvedTool, ToolNotFound> {
        self.resolve_with(name, ResolveOptions::default()).await
    }

    /// Resolve `name`, honoring cache-refresh and package-hint overrides.
    ///
    /// Names containing `/` are treated as explicit paths and checked
    /// directly. Otherwise `command -v` and `which` are tried (only for
    /// names matching the safe pattern), then each fallback directory is
    /// probed for an executable file.
    pub async fn resolve_with(
        &self,
        name: &str,
        opts: ResolveOptions,
    ) -> Result<ResolvedTool, ToolNotFound> {
        if !opts.refresh {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(name) {
                return Ok(hit.clone());
            }
        }

        let mut methods_tried: Vec<String> = Vec::new();

        if name.contains('/') {
            methods_tried.push(ResolveMethod::Direct.as_str().to_string());
            if is_executable(Path::new(name)).await {
                return Ok(self.remember(name, name.to_string(), ResolveMethod::Direct));
            }
            return Err(self.not_found(name, methods_tried, opts.package_hint));
        }

        if is_safe_tool_name(name) {
            methods_tried.push(ResolveMethod::CommandV.as_str().to_string());
            if let Some(path) = shell_lookup(&format!("command -v {name}")).await {
                if is_executable(Path::new(&path)).await {
                    return Ok(self.remember(name, path, ResolveMethod::CommandV));
                }
            }

            methods_tried.push(ResolveMethod::Which.as_str().to_string());
            if let Some(path) = shell_lookup(&format!("which {name}")).await {
                if is_executable(Path::new(&path)).await {
                    return Ok(self.remember(name, path, ResolveMethod::Which));
                }
            }
        } else {
            methods_tried.push("name_check".to_string());
        }

        methods_tried.push(ResolveMethod::Fallback.as_str().to_string());
        for dir in &self.fallback_dirs {
            let candidate = dir.join(name);
            if is_executable(&candidate).await {
                let path = candidate.to_string_lossy().into_owned();
                return Ok(self.remember(name, path, ResolveMethod::Fallback));
            }
        }

        Err(self.not_found(name, methods_tried, opts.package_hint))
    }

    /// Probe a tool without failing; used by readiness checks.
    pub async fn status(&self, name: &str) -> ToolStatus {
        match self
            .resolve_with(
                name,
                ResolveOptions {
                    refresh: true,
                    package_hint: None,
                },
            )
            .await
        {
            Ok(resolved) => ToolStatus {
                name: name.to_string(),
                found: true,
                path: Some(resolved.path),
                method: Some(resolved.method),
                package_hint: None,
            },
            Err(err) => ToolStatus {
                name: name.to_string(),
                found: false,
                path: None,
                method: None,
                package_hint: err.package_hint,
            },
        }
    }

    fn remember(&self, name: &str, path: String, method: ResolveMethod) -> ResolvedTool {
        let resolved = ResolvedTool { path, method };
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(name.to_string(), resolved.clone());
        resolved
    }

    fn not_found(
        &self,
        name: &str,
        methods_tried: Vec<String>,
        hint_override: Option<String>,
    ) -> ToolNotFound {
        ToolNotFound {
            tool: name.to_string(),
            methods_tried,
            package_hint: hint_override
                .or_else(|| default_package_hint(name).map(str::to_string)),
        }
    }
}

/// Whether `name` is safe to interpolate into a PATH lookup command.
pub fn is_safe_tool_name(name: &str) -> bool {
    static SAFE_NAME: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = SAFE_NAME
        .get_or_init(|| regex::Regex::new(SAFE_NAME_PATTERN).expect("static pattern compiles"));
    re.is_match(name)
}

/// Run a PATH lookup through the shell, returning the first output line.
async fn shell_lookup(script: &str) -> Option<String> {
    let result = run_tool(
        "/bin/sh",
        &["-c".to_string(), script.to_string()],
        Some(LOOKUP_TIMEOUT),
    )
    .await
    .ok()?;
    if !result.ok() {
        return None;
    }
    let line = result.stdout.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Whether `path` is an existing regular file with any execute bit set.
async fn is_executable(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                meta.is_file() && meta.permissions().mode() & 0o111 != 0
            }
            #[cfg(not(unix))]
            {
                meta.is_file()
            }
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn resolves_via_fallback_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_executable(dir.path(), "npanel-fake-mysql");
        let resolver = ToolResolver::with_fallback_dirs(vec![dir.path().to_path_buf()]);

        let resolved = resolver.resolve("npanel-fake-mysql").await.unwrap();
        assert_eq!(resolved.method, ResolveMethod::Fallback);
        assert!(resolved.path.ends_with("npanel-fake-mysql"));
    }

    #[tokio::test]
    async fn records_methods_tried_on_failure() {
        let resolver = ToolResolver::with_fallback_dirs(vec![]);
        let err = resolver.resolve("npanel-no-such-tool").await.unwrap_err();
        assert_eq!(err.tool, "npanel-no-such-tool");
        assert!(err.methods_tried.contains(&"command -v".to_string()));
        assert!(err.methods_tried.contains(&"which".to_string()));
        assert!(err.methods_tried.contains(&"fallback".to_string()));
    }

    #[tokio::test]
    async fn unsafe_names_skip_path_lookups() {
        let resolver = ToolResolver::with_fallback_dirs(vec![]);
        let err = resolver.resolve("bad name;rm").await.unwrap_err();
        assert!(!err.methods_tried.contains(&"command -v".to_string()));
        assert!(err.methods_tried.contains(&"name_check".to_string()));
    }

    #[tokio::test]
    async fn direct_path_is_checked_without_probing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_executable(dir.path(), "tool");
        let resolver = ToolResolver::with_fallback_dirs(vec![]);

        let resolved = resolver.resolve(path.to_str().unwrap()).await.unwrap();
        assert_eq!(resolved.method, ResolveMethod::Direct);

        let err = resolver
            .resolve(dir.path().join("missing").to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.methods_tried, vec!["direct".to_string()]);
    }

    #[tokio::test]
    async fn non_executable_file_is_not_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, "data").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let resolver = ToolResolver::with_fallback_dirs(vec![dir.path().to_path_buf()]);

        assert!(resolver.resolve("plain").await.is_err());
    }

    #[tokio::test]
    async fn cache_survives_deletion_until_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_executable(dir.path(), "ephemeral");
        let resolver = ToolResolver::with_fallback_dirs(vec![dir.path().to_path_buf()]);

        resolver.resolve("ephemeral").await.unwrap();
        std::fs::remove_file(&path).unwrap();

        // Cached entry still answers.
        assert!(resolver.resolve("ephemeral").await.is_ok());

        // Refresh re-probes and fails.
        let result = resolver
            .resolve_with(
                "ephemeral",
                ResolveOptions {
                    refresh: true,
                    package_hint: None,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn built_in_package_hints() {
        assert_eq!(default_package_hint("rndc"), Some("bind"));
        assert_eq!(default_package_hint("useradd"), Some("shadow-utils"));
        assert_eq!(default_package_hint("unknown-tool"), None);
    }

    #[tokio::test]
    async fn failure_carries_hint_override() {
        let resolver = ToolResolver::with_fallback_dirs(vec![]);
        let err = resolver
            .resolve_with(
                "npanel-absent-tool",
                ResolveOptions {
                    refresh: false,
                    package_hint: Some("some-package".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.package_hint.as_deref(), Some("some-package"));
    }

    #[tokio::test]
    async fn status_reports_without_failing() {
        let resolver = ToolResolver::with_fallback_dirs(vec![]);
        let status = resolver.status("npanel-absent-tool").await;
        assert!(!status.found);
        assert!(status.path.is_none());
    }
}
