//! Restricted environment construction for subprocess execution.
//!
//! Every external command the panel spawns runs with a minimal environment:
//! a small allowlist of locale/identity variables, any `NPANEL_`-prefixed
//! variables from the parent process, and a fixed `PATH`. Nothing else from
//! the parent environment leaks through.

/// `PATH` used for every spawned command, regardless of the parent `PATH`.
pub const FIXED_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Environment variables copied verbatim from the parent process.
const ALLOWED_VARS: &[&str] = &["LANG", "TZ", "HOME", "SHELL", "LOGNAME", "USER"];

/// Prefix for panel-specific variables that are passed through.
const APP_PREFIX: &str = "NPANEL_";

/// Build the restricted environment for a child process.
///
/// Includes allowlisted variables, `LC_*` locale variables, `NPANEL_*`
/// variables, and a fixed `PATH` (always present, overriding any inherited
/// value).
pub fn restricted_env() -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| {
            ALLOWED_VARS.contains(&key.as_str())
                || key.starts_with("LC_")
                || key.starts_with(APP_PREFIX)
        })
        .filter(|(key, _)| key != "PATH")
        .collect();
    env.push(("PATH".to_string(), FIXED_PATH.to_string()));
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn path_is_always_fixed() {
        let env = restricted_env();
        assert_eq!(lookup(&env, "PATH"), Some(FIXED_PATH));
    }

    #[test]
    fn app_prefixed_vars_pass_through() {
        std::env::set_var("NPANEL_ENV_TEST_MARKER", "v1");
        let env = restricted_env();
        assert_eq!(lookup(&env, "NPANEL_ENV_TEST_MARKER"), Some("v1"));
        std::env::remove_var("NPANEL_ENV_TEST_MARKER");
    }

    #[test]
    fn unlisted_vars_are_dropped() {
        std::env::set_var("SOME_RANDOM_SECRET_XYZ", "leak");
        let env = restricted_env();
        assert_eq!(lookup(&env, "SOME_RANDOM_SECRET_XYZ"), None);
        std::env::remove_var("SOME_RANDOM_SECRET_XYZ");
    }

    #[test]
    fn locale_vars_pass_through() {
        std::env::set_var("LC_COLLATE_TEST", "C");
        // Only the LC_ prefix matters, not membership in the allowlist.
        let env = restricted_env();
        assert_eq!(lookup(&env, "LC_COLLATE_TEST"), Some("C"));
        std::env::remove_var("LC_COLLATE_TEST");
    }
}
