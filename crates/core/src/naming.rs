//! Deterministic naming for provisioned resources.
//!
//! All per-service resource names derive from the system username, which in
//! turn derives from the primary domain. The same domain always produces
//! the same names, so re-running provisioning converges on the same
//! resources.

/// Prefix for derived system usernames.
pub const USERNAME_PREFIX: &str = "u_";

/// Maximum length of the domain-derived portion of a username.
const USERNAME_STEM_MAX: usize = 8;

/// Stem used when a domain label yields no usable characters.
const USERNAME_FALLBACK_STEM: &str = "site";

/// Derive a system username from a primary domain.
///
/// Takes the first DNS label, lowercases it, strips everything outside
/// `[a-z0-9]`, truncates to 8 characters, and prefixes `u_`. Empty results
/// fall back to `u_site`.
///
/// ```
/// use npanel_core::naming::derive_system_username;
/// assert_eq!(derive_system_username("Shop.Example.com"), "u_shop");
/// assert_eq!(derive_system_username("--.example.com"), "u_site");
/// ```
pub fn derive_system_username(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or("");
    let stem: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(USERNAME_STEM_MAX)
        .collect();
    if stem.is_empty() {
        format!("{USERNAME_PREFIX}{USERNAME_FALLBACK_STEM}")
    } else {
        format!("{USERNAME_PREFIX}{stem}")
    }
}

/// MySQL account name for a service's system user.
pub fn mysql_username(system_username: &str) -> String {
    format!("{system_username}_db")
}

/// Home directory for a system user.
pub fn home_directory(system_username: &str) -> String {
    format!("/home/{system_username}")
}

/// Document root served by the web vhost.
pub fn document_root(system_username: &str) -> String {
    format!("{}/public_html", home_directory(system_username))
}

/// PHP-FPM pool name for a system user (the username itself).
pub fn php_pool_name(system_username: &str) -> String {
    system_username.to_string()
}

/// Unix socket the PHP-FPM pool listens on.
pub fn php_pool_socket(system_username: &str) -> String {
    format!("/run/php-fpm-{system_username}.sock")
}

/// Sanitize a domain for use as a filename: lowercase, keep `[a-z0-9.-]`.
pub fn safe_domain_name(domain: &str) -> String {
    domain
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Sanitize a PHP-FPM pool name for use as a filename: keep `[a-z0-9_-]`.
pub fn safe_pool_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// Whether `value` is safe to interpolate as a SQL identifier
/// (`[A-Za-z0-9_]+` only).
pub fn is_safe_sql_identifier(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_uses_first_label_lowercased() {
        assert_eq!(derive_system_username("Shop.Example.com"), "u_shop");
        assert_eq!(derive_system_username("blog.example.org"), "u_blog");
    }

    #[test]
    fn username_strips_disallowed_chars() {
        assert_eq!(derive_system_username("my-shop.example.com"), "u_myshop");
    }

    #[test]
    fn username_truncates_to_eight_chars() {
        assert_eq!(
            derive_system_username("averylongsubdomain.example.com"),
            "u_averylon"
        );
    }

    #[test]
    fn username_falls_back_for_empty_stem() {
        assert_eq!(derive_system_username("--.example.com"), "u_site");
        assert_eq!(derive_system_username(""), "u_site");
    }

    #[test]
    fn derived_resource_names() {
        assert_eq!(mysql_username("u_shop"), "u_shop_db");
        assert_eq!(home_directory("u_shop"), "/home/u_shop");
        assert_eq!(document_root("u_shop"), "/home/u_shop/public_html");
        assert_eq!(php_pool_socket("u_shop"), "/run/php-fpm-u_shop.sock");
    }

    #[test]
    fn safe_domain_strips_metacharacters() {
        assert_eq!(safe_domain_name("Evil;rm -rf.example.com"), "evilrm-rf.example.com");
    }

    #[test]
    fn sql_identifier_gate() {
        assert!(is_safe_sql_identifier("u_shop_db"));
        assert!(!is_safe_sql_identifier("u_shop; DROP"));
        assert!(!is_safe_sql_identifier(""));
    }
}
