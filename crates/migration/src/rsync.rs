//! rsync invocation for home directory transfer.

use crate::source::SourceHost;

/// Build the rsync argument vector for pulling a home directory over SSH.
///
/// Host key checking is always strict; migrations must never accept an
/// unknown host key silently.
pub fn build_rsync_args(
    source: &SourceHost,
    source_path: &str,
    target_path: &str,
    dry_run: bool,
) -> Vec<String> {
    let mut ssh_command = String::from("ssh -o StrictHostKeyChecking=yes");
    if let Some(known_hosts) = &source.known_hosts_file {
        ssh_command.push_str(&format!(" -o UserKnownHostsFile={known_hosts}"));
    }
    ssh_command.push_str(&format!(" -p {}", source.ssh_port));
    if let Some(key) = &source.ssh_key_path {
        ssh_command.push_str(&format!(" -i {key}"));
    }

    let mut args = vec!["-az".to_string(), "--delete".to_string()];
    if dry_run {
        args.push("--dry-run".to_string());
    }
    args.push("-e".to_string());
    args.push(ssh_command);
    args.push(format!(
        "{}@{}:{}/",
        source.ssh_user, source.host, source_path
    ));
    args.push(format!("{target_path}/"));
    args
}

/// Whether rsync stderr indicates the SSH host key check failed. This case
/// gets a dedicated diagnostic log so operators can fix the known hosts
/// file instead of staring at a generic exit code.
pub fn is_host_key_failure(stderr: &str) -> bool {
    stderr.contains("Host key verification failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceHost {
        SourceHost {
            host: "old.example.com".to_string(),
            ssh_user: "root".to_string(),
            ssh_port: 2222,
            ssh_key_path: Some("/etc/npanel/migration_key".to_string()),
            known_hosts_file: Some("/etc/npanel/known_hosts".to_string()),
            cpanel_home_root: None,
        }
    }

    #[test]
    fn builds_full_argument_vector() {
        let args = build_rsync_args(&source(), "/home/alice", "/srv/npanel/migrations/j1/alice", false);
        assert_eq!(
            args,
            vec![
                "-az",
                "--delete",
                "-e",
                "ssh -o StrictHostKeyChecking=yes -o UserKnownHostsFile=/etc/npanel/known_hosts -p 2222 -i /etc/npanel/migration_key",
                "root@old.example.com:/home/alice/",
                "/srv/npanel/migrations/j1/alice/",
            ]
        );
    }

    #[test]
    fn dry_run_inserts_flag_before_ssh_command() {
        let args = build_rsync_args(&source(), "/home/alice", "/tmp/t", true);
        assert_eq!(args[2], "--dry-run");
        assert_eq!(args[3], "-e");
    }

    #[test]
    fn minimal_source_omits_optional_ssh_flags() {
        let source = SourceHost {
            host: "old.example.com".to_string(),
            ssh_user: "root".to_string(),
            ssh_port: 22,
            ssh_key_path: None,
            known_hosts_file: None,
            cpanel_home_root: None,
        };
        let args = build_rsync_args(&source, "/home/bob", "/tmp/t", false);
        assert_eq!(args[3], "ssh -o StrictHostKeyChecking=yes -p 22");
    }

    #[test]
    fn detects_host_key_failures() {
        assert!(is_host_key_failure(
            "Host key verification failed.\r\nrsync: connection unexpectedly closed"
        ));
        assert!(!is_host_key_failure("rsync: link_stat failed"));
    }
}
