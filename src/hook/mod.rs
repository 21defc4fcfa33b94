//! Hook script selection and execution.
//!
//! A state value maps to one directory under the hook root: the
//! quote-stripped value plus a `.d` suffix, matched by exact string equality
//! against the directories physically present. Scripts inside run one after
//! another in lexicographic order; a failing script never stops the ones
//! after it. Manager-scope changes always use the fixed `manager.d`
//! directory.

mod error;

use std::{
    collections::BTreeSet,
    io::ErrorKind,
    os::unix::fs::PermissionsExt,
    path::Path,
};

pub use error::HookError;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::runtime::conf::Conf;

/// Directory for hooks reacting to manager-scope state changes.
pub const MANAGER_STATE_DIR: &str = "manager.d";

/// Suffix appended to a state value to form its hook directory name.
const STATE_DIR_SUFFIX: &str = ".d";

/// Environment variable carrying the link name.
const ENV_LINK: &str = "LINK";
/// Environment variable carrying the link's interface index.
const ENV_LINK_INDEX: &str = "LINKINDEX";
/// Environment variable carrying the lease file contents, joined by spaces.
const ENV_DHCP_LEASE: &str = "DHCP_LEASE";

/// Runs the hook scripts matching a link state change.
///
/// Zero matching scripts is a successful no-op. Scripts receive `LINK`,
/// `LINKINDEX`, the triggering `key=value` pair, and, when a lease file for
/// the link exists, `DHCP_LEASE`.
pub async fn run_link_hooks(
    conf: &Conf,
    link: &str,
    index: u32,
    key: &str,
    value: &str,
) -> Result<(), HookError> {
    let state_dir = state_directory(value);
    let configured = hook_directories(&conf.hook_root)?;

    if !configured.contains(&state_dir) {
        debug!(
            event.name = "hook.no_directory",
            link.name = %link,
            state.dir = %state_dir,
            "no hook directory configured for state value"
        );
        return Ok(());
    }

    let dir = conf.hook_root.join(&state_dir);
    let scripts = executable_scripts(&dir)?;
    if scripts.is_empty() {
        return Ok(());
    }

    let mut env: Vec<(String, String)> = vec![
        (ENV_LINK.to_string(), link.to_string()),
        (ENV_LINK_INDEX.to_string(), index.to_string()),
        (key.to_string(), value.to_string()),
    ];
    if let Some(lease) = read_lease(&conf.lease_dir, index).await {
        env.push((ENV_DHCP_LEASE.to_string(), lease));
    }

    run_scripts(&dir, &scripts, &env).await;
    Ok(())
}

/// Runs every hook script in the fixed manager-state directory.
///
/// Same listing and execution contract as link hooks, but without link
/// identity or lease facts in the environment.
pub async fn run_manager_hooks(conf: &Conf, key: &str, value: &str) -> Result<(), HookError> {
    let dir = conf.hook_root.join(MANAGER_STATE_DIR);
    let scripts = executable_scripts(&dir)?;
    if scripts.is_empty() {
        return Ok(());
    }

    let env = vec![(key.to_string(), value.to_string())];
    run_scripts(&dir, &scripts, &env).await;
    Ok(())
}

/// Computes the hook directory name for a state value.
pub fn state_directory(value: &str) -> String {
    let mut dir = value.trim_matches('"').to_string();
    dir.push_str(STATE_DIR_SUFFIX);
    dir
}

/// Lists the hook directories physically present under the hook root.
///
/// A missing root is an empty set, not an error.
fn hook_directories(root: &Path) -> Result<BTreeSet<String>, HookError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(HookError::read_dir(root, e)),
    };

    let mut dirs = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| HookError::read_dir(root, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(dirs)
}

/// Lists the executable entries of a hook directory in lexicographic order.
///
/// Order matters: later scripts may depend on side effects of earlier ones.
fn executable_scripts(dir: &Path) -> Result<Vec<String>, HookError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HookError::read_dir(dir, e)),
    };

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HookError::read_dir(dir, e))?;
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
            continue;
        }
        scripts.push(entry.file_name().to_string_lossy().into_owned());
    }
    scripts.sort();
    Ok(scripts)
}

/// Reads the lease file for an interface index, joining its lines with
/// spaces. Absence or unreadability just omits the lease fact.
async fn read_lease(lease_dir: &Path, index: u32) -> Option<String> {
    let path = lease_dir.join(index.to_string());
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let joined = contents
                .lines()
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if joined.is_empty() { None } else { Some(joined) }
        }
        Err(e) => {
            debug!(
                event.name = "hook.lease_unreadable",
                lease.path = %path.display(),
                error = %e,
                "proceeding without lease data"
            );
            None
        }
    }
}

/// Executes scripts sequentially, merging `env` over the broker's own
/// environment. Launch failures and non-zero exits are logged and the
/// remaining scripts still run.
async fn run_scripts(dir: &Path, scripts: &[String], env: &[(String, String)]) {
    for name in scripts {
        let script = dir.join(name);
        debug!(
            event.name = "hook.script_started",
            script.path = %script.display(),
            "executing hook script"
        );

        let mut command = Command::new(&script);
        for (key, value) in env {
            command.env(key, value);
        }

        match command.status().await {
            Ok(status) if status.success() => {
                debug!(
                    event.name = "hook.script_finished",
                    script.path = %script.display(),
                    "hook script finished"
                );
            }
            Ok(status) => {
                warn!(
                    event.name = "hook.script_failed",
                    script.path = %script.display(),
                    exit.status = %status,
                    "hook script exited with failure"
                );
            }
            Err(e) => {
                warn!(
                    event.name = "hook.script_launch_failed",
                    script.path = %script.display(),
                    error = %e,
                    "failed to launch hook script"
                );
            }
        }
    }
}
