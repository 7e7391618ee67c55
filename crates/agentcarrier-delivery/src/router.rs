//! Process-wide command routing.
//!
//! Command frames are handed to the current [`CommandProcessor`]. The processor
//! can be swapped at any time, including while reception workers are routing;
//! a concurrent [`route`] runs either the old or the new processor in full.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, RwLock};

use tracing::{info, warn};

use crate::error::{DeliveryError, Result};

/// `(peer, command) -> accepted`.
pub type CommandProcessor = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

static ROUTER: LazyLock<RwLock<CommandProcessor>> =
    LazyLock::new(|| RwLock::new(default_processor()));

/// The processor installed at startup, backed by [`run_command`].
pub fn default_processor() -> CommandProcessor {
    Arc::new(run_command)
}

/// The processor currently installed.
pub fn obtain_current() -> Result<CommandProcessor> {
    let guard = ROUTER.read().map_err(|err| DeliveryError::Router(err.to_string()))?;
    Ok(Arc::clone(&guard))
}

/// Install `processor`, returning the one it replaces.
pub fn replace(processor: CommandProcessor) -> Result<CommandProcessor> {
    let mut guard = ROUTER
        .write()
        .map_err(|err| DeliveryError::Router(err.to_string()))?;
    Ok(std::mem::replace(&mut *guard, processor))
}

/// Run `command` from `peer` through the current processor.
///
/// The lock is released before the processor runs, so a processor may itself
/// call [`replace`] without deadlocking.
pub fn route(peer: &str, command: &str) -> Result<bool> {
    let processor = obtain_current()?;
    Ok(processor(peer, command))
}

/// Install `processor` until the returned guard is dropped.
pub fn scoped(processor: CommandProcessor) -> Result<ScopedProcessor> {
    let previous = replace(processor)?;
    Ok(ScopedProcessor {
        previous: Some(previous),
    })
}

/// Restores the previously installed processor on drop.
#[must_use = "the previous processor is restored when the guard is dropped"]
pub struct ScopedProcessor {
    previous: Option<CommandProcessor>,
}

impl Drop for ScopedProcessor {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(err) = replace(previous) {
                warn!(error = %err, "failed to restore command processor");
            }
        }
    }
}

impl fmt::Debug for ScopedProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedProcessor").finish_non_exhaustive()
    }
}

/// Commands the agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCommand {
    /// Re-read configuration.
    Reload,
    /// Liveness probe; always accepted.
    PassTrue,
    /// Warn that the agent is about to be uninstalled.
    UninstallAlert,
}

impl AgentCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentCommand::Reload => "reload",
            AgentCommand::PassTrue => "passtrue",
            AgentCommand::UninstallAlert => "uninstallalert",
        }
    }
}

impl FromStr for AgentCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reload" => Ok(AgentCommand::Reload),
            "passtrue" => Ok(AgentCommand::PassTrue),
            "uninstallalert" => Ok(AgentCommand::UninstallAlert),
            other => Err(format!("unknown agent command '{other}'")),
        }
    }
}

impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default command policy: accept known commands, reject the rest.
pub fn run_command(peer: &str, command: &str) -> bool {
    match command.parse::<AgentCommand>() {
        Ok(parsed) => {
            info!(peer, command = %parsed, "agent command accepted");
            true
        }
        Err(reason) => {
            warn!(peer, %reason, "agent command rejected");
            false
        }
    }
}

/// Serializes tests that touch the process-wide router.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
