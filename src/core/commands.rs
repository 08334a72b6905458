//! Command processing
//!
//! Two sources feed the processor: commands the schedule pins to a point
//! in time, and on-demand codes arriving over the push channel or from
//! trigger actions. Scheduled commands execute exactly once per
//! `(code, date)` pair for a given schedule; the marker set is dropped
//! whenever a new schedule is adopted.
//!
//! Command strings follow `<scheme>|<payload>[|<contentType>]`. The core
//! executes `http` itself (an empty POST); every other scheme is handed
//! to the platform shell.

use tracing::{debug, info, warn};

use crate::events::PlayerEvent;
use crate::models::ActionKind;

use super::runtime::CoreMessage;
use super::PlayerCore;

/// A parsed command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandString<'a> {
    pub scheme: &'a str,
    pub payload: &'a str,
    pub content_type: Option<&'a str>,
}

impl<'a> CommandString<'a> {
    /// Parse `<scheme>|<payload>[|<contentType>]`.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut parts = raw.splitn(3, '|');
        let scheme = parts.next()?.trim();
        let payload = parts.next()?.trim();
        if scheme.is_empty() || payload.is_empty() {
            return None;
        }
        Some(Self {
            scheme,
            payload,
            content_type: parts.next().map(str::trim).filter(|s| !s.is_empty()),
        })
    }
}

impl PlayerCore {
    // ------------------------------------------------------------------------
    // scheduled commands
    // ------------------------------------------------------------------------

    /// Walk the schedule's command list and fire anything due.
    pub(crate) fn process_scheduled_commands(&mut self) {
        let now = self.clock.now();
        let due: Vec<_> = self
            .schedule
            .commands
            .iter()
            .filter_map(|cmd| {
                let key = cmd.execution_key();
                if self.executed_commands.contains(&key) {
                    return None;
                }
                let Some(date) = cmd.parsed_date() else {
                    debug!(code = %cmd.code, date = %cmd.date, "scheduled command has invalid date");
                    return None;
                };
                (now >= date).then(|| (key, cmd.clone()))
            })
            .collect();

        for (key, cmd) in due {
            self.executed_commands.insert(key);

            if cmd.code == "collectNow" {
                info!("scheduled collectNow; queueing a collection");
                // run on the next tick so the current cycle finishes first
                if let Err(e) = self.self_tx.try_send(CoreMessage::Collect) {
                    warn!(error = %e, "could not queue collectNow");
                }
            } else {
                self.bus.emit(PlayerEvent::ScheduledCommand {
                    code: cmd.code.clone(),
                    date: cmd.date.clone(),
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // on-demand commands
    // ------------------------------------------------------------------------

    /// Execute a command code against the display's command map.
    pub async fn execute_command(&mut self, code: &str) {
        let Some(command_string) = self
            .commands
            .get(code)
            .and_then(|def| def.effective())
            .map(str::to_string)
        else {
            warn!(code, "unknown command");
            self.last_command_success = false;
            self.bus.emit(PlayerEvent::CommandResult {
                code: code.to_string(),
                success: false,
                status: None,
                reason: Some("Unknown command".into()),
            });
            return;
        };

        let Some(parsed) = CommandString::parse(&command_string) else {
            warn!(code, "malformed command string");
            self.last_command_success = false;
            self.bus.emit(PlayerEvent::CommandResult {
                code: code.to_string(),
                success: false,
                status: None,
                reason: Some("Malformed command string".into()),
            });
            return;
        };

        match parsed.scheme {
            "http" => self.execute_http_command(code, &parsed).await,
            _ => {
                // shell, intent, rs232, ... the platform owns these
                debug!(code, scheme = parsed.scheme, "delegating native command");
                self.last_command_success = true;
                self.bus.emit(PlayerEvent::ExecuteNativeCommand {
                    code: code.to_string(),
                    command_string,
                });
            }
        }
    }

    async fn execute_http_command(&mut self, code: &str, parsed: &CommandString<'_>) {
        let content_type = parsed.content_type.unwrap_or("application/json");

        let result = self
            .http_client
            .post(parsed.payload)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let success = response.status().is_success();
                self.last_command_success = success;
                self.bus.emit(PlayerEvent::CommandResult {
                    code: code.to_string(),
                    success,
                    status: Some(status),
                    reason: None,
                });
            }
            Err(e) => {
                warn!(code, error = %e, "http command failed");
                self.last_command_success = false;
                self.bus.emit(PlayerEvent::CommandResult {
                    code: code.to_string(),
                    success: false,
                    status: None,
                    reason: Some(e.to_string()),
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // triggers
    // ------------------------------------------------------------------------

    /// Dispatch a trigger code against the schedule's action list.
    pub fn handle_trigger(&mut self, code: &str) {
        let Some(action) = self.schedule.action_for_trigger(code).cloned() else {
            debug!(code, "no action bound to trigger");
            return;
        };

        match action.kind() {
            ActionKind::NavLayout(layout_code) => {
                info!(code, layout = layout_code, "trigger navigates to layout");
                self.change_layout(layout_code, None, None);
            }
            ActionKind::NavWidget(action) => {
                let widget_id = action.widget_id.clone().unwrap_or_default();
                self.bus.emit(PlayerEvent::NavigateToWidget { widget_id });
            }
            ActionKind::Command(command_code) => {
                self.bus.emit(PlayerEvent::ExecuteCommand {
                    code: command_code.to_string(),
                });
            }
            ActionKind::Unknown(kind) => {
                warn!(code, action_type = kind, "unknown action type; ignoring");
            }
        }
    }
}
