//! Command dispatch: protocol commands in, engine calls, protocol responses out

use chrono::{DateTime, Local};
use focusguard_api::{
    Command, ErrorCode, ErrorInfo, EventPayload, HealthStatus, Response, ResponsePayload,
};
use focusguard_core::{CoreEngine, CoreEvent};
use focusguard_util::{ClientId, FocusError, Result};
use tracing::{debug, warn};

pub fn handle_command(
    engine: &mut CoreEngine,
    client_id: &ClientId,
    command: Command,
    now: DateTime<Local>,
) -> Result<ResponsePayload> {
    let payload = match command {
        Command::GetState => ResponsePayload::State(engine.get_state(now)),

        Command::StartBlocking { duration } => {
            engine.start_blocking(duration, now)?;
            blocking(engine, now)?
        }

        Command::StopBlocking => {
            engine.stop_blocking(now)?;
            blocking(engine, now)?
        }

        Command::ExtendBlocking { duration } => {
            engine.extend_blocking(duration, now)?;
            blocking(engine, now)?
        }

        Command::UpdateBlockingRules => ResponsePayload::Blocklist {
            domains: engine.update_blocking_rules()?,
        },

        Command::GetSettings => ResponsePayload::Settings(engine.settings()?),
        Command::AddCustomSite { domain } => {
            ResponsePayload::Settings(engine.add_custom_site(&domain)?)
        }
        Command::RemoveCustomSite { domain } => {
            ResponsePayload::Settings(engine.remove_custom_site(&domain)?)
        }
        Command::SetSiteEnabled { domain, enabled } => {
            ResponsePayload::Settings(engine.set_site_enabled(&domain, enabled)?)
        }
        Command::AddMessage { message } => ResponsePayload::Settings(engine.add_message(&message)?),
        Command::RemoveMessage { index } => {
            ResponsePayload::Settings(engine.remove_message(index)?)
        }
        Command::ResetSettings => ResponsePayload::Settings(engine.reset_settings()?),

        Command::TrackVisit { domain } => ResponsePayload::Today(engine.track_visit(&domain, now)?),

        Command::Navigate { tab_id, url } => ResponsePayload::Navigation {
            decision: engine.navigate(tab_id, &url, now),
        },

        Command::TabClosed { tab_id } => {
            engine.tab_closed(tab_id, now);
            ResponsePayload::Ack
        }

        Command::GrantAccess { domain, duration } => {
            let (domain, remaining) = engine.grant_access(&domain, &duration, now)?;
            ResponsePayload::Granted { domain, remaining }
        }

        Command::RevokeAccess { domain } => ResponsePayload::Revoked {
            domain: engine.revoke_access(&domain, now)?,
        },

        Command::GetBlockScreen { domain } => {
            ResponsePayload::BlockScreen(engine.block_screen(&domain, now)?)
        }

        Command::GetTodayStats => ResponsePayload::Today(engine.today_stats(now)?),
        Command::GetReport { view } => ResponsePayload::Report(engine.report(view, now)?),
        Command::ExportUsage => ResponsePayload::Export {
            json: engine.export_usage()?,
        },
        Command::ClearUsage => {
            engine.clear_usage(now)?;
            ResponsePayload::Ack
        }

        Command::SubscribeEvents => {
            debug!(client_id = %client_id, "Client subscribed to events");
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            }
        }
        Command::UnsubscribeEvents => ResponsePayload::Unsubscribed,

        Command::GetHealth => {
            let store_ok = engine.is_store_healthy();
            ResponsePayload::Health(HealthStatus {
                live: true,
                ready: store_ok,
                store_ok,
            })
        }

        Command::Ping => ResponsePayload::Pong,
    };
    Ok(payload)
}

fn blocking(engine: &mut CoreEngine, now: DateTime<Local>) -> Result<ResponsePayload> {
    let (state, remaining) = engine.block_status(now)?;
    Ok(ResponsePayload::Blocking { state, remaining })
}

pub fn error_code(error: &FocusError) -> ErrorCode {
    match error {
        FocusError::InvalidDuration(_) => ErrorCode::InvalidDuration,
        FocusError::InvalidDomain(_) => ErrorCode::InvalidDomain,
        FocusError::InvalidInput(_) => ErrorCode::InvalidRequest,
        FocusError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
        FocusError::ConfigError(_) | FocusError::IpcError(_) | FocusError::Internal(_) => {
            ErrorCode::InternalError
        }
    }
}

pub fn to_response(request_id: u64, result: Result<ResponsePayload>) -> Response {
    match result {
        Ok(payload) => Response::success(request_id, payload),
        Err(e) => {
            if e.is_validation() {
                debug!(request_id, error = %e, "Request rejected");
            } else {
                warn!(request_id, error = %e, "Request failed");
            }
            Response::error(request_id, ErrorInfo::new(error_code(&e), e.to_string()))
        }
    }
}

pub fn event_payload(event: CoreEvent) -> EventPayload {
    match event {
        CoreEvent::BlockingChanged { state } => EventPayload::BlockingChanged { state },
        CoreEvent::SiteBlocked { domain } => EventPayload::SiteBlocked { domain },
        CoreEvent::AccessGranted {
            domain,
            allowed_until,
        } => EventPayload::AccessGranted {
            domain,
            allowed_until,
        },
        CoreEvent::AccessRevoked { domain } => EventPayload::AccessRevoked { domain },
        CoreEvent::BlocklistUpdated { domains } => EventPayload::BlocklistUpdated { domains },
        CoreEvent::StatsUpdated(today) => EventPayload::StatsUpdated(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use focusguard_api::{BlockState, NavigationDecision, Remaining, ResponseResult};
    use focusguard_config::Policy;
    use focusguard_core::MockAlarms;
    use focusguard_store::SqliteStore;
    use focusguard_util::TabId;
    use std::sync::Arc;

    fn engine() -> CoreEngine {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut engine = CoreEngine::new(Policy::default(), store, Arc::new(MockAlarms::new()));
        engine.initialize(t(0));
        engine
    }

    fn t(min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, 9, min, 0).unwrap()
    }

    fn run(engine: &mut CoreEngine, command: Command, now: DateTime<Local>) -> Response {
        to_response(1, handle_command(engine, &ClientId::new(), command, now))
    }

    #[test]
    fn start_blocking_reports_remaining() {
        let mut engine = engine();
        let response = run(&mut engine, Command::StartBlocking { duration: 25 }, t(0));

        match response.result {
            ResponseResult::Ok(ResponsePayload::Blocking { state, remaining }) => {
                assert_eq!(state, BlockState::ActiveTimed { until: t(25) });
                assert_eq!(remaining, Remaining::Minutes(25));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn errors_map_to_protocol_codes() {
        let mut engine = engine();

        let cases = [
            (Command::StartBlocking { duration: 0 }, ErrorCode::InvalidDuration),
            (Command::ExtendBlocking { duration: 2000 }, ErrorCode::InvalidDuration),
            (
                Command::GrantAccess {
                    domain: "bad domain".into(),
                    duration: "5".into(),
                },
                ErrorCode::InvalidDomain,
            ),
            (
                Command::AddMessage {
                    message: " ".into(),
                },
                ErrorCode::InvalidRequest,
            ),
            (Command::RemoveMessage { index: 99 }, ErrorCode::InvalidRequest),
        ];

        for (command, expected) in cases {
            let response = run(&mut engine, command, t(1));
            match response.result {
                ResponseResult::Err(e) => assert_eq!(e.code, expected),
                other => panic!("expected {:?}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn navigate_returns_decision() {
        let mut engine = engine();
        run(&mut engine, Command::StartBlocking { duration: 30 }, t(0));

        let response = run(
            &mut engine,
            Command::Navigate {
                tab_id: TabId(4),
                url: "https://mobile.twitter.com/home".into(),
            },
            t(1),
        );
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::Navigation {
                decision: NavigationDecision::Block { .. }
            })
        ));

        let events: Vec<EventPayload> = engine.drain_events().into_iter().map(event_payload).collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, EventPayload::SiteBlocked { domain } if domain.as_str() == "mobile.twitter.com")));
    }

    #[test]
    fn health_reflects_store() {
        let mut engine = engine();
        let response = run(&mut engine, Command::GetHealth, t(0));
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::Health(HealthStatus { store_ok: true, .. }))
        ));
    }
}
