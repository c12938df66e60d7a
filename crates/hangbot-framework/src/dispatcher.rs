//! Event dispatcher.
//!
//! For each incoming event the [`Dispatcher`] runs one pass:
//!
//! 1. **Classify** the event into its [`EventCategory`] set.
//! 2. **Collect** the handlers of those categories from the [`Registry`],
//!    sorted by priority (ties in registration order).
//! 3. **Invoke** them one after another, reading the [`Flow`] each returns:
//!    - `Continue` / `SuppressHandler`: go on;
//!    - `SuppressAllHandlers`: skip every handler with a higher priority
//!      value, let equal-priority peers finish;
//!    - `SuppressEventHandling`: stop now.
//!
//! A handler that returns an error or panics is logged and skipped; the
//! remaining handlers still run.
//!
//! ```text
//! event ──▶ classify ──▶ [p10 a] ──▶ [p20 b] ──▶ [p20 c] ──▶ [p30 d]
//!                                       │
//!                        SuppressAllHandlers: c still runs, d is skipped
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tower::ServiceExt;
use tracing::{Instrument, Level, debug, error, span, trace};

use crate::command::parse_command;
use crate::context::{Bot, HandlerContext};
use crate::registry::{Flow, Registry};
use hangbot_core::{ConversationEvent, EventCategory, classify};

/// Summary of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Categories the event was classified into.
    pub categories: Vec<EventCategory>,
    /// Handlers that were called.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
    /// Handlers skipped because of `SuppressAllHandlers`.
    pub skipped: usize,
    /// `true` if a handler answered `SuppressEventHandling`.
    pub halted: bool,
}

/// Runs dispatch passes against a shared [`Registry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Dispatches one event to its handlers.
    pub async fn dispatch(&self, bot: &Bot, event: Arc<ConversationEvent>) -> DispatchReport {
        let categories = classify(&event, bot.self_id());
        let span = span!(
            Level::DEBUG,
            "dispatch",
            event_id = %event.id,
            conversation = %event.conversation_id,
            categories = ?categories,
        );
        self.run(bot, event, categories).instrument(span).await
    }

    async fn run(
        &self,
        bot: &Bot,
        event: Arc<ConversationEvent>,
        categories: Vec<EventCategory>,
    ) -> DispatchReport {
        let command = if categories.contains(&EventCategory::Message) {
            event
                .text()
                .and_then(|text| parse_command(text, &bot.command_aliases()))
                .map(Arc::new)
        } else {
            None
        };

        let entries = self.registry.handlers_for(&categories);
        let mut report = DispatchReport {
            categories,
            ..Default::default()
        };
        trace!(handlers = entries.len(), "Collected handlers");

        let mut ceiling: Option<i32> = None;

        for (index, entry) in entries.iter().enumerate() {
            if let Some(limit) = ceiling
                && entry.priority() > limit
            {
                report.skipped = entries.len() - index;
                debug!(
                    priority = limit,
                    skipped = report.skipped,
                    "Remaining handlers suppressed"
                );
                break;
            }

            let ctx = HandlerContext::new(
                bot.clone(),
                Arc::clone(&event),
                entry.category(),
                command.clone(),
            );

            report.invoked += 1;
            let outcome = AssertUnwindSafe(entry.service().oneshot(ctx))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(Flow::Continue | Flow::SuppressHandler)) => {}
                Ok(Ok(Flow::SuppressAllHandlers)) => {
                    ceiling = Some(ceiling.map_or(entry.priority(), |c| c.min(entry.priority())));
                }
                Ok(Ok(Flow::SuppressEventHandling)) => {
                    debug!(
                        plugin = %entry.plugin(),
                        priority = entry.priority(),
                        "Event handling suppressed"
                    );
                    report.halted = true;
                    break;
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(
                        plugin   = %entry.plugin(),
                        category = %entry.category(),
                        priority = entry.priority(),
                        event_id = %event.id,
                        error    = %e,
                        "Handler returned an error"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        plugin   = %entry.plugin(),
                        category = %entry.category(),
                        priority = entry.priority(),
                        event_id = %event.id,
                        panic    = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::test_support::test_bot;
    use hangbot_core::{EventKind, MembershipChange};
    use parking_lot::Mutex;
    use serde_json::json;

    type Log = Arc<Mutex<Vec<i32>>>;

    fn record(bot: &Bot, log: &Log, priority: i32, flow: Flow) {
        let log = Arc::clone(log);
        bot.registry().register_handler(
            "test",
            EventCategory::Message,
            priority,
            move |_ctx: HandlerContext| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(priority);
                    Ok::<_, BoxError>(flow)
                }
            },
        );
    }

    fn message() -> ConversationEvent {
        ConversationEvent::message("e1", "c1", "alice", "hello there")
    }

    #[tokio::test]
    async fn test_handlers_run_in_priority_order_regardless_of_registration() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 30, Flow::Continue);
        record(&bot, &log, 10, Flow::Continue);
        record(&bot, &log, 20, Flow::Continue);

        let report = bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![10, 20, 30]);
        assert!(!report.halted);
    }

    #[tokio::test]
    async fn test_suppress_all_skips_only_higher_priorities() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 10, Flow::Continue);
        record(&bot, &log, 20, Flow::SuppressAllHandlers);
        record(&bot, &log, 20, Flow::Continue);
        record(&bot, &log, 30, Flow::Continue);
        record(&bot, &log, 40, Flow::Continue);

        let report = bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![10, 20, 20]);
        assert_eq!(report.skipped, 2);
        assert!(!report.halted);
    }

    #[tokio::test]
    async fn test_suppress_all_does_not_leak_into_next_event() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 10, Flow::SuppressAllHandlers);
        record(&bot, &log, 20, Flow::Continue);

        bot.handle_event(message()).await;
        bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![10, 10]);
    }

    #[tokio::test]
    async fn test_suppress_event_handling_stops_same_priority_peers() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 10, Flow::Continue);
        record(&bot, &log, 20, Flow::SuppressEventHandling);
        record(&bot, &log, 20, Flow::Continue);
        record(&bot, &log, 30, Flow::Continue);

        let report = bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![10, 20]);
        assert!(report.halted);
    }

    #[tokio::test]
    async fn test_suppress_handler_behaves_like_continue() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 10, Flow::SuppressHandler);
        record(&bot, &log, 20, Flow::Continue);

        bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_handlers_are_isolated() {
        let (bot, _) = test_bot(json!({}));
        let log: Log = Arc::default();

        bot.registry().register_handler(
            "broken",
            EventCategory::Message,
            10,
            |_ctx: HandlerContext| async move { Err::<Flow, BoxError>("boom".into()) },
        );
        bot.registry().register_handler(
            "panicky",
            EventCategory::Message,
            15,
            |_ctx: HandlerContext| async move {
                if true {
                    panic!("handler exploded");
                }
                Ok::<_, BoxError>(Flow::Continue)
            },
        );
        record(&bot, &log, 20, Flow::Continue);

        let report = bot.handle_event(message()).await;

        assert_eq!(*log.lock(), vec![20]);
        assert_eq!(report.failed, 2);
        assert_eq!(report.invoked, 3);
    }

    #[tokio::test]
    async fn test_membership_join_of_self_reaches_handlers_in_order_with_same_snapshot() {
        let (bot, client) = test_bot(json!({}));
        let seen: Arc<Mutex<Vec<(i32, Arc<ConversationEvent>)>>> = Arc::default();

        for priority in [20, 10] {
            let seen = Arc::clone(&seen);
            bot.registry().register_handler(
                "watcher",
                EventCategory::Membership,
                priority,
                move |ctx: HandlerContext| {
                    let seen = Arc::clone(&seen);
                    async move {
                        assert!(ctx.event().involves(ctx.bot().self_id()));
                        seen.lock().push((priority, Arc::clone(ctx.event_arc())));
                        Ok::<_, BoxError>(Flow::Continue)
                    }
                },
            );
        }

        let join = ConversationEvent::new(
            "join-1",
            "c1",
            "alice",
            1_000,
            EventKind::Membership {
                change: MembershipChange::Join,
                participant_ids: vec![client.self_id_string()],
            },
        );
        let report = bot.handle_event(join).await;

        let seen = seen.lock();
        let order: Vec<i32> = seen.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, vec![10, 20]);
        assert!(Arc::ptr_eq(&seen[0].1, &seen[1].1));
        assert_eq!(report.categories, vec![EventCategory::Membership]);
    }

    #[tokio::test]
    async fn test_handlers_see_parsed_command() {
        let (bot, _) = test_bot(json!({}));
        let captured: Arc<Mutex<Option<Vec<String>>>> = Arc::default();
        let slot = Arc::clone(&captured);
        bot.registry().register_handler(
            "spy",
            EventCategory::Message,
            5,
            move |ctx: HandlerContext| {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock() = ctx.command().map(|c| c.args.clone());
                    Ok::<_, BoxError>(Flow::Continue)
                }
            },
        );

        bot.handle_event(ConversationEvent::message(
            "e1",
            "c1",
            "alice",
            "/bot echo 'a b' c",
        ))
        .await;

        assert_eq!(
            captured.lock().clone(),
            Some(vec!["a b".to_string(), "c".to_string()])
        );
    }

    #[tokio::test]
    async fn test_sending_handler_can_veto_or_rewrite() {
        let (bot, client) = test_bot(json!({}));
        bot.registry().register_handler(
            "moderation",
            EventCategory::Sending,
            10,
            |ctx: HandlerContext| async move {
                let Some(outgoing) = ctx.event().outgoing() else {
                    return Ok::<_, BoxError>(Flow::Continue);
                };
                if outgoing.text().contains("secret") {
                    return Ok(Flow::SuppressEventHandling);
                }
                outgoing.set_text(outgoing.text().to_uppercase());
                Ok(Flow::Continue)
            },
        );

        assert!(!bot.send_message("c1", "the secret plan").await.unwrap());
        assert!(bot.send_message("c1", "hello").await.unwrap());

        assert_eq!(client.sent(), vec![("c1".to_string(), "HELLO".to_string())]);
    }

    #[tokio::test]
    async fn test_own_messages_skip_message_handlers() {
        let (bot, client) = test_bot(json!({}));
        let log: Log = Arc::default();
        record(&bot, &log, 10, Flow::Continue);

        let own = ConversationEvent::message("e1", "c1", client.self_id_string(), "hi");
        let report = bot.handle_event(own).await;

        assert!(log.lock().is_empty());
        assert_eq!(report.categories, vec![EventCategory::AllMessages]);
    }
}
