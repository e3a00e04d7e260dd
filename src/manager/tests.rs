use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use super::*;
use crate::adapt::host::testing::{RecordingHost, color_light_off, color_light_on};
use crate::adapt::{ActionKind, Context, ContextId, LightState, prepare_adaptation};

const LIGHT: &str = "light.desk";

fn our_context(kind: ActionKind) -> Context {
    Context::from(&ContextId::new("living_room", kind, 0, Utc::now()))
}

fn user_context(id: &str) -> Context {
    Context::new(id)
}

fn call(service: LightService, data: ServiceData, context: Context) -> ServiceCallEvent {
    ServiceCallEvent {
        service,
        data,
        context,
    }
}

fn change(old: LightState, new: LightState, context: Context) -> StateChangedEvent {
    StateChangedEvent {
        entity_id: LIGHT.to_string(),
        old_state: Some(old),
        new_state: Some(new),
        context,
    }
}

fn brightness_call(context: Context) -> ServiceCallEvent {
    call(
        LightService::TurnOn,
        ServiceData {
            brightness: Some(40),
            ..ServiceData::for_light(LIGHT)
        },
        context,
    )
}

fn target(transition: Option<f64>) -> ServiceData {
    ServiceData {
        brightness_pct: Some(60.0),
        color_temp_kelvin: Some(3000),
        transition,
        ..ServiceData::for_light(LIGHT)
    }
}

fn policy() -> TakeoverPolicy {
    TakeoverPolicy {
        take_over_control: true,
        adapt_brightness: true,
        adapt_color: true,
        autoreset: None,
    }
}

fn guard_policy() -> GuardPolicy {
    GuardPolicy {
        turn_off_delay: Duration::from_secs(5),
        retries: 3,
    }
}

fn host_with_light_on() -> Arc<RecordingHost> {
    let host = Arc::new(RecordingHost::new());
    host.set_state(LIGHT, color_light_on());
    host
}

#[tokio::test(start_paused = true)]
async fn test_mark_and_reset() {
    let manager = Manager::new(None);
    assert!(!manager.is_manually_controlled(LIGHT));

    manager.mark_manual(LIGHT, None);
    assert!(manager.is_manually_controlled(LIGHT));

    manager.reset(LIGHT);
    assert!(!manager.is_manually_controlled(LIGHT));
    assert!(manager.last_service_data(LIGHT).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_autoreset_clears_flag_and_sends_notice() {
    let (tx, mut rx) = mpsc::channel(8);
    let manager = Manager::new(Some(tx));

    manager.mark_manual(LIGHT, Some(Duration::from_secs(10)));
    assert!(manager.has_autoreset(LIGHT));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(manager.is_manually_controlled(LIGHT));

    let notice = rx.recv().await;
    assert_eq!(
        notice,
        Some(Event::AutoReset {
            light: LIGHT.to_string()
        })
    );
    assert!(!manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_remarking_restarts_autoreset() {
    let manager = Manager::new(None);
    manager.mark_manual(LIGHT, Some(Duration::from_secs(10)));

    tokio::time::sleep(Duration::from_secs(6)).await;
    manager.mark_manual(LIGHT, Some(Duration::from_secs(10)));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(manager.is_manually_controlled(LIGHT));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_autoreset() {
    let (tx, mut rx) = mpsc::channel(8);
    let manager = Manager::new(Some(tx));
    manager.mark_manual(LIGHT, Some(Duration::from_secs(10)));
    manager.reset(LIGHT);
    assert!(!manager.has_autoreset(LIGHT));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_foreign_turn_on_to_lit_light_takes_over() {
    let manager = Manager::new(None);
    let event = brightness_call(user_context("user-1"));

    assert!(manager.evaluate_takeover(LIGHT, &event, true, &policy()));
    assert!(manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_takeover_is_skipped() {
    let manager = Manager::new(None);

    // Light was off
    let event = brightness_call(user_context("user-1"));
    assert!(!manager.evaluate_takeover(LIGHT, &event, false, &policy()));

    // Our own command
    let event = brightness_call(our_context(ActionKind::Interval));
    assert!(!manager.evaluate_takeover(LIGHT, &event, true, &policy()));

    // Proactively adapted call
    manager.mark_proactive("user-2");
    let event = brightness_call(user_context("user-2"));
    assert!(!manager.evaluate_takeover(LIGHT, &event, true, &policy()));

    // Take over disabled
    let event = brightness_call(user_context("user-3"));
    let disabled = TakeoverPolicy {
        take_over_control: false,
        ..policy()
    };
    assert!(!manager.evaluate_takeover(LIGHT, &event, true, &disabled));

    // Brightness change while brightness isn't adapted
    let color_only = TakeoverPolicy {
        adapt_brightness: false,
        ..policy()
    };
    assert!(!manager.evaluate_takeover(LIGHT, &event, true, &color_only));

    // Bare turn_on
    let bare = call(
        LightService::TurnOn,
        ServiceData::for_light(LIGHT),
        user_context("user-4"),
    );
    assert!(!manager.evaluate_takeover(LIGHT, &bare, true, &policy()));

    assert!(!manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_foreign_turn_on_to_manual_light_restarts_autoreset() {
    let manager = Manager::new(None);
    let with_reset = TakeoverPolicy {
        autoreset: Some(Duration::from_secs(10)),
        ..policy()
    };
    assert!(manager.evaluate_takeover(
        LIGHT,
        &brightness_call(user_context("a")),
        true,
        &with_reset
    ));

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(!manager.evaluate_takeover(
        LIGHT,
        &brightness_call(user_context("b")),
        true,
        &with_reset
    ));

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(manager.is_manually_controlled(LIGHT));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_off_to_on_resets_manual_control() {
    let manager = Manager::new(None);
    manager.mark_manual(LIGHT, None);

    let transition = manager.on_state_changed(&change(
        color_light_off(),
        color_light_on(),
        user_context("user-1"),
    ));
    assert_eq!(transition, StateTransition::OffToOn);
    assert!(!manager.is_manually_controlled(LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_significant_change_marks_manual() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(None),
        false,
        false,
        false,
        Duration::ZERO,
    );
    manager.execute_adaptation(data, host.clone()).await.wait().await;
    assert!(manager.last_service_data(LIGHT).is_some());

    // Close to what we sent
    assert!(!manager.significant_change(LIGHT, host.as_ref(), true, true, None).await);

    let mut state = host.state(LIGHT).unwrap();
    state.brightness = Some(20);
    host.set_state(LIGHT, state);
    assert!(manager.significant_change(LIGHT, host.as_ref(), true, true, None).await);
    assert!(manager.is_manually_controlled(LIGHT));
    assert!(host.refreshes().iter().all(|l| l == LIGHT));
}

#[tokio::test(start_paused = true)]
async fn test_significant_change_waits_for_transition() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(30.0)),
        false,
        false,
        false,
        Duration::ZERO,
    );
    manager.execute_adaptation(data, host.clone()).await.wait().await;
    assert!(manager.is_transition_running(LIGHT));

    let mut state = host.state(LIGHT).unwrap();
    state.brightness = Some(20);
    host.set_state(LIGHT, state);
    assert!(!manager.significant_change(LIGHT, host.as_ref(), true, true, None).await);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(manager.significant_change(LIGHT, host.as_ref(), true, true, None).await);
}

#[tokio::test(start_paused = true)]
async fn test_split_commands_are_spaced_by_half_the_transition() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(10.0)),
        true,
        false,
        false,
        Duration::from_millis(100),
    );

    let handle = manager.execute_adaptation(data, host.clone()).await;
    handle.wait().await;

    let sent = host.sent_to(LIGHT);
    assert_eq!(sent.len(), 2);
    assert!(sent[0].data.brightness_pct.is_some());
    assert!(sent[0].data.color_temp_kelvin.is_none());
    assert!(sent[1].data.color_temp_kelvin.is_some());
    assert_eq!(sent[0].data.transition, Some(5.0));
    assert_eq!(sent[1].at - sent[0].at, Duration::from_millis(5100));
    assert!(!handle.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_split_sleep() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(10.0)),
        true,
        false,
        false,
        Duration::ZERO,
    );

    let handle = manager.execute_adaptation(data, host.clone()).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.cancel_adaptation(LIGHT);
    handle.wait().await;

    assert!(handle.is_cancelled());
    assert_eq!(host.sent_to(LIGHT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_adaptation_supersedes_overlapping_one() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let first = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(10.0)),
        true,
        false,
        false,
        Duration::ZERO,
    );
    let first = manager.execute_adaptation(first, host.clone()).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Apply),
        target(None),
        false,
        false,
        false,
        Duration::ZERO,
    );
    let second = manager.execute_adaptation(second, host.clone()).await;
    assert!(first.is_cancelled());
    assert!(first.is_finished());
    second.wait().await;

    let sent = host.sent_to(LIGHT);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].context.id.contains(":apl:"));
}

#[tokio::test(start_paused = true)]
async fn test_brightness_and_color_units_run_side_by_side() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let brightness = ServiceData {
        brightness_pct: Some(30.0),
        ..ServiceData::for_light(LIGHT)
    };
    let color = ServiceData {
        color_temp_kelvin: Some(2500),
        ..ServiceData::for_light(LIGHT)
    };

    let ctx = our_context(ActionKind::Interval);
    let a = prepare_adaptation(LIGHT, ctx.clone(), brightness, false, false, false, Duration::ZERO);
    let b = prepare_adaptation(LIGHT, ctx, color, false, false, false, Duration::ZERO);
    let a = manager.execute_adaptation(a, host.clone()).await;
    let b = manager.execute_adaptation(b, host.clone()).await;
    a.wait().await;
    b.wait().await;

    assert!(!a.is_cancelled());
    assert!(!b.is_cancelled());
    assert_eq!(host.sent_to(LIGHT).len(), 2);
    let last = manager.last_service_data(LIGHT).unwrap();
    assert_eq!(last.brightness_pct, Some(30.0));
    assert_eq!(last.color_temp_kelvin, Some(2500));
}

#[tokio::test(start_paused = true)]
async fn test_turning_off_cancels_adaptation() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(10.0)),
        true,
        false,
        false,
        Duration::ZERO,
    );
    let handle = manager.execute_adaptation(data, host.clone()).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let transition = manager.on_state_changed(&change(
        color_light_on(),
        color_light_off(),
        user_context("user-1"),
    ));
    assert_eq!(transition, StateTransition::OnToOff);
    assert!(handle.is_cancelled());
    handle.wait().await;
    assert_eq!(host.sent_to(LIGHT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_turn_off_call_cancels_adaptation() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    let data = prepare_adaptation(
        LIGHT,
        our_context(ActionKind::Interval),
        target(Some(10.0)),
        true,
        false,
        false,
        Duration::ZERO,
    );
    let handle = manager.execute_adaptation(data, host.clone()).await;
    manager.record_service_call(&call(
        LightService::TurnOff,
        ServiceData::for_light(LIGHT),
        user_context("user-1"),
    ));
    assert!(handle.is_cancelled());
    assert!(manager.last_call(LIGHT, LightService::TurnOff).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_transition_history_collects_our_on_to_on_changes() {
    let manager = Manager::new(None);
    manager.start_transition_timer(LIGHT, Duration::from_secs(10));

    let ours = our_context(ActionKind::Interval);
    manager.on_state_changed(&change(color_light_on(), color_light_on(), ours.clone()));
    manager.on_state_changed(&change(
        color_light_on(),
        color_light_on(),
        user_context("user-1"),
    ));
    assert_eq!(manager.transition_history(LIGHT).len(), 1);

    tokio::time::sleep(Duration::from_secs(11)).await;
    manager.on_state_changed(&change(color_light_on(), color_light_on(), ours));
    assert_eq!(manager.transition_history(LIGHT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_turned_on_with_attributes() {
    let manager = Manager::new(None);
    manager.record_service_call(&brightness_call(user_context("user-1")));
    assert!(manager.turned_on_with_attributes(LIGHT, "user-1"));
    assert!(!manager.turned_on_with_attributes(LIGHT, "user-2"));

    manager.record_service_call(&call(
        LightService::TurnOn,
        ServiceData::for_light(LIGHT),
        user_context("user-3"),
    ));
    assert!(!manager.turned_on_with_attributes(LIGHT, "user-3"));
}

#[tokio::test(start_paused = true)]
async fn test_guard_proceeds_without_prior_turn_off() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("a")));
    assert!(!manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
}

#[tokio::test(start_paused = true)]
async fn test_guard_suppresses_same_context() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("a")));
    assert!(manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
}

#[tokio::test(start_paused = true)]
async fn test_guard_proceeds_for_recorded_turn_on() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.record_service_call(&call(
        LightService::TurnOn,
        ServiceData::for_light(LIGHT),
        user_context("b"),
    ));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("b")));

    let start = tokio::time::Instant::now();
    assert!(!manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_guard_suppresses_when_light_is_off_again() {
    let manager = Manager::new(None);
    let host = Arc::new(RecordingHost::new());
    host.set_state(LIGHT, color_light_off());
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("b")));

    let start = tokio::time::Instant::now();
    assert!(manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(host.refreshes(), vec![LIGHT.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_guard_proceeds_after_retries_without_transition() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("b")));

    let start = tokio::time::Instant::now();
    assert!(!manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(host.refreshes().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_guard_suppresses_after_turn_off_transition() {
    let manager = Manager::new(None);
    let host = host_with_light_on();
    manager.record_service_call(&call(
        LightService::TurnOff,
        ServiceData {
            transition: Some(2.0),
            ..ServiceData::for_light(LIGHT)
        },
        user_context("a"),
    ));
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("b")));

    let start = tokio::time::Instant::now();
    assert!(manager.just_turned_off(LIGHT, host.as_ref(), guard_policy()).await);
    // First wait uses the turn-off transition, later ones the fallback delay
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_guard_wakes_on_turn_on_call() {
    let manager = Arc::new(Manager::new(None));
    let host = host_with_light_on();
    manager.on_state_changed(&change(color_light_on(), color_light_off(), user_context("a")));
    manager.on_state_changed(&change(color_light_off(), color_light_on(), user_context("b")));

    let guard = tokio::spawn({
        let manager = manager.clone();
        let host = host.clone();
        async move {
            manager
                .just_turned_off(LIGHT, host.as_ref(), guard_policy())
                .await
        }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.record_service_call(&call(
        LightService::TurnOn,
        ServiceData::for_light(LIGHT),
        user_context("c"),
    ));

    assert!(!guard.await.unwrap());
    assert!(host.refreshes().is_empty());
}
