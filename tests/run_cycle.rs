// tests/run_cycle.rs

use std::error::Error;
use std::time::Duration;

use barengine::options::UniversalOptions;
use barengine::{Clock, Deadline, Schedule, UnitCore, UnitId, UnitState};
use barengine_test_utils::builders::option_block;
use barengine_test_utils::scripted::{Probe, RecordedArgs, Reply, ScriptedUnit};
use barengine_test_utils::{Harness, general_config, init_tracing};
use serde_json::json;

type TestResult = Result<(), Box<dyn Error>>;

fn core_for(full_name: &str, unit: ScriptedUnit) -> UnitCore {
    UnitCore::new(
        UnitId::parse(full_name),
        Box::new(unit),
        UniversalOptions::default(),
        0.0,
    )
}

fn cached_until_five() -> (ScriptedUnit, Probe) {
    ScriptedUnit::builder()
        .producer("update")
        .always(
            "update",
            Reply::Value(json!({ "full_text": "x", "cached_until": 5.0 })),
        )
        .build()
}

#[test]
fn not_due_producer_is_skipped_and_timer_armed_for_remaining_time() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = cached_until_five();
    let mut core = core_for("clock", unit);

    let first = core.run_cycle(&h.ctx);
    assert_eq!(first.invoked, vec!["update"]);
    assert_eq!(first.schedule, Schedule::After(Duration::from_secs(5)));

    h.clock.set(2.0);
    let second = core.run_cycle(&h.ctx);
    assert!(second.invoked.is_empty());
    assert_eq!(second.schedule, Schedule::After(Duration::from_secs(3)));
    assert_eq!(probe.count("update"), 1);

    h.clock.set(5.0);
    let third = core.run_cycle(&h.ctx);
    assert_eq!(third.invoked, vec!["update"]);
    assert_eq!(probe.count("update"), 2);
    Ok(())
}

#[test]
fn delay_is_floored_at_minimum_interval() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.5);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("update")
        .always(
            "update",
            Reply::Value(json!({ "full_text": "x", "cached_until": 0.1 })),
        )
        .build();
    let mut core = core_for("clock", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.schedule, Schedule::After(Duration::from_millis(500)));
    Ok(())
}

#[test]
fn missing_cached_until_uses_cache_timeout() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("update")
        .always("update", Reply::text("x"))
        .build();
    let mut core = core_for("clock", unit);

    h.clock.set(10.0);
    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.schedule, Schedule::After(Duration::from_secs(60)));
    assert_eq!(
        core.producer("update").map(|p| p.cached_until),
        Some(Deadline::At(70.0))
    );
    Ok(())
}

#[test]
fn earliest_deadline_across_producers_wins() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("fast")
        .producer("slow")
        .always(
            "fast",
            Reply::Value(json!({ "full_text": "f", "cached_until": 2.0 })),
        )
        .always(
            "slow",
            Reply::Value(json!({ "full_text": "s", "cached_until": 30.0 })),
        )
        .build();
    let mut core = core_for("multi", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.invoked, vec!["fast", "slow"]);
    assert_eq!(report.schedule, Schedule::After(Duration::from_secs(2)));

    h.clock.set(2.0);
    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.invoked, vec!["fast"]);
    Ok(())
}

#[test]
fn cache_forever_goes_quiescent_until_forced() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = ScriptedUnit::builder()
        .producer("update")
        .always(
            "update",
            Reply::Value(json!({ "full_text": "static", "cached_until": -1 })),
        )
        .build();
    let mut core = core_for("static", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.schedule, Schedule::Quiescent);
    assert_eq!(core.cache_time(), Some(Deadline::Forever));

    h.clock.set(10_000.0);
    let report = core.run_cycle(&h.ctx);
    assert!(report.invoked.is_empty());
    assert_eq!(report.schedule, Schedule::Quiescent);

    core.force_update(h.clock.now());
    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.invoked, vec!["update"]);
    assert_eq!(probe.count("update"), 2);
    Ok(())
}

#[test]
fn forever_producer_does_not_hold_back_a_finite_one() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("a_forever")
        .producer("b_timed")
        .always(
            "a_forever",
            Reply::Value(json!({ "full_text": "a", "cached_until": -1 })),
        )
        .always(
            "b_timed",
            Reply::Value(json!({ "full_text": "b", "cached_until": 4.0 })),
        )
        .build();
    let mut core = core_for("mixed", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.schedule, Schedule::After(Duration::from_secs(4)));
    assert_eq!(core.cache_time(), Some(Deadline::At(4.0)));
    Ok(())
}

#[test]
fn missing_full_text_is_reported_and_last_output_kept() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("update")
        .then("update", Reply::text("ok"))
        .always("update", Reply::Value(json!({ "color": "#FF0000" })))
        .build();
    let mut core = core_for("weather", unit);

    core.run_cycle(&h.ctx);
    h.clock.set(60.0);
    let report = core.run_cycle(&h.ctx);

    assert_eq!(report.failed, vec!["update"]);
    let reports = h.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.contains("full_text"));
    assert!(reports[0].message.contains("weather"));
    assert_eq!(core.latest()[0].full_text(), Some("ok"));
    assert_eq!(
        core.producer("update").map(|p| p.cached_until),
        Some(Deadline::At(120.0))
    );
    Ok(())
}

#[test]
fn failures_escalate_once_until_a_success() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("update")
        .then("update", Reply::fail("boom"))
        .then("update", Reply::fail("boom"))
        .then("update", Reply::text("fine"))
        .then("update", Reply::fail("boom"))
        .build();
    let mut core = core_for("flaky", unit);

    for step in 0..4 {
        h.clock.set(step as f64 * 60.0);
        core.run_cycle(&h.ctx);
    }

    assert_eq!(h.reporter.escalations(), vec![true, false, true]);
    assert!(core.nagged());
    Ok(())
}

#[test]
fn panicking_producer_is_contained() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("a_panics")
        .producer("b_fine")
        .always("a_panics", Reply::Panic("kaboom".into()))
        .always("b_fine", Reply::text("still here"))
        .build();
    let mut core = core_for("mixed", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.invoked, vec!["a_panics", "b_fine"]);
    assert_eq!(report.failed, vec!["a_panics"]);
    assert!(h.reporter.reports()[0].message.contains("kaboom"));
    assert_eq!(core.latest()[1].full_text(), Some("still here"));
    assert_eq!(h.aggregator.count(), 1);
    Ok(())
}

#[test]
fn records_are_stamped_and_overlaid_with_universal_options() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let id = UnitId::parse("vpn_status home");
    let options = UniversalOptions::from_config(
        &id,
        &option_block(&[
            ("separator", json!(false)),
            ("align", json!("Center")),
            ("min_width", json!(50)),
        ]),
    )?;
    let (unit, _probe) = ScriptedUnit::builder()
        .producer("status")
        .always(
            "status",
            Reply::Value(json!({
                "full_text": "VPN: up",
                "name": "bogus",
                "separator": true,
            })),
        )
        .build();
    let mut core = UnitCore::new(id, Box::new(unit), options, 0.0);

    core.run_cycle(&h.ctx);
    let record = &core.latest()[0];

    assert_eq!(record.name(), Some("vpn_status"));
    assert_eq!(record.instance(), Some("home"));
    assert_eq!(record.get("separator"), Some(&json!(false)));
    assert_eq!(record.get("align"), Some(&json!("center")));
    assert_eq!(record.get("min_width"), Some(&json!(50)));
    assert_eq!(h.aggregator.count_for("vpn_status home"), 1);
    Ok(())
}

#[test]
fn producers_run_in_sorted_order_and_private_methods_are_skipped() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = ScriptedUnit::builder()
        .producer("zeta")
        .producer("_helper")
        .producer("alpha")
        .build();
    let mut core = core_for("ordered", unit);

    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.invoked, vec!["alpha", "zeta"]);
    assert_eq!(probe.methods(), vec!["alpha", "zeta"]);
    Ok(())
}

#[test]
fn unrun_producers_show_placeholders() -> TestResult {
    let (unit, _probe) = ScriptedUnit::builder().producer("update").build();
    let core = core_for("fresh", unit);

    let latest = core.latest();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].full_text(), Some(""));
    assert_eq!(latest[0].name(), Some("update"));
    Ok(())
}

#[test]
fn legacy_producer_receives_bar_output_and_general_config() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    h.aggregator.set_bar(vec![json!({ "full_text": "other unit" })]);
    let (unit, probe) = ScriptedUnit::builder()
        .legacy_producer("update")
        .always("update", Reply::Value(json!([3, { "full_text": "legacy" }])))
        .build();
    let mut core = core_for("old_style", unit);

    let report = core.run_cycle(&h.ctx);
    assert!(report.failed.is_empty());
    assert_eq!(core.latest()[0].full_text(), Some("legacy"));

    let calls = probe.calls();
    assert_eq!(
        calls[0].1,
        RecordedArgs::Legacy {
            bar: vec![json!({ "full_text": "other unit" })],
            general: general_config(),
        }
    );
    Ok(())
}

#[test]
fn closed_gate_aborts_the_cycle() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = ScriptedUnit::builder().producer("update").build();
    let mut core = core_for("gated", unit);

    h.ctx.gate.cancel();
    let report = core.run_cycle(&h.ctx);

    assert!(report.invoked.is_empty());
    assert_eq!(report.schedule, Schedule::Idle);
    assert_eq!(probe.count("update"), 0);
    assert_eq!(h.aggregator.count(), 0);
    Ok(())
}

#[test]
fn sleeping_keeps_deadlines_and_wake_resumes_from_them() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = ScriptedUnit::builder()
        .producer("update")
        .always(
            "update",
            Reply::Value(json!({ "full_text": "x", "cached_until": 10.0 })),
        )
        .build();
    let mut core = core_for("sleepy", unit);

    core.run_cycle(&h.ctx);
    core.sleep();
    assert_eq!(core.state(), UnitState::Sleeping);

    h.clock.set(4.0);
    let report = core.run_cycle(&h.ctx);
    assert_eq!(report.schedule, Schedule::Suspended);
    assert_eq!(probe.count("update"), 1);

    let schedule = core.wake(4.0);
    assert_eq!(core.state(), UnitState::Active);
    assert_eq!(schedule, Schedule::After(Duration::from_secs(6)));
    Ok(())
}

#[test]
fn wake_after_deadline_passed_runs_immediately() -> TestResult {
    let h = Harness::new(60.0, 0.1);
    let (unit, _probe) = cached_until_five();
    let mut core = core_for("sleepy", unit);

    core.run_cycle(&h.ctx);
    core.sleep();
    assert_eq!(core.wake(100.0), Schedule::After(Duration::ZERO));
    Ok(())
}

#[test]
fn wake_before_any_cycle_runs_immediately() -> TestResult {
    let (unit, _probe) = cached_until_five();
    let mut core = core_for("sleepy", unit);

    core.sleep();
    assert_eq!(core.wake(0.0), Schedule::After(Duration::ZERO));
    Ok(())
}

#[test]
fn forced_update_runs_while_sleeping_without_rearming() -> TestResult {
    init_tracing();
    let h = Harness::new(60.0, 0.1);
    let (unit, probe) = cached_until_five();
    let mut core = core_for("sleepy", unit);

    core.run_cycle(&h.ctx);
    core.sleep();

    h.clock.set(1.0);
    core.force_update(1.0);
    let report = core.run_cycle(&h.ctx);

    assert_eq!(report.invoked, vec!["update"]);
    assert_eq!(report.schedule, Schedule::Suspended);
    assert_eq!(probe.count("update"), 2);
    assert_eq!(core.state(), UnitState::Sleeping);
    Ok(())
}
