// Exercises the plan runner against a fake vehicle on localhost: override
// pausing, replay of the interrupted step, revert ordering and the facade's
// refusal gate. Delays are scaled down but keep the same ordering the real
// timings produce.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

use aero_flight::{
    CommandError, Engaged, FlightConfig, LinkMode, PlanRunner, PlanState, Reply, Vehicle,
    VehicleConfig,
};
use aero_link::{CommandLink, LinkConfig};
use aero_proto::command::Command;

async fn fake_vehicle() -> (UdpSocket, LinkConfig) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let cfg = LinkConfig {
        addr: "127.0.0.1".to_string(),
        command_port: sock.local_addr().unwrap().port(),
        local_port: 0,
    };
    (sock, cfg)
}

async fn recv_text(sock: &UdpSocket) -> String {
    let mut buf = [0u8; 256];
    let (n, _) = timeout(Duration::from_secs(2), sock.recv_from(&mut buf))
        .await
        .expect("datagram within 2s")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).to_string()
}

async fn drain_setup(sock: &UdpSocket) {
    assert_eq!(recv_text(sock).await, "command");
    assert_eq!(recv_text(sock).await, "streamon");
}

fn vehicle_cfg(ack_wait_ms: u64) -> VehicleConfig {
    VehicleConfig {
        mode: LinkMode::Rehearsal,
        ack_wait_ms,
        default_distance_cm: 100,
        turn_deg: 90,
    }
}

#[tokio::test]
async fn plan_runs_to_completion_in_order() {
    let (sock, link_cfg) = fake_vehicle().await;
    let link = Arc::new(CommandLink::connect(&link_cfg).await.unwrap());
    drain_setup(&sock).await;

    let flight = FlightConfig {
        step_delay_ms: 100,
        plan: vec![Command::Takeoff, Command::Forward { cm: 100 }, Command::Land],
    };
    let runner = PlanRunner::new(&flight, link.clone());
    assert_eq!(runner.state(), PlanState::Idle);

    assert_eq!(runner.engage(), Engaged::Started);
    assert_eq!(recv_text(&sock).await, "takeoff");
    assert_eq!(recv_text(&sock).await, "forward 100");
    assert_eq!(recv_text(&sock).await, "land");

    sleep(Duration::from_millis(200)).await;
    assert_eq!(runner.state(), PlanState::Completed);
    assert!(!runner.is_active());
}

#[tokio::test]
async fn override_pauses_plan_and_replays_interrupted_step() {
    let (sock, link_cfg) = fake_vehicle().await;
    let link = Arc::new(CommandLink::connect(&link_cfg).await.unwrap());
    drain_setup(&sock).await;

    let flight = FlightConfig {
        step_delay_ms: 100,
        plan: vec![Command::Takeoff, Command::Forward { cm: 100 }, Command::Land],
    };
    let runner = PlanRunner::new(&flight, link.clone());
    // ack window longer than the step delay so the pause is observable
    let vehicle = Arc::new(Vehicle::new(&vehicle_cfg(400), link.clone(), None, runner.clone()));

    assert_eq!(vehicle.engage_plan(), Engaged::Started);
    assert_eq!(recv_text(&sock).await, "takeoff");

    // cut in before the runner reaches step 1
    let manual = {
        let vehicle = vehicle.clone();
        tokio::spawn(async move { vehicle.up().await })
    };
    assert_eq!(recv_text(&sock).await, "up 100");

    // the runner hits its next lock check mid-override and parks
    sleep(Duration::from_millis(200)).await;
    assert_eq!(runner.state(), PlanState::Overridden);

    // manual command completes, lock is re-armed, step 1 goes out after all
    assert_eq!(manual.await.unwrap().unwrap(), Reply::Ack("up 100".to_string()));
    assert_eq!(recv_text(&sock).await, "forward 100");
    assert_eq!(recv_text(&sock).await, "land");

    sleep(Duration::from_millis(200)).await;
    assert_eq!(runner.state(), PlanState::Completed);
}

#[tokio::test]
async fn second_engage_reverts_instead_of_restarting() {
    let (sock, link_cfg) = fake_vehicle().await;
    let link = Arc::new(CommandLink::connect(&link_cfg).await.unwrap());
    drain_setup(&sock).await;

    let flight = FlightConfig {
        step_delay_ms: 200,
        plan: vec![Command::Takeoff, Command::Forward { cm: 100 }, Command::Land],
    };
    let runner = PlanRunner::new(&flight, link.clone());
    let vehicle = Vehicle::new(&vehicle_cfg(100), link.clone(), None, runner.clone());

    assert_eq!(vehicle.engage_plan(), Engaged::Started);
    assert_eq!(recv_text(&sock).await, "takeoff");
    assert_eq!(recv_text(&sock).await, "forward 100");

    // second invocation while active: revert, never a restart from step 0
    assert_eq!(vehicle.engage_plan(), Engaged::RevertStarted);
    assert!(runner.is_reverting());

    // every facade command is refused while the trace drains, and nothing
    // is transmitted for it
    match vehicle.up().await {
        Err(CommandError::RevertInProgress) => {}
        other => panic!("expected refusal during revert, got {:?}", other),
    }

    // trace was [takeoff, forward 100]: inverses in reverse order
    assert_eq!(recv_text(&sock).await, "back 100");
    assert_eq!(recv_text(&sock).await, "stop");

    // the parked runner is re-armed and replays its interrupted step
    assert_eq!(recv_text(&sock).await, "land");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(runner.state(), PlanState::Completed);

    // a fresh engage after completion starts from step 0 again
    assert_eq!(vehicle.engage_plan(), Engaged::Started);
    assert_eq!(recv_text(&sock).await, "takeoff");
}

#[tokio::test]
async fn overriding_command_lands_in_the_trace() {
    let (sock, link_cfg) = fake_vehicle().await;
    let link = Arc::new(CommandLink::connect(&link_cfg).await.unwrap());
    drain_setup(&sock).await;

    let flight = FlightConfig {
        step_delay_ms: 300,
        plan: vec![Command::Takeoff, Command::Land],
    };
    let runner = PlanRunner::new(&flight, link.clone());
    let vehicle = Vehicle::new(&vehicle_cfg(100), link.clone(), None, runner.clone());

    assert_eq!(vehicle.engage_plan(), Engaged::Started);
    assert_eq!(recv_text(&sock).await, "takeoff");

    // manual rotation mid-plan, then revert: the rotation must unwind too
    vehicle.turn_ccw().await.unwrap();
    assert_eq!(recv_text(&sock).await, "ccw 90");

    assert_eq!(vehicle.engage_plan(), Engaged::RevertStarted);
    // trace [takeoff, ccw 90] unwinds newest-first
    assert_eq!(recv_text(&sock).await, "cw 90");
    assert_eq!(recv_text(&sock).await, "stop");
}
