mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{FakeCamera, Reply};
use ptz_tracker::ptz::{Handled, ABSOLUTE_PATH, CONTINUOUS_PATH};
use ptz_tracker::{
    command_channel, ControlMessage, PtzClient, PtzClientConfig, PtzController, PtzResponse,
    SharedState,
};

fn client_for(camera: &FakeCamera) -> PtzClient {
    PtzClient::new(PtzClientConfig {
        host: camera.host(),
        user: "admin".into(),
        password: "secret".into(),
        ..PtzClientConfig::default()
    })
}

#[test]
fn unauthorized_response_is_classified_and_queue_keeps_draining() {
    // First request is refused without a challenge, everything after succeeds.
    let camera = FakeCamera::start(|_, index| {
        if index == 0 {
            Reply::status(401)
        } else {
            Reply::status(200)
        }
    });

    let mut controller = PtzController::new(client_for(&camera));
    assert_eq!(
        controller.handle("a a 90 0 1".parse().unwrap()),
        Handled::Actuated(PtzResponse::Unauthorized)
    );
    assert_eq!(
        controller.handle("a c 10 0 0".parse().unwrap()),
        Handled::Actuated(PtzResponse::Ok)
    );
    assert_eq!(controller.failures(), 1);

    let requests = camera.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path, ABSOLUTE_PATH);
    assert!(requests[0].body.contains("<azimuth>900</azimuth>"));
    assert_eq!(requests[1].path, CONTINUOUS_PATH);
    assert!(requests[1].body.contains("<pan>10</pan>"));
}

#[test]
fn controller_loop_survives_failures_and_halts_on_stop() {
    let camera = FakeCamera::start(|_, index| match index {
        0 => Reply::status(404),
        1 => Reply::status(403),
        _ => Reply::status(200),
    });
    let shared = SharedState::new();
    let (tx, rx) = command_channel();
    let controller = PtzController::new(client_for(&camera));
    let handle = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || controller.run(rx, shared))
    };

    for line in ["a a 10 0 1", "a c -34 34 0", "m on", "a c 1 1 0", "m c 5 0 0"] {
        assert!(tx.send(line.parse().unwrap(), &shared).unwrap());
    }
    assert!(tx.send(ControlMessage::Stop, &shared).unwrap());
    handle.join().unwrap();

    let requests = camera.requests();
    let bodies: Vec<&str> = requests.iter().map(|r| r.body.as_str()).collect();
    assert_eq!(bodies.len(), 4, "auto command in manual mode must be dropped");
    assert!(bodies[0].contains("<azimuth>100</azimuth>"));
    assert!(bodies[1].contains("<tilt>34</tilt>"));
    assert!(bodies[2].contains("<pan>5</pan>"));
    assert!(bodies[3].contains("<pan>0</pan>") && bodies[3].contains("<tilt>0</tilt>"));
}

#[test]
fn digest_challenge_is_answered_and_reused() {
    let camera = FakeCamera::start(|request, _| match &request.authorization {
        Some(auth) if auth.starts_with("Digest ") => Reply::status(200),
        _ => Reply::status(401).with_header(
            "WWW-Authenticate",
            r#"Digest qop="auth", realm="IP Camera", nonce="abc123", stale="FALSE""#,
        ),
    });
    let mut client = client_for(&camera);

    assert_eq!(client.continuous(10.0, 0.0, 0.0), PtzResponse::Ok);
    assert_eq!(client.absolute(45.0, 10.0, 1.0), PtzResponse::Ok);

    let requests = camera.requests();
    assert_eq!(requests.len(), 3, "challenge must only be fetched once");
    assert!(requests[0].authorization.is_none());
    let first = requests[1].authorization.as_deref().unwrap();
    let second = requests[2].authorization.as_deref().unwrap();
    assert!(first.contains(r#"username="admin""#));
    assert!(first.contains(r#"realm="IP Camera""#));
    assert!(first.contains(&format!(r#"uri="{}""#, CONTINUOUS_PATH)));
    assert!(first.contains("nc=00000001"));
    assert!(second.contains(&format!(r#"uri="{}""#, ABSOLUTE_PATH)));
    assert!(second.contains("nc=00000002"));
}

#[test]
fn wrong_credentials_stay_unauthorized() {
    let camera = FakeCamera::start(|_, _| {
        Reply::status(401).with_header("WWW-Authenticate", r#"Digest realm="cam", nonce="n1""#)
    });
    let mut client = client_for(&camera);
    assert_eq!(client.stop(), PtzResponse::Unauthorized);
    assert_eq!(camera.requests().len(), 2);
}

#[test]
fn challenge_round_trip_stays_within_one_request_budget() {
    // Each answer takes most of the budget, so a retry with a fresh full
    // timeout would succeed well past it.
    let camera = FakeCamera::start(|request, _| {
        thread::sleep(Duration::from_millis(180));
        match request.authorization {
            Some(_) => Reply::status(200),
            None => Reply::status(401)
                .with_header("WWW-Authenticate", r#"Digest realm="cam", nonce="slow""#),
        }
    });
    let mut client = client_for(&camera);

    let started = Instant::now();
    let response = client.continuous(10.0, 0.0, 0.0);
    let elapsed = started.elapsed();
    assert_ne!(response, PtzResponse::Ok);
    assert!(elapsed < Duration::from_millis(350), "took {:?}", elapsed);
}

#[test]
fn silent_camera_does_not_stall_the_caller() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hold connections open without ever answering.
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });

    let mut client = PtzClient::new(PtzClientConfig {
        host: addr.to_string(),
        ..PtzClientConfig::default()
    });
    let started = Instant::now();
    let response = client.continuous(34.0, 0.0, 0.0);
    assert!(
        matches!(
            response,
            PtzResponse::Timeout | PtzResponse::ConnectionError
        ),
        "got {:?}",
        response
    );
    assert!(started.elapsed() < Duration::from_secs(2));
}
