//! End-to-end tests against an in-process mock bridge.
//!
//! The tests play the server side of the protocol: accept the client's
//! websocket, read the frames it sends, and answer the way a rosbridge
//! would.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use roslink::{
    ActionClient, Client, ClientConfig, ClientError, ConnectionState, Goal, RosApi, SessionEvent,
    StaticIpResolver,
};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

const TIMEOUT: Duration = Duration::from_secs(2);

type ServerWs = WebSocketStream<TcpStream>;

struct MockBridge {
    listener: TcpListener,
    url: String,
}

impl MockBridge {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        Self { listener, url }
    }

    /// Accept the next client connection and finish the handshake.
    async fn accept(&self) -> ServerWs {
        let (stream, _) = timeout(TIMEOUT, self.listener.accept())
            .await
            .expect("timeout waiting for a connection")
            .unwrap();
        accept_async(stream).await.unwrap()
    }

    /// Assert that nothing tries to connect within `window`.
    async fn expect_no_connection(&self, window: Duration) {
        assert!(
            timeout(window, self.listener.accept()).await.is_err(),
            "unexpected reconnect attempt"
        );
    }
}

/// Connect a client to the bridge and accept its socket.
async fn connect_pair(bridge: &MockBridge) -> (Client, ServerWs) {
    connect_pair_with(bridge, ClientConfig::new(&bridge.url)).await
}

async fn connect_pair_with(bridge: &MockBridge, config: ClientConfig) -> (Client, ServerWs) {
    let (client, ws) = tokio::join!(Client::with_config(config), bridge.accept());
    (client.expect("client failed to connect"), ws)
}

/// Read the next text frame as JSON.
async fn read_frame(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => {}
        }
    }
}

/// Raw text of the next text frame.
async fn read_text(ws: &mut ServerWs) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

/// Skip to the close frame and return its code.
async fn read_close(ws: &mut ServerWs) -> Option<u16> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("socket ended without a close frame")
            .expect("socket error");
        match msg {
            Message::Close(frame) => return frame.map(|f| u16::from(f.code)),
            Message::Text(text) => panic!("expected close, got: {text}"),
            _ => {}
        }
    }
}

/// Send a JSON frame to the client.
async fn send_frame(ws: &mut ServerWs, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Close the socket with an explicit code, as the bridge would.
async fn send_close(mut ws: ServerWs, code: u16, reason: &str) {
    let _ = ws
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        })))
        .await;
    // Drain the client's close reply so the frame flushes before the
    // socket drops.
    let _ = timeout(Duration::from_millis(200), ws.next()).await;
}

/// Assert no text frame arrives within `window`.
async fn expect_quiet(ws: &mut ServerWs, window: Duration) {
    match timeout(window, ws.next()).await {
        Err(_) | Ok(None) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {text}"),
        Ok(Some(_)) => {}
    }
}

/// Wait for a session event matching `want`, skipping the rest.
async fn wait_for_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut want: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if want(&event) => return event,
                Ok(_) => {}
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .expect("timeout waiting for a session event")
}

// ── Topics ──

#[tokio::test]
async fn e2e_subscribe_dedups_wire_registrations() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let mut first = client
        .subscribe("/scan", "sensor_msgs/LaserScan")
        .await
        .unwrap();
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "subscribe");
    assert_eq!(frame["topic"], "/scan");
    assert_eq!(frame["type"], "sensor_msgs/LaserScan");
    let wire_id = frame["id"].as_str().unwrap().to_string();
    assert!(wire_id.starts_with("subscribe:/scan:"));

    // Second listener rides the existing registration.
    let mut second = client
        .subscribe("/scan", "sensor_msgs/LaserScan")
        .await
        .unwrap();
    expect_quiet(&mut ws, Duration::from_millis(150)).await;

    send_frame(
        &mut ws,
        &json!({"op": "publish", "topic": "/scan", "msg": {"ranges": [1.5]}}),
    )
    .await;

    let delivery = timeout(TIMEOUT, first.next()).await.unwrap().unwrap();
    assert_eq!(delivery.topic, "/scan");
    assert_eq!(delivery.msg["ranges"][0], 1.5);
    let delivery = timeout(TIMEOUT, second.next()).await.unwrap().unwrap();
    assert_eq!(delivery.msg["ranges"][0], 1.5);

    // Dropping one listener leaves the wire registration alone; the last
    // one out releases it with the original id.
    drop(second);
    expect_quiet(&mut ws, Duration::from_millis(150)).await;

    drop(first);
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "unsubscribe");
    assert_eq!(frame["topic"], "/scan");
    assert_eq!(frame["id"], wire_id.as_str());

    client.close().await;
}

#[tokio::test]
async fn e2e_publish_uses_a_stable_frame_id() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let publisher = client
        .advertise("/cmd_vel", "geometry_msgs/Twist")
        .await
        .unwrap();
    let adv = read_frame(&mut ws).await;
    assert_eq!(adv["op"], "advertise");
    assert_eq!(adv["type"], "geometry_msgs/Twist");
    assert_eq!(adv["latch"], false);
    assert_eq!(adv["queue_size"], 100);

    publisher
        .publish(json!({"linear": {"x": 0.5}}))
        .await
        .unwrap();
    let first = read_frame(&mut ws).await;
    assert_eq!(first["op"], "publish");
    assert_eq!(first["topic"], "/cmd_vel");
    assert_eq!(first["msg"]["linear"]["x"], 0.5);
    let publish_id = first["id"].as_str().unwrap().to_string();
    assert!(publish_id.starts_with("publish:/cmd_vel:"));

    publisher
        .publish(json!({"linear": {"x": 0.0}}))
        .await
        .unwrap();
    let second = read_frame(&mut ws).await;
    assert_eq!(second["id"], publish_id.as_str());

    drop(publisher);
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "unadvertise");
    assert_eq!(frame["topic"], "/cmd_vel");

    client.close().await;
}

// ── Services ──

#[tokio::test]
async fn e2e_service_calls_resolve_by_correlation_id() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .call_service("/add_two_ints", json!({"a": 2, "b": 3}))
                .await
        }
    });

    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "call_service");
    assert_eq!(frame["service"], "/add_two_ints");
    assert_eq!(frame["args"]["a"], 2);
    let id = frame["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("service_client:/add_two_ints:"));

    // A response with an unknown id is dropped without killing anything.
    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/add_two_ints",
            "id": "service_client:/add_two_ints:9999",
            "result": true, "values": {"sum": 99}
        }),
    )
    .await;

    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/add_two_ints",
            "id": id, "result": true, "values": {"sum": 5}
        }),
    )
    .await;

    let reply = call.await.unwrap().unwrap();
    assert!(reply.result);
    assert_eq!(reply.values["sum"], 5);

    client.close().await;
}

#[tokio::test]
async fn e2e_unanswered_calls_time_out() {
    let bridge = MockBridge::start().await;
    let mut config = ClientConfig::new(&bridge.url);
    config.call_timeout_ms = 100;
    let (client, _ws) = connect_pair_with(&bridge, config).await;

    let err = client
        .call_service("/slow", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));

    client.close().await;
}

#[tokio::test]
async fn e2e_inbound_calls_served_until_handler_drops() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let server = client
        .register_service("/add_two_ints", |args| {
            let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
            (true, json!({"sum": sum}))
        })
        .await
        .unwrap();

    send_frame(
        &mut ws,
        &json!({
            "op": "call_service", "service": "/add_two_ints",
            "id": "caller_1", "args": {"a": 20, "b": 22}
        }),
    )
    .await;

    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "service_response");
    assert_eq!(frame["service"], "/add_two_ints");
    assert_eq!(frame["id"], "caller_1");
    assert_eq!(frame["result"], true);
    assert_eq!(frame["values"]["sum"], 42);

    drop(server);
    // Let the unregister land before the next inbound call.
    tokio::time::sleep(Duration::from_millis(50)).await;

    send_frame(
        &mut ws,
        &json!({
            "op": "call_service", "service": "/add_two_ints",
            "id": "caller_2", "args": {"a": 1, "b": 1}
        }),
    )
    .await;
    expect_quiet(&mut ws, Duration::from_millis(200)).await;

    client.close().await;
}

// ── Raw frames ──

#[tokio::test]
async fn e2e_send_raw_forwards_text_unchanged() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let raw = r#"{"op":"subscribe","id":"custom_7","topic":"/raw","type":"std_msgs/String"}"#;
    client.send_raw(raw).await.unwrap();
    assert_eq!(read_text(&mut ws).await, raw);

    client.close().await;
}

// ── Authentication ──

#[tokio::test]
async fn e2e_auth_frame_and_rejection_are_terminal() {
    let bridge = MockBridge::start().await;
    let mut config = ClientConfig::new(&bridge.url);
    config.reconnect.base_delay_ms = 1;
    config.reconnect.max_delay_ms = 5;
    let (client, mut ws) = connect_pair_with(&bridge, config).await;
    let mut events = client.events();

    let resolver = StaticIpResolver("127.0.0.1".into());
    client
        .authenticate_with_resolver("wrong-secret", &resolver)
        .await
        .unwrap();

    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "auth");
    assert_eq!(frame["mac"].as_str().unwrap().len(), 128);
    assert_eq!(frame["client"], "127.0.0.1");
    assert_eq!(frame["t"], 0);
    assert_eq!(frame["end"], 0);
    assert_eq!(frame["level"], "user");
    assert_eq!(frame["rand"].as_str().unwrap().len(), 32);

    send_close(ws, 1008, "auth rejected").await;

    let event = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::AuthRejected { .. })
    })
    .await;
    let SessionEvent::AuthRejected { reason } = event else {
        unreachable!()
    };
    assert_eq!(reason, "auth rejected");

    timeout(TIMEOUT, client.closed())
        .await
        .expect("session did not terminate");
    assert_eq!(client.state(), ConnectionState::Closed);

    // 1008 is terminal: no reconnect attempt follows.
    bridge.expect_no_connection(Duration::from_millis(200)).await;
}

// ── Reconnection ──

#[tokio::test]
async fn e2e_reconnect_replays_registrations() {
    let bridge = MockBridge::start().await;
    let mut config = ClientConfig::new(&bridge.url);
    config.reconnect.base_delay_ms = 1;
    config.reconnect.max_delay_ms = 10;
    config.reconnect.jitter_factor = 0.0;
    let (client, mut ws) = connect_pair_with(&bridge, config).await;

    let mut scan = client
        .subscribe("/scan", "sensor_msgs/LaserScan")
        .await
        .unwrap();
    let sub_id = read_frame(&mut ws).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let cmd_vel = client
        .advertise("/cmd_vel", "geometry_msgs/Twist")
        .await
        .unwrap();
    let adv_id = read_frame(&mut ws).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut events = client.events();

    // An in-flight call dies with the link.
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_service("/slow", json!({})).await }
    });
    let _ = read_frame(&mut ws).await;

    send_close(ws, 1001, "going away").await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ConnectionLost));

    let event = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Closed { .. })).await;
    let SessionEvent::Closed { code, .. } = event else {
        unreachable!()
    };
    assert_eq!(code, Some(1001));

    // Fresh handshake, registrations replayed with their original ids.
    let mut ws = bridge.accept().await;
    let mut replayed = [read_frame(&mut ws).await, read_frame(&mut ws).await];
    replayed.sort_by_key(|f| f["op"].as_str().unwrap_or_default().to_string());
    assert_eq!(replayed[0]["op"], "advertise");
    assert_eq!(replayed[0]["id"], adv_id.as_str());
    assert_eq!(replayed[1]["op"], "subscribe");
    assert_eq!(replayed[1]["id"], sub_id.as_str());

    let _ = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Opened)).await;

    // The replayed subscription still delivers.
    send_frame(
        &mut ws,
        &json!({"op": "publish", "topic": "/scan", "msg": {"seq": 2}}),
    )
    .await;
    let delivery = timeout(TIMEOUT, scan.next()).await.unwrap().unwrap();
    assert_eq!(delivery.msg["seq"], 2);

    drop(cmd_vel);
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "unadvertise");

    client.close().await;
}

#[tokio::test]
async fn e2e_exhausted_retries_terminate_the_session() {
    let bridge = MockBridge::start().await;
    let mut config = ClientConfig::new(&bridge.url);
    config.reconnect.max_retries = 2;
    config.reconnect.base_delay_ms = 1;
    config.reconnect.max_delay_ms = 5;
    config.reconnect.jitter_factor = 0.0;
    let (client, ws) = connect_pair_with(&bridge, config).await;
    let mut events = client.events();

    // Kill the listener so every retry is refused.
    drop(bridge);
    send_close(ws, 1001, "gone").await;

    timeout(TIMEOUT, client.closed())
        .await
        .expect("session did not terminate");
    assert_eq!(client.state(), ConnectionState::Closed);

    let mut attempts = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Reconnecting { attempt, .. } = event {
            attempts.push(attempt);
        }
    }
    assert_eq!(attempts, [1, 2]);

    // Handles fail fast once the session is gone.
    let err = client
        .subscribe("/x", "std_msgs/String")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

// ── Teardown ──

#[tokio::test]
async fn e2e_close_releases_registrations() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let _scan = client
        .subscribe("/scan", "sensor_msgs/LaserScan")
        .await
        .unwrap();
    let _ = read_frame(&mut ws).await;
    let _cmd_vel = client
        .advertise("/cmd_vel", "geometry_msgs/Twist")
        .await
        .unwrap();
    let _ = read_frame(&mut ws).await;

    client.close().await;

    let mut ops = [
        read_frame(&mut ws).await["op"]
            .as_str()
            .unwrap()
            .to_string(),
        read_frame(&mut ws).await["op"]
            .as_str()
            .unwrap()
            .to_string(),
    ];
    ops.sort();
    assert_eq!(ops, ["unadvertise", "unsubscribe"]);
    assert_eq!(read_close(&mut ws).await, Some(1000));

    assert_eq!(client.state(), ConnectionState::Closed);
    let err = client.call_service("/x", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

// ── Actions ──

#[tokio::test]
async fn e2e_action_goal_lifecycle() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;

    let action = ActionClient::new(&client, "/fibonacci", "actionlib_tutorials/FibonacciAction")
        .await
        .unwrap();
    assert_eq!(action.server(), "/fibonacci");

    // Five registrations: goal/cancel advertises, feedback/result/status
    // subscribes.
    let mut registrations = HashMap::new();
    for _ in 0..5 {
        let frame = read_frame(&mut ws).await;
        let _ = registrations.insert(
            frame["topic"].as_str().unwrap().to_string(),
            (
                frame["op"].as_str().unwrap().to_string(),
                frame["type"].as_str().unwrap().to_string(),
            ),
        );
    }
    let adv = "advertise".to_string();
    let sub = "subscribe".to_string();
    assert_eq!(
        registrations["/fibonacci/goal"],
        (adv.clone(), "actionlib_tutorials/FibonacciActionGoal".to_string())
    );
    assert_eq!(
        registrations["/fibonacci/cancel"],
        (adv, "actionlib_msgs/GoalID".to_string())
    );
    assert_eq!(
        registrations["/fibonacci/feedback"],
        (sub.clone(), "actionlib_tutorials/FibonacciActionFeedback".to_string())
    );
    assert_eq!(
        registrations["/fibonacci/result"],
        (sub.clone(), "actionlib_tutorials/FibonacciActionResult".to_string())
    );
    assert_eq!(
        registrations["/fibonacci/status"],
        (sub, "actionlib_msgs/GoalStatusArray".to_string())
    );

    let (fb_tx, mut fb_rx) = tokio::sync::mpsc::unbounded_channel();
    let (res_tx, mut res_rx) = tokio::sync::mpsc::unbounded_channel();
    let (st_tx, mut st_rx) = tokio::sync::mpsc::unbounded_channel();
    let goal = Goal::new(json!({"order": 5}))
        .on_feedback(move |v| {
            let _ = fb_tx.send(v.clone());
        })
        .on_result(move |v| {
            let _ = res_tx.send(v.clone());
        })
        .on_status(move |v| {
            let _ = st_tx.send(v.clone());
        });

    let goal_id = action.send_goal(goal).await.unwrap();
    assert!(goal_id.starts_with("goal_"));
    assert!(action.is_tracking(&goal_id));

    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "publish");
    assert_eq!(frame["topic"], "/fibonacci/goal");
    assert_eq!(frame["msg"]["goal_id"]["id"], goal_id.as_str());
    assert_eq!(frame["msg"]["goal_id"]["stamp"]["secs"], 0);
    assert_eq!(frame["msg"]["goal"]["order"], 5);

    // Feedback reaches its callback.
    send_frame(
        &mut ws,
        &json!({
            "op": "publish", "topic": "/fibonacci/feedback",
            "msg": {
                "status": {"goal_id": {"id": goal_id.as_str()}, "status": 1},
                "feedback": {"sequence": [0, 1, 1]}
            }
        }),
    )
    .await;
    let fb = timeout(TIMEOUT, fb_rx.recv()).await.unwrap().unwrap();
    assert_eq!(fb["sequence"][2], 1);

    // Preempted status is not terminal.
    send_frame(
        &mut ws,
        &json!({
            "op": "publish", "topic": "/fibonacci/status",
            "msg": {"status_list": [{"goal_id": {"id": goal_id.as_str()}, "status": 2}]}
        }),
    )
    .await;
    let st = timeout(TIMEOUT, st_rx.recv()).await.unwrap().unwrap();
    assert_eq!(st["status"], 2);
    assert!(action.is_tracking(&goal_id));

    // Cancellation publishes on the cancel topic and keeps the goal
    // tracked until its result.
    action.cancel_goal(&goal_id).await.unwrap();
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["topic"], "/fibonacci/cancel");
    assert_eq!(frame["msg"]["id"], goal_id.as_str());
    assert!(action.is_tracking(&goal_id));

    // The result is terminal: callback runs, goal is evicted.
    send_frame(
        &mut ws,
        &json!({
            "op": "publish", "topic": "/fibonacci/result",
            "msg": {
                "status": {"goal_id": {"id": goal_id.as_str()}, "status": 2},
                "result": {"sequence": [0, 1, 1, 2, 3]}
            }
        }),
    )
    .await;
    let result = timeout(TIMEOUT, res_rx.recv()).await.unwrap().unwrap();
    assert_eq!(result["sequence"][4], 3);
    assert!(!action.is_tracking(&goal_id));

    drop(action);
    client.close().await;
}

// ── Introspection facade ──

#[tokio::test]
async fn e2e_rosapi_facade() {
    let bridge = MockBridge::start().await;
    let (client, mut ws) = connect_pair(&bridge).await;
    let api = RosApi::new(client.clone());

    // topics()
    let task = tokio::spawn({
        let api = api.clone();
        async move { api.topics().await }
    });
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["op"], "call_service");
    assert_eq!(frame["service"], "/rosapi/topics");
    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/rosapi/topics",
            "id": frame["id"].clone(), "result": true,
            "values": {"topics": ["/odom", "/tf"], "types": ["nav_msgs/Odometry", "tf2_msgs/TFMessage"]}
        }),
    )
    .await;
    assert_eq!(task.await.unwrap().unwrap(), ["/odom", "/tf"]);

    // get_param() decodes JSON-encoded payloads.
    let task = tokio::spawn({
        let api = api.clone();
        async move { api.get_param("/robot/speed").await }
    });
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["service"], "/rosapi/get_param");
    assert_eq!(frame["args"]["name"], "/robot/speed");
    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/rosapi/get_param",
            "id": frame["id"].clone(), "result": true,
            "values": {"value": "0.75"}
        }),
    )
    .await;
    assert_eq!(task.await.unwrap().unwrap(), json!(0.75));

    // set_param() JSON-encodes the value.
    let task = tokio::spawn({
        let api = api.clone();
        async move { api.set_param("/robot/name", &json!("tbot")).await }
    });
    let frame = read_frame(&mut ws).await;
    assert_eq!(frame["service"], "/rosapi/set_param");
    assert_eq!(frame["args"]["name"], "/robot/name");
    assert_eq!(frame["args"]["value"], "\"tbot\"");
    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/rosapi/set_param",
            "id": frame["id"].clone(), "result": true, "values": {}
        }),
    )
    .await;
    task.await.unwrap().unwrap();

    // result: false surfaces as ServiceFailure.
    let task = tokio::spawn({
        let api = api.clone();
        async move { api.topic_type("/nope").await }
    });
    let frame = read_frame(&mut ws).await;
    send_frame(
        &mut ws,
        &json!({
            "op": "service_response", "service": "/rosapi/topic_type",
            "id": frame["id"].clone(), "result": false,
            "values": {"error": "unknown topic"}
        }),
    )
    .await;
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ServiceFailure { .. }));

    client.close().await;
}
