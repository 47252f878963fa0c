use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use geo::LineString;
use tokio::sync::oneshot;

use nav_session_types::{CityId, Coordinate, Endpoint, ManeuverCategory, Maneuver, Waypoint};

use crate::*;

// Matches the request coordinates used throughout
const ORIGIN: Coordinate = Coordinate {
    lat: -34.60,
    lng: -58.40,
};
const DESTINATION: Coordinate = Coordinate {
    lat: -34.56,
    lng: -58.45,
};

#[tokio::test(start_paused = true)]
async fn test_latest_request_wins() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut routing = RouteSessionController::new(provider.clone(), "driving", "en");

    let t1 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    let t2 = routing.request_route(ORIGIN.into(), Waypoint::new(-34.62, -58.44));
    let t3 = routing.request_route(Waypoint::new(-34.57, -58.42), Waypoint::new(-34.62, -58.44));
    assert!(t1 < t2 && t2 < t3);

    // Answer out of order; only the last one counts
    provider.respond(t3, Ok(provider_route(3)));
    provider.respond(t1, Ok(provider_route(5)));
    provider.respond(t2, Ok(provider_route(4)));

    match routing.next_outcome().await {
        Some(RouteEvent::Ready { token, route }) => {
            assert_eq!(token, t3);
            assert_eq!(route.maneuvers.len(), 3);
        }
        x => panic!("unexpected {:?}", x),
    }
    let applied = routing.applied().unwrap();
    assert_eq!(applied.token, t3);
    assert_eq!(applied.overlay.origin, Waypoint::new(-34.57, -58.42));

    assert!(!routing.is_pending());
    assert!(routing.next_outcome().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_buffered_stale_result_is_skipped() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut routing = RouteSessionController::new(provider.clone(), "driving", "en");

    let t1 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    provider.respond(t1, Ok(provider_route(2)));
    // Let the first result land in the channel before anyone reads it
    settle().await;

    let t2 = routing.request_route(ORIGIN.into(), Waypoint::new(-34.62, -58.44));
    provider.respond(t2, Err(RoutingError::NoRoute));

    match routing.next_outcome().await {
        Some(RouteEvent::Failed { token, error }) => {
            assert_eq!(token, t2);
            assert_eq!(error, RoutingError::NoRoute);
        }
        x => panic!("unexpected {:?}", x),
    }
    assert!(routing.applied().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_every_request_released_once() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut routing = RouteSessionController::new(provider.clone(), "driving", "en");

    let t1 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    let t2 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    // Superseding releases right away
    assert_eq!(provider.releases(), vec![t1]);

    provider.respond(t2, Ok(provider_route(2)));
    routing.next_outcome().await.unwrap();
    assert_eq!(provider.releases(), vec![t1, t2]);

    let t3 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    routing.cancel();
    routing.cancel();
    let t4 = routing.request_route(ORIGIN.into(), DESTINATION.into());
    drop(routing);
    settle().await;

    assert_eq!(provider.releases(), vec![t1, t2, t3, t4]);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_a_new_route_narrates_first_step() {
    let (mut session, provider, engine) = new_session(SessionConfig::default());
    session.set_voice_enabled(true).unwrap();

    session.toggle_selection(Endpoint::Origin);
    // Only one endpoint is known, so nothing to route yet
    assert_eq!(session.on_map_click(ORIGIN), None);
    session.toggle_selection(Endpoint::Destination);
    let token = session.on_map_click(DESTINATION).unwrap();

    provider.respond(token, Ok(scenario_a()));
    match session.next_event().await {
        Some(SessionEvent::RouteReady { route, step_reset }) => {
            assert!(step_reset);
            assert_eq!(route.total_distance_meters, 5320.0);
            assert_eq!(route.total_time_seconds, 640.0);
            assert_eq!(route.maneuvers.len(), 3);
        }
        x => panic!("unexpected {:?}", x),
    }
    assert_eq!(session.navigation().step_index(), Some(0));
    assert_eq!(provider.requests()[0].waypoints, [ORIGIN, DESTINATION]);

    settle_for(5).await;
    assert_eq!(
        engine.finished(),
        vec!["Head northwest on Avenida Santa Fe in 1.2 kilometers"]
    );

    // A short final step gets no distance suffix
    assert!(session.advance());
    assert!(session.advance());
    assert!(!session.advance());
    settle_for(5).await;
    assert_eq!(
        engine.finished().last().unwrap(),
        "You have arrived at your destination"
    );

    let overlay = session.overlay_geojson().unwrap();
    assert_eq!(overlay.features.len(), 3);
    assert_eq!(
        overlay.features[0].property("type"),
        Some(&serde_json::json!("route"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_same_maneuver_count_keeps_step() {
    let (mut session, provider, _) = new_session(SessionConfig::default());
    let token = route_between_cities(&mut session, "palermo", "caballito").unwrap();
    provider.respond(token, Ok(provider_route(4)));
    session.next_event().await.unwrap();
    session.advance();
    session.advance();

    // The same pair again, with the same number of maneuvers
    let token = session.refresh_route().unwrap();
    assert!(session.navigation().is_active());
    provider.respond(token, Ok(provider_route(4)));
    match session.next_event().await {
        Some(SessionEvent::RouteReady { step_reset, .. }) => assert!(!step_reset),
        x => panic!("unexpected {:?}", x),
    }
    assert_eq!(session.navigation().step_index(), Some(2));

    // A different count starts over
    let token = session.refresh_route().unwrap();
    provider.respond(token, Ok(provider_route(6)));
    match session.next_event().await {
        Some(SessionEvent::RouteReady { step_reset, .. }) => assert!(step_reset),
        x => panic!("unexpected {:?}", x),
    }
    assert_eq!(session.navigation().step_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_new_pair_drops_route_before_it_resolves() {
    let (mut session, provider, _) = new_session(SessionConfig::default());
    let token = route_between_cities(&mut session, "palermo", "caballito").unwrap();
    provider.respond(token, Ok(provider_route(4)));
    session.next_event().await.unwrap();
    assert!(session.overlay_geojson().is_some());

    let token = session
        .select_city(Endpoint::Destination, CityId("belgrano".to_string()))
        .unwrap()
        .unwrap();
    assert!(!session.navigation().is_active());
    assert!(session.overlay_geojson().is_none());
    assert_eq!(
        session.current_maneuver(),
        Err(NavigationError::NoActiveRoute)
    );

    // Even with the same maneuver count, a new pair starts from the beginning
    provider.respond(token, Ok(provider_route(4)));
    match session.next_event().await {
        Some(SessionEvent::RouteReady { step_reset, .. }) => assert!(step_reset),
        x => panic!("unexpected {:?}", x),
    }

    // Clearing an endpoint leaves nothing to route
    session.clear_endpoint(Endpoint::Origin);
    assert!(!session.navigation().is_active());
    assert!(!session.routing().is_pending());
    assert!(session.next_event().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_route_keeps_state() {
    let (mut session, provider, _) = new_session(SessionConfig::default());
    let token = route_between_cities(&mut session, "palermo", "caballito").unwrap();
    provider.respond(token, Ok(provider_route(3)));
    session.next_event().await.unwrap();
    session.advance();

    let token = session.refresh_route().unwrap();
    provider.respond(token, Err(RoutingError::Network("offline".to_string())));
    match session.next_event().await {
        Some(SessionEvent::RouteFailed(err)) => {
            assert_eq!(
                err.to_string(),
                "couldn't reach the routing service: offline"
            );
        }
        x => panic!("unexpected {:?}", x),
    }
    assert_eq!(session.navigation().step_index(), Some(1));
    assert!(session.overlay_geojson().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_city() {
    let (mut session, _, _) = new_session(SessionConfig::default());
    assert!(matches!(
        session.select_city(Endpoint::Origin, CityId("atlantis".to_string())),
        Err(CatalogError::UnknownCity(_))
    ));
    assert_eq!(
        session.selection().selector(Endpoint::Origin),
        &EndpointSelector::Unset
    );
}

#[tokio::test(start_paused = true)]
async fn test_manual_routing_waits_for_refresh() {
    let mut config = SessionConfig::default();
    config.auto_route = false;
    let (mut session, provider, _) = new_session(config);
    assert_eq!(route_between_cities(&mut session, "palermo", "recoleta"), None);
    assert!(provider.requests().is_empty());
    assert!(session.refresh_route().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_clearing_endpoint_drops_manual_route() {
    let mut config = SessionConfig::default();
    config.auto_route = false;
    let (mut session, provider, _) = new_session(config);
    route_between_cities(&mut session, "palermo", "recoleta");
    let token = session.refresh_route().unwrap();
    provider.respond(token, Ok(provider_route(2)));
    assert!(matches!(
        session.next_event().await,
        Some(SessionEvent::RouteReady { .. })
    ));
    assert!(session.overlay_geojson().is_some());

    session.clear_endpoint(Endpoint::Destination);
    assert!(session.route().is_none());
    assert!(session.overlay_geojson().is_none());
    assert!(!session.routing().is_pending());
    assert_eq!(
        session.current_maneuver(),
        Err(NavigationError::NoActiveRoute)
    );
    settle().await;
    assert_eq!(provider.requests().len(), 1);
}

#[test]
fn test_clear_selection_keeps_endpoints() {
    let (mut session, _, _) = new_session(SessionConfig::default());
    session.toggle_selection(Endpoint::Destination);
    session.clear_selection();
    assert_eq!(session.selection().pending(), None);
    assert_eq!(session.on_map_click(DESTINATION), None);
    assert_eq!(
        session.selection().selector(Endpoint::Destination),
        &EndpointSelector::Unset
    );
}

#[test]
fn test_scenario_b_toggle_twice() {
    let (mut session, _, _) = new_session(SessionConfig::default());
    session.toggle_selection(Endpoint::Origin);
    assert_eq!(session.toggle_selection(Endpoint::Origin), None);
    assert_eq!(session.selection().pending(), None);
    assert_eq!(session.selection().staged_marker(), None);
}

#[tokio::test(start_paused = true)]
async fn test_speak_twice_within_settle_window() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    narrator.set_enabled(true).unwrap();

    let first = narrator.speak("first").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = narrator.speak("second").unwrap();

    assert_eq!(first.finished().await, NarrationOutcome::Interrupted);
    assert_eq!(second.finished().await, NarrationOutcome::Completed);
    assert_eq!(engine.started(), vec!["second"]);
    assert_eq!(engine.finished(), vec!["second"]);
    assert_eq!(narrator.active_utterance(), None);
}

#[tokio::test(start_paused = true)]
async fn test_speak_preempts_playing_utterance() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(3)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    narrator.set_enabled(true).unwrap();

    let first = narrator.speak("first").unwrap();
    settle_for(1).await;
    let playing = narrator.active_utterance().unwrap();
    let second = narrator.speak("second").unwrap();
    // The old utterance gives up the slot immediately
    assert_ne!(narrator.active_utterance(), Some(playing));

    assert_eq!(first.finished().await, NarrationOutcome::Interrupted);
    assert_eq!(second.finished().await, NarrationOutcome::Completed);
    assert_eq!(engine.started(), vec!["first", "second"]);
    assert_eq!(engine.finished(), vec!["second"]);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_disable_mid_sequence() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    narrator.set_enabled(true).unwrap();

    let maneuvers: Vec<Maneuver> = (0..5).map(|i| maneuver(&format!("step {i}"), 100.0)).collect();
    let narration = narrator.speak_sequence(&maneuvers).unwrap();

    // With a 100ms settle, 1s per utterance and 500ms pauses, the third maneuver plays from 4.6s
    // to 5.6s
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(narrator.active_utterance().is_some());
    narrator.set_enabled(false).unwrap();
    assert_eq!(narrator.active_utterance(), None);

    assert_eq!(narration.finished().await, NarrationOutcome::Interrupted);
    settle_for(20).await;
    assert_eq!(
        engine.started(),
        vec![
            "Starting navigation",
            "step 0 in 100 meters",
            "step 1 in 100 meters",
            "step 2 in 100 meters"
        ]
    );
    assert_eq!(engine.finished().len(), 3);
    assert!(engine.cancels() >= 2);

    // Turning it back on doesn't pick the sequence up again
    narrator.set_enabled(true).unwrap();
    settle_for(20).await;
    assert_eq!(engine.started().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_full_sequence() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_millis(200)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "es-AR");
    narrator.set_enabled(true).unwrap();

    let narration = narrator
        .speak_sequence(&[maneuver("Derecha", 40.0), maneuver("Izquierda", 2500.0)])
        .unwrap();
    assert_eq!(narration.finished().await, NarrationOutcome::Completed);
    assert_eq!(
        engine.finished(),
        vec![
            "Iniciando navegación",
            "Derecha",
            "Izquierda en 2.5 kilómetros",
            "Ha llegado a su destino"
        ]
    );
}

#[test]
fn test_distance_mentioned_only_past_50_meters() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let narrator = VoiceNarrator::new(engine, NarrationConfig::default(), "en-US");
    assert_eq!(narrator.announce(&maneuver("Turn left", 50.0)), "Turn left");
    assert_eq!(
        narrator.announce(&maneuver("Turn left", 50.1)),
        "Turn left in 50 meters"
    );
}

#[test]
fn test_pause_and_resume_reach_engine() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    narrator.pause();
    narrator.pause();
    narrator.resume();
    assert_eq!(engine.pauses(), (2, 1));
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_queueing_plays_nothing() {
    let engine = Arc::new(StopsWhileQueueing::default());
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    let _ = engine.narrator.set(narrator.clone());
    narrator.set_enabled(true).unwrap();

    // Repeated, since a fair select would pick the finished utterance about half the time
    for _ in 0..20 {
        let narration = narrator.speak("hello").unwrap();
        assert_eq!(narration.finished().await, NarrationOutcome::Interrupted);
    }
    assert_eq!(*engine.spoken.lock().unwrap(), 0);
    assert_eq!(narrator.active_utterance(), None);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_narrator_is_silent() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    assert!(!narrator.is_enabled());
    assert!(narrator.speak("hello").is_none());
    assert!(narrator.speak_sequence(&[maneuver("Left", 10.0)]).is_none());
    settle_for(5).await;
    assert!(engine.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_engine_failure_is_swallowed() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_millis(500)));
    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "en-US");
    narrator.set_enabled(true).unwrap();

    let broken = narrator.speak("boom").unwrap();
    assert_eq!(broken.finished().await, NarrationOutcome::Failed);
    assert_eq!(narrator.active_utterance(), None);

    let fine = narrator.speak("fine").unwrap();
    assert_eq!(fine.finished().await, NarrationOutcome::Completed);
    assert_eq!(engine.finished(), vec!["fine"]);
}

#[tokio::test(start_paused = true)]
async fn test_voice_matches_language() {
    let mut engine = RecordingEngine::new(Duration::from_millis(10));
    engine.voices = vec![
        Voice {
            name: "Samantha".to_string(),
            lang: "en-US".to_string(),
        },
        Voice {
            name: "Paulina".to_string(),
            lang: "es_MX".to_string(),
        },
    ];
    let engine = Arc::new(engine);

    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "es-ES");
    narrator.set_enabled(true).unwrap();
    narrator.speak("hola").unwrap().finished().await;

    let narrator = VoiceNarrator::new(engine.clone(), NarrationConfig::default(), "fr-FR");
    narrator.set_enabled(true).unwrap();
    narrator.speak("bonjour").unwrap().finished().await;

    let utterances = engine.utterances();
    assert_eq!(utterances[0].voice.as_ref().unwrap().name, "Paulina");
    assert_eq!(utterances[0].lang, "es-ES");
    assert_eq!(
        (utterances[0].rate, utterances[0].pitch, utterances[0].volume),
        (1.0, 1.0, 1.0)
    );
    assert_eq!(utterances[1].voice, None);
}

#[test]
fn test_unsupported_engine_stays_disabled() {
    let mut engine = RecordingEngine::new(Duration::from_secs(1));
    engine.supported = false;
    let narrator = VoiceNarrator::new(Arc::new(engine), NarrationConfig::default(), "en-US");
    assert_eq!(narrator.set_enabled(true), Err(NarrationError::Unsupported));
    assert!(!narrator.is_enabled());
    assert_eq!(narrator.set_enabled(false), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_denied_location_keeps_origin() {
    let (mut session, provider, _) = new_session_at(Err(GeoError::PermissionDenied));
    // A manual coordinate is remembered, but the picker shows a city
    session.toggle_selection(Endpoint::Origin);
    session.on_map_click(Coordinate::new(-34.61, -58.41));
    session
        .select_city(Endpoint::Origin, CityId("palermo".to_string()))
        .unwrap();
    let before = session.selection().clone();

    let err = session.locate_origin().await.unwrap_err();
    assert_eq!(err, GeoError::PermissionDenied);
    assert_eq!(err.to_string(), "permission to use your location was denied");
    assert_eq!(session.selection(), &before);
    assert_eq!(
        session.selection().manual(Endpoint::Origin),
        Some(&Waypoint::new(-34.61, -58.41))
    );
    assert!(provider.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_located_origin_becomes_manual() {
    let (mut session, provider, _) = new_session_at(Ok(ORIGIN));
    session
        .select_city(Endpoint::Destination, CityId("belgrano".to_string()))
        .unwrap();

    let token = session.locate_origin().await.unwrap().unwrap();
    assert_eq!(
        session.selection().selector(Endpoint::Origin),
        &EndpointSelector::Manual
    );
    assert_eq!(session.resolve(Endpoint::Origin), Some(Waypoint::from(ORIGIN)));
    settle().await;
    let request = provider.requests().pop().unwrap();
    assert_eq!(request.token, token);
    assert_eq!(request.waypoints[0], ORIGIN);
}

#[tokio::test(start_paused = true)]
async fn test_geolocation_timeout() {
    let acquirer = GeolocationAcquirer::new(
        Some(Arc::new(SlowPosition(Duration::from_secs(60)))),
        PositionOptions::default(),
    );
    assert_eq!(acquirer.acquire().await, Some(Err(GeoError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn test_geolocation_unsupported() {
    assert_eq!(
        GeolocationAcquirer::unsupported().acquire().await,
        Some(Err(GeoError::Unsupported))
    );

    let acquirer = GeolocationAcquirer::new(
        Some(Arc::new(NoPositionCapability)),
        PositionOptions::default(),
    );
    assert_eq!(acquirer.acquire().await, Some(Err(GeoError::Unsupported)));
}

#[tokio::test(start_paused = true)]
async fn test_late_position_after_teardown_is_dropped() {
    let acquirer = GeolocationAcquirer::new(
        Some(Arc::new(SlowPosition(Duration::from_secs(2)))),
        PositionOptions::default(),
    );
    let query = acquirer.clone();
    let task = tokio::spawn(async move { query.acquire().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    acquirer.teardown();
    assert_eq!(task.await.unwrap(), None);
    assert_eq!(acquirer.acquire().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown() {
    let (mut session, provider, _) = new_session(SessionConfig::default());
    let token = route_between_cities(&mut session, "palermo", "caballito").unwrap();
    session.shutdown();
    settle().await;
    assert_eq!(provider.releases(), vec![token]);
    assert!(session.next_event().await.is_none());
    assert_eq!(session.locate_origin().await, Err(GeoError::Unsupported));
}

fn new_session(
    config: SessionConfig,
) -> (NavigationSession, Arc<ScriptedProvider>, Arc<RecordingEngine>) {
    let provider = Arc::new(ScriptedProvider::default());
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let session = NavigationSession::new(
        config,
        CityCatalog::default_branches(),
        provider.clone(),
        engine.clone(),
        None,
    );
    (session, provider, engine)
}

fn new_session_at(
    position: Result<Coordinate, GeoError>,
) -> (NavigationSession, Arc<ScriptedProvider>, Arc<RecordingEngine>) {
    let provider = Arc::new(ScriptedProvider::default());
    let engine = Arc::new(RecordingEngine::new(Duration::from_secs(1)));
    let session = NavigationSession::new(
        SessionConfig::default(),
        CityCatalog::default_branches(),
        provider.clone(),
        engine.clone(),
        Some(Arc::new(FixedPosition(position))),
    );
    (session, provider, engine)
}

fn route_between_cities(
    session: &mut NavigationSession,
    from: &str,
    to: &str,
) -> Option<RequestToken> {
    session
        .select_city(Endpoint::Origin, CityId(from.to_string()))
        .unwrap();
    session
        .select_city(Endpoint::Destination, CityId(to.to_string()))
        .unwrap()
}

/// Lets every spawned task run until it blocks
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn settle_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

fn maneuver(text: &str, distance_meters: f64) -> Maneuver {
    Maneuver {
        text: text.to_string(),
        distance_meters,
        time_seconds: distance_meters / 10.0,
        direction: "N".to_string(),
        category: ManeuverCategory::Straight,
    }
}

fn provider_route(count: usize) -> ProviderRoute {
    ProviderRoute {
        total_distance_meters: 100.0 * count as f64,
        total_time_seconds: 10.0 * count as f64,
        polyline: LineString::from(vec![
            (ORIGIN.lng, ORIGIN.lat),
            (DESTINATION.lng, DESTINATION.lat),
        ]),
        maneuvers: (0..count)
            .map(|i| ProviderManeuver {
                text: format!("step {i}"),
                distance_meters: 100.0,
                time_seconds: 10.0,
                direction: "N".to_string(),
                kind: "Straight".to_string(),
            })
            .collect(),
    }
}

fn scenario_a() -> ProviderRoute {
    let step = |text: &str, distance_meters, time_seconds, direction: &str, kind: &str| {
        ProviderManeuver {
            text: text.to_string(),
            distance_meters,
            time_seconds,
            direction: direction.to_string(),
            kind: kind.to_string(),
        }
    };
    ProviderRoute {
        total_distance_meters: 5320.0,
        total_time_seconds: 640.0,
        polyline: LineString::from(vec![
            (-58.40, -34.60),
            (-58.42, -34.58),
            (-58.45, -34.56),
        ]),
        maneuvers: vec![
            step("Head northwest on Avenida Santa Fe ", 1200.0, 150.0, "NW", "Head"),
            step("Left onto Avenida Cabildo", 4120.0, 490.0, "W", "Left"),
            step(
                "You have arrived at your destination",
                0.0,
                0.0,
                "N",
                "DestinationReached",
            ),
        ],
    }
}

type Reply = Result<ProviderRoute, RoutingError>;
type Ends = (Option<oneshot::Sender<Reply>>, Option<oneshot::Receiver<Reply>>);

/// Answers each request only when the test says so, in any order.
#[derive(Default)]
struct ScriptedProvider {
    script: Mutex<Script>,
}

#[derive(Default)]
struct Script {
    // Either side may show up first, so both ends are created by whoever does
    channels: HashMap<RequestToken, Ends>,
    requests: Vec<RouteRequest>,
    releases: Vec<RequestToken>,
}

impl ScriptedProvider {
    fn respond(&self, token: RequestToken, reply: Reply) {
        let mut script = self.script.lock().unwrap();
        if let Some(tx) = channel(&mut script, token).0.take() {
            let _ = tx.send(reply);
        }
    }

    fn requests(&self) -> Vec<RouteRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    fn releases(&self) -> Vec<RequestToken> {
        self.script.lock().unwrap().releases.clone()
    }
}

fn channel(
    script: &mut Script,
    token: RequestToken,
) -> &mut Ends {
    script.channels.entry(token).or_insert_with(|| {
        let (tx, rx) = oneshot::channel();
        (Some(tx), Some(rx))
    })
}

#[async_trait]
impl RoutingProvider for ScriptedProvider {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, RoutingError> {
        let rx = {
            let mut script = self.script.lock().unwrap();
            script.requests.push(request.clone());
            channel(&mut script, request.token).1.take()
        };
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RoutingError::Network("never answered".to_string()))),
            None => Err(RoutingError::Network("asked twice".to_string())),
        }
    }

    fn release(&self, token: RequestToken) {
        self.script.lock().unwrap().releases.push(token);
    }
}

/// Plays every utterance for a fixed time and remembers what happened.
struct RecordingEngine {
    supported: bool,
    voices: Vec<Voice>,
    playback: Duration,
    log: Mutex<EngineLog>,
}

#[derive(Default)]
struct EngineLog {
    started: Vec<Utterance>,
    finished: Vec<String>,
    cancels: usize,
    pauses: usize,
    resumes: usize,
}

impl RecordingEngine {
    fn new(playback: Duration) -> Self {
        Self {
            supported: true,
            voices: Vec::new(),
            playback,
            log: Mutex::new(EngineLog::default()),
        }
    }

    fn utterances(&self) -> Vec<Utterance> {
        self.log.lock().unwrap().started.clone()
    }

    fn started(&self) -> Vec<String> {
        self.utterances().into_iter().map(|u| u.text).collect()
    }

    fn finished(&self) -> Vec<String> {
        self.log.lock().unwrap().finished.clone()
    }

    fn cancels(&self) -> usize {
        self.log.lock().unwrap().cancels
    }

    fn pauses(&self) -> (usize, usize) {
        let log = self.log.lock().unwrap();
        (log.pauses, log.resumes)
    }
}

#[async_trait]
impl SpeechEngine for RecordingEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), NarrationError> {
        let text = utterance.text.clone();
        self.log.lock().unwrap().started.push(utterance);
        tokio::time::sleep(self.playback).await;
        if text == "boom" {
            return Err(NarrationError::Engine("audio device lost".to_string()));
        }
        // Only reached if nobody stopped waiting on this utterance
        self.log.lock().unwrap().finished.push(text);
        Ok(())
    }

    fn cancel_all(&self) {
        self.log.lock().unwrap().cancels += 1;
    }

    fn pause(&self) {
        self.log.lock().unwrap().pauses += 1;
    }

    fn resume(&self) {
        self.log.lock().unwrap().resumes += 1;
    }
}

/// Stops its own narrator while the utterance is being prepared, then finishes instantly.
#[derive(Default)]
struct StopsWhileQueueing {
    narrator: OnceLock<VoiceNarrator>,
    spoken: Mutex<usize>,
}

#[async_trait]
impl SpeechEngine for StopsWhileQueueing {
    fn voices(&self) -> Vec<Voice> {
        if let Some(narrator) = self.narrator.get() {
            narrator.stop();
        }
        Vec::new()
    }

    async fn speak(&self, _: Utterance) -> Result<(), NarrationError> {
        *self.spoken.lock().unwrap() += 1;
        Ok(())
    }

    fn cancel_all(&self) {}
}

struct FixedPosition(Result<Coordinate, GeoError>);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, GeoError> {
        assert!(options.high_accuracy);
        assert_eq!(options.max_cache_age, Duration::ZERO);
        self.0
    }
}

struct SlowPosition(Duration);

#[async_trait]
impl PositionSource for SlowPosition {
    async fn current_position(&self, _: PositionOptions) -> Result<Coordinate, GeoError> {
        tokio::time::sleep(self.0).await;
        Ok(ORIGIN)
    }
}

struct NoPositionCapability;

#[async_trait]
impl PositionSource for NoPositionCapability {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self, _: PositionOptions) -> Result<Coordinate, GeoError> {
        Err(GeoError::Unknown)
    }
}
