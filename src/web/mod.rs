use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    coverage::Outcome,
    scenario::Scenario,
    session::{Session, SessionOptions},
    world::WorldSnapshot,
};

#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub snapshot: WorldSnapshot,
    pub water: f32,
    pub lightning_charges: f32,
    pub raining: bool,
    pub outcome: Option<Outcome>,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<Vec<UiFrame>>>,
    total_ticks: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub ticks: u64,
    pub options: SessionOptions,
    pub host: String,
    pub port: u16,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(
    frame: UiFrame,
    latest: &Mutex<Option<UiFrame>>,
    frames: &Mutex<Vec<UiFrame>>,
    tx: &broadcast::Sender<String>,
) {
    *lock(latest) = Some(frame.clone());
    lock(frames).push(frame.clone());
    if let Ok(payload) = serde_json::to_string(&frame) {
        let _ = tx.send(payload);
    }
}

/// Plays the scenario on a blocking worker and serves its frames over HTTP.
pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        ticks,
        options,
        host,
        port,
    } = config;

    let scenario_label = scenario.name.clone();
    let mut session = Session::new(scenario, options)?;

    let (tx, _) = broadcast::channel::<String>(512);
    let latest_frame: Arc<Mutex<Option<UiFrame>>> = Arc::new(Mutex::new(None));
    let frames: Arc<Mutex<Vec<UiFrame>>> = Arc::new(Mutex::new(Vec::new()));
    let simulation_done = Arc::new(AtomicBool::new(false));

    let latest_for_sim = latest_frame.clone();
    let frames_for_sim = frames.clone();
    let done_for_sim = simulation_done.clone();
    let tx_for_sim = tx.clone();

    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        session.run_with_hook(ticks, |_, session| {
            let frame = frame_for(session, false);
            publish(frame, &latest_for_sim, &frames_for_sim, &tx_for_sim);
        })?;

        done_for_sim.store(true, Ordering::SeqCst);

        let final_frame = frame_for(&session, true);
        *lock(&latest_for_sim) = Some(final_frame.clone());
        {
            let mut guard = lock(&frames_for_sim);
            let same_tick = guard
                .last()
                .is_some_and(|last| last.snapshot.tick == final_frame.snapshot.tick);
            if same_tick {
                guard.pop();
            }
            guard.push(final_frame.clone());
        }
        if let Ok(payload) = serde_json::to_string(&final_frame) {
            let _ = tx_for_sim.send(payload);
        }
        Ok(())
    });

    let state = Arc::new(AppState {
        broadcaster: tx.clone(),
        latest_frame: latest_frame.clone(),
        frames: frames.clone(),
        total_ticks: ticks,
        scenario_name: scenario_label.clone(),
        simulation_done: simulation_done.clone(),
    });

    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %scenario_label, "simulation completed"),
            Ok(Err(err)) => error!("simulation error: {err:?}"),
            Err(err) => error!("simulation task failed: {err:?}"),
        }
    });

    let router = router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    info!("verdant feed live at http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn frame_for(session: &Session, completed: bool) -> UiFrame {
    let weather = session.weather();
    UiFrame {
        snapshot: session.world().snapshot(&session.scenario().name),
        water: weather.water(),
        lightning_charges: weather.lightning_charges(),
        raining: weather.is_raining(),
        outcome: session.outcome(),
        completed,
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(all_frames))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down web feed");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = lock(&state.latest_frame).clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        frame,
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_ticks: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesResponse> {
    let frames = lock(&state.frames).clone();
    Json(FramesResponse {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        completed: state.simulation_done.load(Ordering::SeqCst),
        frames,
    })
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Layout;

    fn session() -> Session {
        let scenario = Scenario {
            name: "feed".to_string(),
            description: None,
            seed: 1,
            ticks: Some(3),
            snapshot_interval_ticks: 0,
            layout: Layout::from_rows(&["Cg.", "..g"]),
            config: Default::default(),
            weather: Vec::new(),
        };
        Session::new(scenario, SessionOptions::without_snapshots()).expect("session")
    }

    #[test]
    fn published_frames_reach_state_and_subscribers() {
        let (tx, mut rx) = broadcast::channel::<String>(8);
        let latest = Mutex::new(None);
        let frames = Mutex::new(Vec::new());
        let mut session = session();
        session.step().expect("tick");

        publish(frame_for(&session, false), &latest, &frames, &tx);

        let stored = lock(&latest).clone().expect("latest frame");
        assert_eq!(stored.snapshot.tick, 1);
        assert_eq!(stored.snapshot.tiles.len(), 6);
        assert_eq!(lock(&frames).len(), 1);
        let payload = rx.try_recv().expect("broadcast payload");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(value["snapshot"]["scenario"], "feed");
        assert_eq!(value["completed"], false);
    }
}
