// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless preview of a clip scene.
//!
//! Usage: `clip_preview <scene.ron> [ticks] [elapsed_ms]`
//!
//! Loads a scene description, drives it from a ticker and logs the frame and
//! label of every node after each tick.

use ordoplay_timeline_clip::{load_scene, SceneTree, Ticker};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKS: u32 = 60;
const DEFAULT_ELAPSED_MS: f64 = 1000.0 / 60.0;

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clip_preview=info,ordoplay_timeline_clip=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run() {
        tracing::error!("Preview failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path: PathBuf = args
        .next()
        .ok_or("usage: clip_preview <scene.ron> [ticks] [elapsed_ms]")?
        .into();
    let ticks: u32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(DEFAULT_TICKS);
    let elapsed_ms: f64 = args
        .next()
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(DEFAULT_ELAPSED_MS);

    tracing::info!("Previewing {} for {ticks} ticks of {elapsed_ms:.2}ms", path.display());

    let scene = Arc::new(Mutex::new(load_scene(&path)?));
    let ticker = Ticker::new();
    let _subscription = SceneTree::bind(&scene, &ticker);

    for _ in 0..ticks {
        let event = ticker.tick(elapsed_ms);

        let mut scene = scene.lock();
        let ids: Vec<_> = scene
            .roots()
            .iter()
            .flat_map(|root| scene.depth_first(*root))
            .collect();

        for id in ids {
            let Some(node) = scene.node_mut(id) else {
                continue;
            };
            // Read the label without resolving the playhead again
            let label = node
                .clip
                .labels()
                .label_at(node.clip.current_frame())
                .unwrap_or_default();
            tracing::info!(
                tick = event.sequence,
                "{}: frame {}/{} {label}",
                node.name,
                node.clip.current_frame(),
                node.clip.total_frames()
            );
            for clip_event in node.clip.take_events() {
                tracing::info!(
                    tick = event.sequence,
                    "{}: event {} on frame {}",
                    node.name,
                    clip_event.name,
                    clip_event.frame
                );
            }
        }
    }

    Ok(())
}
