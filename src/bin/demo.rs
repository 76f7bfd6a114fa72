//! Diagnostic CLI: drives a [`Session`] through a scripted sequence of
//! fixes and synthetic steps and prints the fused-position stream.
//!
//! Not part of the library's public contract; a standalone example in the
//! style of the teacher's `bin/ekf_gps_demo.rs` and `bin/replay.rs`.

use clap::Parser;
use pdr_fusion::types::{AbsoluteFix, AccelSample, EngineConfig};
use pdr_fusion::Session;

#[derive(Parser, Debug)]
#[command(about = "Scripted walk-and-GPS demo for the fusion engine")]
struct Args {
    /// Origin latitude in degrees.
    #[arg(long, default_value_t = 37.5665)]
    lat: f64,

    /// Origin longitude in degrees.
    #[arg(long, default_value_t = 126.9780)]
    lng: f64,

    /// Number of synthetic steps to walk after GPS acquisition.
    #[arg(long, default_value_t = 20)]
    steps: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut session = Session::new(EngineConfig::default());

    let initial = AbsoluteFix {
        lat: args.lat,
        lng: args.lng,
        accuracy: 8.0,
        timestamp: 0,
    };
    session.start(initial, "demo-attendance", "demo-session", 0)?;
    println!("started at ({:.6}, {:.6})", args.lat, args.lng);

    for i in 1..=5 {
        let fix = AbsoluteFix {
            lat: args.lat + 0.0000001 * i as f64,
            lng: args.lng + 0.0000001 * i as f64,
            accuracy: 8.0,
            timestamp: i * 1000,
        };
        if let Some(fused) = session.on_absolute_fix(fix) {
            println!(
                "[gps  ] t={:<6} source={:?} x={:8.3} y={:8.3} acc={:6.3} conf={:.2}",
                fused.timestamp, fused.source, fused.x, fused.y, fused.accuracy, fused.confidence
            );
        }
    }

    let mut ts = 6_000i64;
    for step in 0..args.steps {
        for &mag in &[1.0, 1.1, 2.1, 1.2, 0.9, 0.8] {
            ts += 20;
            if let Some(fused) = session.on_accel(AccelSample {
                ax: mag,
                ay: 0.0,
                az: 0.0,
                timestamp: ts,
            }) {
                println!(
                    "[pdr  ] step={:<3} t={:<6} source={:?} x={:8.3} y={:8.3} conf={:.2}",
                    step, fused.timestamp, fused.source, fused.x, fused.y, fused.confidence
                );
            }
        }
        ts += 400;
    }

    session.stop()?;
    println!("stopped");
    Ok(())
}
