mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, bail};
use emcee_core::{
    AudioResourceManager, EditorResult, MoveRequest, Segment, Session, Timeline,
    TrackKind, TransportEvent, format_position, placement,
};
use emcee_decode::ResourceResolver;
use emcee_engine::CpalAudioManager;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use commands::Command;
use config::Config;

struct Args {
    duration: Option<f64>,
    files: Vec<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut duration = None;
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--duration" | "-d" => {
                let value = args.next().context("--duration needs a value")?;
                let seconds: f64 = value
                    .parse()
                    .with_context(|| format!("invalid duration {value:?}"))?;
                if !(seconds.is_finite() && seconds > 0.0) {
                    bail!("duration must be positive");
                }
                duration = Some(seconds);
            }
            "--help" | "-h" => {
                println!("usage: emcee [--duration SECS] FILE...");
                std::process::exit(0);
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }

    if files.is_empty() {
        bail!("usage: emcee [--duration SECS] FILE...");
    }
    Ok(Args { duration, files })
}

/// Decode each file into the engine's cache and lay the clips back to back
/// on one voice track, the way a file import fills free space. Decoding
/// here keeps it off the tick path once playback starts.
fn import_clips<M: AudioResourceManager>(
    session: &mut Session<M>,
    resolver: &ResourceResolver,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let mut clips = Vec::with_capacity(files.len());
    for path in files {
        let handle = resolver.handle_for(path);
        let length = session
            .manager_mut()
            .preload(&handle)
            .with_context(|| format!("failed to read {}", path.display()))?;
        clips.push((path, handle, length));
    }

    let total: f64 = clips.iter().map(|(_, _, length)| length).sum();
    if total > session.timeline().duration() {
        session.set_duration(total.ceil())?;
    }

    let track = session.add_track("Voice", TrackKind::Voice)?;
    for (index, (path, handle, length)) in clips.into_iter().enumerate() {
        let lane = session
            .timeline()
            .track(track)
            .context("voice track vanished")?;
        let Some(start) = placement::find_free_slot(lane, length, session.timeline().duration())
        else {
            log::warn!("no room for {}, skipping", path.display());
            continue;
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("clip {index}"));
        let segment = Segment::new(format!("clip-{index}"), start, start + length, name)
            .with_audio(handle);
        session.add_segment(track, segment)?;
    }
    Ok(())
}

fn print_timeline(timeline: &Timeline) {
    for track in timeline.tracks() {
        let mut flags = String::new();
        if track.muted {
            flags.push_str(" muted");
        }
        if track.solo {
            flags.push_str(" solo");
        }
        if track.locked {
            flags.push_str(" locked");
        }
        println!(
            "track {} {:?} \"{}\" vol {:.0}{}",
            track.id, track.kind, track.name, track.volume, flags
        );
        for segment in track.segments() {
            println!(
                "  {:<10} {} - {}  {:?}  {}",
                segment.id.to_string(),
                format_position(segment.start_time),
                format_position(segment.end_time),
                segment.status,
                segment.content
            );
        }
    }
}

fn print_event(event: &TransportEvent) {
    match event {
        TransportEvent::SegmentStarted(id) => println!("> {id}"),
        TransportEvent::SegmentEnded(id) => println!("< {id}"),
        TransportEvent::SegmentFailed { message, .. } => println!("! {message}"),
        TransportEvent::SegmentSkipped(id) => println!("- {id} has no audio yet"),
        TransportEvent::ReachedEnd => println!("end of timeline"),
    }
}

fn apply<M: AudioResourceManager>(session: &mut Session<M>, command: Command) -> EditorResult<()> {
    match command {
        Command::Play => session.play(),
        Command::Pause => session.pause(),
        Command::Toggle => session.toggle_playback(),
        Command::Stop => session.stop(),
        Command::Seek(seconds) => session.seek(seconds),
        Command::Skip(delta) => session.skip_by(delta),
        Command::Mute(track) => {
            let muted = session.toggle_track_muted(track)?;
            println!("track {track} {}", if muted { "muted" } else { "unmuted" });
        }
        Command::Solo(Some(track)) => session.solo_track_exclusive(track)?,
        Command::Solo(None) => {
            let soloed: Vec<_> = session
                .timeline()
                .tracks()
                .iter()
                .filter(|t| t.solo)
                .map(|t| t.id)
                .collect();
            for track in soloed {
                session.set_track_solo(track, false)?;
            }
        }
        Command::Lock(track) => {
            let locked = session
                .timeline()
                .track(track)
                .is_some_and(|t| t.locked);
            session.set_track_locked(track, !locked)?;
        }
        Command::Volume(track, volume) => session.set_track_volume(track, volume)?,
        Command::Master(volume) => session.set_master_volume(volume)?,
        Command::Move {
            segment,
            track,
            drop_x,
            width,
        } => {
            let placed = session.move_segment(&MoveRequest {
                segment_id: segment,
                target_track: track,
                drop_x,
                track_width_px: width,
            })?;
            println!(
                "{} -> track {} at {}",
                placed.segment_id,
                placed.to_track,
                format_position(placed.start_time)
            );
        }
        Command::Delete(segment) => {
            let removed = session.delete_segment(&segment)?;
            println!("deleted {}", removed.id);
        }
        Command::List => print_timeline(session.timeline()),
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let config = Config::load();
    if Config::config_path().is_some_and(|path| !path.exists()) {
        config.save();
    }

    let resolver = ResourceResolver::new(config.samples_root.clone());
    let manager = CpalAudioManager::start(resolver.clone())?;

    let duration = args.duration.unwrap_or(config.default_project_duration);
    let mut session = Session::new(Timeline::new(duration), manager, config.scheduler.clone());
    session.set_master_volume(config.master_volume)?;
    import_clips(&mut session, &resolver, &args.files)?;

    log::info!(
        "{} clip(s), {} long",
        session.timeline().segments().count(),
        format_position(session.timeline().duration())
    );
    print_timeline(session.timeline());
    println!("{}", commands::HELP);

    let mut interval = tokio::time::interval(config.scheduler.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_label = String::new();

    loop {
        tokio::select! {
            now = interval.tick() => {
                session.tick_at(now.into_std());
                for event in session.drain_events() {
                    print_event(&event);
                }
                if session.is_playing() {
                    let label = session.position_label();
                    if label != last_label {
                        log::debug!("{label}");
                        last_label = label;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(err) = apply(&mut session, command) {
                            println!("error: {err}");
                        }
                        for event in session.drain_events() {
                            print_event(&event);
                        }
                        println!("{}", session.position_label());
                    }
                    Err(err) => println!("{err:#}"),
                }
            }
        }
    }

    session.dispose();
    Ok(())
}
