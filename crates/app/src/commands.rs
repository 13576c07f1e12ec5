//! Line commands read from stdin by the `emcee` binary.

use anyhow::{Context, bail};
use emcee_core::{SegmentId, TrackId};

pub const HELP: &str = "\
commands:
  play | pause | toggle | stop
  seek SECS          jump to a position
  skip SECS          jump relative to the cursor (negative goes back)
  mute TRACK         toggle mute
  solo TRACK         solo one track (`solo off` clears)
  lock TRACK         toggle lock
  vol TRACK 0-100    track volume
  master 0-100       master volume
  move SEG TRACK X WIDTH   drop SEG on TRACK at pixel X of a WIDTH-px lane
  delete SEG
  list | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    Stop,
    Seek(f64),
    Skip(f64),
    Mute(TrackId),
    Solo(Option<TrackId>),
    Lock(TrackId),
    Volume(TrackId, f32),
    Master(f32),
    Move {
        segment: SegmentId,
        track: TrackId,
        drop_x: f64,
        width: f64,
    },
    Delete(SegmentId),
    List,
    Help,
    Quit,
}

pub fn parse(line: &str) -> anyhow::Result<Command> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("play", []) => Command::Play,
        ("pause", []) => Command::Pause,
        ("toggle", []) => Command::Toggle,
        ("stop", []) => Command::Stop,
        ("seek", [secs]) => Command::Seek(number(secs, "seconds")?),
        ("skip", [secs]) => Command::Skip(number(secs, "seconds")?),
        ("mute", [track]) => Command::Mute(track_id(track)?),
        ("solo", ["off"]) => Command::Solo(None),
        ("solo", [track]) => Command::Solo(Some(track_id(track)?)),
        ("lock", [track]) => Command::Lock(track_id(track)?),
        ("vol", [track, volume]) => {
            Command::Volume(track_id(track)?, number(volume, "volume")? as f32)
        }
        ("master", [volume]) => Command::Master(number(volume, "volume")? as f32),
        ("move", [segment, track, x, width]) => Command::Move {
            segment: SegmentId::from(*segment),
            track: track_id(track)?,
            drop_x: number(x, "x")?,
            width: number(width, "width")?,
        },
        ("delete", [segment]) => Command::Delete(SegmentId::from(*segment)),
        ("list" | "ls", []) => Command::List,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (verb, _) => bail!("unknown command or wrong arguments: {verb} (try `help`)"),
    };
    Ok(command)
}

fn number(word: &str, what: &str) -> anyhow::Result<f64> {
    let value: f64 = word
        .parse()
        .with_context(|| format!("{what} must be a number, got {word:?}"))?;
    if !value.is_finite() {
        bail!("{what} must be finite");
    }
    Ok(value)
}

fn track_id(word: &str) -> anyhow::Result<TrackId> {
    word.parse()
        .map(TrackId)
        .with_context(|| format!("track must be a number, got {word:?}"))
}
