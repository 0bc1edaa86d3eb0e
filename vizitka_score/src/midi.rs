// Standard MIDI File reading and writing.
//
// Reading: each track that contains at least one note becomes a part, named
// after the track. Note-on/note-off pairs are collected per track, notes
// starting on the same tick are merged into a chord, and any silence
// between notes becomes an explicit rest. Note durations are clipped to the
// next onset so parts stay monophonic in the event sense (one event at a
// time). A note-less first track (the usual SMF Format 1 conductor track)
// supplies the title. Time signature meta events from every track are
// merged into the score's time signature list.
//
// Writing: SMF Format 1 with a conductor track (tempo, time signatures,
// title) followed by one track per part. Tied continuations extend the
// sounding note rather than re-attacking it.
//
// All tick values are rescaled to the score's 480 ticks per quarter.

use crate::error::{Result, ScoreError};
use crate::offset::{Offset, TICKS_PER_QUARTER};
use crate::pitch::Pitch;
use crate::score::{Event, EventContent, Part, Score, Tie, TimeSignature};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Default tempo written to the conductor track (120 BPM).
const TEMPO_MICROSECONDS: u32 = 500_000;

/// Velocity for written note-on events.
const VELOCITY: u8 = 80;

/// A note collected from a track, in score ticks.
#[derive(Debug, Clone, Copy)]
struct RawNote {
    onset: u32,
    end: u32,
    key: u8,
}

/// Parse a Standard MIDI File into a `Score`.
pub fn read_midi(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes)?;
    let source_tpq = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int().max(1) as u64,
        Timing::Timecode(..) => return Err(ScoreError::UnsupportedTiming),
    };
    let scale = |tick: u64| -> Result<u32> {
        let scaled = tick.saturating_mul(TICKS_PER_QUARTER as u64).saturating_add(source_tpq / 2) / source_tpq;
        u32::try_from(scaled).map_err(|_| ScoreError::TooLong(scaled))
    };

    let mut score = Score::default();
    let mut time_signatures: Vec<(Offset, TimeSignature)> = Vec::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut name = String::new();
        let mut notes: Vec<RawNote> = Vec::new();
        let mut open: Vec<(u8, u32)> = Vec::new();
        let mut abs: u64 = 0;

        for event in track {
            abs += event.delta.as_int() as u64;
            let tick = scale(abs)?;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) if name.is_empty() => {
                    name = String::from_utf8_lossy(bytes).trim().to_string();
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, pow, _, _)) => {
                    let denominator = 1u8.checked_shl(pow as u32).unwrap_or(4);
                    time_signatures.push((Offset(tick), TimeSignature::new(num, denominator)));
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.push((key.as_int(), tick));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let key = key.as_int();
                        if let Some(pos) = open.iter().position(|(k, _)| *k == key) {
                            let (_, onset) = open.remove(pos);
                            notes.push(RawNote { onset, end: tick, key });
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        let track_end = scale(abs)?;
        notes.extend(open.drain(..).map(|(key, onset)| RawNote {
            onset,
            end: track_end,
            key,
        }));

        if notes.is_empty() {
            if track_index == 0 && !name.is_empty() {
                score.metadata.title = name;
            }
            continue;
        }
        score.parts.push(Part::new(name, notes_to_events(notes)));
    }

    time_signatures.sort_by_key(|(off, _)| *off);
    time_signatures.dedup_by_key(|(off, _)| *off);
    score.time_signatures = time_signatures;
    Ok(score)
}

/// Group notes by onset into note/chord events, filling gaps with rests.
fn notes_to_events(mut notes: Vec<RawNote>) -> Vec<Event> {
    notes.sort_by_key(|n| (n.onset, std::cmp::Reverse(n.key)));

    let mut onsets: Vec<u32> = notes.iter().map(|n| n.onset).collect();
    onsets.dedup();

    let mut events = Vec::new();
    let mut cursor = 0u32;
    for (i, &onset) in onsets.iter().enumerate() {
        let group: Vec<&RawNote> = notes.iter().filter(|n| n.onset == onset).collect();
        let mut end = group.iter().map(|n| n.end).max().unwrap_or(onset);
        if let Some(&next) = onsets.get(i + 1) {
            end = end.min(next);
        }
        if end <= onset {
            continue;
        }
        if onset > cursor {
            events.push(Event::new(
                Offset(cursor),
                Offset(onset - cursor),
                EventContent::Rest,
            ));
        }

        let mut keys: Vec<u8> = group.iter().map(|n| n.key).collect();
        keys.dedup();
        let content = match keys.as_slice() {
            [single] => EventContent::Note(Pitch::from_midi(*single)),
            many => EventContent::Chord(many.iter().map(|k| Pitch::from_midi(*k)).collect()),
        };
        events.push(Event::new(Offset(onset), Offset(end - onset), content));
        cursor = end;
    }
    events
}

/// Convert a `Score` to MIDI and write it to a file.
pub fn write_midi(score: &Score, path: &Path) -> Result<()> {
    let bytes = write_midi_bytes(score)?;
    std::fs::write(path, &bytes)?;
    Ok(())
}

/// Convert a `Score` to an encoded SMF byte buffer.
pub fn write_midi_bytes(score: &Score) -> Result<Vec<u8>> {
    let smf = score_to_smf(score)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

fn score_to_smf(score: &Score) -> Result<Smf<'_>> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER as u16)),
    ));

    // Track 0: conductor track
    let mut conductor: Vec<(u32, TrackEventKind<'_>)> = Vec::new();
    if !score.metadata.title.is_empty() {
        conductor.push((
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(score.metadata.title.as_bytes())),
        ));
    }
    conductor.push((
        0,
        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(TEMPO_MICROSECONDS))),
    ));
    for (at, ts) in &score.time_signatures {
        let pow = ts.denominator.max(1).trailing_zeros() as u8;
        conductor.push((
            at.ticks(),
            TrackEventKind::Meta(MetaMessage::TimeSignature(ts.numerator, pow, 24, 8)),
        ));
    }
    smf.tracks.push(to_track(conductor));

    // One track per part
    for (index, part) in score.parts.iter().enumerate() {
        let channel = u4::new((index % 16) as u8);
        // Sort key (tick, 0 = note-off before 1 = note-on) keeps repeated
        // pitches from cutting each other off.
        let mut timed: Vec<(u32, u8, TrackEventKind<'_>)> = vec![(
            0,
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(part.name.as_bytes())),
        )];

        for event in &part.events {
            for pitch in event.pitches() {
                let key = midi_key(*pitch)?;
                if event.is_attack() {
                    timed.push((
                        event.onset.ticks(),
                        1,
                        TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOn {
                                key,
                                vel: u7::new(VELOCITY),
                            },
                        },
                    ));
                }
                if matches!(event.tie, None | Some(Tie::Stop)) {
                    timed.push((
                        event.end().ticks(),
                        0,
                        TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOff {
                                key,
                                vel: u7::new(0),
                            },
                        },
                    ));
                }
            }
        }
        timed.sort_by_key(|(tick, order, _)| (*tick, *order));
        smf.tracks
            .push(to_track(timed.into_iter().map(|(t, _, k)| (t, k)).collect()));
    }

    Ok(smf)
}

fn midi_key(pitch: Pitch) -> Result<u7> {
    let midi = pitch.midi();
    if (0..=127).contains(&midi) {
        Ok(u7::new(midi as u8))
    } else {
        Err(ScoreError::PitchOutOfRange(pitch.name()))
    }
}

/// Convert absolute-tick events (already in order) to a delta-timed track.
fn to_track(events: Vec<(u32, TrackEventKind<'_>)>) -> Track<'_> {
    let mut track: Track<'_> = Vec::with_capacity(events.len() + 1);
    let mut last = 0u32;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: u28::new(tick.saturating_sub(last)),
            kind,
        });
        last = last.max(tick);
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(part: &Part) -> Vec<(f64, String)> {
        part.events
            .iter()
            .map(|e| (e.onset.quarters(), e.label()))
            .collect()
    }

    #[test]
    fn write_then_read_preserves_parts_and_rests() {
        let soprano = Part::from_sequence("Soprano", &[("E4", 1.0), ("Rest", 1.0), ("G4", 2.0)]).unwrap();
        let bass = Part::from_sequence("Bass", &[("C3", 2.0), ("G2 D3", 2.0)]).unwrap();
        let mut score = Score::new(vec![soprano, bass])
            .with_time_signature(Offset::ZERO, TimeSignature::new(3, 4));
        score.metadata.title = "Chorale".to_string();

        let bytes = write_midi_bytes(&score).unwrap();
        let back = read_midi(&bytes).unwrap();

        assert_eq!(back.metadata.title, "Chorale");
        assert_eq!(back.parts.len(), 2);
        assert_eq!(back.parts[0].name, "Soprano");
        assert_eq!(
            labels(&back.parts[0]),
            vec![
                (0.0, "E4".to_string()),
                (1.0, "Rest".to_string()),
                (2.0, "G4".to_string())
            ]
        );
        assert_eq!(
            labels(&back.parts[1]),
            vec![(0.0, "C3".to_string()), (2.0, "D3 G2".to_string())]
        );
        assert_eq!(back.time_signatures, vec![(Offset::ZERO, TimeSignature::new(3, 4))]);
    }

    #[test]
    fn tied_notes_sound_once() {
        let mut part = Part::from_sequence("S", &[("C4", 1.0), ("C4", 1.0)]).unwrap();
        part.events[0].tie = Some(Tie::Start);
        part.events[1].tie = Some(Tie::Stop);
        let bytes = write_midi_bytes(&Score::new(vec![part])).unwrap();
        let back = read_midi(&bytes).unwrap();
        assert_eq!(back.parts[0].events.len(), 1);
        assert_eq!(back.parts[0].events[0].duration, Offset::from_quarters(2.0));
    }

    #[test]
    fn leading_silence_becomes_rest() {
        let part = Part::from_sequence("S", &[("Rest", 2.0), ("A4", 1.0)]).unwrap();
        let back = read_midi(&write_midi_bytes(&Score::new(vec![part])).unwrap()).unwrap();
        assert_eq!(
            labels(&back.parts[0]),
            vec![(0.0, "Rest".to_string()), (2.0, "A4".to_string())]
        );
    }

    #[test]
    fn out_of_range_pitch_is_an_error() {
        let part = Part::from_sequence("S", &[("C10", 1.0)]).unwrap();
        assert!(matches!(
            write_midi_bytes(&Score::new(vec![part])),
            Err(ScoreError::PitchOutOfRange(_))
        ));
    }

    #[test]
    fn positions_past_the_tick_range_are_an_error() {
        // One source tick per quarter, so a maximal delta rescales to well
        // over u32::MAX score ticks.
        let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(1))));
        let channel = u4::new(0);
        let key = u7::new(60);
        smf.tracks.push(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel: u7::new(VELOCITY) },
                },
            },
            TrackEvent {
                delta: u28::new(0x0FFF_FFFF),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff { key, vel: u7::new(0) },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        assert!(matches!(read_midi(&bytes), Err(ScoreError::TooLong(_))));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(matches!(read_midi(b"not a midi file"), Err(ScoreError::Midi(_))));
    }
}
