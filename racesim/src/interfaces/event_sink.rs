use crate::core::driver::Skill;
use crate::error::SinkError;
use flume::{Sender, TrySendError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
}

/// RaceEvent is a lifecycle event emitted by a running engine. Speeds are given in km/h, times
/// in seconds of simulated race time, segment ids are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    Penalty {
        severity: Severity,
        delta_s: f64,
        segment: String,
        load: f64,
        time_s: f64,
    },
    SegmentTick {
        segment: String,
        segment_id: usize,
        segment_length: f64,
        distance: f64,
        lap: u32,
        laps: u32,
        time_s: f64,
        speed: f64,
    },
    /// Entering the next segment within a lap. Starting a new lap is reported by
    /// `LapComplete` only.
    SegmentChange {
        segment: String,
        segment_id: usize,
        lap: u32,
        laps: u32,
        time_s: f64,
        speed: f64,
    },
    LapComplete {
        lap: u32,
        time_s: f64,
    },
    RaceComplete {
        time_s: f64,
        incidents: u32,
    },
    SkillUp {
        skill: Skill,
        delta: f64,
        new: f64,
    },
}

impl RaceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RaceEvent::Penalty { .. } => "penalty",
            RaceEvent::SegmentTick { .. } => "segment_tick",
            RaceEvent::SegmentChange { .. } => "segment_change",
            RaceEvent::LapComplete { .. } => "lap_complete",
            RaceEvent::RaceComplete { .. } => "race_complete",
            RaceEvent::SkillUp { .. } => "skill_up",
        }
    }
}

/// TaggedEvent is a race event together with the lobby participant that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedEvent {
    pub user_id: String,
    pub name: String,
    #[serde(flatten)]
    pub event: RaceEvent,
}

/// EventSink receives the events of one engine in emission order. A sink must not block the
/// simulation loop for long; its errors are logged and dropped by the engine.
pub trait EventSink {
    fn deliver(&mut self, event: &RaceEvent) -> Result<(), SinkError>;
}

impl<F> EventSink for F
where
    F: FnMut(&RaceEvent) -> Result<(), SinkError>,
{
    fn deliver(&mut self, event: &RaceEvent) -> Result<(), SinkError> {
        self(event)
    }
}

/// NullSink discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&mut self, _event: &RaceEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// ChannelSink forwards events into a flume channel without ever blocking. A full bounded
/// channel or a dropped receiver results in a SinkError for that event.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<RaceEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<RaceEvent>) -> ChannelSink {
        ChannelSink { tx }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&mut self, event: &RaceEvent) -> Result<(), SinkError> {
        try_forward(&self.tx, event.to_owned())
    }
}

/// TaggingSink tags every event with the identity of a lobby participant before forwarding it
/// to the coordinator channel. Without a channel the events are written to the log.
#[derive(Debug, Clone)]
pub struct TaggingSink {
    user_id: String,
    name: String,
    tx: Option<Sender<TaggedEvent>>,
    t_last_tick_log: Option<std::time::Instant>,
}

/// (s) Minimum wall time between two logged segment ticks of one participant.
const TICK_LOG_INTERVAL: f64 = 20.0;

impl TaggingSink {
    pub fn new(user_id: &str, name: &str, tx: Option<Sender<TaggedEvent>>) -> TaggingSink {
        TaggingSink {
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            tx,
            t_last_tick_log: None,
        }
    }

    fn log_event(&mut self, event: &RaceEvent) {
        match event {
            RaceEvent::Penalty {
                severity,
                delta_s,
                segment,
                ..
            } => tracing::info!(
                user_id = %self.user_id,
                "{} penalty {:?} +{:.2}s on {}",
                self.name,
                severity,
                delta_s,
                segment
            ),
            RaceEvent::SegmentTick {
                segment,
                segment_id,
                segment_length,
                distance,
                lap,
                laps,
                time_s,
                speed,
            } => {
                let due = self
                    .t_last_tick_log
                    .map_or(true, |t| t.elapsed().as_secs_f64() >= TICK_LOG_INTERVAL);
                if due {
                    self.t_last_tick_log = Some(std::time::Instant::now());
                    tracing::info!(
                        user_id = %self.user_id,
                        "{}: lap {}/{}, segment {} (id {}), {:.1} km/h, {:.1}s, {:.0}/{:.0}m",
                        self.name,
                        lap,
                        laps,
                        segment,
                        segment_id,
                        speed,
                        time_s,
                        distance,
                        segment_length
                    );
                }
            }
            RaceEvent::SegmentChange {
                segment,
                speed,
                time_s,
                ..
            } => tracing::info!(
                user_id = %self.user_id,
                "{}: new segment {} at {:.1} km/h after {:.1}s",
                self.name,
                segment,
                speed,
                time_s
            ),
            _ => tracing::debug!(user_id = %self.user_id, "{}: {}", self.name, event.kind()),
        }
    }
}

impl EventSink for TaggingSink {
    fn deliver(&mut self, event: &RaceEvent) -> Result<(), SinkError> {
        match &self.tx {
            Some(tx) => try_forward(
                tx,
                TaggedEvent {
                    user_id: self.user_id.to_owned(),
                    name: self.name.to_owned(),
                    event: event.to_owned(),
                },
            ),
            None => {
                self.log_event(event);
                Ok(())
            }
        }
    }
}

fn try_forward<T>(tx: &Sender<T>, msg: T) -> Result<(), SinkError> {
    tx.try_send(msg).map_err(|e| match e {
        TrySendError::Full(_) => SinkError("event channel is full".to_owned()),
        TrySendError::Disconnected(_) => SinkError("event receiver was dropped".to_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap_event() -> RaceEvent {
        RaceEvent::LapComplete {
            lap: 1,
            time_s: 12.5,
        }
    }

    #[test]
    fn tagging_sink_forwards_identity() {
        let (tx, rx) = flume::unbounded();
        let mut sink = TaggingSink::new("u1", "Anna", Some(tx));
        sink.deliver(&lap_event()).unwrap();

        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.user_id, "u1");
        assert_eq!(tagged.name, "Anna");
        assert_eq!(tagged.event, lap_event());
    }

    #[test]
    fn dropped_receiver_is_a_sink_error() {
        let (tx, rx) = flume::unbounded();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        assert!(sink.deliver(&lap_event()).is_err());
    }

    #[test]
    fn full_channel_does_not_block() {
        let (tx, _rx) = flume::bounded(1);
        let mut sink = ChannelSink::new(tx);
        assert!(sink.deliver(&lap_event()).is_ok());
        assert!(sink.deliver(&lap_event()).is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(TaggedEvent {
            user_id: "u1".to_owned(),
            name: "Anna".to_owned(),
            event: RaceEvent::RaceComplete {
                time_s: 61.2,
                incidents: 2,
            },
        })
        .unwrap();
        assert_eq!(json["type"], "race_complete");
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["incidents"], 2);
    }
}
