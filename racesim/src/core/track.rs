use crate::error::RaceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Straight,
    Corner,
}

/// * `name` - Segment name shown to the user
/// * `kind` - Straight or corner
/// * `length` - (m) Length of the segment
/// * `entry_complexity` - (-) Difficulty when entering the segment
/// * `exit_complexity` - (-) Difficulty when leaving the segment
/// * `accel_coef` - (-) Scales the attainable acceleration on straights
/// * `brake_coef` - (-) Braking coefficient (kept for track data compatibility)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackSegment {
    pub name: String,
    #[serde(alias = "type")]
    pub kind: SegmentKind,
    pub length: f64,
    pub entry_complexity: f64,
    pub exit_complexity: f64,
    #[serde(alias = "accel_coefficient")]
    pub accel_coef: f64,
    #[serde(alias = "brake_coefficient")]
    pub brake_coef: f64,
}

impl TrackSegment {
    /// Average of entry and exit complexity, called load.
    pub fn load(&self) -> f64 {
        helpers::general::mean(&[self.entry_complexity, self.exit_complexity])
    }

    pub fn is_corner(&self) -> bool {
        self.kind == SegmentKind::Corner
    }
}

/// * `id` - Track id used by the catalog
/// * `name` - Track name
/// * `segments` - Ordered segments, traversed cyclically once per lap
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackPars {
    pub id: String,
    pub name: String,
    pub segments: Vec<TrackSegment>,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub segments: Vec<TrackSegment>,
    pub total_length: f64,
}

impl Track {
    /// Creates the track. An empty segment list is a simulation fault, segments with a
    /// non-finite or non-positive length are a configuration error.
    pub fn new(track_pars: &TrackPars) -> Result<Track, RaceError> {
        if track_pars.segments.is_empty() {
            return Err(RaceError::SimulationFault(format!(
                "track {} has no segments",
                track_pars.id
            )));
        }

        for seg in track_pars.segments.iter() {
            if !seg.length.is_finite() || seg.length <= 0.0 {
                return Err(RaceError::Configuration(format!(
                    "segment {} of track {} has invalid length {}",
                    seg.name, track_pars.id, seg.length
                )));
            }
        }

        Ok(Track {
            id: track_pars.id.to_owned(),
            name: track_pars.name.to_owned(),
            segments: track_pars.segments.to_owned(),
            total_length: track_pars.segments.iter().map(|s| s.length).sum(),
        })
    }

    pub fn no_segments(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn segment(name: &str, kind: SegmentKind, length: f64) -> TrackSegment {
        TrackSegment {
            name: name.to_owned(),
            kind,
            length,
            entry_complexity: 1.0,
            exit_complexity: 3.0,
            accel_coef: 1.0,
            brake_coef: 1.0,
        }
    }

    #[test]
    fn total_length_and_load() {
        let track = Track::new(&TrackPars {
            id: "t".to_owned(),
            name: "Test".to_owned(),
            segments: vec![
                segment("s1", SegmentKind::Straight, 100.0),
                segment("c1", SegmentKind::Corner, 50.0),
            ],
        })
        .unwrap();

        assert_relative_eq!(track.total_length, 150.0);
        assert_relative_eq!(track.segments[0].load(), 2.0);
        assert!(track.segments[1].is_corner());
    }

    #[test]
    fn empty_track_is_a_fault() {
        let err = Track::new(&TrackPars {
            id: "empty".to_owned(),
            name: "Empty".to_owned(),
            segments: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, RaceError::SimulationFault(_)));
    }

    #[test]
    fn legacy_segment_keys_deserialize() {
        let seg: TrackSegment = serde_json::from_str(
            r#"{"name":"T1","type":"corner","length":80,"entry_complexity":2,
                "exit_complexity":1,"accel_coef":0.9,"brake_coef":1.1}"#,
        )
        .unwrap();
        assert_eq!(seg.kind, SegmentKind::Corner);
    }
}
