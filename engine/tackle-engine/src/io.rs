//! # Table Input/Output
//!
//! CSV boundary of the pipeline: typed source tables in, feature and opportunity
//! tables out. Nothing in here transforms data.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::features::FEATURE_COLUMNS;
use crate::types::{FeatureFrame, OutcomeFlags, TackleOpportunity, TrackingRecord};

/// A chunk of tracking data processed independently (usually one game week)
pub trait TrackingPartition: Send + Sync {
    /// Name used in logs and failure reports
    fn label(&self) -> String;

    fn load(&self) -> Result<Cow<'_, [TrackingRecord]>>;
}

/// Tracking rows already in memory
#[derive(Debug, Clone)]
pub struct InMemoryPartition {
    pub label: String,
    pub records: Vec<TrackingRecord>,
}

impl InMemoryPartition {
    pub fn new(label: impl Into<String>, records: Vec<TrackingRecord>) -> Self {
        Self { label: label.into(), records }
    }
}

impl TrackingPartition for InMemoryPartition {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<Cow<'_, [TrackingRecord]>> {
        Ok(Cow::Borrowed(&self.records))
    }
}

/// Tracking CSV read when the partition is processed
#[derive(Debug, Clone)]
pub struct CsvPartition {
    pub path: PathBuf,
}

impl CsvPartition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TrackingPartition for CsvPartition {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Cow<'_, [TrackingRecord]>> {
        Ok(Cow::Owned(read_table(&self.path)?))
    }
}

/// Read a CSV file with headers into typed rows
pub fn read_table<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let rows = read_table_from(File::open(path)?)?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_table_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(reader);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Write serializable rows as CSV
pub fn write_rows<T: Serialize, W: Write>(writer: W, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Columns of the defender feature table
pub fn frame_columns() -> Vec<&'static str> {
    let mut columns = vec![
        "gameId",
        "playId",
        "frameId",
        "playDirection",
        "nflId_carrier",
        "jerseyNumber_carrier",
        "club_carrier",
        "x_carrier",
        "y_carrier",
        "s_carrier",
        "o_carrier",
        "dir_carrier",
        "s_downfield",
        "startFrameId",
        "receiptEvent",
        "endFrameId",
        "endEvent",
        "x_final",
        "nflId_defender",
        "jerseyNumber_defender",
        "club_defender",
        "x_defender",
        "y_defender",
        "s_defender",
        "o_defender",
        "dir_defender",
        "dist_to_carrier",
        "blockers_nearby",
        "defenders_nearby",
        "weight_carrier",
        "position_carrier",
        "height_m_carrier",
        "weight_defender",
        "position_defender",
        "height_m_defender",
        "tackle",
        "assist",
        "forcedFumble",
        "pff_missedTackle",
    ];
    columns.extend(FEATURE_COLUMNS.iter().filter(|c| **c != "s_carrier"));
    columns
}

/// Columns of the opportunity table
pub fn opportunity_columns() -> Vec<&'static str> {
    let mut columns = frame_columns();
    columns.extend(["tidx", "weight"]);
    columns
}

fn num(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        v.to_string()
    }
}

fn opt(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "NA".to_string())
}

fn flag(v: bool) -> String {
    (v as u8).to_string()
}

fn frame_record(f: &FeatureFrame, outcome: OutcomeFlags) -> Vec<String> {
    let d = &f.frame;
    let mut record = vec![
        d.game_id().to_string(),
        d.play_id().to_string(),
        d.frame_id.to_string(),
        d.play_direction.as_str().to_string(),
        d.carrier.nfl_id.to_string(),
        opt(d.carrier.jersey_number),
        d.carrier.club.clone(),
        num(d.carrier.x),
        num(d.carrier.y),
        num(d.carrier.s),
        num(d.carrier.o),
        num(d.carrier.dir),
        num(d.s_downfield),
        d.window.start_frame_id.to_string(),
        d.window.receipt_event.as_str().to_string(),
        d.window.end_frame_id.to_string(),
        d.window.end_event.clone(),
        num(d.window.x_final),
        d.defender.nfl_id.to_string(),
        opt(d.defender.jersey_number),
        d.defender.club.clone(),
        num(d.defender.x),
        num(d.defender.y),
        num(d.defender.s),
        num(d.defender.o),
        num(d.defender.dir),
        num(d.dist_to_carrier),
        d.blockers_nearby.to_string(),
        d.defenders_nearby.to_string(),
        num(f.carrier_body.weight),
        f.carrier_body.position.clone(),
        num(f.carrier_body.height_m),
        num(f.defender_body.weight),
        f.defender_body.position.clone(),
        num(f.defender_body.height_m),
        flag(outcome.tackle),
        flag(outcome.assist),
        flag(outcome.forced_fumble),
        flag(outcome.missed_tackle),
    ];

    let t = &f.features;
    record.extend([
        num(t.p_carrier),
        num(t.p_rel),
        num(t.o_rel),
        num(t.rel_height),
        num(t.time_since_receipt),
        num(t.sideline_dist),
        t.is_caught_pass.to_string(),
        t.is_qb.to_string(),
        t.net_defenders_nearby.to_string(),
        t.congestion.to_string(),
    ]);
    record
}

/// Write the defender feature table with recorded outcomes
pub fn write_feature_frames<W: Write>(writer: W, frames: &[FeatureFrame]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(frame_columns())?;
    for frame in frames {
        writer.write_record(frame_record(frame, frame.outcome))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the opportunity table with attributed outcomes and weights
pub fn write_opportunities<W: Write>(writer: W, opportunities: &[TackleOpportunity]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(opportunity_columns())?;
    for opp in opportunities {
        let mut record = frame_record(&opp.entry, opp.outcome);
        record.extend([opp.tidx.to_string(), num(opp.weight)]);
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Create a buffered file writer
pub fn create_file(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Write a value as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
